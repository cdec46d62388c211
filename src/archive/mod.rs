//! Persistence collaborators.
//!
//! Neither implementation offers transactions: the pipeline creates and updates
//! rows one at a time and a failure leaves earlier writes in place.

pub mod file;
pub mod memory;

pub use file::FileArchive;
pub use memory::MemoryArchive;
