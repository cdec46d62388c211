pub mod rss;

pub use rss::RssProvider;
