use crate::models::{ComposedItem, PersistedRecord, RawItem};

/// Data threaded between stages of one run. Dropped when the run ends.
#[derive(Debug, Default)]
pub struct RunData {
    /// Fetched items, narrowed by dedupe. Fetch order is kept throughout.
    pub items: Vec<RawItem>,
    pub composed: Vec<ComposedItem>,
    /// One record per surviving item; ephemeral when persistence is off.
    pub records: Vec<PersistedRecord>,
}

impl RunData {
    pub fn new(items: Vec<RawItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }
}
