//! Single-slot store for the most recent fix

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::fix::Fix;

/// Last-value store shared between the radio receiver and its readers.
///
/// Writes replace the slot; reads clone it. There is no queue, so a reader
/// polling slower than the receiver skips intermediate fixes.
#[derive(Debug, Clone, Default)]
pub struct FixStore {
    slot: Arc<Mutex<Option<Fix>>>,
}

impl FixStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, fix: Fix) {
        let mut slot = self.slot.lock().await;
        *slot = Some(fix);
    }

    pub async fn get(&self) -> Option<Fix> {
        self.slot.lock().await.clone()
    }
}
