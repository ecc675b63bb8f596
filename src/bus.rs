use std::sync::Arc;
use tokio::sync::broadcast;

use common_types::ChainScope;

#[derive(Debug, Clone)]
pub enum ScanEvent {
    NewBlock { chain: ChainScope, number: u64 },
}

/// Fan-in point between the per-chain block listeners and the engine.
#[derive(Clone)]
pub struct ScanBus {
    tx: broadcast::Sender<ScanEvent>,
}

impl ScanBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, ev: ScanEvent) {
        let _ = self.tx.send(ev);
    }
}

pub type SharedScanBus = Arc<ScanBus>;
