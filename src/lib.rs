pub mod bus;
pub mod commands;
pub mod config;
pub mod registry;
pub mod seen;
pub mod service;

pub use bus::{ScanBus, ScanEvent, SharedScanBus};
pub use config::WatcherConfig;
pub use registry::SubscriptionRegistry;
pub use seen::SeenSet;
pub use service::ScanEngine;
