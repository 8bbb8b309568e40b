pub mod types;
pub mod traits;
pub mod config;
pub mod fetcher;
pub mod sources;
pub mod aggregator;
pub mod notify;
pub mod memory_store;
pub mod subscription_store;
pub mod poller;
pub mod service;

pub use types::*;
pub use traits::ContentSource;
pub use config::{EngineConfig, SourceConfig, SourceKind};
pub use fetcher::{RateLimitedSource, ThrottleGate};
pub use aggregator::{interleave, SourceAggregator};
pub use notify::LogNotifier;
pub use memory_store::MemorySubscriptionStore;
pub use subscription_store::PgSubscriptionStore;
pub use poller::{PollerConfig, SubscriptionPoller};
pub use service::SubscriptionService;
