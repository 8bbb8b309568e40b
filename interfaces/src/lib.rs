pub mod defs;
pub mod state;

pub use defs::{Destination, Notifier, Subscription, SubscriptionCacheUpdate};
pub use state::{StoreError, StoreResult, SubscriptionStore};
