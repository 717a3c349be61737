pub mod callback;
pub mod registry;

pub use callback::Callback;
pub use registry::{Delivery, Forward, Subscription, SubscriptionId, SubscriptionInfo, SubscriptionRegistry};
