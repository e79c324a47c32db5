// Copyright 2025 Cowboy AI, LLC.

//! Domain events: records, subscribers and the commit-gated bus

mod bus;
mod record;
mod subscriber;

pub use bus::{DispatchReport, EventBus, Subscription, SubscriptionId};
pub use record::{EmitOptions, EventMetadata, EventRecord};
pub use subscriber::{FnSubscriber, Subscriber};
