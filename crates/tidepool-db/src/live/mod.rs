//! Live queries
//!
//! [`QueryEngine::subscribe`] turns a [`Query`](tidepool_core::Query) into a
//! [`Subscription`] that re-fetches when the store reports a change to the
//! query's entity and pushes each new snapshot to the consumer, as far as
//! the consumer's demand allows.

mod demand;
mod engine;
mod subscription;

pub use demand::{Demand, UNLIMITED};
pub use engine::QueryEngine;
pub use subscription::{Subscription, SubscriptionState};
