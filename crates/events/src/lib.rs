//! Trainhub progress event bus.
//!
//! - [`ProgressBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`ProgressEvent`]: the "progress changed" notification envelope.
//! - [`Subscription`]: one subscriber's receiving end; dropping it
//!   unsubscribes.

pub mod bus;

pub use bus::{Delivery, ProgressBus, ProgressEvent, Subscription};
