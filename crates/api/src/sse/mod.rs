//! Server-Sent Events status streaming.
//!
//! [`status_stream`] upgrades a request to `text/event-stream`; a spawned
//! [`relay`] task per connection turns progress-bus notifications into
//! [`StreamFrame`]s until the job ends or the client goes away.

mod handler;
pub mod relay;

pub use handler::status_stream;
pub use relay::{relay, StreamFrame};
