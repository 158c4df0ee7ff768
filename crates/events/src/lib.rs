//! Job lifecycle notifications.
//!
//! - [`JobEvent`]: the message pushed to clients on each lifecycle step.
//! - [`Notifier`]: the fire-and-forget publishing seam the pipeline uses.
//! - [`NotificationHub`]: in-process fan-out to per-owner subscribers plus
//!   a firehose of every event.

pub mod event;
pub mod hub;

pub use event::{Envelope, JobEvent};
pub use hub::NotificationHub;

use lipsync_core::types::OwnerId;

/// Publishes job events to whoever is listening for an owner.
///
/// Delivery is best-effort. Implementations must not block and must not
/// fail the caller when nobody is listening.
pub trait Notifier: Send + Sync {
    fn publish(&self, owner_id: OwnerId, event: JobEvent);
}
