//! recs4m-core – reservation scheduling and timed stream capture.
//!
//! The crate is split along the capture pipeline:
//!
//! - [`reservation`] – the stored scheduling rule and its field helpers.
//! - [`occurrence`] – computes the next instant a reservation fires.
//! - [`dedup`] – the in-flight capture set keyed by reservation id.
//! - [`store`] – reservation store and activity log traits plus the SQLite
//!   and in-memory implementations.
//! - [`source`] / [`publisher`] – the audio endpoint and the external
//!   publishing step.
//! - [`capture`] – one timed capture of one occurrence.
//! - [`scheduler`] – the periodic scan that spawns captures.

pub mod capture;
pub mod clock;
pub mod dedup;
pub mod error;
pub mod occurrence;
pub mod publisher;
pub mod reservation;
pub mod scheduler;
pub mod source;
pub mod store;

#[cfg(test)]
mod testing;

pub use capture::{CaptureContext, CaptureOutcome, CaptureSettings, CaptureTask};
pub use clock::{Clock, SystemClock};
pub use dedup::{CaptureTracker, MarkGuard};
pub use error::{CaptureError, StoreError};
pub use occurrence::next_occurrence;
pub use publisher::{PublishOutput, Publisher, ScriptPublisher};
pub use reservation::{LogEntry, Reservation};
pub use scheduler::{Scheduler, SchedulerHandle, SchedulerSettings, TickReport};
pub use source::{AudioSource, ByteStream, HttpAudioSource};
pub use store::{ActivityLog, ReservationStore};
