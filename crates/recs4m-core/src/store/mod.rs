//! Persistence layer.
//!
//! [`ReservationStore`] and [`ActivityLog`] define what the scheduler needs
//! from storage. The default implementation is [`sqlite::SqliteStore`];
//! [`memory::MemoryStore`] keeps everything in process and is what the unit
//! tests run against.
//!
//! All trait methods use `impl Future` in their signatures so no extra
//! `async-trait` crate is required.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::future::Future;

use crate::error::StoreError;
use crate::reservation::{LogEntry, Reservation};

pub trait ReservationStore: Send + Sync + 'static {
    /// Point-in-time listing of every reservation. One malformed record fails
    /// the whole listing.
    fn list_reservations(&self) -> impl Future<Output = Result<Vec<Reservation>, StoreError>> + Send;

    fn get_reservation(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<Reservation>, StoreError>> + Send;

    /// Insert or replace by `id`.
    fn put_reservation(
        &self,
        reservation: Reservation,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove by `id`; removing an absent id is not an error.
    fn delete_reservation(&self, id: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove every id in `ids` as one write.
    fn delete_reservations(&self, ids: &[String]) -> impl Future<Output = Result<(), StoreError>> + Send;
}

pub trait ActivityLog: Send + Sync + 'static {
    fn append_log(&self, entry: LogEntry) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Every entry, newest first.
    fn list_logs(&self) -> impl Future<Output = Result<Vec<LogEntry>, StoreError>> + Send;
}
