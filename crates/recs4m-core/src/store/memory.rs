use std::collections::BTreeMap;

use tokio::sync::RwLock;

use super::{ActivityLog, ReservationStore};
use crate::error::StoreError;
use crate::reservation::{LogEntry, Reservation};

/// Process-local store. Reservations are keyed by id; log entries are kept
/// in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    reservations: RwLock<BTreeMap<String, Reservation>>,
    logs: RwLock<Vec<LogEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReservationStore for MemoryStore {
    async fn list_reservations(&self) -> Result<Vec<Reservation>, StoreError> {
        Ok(self.reservations.read().await.values().cloned().collect())
    }

    async fn get_reservation(&self, id: &str) -> Result<Option<Reservation>, StoreError> {
        Ok(self.reservations.read().await.get(id).cloned())
    }

    async fn put_reservation(&self, reservation: Reservation) -> Result<(), StoreError> {
        self.reservations.write().await.insert(reservation.id.clone(), reservation);
        Ok(())
    }

    async fn delete_reservation(&self, id: &str) -> Result<(), StoreError> {
        self.reservations.write().await.remove(id);
        Ok(())
    }

    async fn delete_reservations(&self, ids: &[String]) -> Result<(), StoreError> {
        let mut reservations = self.reservations.write().await;
        for id in ids {
            reservations.remove(id);
        }
        Ok(())
    }
}

impl ActivityLog for MemoryStore {
    async fn append_log(&self, entry: LogEntry) -> Result<(), StoreError> {
        self.logs.write().await.push(entry);
        Ok(())
    }

    async fn list_logs(&self) -> Result<Vec<LogEntry>, StoreError> {
        let mut logs = self.logs.read().await.clone();
        // Stable sort keeps later appends first among equal timestamps.
        logs.reverse();
        logs.sort_by(|a, b| b.logged_at.cmp(&a.logged_at));
        Ok(logs)
    }
}
