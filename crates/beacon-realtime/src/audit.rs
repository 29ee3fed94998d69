//! Best-effort lifecycle event log.

use std::sync::Arc;

use beacon_core::result::AppResult;
use beacon_database::stores::EventStore;
use beacon_entity::event::{CreateEvent, Event};

/// Appends lifecycle events without ever blocking the caller.
///
/// The log is an audit trail, not a ledger: appends run on their own
/// task, failures are logged and swallowed, and no client-visible
/// operation waits on one.
#[derive(Debug, Clone)]
pub struct EventLogger {
    /// Append-only event rows.
    store: Arc<dyn EventStore>,
}

impl EventLogger {
    /// Creates a logger.
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Appends an event in the background.
    pub fn log(&self, event: CreateEvent) {
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.append(&event).await {
                tracing::warn!(
                    event_type = %event.event_type,
                    "Failed to append event log entry: {e}"
                );
            }
        });
    }

    /// Most recent entries, newest first. For incident diagnosis.
    pub async fn recent(&self, limit: i64) -> AppResult<Vec<Event>> {
        self.store.recent(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Debug, Default)]
    struct RecordingStore {
        appended: Mutex<Vec<CreateEvent>>,
    }

    fn materialize(data: &CreateEvent) -> Event {
        Event {
            id: Uuid::new_v4(),
            event_type: data.event_type.clone(),
            connection_id: data.connection_id,
            user_id: data.user_id,
            room_id: data.room_id,
            payload: data.payload.clone(),
            remote_addr: data.remote_addr.clone(),
            created_at: Utc::now(),
        }
    }

    #[async_trait]
    impl EventStore for RecordingStore {
        async fn append(&self, data: &CreateEvent) -> AppResult<Event> {
            self.appended.lock().unwrap().push(data.clone());
            Ok(materialize(data))
        }

        async fn recent(&self, limit: i64) -> AppResult<Vec<Event>> {
            let appended = self.appended.lock().unwrap();
            Ok(appended
                .iter()
                .rev()
                .take(limit.max(0) as usize)
                .map(materialize)
                .collect())
        }
    }

    #[tokio::test]
    async fn log_appends_on_a_background_task() {
        let store = Arc::new(RecordingStore::default());
        let logger = EventLogger::new(store.clone());

        logger.log(CreateEvent::named("connection.opened").user(Uuid::new_v4()));

        for _ in 0..10 {
            tokio::task::yield_now().await;
            if !store.appended.lock().unwrap().is_empty() {
                break;
            }
        }
        let appended = store.appended.lock().unwrap();
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].event_type, "connection.opened");
    }

    #[tokio::test]
    async fn recent_reads_back_newest_first() {
        let store = Arc::new(RecordingStore::default());
        let logger = EventLogger::new(store.clone());

        logger.log(CreateEvent::named("connection.opened"));
        logger.log(CreateEvent::named("connection.closed"));
        for _ in 0..10 {
            tokio::task::yield_now().await;
            if store.appended.lock().unwrap().len() == 2 {
                break;
            }
        }

        let last = store
            .appended
            .lock()
            .unwrap()
            .last()
            .map(|data| data.event_type.clone())
            .unwrap();
        let recent = logger.recent(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].event_type, last);
    }
}
