//! Cleanup of expired inline chats
//!
//! Inline chats hold a lease that every submission renews. A chat whose
//! lease has run out was abandoned by its widget (closed without a
//! successful delete, or never closed); the reaper removes it together with
//! its messages and votes.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::storage::Store;

/// Delete every ephemeral chat whose lease expired before now
///
/// # Returns
///
/// Returns the number of chats removed
///
/// # Errors
///
/// Returns error if the store cannot be queried
pub fn run_once(store: &dyn Store) -> Result<usize> {
    let removed = store.delete_expired_ephemeral(Utc::now())?;
    if removed > 0 {
        tracing::info!("Reaped {} expired inline chats", removed);
        counter!("reaped_chats_total", removed as u64);
    }
    Ok(removed)
}

/// Run the reaper on a fixed interval until cancelled
///
/// The first pass runs immediately. Failed passes are logged and retried on
/// the next tick.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// use quire::reaper;
/// use quire::storage::SqliteStorage;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let store = Arc::new(SqliteStorage::new_with_path("quire.db")?);
///     let token = CancellationToken::new();
///     let handle = reaper::spawn(store, Duration::from_secs(300), token.clone());
///     token.cancel();
///     handle.await?;
///     Ok(())
/// }
/// ```
pub fn spawn(
    store: Arc<dyn Store>,
    every: Duration,
    cancellation: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = cancellation.cancelled() => {
                    tracing::debug!("Reaper stopped");
                    break;
                }

                _ = ticker.tick() => {
                    if let Err(e) = run_once(store.as_ref()) {
                        tracing::warn!("Reaper pass failed: {:#}", e);
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Chat, MockStore, SqliteStorage};
    use chrono::Duration as ChronoDuration;
    use tempfile::TempDir;

    fn chat(id: &str, user: &str, lease: Option<chrono::DateTime<Utc>>) -> Chat {
        Chat {
            id: id.into(),
            user_id: user.into(),
            title: id.into(),
            created_at: Utc::now(),
            ephemeral: lease.is_some(),
            lease_expires_at: lease,
        }
    }

    #[test]
    fn test_run_once_removes_only_expired_inline_chats() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStorage::new_with_path(dir.path().join("quire.db")).unwrap();
        let user = store.create_user("ada@example.com").unwrap();
        let now = Utc::now();

        store
            .save_chat(&chat("expired", &user.id, Some(now - ChronoDuration::seconds(5))))
            .unwrap();
        store
            .save_chat(&chat("live", &user.id, Some(now + ChronoDuration::minutes(10))))
            .unwrap();
        store.save_chat(&chat("durable", &user.id, None)).unwrap();

        assert_eq!(run_once(&store).unwrap(), 1);
        assert!(store.get_chat("expired").unwrap().is_none());
        assert!(store.get_chat("live").unwrap().is_some());
        assert!(store.get_chat("durable").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_spawn_stops_on_cancel() {
        let mut store = MockStore::new();
        store.expect_delete_expired_ephemeral().returning(|_| Ok(0));

        let token = CancellationToken::new();
        let handle = spawn(Arc::new(store), Duration::from_millis(10), token.clone());
        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();
        handle.await.unwrap();
    }

    #[test]
    fn test_run_once_propagates_store_error() {
        let mut store = MockStore::new();
        store
            .expect_delete_expired_ephemeral()
            .returning(|_| Err(anyhow::anyhow!("locked")));
        assert!(run_once(&store).is_err());
    }
}
