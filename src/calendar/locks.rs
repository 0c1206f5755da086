use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

type LockKey = (String, String);

/// One async mutex per (owner, calendar). Runs for the same pair queue up
/// behind each other; different pairs never contend.
#[derive(Debug, Default)]
pub struct SyncLocks {
    locks: Mutex<HashMap<LockKey, Arc<Mutex<()>>>>,
}

impl SyncLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock_for(&self, owner_id: &str, calendar_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry((owner_id.to_string(), calendar_id.to_string()))
            .or_default()
            .clone()
    }

    /// Forget the pair's mutex once no run holds or waits on it. Callers
    /// drop their own handle first.
    pub async fn release(&self, owner_id: &str, calendar_id: &str) {
        let mut locks = self.locks.lock().await;
        let key = (owner_id.to_string(), calendar_id.to_string());
        if locks.get(&key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&key);
        }
    }

    #[cfg(test)]
    pub(crate) async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}
