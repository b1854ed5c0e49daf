use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per stream key, created on demand. Start, done and orphan
/// handling for a key all go through here, so they are linearized per key
/// and free to run in parallel across keys.
#[derive(Default)]
pub struct StreamLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl StreamLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, stream_key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            // Entries only referenced by the map have no holder or waiter.
            map.retain(|key, lock| key == stream_key || Arc::strong_count(lock) > 1);
            map.entry(stream_key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}
