//! Single-flight memoized async initialization keyed by resource.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

/// Runs at most one initializer per key at a time and memoizes its success.
///
/// Concurrent callers for the same key wait on the in-flight initializer and
/// share its value. A failed initialization is not cached; the next caller
/// retries.
pub struct SingleFlight<K, V> {
    cells: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_try_init<F, Fut, E>(&self, key: K, init: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = {
            let mut cells = self.cells.lock().unwrap_or_else(|p| p.into_inner());
            Arc::clone(cells.entry(key).or_default())
        };
        cell.get_or_try_init(init).await.cloned()
    }

    /// Returns the memoized value for `key`, if initialization has completed.
    pub fn get(&self, key: &K) -> Option<V> {
        let cells = self.cells.lock().unwrap_or_else(|p| p.into_inner());
        cells.get(key).and_then(|cell| cell.get().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_initialization() {
        let flight: Arc<SingleFlight<&'static str, u32>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flight = Arc::clone(&flight);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                flight
                    .get_or_try_init("extractor", || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, String>(42)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flight.get(&"extractor"), Some(42));
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let flight: SingleFlight<u8, u8> = SingleFlight::new();

        let first = flight
            .get_or_try_init(1, || async { Err::<u8, _>("offline") })
            .await;
        assert_eq!(assert_err!(first), "offline");
        assert_eq!(flight.get(&1), None);

        let second = flight.get_or_try_init(1, || async { Ok::<_, &str>(7) }).await;
        assert_eq!(assert_ok!(second), 7);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let flight: SingleFlight<u8, u8> = SingleFlight::new();
        let a = flight.get_or_try_init(1, || async { Ok::<_, ()>(10) }).await;
        let b = flight.get_or_try_init(2, || async { Ok::<_, ()>(20) }).await;
        assert_eq!((a, b), (Ok(10), Ok(20)));
    }
}
