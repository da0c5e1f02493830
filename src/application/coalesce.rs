//! Single-flight deduplication of external price lookups.
//!
//! The first caller for a key spawns the lookup on the runtime; later callers
//! for the same key attach to the same shared future. Because the lookup is a
//! spawned task, callers that give up do not cancel it.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, warn};

use crate::domain::PriceKey;
use crate::error::FetchError;

type FlightFuture<T> = Shared<BoxFuture<'static, Result<T, FetchError>>>;

struct Flight<T: Clone> {
    id: u64,
    future: FlightFuture<T>,
}

type FlightMap<T> = DashMap<PriceKey, Flight<T>>;

/// Frees a key's slot when its flight ends, including by panic.
struct SlotRelease<T: Clone> {
    flights: Arc<FlightMap<T>>,
    key: PriceKey,
    id: u64,
}

impl<T: Clone> Drop for SlotRelease<T> {
    fn drop(&mut self) {
        self.flights.remove_if(&self.key, |_, flight| flight.id == self.id);
    }
}

/// At most one outstanding lookup per key.
pub struct RequestCoalescer<T: Clone> {
    flights: Arc<FlightMap<T>>,
    next_id: AtomicU64,
}

impl<T> Default for RequestCoalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RequestCoalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            flights: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Await the in-flight lookup for `key`, starting one with `fetch` if none exists.
    ///
    /// Every caller attached to one flight receives the same result.
    ///
    /// # Errors
    /// Returns the flight's `FetchError`, or `Aborted` if the lookup panicked.
    pub async fn run<F, Fut>(&self, key: &PriceKey, fetch: F) -> Result<T, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let future = match self.flights.entry(key.clone()) {
            Entry::Occupied(flight) => {
                debug!(item = %key, "Joining in-flight lookup");
                flight.get().future.clone()
            }
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let release = SlotRelease {
                    flights: Arc::clone(&self.flights),
                    key: key.clone(),
                    id,
                };
                let lookup = fetch();
                let handle = tokio::spawn(async move {
                    let _release = release;
                    lookup.await
                });
                let item = key.clone();
                let future = async move {
                    handle.await.unwrap_or_else(|e| {
                        warn!(item = %item, error = %e, "Price lookup task failed");
                        Err(FetchError::Aborted(e.to_string()))
                    })
                }
                .boxed()
                .shared();
                slot.insert(Flight {
                    id,
                    future: future.clone(),
                });
                future
            }
        };
        future.await
    }

    /// Number of keys with a lookup in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Exterior;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn key(name: &str) -> PriceKey {
        PriceKey::new(name, Exterior::FieldTested, false, 730)
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_lookup() {
        let coalescer = Arc::new(RequestCoalescer::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let waiters: Vec<_> = (0..16)
            .map(|_| {
                let coalescer = Arc::clone(&coalescer);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    coalescer
                        .run(&key("AK-47 | Redline"), move || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(42)
                        })
                        .await
                })
            })
            .collect();

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[tokio::test]
    async fn failure_is_shared_then_cleared() {
        let coalescer = RequestCoalescer::<u32>::new();
        let failed = coalescer
            .run(&key("A"), || async {
                Err(FetchError::Upstream("503".to_string()))
            })
            .await;
        assert_eq!(failed, Err(FetchError::Upstream("503".to_string())));
        assert_eq!(coalescer.in_flight(), 0);

        let retried = coalescer.run(&key("A"), || async { Ok(7) }).await;
        assert_eq!(retried, Ok(7));
    }

    #[tokio::test]
    async fn different_keys_do_not_coalesce() {
        let coalescer = RequestCoalescer::<u32>::new();
        let (ka, kb) = (key("A"), key("B"));
        let (a, b) = tokio::join!(
            coalescer.run(&ka, || async { Ok(1) }),
            coalescer.run(&kb, || async { Ok(2) }),
        );
        assert_eq!((a, b), (Ok(1), Ok(2)));
    }

    #[tokio::test]
    async fn abandoned_caller_does_not_cancel_lookup() {
        let coalescer = Arc::new(RequestCoalescer::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let first = {
            let coalescer = Arc::clone(&coalescer);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                coalescer
                    .run(&key("A"), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(9)
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        first.abort();

        let joined = coalescer.run(&key("A"), || async { Ok(0) }).await;
        assert_eq!(joined, Ok(9));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_lookup_surfaces_as_aborted() {
        let coalescer = RequestCoalescer::<u32>::new();
        async fn explode() -> Result<u32, FetchError> {
            panic!("scraper exploded")
        }

        let result = coalescer.run(&key("A"), explode).await;
        assert!(matches!(result, Err(FetchError::Aborted(_))));
        assert_eq!(coalescer.in_flight(), 0);
    }
}
