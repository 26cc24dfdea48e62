use crate::quote::client::MarketDataSource;
use crate::quote::error::{FailureKind, MarketDataError};
use crate::quote::response::AssetRecord;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum FetchState {
    Idle,
    Loading,
    Success(Vec<AssetRecord>),
    Failure {
        kind: FailureKind,
        message: String,
        /// Records of the last successful fetch, if there was one.
        stale_records: Option<Vec<AssetRecord>>,
    },
}

#[derive(Debug, Default)]
struct Tracker {
    ids: Option<Vec<String>>,
    generation: u64,
    last_good: Option<Vec<AssetRecord>>,
}

struct StoreInner {
    source: Arc<dyn MarketDataSource>,
    tracker: Mutex<Tracker>,
    state_tx: watch::Sender<FetchState>,
}

/// Refresh engine for the watchlist.
///
/// Every `set_identifiers` change and every `reload` starts a new fetch
/// generation. A fetch only commits if its generation is still the current
/// one when it resolves; late arrivals from superseded generations are
/// dropped without touching state or notifying subscribers.
///
/// Fetches run on spawned tasks, so the store must be driven from inside a
/// tokio runtime.
#[derive(Clone)]
pub struct MarketDataStore {
    inner: Arc<StoreInner>,
}

impl MarketDataStore {
    pub fn new(source: Arc<dyn MarketDataSource>) -> Self {
        let (state_tx, _) = watch::channel(FetchState::Idle);
        Self {
            inner: Arc::new(StoreInner {
                source,
                tracker: Mutex::new(Tracker::default()),
                state_tx,
            }),
        }
    }

    /// Returns `false` when `ids` equals the tracked set and no fetch was started.
    pub fn set_identifiers(&self, ids: Vec<String>) -> bool {
        let mut tracker = self.inner.lock_tracker();
        if tracker.ids.as_ref() == Some(&ids) {
            debug!("Identifier set unchanged, skipping refetch");
            return false;
        }

        tracker.ids = Some(ids);
        self.start_cycle(&mut tracker);
        true
    }

    /// Refetches the current identifier set unconditionally.
    pub fn reload(&self) {
        let mut tracker = self.inner.lock_tracker();
        self.start_cycle(&mut tracker);
    }

    pub fn current_state(&self) -> FetchState {
        self.inner.state_tx.borrow().clone()
    }

    /// Receivers are only woken by transitions of the current generation.
    pub fn subscribe(&self) -> watch::Receiver<FetchState> {
        self.inner.state_tx.subscribe()
    }

    pub fn identifiers(&self) -> Vec<String> {
        self.inner.lock_tracker().ids.clone().unwrap_or_default()
    }

    fn start_cycle(&self, tracker: &mut Tracker) {
        tracker.generation += 1;
        let generation = tracker.generation;
        let ids = tracker.ids.clone().unwrap_or_default();
        debug!(generation, count = ids.len(), "Starting fetch cycle");

        self.inner.state_tx.send_replace(FetchState::Loading);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let result = inner.source.fetch_market_data(&ids).await;
            inner.commit(generation, result);
        });
    }
}

impl StoreInner {
    fn lock_tracker(&self) -> MutexGuard<'_, Tracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn commit(&self, generation: u64, result: Result<Vec<AssetRecord>, MarketDataError>) {
        let mut tracker = self.lock_tracker();
        if generation != tracker.generation {
            debug!(
                generation,
                current = tracker.generation,
                "Discarding result of superseded fetch"
            );
            return;
        }

        let next = match result {
            Ok(records) => {
                debug!(generation, count = records.len(), "Fetch succeeded");
                tracker.last_good = Some(records.clone());
                FetchState::Success(records)
            }
            Err(err) => {
                warn!(generation, "Market fetch failed: {}", err);
                FetchState::Failure {
                    kind: err.kind(),
                    message: err.user_message(),
                    stale_records: tracker.last_good.clone(),
                }
            }
        };

        self.state_tx.send_replace(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bigdecimal::BigDecimal;
    use crate::quote::response::AssetIcon;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    type Reply = (Duration, Result<Vec<AssetRecord>, MarketDataError>);
    type Script = Box<dyn Fn(usize, &[String]) -> Reply + Send + Sync>;

    /// Answers call `n` with whatever the script returns, after the scripted latency.
    struct ScriptedSource {
        calls: AtomicUsize,
        script: Script,
    }

    impl ScriptedSource {
        fn new<F>(script: F) -> Arc<Self>
        where
            F: Fn(usize, &[String]) -> Reply + Send + Sync + 'static,
        {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                script: Box::new(script),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MarketDataSource for ScriptedSource {
        async fn fetch_market_data(
            &self,
            ids: &[String],
        ) -> Result<Vec<AssetRecord>, MarketDataError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let (latency, result) = (self.script)(call, ids);
            sleep(latency).await;
            result
        }
    }

    fn record(id: &str) -> AssetRecord {
        AssetRecord {
            id: id.to_string(),
            display_name: id.to_uppercase(),
            symbol: id.to_uppercase(),
            price_usd: BigDecimal::from(42),
            change_24h_pct: 0.0,
            icon: AssetIcon::NoImage,
        }
    }

    fn echo_ids(ids: &[String]) -> Vec<AssetRecord> {
        ids.iter().map(|id| record(id)).collect()
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    async fn settled(store: &MarketDataStore) -> FetchState {
        let mut rx = store.subscribe();
        loop {
            let state = rx.borrow_and_update().clone();
            if matches!(state, FetchState::Success(_) | FetchState::Failure { .. }) {
                return state;
            }
            rx.changed().await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_idle_then_loads_and_succeeds() {
        let source = ScriptedSource::new(|_, ids| (Duration::from_millis(10), Ok(echo_ids(ids))));
        let store = MarketDataStore::new(source.clone());
        assert_eq!(FetchState::Idle, store.current_state());

        assert!(store.set_identifiers(ids(&["a", "b"])));
        assert_eq!(FetchState::Loading, store.current_state());

        assert_eq!(
            FetchState::Success(vec![record("a"), record("b")]),
            settled(&store).await
        );
        assert_eq!(1, source.calls());
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_identifiers_do_not_refetch() {
        let source = ScriptedSource::new(|_, ids| (Duration::ZERO, Ok(echo_ids(ids))));
        let store = MarketDataStore::new(source.clone());

        assert!(store.set_identifiers(ids(&["a"])));
        settled(&store).await;
        assert!(!store.set_identifiers(ids(&["a"])));
        sleep(Duration::from_millis(50)).await;

        assert_eq!(1, source.calls());
        assert_eq!(FetchState::Success(vec![record("a")]), store.current_state());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_empty_set_still_fetches() {
        let source = ScriptedSource::new(|_, ids| (Duration::ZERO, Ok(echo_ids(ids))));
        let store = MarketDataStore::new(source.clone());

        assert!(store.set_identifiers(Vec::new()));
        assert_eq!(FetchState::Success(Vec::new()), settled(&store).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_stale_records() {
        let source = ScriptedSource::new(|call, ids| {
            let result = if call == 0 {
                Ok(echo_ids(ids))
            } else {
                Err(MarketDataError::Upstream { status: 500 })
            };
            (Duration::from_millis(5), result)
        });
        let store = MarketDataStore::new(source.clone());

        store.set_identifiers(ids(&["a"]));
        let first = settled(&store).await;
        assert_eq!(FetchState::Success(vec![record("a")]), first);

        store.reload();
        assert_eq!(FetchState::Loading, store.current_state());
        match settled(&store).await {
            FetchState::Failure {
                kind,
                message,
                stale_records,
            } => {
                assert_eq!(FailureKind::Upstream { status: 500 }, kind);
                assert!(message.contains("500"));
                assert_eq!(Some(vec![record("a")]), stale_records);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(2, source.calls());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_without_prior_success_has_no_stale_records() {
        let source = ScriptedSource::new(|_, _| {
            (
                Duration::ZERO,
                Err(MarketDataError::RateLimitExceeded {
                    last_wait_hint_ms: 1000,
                }),
            )
        });
        let store = MarketDataStore::new(source);

        store.set_identifiers(ids(&["a"]));
        match settled(&store).await {
            FetchState::Failure { stale_records, .. } => assert_eq!(None, stale_records),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_result_of_superseded_fetch_is_discarded() {
        // "a" answers after "b" does
        let source = ScriptedSource::new(|_, ids| {
            let latency = if ids.first().map(String::as_str) == Some("a") {
                Duration::from_millis(200)
            } else {
                Duration::from_millis(50)
            };
            (latency, Ok(echo_ids(ids)))
        });
        let store = MarketDataStore::new(source.clone());
        let mut rx = store.subscribe();

        store.set_identifiers(ids(&["a"]));
        store.set_identifiers(ids(&["b"]));

        assert_eq!(FetchState::Success(vec![record("b")]), settled(&store).await);

        rx.borrow_and_update();
        sleep(Duration::from_millis(500)).await;

        assert_eq!(2, source.calls());
        assert_eq!(FetchState::Success(vec![record("b")]), store.current_state());
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_supersedes_in_flight_failure() {
        let source = ScriptedSource::new(|call, ids| {
            if call == 0 {
                (
                    Duration::from_millis(300),
                    Err(MarketDataError::Upstream { status: 502 }),
                )
            } else {
                (Duration::from_millis(10), Ok(echo_ids(ids)))
            }
        });
        let store = MarketDataStore::new(source.clone());

        store.set_identifiers(ids(&["a"]));
        sleep(Duration::from_millis(10)).await;
        store.reload();

        assert_eq!(FetchState::Success(vec![record("a")]), settled(&store).await);
        sleep(Duration::from_millis(500)).await;
        assert_eq!(FetchState::Success(vec![record("a")]), store.current_state());
    }

    #[tokio::test(start_paused = true)]
    async fn test_identifiers_reports_tracked_set() {
        let source = ScriptedSource::new(|_, ids| (Duration::ZERO, Ok(echo_ids(ids))));
        let store = MarketDataStore::new(source);
        assert!(store.identifiers().is_empty());

        store.set_identifiers(ids(&["x", "y"]));
        assert_eq!(ids(&["x", "y"]), store.identifiers());
    }
}
