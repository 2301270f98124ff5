//! Live settings holder and change signal
//!
//! [`LiveSettings`] publishes immutable [`ResolvedSettings`] snapshots. Each
//! published snapshot carries a [`ChangeSignal`] that fires exactly once, when
//! the snapshot is replaced. Readers never block; a single writer swaps.

use crate::contract::{ResolvedSettings, SettingsGroup};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

type Callback = Box<dyn FnOnce() + Send>;

struct SignalState {
    generation: u64,
    token: CancellationToken,
    /// `None` once fired
    callbacks: Mutex<Option<Vec<Callback>>>,
}

/// One-shot notification that a settings snapshot was replaced.
#[derive(Clone)]
pub struct ChangeSignal {
    inner: Arc<SignalState>,
}

impl ChangeSignal {
    pub(crate) fn new(generation: u64) -> Self {
        Self {
            inner: Arc::new(SignalState {
                generation,
                token: CancellationToken::new(),
                callbacks: Mutex::new(Some(Vec::new())),
            }),
        }
    }

    /// Generation of the snapshot this signal belongs to.
    pub fn generation(&self) -> u64 {
        self.inner.generation
    }

    pub fn has_changed(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Run `callback` once the snapshot is replaced; immediately if it already was.
    pub fn on_change(&self, callback: impl FnOnce() + Send + 'static) {
        let mut callbacks = self.inner.callbacks.lock();
        match callbacks.as_mut() {
            Some(pending) => pending.push(Box::new(callback)),
            None => {
                drop(callbacks);
                callback();
            }
        }
    }

    /// Resolves once the snapshot is replaced.
    pub async fn changed(&self) {
        self.inner.token.cancelled().await;
    }

    /// Fire the signal. Returns `false` if it had already fired.
    pub(crate) fn fire(&self) -> bool {
        let pending = {
            let mut callbacks = self.inner.callbacks.lock();
            let Some(pending) = callbacks.take() else {
                return false;
            };
            // flag flips before any callback can observe the fired state
            self.inner.token.cancel();
            pending
        };
        for callback in pending {
            callback();
        }
        true
    }
}

impl fmt::Debug for ChangeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSignal")
            .field("generation", &self.inner.generation)
            .field("changed", &self.has_changed())
            .finish()
    }
}

/// A published snapshot together with the signal that fires when it is replaced.
pub struct Generation<S: SettingsGroup> {
    settings: Arc<ResolvedSettings<S>>,
    signal: ChangeSignal,
}

impl<S: SettingsGroup> Generation<S> {
    pub fn settings(&self) -> &Arc<ResolvedSettings<S>> {
        &self.settings
    }

    pub fn signal(&self) -> &ChangeSignal {
        &self.signal
    }

    pub fn generation(&self) -> u64 {
        self.signal.generation()
    }
}

/// Holder of the current settings snapshot.
pub struct LiveSettings<S: SettingsGroup> {
    current: ArcSwap<Generation<S>>,
    writer: Mutex<()>,
}

impl<S: SettingsGroup> LiveSettings<S> {
    pub fn new(initial: impl Into<Arc<ResolvedSettings<S>>>) -> Self {
        Self {
            current: ArcSwap::from_pointee(Generation {
                settings: initial.into(),
                signal: ChangeSignal::new(0),
            }),
            writer: Mutex::new(()),
        }
    }

    pub fn current(&self) -> Arc<ResolvedSettings<S>> {
        Arc::clone(&self.current.load().settings)
    }

    /// Signal of the current snapshot.
    pub fn signal(&self) -> ChangeSignal {
        self.current.load().signal.clone()
    }

    /// Snapshot and signal read together.
    pub fn snapshot(&self) -> Arc<Generation<S>> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation()
    }

    /// Publish `settings`, then fire the previous snapshot's signal.
    pub fn update(&self, settings: impl Into<Arc<ResolvedSettings<S>>>) -> u64 {
        let _writer = self.writer.lock();
        self.publish(settings.into())
    }

    /// Publish `settings` unless the current snapshot was built from the same commit.
    pub fn update_if_changed(&self, settings: impl Into<Arc<ResolvedSettings<S>>>) -> Option<u64> {
        let settings = settings.into();
        let _writer = self.writer.lock();
        if self.current.load().settings.commit() == settings.commit() {
            debug!(commit = settings.commit(), "Settings unchanged; keeping current snapshot");
            return None;
        }
        Some(self.publish(settings))
    }

    /// Publish `settings` only while `expected` is still the current generation.
    ///
    /// For snapshots fetched without holding the writer lock: if anything was
    /// published since `expected` was read, the fetched snapshot may be older and
    /// is discarded. Snapshots from the same commit are skipped as well.
    pub fn update_if_generation(
        &self,
        expected: u64,
        settings: impl Into<Arc<ResolvedSettings<S>>>,
    ) -> Option<u64> {
        let settings = settings.into();
        let _writer = self.writer.lock();
        {
            let current = self.current.load();
            if current.generation() != expected {
                debug!(
                    expected,
                    current = current.generation(),
                    commit = settings.commit(),
                    "Discarding settings fetched before a newer snapshot was published"
                );
                return None;
            }
            if current.settings.commit() == settings.commit() {
                debug!(commit = settings.commit(), "Settings unchanged; keeping current snapshot");
                return None;
            }
        }
        Some(self.publish(settings))
    }

    /// Caller holds the writer lock.
    fn publish(&self, settings: Arc<ResolvedSettings<S>>) -> u64 {
        let generation = self.current.load().generation() + 1;
        let commit = settings.commit().to_string();
        let previous = self.current.swap(Arc::new(Generation {
            settings,
            signal: ChangeSignal::new(generation),
        }));
        previous.signal.fire();
        debug!(generation, commit = %commit, "Published settings snapshot");
        generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Coordinate;
    use crate::domain::{GroupBuilder, Setting, SettingsFactory};
    use std::sync::atomic::{AtomicUsize, Ordering};

    crate::dimension! {
        enum Tier { Local }
    }

    crate::dimension! {
        enum DataCenter { Local }
    }

    #[derive(Default)]
    struct Counter {
        value: i32,
    }

    impl SettingsGroup for Counter {
        type Tier = Tier;
        type DataCenter = DataCenter;

        fn describe(group: &mut GroupBuilder<Self>) {
            group.setting("Value", |c| &mut c.value, Setting::new(1));
        }
    }

    fn resolved(factory: &SettingsFactory<Counter>, commit: &str) -> ResolvedSettings<Counter> {
        factory
            .materialize(&Coordinate::new("Tests", Tier::Local, DataCenter::Local), commit, &[])
            .unwrap()
    }

    #[test]
    fn test_signal_fires_once() {
        let signal = ChangeSignal::new(0);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        signal.on_change(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!signal.has_changed());
        assert!(signal.fire());
        assert!(!signal.fire());
        assert!(signal.has_changed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_late_subscriber_runs_immediately() {
        let signal = ChangeSignal::new(3);
        signal.fire();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        signal.on_change(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(signal.generation(), 3);
    }

    #[test]
    fn test_callback_sees_fired_state() {
        let signal = ChangeSignal::new(0);
        let observed = Arc::new(Mutex::new(None));
        let (seen, fired) = (Arc::clone(&observed), signal.clone());
        signal.on_change(move || {
            *seen.lock() = Some(fired.has_changed());
        });
        signal.fire();
        assert_eq!(*observed.lock(), Some(true));
    }

    #[tokio::test]
    async fn test_changed_resolves_after_fire() {
        let signal = ChangeSignal::new(0);
        let waiter = signal.clone();
        let task = tokio::spawn(async move { waiter.changed().await });
        signal.fire();
        tokio::time::timeout(std::time::Duration::from_secs(1), task)
            .await
            .expect("signal resolves")
            .expect("task completes");
    }

    #[test]
    fn test_captured_signals_fire_exactly_once_per_update() {
        let factory = SettingsFactory::<Counter>::new().unwrap();
        let live = LiveSettings::new(resolved(&factory, "c0"));
        let calls = Arc::new(AtomicUsize::new(0));
        let captured: Vec<ChangeSignal> = (0..8).map(|_| live.signal()).collect();
        for signal in &captured {
            let counter = Arc::clone(&calls);
            signal.on_change(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(live.update(resolved(&factory, "c1")), 1);
        assert_eq!(calls.load(Ordering::SeqCst), captured.len());
        assert!(captured.iter().all(|s| s.has_changed() && s.generation() == 0));

        let fresh = live.signal();
        assert!(!fresh.has_changed());
        assert_eq!(fresh.generation(), 1);

        live.update(resolved(&factory, "c2"));
        assert_eq!(calls.load(Ordering::SeqCst), captured.len());
        assert!(fresh.has_changed());
        assert!(!live.signal().has_changed());
    }

    #[test]
    fn test_concurrent_updates_fire_each_signal_once() {
        let factory = SettingsFactory::<Counter>::new().unwrap();
        let live = LiveSettings::new(resolved(&factory, "c0"));
        let initial = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&initial);
        live.signal().on_change(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        std::thread::scope(|scope| {
            for writer in 0..4 {
                let (live, factory) = (&live, &factory);
                scope.spawn(move || {
                    for i in 0..25 {
                        live.update(resolved(factory, &format!("w{writer}-{i}")));
                    }
                });
            }
        });

        assert_eq!(initial.load(Ordering::SeqCst), 1);
        assert_eq!(live.generation(), 100);
        assert!(!live.signal().has_changed());
    }

    #[test]
    fn test_update_if_generation_discards_stale_snapshot() {
        let factory = SettingsFactory::<Counter>::new().unwrap();
        let live = LiveSettings::new(resolved(&factory, "c0"));
        let expected = live.generation();
        let before = live.signal();

        assert_eq!(live.update(resolved(&factory, "c2")), 1);
        assert_eq!(live.update_if_generation(expected, resolved(&factory, "c1")), None);
        assert_eq!(live.current().commit(), "c2");
        assert!(before.has_changed());
        assert!(!live.signal().has_changed());

        assert_eq!(live.update_if_generation(1, resolved(&factory, "c2")), None);
        assert_eq!(live.update_if_generation(1, resolved(&factory, "c3")), Some(2));
        assert_eq!(live.current().commit(), "c3");
    }
}
