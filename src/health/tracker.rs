//! Backend readiness tracker.
//!
//! # Responsibilities
//! - Own every registered backend and its health records
//! - Turn reported outcomes into readiness transitions and selection weights
//! - Hand out consistent snapshots to the dispatcher
//!
//! # Design Decisions
//! - One mutex per backend: writes to different backends never contend
//! - Each backend publishes an immutable view through `ArcSwap` after every
//!   write, so snapshots copy those views and never wait on a writer
//! - Latency thresholds depend on the cold-start class, not a global value

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::schema::{ClassAllowances, DispatchConfig, KindWeights, TrackerConfig};
use crate::health::record::{HealthRecord, HealthWindow};
use crate::health::state::{self, Readiness, Thresholds};
use crate::load_balancer::backend::{
    BackendId, BackendKind, BackendSpec, BackendView, ColdStartClass, InvalidAddress,
};
use crate::observability::metrics;

/// Registration misuse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    #[error("backend '{id}' is already registered as {existing}, cannot register it as {requested}")]
    Duplicate {
        id: BackendId,
        existing: BackendKind,
        requested: BackendKind,
    },
    #[error("backend '{0}' is not registered")]
    NotFound(BackendId),
    #[error(transparent)]
    InvalidAddress(#[from] InvalidAddress),
}

/// Result of announcing a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// New identifier.
    Created(BackendId),
    /// Same id, kind and address as the existing entry.
    Unchanged(BackendId),
    /// Known id announced from a new address; readiness starts over.
    Moved(BackendId),
}

impl Registration {
    pub fn id(&self) -> &BackendId {
        match self {
            Registration::Created(id) | Registration::Unchanged(id) | Registration::Moved(id) => id,
        }
    }
}

/// Tracker tuning, resolved from configuration.
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub retention: Duration,
    pub max_records: usize,
    pub ewma_alpha: f64,
    pub thresholds: Thresholds,
    pub slow_latency: Duration,
    pub cold_start_allowance: ClassAllowances,
    pub initial_latency: Duration,
    pub latency_floor: Duration,
    pub latency_ceiling: Duration,
    pub warming_weight_factor: f64,
    pub base_weights: KindWeights,
    pub auto_reset: Option<Duration>,
    pub removal_after: Option<Duration>,
    /// Let `unknown` backends take traffic at the warming weight. Set when no
    /// active probes run, so passive outcomes are the only way to `ready`.
    pub admit_unknown: bool,
}

impl TrackerSettings {
    pub fn from_config(tracker: &TrackerConfig, dispatch: &DispatchConfig) -> Self {
        Self {
            retention: Duration::from_secs(tracker.retention_secs),
            max_records: tracker.max_records,
            ewma_alpha: tracker.ewma_alpha,
            thresholds: Thresholds {
                degrade_failure_rate: tracker.degrade_failure_rate,
                min_samples: tracker.min_samples,
                eject_after_failures: tracker.eject_after_failures,
            },
            slow_latency: Duration::from_millis(tracker.slow_latency_ms),
            cold_start_allowance: tracker.cold_start_allowance_ms,
            initial_latency: Duration::from_millis(tracker.initial_latency_ms),
            latency_floor: Duration::from_millis(tracker.latency_floor_ms),
            latency_ceiling: Duration::from_millis(tracker.latency_ceiling_ms),
            warming_weight_factor: tracker.warming_weight_factor,
            base_weights: dispatch.base_weights,
            auto_reset: tracker.auto_reset_secs.map(Duration::from_secs),
            removal_after: tracker.removal_after_secs.map(Duration::from_secs),
            admit_unknown: false,
        }
    }

    /// Latency a success may take before it counts as slow.
    pub fn latency_threshold(&self, class: ColdStartClass, cold: bool) -> Duration {
        if cold {
            self.slow_latency + Duration::from_millis(self.cold_start_allowance.get(class))
        } else {
            self.slow_latency
        }
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self::from_config(&TrackerConfig::default(), &DispatchConfig::default())
    }
}

/// What a sweep did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub evicted: usize,
    pub demoted: Vec<BackendId>,
    pub reset: Vec<BackendId>,
    pub removed: Vec<BackendId>,
}

/// Immutable, ordered copy of the tracker state.
///
/// Iterating is free of locks and can be restarted any number of times.
#[derive(Debug, Clone)]
pub struct Snapshot {
    taken_at: Instant,
    backends: Arc<[BackendView]>,
    admit_unknown: bool,
}

impl Snapshot {
    pub fn iter(&self) -> std::slice::Iter<'_, BackendView> {
        self.backends.iter()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn get(&self, id: &BackendId) -> Option<&BackendView> {
        self.backends.iter().find(|b| &b.id == id)
    }

    pub fn contains(&self, id: &BackendId) -> bool {
        self.get(id).is_some()
    }

    pub fn taken_at(&self) -> Instant {
        self.taken_at
    }

    /// Backends that may receive traffic.
    pub fn eligible(&self) -> Vec<BackendView> {
        self.iter()
            .filter(|b| b.is_eligible() || (self.admit_unknown && b.readiness == Readiness::Unknown))
            .cloned()
            .collect()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a BackendView;
    type IntoIter = std::slice::Iter<'a, BackendView>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug)]
struct BackendState {
    spec: BackendSpec,
    readiness: Readiness,
    window: HealthWindow,
    ewma: Option<Duration>,
    consecutive_failures: u32,
    last_success: Option<Instant>,
    warming_since: Option<Instant>,
    ejected_at: Option<Instant>,
}

impl BackendState {
    fn new(spec: BackendSpec, settings: &TrackerSettings) -> Self {
        Self {
            spec,
            readiness: Readiness::Unknown,
            window: HealthWindow::new(settings.retention, settings.max_records),
            ewma: None,
            consecutive_failures: 0,
            last_success: None,
            warming_since: None,
            ejected_at: None,
        }
    }

    /// No success inside the current warm period.
    fn is_cold(&self, now: Instant, retention: Duration) -> bool {
        self.last_success
            .map_or(true, |t| now.saturating_duration_since(t) > retention)
    }

    fn start_over(&mut self) {
        self.readiness = Readiness::Unknown;
        self.window.clear();
        self.consecutive_failures = 0;
        self.last_success = None;
        self.warming_since = None;
        self.ejected_at = None;
    }
}

#[derive(Debug)]
struct Slot {
    state: Mutex<BackendState>,
    view: ArcSwap<BackendView>,
}

impl Slot {
    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Authoritative registry of backends and their readiness.
#[derive(Debug)]
pub struct Tracker {
    slots: DashMap<BackendId, Arc<Slot>>,
    settings: TrackerSettings,
}

impl Tracker {
    pub fn new(settings: TrackerSettings) -> Self {
        Self {
            slots: DashMap::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// Register a backend in state `unknown`.
    pub fn register(&self, spec: BackendSpec) -> Result<BackendId, TrackerError> {
        self.announce(spec).map(|r| r.id().clone())
    }

    /// Register a backend, reporting whether it was new, unchanged or moved.
    pub fn announce(&self, spec: BackendSpec) -> Result<Registration, TrackerError> {
        let now = Instant::now();
        match self.slots.entry(spec.id.clone()) {
            Entry::Occupied(entry) => {
                let slot = entry.get();
                let mut state = slot.lock();
                if state.spec.kind != spec.kind {
                    return Err(TrackerError::Duplicate {
                        id: spec.id,
                        existing: state.spec.kind,
                        requested: spec.kind,
                    });
                }
                if state.spec == spec {
                    return Ok(Registration::Unchanged(spec.id));
                }

                tracing::info!(
                    backend_id = %spec.id,
                    from = %state.spec.address,
                    to = %spec.address,
                    "Backend moved, readiness starts over"
                );
                let id = spec.id.clone();
                state.spec = spec;
                state.start_over();
                slot.view.store(Arc::new(self.view_of(&state, now)));
                metrics::record_backend_readiness(id.as_str(), Readiness::Unknown);
                Ok(Registration::Moved(id))
            }
            Entry::Vacant(entry) => {
                tracing::info!(
                    backend_id = %spec.id,
                    kind = %spec.kind,
                    address = %spec.address,
                    cold_start = %spec.cold_start,
                    "Backend registered"
                );
                let id = spec.id.clone();
                let state = BackendState::new(spec, &self.settings);
                let view = ArcSwap::from_pointee(self.view_of(&state, now));
                entry.insert(Arc::new(Slot {
                    state: Mutex::new(state),
                    view,
                }));
                metrics::record_backend_readiness(id.as_str(), Readiness::Unknown);
                Ok(Registration::Created(id))
            }
        }
    }

    /// Remove a backend.
    pub fn deregister(&self, id: &BackendId) -> Result<(), TrackerError> {
        match self.slots.remove(id) {
            Some(_) => {
                tracing::info!(backend_id = %id, "Backend deregistered");
                metrics::forget_backend(id.as_str());
                Ok(())
            }
            None => Err(TrackerError::NotFound(id.clone())),
        }
    }

    /// Manually return an ejected backend to `unknown`.
    pub fn reset(&self, id: &BackendId) -> Result<Readiness, TrackerError> {
        let slot = self.slot(id).ok_or_else(|| TrackerError::NotFound(id.clone()))?;
        let mut state = slot.lock();
        let from = state.readiness;
        state.start_over();
        self.log_transition(id, from, state.readiness);
        slot.view.store(Arc::new(self.view_of(&state, Instant::now())));
        Ok(from)
    }

    /// Note that a request (or probe) is about to be sent.
    ///
    /// Returns whether the backend is cold, or `None` for unknown ids.
    pub fn mark_in_flight(&self, id: &BackendId) -> Option<bool> {
        self.mark_in_flight_at(id, Instant::now())
    }

    pub fn mark_in_flight_at(&self, id: &BackendId, now: Instant) -> Option<bool> {
        let slot = self.slot(id)?;
        let mut state = slot.lock();
        let cold = state.is_cold(now, self.settings.retention);
        let bounded = state.spec.cold_start == ColdStartClass::BoundedDelay;
        let next = state::on_request_start(state.readiness, bounded);
        if next != state.readiness {
            let from = state.readiness;
            state.readiness = next;
            state.warming_since = Some(now);
            self.log_transition(id, from, next);
            slot.view.store(Arc::new(self.view_of(&state, now)));
        }
        Some(cold)
    }

    /// Append a health record and update statistics and readiness.
    ///
    /// Reports for unregistered backends are dropped; `None` is returned.
    pub fn record_outcome(&self, id: &BackendId, success: bool, latency: Duration) -> Option<Readiness> {
        self.record_outcome_at(id, success, latency, Instant::now())
    }

    pub fn record_outcome_at(
        &self,
        id: &BackendId,
        success: bool,
        latency: Duration,
        now: Instant,
    ) -> Option<Readiness> {
        let Some(slot) = self.slot(id) else {
            tracing::debug!(backend_id = %id, success, "Dropping outcome for unregistered backend");
            return None;
        };

        let mut state = slot.lock();
        let settings = &self.settings;
        let class = state.spec.cold_start;
        let cold = state.is_cold(now, settings.retention);
        let slow = success && latency > settings.latency_threshold(class, cold);

        state.window.push(HealthRecord {
            at: now,
            success,
            slow,
            latency,
            backend: id.clone(),
        });

        if success {
            state.consecutive_failures = 0;
            state.last_success = Some(now);
            // A bounded-delay cold start says nothing about steady-state latency
            if !(cold && class == ColdStartClass::BoundedDelay) {
                state.ewma = Some(match state.ewma {
                    Some(prev) => ewma(prev, latency, settings.ewma_alpha),
                    None => latency,
                });
            }
        } else {
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        }

        let from = state.readiness;
        let next = state::on_outcome(
            from,
            state::Observation {
                success,
                failure_rate: state.window.failure_rate(),
                samples: state.window.len(),
                consecutive_failures: state.consecutive_failures,
            },
            &settings.thresholds,
        );
        if next != from {
            state.readiness = next;
            if next == Readiness::Ejected {
                state.ejected_at = Some(now);
            }
            if from == Readiness::Warming {
                state.warming_since = None;
            }
            self.log_transition(id, from, next);
        }

        slot.view.store(Arc::new(self.view_of(&state, now)));
        Some(next)
    }

    /// Consistent copy of every backend, ordered by id.
    pub fn snapshot(&self) -> Snapshot {
        let mut backends: Vec<BackendView> = self
            .slots
            .iter()
            .map(|entry| BackendView::clone(&entry.value().view.load()))
            .collect();
        backends.sort_by(|a, b| a.id.cmp(&b.id));

        Snapshot {
            taken_at: Instant::now(),
            backends: backends.into(),
            admit_unknown: self.settings.admit_unknown,
        }
    }

    /// Current view of a single backend.
    pub fn get(&self, id: &BackendId) -> Option<BackendView> {
        self.slot(id).map(|slot| BackendView::clone(&slot.view.load()))
    }

    /// Copy of the records currently retained for a backend, oldest first.
    pub fn records(&self, id: &BackendId) -> Option<Vec<HealthRecord>> {
        let slot = self.slot(id)?;
        let state = slot.lock();
        Some(state.window.iter().cloned().collect())
    }

    pub fn ids(&self) -> Vec<BackendId> {
        let mut ids: Vec<_> = self.slots.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Age out expired records and apply time-based transitions.
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> SweepReport {
        let mut report = SweepReport::default();
        let retention = self.settings.retention;

        // Clone the slot handles so no shard lock is held while sweeping
        let slots: Vec<(BackendId, Arc<Slot>)> = self
            .slots
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        for (id, slot) in slots {
            let mut state = slot.lock();
            report.evicted += state.window.evict_expired(now);
            let from = state.readiness;

            if from == Readiness::Ejected {
                let ejected_for = state
                    .ejected_at
                    .map(|t| now.saturating_duration_since(t))
                    .unwrap_or_default();
                if self.settings.removal_after.is_some_and(|d| ejected_for >= d) {
                    report.removed.push(id);
                    continue;
                }
                if self.settings.auto_reset.is_some_and(|d| ejected_for >= d) {
                    state.start_over();
                    self.log_transition(&id, from, Readiness::Unknown);
                    report.reset.push(id.clone());
                }
            } else {
                let warming_pending = from == Readiness::Warming
                    && state
                        .warming_since
                        .is_some_and(|t| now.saturating_duration_since(t) <= retention);
                if state.is_cold(now, retention) && !warming_pending {
                    let next = state::on_stale(from);
                    if next != from {
                        state.readiness = next;
                        state.warming_since = None;
                        self.log_transition(&id, from, next);
                        report.demoted.push(id.clone());
                    }
                }
            }

            slot.view.store(Arc::new(self.view_of(&state, now)));
        }

        for id in &report.removed {
            let removed = self
                .slots
                .remove_if(id, |_, slot| slot.lock().readiness == Readiness::Ejected);
            if removed.is_some() {
                tracing::warn!(backend_id = %id, "Ejected backend removed after timeout");
                metrics::forget_backend(id.as_str());
            }
        }

        if report.evicted > 0 || !report.demoted.is_empty() {
            tracing::debug!(
                evicted = report.evicted,
                demoted = report.demoted.len(),
                reset = report.reset.len(),
                removed = report.removed.len(),
                "Sweep finished"
            );
        }
        report
    }

    fn slot(&self, id: &BackendId) -> Option<Arc<Slot>> {
        self.slots.get(id).map(|e| e.value().clone())
    }

    fn view_of(&self, state: &BackendState, now: Instant) -> BackendView {
        BackendView {
            id: state.spec.id.clone(),
            kind: state.spec.kind,
            address: state.spec.address.clone(),
            cold_start: state.spec.cold_start,
            readiness: state.readiness,
            weight: self.weight_of(state),
            cold: state.is_cold(now, self.settings.retention),
            ewma_latency: state.ewma,
            failure_rate: state.window.failure_rate(),
            consecutive_failures: state.consecutive_failures,
            records: state.window.len(),
        }
    }

    /// Base weight for the kind times the clamped inverse latency.
    fn weight_of(&self, state: &BackendState) -> f64 {
        let s = &self.settings;
        let factor = match state.readiness {
            Readiness::Ready => 1.0,
            Readiness::Warming => s.warming_weight_factor,
            Readiness::Unknown if s.admit_unknown => s.warming_weight_factor,
            _ => return 0.0,
        };
        let latency = state
            .ewma
            .unwrap_or(s.initial_latency)
            .clamp(s.latency_floor, s.latency_ceiling.max(s.latency_floor));
        let inverse = 1.0 / latency.as_secs_f64().max(f64::MIN_POSITIVE);
        s.base_weights.get(state.spec.kind) * inverse * factor
    }

    fn log_transition(&self, id: &BackendId, from: Readiness, to: Readiness) {
        if from == to {
            return;
        }
        match to {
            Readiness::Ejected => {
                tracing::error!(backend_id = %id, from = %from, to = %to, "Backend ejected")
            }
            Readiness::Degraded => {
                tracing::warn!(backend_id = %id, from = %from, to = %to, "Backend degraded")
            }
            _ => tracing::info!(backend_id = %id, from = %from, to = %to, "Backend readiness changed"),
        }
        metrics::record_backend_readiness(id.as_str(), to);
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(TrackerSettings::default())
    }
}

fn ewma(prev: Duration, sample: Duration, alpha: f64) -> Duration {
    let alpha = alpha.clamp(0.0, 1.0);
    let secs = alpha * sample.as_secs_f64() + (1.0 - alpha) * prev.as_secs_f64();
    Duration::from_secs_f64(secs.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: &str, kind: BackendKind, port: u16) -> BackendSpec {
        BackendSpec::new(id, kind, &format!("127.0.0.1:{}", port), None).unwrap()
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_register_then_deregister() {
        let tracker = Tracker::default();
        let id = tracker.register(spec("vm", BackendKind::PersistentInstance, 3000)).unwrap();
        assert!(tracker.snapshot().contains(&id));
        assert_eq!(tracker.get(&id).unwrap().readiness, Readiness::Unknown);

        tracker.deregister(&id).unwrap();
        assert!(!tracker.snapshot().contains(&id));
        assert_eq!(tracker.deregister(&id), Err(TrackerError::NotFound(id)));
    }

    #[test]
    fn test_register_conflicts() {
        let tracker = Tracker::default();
        tracker.register(spec("b", BackendKind::ManagedContainer, 3000)).unwrap();

        // Identical announcement is a no-op
        let again = tracker.announce(spec("b", BackendKind::ManagedContainer, 3000)).unwrap();
        assert!(matches!(again, Registration::Unchanged(_)));

        // Rescheduled container keeps its id
        let moved = tracker.announce(spec("b", BackendKind::ManagedContainer, 3001)).unwrap();
        assert!(matches!(moved, Registration::Moved(_)));
        assert_eq!(tracker.get(&"b".into()).unwrap().address.port_u16(), Some(3001));

        let err = tracker.register(spec("b", BackendKind::PersistentInstance, 3001)).unwrap_err();
        assert!(matches!(err, TrackerError::Duplicate { .. }));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_stale_outcome_is_dropped() {
        let tracker = Tracker::default();
        assert_eq!(tracker.record_outcome(&"gone".into(), true, ms(5)), None);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_ready_never_skips_degraded() {
        let tracker = Tracker::default();
        let id = tracker.register(spec("vm", BackendKind::PersistentInstance, 3000)).unwrap();
        let now = Instant::now();
        for i in 0..10 {
            tracker.record_outcome_at(&id, true, ms(10), now + ms(i));
        }
        assert_eq!(tracker.get(&id).unwrap().readiness, Readiness::Ready);

        let mut seen = vec![Readiness::Ready];
        for i in 0..20 {
            let next = tracker.record_outcome_at(&id, false, ms(10), now + ms(100 + i)).unwrap();
            if seen.last() != Some(&next) {
                seen.push(next);
            }
        }
        assert_eq!(seen, vec![Readiness::Ready, Readiness::Degraded, Readiness::Ejected]);
    }

    #[test]
    fn test_limit_one_ejects_directly() {
        let settings = TrackerSettings {
            thresholds: Thresholds {
                eject_after_failures: 1,
                ..TrackerSettings::default().thresholds
            },
            ..TrackerSettings::default()
        };
        let tracker = Tracker::new(settings);
        let id = tracker.register(spec("vm", BackendKind::PersistentInstance, 3000)).unwrap();
        tracker.record_outcome(&id, true, ms(10));
        assert_eq!(tracker.record_outcome(&id, false, ms(10)), Some(Readiness::Ejected));
    }

    #[test]
    fn test_repeated_outcome_converges() {
        let tracker = Tracker::default();
        let id = tracker.register(spec("vm", BackendKind::PersistentInstance, 3000)).unwrap();
        let now = Instant::now();
        tracker.record_outcome_at(&id, true, ms(400), now);
        for i in 1..=50 {
            tracker.record_outcome_at(&id, true, ms(20), now + ms(i));
        }

        let view = tracker.get(&id).unwrap();
        let ewma = view.ewma_latency.unwrap().as_secs_f64() * 1000.0;
        assert!((ewma - 20.0).abs() < 0.5, "ewma = {}", ewma);

        // Every report stays a distinct, ordered record
        let records = tracker.records(&id).unwrap();
        assert_eq!(records.len(), 51);
        assert!(records.windows(2).all(|w| w[0].at < w[1].at));
    }

    #[test]
    fn test_cold_start_leniency() {
        let settings = TrackerSettings {
            thresholds: Thresholds {
                min_samples: 1,
                ..TrackerSettings::default().thresholds
            },
            ..TrackerSettings::default()
        };
        let tracker = Tracker::new(settings);
        let func = tracker.register(spec("fn", BackendKind::EphemeralFunction, 3001)).unwrap();
        let vm = tracker.register(spec("vm", BackendKind::PersistentInstance, 3000)).unwrap();

        // Probe in flight moves the function to warming
        assert_eq!(tracker.mark_in_flight(&func), Some(true));
        assert_eq!(tracker.get(&func).unwrap().readiness, Readiness::Warming);
        assert_eq!(tracker.mark_in_flight(&vm), Some(true));
        assert_eq!(tracker.get(&vm).unwrap().readiness, Readiness::Unknown);

        // 3s: over the persistent threshold, inside the function's cold allowance
        let slow = Duration::from_secs(3);
        assert_eq!(tracker.record_outcome(&func, true, slow), Some(Readiness::Ready));
        assert_eq!(tracker.record_outcome(&vm, true, slow), Some(Readiness::Degraded));

        // The cold sample does not poison the function's latency estimate
        assert!(tracker.get(&func).unwrap().ewma_latency.is_none());
    }

    #[test]
    fn test_warm_function_is_held_to_steady_threshold() {
        let settings = TrackerSettings {
            thresholds: Thresholds {
                min_samples: 2,
                ..TrackerSettings::default().thresholds
            },
            ..TrackerSettings::default()
        };
        let tracker = Tracker::new(settings);
        let func = tracker.register(spec("fn", BackendKind::EphemeralFunction, 3001)).unwrap();
        tracker.record_outcome(&func, true, Duration::from_secs(3));
        assert_eq!(
            tracker.record_outcome(&func, true, Duration::from_secs(3)),
            Some(Readiness::Degraded)
        );
    }

    #[test]
    fn test_sweep_demotes_silent_backends() {
        let tracker = Tracker::default();
        let id = tracker.register(spec("vm", BackendKind::PersistentInstance, 3000)).unwrap();
        let now = Instant::now();
        tracker.record_outcome_at(&id, true, ms(10), now);

        let report = tracker.sweep_at(now + Duration::from_secs(30));
        assert!(report.demoted.is_empty());

        let report = tracker.sweep_at(now + Duration::from_secs(61));
        assert_eq!(report.demoted, vec![id.clone()]);
        assert_eq!(report.evicted, 1);
        assert_eq!(tracker.get(&id).unwrap().readiness, Readiness::Unknown);
    }

    #[test]
    fn test_sweep_spares_fresh_warming() {
        let tracker = Tracker::default();
        let id = tracker.register(spec("fn", BackendKind::EphemeralFunction, 3000)).unwrap();
        let now = Instant::now();
        tracker.mark_in_flight_at(&id, now);

        tracker.sweep_at(now + Duration::from_secs(1));
        assert_eq!(tracker.get(&id).unwrap().readiness, Readiness::Warming);

        tracker.sweep_at(now + Duration::from_secs(120));
        assert_eq!(tracker.get(&id).unwrap().readiness, Readiness::Unknown);
    }

    #[test]
    fn test_ejected_until_reset() {
        let settings = TrackerSettings {
            auto_reset: Some(Duration::from_secs(30)),
            ..TrackerSettings::default()
        };
        let tracker = Tracker::new(settings);
        let id = tracker.register(spec("task", BackendKind::ManagedContainer, 3000)).unwrap();
        let now = Instant::now();
        for i in 0..5 {
            tracker.record_outcome_at(&id, false, ms(10), now + ms(i));
        }
        assert_eq!(tracker.get(&id).unwrap().readiness, Readiness::Ejected);

        // Successes do not revive an ejected backend
        tracker.record_outcome_at(&id, true, ms(10), now + ms(10));
        assert_eq!(tracker.get(&id).unwrap().readiness, Readiness::Ejected);

        let report = tracker.sweep_at(now + Duration::from_secs(31));
        assert_eq!(report.reset, vec![id.clone()]);
        assert_eq!(tracker.get(&id).unwrap().readiness, Readiness::Unknown);
    }

    #[test]
    fn test_manual_reset_and_removal() {
        let settings = TrackerSettings {
            removal_after: Some(Duration::from_secs(10)),
            ..TrackerSettings::default()
        };
        let tracker = Tracker::new(settings);
        let a = tracker.register(spec("a", BackendKind::ManagedContainer, 3000)).unwrap();
        let b = tracker.register(spec("b", BackendKind::ManagedContainer, 3001)).unwrap();
        let now = Instant::now();
        for i in 0..5 {
            tracker.record_outcome_at(&a, false, ms(10), now + ms(i));
            tracker.record_outcome_at(&b, false, ms(10), now + ms(i));
        }

        assert_eq!(tracker.reset(&a), Ok(Readiness::Ejected));
        assert_eq!(tracker.get(&a).unwrap().readiness, Readiness::Unknown);

        let report = tracker.sweep_at(now + Duration::from_secs(11));
        assert_eq!(report.removed, vec![b.clone()]);
        assert_eq!(tracker.ids(), vec![a]);
    }

    #[test]
    fn test_weights_follow_kind_and_latency() {
        let mut settings = TrackerSettings::default();
        settings.base_weights.ephemeral_function = 0.5;
        let tracker = Tracker::new(settings);
        let vm = tracker.register(spec("vm", BackendKind::PersistentInstance, 3000)).unwrap();
        let slow_vm = tracker.register(spec("vm-2", BackendKind::PersistentInstance, 3001)).unwrap();
        let func = tracker.register(spec("fn", BackendKind::EphemeralFunction, 3002)).unwrap();

        tracker.record_outcome(&vm, true, ms(20));
        tracker.record_outcome(&slow_vm, true, ms(80));
        tracker.record_outcome(&func, true, ms(20)); // cold sample, latency unknown
        tracker.record_outcome(&func, true, ms(20));

        let snap = tracker.snapshot();
        let w = |id: &BackendId| snap.get(id).unwrap().weight;
        assert!((w(&vm) / w(&slow_vm) - 4.0).abs() < 1e-6);
        assert!((w(&vm) / w(&func) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_admitted_without_active_checks() {
        let tracker = Tracker::default();
        let id = tracker.register(spec("vm", BackendKind::PersistentInstance, 3000)).unwrap();
        assert!(tracker.snapshot().eligible().is_empty());

        let tracker = Tracker::new(TrackerSettings {
            admit_unknown: true,
            ..TrackerSettings::default()
        });
        tracker.register(spec("vm", BackendKind::PersistentInstance, 3000)).unwrap();
        let eligible = tracker.snapshot().eligible();
        assert_eq!(eligible.len(), 1);
        assert!(eligible[0].weight > 0.0);

        // Passive success is enough to reach ready
        assert_eq!(tracker.record_outcome(&id, true, ms(10)), Some(Readiness::Ready));

        // Ejection still excludes
        let tracker = Tracker::new(TrackerSettings {
            admit_unknown: true,
            ..TrackerSettings::default()
        });
        tracker.register(spec("vm", BackendKind::PersistentInstance, 3000)).unwrap();
        for _ in 0..5 {
            tracker.record_outcome(&id, false, ms(10));
        }
        assert!(tracker.snapshot().eligible().is_empty());
    }

    #[test]
    fn test_snapshot_is_ordered_and_restartable() {
        let tracker = Tracker::default();
        for (i, id) in ["c", "a", "b"].iter().enumerate() {
            tracker.register(spec(id, BackendKind::PersistentInstance, 3000 + i as u16)).unwrap();
        }
        let snap = tracker.snapshot();
        tracker.register(spec("d", BackendKind::PersistentInstance, 4000)).unwrap();

        let first: Vec<_> = snap.iter().map(|b| b.id.to_string()).collect();
        let second: Vec<_> = (&snap).into_iter().map(|b| b.id.to_string()).collect();
        assert_eq!(first, vec!["a", "b", "c"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_concurrent_reports() {
        let tracker = Arc::new(Tracker::default());
        let ids: Vec<_> = (0..4)
            .map(|i| tracker.register(spec(&format!("b{}", i), BackendKind::ManagedContainer, 3000 + i)).unwrap())
            .collect();

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let tracker = tracker.clone();
                let ids = ids.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        tracker.record_outcome(&ids[t % 4], true, ms(5));
                        let _ = tracker.snapshot().len();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        for id in &ids {
            assert_eq!(tracker.records(id).unwrap().len(), 200);
        }
    }
}
