//! Weighted-fair load balancing strategy.
//!
//! Stride scheduling: every backend advances a virtual pass by `1 / weight`
//! each time it is chosen, and the lowest pass wins. Equal passes go to the
//! least recently used backend. Backends that rejoin are lifted to the
//! current virtual time so they do not receive a burst.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::load_balancer::{
    backend::{BackendId, BackendView},
    LoadBalancer,
};

#[derive(Debug, Clone, Copy)]
struct Lane {
    pass: f64,
    last_used: u64,
}

#[derive(Debug, Default)]
struct Lanes {
    by_id: HashMap<BackendId, Lane>,
    virtual_time: f64,
    clock: u64,
}

/// Weighted-fair selector.
#[derive(Debug, Default)]
pub struct WeightedFair {
    lanes: Mutex<Lanes>,
}

impl WeightedFair {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for WeightedFair {
    fn name(&self) -> &'static str {
        "weighted_fair"
    }

    fn next_server(&self, candidates: &[BackendView]) -> Option<BackendView> {
        let selectable: Vec<&BackendView> = candidates
            .iter()
            .filter(|b| b.weight.is_finite() && b.weight > 0.0)
            .collect();
        if selectable.is_empty() {
            return None;
        }

        let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
        let Lanes { by_id, virtual_time, clock } = &mut *lanes;

        for b in &selectable {
            let lane = by_id.entry(b.id.clone()).or_insert(Lane {
                pass: *virtual_time,
                last_used: 0,
            });
            if lane.pass < *virtual_time {
                lane.pass = *virtual_time;
            }
        }

        let chosen = selectable.iter().copied().min_by(|a, b| {
            let (la, lb) = (by_id[&a.id], by_id[&b.id]);
            la.pass
                .partial_cmp(&lb.pass)
                .unwrap_or(CmpOrdering::Equal)
                .then(la.last_used.cmp(&lb.last_used))
        })?;

        *clock += 1;
        let lane = by_id.get_mut(&chosen.id)?;
        *virtual_time = lane.pass;
        lane.pass += 1.0 / chosen.weight;
        lane.last_used = *clock;

        Some(chosen.clone())
    }

    fn retain(&self, keep: &dyn Fn(&BackendId) -> bool) {
        let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
        lanes.by_id.retain(|id, _| keep(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::state::Readiness;
    use crate::load_balancer::backend::{BackendKind, ColdStartClass};
    use std::collections::HashMap;

    fn view(id: &str, weight: f64) -> BackendView {
        BackendView {
            id: BackendId::new(id),
            kind: BackendKind::PersistentInstance,
            address: "127.0.0.1:3000".parse().unwrap(),
            cold_start: ColdStartClass::Zero,
            readiness: Readiness::Ready,
            weight,
            cold: false,
            ewma_latency: None,
            failure_rate: 0.0,
            consecutive_failures: 0,
            records: 0,
        }
    }

    fn tally(lb: &WeightedFair, backends: &[BackendView], n: usize) -> HashMap<String, usize> {
        let mut hits = HashMap::new();
        for _ in 0..n {
            let b = lb.next_server(backends).unwrap();
            *hits.entry(b.id.to_string()).or_insert(0) += 1;
        }
        hits
    }

    #[test]
    fn test_equal_weights_are_fair() {
        let lb = WeightedFair::new();
        let backends = vec![view("a", 1.0), view("b", 1.0), view("c", 1.0)];
        let hits = tally(&lb, &backends, 10_000);

        let expected = 10_000.0 / 3.0;
        for id in ["a", "b", "c"] {
            let got = hits[id] as f64;
            assert!((got - expected).abs() / expected < 0.05, "{} got {}", id, got);
        }
    }

    #[test]
    fn test_ties_go_least_recently_used() {
        let lb = WeightedFair::new();
        let backends = vec![view("a", 2.0), view("b", 2.0)];
        let order: Vec<_> = (0..4)
            .map(|_| lb.next_server(&backends).unwrap().id.to_string())
            .collect();
        assert_eq!(order, vec!["a", "b", "a", "b"]);
    }

    #[test]
    fn test_proportional_to_weight() {
        let lb = WeightedFair::new();
        let backends = vec![view("heavy", 3.0), view("light", 1.0)];
        let hits = tally(&lb, &backends, 4_000);
        assert!(hits["heavy"].abs_diff(3_000) <= 2, "heavy got {}", hits["heavy"]);
        assert!(hits["light"].abs_diff(1_000) <= 2, "light got {}", hits["light"]);
    }

    #[test]
    fn test_rejoining_backend_gets_no_burst() {
        let lb = WeightedFair::new();
        let all = vec![view("a", 1.0), view("b", 1.0)];
        let only_a = vec![view("a", 1.0)];

        tally(&lb, &all, 10);
        tally(&lb, &only_a, 100);

        let hits = tally(&lb, &all, 10);
        assert!(hits["b"] <= 6, "b got {}", hits["b"]);
    }

    #[test]
    fn test_zero_weight_is_never_selected() {
        let lb = WeightedFair::new();
        assert!(lb.next_server(&[view("a", 0.0)]).is_none());
        assert!(lb.next_server(&[]).is_none());
    }
}
