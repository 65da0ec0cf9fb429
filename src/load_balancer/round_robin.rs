//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::load_balancer::{backend::BackendView, LoadBalancer};

/// Round-robin selector.
/// Stores an internal counter to rotate through backends; weights are ignored.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn next_server(&self, candidates: &[BackendView]) -> Option<BackendView> {
        if candidates.is_empty() {
            return None;
        }

        // Simple loop detection to avoid infinite loop if none is eligible
        let start_count = self.counter.fetch_add(1, Ordering::Relaxed);
        let len = candidates.len();

        for i in 0..len {
            let index = (start_count + i) % len;
            let backend = &candidates[index];
            if backend.is_eligible() {
                return Some(backend.clone());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::state::Readiness;
    use crate::load_balancer::backend::{BackendId, BackendKind, ColdStartClass};

    fn view(id: &str, readiness: Readiness) -> BackendView {
        BackendView {
            id: BackendId::new(id),
            kind: BackendKind::ManagedContainer,
            address: "127.0.0.1:3000".parse().unwrap(),
            cold_start: ColdStartClass::Zero,
            readiness,
            weight: 1.0,
            cold: false,
            ewma_latency: None,
            failure_rate: 0.0,
            consecutive_failures: 0,
            records: 0,
        }
    }

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let backends = vec![view("b1", Readiness::Ready), view("b2", Readiness::Warming)];

        let s1 = lb.next_server(&backends).unwrap();
        assert_eq!(s1.id.as_str(), "b1");

        let s2 = lb.next_server(&backends).unwrap();
        assert_eq!(s2.id.as_str(), "b2");

        let s3 = lb.next_server(&backends).unwrap();
        assert_eq!(s3.id.as_str(), "b1");
    }

    #[test]
    fn test_skips_ineligible() {
        let lb = RoundRobin::new();
        let backends = vec![view("b1", Readiness::Degraded), view("b2", Readiness::Ready)];
        for _ in 0..3 {
            assert_eq!(lb.next_server(&backends).unwrap().id.as_str(), "b2");
        }
        assert!(lb.next_server(&[view("b3", Readiness::Ejected)]).is_none());
    }
}
