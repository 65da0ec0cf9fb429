//! Forwarding deadlines.
//!
//! A warm backend gets the configured request timeout. The first request of a
//! warm period is multiplied by the class multiplier, so a function paying its
//! cold start is not cut off while a persistent backend keeps a tight bound.

use std::time::Duration;

use crate::config::schema::DispatchConfig;
use crate::load_balancer::backend::ColdStartClass;

pub fn forward_timeout(config: &DispatchConfig, class: ColdStartClass, cold: bool) -> Duration {
    let base = Duration::from_millis(config.request_timeout_ms);
    if !cold {
        return base;
    }
    base.mul_f64(config.timeout_multipliers.get(class).max(1.0))
}
