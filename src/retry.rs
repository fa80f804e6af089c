use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use crate::settings::RestartPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    Immediate,
    After(Duration),
    Exhausted,
}

/// Sliding-window budget for error-driven session restarts.
#[derive(Debug, Clone)]
pub struct RestartBudget {
    policy: RestartPolicy,
    recent: VecDeque<Instant>,
}

impl RestartBudget {
    pub fn new(policy: RestartPolicy) -> Self {
        Self {
            policy,
            recent: VecDeque::new(),
        }
    }

    pub fn recent_restarts(&self) -> usize {
        self.recent.len()
    }

    pub fn reset(&mut self) {
        self.recent.clear();
    }

    pub fn record(&mut self, now: Instant) -> RestartDecision {
        let window = Duration::from_millis(self.policy.window_ms);
        while let Some(oldest) = self.recent.front() {
            if now.saturating_duration_since(*oldest) >= window {
                self.recent.pop_front();
            } else {
                break;
            }
        }

        if self.recent.len() >= self.policy.max_restarts as usize {
            return RestartDecision::Exhausted;
        }
        self.recent.push_back(now);

        let attempt = self.recent.len() as u32;
        if attempt <= self.policy.immediate_restarts {
            return RestartDecision::Immediate;
        }
        let exponent = (attempt - self.policy.immediate_restarts - 1).min(16);
        let delay_ms = self
            .policy
            .backoff_base_ms
            .saturating_mul(1u64 << exponent)
            .min(self.policy.backoff_max_ms);
        RestartDecision::After(Duration::from_millis(delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn policy() -> RestartPolicy {
        RestartPolicy {
            immediate_restarts: 2,
            backoff_base_ms: 100,
            backoff_max_ms: 250,
            max_restarts: 5,
            window_ms: 1_000,
        }
    }

    #[test]
    fn backs_off_then_gives_up() {
        let mut budget = RestartBudget::new(policy());
        let now = Instant::now();
        let decisions: Vec<_> = (0..6).map(|_| budget.record(now)).collect();
        assert_eq!(
            decisions,
            vec![
                RestartDecision::Immediate,
                RestartDecision::Immediate,
                RestartDecision::After(Duration::from_millis(100)),
                RestartDecision::After(Duration::from_millis(200)),
                RestartDecision::After(Duration::from_millis(250)),
                RestartDecision::Exhausted,
            ]
        );
    }

    #[test]
    fn window_expiry_restores_budget() {
        let mut budget = RestartBudget::new(policy());
        let start = Instant::now();
        for _ in 0..5 {
            budget.record(start);
        }
        assert_eq!(budget.record(start), RestartDecision::Exhausted);

        let later = start + Duration::from_millis(1_000);
        assert_eq!(budget.record(later), RestartDecision::Immediate);
        assert_eq!(budget.recent_restarts(), 1);
    }
}
