// Window policy domain model
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowStrategy {
    KeepAll,
    DecimateUniform,
    DecimateLatestBiased,
}

#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("count limit must be greater than zero")]
    ZeroCountLimit,
    #[error("point budget must be greater than zero")]
    ZeroPointBudget,
}

/// How much history a chart shows and how it is reduced.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowPolicy {
    count_limit: usize,
    time_window: Option<Duration>,
    strategy: WindowStrategy,
    point_budget: Option<usize>,
}

impl WindowPolicy {
    pub fn new(
        count_limit: usize,
        time_window: Option<Duration>,
        strategy: WindowStrategy,
    ) -> Result<Self, PolicyError> {
        if count_limit == 0 {
            return Err(PolicyError::ZeroCountLimit);
        }
        Ok(Self {
            count_limit,
            time_window,
            strategy,
            point_budget: None,
        })
    }

    pub fn with_point_budget(mut self, budget: usize) -> Result<Self, PolicyError> {
        if budget == 0 {
            return Err(PolicyError::ZeroPointBudget);
        }
        self.point_budget = Some(budget);
        Ok(self)
    }

    pub fn count_limit(&self) -> usize {
        self.count_limit
    }

    pub fn time_window(&self) -> Option<Duration> {
        self.time_window
    }

    pub fn strategy(&self) -> WindowStrategy {
        self.strategy
    }

    /// Number of points decimating strategies reduce to.
    pub fn target_points(&self) -> usize {
        match self.point_budget {
            Some(budget) => budget.min(self.count_limit),
            None => self.count_limit,
        }
    }
}

/// Serializable view of a policy, echoed back alongside windowed data.
#[derive(Debug, Clone, Serialize)]
pub struct PolicySummary {
    pub count_limit: usize,
    pub time_window_seconds: Option<u64>,
    pub strategy: WindowStrategy,
    pub point_budget: Option<usize>,
}

impl From<&WindowPolicy> for PolicySummary {
    fn from(policy: &WindowPolicy) -> Self {
        Self {
            count_limit: policy.count_limit,
            time_window_seconds: policy.time_window.map(|w| w.as_secs()),
            strategy: policy.strategy,
            point_budget: policy.point_budget,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_count_limit_rejected() {
        assert_eq!(
            WindowPolicy::new(0, None, WindowStrategy::KeepAll),
            Err(PolicyError::ZeroCountLimit)
        );
    }

    #[test]
    fn test_target_points_respects_budget() {
        let policy = WindowPolicy::new(500, None, WindowStrategy::DecimateUniform).unwrap();
        assert_eq!(policy.target_points(), 500);

        let budgeted = policy.clone().with_point_budget(150).unwrap();
        assert_eq!(budgeted.target_points(), 150);

        let loose = policy.with_point_budget(1000).unwrap();
        assert_eq!(loose.target_points(), 500);
    }

    #[test]
    fn test_strategy_names() {
        let strategy: WindowStrategy = serde_json::from_str("\"decimate-latest-biased\"").unwrap();
        assert_eq!(strategy, WindowStrategy::DecimateLatestBiased);
    }
}
