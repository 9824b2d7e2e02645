//! Prioritization strategies and their weight tuples (§4.H).

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrioritizationStrategy {
    Balanced,
    SpeedFirst,
    ReliabilityFirst,
    SuccessRateFirst,
    Adaptive,
}

#[derive(Debug, Clone, Copy)]
pub struct StrategyWeights {
    pub response_time: f64,
    pub reliability: f64,
    pub success_rate: f64,
}

impl PrioritizationStrategy {
    const BALANCED: StrategyWeights = StrategyWeights { response_time: 0.30, reliability: 0.40, success_rate: 0.30 };
    const SPEED_FIRST: StrategyWeights = StrategyWeights { response_time: 0.70, reliability: 0.15, success_rate: 0.15 };
    const RELIABILITY_FIRST: StrategyWeights = StrategyWeights { response_time: 0.15, reliability: 0.70, success_rate: 0.15 };
    const SUCCESS_RATE_FIRST: StrategyWeights = StrategyWeights { response_time: 0.15, reliability: 0.15, success_rate: 0.70 };

    /// The weight tuple to apply given the fleet-wide unhealthy/healthy
    /// fractions. Only `Adaptive` actually consults the fractions; the
    /// fixed strategies ignore them.
    ///
    /// NOTE (DESIGN.md open question): the original's adaptive ">80% healthy"
    /// branch used a distinct (0.60, 0.20, 0.20) tuple rather than reusing
    /// `speed_first`'s weights. Spec §4.H names the outcome as "speed_first"
    /// explicitly, so this implementation reuses `SPEED_FIRST` verbatim for
    /// that branch instead of inventing a fifth tuple.
    pub fn weights(&self, unhealthy_fraction: f64, healthy_fraction: f64) -> StrategyWeights {
        match self {
            PrioritizationStrategy::Balanced => Self::BALANCED,
            PrioritizationStrategy::SpeedFirst => Self::SPEED_FIRST,
            PrioritizationStrategy::ReliabilityFirst => Self::RELIABILITY_FIRST,
            PrioritizationStrategy::SuccessRateFirst => Self::SUCCESS_RATE_FIRST,
            PrioritizationStrategy::Adaptive => {
                if unhealthy_fraction > 0.5 {
                    Self::RELIABILITY_FIRST
                } else if healthy_fraction > 0.8 {
                    Self::SPEED_FIRST
                } else {
                    Self::BALANCED
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adaptive_picks_reliability_first_when_mostly_unhealthy() {
        let w = PrioritizationStrategy::Adaptive.weights(0.6, 0.1);
        assert_eq!(w.reliability, 0.70);
    }

    #[test]
    fn adaptive_picks_speed_first_when_mostly_healthy() {
        let w = PrioritizationStrategy::Adaptive.weights(0.0, 0.9);
        assert_eq!(w.response_time, 0.70);
    }

    #[test]
    fn adaptive_falls_back_to_balanced() {
        let w = PrioritizationStrategy::Adaptive.weights(0.2, 0.5);
        assert_eq!(w.reliability, 0.40);
    }
}
