use std::fmt;
use std::str::FromStr;

use crate::PlanError;

/// How much work the planner spends choosing a kernel.
///
/// `Estimate` takes the auto-detecting planner as is. The other levels time
/// every candidate kernel over a number of trial executions and keep the
/// fastest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlanEffort {
    #[default]
    Estimate,
    Measure,
    Patient,
    Exhaustive,
}

impl PlanEffort {
    /// Trial executions per candidate kernel during planning.
    pub fn trial_runs(self) -> usize {
        match self {
            PlanEffort::Estimate => 0,
            PlanEffort::Measure => 4,
            PlanEffort::Patient => 16,
            PlanEffort::Exhaustive => 64,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanEffort::Estimate => "estimate",
            PlanEffort::Measure => "measure",
            PlanEffort::Patient => "patient",
            PlanEffort::Exhaustive => "exhaustive",
        }
    }
}

impl fmt::Display for PlanEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanEffort {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "estimate" => Ok(PlanEffort::Estimate),
            "measure" => Ok(PlanEffort::Measure),
            "patient" => Ok(PlanEffort::Patient),
            "exhaustive" => Ok(PlanEffort::Exhaustive),
            _ => Err(PlanError::UnknownEffort(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_values() {
        assert_eq!("estimate".parse(), Ok(PlanEffort::Estimate));
        assert_eq!("measure".parse(), Ok(PlanEffort::Measure));
        assert_eq!(" Patient ".parse(), Ok(PlanEffort::Patient));
        assert_eq!("EXHAUSTIVE".parse(), Ok(PlanEffort::Exhaustive));
    }

    #[test]
    fn test_parse_unknown_value() {
        let err = "fastest".parse::<PlanEffort>().unwrap_err();
        assert_eq!(err, PlanError::UnknownEffort("fastest".to_string()));
        assert!("".parse::<PlanEffort>().is_err());
    }

    #[test]
    fn test_display_matches_parse() {
        for effort in [
            PlanEffort::Estimate,
            PlanEffort::Measure,
            PlanEffort::Patient,
            PlanEffort::Exhaustive,
        ] {
            assert_eq!(effort.to_string().parse(), Ok(effort));
        }
    }

    #[test]
    fn test_trial_runs_increase() {
        assert_eq!(PlanEffort::Estimate.trial_runs(), 0);
        assert!(PlanEffort::Measure.trial_runs() < PlanEffort::Patient.trial_runs());
        assert!(PlanEffort::Patient.trial_runs() < PlanEffort::Exhaustive.trial_runs());
    }
}
