use crate::error::{PlanError, PlanResult};
use crate::network::Network;

/// How far a probability sum may drift from 1.0 before the scenario set
/// is rejected for a full robust solve.
pub const PROBABILITY_SUM_TOLERANCE: f64 = 1e-6;

/// One disruption scenario: an occurrence probability and the set of
/// attacked line ids. Immutable value object created before any solve.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub probability: f64,
    pub attack: Vec<usize>,
}

impl Scenario {
    pub fn new(name: &str, probability: f64, attack: Vec<usize>) -> Self {
        Self {
            name: name.to_string(),
            probability,
            attack,
        }
    }

    /// A copy of this scenario with its probability forced to 1.0, used
    /// by the wait-and-see singleton solves.
    pub fn as_certain(&self) -> Self {
        Self {
            name: self.name.clone(),
            probability: 1.0,
            attack: self.attack.clone(),
        }
    }

    pub fn sorted_attack(&self) -> Vec<usize> {
        let mut attack = self.attack.clone();
        attack.sort_unstable();
        attack
    }
}

/// Rejects malformed scenarios before any model assembly: probabilities
/// outside [0, 1] or attack sets naming lines absent from the topology.
pub fn validate_scenarios(
    scenarios: &[Scenario],
    network: &Network,
) -> PlanResult<()> {
    if scenarios.is_empty() {
        return Err(PlanError::Scenario(
            "scenario set must not be empty".to_string(),
        ));
    }
    for scenario in scenarios {
        if !(0.0..=1.0).contains(&scenario.probability) {
            return Err(PlanError::Scenario(format!(
                "scenario {} has probability {} outside [0, 1]",
                scenario.name, scenario.probability
            )));
        }
        for line_id in scenario.attack.iter() {
            if network.line_index(*line_id).is_none() {
                return Err(PlanError::Scenario(format!(
                    "scenario {} attacks unknown line {}",
                    scenario.name, line_id
                )));
            }
        }
    }
    Ok(())
}

/// The full robust model requires the active probabilities to sum to 1.
pub fn validate_probability_sum(scenarios: &[Scenario]) -> PlanResult<()> {
    let total: f64 = scenarios.iter().map(|s| s.probability).sum();
    if (total - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
        return Err(PlanError::Scenario(format!(
            "scenario probabilities sum to {} instead of 1",
            total
        )));
    }
    Ok(())
}

/// Single-letter codes for the unique attack patterns of a case batch,
/// ordered by (pattern size, lexicographic), for compact reporting.
#[derive(Debug)]
pub struct AttackLegend {
    pub patterns: Vec<(char, Vec<usize>)>,
}

impl AttackLegend {
    pub fn build(cases: &[(String, Vec<Scenario>)]) -> Self {
        let mut unique: Vec<Vec<usize>> = vec![];
        for (_, scenarios) in cases {
            for scenario in scenarios {
                let attack = scenario.sorted_attack();
                if !unique.contains(&attack) {
                    unique.push(attack);
                }
            }
        }
        unique.sort_by(|a, b| a.len().cmp(&b.len()).then(a.cmp(b)));
        let patterns = unique
            .into_iter()
            .enumerate()
            .map(|(index, pattern)| (char::from(b'A' + index as u8), pattern))
            .collect();
        Self { patterns }
    }

    pub fn code_for(&self, scenario: &Scenario) -> char {
        let attack = scenario.sorted_attack();
        self.patterns
            .iter()
            .find(|(_, pattern)| *pattern == attack)
            .map(|(code, _)| *code)
            .unwrap_or('?')
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_validate_accepts_reference_scenarios() {
        let network = Network::ieee13();
        let scenarios = vec![
            Scenario::new("s1", 0.9, vec![2, 11]),
            Scenario::new("s2", 0.1, vec![2, 5, 8, 14, 15]),
        ];
        assert!(validate_scenarios(&scenarios, &network).is_ok());
        assert!(validate_probability_sum(&scenarios).is_ok());
    }

    #[test]
    fn test_rejects_unknown_attacked_line() {
        let network = Network::ieee13();
        let scenarios = vec![Scenario::new("s1", 1.0, vec![2, 99])];
        let result = validate_scenarios(&scenarios, &network);
        assert!(matches!(result, Err(PlanError::Scenario(_))));
    }

    #[test]
    fn test_rejects_probability_out_of_range() {
        let network = Network::ieee13();
        let scenarios = vec![Scenario::new("s1", 1.5, vec![2])];
        assert!(validate_scenarios(&scenarios, &network).is_err());
    }

    #[test]
    fn test_rejects_bad_probability_sum() {
        let scenarios = vec![
            Scenario::new("s1", 0.5, vec![]),
            Scenario::new("s2", 0.3, vec![]),
        ];
        assert!(validate_probability_sum(&scenarios).is_err());
    }

    #[test]
    fn test_as_certain_forces_probability() {
        let scenario = Scenario::new("s2", 0.1, vec![2, 5]);
        let certain = scenario.as_certain();
        assert_eq!(certain.probability, 1.0);
        assert_eq!(certain.attack, scenario.attack);
    }

    #[test]
    fn test_attack_legend_codes() {
        let cases = vec![
            (
                "case_1".to_string(),
                vec![
                    Scenario::new("s1", 0.9, vec![11, 2]),
                    Scenario::new("s2", 0.1, vec![2, 5, 8, 14, 15]),
                ],
            ),
            (
                "case_2".to_string(),
                vec![
                    Scenario::new("s1", 0.9, vec![4, 6, 11]),
                    Scenario::new("s2", 0.1, vec![2, 5, 8, 14, 15]),
                ],
            ),
        ];
        let legend = AttackLegend::build(&cases);
        // ordered by size: [2, 11] then [4, 6, 11] then the five-line set
        assert_eq!(legend.patterns.len(), 3);
        assert_eq!(legend.patterns[0].0, 'A');
        assert_eq!(legend.patterns[0].1, vec![2, 11]);
        assert_eq!(legend.code_for(&cases[0].1[0]), 'A');
        assert_eq!(legend.code_for(&cases[1].1[0]), 'B');
        assert_eq!(legend.code_for(&cases[0].1[1]), 'C');
    }
}
