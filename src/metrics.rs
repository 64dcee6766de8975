use crate::error::{PlanError, PlanResult};
use crate::investment::{Budgets, Costs, InvestmentPlan};
use crate::model::{
    FirstStage, ModelParams, PlanningSolution, TwoStageModel, COST_TOLERANCE,
};
use crate::network::Network;
use crate::scenario::{
    validate_probability_sum, validate_scenarios, Scenario,
};
use rayon::prelude::*;

/// The stochastic-programming value metrics of one scenario set, plus
/// the recourse solution that produced RP.
#[derive(Debug, Clone)]
pub struct CaseMetrics {
    pub rp: f64,
    pub ws: f64,
    pub eev: f64,
    pub evpi: f64,
    pub vss: f64,
    pub plan: InvestmentPlan,
    pub investment_cost: f64,
    pub recourse: PlanningSolution,
}

/// Computes RP, WS, EEV, EVPI and VSS over a scenario set whose
/// probabilities sum to 1. Any infeasible underlying solve aborts the
/// whole computation with an explicit error; nothing is substituted.
pub fn evaluate(
    network: &Network,
    costs: &Costs,
    budgets: &Budgets,
    params: &ModelParams,
    scenarios: &[Scenario],
) -> PlanResult<CaseMetrics> {
    validate_scenarios(scenarios, network)?;
    validate_probability_sum(scenarios)?;

    // RP: hedge across the full set with a free first stage.
    let recourse = TwoStageModel::build(
        network,
        costs,
        budgets,
        params,
        scenarios,
        FirstStage::Free,
    )?
    .solve()?;
    let rp = recourse.objective;

    // WS: every scenario solved alone as if foretold. The solves share
    // nothing and run in parallel; collection preserves scenario order.
    let singletons: Vec<PlanningSolution> = scenarios
        .par_iter()
        .map(|scenario| {
            let certain = [scenario.as_certain()];
            TwoStageModel::build(
                network,
                costs,
                budgets,
                params,
                &certain,
                FirstStage::Free,
            )?
            .solve()
        })
        .collect::<PlanResult<Vec<PlanningSolution>>>()?;
    let ws = scenarios
        .iter()
        .zip(singletons.iter())
        .map(|(scenario, solved)| scenario.probability * solved.objective)
        .sum::<f64>();

    // The naive planner commits to the most likely scenario's plan,
    // ties broken by iteration order.
    let naive_index = scenarios
        .iter()
        .enumerate()
        .fold(0, |best, (index, scenario)| {
            if scenario.probability > scenarios[best].probability {
                index
            } else {
                best
            }
        });
    let naive_plan = singletons[naive_index].plan.clone();

    // EEV: the naive plan priced under the true distribution, with the
    // first stage fixed so only the recourse dispatch re-optimizes.
    let eev_solution = TwoStageModel::build(
        network,
        costs,
        budgets,
        params,
        scenarios,
        FirstStage::Fixed(&naive_plan),
    )?
    .solve()?;
    let eev = eev_solution.objective;

    let evpi = rp - ws;
    let vss = eev - rp;
    // A material negative here means the formulation or tolerances are
    // broken; report it instead of clamping.
    if evpi < -COST_TOLERANCE {
        return Err(PlanError::Metric(format!(
            "EVPI = {evpi} is negative: WS exceeds RP"
        )));
    }
    if vss < -COST_TOLERANCE {
        return Err(PlanError::Metric(format!(
            "VSS = {vss} is negative: the fixed naive plan beat RP"
        )));
    }

    let plan = recourse.plan.clone();
    let investment_cost = recourse.investment_cost;
    Ok(CaseMetrics {
        rp,
        ws,
        eev,
        evpi,
        vss,
        plan,
        investment_cost,
        recourse,
    })
}

#[cfg(test)]
mod tests {

    use super::*;

    fn reference_setup() -> (Network, Costs, Budgets, ModelParams) {
        (
            Network::ieee13(),
            Costs::reference(),
            Budgets::new(1, 1),
            ModelParams::default(),
        )
    }

    fn reference_scenarios() -> Vec<Scenario> {
        vec![
            Scenario::new("s1", 0.9, vec![2, 11]),
            Scenario::new("s2", 0.1, vec![2, 5, 8, 14, 15]),
        ]
    }

    #[test]
    fn test_metrics_on_reference_case() {
        let (network, costs, budgets, params) = reference_setup();
        let metrics = evaluate(
            &network,
            &costs,
            &budgets,
            &params,
            &reference_scenarios(),
        )
        .unwrap();

        assert!(metrics.evpi >= -COST_TOLERANCE);
        assert!(metrics.vss >= -COST_TOLERANCE);
        assert!(metrics.ws <= metrics.rp + COST_TOLERANCE);
        assert!(metrics.eev >= metrics.rp - COST_TOLERANCE);
        assert!((metrics.evpi - (metrics.rp - metrics.ws)).abs() < 1e-9);
        assert!((metrics.vss - (metrics.eev - metrics.rp)).abs() < 1e-9);
        // hedging buys real value here: the naive planner ignores the
        // five-line attack entirely
        assert!(metrics.vss > 1.0);
        assert_eq!(
            metrics.investment_cost,
            costs.investment_cost(&metrics.plan)
        );
    }

    #[test]
    fn test_degenerate_single_scenario_collapses_metrics() {
        let (network, costs, budgets, params) = reference_setup();
        let scenarios = vec![Scenario::new("s1", 1.0, vec![2, 11])];
        let metrics =
            evaluate(&network, &costs, &budgets, &params, &scenarios)
                .unwrap();

        // with one certain scenario, foresight and hedging are worthless
        assert!(metrics.evpi.abs() < 1e-3);
        assert!(metrics.vss.abs() < 1e-3);
        assert!((metrics.ws - metrics.rp).abs() < 1e-3);
        assert!((metrics.eev - metrics.rp).abs() < 1e-3);
    }

    #[test]
    fn test_rejects_probabilities_not_summing_to_one() {
        let (network, costs, budgets, params) = reference_setup();
        let scenarios = vec![
            Scenario::new("s1", 0.5, vec![2, 11]),
            Scenario::new("s2", 0.3, vec![2, 5]),
        ];
        let result =
            evaluate(&network, &costs, &budgets, &params, &scenarios);
        assert!(matches!(result, Err(PlanError::Scenario(_))));
    }

    #[test]
    fn test_rejects_attack_on_unknown_line_before_solving() {
        let (network, costs, budgets, params) = reference_setup();
        let scenarios = vec![
            Scenario::new("s1", 0.9, vec![2, 11]),
            Scenario::new("s2", 0.1, vec![404]),
        ];
        let result =
            evaluate(&network, &costs, &budgets, &params, &scenarios);
        assert!(matches!(result, Err(PlanError::Scenario(_))));
    }
}
