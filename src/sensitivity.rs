use crate::error::{PlanError, PlanResult};
use crate::investment::{Budgets, Costs, InvestmentPlan};
use crate::metrics;
use crate::model::{ModelParams, COST_TOLERANCE};
use crate::network::Network;
use crate::scenario::Scenario;

/// A two-scenario sweep template: the second attack pattern's
/// probability scans the grid, the first takes the complement.
#[derive(Debug, Clone)]
pub struct SweepTemplate {
    pub base_attack: Vec<usize>,
    pub swept_attack: Vec<usize>,
    pub grid_points: usize,
}

impl SweepTemplate {
    pub fn new(
        base_attack: Vec<usize>,
        swept_attack: Vec<usize>,
        grid_points: usize,
    ) -> Self {
        Self {
            base_attack,
            swept_attack,
            grid_points,
        }
    }
}

/// How the optimal plan moved between adjacent grid points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Same plan as the previous grid point.
    None,
    /// Different plan at equivalent cost.
    AlternateOptimum,
    /// Different plan with materially different cost.
    TippingPoint,
}

impl Transition {
    pub fn label(&self) -> &'static str {
        match self {
            Transition::None => "",
            Transition::AlternateOptimum => "alternate optimum",
            Transition::TippingPoint => "tipping point",
        }
    }
}

/// One grid point of the sweep.
#[derive(Debug, Clone)]
pub struct SweepRecord {
    pub probability: f64,
    pub rp: f64,
    pub vss: f64,
    pub investment_cost: f64,
    pub plan: InvestmentPlan,
    pub transition: Transition,
}

/// A decision change is a difference in either sorted investment set;
/// whether it is a tipping point depends on the objective moving by
/// more than the cost tolerance.
pub fn classify_transition(
    previous_plan: &InvestmentPlan,
    previous_rp: f64,
    plan: &InvestmentPlan,
    rp: f64,
) -> Transition {
    if plan == previous_plan {
        Transition::None
    } else if (rp - previous_rp).abs() > COST_TOLERANCE {
        Transition::TippingPoint
    } else {
        Transition::AlternateOptimum
    }
}

/// Runs the full metrics engine at every grid point of the swept
/// probability, in increasing order, flagging plan transitions along
/// the way. Grid points are independent solves; they run sequentially
/// so each record can be classified against its predecessor as it
/// arrives.
pub fn sweep(
    network: &Network,
    costs: &Costs,
    budgets: &Budgets,
    params: &ModelParams,
    template: &SweepTemplate,
) -> PlanResult<Vec<SweepRecord>> {
    if template.grid_points < 2 {
        return Err(PlanError::Scenario(
            "sensitivity sweep needs at least two grid points".to_string(),
        ));
    }

    let mut records = Vec::<SweepRecord>::with_capacity(template.grid_points);
    for point in 0..template.grid_points {
        let swept_probability =
            point as f64 / (template.grid_points - 1) as f64;
        let scenarios = vec![
            Scenario::new(
                "s1",
                1.0 - swept_probability,
                template.base_attack.clone(),
            ),
            Scenario::new(
                "s2",
                swept_probability,
                template.swept_attack.clone(),
            ),
        ];
        let case = metrics::evaluate(
            network, costs, budgets, params, &scenarios,
        )?;
        let transition = match records.last() {
            None => Transition::None,
            Some(previous) => classify_transition(
                &previous.plan,
                previous.rp,
                &case.plan,
                case.rp,
            ),
        };
        records.push(SweepRecord {
            probability: swept_probability,
            rp: case.rp,
            vss: case.vss,
            investment_cost: case.investment_cost,
            plan: case.plan,
            transition,
        });
    }
    Ok(records)
}
