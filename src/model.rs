use crate::error::{PlanError, PlanResult};
use crate::investment::{Budgets, Costs, InvestmentPlan};
use crate::network::Network;
use crate::scenario::{validate_scenarios, Scenario};
use crate::solver;

/// Tolerance for classifying solver floating-point output as a physical
/// quantity ("is this line energized", "did any shedding occur").
pub const PHYSICAL_TOLERANCE: f64 = 1e-3;

/// Tolerance for cost-equality comparisons between solved objectives.
pub const COST_TOLERANCE: f64 = 1e-4;

const BINARY_THRESHOLD: f64 = 0.5;

/// Calibration and solve parameters shared by every model variant.
#[derive(Debug, Clone)]
pub struct ModelParams {
    /// Flow magnitude bound per line, in p.u. of base power.
    pub flow_capacity_pu: f64,
    /// Bounds on the squared voltage magnitude, in p.u.
    pub voltage_sq_min: f64,
    pub voltage_sq_max: f64,
    /// Explicit big-M override; derived from the bounds when absent.
    pub big_m: Option<f64>,
    pub time_limit_secs: f64,
    pub verbose_solver: bool,
    /// Directory where infeasible models are persisted for inspection.
    pub infeasible_dump: Option<String>,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            flow_capacity_pu: 10.0,
            voltage_sq_min: 0.81,
            voltage_sq_max: 1.21,
            big_m: None,
            time_limit_secs: 300.0,
            verbose_solver: false,
            infeasible_dump: None,
        }
    }
}

impl ModelParams {
    /// M must dominate the maximum voltage spread plus the largest
    /// linearized drop any feasible flow can produce, so the relaxed
    /// voltage equation is vacuous whenever the line is open.
    pub fn effective_big_m(&self, network: &Network) -> f64 {
        match self.big_m {
            Some(value) => value,
            None => {
                let worst_drop = network
                    .lines
                    .iter()
                    .map(|l| l.resistance_pu + l.reactance_pu)
                    .fold(0.0, f64::max)
                    * 2.0
                    * self.flow_capacity_pu;
                (self.voltage_sq_max - self.voltage_sq_min) + worst_drop
            }
        }
    }
}

/// Whether the hardening/siting decisions are free binary variables or
/// constants fixed to a given plan. The fixed variant re-solves only the
/// recourse dispatch and is what prices a plan under scenarios it was
/// not optimized for.
#[derive(Debug, Clone, Copy)]
pub enum FirstStage<'a> {
    Free,
    Fixed(&'a InvestmentPlan),
}

/// Helper accessor for indexing the first-stage columns. Empty vectors
/// when the first stage is fixed.
#[derive(Debug, Default)]
struct InvestmentAccessors {
    hardened: Vec<usize>,
    sited: Vec<usize>,
}

/// Helper accessor for indexing one scenario's second-stage columns.
/// Line-indexed and node-indexed vectors follow the network ordering;
/// generation follows the candidate-node ordering.
#[derive(Debug)]
struct ScenarioAccessors {
    energized: Vec<usize>,
    flow_p: Vec<usize>,
    flow_q: Vec<usize>,
    voltage: Vec<usize>,
    shed_p: Vec<usize>,
    shed_q: Vec<usize>,
    generation: Vec<usize>,
}

/// The energized/open state and dispatch of one scenario after a solve.
/// Read-only for metrics and reporting.
#[derive(Debug, Clone)]
pub struct DispatchSolution {
    pub scenario: String,
    pub energized: Vec<bool>,
    pub flow_p_pu: Vec<f64>,
    pub flow_q_pu: Vec<f64>,
    pub voltage_sq_pu: Vec<f64>,
    pub shed_p_pu: Vec<f64>,
    pub shed_q_pu: Vec<f64>,
    pub generation_pu: Vec<f64>,
    pub total_shed_kw: f64,
}

impl DispatchSolution {
    pub fn energized_count(&self) -> usize {
        self.energized.iter().filter(|e| **e).count()
    }

    pub fn has_shedding(&self) -> bool {
        self.shed_p_pu.iter().any(|shed| *shed > PHYSICAL_TOLERANCE)
    }
}

/// The outcome of one two-stage solve: the (chosen or evaluated) plan,
/// its capital cost, the total objective and the per-scenario dispatch.
#[derive(Debug, Clone)]
pub struct PlanningSolution {
    pub plan: InvestmentPlan,
    pub investment_cost: f64,
    pub objective: f64,
    pub dispatch: Vec<DispatchSolution>,
}

impl PlanningSolution {
    pub fn operational_cost(&self) -> f64 {
        self.objective - self.investment_cost
    }
}

/// Helper function for setting the same default solver options on
/// every solved problem. The MIP gaps are pinned so solved objectives
/// are comparable at the cost tolerance.
fn set_default_solver_options(model: &mut solver::Model, params: &ModelParams) {
    model.set_verbosity(params.verbose_solver);
    model.set_option("presolve", "on");
    model.set_option("threads", 1);
    model.set_option("mip_rel_gap", 0.0);
    model.set_option("mip_abs_gap", 0.0);
    model.set_option("primal_feasibility_tolerance", 1e-7);
    model.set_option("time_limit", params.time_limit_secs);
}

/// The two-stage investment model: one shared first stage plus an
/// independent copy of the linearized DistFlow constraint system per
/// scenario. The deterministic model is the degenerate single-scenario
/// case. Building performs no solving; the scenario set is validated
/// before any variable is declared.
pub struct TwoStageModel<'a> {
    network: &'a Network,
    costs: &'a Costs,
    scenarios: Vec<Scenario>,
    fixed_plan: Option<InvestmentPlan>,
    candidates: Vec<usize>,
    investment: InvestmentAccessors,
    scenario_vars: Vec<ScenarioAccessors>,
    params: ModelParams,
    context: String,
    model: solver::Model,
}

impl<'a> TwoStageModel<'a> {
    pub fn build(
        network: &'a Network,
        costs: &'a Costs,
        budgets: &Budgets,
        params: &ModelParams,
        scenarios: &[Scenario],
        first_stage: FirstStage,
    ) -> PlanResult<Self> {
        validate_scenarios(scenarios, network)?;
        let fixed_plan = match first_stage {
            FirstStage::Free => None,
            FirstStage::Fixed(plan) => {
                validate_fixed_plan(plan, network, budgets)?;
                Some(plan.clone())
            }
        };
        let context = scenarios
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<&str>>()
            .join("+");

        let candidates = network.candidate_indices();
        let num_nodes = network.nodes.len();
        let num_lines = network.lines.len();
        let cap = params.flow_capacity_pu;
        let gen_cap_pu =
            costs.generator_capacity_kw / network.base_power_kva;
        let big_m = params.effective_big_m(network);

        let mut pb = solver::Problem::new();

        // First-stage columns and budget rows, declared once and shared
        // by every scenario block.
        let mut investment = InvestmentAccessors::default();
        match &fixed_plan {
            None => {
                investment.hardened = (0..num_lines)
                    .map(|_| {
                        pb.add_integer_column(
                            costs.hardening_per_line,
                            0.0..=1.0,
                        )
                    })
                    .collect();
                investment.sited = candidates
                    .iter()
                    .map(|_| {
                        pb.add_integer_column(
                            costs.generator_unit_cost(),
                            0.0..=1.0,
                        )
                    })
                    .collect();
                let hardened_factors: Vec<(usize, f64)> = investment
                    .hardened
                    .iter()
                    .map(|col| (*col, 1.0))
                    .collect();
                pb.add_row(..=(budgets.hardening as f64), &hardened_factors);
                let sited_factors: Vec<(usize, f64)> = investment
                    .sited
                    .iter()
                    .map(|col| (*col, 1.0))
                    .collect();
                pb.add_row(..=(budgets.generators as f64), &sited_factors);
            }
            Some(plan) => {
                // First-stage choices are constants: the capital cost
                // enters through the objective offset and the coupling
                // constraints collapse into variable bounds below.
                pb.offset = costs.investment_cost(plan);
            }
        }

        let mut scenario_vars =
            Vec::<ScenarioAccessors>::with_capacity(scenarios.len());
        for scenario in scenarios.iter() {
            let prob = scenario.probability;

            let energized: Vec<usize> = network
                .lines
                .iter()
                .map(|line| {
                    let upper = match &fixed_plan {
                        // an attacked line a fixed plan did not harden
                        // can never be energized in this scenario
                        Some(plan)
                            if scenario.attack.contains(&line.id)
                                && !plan.is_hardened(line.id) =>
                        {
                            0.0
                        }
                        _ => 1.0,
                    };
                    pb.add_integer_column(
                        prob * costs.switching_penalty,
                        0.0..=upper,
                    )
                })
                .collect();
            let flow_p: Vec<usize> = (0..num_lines)
                .map(|_| pb.add_column(0.0, -cap..=cap))
                .collect();
            let flow_q: Vec<usize> = (0..num_lines)
                .map(|_| pb.add_column(0.0, -cap..=cap))
                .collect();
            let voltage: Vec<usize> = network
                .nodes
                .iter()
                .map(|node| {
                    if node.slack {
                        pb.add_column(0.0, 1.0..=1.0)
                    } else {
                        pb.add_column(
                            0.0,
                            params.voltage_sq_min..=params.voltage_sq_max,
                        )
                    }
                })
                .collect();
            let shed_p: Vec<usize> = network
                .nodes
                .iter()
                .map(|node| {
                    pb.add_column(
                        prob * costs.shedding_per_kw
                            * network.base_power_kva,
                        0.0..=node.load_p_pu,
                    )
                })
                .collect();
            let shed_q: Vec<usize> = network
                .nodes
                .iter()
                .map(|node| pb.add_column(0.0, 0.0..=node.load_q_pu))
                .collect();
            let generation: Vec<usize> = candidates
                .iter()
                .map(|node_index| {
                    let upper = match &fixed_plan {
                        Some(plan) => {
                            let node_id = network.nodes[*node_index].id;
                            if plan.has_generator(node_id) {
                                gen_cap_pu
                            } else {
                                0.0
                            }
                        }
                        None => gen_cap_pu,
                    };
                    pb.add_column(0.0, 0.0..=upper)
                })
                .collect();

            // Attack coupling: an attacked line stays energizable only
            // if the defender hardened it.
            if fixed_plan.is_none() {
                for line_id in scenario.attack.iter() {
                    let line_index = network
                        .line_index(*line_id)
                        .expect("attack set validated against topology");
                    pb.add_row(
                        ..=0.0,
                        [
                            (energized[line_index], 1.0),
                            (investment.hardened[line_index], -1.0),
                        ],
                    );
                }
                // Generator coupling: output only where a unit is sited.
                for (position, gen_col) in generation.iter().enumerate() {
                    pb.add_row(
                        ..=0.0,
                        [
                            (*gen_col, 1.0),
                            (investment.sited[position], -gen_cap_pu),
                        ],
                    );
                }
            }

            // Nodal balance, real and reactive, for every node but the
            // slack: incoming - outgoing + generation + shed = demand.
            for (node_index, node) in network.nodes.iter().enumerate() {
                if node.slack {
                    continue;
                }
                let mut factors_p: Vec<(usize, f64)> = vec![];
                let mut factors_q: Vec<(usize, f64)> = vec![];
                for line_index in node.in_line_indices.iter() {
                    factors_p.push((flow_p[*line_index], 1.0));
                    factors_q.push((flow_q[*line_index], 1.0));
                }
                for line_index in node.out_line_indices.iter() {
                    factors_p.push((flow_p[*line_index], -1.0));
                    factors_q.push((flow_q[*line_index], -1.0));
                }
                if let Some(candidate_pos) =
                    candidates.iter().position(|c| *c == node_index)
                {
                    factors_p.push((generation[candidate_pos], 1.0));
                }
                factors_p.push((shed_p[node_index], 1.0));
                factors_q.push((shed_q[node_index], 1.0));
                pb.add_row(node.load_p_pu..=node.load_p_pu, &factors_p);
                pb.add_row(node.load_q_pu..=node.load_q_pu, &factors_q);
            }

            // Switch coupling and linearized voltage drop per line. The
            // capacity rows are the only flow magnitude bound and force
            // P = Q = 0 on an open line.
            for (line_index, line) in network.lines.iter().enumerate() {
                let v = energized[line_index];
                let p = flow_p[line_index];
                let q = flow_q[line_index];
                pb.add_row(..=0.0, [(p, 1.0), (v, -cap)]);
                pb.add_row(0.0.., [(p, 1.0), (v, cap)]);
                pb.add_row(..=0.0, [(q, 1.0), (v, -cap)]);
                pb.add_row(0.0.., [(q, 1.0), (v, cap)]);

                let from_index = network
                    .node_index(line.from)
                    .expect("validated topology");
                let to_index = network
                    .node_index(line.to)
                    .expect("validated topology");
                let drop_terms = [
                    (voltage[from_index], 1.0),
                    (voltage[to_index], -1.0),
                    (p, -2.0 * line.resistance_pu),
                    (q, -2.0 * line.reactance_pu),
                ];
                // U_i - U_j - 2(RP + XQ) <= M(1 - v), and symmetric
                let mut upper_terms = drop_terms.to_vec();
                upper_terms.push((v, big_m));
                pb.add_row(..=big_m, &upper_terms);
                let mut lower_terms = drop_terms.to_vec();
                lower_terms.push((v, -big_m));
                pb.add_row(-big_m.., &lower_terms);
            }

            // Radiality: at most |nodes| - 1 energized lines. Bounds the
            // edge count only; soundness rests on the validated feeder
            // topology.
            let radiality_factors: Vec<(usize, f64)> =
                energized.iter().map(|col| (*col, 1.0)).collect();
            pb.add_row(..=(num_nodes as f64 - 1.0), &radiality_factors);

            scenario_vars.push(ScenarioAccessors {
                energized,
                flow_p,
                flow_q,
                voltage,
                shed_p,
                shed_q,
                generation,
            });
        }

        let mut model = pb.optimise(solver::Sense::Minimise);
        set_default_solver_options(&mut model, params);

        Ok(Self {
            network,
            costs,
            scenarios: scenarios.to_vec(),
            fixed_plan,
            candidates,
            investment,
            scenario_vars,
            params: params.clone(),
            context,
            model,
        })
    }

    /// Runs the solver and extracts the plan and per-scenario dispatch.
    /// Infeasibility and time-limit expiry surface as distinct errors;
    /// an infeasible model is persisted first when a dump directory is
    /// configured.
    pub fn solve(mut self) -> PlanResult<PlanningSolution> {
        if self.model.try_solve().is_err() {
            return Err(PlanError::Solver {
                context: self.context.clone(),
                status: self.model.status(),
            });
        }
        match self.model.status() {
            solver::HighsModelStatus::Optimal => Ok(self.extract()),
            solver::HighsModelStatus::Infeasible => {
                if let Some(dir) = &self.params.infeasible_dump {
                    let path =
                        format!("{}/infeasible_{}.lp", dir, self.context);
                    // dump failures must not mask the infeasibility
                    let _ = self.model.write_model(&path);
                }
                Err(PlanError::Infeasible {
                    context: self.context.clone(),
                })
            }
            solver::HighsModelStatus::ReachedTimeLimit => {
                Err(PlanError::TimeLimit {
                    context: self.context.clone(),
                })
            }
            status => Err(PlanError::Solver {
                context: self.context.clone(),
                status,
            }),
        }
    }

    fn extract(&self) -> PlanningSolution {
        let solution = self.model.get_solution();
        let objective = self.model.get_objective_value();

        let plan = match &self.fixed_plan {
            Some(plan) => plan.clone(),
            None => {
                let hardened = self
                    .investment
                    .hardened
                    .iter()
                    .enumerate()
                    .filter(|(_, col)| {
                        solution.colvalue[**col] > BINARY_THRESHOLD
                    })
                    .map(|(index, _)| self.network.lines[index].id)
                    .collect();
                let sites = self
                    .investment
                    .sited
                    .iter()
                    .enumerate()
                    .filter(|(_, col)| {
                        solution.colvalue[**col] > BINARY_THRESHOLD
                    })
                    .map(|(position, _)| {
                        self.network.nodes[self.candidates[position]].id
                    })
                    .collect();
                InvestmentPlan::new(hardened, sites)
            }
        };
        let investment_cost = self.costs.investment_cost(&plan);

        let dispatch = self
            .scenarios
            .iter()
            .zip(self.scenario_vars.iter())
            .map(|(scenario, vars)| {
                let values = |cols: &[usize]| -> Vec<f64> {
                    cols.iter().map(|c| solution.colvalue[*c]).collect()
                };
                let shed_p_pu = values(&vars.shed_p);
                let total_shed_kw = shed_p_pu.iter().sum::<f64>()
                    * self.network.base_power_kva;
                let mut generation_pu = vec![0.0; self.network.nodes.len()];
                for (position, node_index) in
                    self.candidates.iter().enumerate()
                {
                    generation_pu[*node_index] =
                        solution.colvalue[vars.generation[position]];
                }
                DispatchSolution {
                    scenario: scenario.name.clone(),
                    energized: vars
                        .energized
                        .iter()
                        .map(|c| solution.colvalue[*c] > BINARY_THRESHOLD)
                        .collect(),
                    flow_p_pu: values(&vars.flow_p),
                    flow_q_pu: values(&vars.flow_q),
                    voltage_sq_pu: values(&vars.voltage),
                    shed_p_pu,
                    shed_q_pu: values(&vars.shed_q),
                    generation_pu,
                    total_shed_kw,
                }
            })
            .collect();

        PlanningSolution {
            plan,
            investment_cost,
            objective,
            dispatch,
        }
    }
}

fn validate_fixed_plan(
    plan: &InvestmentPlan,
    network: &Network,
    budgets: &Budgets,
) -> PlanResult<()> {
    for line_id in plan.hardened.iter() {
        if network.line_index(*line_id).is_none() {
            return Err(PlanError::Plan(format!(
                "hardened line {} does not exist",
                line_id
            )));
        }
    }
    for node_id in plan.generator_sites.iter() {
        match network.node_index(*node_id) {
            None => {
                return Err(PlanError::Plan(format!(
                    "generator site {} does not exist",
                    node_id
                )))
            }
            Some(index) if network.nodes[index].slack => {
                return Err(PlanError::Plan(format!(
                    "generator site {} is the slack node",
                    node_id
                )))
            }
            Some(_) => {}
        }
    }
    if plan.hardened.len() > budgets.hardening
        || plan.generator_sites.len() > budgets.generators
    {
        return Err(PlanError::Plan(
            "plan exceeds the investment budgets".to_string(),
        ));
    }
    Ok(())
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

    #[test]
    fn test_deterministic_no_attack_serves_all_load() {
        let (network, costs, budgets, params) = reference_setup();
        let scenarios = vec![Scenario::new("base", 1.0, vec![])];
        let solution = TwoStageModel::build(
            &network,
            &costs,
            &budgets,
            &params,
            &scenarios,
            FirstStage::Free,
        )
        .unwrap()
        .solve()
        .unwrap();

        let dispatch = &solution.dispatch[0];
        assert!(!dispatch.has_shedding());
        assert!(dispatch.energized_count() <= network.nodes.len() - 1);
        // nothing to defend against, so nothing is bought
        assert_eq!(solution.plan, InvestmentPlan::empty());
        assert!(solution.objective < 1.0);
    }

    #[test]
    fn test_open_lines_carry_no_flow() {
        let (network, costs, budgets, params) = reference_setup();
        let scenarios = vec![Scenario::new("s2", 1.0, vec![2, 5, 8, 14, 15])];
        let solution = TwoStageModel::build(
            &network,
            &costs,
            &budgets,
            &params,
            &scenarios,
            FirstStage::Free,
        )
        .unwrap()
        .solve()
        .unwrap();

        let dispatch = &solution.dispatch[0];
        for (line_index, energized) in dispatch.energized.iter().enumerate() {
            if !energized {
                assert!(
                    dispatch.flow_p_pu[line_index].abs() < PHYSICAL_TOLERANCE
                );
                assert!(
                    dispatch.flow_q_pu[line_index].abs() < PHYSICAL_TOLERANCE
                );
            }
        }
    }

    #[test]
    fn test_attacked_unhardened_lines_stay_open() {
        let (network, costs, budgets, params) = reference_setup();
        let attack = vec![2, 5, 8, 14, 15];
        let scenarios = vec![Scenario::new("s2", 1.0, attack.clone())];
        let solution = TwoStageModel::build(
            &network,
            &costs,
            &budgets,
            &params,
            &scenarios,
            FirstStage::Free,
        )
        .unwrap()
        .solve()
        .unwrap();

        let dispatch = &solution.dispatch[0];
        for line_id in attack {
            if !solution.plan.is_hardened(line_id) {
                let index = network.line_index(line_id).unwrap();
                assert!(!dispatch.energized[index]);
            }
        }
        assert!(solution.plan.hardened.len() <= 1);
        assert!(solution.plan.generator_sites.len() <= 1);
    }

    #[test]
    fn test_nodal_balance_holds() {
        let (network, costs, budgets, params) = reference_setup();
        let scenarios = vec![Scenario::new("s1", 1.0, vec![2, 11])];
        let solution = TwoStageModel::build(
            &network,
            &costs,
            &budgets,
            &params,
            &scenarios,
            FirstStage::Free,
        )
        .unwrap()
        .solve()
        .unwrap();

        let dispatch = &solution.dispatch[0];
        for (node_index, node) in network.nodes.iter().enumerate() {
            if node.slack {
                continue;
            }
            let incoming: f64 = node
                .in_line_indices
                .iter()
                .map(|l| dispatch.flow_p_pu[*l])
                .sum();
            let outgoing: f64 = node
                .out_line_indices
                .iter()
                .map(|l| dispatch.flow_p_pu[*l])
                .sum();
            let balance = incoming - outgoing
                + dispatch.generation_pu[node_index]
                + dispatch.shed_p_pu[node_index]
                - node.load_p_pu;
            assert!(balance.abs() < PHYSICAL_TOLERANCE);
        }
    }

    #[test]
    fn test_two_eleven_attack_is_survivable_within_budget() {
        let (network, costs, budgets, params) = reference_setup();
        let scenarios = vec![Scenario::new("s1", 1.0, vec![2, 11])];
        let solution = TwoStageModel::build(
            &network,
            &costs,
            &budgets,
            &params,
            &scenarios,
            FirstStage::Free,
        )
        .unwrap()
        .solve()
        .unwrap();

        assert!(!solution.dispatch[0].has_shedding());
        assert!(solution.plan.hardened.len() <= 1);
        assert!(solution.plan.generator_sites.len() <= 1);
    }

    #[test]
    fn test_weighted_five_line_attack_sheds_where_generator_is_too_dear() {
        // With the rare scenario at probability 0.1, saving the stranded
        // node is worth less than the $150 generator, so the optimum
        // sheds there instead.
        let (network, costs, budgets, params) = reference_setup();
        let scenarios = vec![
            Scenario::new("s1", 0.9, vec![2, 11]),
            Scenario::new("s2", 0.1, vec![2, 5, 8, 14, 15]),
        ];
        let solution = TwoStageModel::build(
            &network,
            &costs,
            &budgets,
            &params,
            &scenarios,
            FirstStage::Free,
        )
        .unwrap()
        .solve()
        .unwrap();

        let rare = &solution.dispatch[1];
        assert!(rare.has_shedding());
        assert!(rare.total_shed_kw > 1.0);
        let shed_cost_weighted =
            0.1 * rare.total_shed_kw * costs.shedding_per_kw;
        assert!(shed_cost_weighted < costs.generator_unit_cost());
    }

    #[test]
    fn test_fixed_plan_reproduces_free_objective() {
        let (network, costs, budgets, params) = reference_setup();
        let scenarios = vec![
            Scenario::new("s1", 0.9, vec![2, 11]),
            Scenario::new("s2", 0.1, vec![2, 5, 8, 14, 15]),
        ];
        let free = TwoStageModel::build(
            &network,
            &costs,
            &budgets,
            &params,
            &scenarios,
            FirstStage::Free,
        )
        .unwrap()
        .solve()
        .unwrap();
        let fixed = TwoStageModel::build(
            &network,
            &costs,
            &budgets,
            &params,
            &scenarios,
            FirstStage::Fixed(&free.plan),
        )
        .unwrap()
        .solve()
        .unwrap();

        // fixing the optimal plan must price out to the same objective
        assert!((fixed.objective - free.objective).abs() < COST_TOLERANCE);
        assert_eq!(fixed.plan, free.plan);
    }

    #[test]
    fn test_rejects_attack_on_unknown_line() {
        let (network, costs, budgets, params) = reference_setup();
        let scenarios = vec![Scenario::new("bad", 1.0, vec![99])];
        let result = TwoStageModel::build(
            &network,
            &costs,
            &budgets,
            &params,
            &scenarios,
            FirstStage::Free,
        );
        assert!(matches!(result, Err(PlanError::Scenario(_))));
    }

    #[test]
    fn test_rejects_fixed_plan_over_budget() {
        let (network, costs, budgets, params) = reference_setup();
        let scenarios = vec![Scenario::new("s1", 1.0, vec![])];
        let plan = InvestmentPlan::new(vec![1, 2], vec![]);
        let result = TwoStageModel::build(
            &network,
            &costs,
            &budgets,
            &params,
            &scenarios,
            FirstStage::Fixed(&plan),
        );
        assert!(matches!(result, Err(PlanError::Plan(_))));
    }

    #[test]
    fn test_derived_big_m_dominates_feasible_drops() {
        let (network, _, _, params) = reference_setup();
        let big_m = params.effective_big_m(&network);
        let worst_line_drop = network
            .lines
            .iter()
            .map(|l| {
                2.0 * (l.resistance_pu + l.reactance_pu)
                    * params.flow_capacity_pu
            })
            .fold(0.0, f64::max);
        let spread = params.voltage_sq_max - params.voltage_sq_min;
        assert!(big_m >= spread + worst_line_drop - 1e-12);
        // explicit override wins
        let mut custom = params.clone();
        custom.big_m = Some(10.0);
        assert_eq!(custom.effective_big_m(&network), 10.0);
    }
}
