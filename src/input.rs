use crate::error::PlanResult;
use crate::investment::{Budgets, Costs};
use crate::model::ModelParams;
use crate::network::{Network, Node};
use crate::scenario::Scenario;
use crate::sensitivity::SweepTemplate;
use serde::Deserialize;
use std::fs;

fn default_switching_penalty() -> f64 {
    0.01
}

fn default_time_limit() -> f64 {
    300.0
}

fn default_grid_points() -> usize {
    11
}

#[derive(Deserialize)]
pub struct ConfigInput {
    pub hardening_cost_per_line: f64,
    pub generator_cost_per_kw: f64,
    pub generator_capacity_kw: f64,
    pub shedding_cost_per_kw: f64,
    pub hardening_budget: usize,
    pub generator_budget: usize,
    #[serde(default = "default_switching_penalty")]
    pub switching_penalty: f64,
    pub big_m: Option<f64>,
    #[serde(default = "default_time_limit")]
    pub solver_time_limit_secs: f64,
    #[serde(default)]
    pub verbose_solver: bool,
    pub infeasible_dump: Option<String>,
}

pub fn read_config_input(filepath: &str) -> PlanResult<ConfigInput> {
    let contents = fs::read_to_string(filepath)?;
    Ok(serde_json::from_str(&contents)?)
}

impl ConfigInput {
    pub fn build_costs(&self) -> Costs {
        Costs::new(
            self.hardening_cost_per_line,
            self.generator_cost_per_kw,
            self.generator_capacity_kw,
            self.shedding_cost_per_kw,
            self.switching_penalty,
        )
    }

    pub fn build_budgets(&self) -> Budgets {
        Budgets::new(self.hardening_budget, self.generator_budget)
    }

    pub fn build_params(&self) -> ModelParams {
        ModelParams {
            big_m: self.big_m,
            time_limit_secs: self.solver_time_limit_secs,
            verbose_solver: self.verbose_solver,
            infeasible_dump: self.infeasible_dump.clone(),
            ..ModelParams::default()
        }
    }
}

#[derive(Deserialize)]
pub struct NodeInput {
    pub id: usize,
    pub load_kw: f64,
    #[serde(default)]
    pub slack: bool,
}

#[derive(Deserialize)]
pub struct LineInput {
    pub id: usize,
    pub from: usize,
    pub to: usize,
    pub resistance_ohm: f64,
    pub reactance_ohm: f64,
}

#[derive(Deserialize)]
pub struct NetworkInput {
    pub base_power_kva: f64,
    pub base_voltage_kv: f64,
    pub nodes: Vec<NodeInput>,
    pub lines: Vec<LineInput>,
}

pub fn read_network_input(filepath: &str) -> PlanResult<NetworkInput> {
    let contents = fs::read_to_string(filepath)?;
    Ok(serde_json::from_str(&contents)?)
}

impl NetworkInput {
    pub fn build_network(&self) -> PlanResult<Network> {
        let nodes = self
            .nodes
            .iter()
            .map(|n| Node::new(n.id, n.load_kw, n.slack))
            .collect();
        let lines = self
            .lines
            .iter()
            .map(|l| (l.id, l.from, l.to, l.resistance_ohm, l.reactance_ohm))
            .collect();
        Network::new(self.base_power_kva, self.base_voltage_kv, nodes, lines)
    }
}

#[derive(Deserialize)]
pub struct ScenarioInput {
    pub name: String,
    pub probability: f64,
    pub attack: Vec<usize>,
}

#[derive(Deserialize)]
pub struct CaseInput {
    pub name: String,
    pub scenarios: Vec<ScenarioInput>,
}

#[derive(Deserialize)]
pub struct SweepInput {
    pub base_attack: Vec<usize>,
    pub swept_attack: Vec<usize>,
    #[serde(default = "default_grid_points")]
    pub grid_points: usize,
}

#[derive(Deserialize)]
pub struct CasesInput {
    pub cases: Vec<CaseInput>,
    pub sweep: Option<SweepInput>,
}

pub fn read_cases_input(filepath: &str) -> PlanResult<CasesInput> {
    let contents = fs::read_to_string(filepath)?;
    Ok(serde_json::from_str(&contents)?)
}

impl CasesInput {
    pub fn build_cases(&self) -> Vec<(String, Vec<Scenario>)> {
        self.cases
            .iter()
            .map(|case| {
                let scenarios = case
                    .scenarios
                    .iter()
                    .map(|s| {
                        Scenario::new(&s.name, s.probability, s.attack.clone())
                    })
                    .collect();
                (case.name.clone(), scenarios)
            })
            .collect()
    }

    pub fn build_sweep_template(&self) -> Option<SweepTemplate> {
        self.sweep.as_ref().map(|sweep| {
            SweepTemplate::new(
                sweep.base_attack.clone(),
                sweep.swept_attack.clone(),
                sweep.grid_points,
            )
        })
    }
}

pub struct Input {
    pub config: ConfigInput,
    pub network: NetworkInput,
    pub cases: CasesInput,
}

impl Input {
    pub fn build(path: &str) -> PlanResult<Self> {
        let config = read_config_input(&(path.to_owned() + "/config.json"))?;
        let network =
            read_network_input(&(path.to_owned() + "/network.json"))?;
        let cases = read_cases_input(&(path.to_owned() + "/cases.json"))?;
        Ok(Self {
            config,
            network,
            cases,
        })
    }
}
