mod error;
pub mod input;
pub mod investment;
mod log;
pub mod metrics;
pub mod model;
pub mod network;
pub mod output;
pub mod scenario;
pub mod sensitivity;
pub mod solver;
pub mod utils;

pub use error::{PlanError, PlanResult};

use input::Input;
use scenario::AttackLegend;
use std::time::Instant;

pub fn run(input_args: &InputArgs) -> PlanResult<()> {
    log::show_greeting();

    let begin = Instant::now();
    let input = Input::build(&input_args.path)?;
    log::input_reading_line(&input_args.path);

    let network = input.network.build_network()?;
    let costs = input.config.build_costs();
    let budgets = input.config.build_budgets();
    let params = input.config.build_params();

    let cases = input.cases.build_cases();
    let attack_legend = AttackLegend::build(&cases);
    log::legend(&attack_legend);

    log::case_table_header();
    let mut results = Vec::<metrics::CaseMetrics>::new();
    for (name, scenarios) in cases.iter() {
        let case = metrics::evaluate(
            &network, &costs, &budgets, &params, scenarios,
        )?;
        log::case_table_row(name, scenarios, &attack_legend, &case);
        results.push(case);
    }
    log::case_table_divider();

    let sweep_records = match input.cases.build_sweep_template() {
        Some(template) => {
            log::sweep_greeting(&template);
            log::sweep_table_header();
            let records = sensitivity::sweep(
                &network, &costs, &budgets, &params, &template,
            )?;
            for record in records.iter() {
                log::sweep_table_row(record);
            }
            Some(records)
        }
        None => None,
    };

    log::output_generation_line(&input_args.path);
    output::generate_outputs(
        &cases,
        &results,
        &attack_legend,
        sweep_records.as_deref(),
        &input_args.path,
    )?;

    log::show_farewell(begin.elapsed());

    Ok(())
}

pub struct InputArgs {
    pub path: String,
}

impl InputArgs {
    pub fn build(args: &[String]) -> Result<Self, &'static str> {
        if args.len() < 2 {
            return Err("Not enough arguments [PATH]");
        }

        let path = args[1].clone();

        Ok(Self { path })
    }
}
