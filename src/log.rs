use crate::metrics::CaseMetrics;
use crate::scenario::{AttackLegend, Scenario};
use crate::sensitivity::{SweepRecord, SweepTemplate};
use crate::utils::format_ids;
use std::time::Duration;

/// Helper function for displaying the run greeting
pub fn show_greeting() {
    println!("# gridhard - resilient feeder investment planning");
    println!("- Started at {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
}

pub fn input_reading_line(path: &str) {
    println!("- Inputs read from {path}\n");
}

/// Helper function for displaying the attack pattern legend
pub fn legend(legend: &AttackLegend) {
    println!("# Attack patterns");
    println!("{0: ^6} | {1: <30}", "code", "attacked lines");
    println!("--------------------------------------");
    for (code, pattern) in legend.patterns.iter() {
        println!("{0: ^6} | {1: <30}", code, format_ids(pattern));
    }
    println!();
}

/// Helper function for displaying the case analysis table header
pub fn case_table_header() {
    println!("# Case analysis");
    println!(
        "{0: <10} | {1: <18} | {2: <10} | {3: <8} | {4: >9} | {5: >9} | {6: >9} | {7: >9} | {8: >9}",
        "case", "probs (code)", "hardened", "sites", "RP ($)", "WS ($)",
        "EEV ($)", "EVPI ($)", "VSS ($)"
    );
    case_table_divider();
}

pub fn case_table_divider() {
    println!(
        "-------------------------------------------------------------------------------------------------------------"
    )
}

/// Helper function for displaying a row of case analysis results
pub fn case_table_row(
    name: &str,
    scenarios: &[Scenario],
    attack_legend: &AttackLegend,
    case: &CaseMetrics,
) {
    let probs = scenarios
        .iter()
        .map(|s| format!("{}({})", s.probability, attack_legend.code_for(s)))
        .collect::<Vec<String>>()
        .join("/");
    println!(
        "{0: <10} | {1: <18} | {2: <10} | {3: <8} | {4: >9.1} | {5: >9.1} | {6: >9.1} | {7: >9.1} | {8: >9.1}",
        name,
        probs,
        format_ids(&case.plan.hardened),
        format_ids(&case.plan.generator_sites),
        case.rp,
        case.ws,
        case.eev,
        case.evpi,
        case.vss
    )
}

/// Helper function for displaying the sweep greeting
pub fn sweep_greeting(template: &SweepTemplate) {
    println!("\n# Sensitivity sweep");
    println!("- Base attack: {}", format_ids(&template.base_attack));
    println!("- Swept attack: {}", format_ids(&template.swept_attack));
    println!("- Grid points: {}\n", template.grid_points);
}

pub fn sweep_table_header() {
    println!(
        "{0: >8} | {1: >9} | {2: >9} | {3: >10} | {4: <10} | {5: <8} | {6: <18}",
        "prob", "RP ($)", "VSS ($)", "invest ($)", "hardened", "sites",
        "transition"
    );
    println!(
        "--------------------------------------------------------------------------------------"
    );
}

/// Helper function for displaying a row of sweep results
pub fn sweep_table_row(record: &SweepRecord) {
    println!(
        "{0: >8.1} | {1: >9.1} | {2: >9.1} | {3: >10.1} | {4: <10} | {5: <8} | {6: <18}",
        record.probability,
        record.rp,
        record.vss,
        record.investment_cost,
        format_ids(&record.plan.hardened),
        format_ids(&record.plan.generator_sites),
        record.transition.label()
    )
}

pub fn output_generation_line(path: &str) {
    println!("\n- Writing outputs to {path}");
}

pub fn show_farewell(time: Duration) {
    println!(
        "\nTotal analysis time: {:.2} s",
        time.as_millis() as f64 / 1000.0
    )
}
