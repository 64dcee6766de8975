use crate::error::PlanResult;
use crate::metrics::CaseMetrics;
use crate::scenario::{AttackLegend, Scenario};
use crate::sensitivity::SweepRecord;
use crate::utils::format_ids;

use csv::Writer;
use serde;

/// Compact "probability(code)" rendering of a scenario set, e.g.
/// "0.9(A)/0.1(C)".
pub fn scenario_codes(
    scenarios: &[Scenario],
    legend: &AttackLegend,
) -> String {
    scenarios
        .iter()
        .map(|s| format!("{}({})", s.probability, legend.code_for(s)))
        .collect::<Vec<String>>()
        .join("/")
}

#[derive(serde::Serialize)]
struct CaseSummaryOutput {
    case: String,
    scenarios: String,
    hardened: String,
    generator_sites: String,
    rp: f64,
    ws: f64,
    eev: f64,
    evpi: f64,
    vss: f64,
}

fn write_case_summaries(
    cases: &[(String, Vec<Scenario>)],
    metrics: &[CaseMetrics],
    legend: &AttackLegend,
    path: &str,
) -> PlanResult<()> {
    let mut wtr = Writer::from_path(&(path.to_owned() + "/summary.csv"))?;
    for ((name, scenarios), case) in cases.iter().zip(metrics.iter()) {
        wtr.serialize(CaseSummaryOutput {
            case: name.clone(),
            scenarios: scenario_codes(scenarios, legend),
            hardened: format_ids(&case.plan.hardened),
            generator_sites: format_ids(&case.plan.generator_sites),
            rp: case.rp,
            ws: case.ws,
            eev: case.eev,
            evpi: case.evpi,
            vss: case.vss,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

#[derive(serde::Serialize)]
struct SweepPointOutput {
    probability: f64,
    rp: f64,
    vss: f64,
    investment_cost: f64,
    hardened: String,
    generator_sites: String,
    transition: String,
}

fn write_sweep_records(
    records: &[SweepRecord],
    path: &str,
) -> PlanResult<()> {
    let mut wtr =
        Writer::from_path(&(path.to_owned() + "/sensitivity.csv"))?;
    for record in records.iter() {
        wtr.serialize(SweepPointOutput {
            probability: record.probability,
            rp: record.rp,
            vss: record.vss,
            investment_cost: record.investment_cost,
            hardened: format_ids(&record.plan.hardened),
            generator_sites: format_ids(&record.plan.generator_sites),
            transition: record.transition.label().to_string(),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn generate_outputs(
    cases: &[(String, Vec<Scenario>)],
    metrics: &[CaseMetrics],
    legend: &AttackLegend,
    sweep_records: Option<&[SweepRecord]>,
    path: &str,
) -> PlanResult<()> {
    write_case_summaries(cases, metrics, legend, path)?;
    if let Some(records) = sweep_records {
        write_sweep_records(records, path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::investment::InvestmentPlan;
    use crate::model::PlanningSolution;
    use crate::sensitivity::Transition;
    use std::fs;

    fn fake_metrics(plan: InvestmentPlan) -> CaseMetrics {
        let investment_cost = 550.0;
        CaseMetrics {
            rp: 629.45,
            ws: 55.11,
            eev: 864.85,
            evpi: 574.34,
            vss: 235.4,
            plan: plan.clone(),
            investment_cost,
            recourse: PlanningSolution {
                plan,
                investment_cost,
                objective: 629.45,
                dispatch: vec![],
            },
        }
    }

    #[test]
    fn test_write_case_summaries() {
        let dir = std::env::temp_dir().join("gridhard_summary_test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.to_str().unwrap();

        let cases = vec![(
            "case_1".to_string(),
            vec![
                Scenario::new("s1", 0.9, vec![2, 11]),
                Scenario::new("s2", 0.1, vec![2, 5, 8, 14, 15]),
            ],
        )];
        let legend = AttackLegend::build(&cases);
        let metrics =
            vec![fake_metrics(InvestmentPlan::new(vec![2], vec![13]))];

        write_case_summaries(&cases, &metrics, &legend, path).unwrap();

        let contents =
            fs::read_to_string(dir.join("summary.csv")).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "case,scenarios,hardened,generator_sites,rp,ws,eev,evpi,vss"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("case_1,0.9(A)/0.1(B)"));
        assert!(row.contains("[2]"));
        assert!(row.contains("[13]"));
    }

    #[test]
    fn test_write_sweep_records() {
        let dir = std::env::temp_dir().join("gridhard_sweep_test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.to_str().unwrap();

        let records = vec![
            SweepRecord {
                probability: 0.0,
                rp: 0.11,
                vss: 0.0,
                investment_cost: 0.0,
                plan: InvestmentPlan::empty(),
                transition: Transition::None,
            },
            SweepRecord {
                probability: 0.5,
                rp: 520.0,
                vss: 120.0,
                investment_cost: 550.0,
                plan: InvestmentPlan::new(vec![2], vec![13]),
                transition: Transition::TippingPoint,
            },
        ];
        write_sweep_records(&records, path).unwrap();

        let contents =
            fs::read_to_string(dir.join("sensitivity.csv")).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "probability,rp,vss,investment_cost,hardened,\
             generator_sites,transition"
        );
        assert!(contents.contains("tipping point"));
    }

    #[test]
    fn test_scenario_codes_rendering() {
        let cases = vec![(
            "case_1".to_string(),
            vec![
                Scenario::new("s1", 0.5, vec![2, 11]),
                Scenario::new("s2", 0.5, vec![2, 5, 8, 14, 15]),
            ],
        )];
        let legend = AttackLegend::build(&cases);
        assert_eq!(scenario_codes(&cases[0].1, &legend), "0.5(A)/0.5(B)");
    }
}
