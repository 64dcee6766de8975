use crate::solver;
use thiserror::Error;

/// Error surface for a planning run. Infeasibility and time-limit expiry
/// are distinct terminal statuses, never folded into each other or into
/// generic solver failures.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("output error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid network: {0}")]
    Network(String),

    #[error("invalid scenario set: {0}")]
    Scenario(String),

    #[error("invalid investment plan: {0}")]
    Plan(String),

    #[error("model is infeasible ({context})")]
    Infeasible { context: String },

    #[error("solve time limit reached ({context})")]
    TimeLimit { context: String },

    #[error("solver failure ({context}): status {status:?}")]
    Solver {
        context: String,
        status: solver::HighsModelStatus,
    },

    #[error("metric inconsistency: {0}")]
    Metric(String),
}

pub type PlanResult<T> = Result<T, PlanError>;
