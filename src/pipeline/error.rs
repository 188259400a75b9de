use thiserror::Error;

use super::types::{Dependency, RunSummary};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(
        "run aborted: {dependency} failed {failures} times in a row; {committed} articles were committed"
    )]
    DependencyLost {
        dependency: Dependency,
        failures: u32,
        committed: usize,
        summary: Box<RunSummary>,
    },

    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}
