use super::pipeline::run_engine;
use crate::engine::config::ElasticStrainConfig;
use crate::engine::context::{CancellationToken, ComputeContext};
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use crate::engine::state::Outcome;
use crate::engine::tasks::elastic_strain::{
    ElasticStrainEngine, ElasticStrainInput, ElasticStrainResults,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Computes per-particle elastic strain from a structure analysis.
#[instrument(skip_all, name = "elastic_strain_workflow")]
pub fn run(
    input: Arc<ElasticStrainInput>,
    config: ElasticStrainConfig,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<Outcome<ElasticStrainResults>, EngineError> {
    let particle_count = input.positions.len();
    let context = ComputeContext::new(reporter, cancel);
    let outcome = run_engine::<ElasticStrainEngine>(input, config, &context)?;

    if let Outcome::Completed(results) = &outcome {
        if results.invalid_particle_count == particle_count && particle_count > 0 {
            warn!("No particle belongs to a crystal of the selected structure.");
        }
        info!(
            particles = particle_count,
            invalid = results.invalid_particle_count,
            "Elastic strain workflow complete."
        );
    }
    Ok(outcome)
}
