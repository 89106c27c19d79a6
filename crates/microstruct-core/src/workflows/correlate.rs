use super::pipeline::run_engine;
use crate::core::models::particles::ParticleData;
use crate::engine::config::CorrelationConfig;
use crate::engine::context::{CancellationToken, ComputeContext};
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use crate::engine::state::Outcome;
use crate::engine::tasks::correlation::{CorrelationEngine, CorrelationResults};
use std::sync::Arc;
use tracing::{info, instrument};

/// Computes the spatial correlation function between two particle properties.
///
/// Returns [`Outcome::Canceled`] if `cancel` is triggered before the last stage finishes.
#[instrument(skip_all, name = "correlation_workflow")]
pub fn run(
    data: Arc<ParticleData>,
    config: CorrelationConfig,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<Outcome<CorrelationResults>, EngineError> {
    info!(
        particles = data.particle_count(),
        property1 = %config.property1,
        property2 = %config.property2,
        "Starting correlation workflow."
    );
    let context = ComputeContext::new(reporter, cancel);
    let outcome = run_engine::<CorrelationEngine>(data, config, &context)?;

    if let Outcome::Completed(results) = &outcome {
        info!(
            real_space_bins = results.real_space.len(),
            short_ranged_bins = results.short_ranged.len(),
            reciprocal_bins = results.reciprocal_space.len(),
            mean1 = results.mean1,
            mean2 = results.mean2,
            covariance = results.covariance,
            "Correlation workflow complete."
        );
    }
    Ok(outcome)
}
