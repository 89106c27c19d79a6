use crate::engine::ComputeEngine;
use crate::engine::context::ComputeContext;
use crate::engine::error::EngineError;
use crate::engine::state::{Outcome, ResultCache};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Status of the most recent evaluation of a pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StageStatus {
    #[default]
    Pending,
    Success,
    Canceled,
    Error(String),
}

impl StageStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, StageStatus::Success)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageStatus::Pending => write!(f, "Pending"),
            StageStatus::Success => write!(f, "Success"),
            StageStatus::Canceled => write!(f, "Operation has been canceled by the user."),
            StageStatus::Error(message) => write!(f, "Error: {message}"),
        }
    }
}

/// One engine in an analysis pipeline, together with its last published results.
///
/// Re-evaluating a stage replaces the cached output only on success. After a
/// canceled or failed run, [`PipelineStage::results`] still returns the output of
/// the last successful run while [`PipelineStage::status`] reports what happened.
pub struct PipelineStage<E: ComputeEngine> {
    cache: ResultCache<E::Output>,
    status: StageStatus,
}

impl<E: ComputeEngine> Default for PipelineStage<E> {
    fn default() -> Self {
        Self {
            cache: ResultCache::new(),
            status: StageStatus::Pending,
        }
    }
}

impl<E: ComputeEngine> PipelineStage<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepares and runs the engine, publishing its output if it completes.
    #[instrument(skip_all, fields(engine = E::NAME))]
    pub fn evaluate(
        &mut self,
        input: Arc<E::Input>,
        config: E::Config,
        context: &ComputeContext<'_>,
    ) -> &StageStatus {
        self.status = match run_engine::<E>(input, config, context) {
            Ok(Outcome::Completed(output)) => {
                self.cache.publish(output);
                info!(generation = self.cache.generation(), "Stage completed.");
                StageStatus::Success
            }
            Ok(Outcome::Canceled) => {
                warn!("Stage canceled; keeping previous results.");
                StageStatus::Canceled
            }
            Err(e) => {
                error!(error = %e, "Stage failed; keeping previous results.");
                StageStatus::Error(e.to_string())
            }
        };
        &self.status
    }

    pub fn status(&self) -> &StageStatus {
        &self.status
    }

    pub fn results(&self) -> Option<&E::Output> {
        self.cache.results()
    }

    pub fn generation(&self) -> u64 {
        self.cache.generation()
    }

    /// Drops cached results and resets the status.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.status = StageStatus::Pending;
    }
}

/// Prepares an engine from `input` and `config` and performs it once.
pub fn run_engine<E: ComputeEngine>(
    input: Arc<E::Input>,
    config: E::Config,
    context: &ComputeContext<'_>,
) -> Result<Outcome<E::Output>, EngineError> {
    if context.is_canceled() {
        return Ok(Outcome::Canceled);
    }
    let engine = E::prepare(input, config)?;
    engine.perform(context)
}
