//! # Engine Module
//!
//! This module implements the analysis engines of microstruct: the correlation
//! function engine, the elastic strain engine, and the display mesh pipeline
//! (periodic splitting, plane clipping and Taubin fairing).
//!
//! ## Overview
//!
//! Every engine follows the same life cycle. It is *prepared* from an immutable,
//! shared input snapshot and a validated configuration, then *performed* inside a
//! [`context::ComputeContext`] that carries the progress reporter and the
//! cancellation token. A run either completes with results, ends early as
//! [`state::Outcome::Canceled`], or fails with an [`error::EngineError`].
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Engine parameters, their defaults and builders
//! - **Execution Context** ([`context`]) - Progress reporting and cooperative cancellation
//! - **State Tracking** ([`state`]) - Run outcomes and the cache of published results
//! - **Progress Monitoring** ([`progress`]) - Progress events and the reporter callback
//! - **Error Handling** ([`error`]) - Engine-specific error types and error propagation
//! - **Tasks** ([`tasks`]) - The computational kernels behind each engine
//!
//! ## Key Capabilities
//!
//! - **Parallel computation** over particles and mesh vertices via rayon
//! - **Cancellation between stages** without discarding previously published results
//! - **Periodic boundary handling** in neighbor queries, FFT binning and mesh splitting

pub mod config;
pub mod context;
pub mod error;
pub mod progress;
pub mod state;
pub mod tasks;

use context::ComputeContext;
use error::EngineError;
use state::Outcome;
use std::sync::Arc;

/// A unit of analysis that can be prepared from shared input and then evaluated.
pub trait ComputeEngine: Sized {
    /// Immutable snapshot of the data the engine reads.
    type Input: Send + Sync;
    type Config;
    type Output;

    /// Short name used in logs and stage status reports.
    const NAME: &'static str;

    /// Validates input and configuration and captures everything needed to run.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the input lacks
    /// something the engine needs. No computation happens here.
    fn prepare(input: Arc<Self::Input>, config: Self::Config) -> Result<Self, EngineError>;

    /// Executes the computation.
    ///
    /// # Errors
    ///
    /// Returns an error if the computation itself fails. Cancellation is not an
    /// error and yields [`Outcome::Canceled`].
    fn perform(&self, context: &ComputeContext<'_>) -> Result<Outcome<Self::Output>, EngineError>;
}
