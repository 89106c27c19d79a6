//! # Workflows Module
//!
//! This module provides the high-level entry points of microstruct. Each workflow
//! wraps one analysis engine: it sets up the compute context, runs the engine and
//! reports a summary of the results.
//!
//! ## Architecture
//!
//! - **Pipeline** ([`pipeline`]) - Stage status tracking and caching of the last
//!   valid results across re-evaluations
//! - **Correlation Workflow** ([`correlate`]) - Real-space, short-ranged and
//!   reciprocal-space correlation functions of two particle properties
//! - **Elastic Strain Workflow** ([`strain`]) - Per-particle strain tensors and
//!   deformation gradients from a structure analysis
//! - **Display Mesh Workflow** ([`mesh`]) - Fairing, periodic splitting and
//!   clipping of partition meshes
//!
//! ## Key Capabilities
//!
//! - **Cooperative cancellation** through a shared [`CancellationToken`](crate::engine::context::CancellationToken)
//! - **Progress monitoring** with phase and task reporting
//! - **Stale-but-valid results** kept when a re-evaluation fails or is canceled

pub mod correlate;
pub mod mesh;
pub mod pipeline;
pub mod strain;
