//! Computational kernels behind the analysis engines.
//!
//! Each submodule implements one engine or one stage of the display mesh
//! pipeline. Kernels receive a [`ComputeContext`](crate::engine::context::ComputeContext)
//! for progress reporting and cancellation and return an
//! [`Outcome`](crate::engine::state::Outcome).

pub mod correlation;
pub mod display_mesh;
pub mod elastic_strain;
pub mod fairing;
pub mod mesh_split;
