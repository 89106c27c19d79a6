//! # microstruct Core Library
//!
//! Geometry and statistics kernels for atomistic microstructure analysis:
//! spatial correlation functions of particle properties, elastic strain from a
//! crystal structure classification, and display meshes for periodic surfaces.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture to keep concerns separate
//! and every layer testable on its own.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`SimulationCell`,
//!   `ParticleData`, `ClusterGraph`, `HalfEdgeMesh`, `TriMesh`), the cutoff
//!   neighbor finder, numeric utilities (3D FFT, spatial grid mapping) and file I/O.
//!
//! - **[`engine`]: The Logic Core.** Engine configuration, progress reporting,
//!   cancellation, result caching and the compute tasks themselves: the
//!   correlation engine, the elastic strain engine, periodic mesh splitting and
//!   Taubin mesh fairing.
//!
//! - **[`workflows`]: The Public API.** Entry points that run one engine end to end,
//!   plus pipeline stages that track status and keep the last valid results.

pub mod core;
pub mod engine;
pub mod workflows;
