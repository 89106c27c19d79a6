//! # Core Models Module
//!
//! Plain data types shared by every analysis in the crate.
//!
//! ## Key Components
//!
//! - [`cell`] - The simulation cell with periodic boundary conditions and coordinate mappings
//! - [`property`] - Per-particle data arrays and references to their components
//! - [`cluster`] - Orientation clusters, lattice transitions and the cluster graph
//! - [`ids`] - Arena keys for clusters and transitions
//! - [`particles`] - A particle snapshot bundling positions, cell and properties
//! - [`structure`] - Per-particle cluster assignments and ideal lattice neighbor vectors
//!
//! These types carry no analysis logic of their own. They are produced by file readers or
//! by external collaborators (such as a structure identification step) and consumed by the
//! compute tasks in [`crate::engine`].

pub mod cell;
pub mod cluster;
pub mod ids;
pub mod particles;
pub mod property;
pub mod structure;
