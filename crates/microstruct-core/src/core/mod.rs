//! # Core Module
//!
//! Stateless building blocks shared by all analyses in the crate.
//!
//! ## Overview
//!
//! The core module holds the data models and geometric primitives that the
//! compute tasks in [`crate::engine`] operate on. Nothing in here keeps state
//! between calls or reports progress; everything is a plain value type or a
//! pure function.
//!
//! ## Architecture
//!
//! - **Data Models** ([`models`]) - Simulation cell, particle properties, particle
//!   snapshots and the cluster graph produced by structure identification
//! - **Meshes** ([`mesh`]) - Half-edge polygon meshes, flat triangle meshes, planes
//!   and plane clipping
//! - **Neighbor Search** ([`neighbors`]) - Cell-list based cutoff neighbor finder
//!   aware of periodic boundary conditions
//! - **Numerics** ([`utils`]) - Three-dimensional FFT grids and the spatial grid mapper
//! - **File I/O** ([`io`]) - Extended XYZ particles, VTK meshes and CSV tables
//!
//! ## Conventions
//!
//! - Cell matrices store the three edge vectors as columns.
//! - Reduced coordinates run from 0 to 1 across the cell along each edge.
//! - Regular grids are laid out row-major with `z` varying fastest.

pub mod io;
pub mod mesh;
pub mod models;
pub mod neighbors;
pub mod utils;
