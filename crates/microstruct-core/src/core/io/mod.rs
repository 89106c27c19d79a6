//! File input and output.
//!
//! Particle snapshots are read from extended XYZ files, triangle meshes are
//! exchanged as legacy ASCII VTK unstructured grids, and correlation curves are
//! written as CSV tables. Formats with a single in-memory representation
//! implement the [`traits::DataFile`] interface.

pub mod table;
pub mod traits;
pub mod vtk;
pub mod xyz;
