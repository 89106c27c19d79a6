//! Mesh data structures: the half-edge polygon mesh produced by surface
//! extraction and the flat triangle mesh handed to renderers and file writers.

pub mod half_edge;
pub mod tri_mesh;

pub use half_edge::{HalfEdgeMesh, MeshError};
pub use tri_mesh::{Plane3, TriFace, TriMesh};
