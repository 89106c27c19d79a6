use thiserror::Error;

use super::config::ConfigError;
use crate::core::mesh::half_edge::MeshError;
use crate::core::models::cell::CellError;
use crate::core::models::cluster::ClusterError;
use crate::core::models::property::PropertyError;
use crate::core::models::structure::StructureError;
use crate::core::neighbors::NeighborError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid simulation cell: {0}")]
    Cell(#[from] CellError),

    #[error("Neighbor list construction failed: {0}")]
    NeighborList(#[from] NeighborError),

    #[error("Invalid particle property: {0}")]
    Property(#[from] PropertyError),

    #[error("Cluster graph error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("Inconsistent structure analysis: {0}")]
    Structure(#[from] StructureError),

    #[error("Invalid input mesh: {0}")]
    Mesh(#[from] MeshError),

    #[error("Particle property '{name}' not found in input")]
    MissingProperty { name: String },

    #[error("Particle property '{name}' has {len} entries but there are {expected} particles")]
    PropertySizeMismatch {
        name: String,
        len: usize,
        expected: usize,
    },

    #[error("Deformation gradient of particle {particle_index} is singular")]
    SingularDeformation { particle_index: usize },

    #[error(
        "Cannot split face {face_index} at the periodic boundary along axis {axis}; \
         the simulation cell may be too small"
    )]
    MeshTopology { face_index: usize, axis: usize },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
