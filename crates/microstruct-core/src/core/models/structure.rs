use super::ids::ClusterId;
use nalgebra::Vector3;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum StructureError {
    #[error("Structure analysis covers {found} particles but {expected} were expected")]
    ParticleCountMismatch { found: usize, expected: usize },
    #[error("Particle {particle} lists neighbor {neighbor}, which does not exist")]
    NeighborOutOfRange { particle: usize, neighbor: usize },
}

/// A bond from a particle to one of its crystalline neighbors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatticeNeighbor {
    pub index: usize,
    /// Ideal bond vector in the local frame of the particle's cluster, in units
    /// of the lattice constant.
    pub lattice_vector: Vector3<f64>,
}

impl LatticeNeighbor {
    pub fn new(index: usize, lattice_vector: Vector3<f64>) -> Self {
        Self {
            index,
            lattice_vector,
        }
    }
}

/// Per-particle output of a structure identification step.
///
/// Particles that were not assigned to a crystalline cluster carry `None` and
/// are expected to have no neighbor list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructureAnalysis {
    pub atom_clusters: Vec<Option<ClusterId>>,
    pub neighbors: Vec<Vec<LatticeNeighbor>>,
}

impl StructureAnalysis {
    pub fn new(atom_clusters: Vec<Option<ClusterId>>, neighbors: Vec<Vec<LatticeNeighbor>>) -> Self {
        Self {
            atom_clusters,
            neighbors,
        }
    }

    pub fn particle_count(&self) -> usize {
        self.atom_clusters.len()
    }

    /// Checks that both per-particle arrays match `particle_count` and all neighbor indices are valid.
    pub fn validate(&self, particle_count: usize) -> Result<(), StructureError> {
        for found in [self.atom_clusters.len(), self.neighbors.len()] {
            if found != particle_count {
                return Err(StructureError::ParticleCountMismatch {
                    found,
                    expected: particle_count,
                });
            }
        }
        for (particle, list) in self.neighbors.iter().enumerate() {
            if let Some(bad) = list.iter().find(|n| n.index >= particle_count) {
                return Err(StructureError::NeighborOutOfRange {
                    particle,
                    neighbor: bad.index,
                });
            }
        }
        Ok(())
    }
}
