use super::fairing::smooth_mesh;
use super::mesh_split::build_display_mesh;
use crate::core::io::vtk::PolygonMesh;
use crate::core::mesh::half_edge::HalfEdgeMesh;
use crate::core::mesh::tri_mesh::TriMesh;
use crate::core::models::cell::SimulationCell;
use crate::engine::ComputeEngine;
use crate::engine::config::MeshConfig;
use crate::engine::context::ComputeContext;
use crate::engine::error::EngineError;
use crate::engine::state::Outcome;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{info, instrument};

/// A partition of the simulation cell into regions, bounded by a closed mesh
/// whose faces are labeled with the region they enclose.
#[derive(Debug, Clone)]
pub struct PartitionMesh {
    pub cell: SimulationCell,
    pub mesh: HalfEdgeMesh<u32>,
}

impl PartitionMesh {
    pub fn new(cell: SimulationCell, mesh: HalfEdgeMesh<u32>) -> Self {
        Self { cell, mesh }
    }

    /// Builds the half-edge structure from a polygon soup.
    ///
    /// Faces are grouped into one sheet per region, and faces shared by two
    /// regions (stored once per region, with opposite winding) are cross-linked.
    pub fn from_polygons(cell: SimulationCell, polygons: PolygonMesh) -> Result<Self, EngineError> {
        let faces = polygons
            .polygons
            .iter()
            .enumerate()
            .map(|(i, p)| (p.clone(), polygons.material(i)))
            .collect();
        let mut mesh = HalfEdgeMesh::from_polygons_by(polygons.vertices, faces, |&region| region)?;
        let linked = mesh.link_opposite_faces();
        info!(
            faces = mesh.face_count(),
            linked,
            "Built partition mesh from polygons."
        );
        Ok(Self { cell, mesh })
    }
}

/// Turns a partition mesh into a display-ready triangle mesh: optional Taubin
/// fairing, then periodic splitting and plane clipping.
pub struct DisplayMeshEngine {
    input: Arc<PartitionMesh>,
    config: MeshConfig,
}

impl ComputeEngine for DisplayMeshEngine {
    type Input = PartitionMesh;
    type Config = MeshConfig;
    type Output = TriMesh;

    const NAME: &'static str = "display-mesh";

    fn prepare(input: Arc<PartitionMesh>, config: MeshConfig) -> Result<Self, EngineError> {
        config.fairing.validate()?;
        Ok(Self { input, config })
    }

    #[instrument(skip_all, name = "display_mesh_engine")]
    fn perform(&self, context: &ComputeContext<'_>) -> Result<Outcome<TriMesh>, EngineError> {
        let mut mesh = Cow::Borrowed(&self.input.mesh);
        if self.config.fairing.iterations > 0 {
            let faired = mesh.to_mut();
            if smooth_mesh(faired, &self.input.cell, &self.config.fairing, context)?.is_canceled() {
                return Ok(Outcome::Canceled);
            }
        }
        build_display_mesh(
            &*mesh,
            &self.input.cell,
            &self.config.cutting_planes,
            |_, &region| region,
            context,
        )
    }
}
