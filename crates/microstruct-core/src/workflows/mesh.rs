use super::pipeline::run_engine;
use crate::core::mesh::tri_mesh::TriMesh;
use crate::engine::config::MeshConfig;
use crate::engine::context::{CancellationToken, ComputeContext};
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use crate::engine::state::Outcome;
use crate::engine::tasks::display_mesh::{DisplayMeshEngine, PartitionMesh};
use std::sync::Arc;
use tracing::{info, instrument};

/// Fairs a partition mesh (if requested) and converts it into a finite display mesh.
#[instrument(skip_all, name = "display_mesh_workflow")]
pub fn run(
    partition: Arc<PartitionMesh>,
    config: MeshConfig,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<Outcome<TriMesh>, EngineError> {
    info!(
        faces = partition.mesh.face_count(),
        iterations = config.fairing.iterations,
        planes = config.cutting_planes.len(),
        "Starting display mesh workflow."
    );
    let context = ComputeContext::new(reporter, cancel);
    let outcome = run_engine::<DisplayMeshEngine>(partition, config, &context)?;

    if let Outcome::Completed(mesh) = &outcome {
        info!(
            vertices = mesh.vertex_count(),
            triangles = mesh.face_count(),
            "Display mesh workflow complete."
        );
    }
    Ok(outcome)
}
