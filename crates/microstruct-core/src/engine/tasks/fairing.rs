use crate::core::mesh::half_edge::{EdgeIndex, HalfEdgeMesh, VertexIndex};
use crate::core::models::cell::SimulationCell;
use crate::engine::config::FairingConfig;
use crate::engine::context::ComputeContext;
use crate::engine::error::EngineError;
use crate::engine::progress::Progress;
use crate::engine::state::Outcome;
use nalgebra::Vector3;
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Fairs a closed (possibly multi-sheet) mesh with Taubin's lambda|mu algorithm.
///
/// Each iteration applies a shrinking pass with `lambda` followed by an inflating
/// pass with `mu = 1 / (k_pb - 1/lambda)`. Edge vectors are minimum-image wrapped,
/// so meshes spanning periodic boundaries stay intact. Vertices where two triple
/// lines meet move only along those lines; vertices touching any other nonzero
/// number of triple lines stay fixed.
#[instrument(skip_all, name = "mesh_fairing_task")]
pub fn smooth_mesh<F: Sync>(
    mesh: &mut HalfEdgeMesh<F>,
    cell: &SimulationCell,
    config: &FairingConfig,
    context: &ComputeContext<'_>,
) -> Result<Outcome<()>, EngineError> {
    config.validate()?;
    let mu = config.mu();
    info!(
        iterations = config.iterations,
        lambda = config.lambda,
        mu,
        vertices = mesh.vertex_count(),
        "Starting mesh fairing."
    );

    context.reporter.report(Progress::PhaseStart {
        name: "Mesh Fairing",
    });
    context.reporter.report(Progress::TaskStart {
        total_steps: config.iterations as u64,
    });

    for iteration in 0..config.iterations {
        if context.is_canceled() {
            info!(iteration, "Mesh fairing canceled.");
            return Ok(Outcome::Canceled);
        }
        smoothing_pass(mesh, cell, config.lambda);
        smoothing_pass(mesh, cell, mu);
        context.reporter.report(Progress::TaskIncrement);
    }

    context.reporter.report(Progress::TaskFinish);
    context.reporter.report(Progress::PhaseFinish);
    debug!("Mesh fairing finished.");
    Ok(Outcome::Completed(()))
}

/// Moves every vertex by `prefactor` times its umbrella vector, computed from the previous positions.
fn smoothing_pass<F: Sync>(mesh: &mut HalfEdgeMesh<F>, cell: &SimulationCell, prefactor: f64) {
    #[cfg(not(feature = "parallel"))]
    let iterator = 0..mesh.vertex_count();

    #[cfg(feature = "parallel")]
    let iterator = (0..mesh.vertex_count()).into_par_iter();

    let shared: &HalfEdgeMesh<F> = mesh;
    let displacements: Vec<Vector3<f64>> = iterator
        .map(|v| vertex_displacement(shared, cell, v, prefactor))
        .collect();

    for (position, d) in mesh.positions_mut().iter_mut().zip(displacements) {
        *position += d;
    }
}

fn vertex_displacement<F>(
    mesh: &HalfEdgeMesh<F>,
    cell: &SimulationCell,
    vertex: VertexIndex,
    prefactor: f64,
) -> Vector3<f64> {
    let edges = mesh.vertex_edges(vertex);
    let Some(&first) = edges.first() else {
        return Vector3::zeros();
    };
    let origin = mesh.position(vertex);
    let edge_vector =
        |e: EdgeIndex| cell.wrap_vector(&(mesh.position(mesh.edge(e).vertex2) - origin));

    let mut triple_lines: Vec<EdgeIndex> = Vec::with_capacity(2);
    let mut triple_line_count = 0;
    for &e in edges {
        if !mesh.is_triple_line(e) {
            continue;
        }
        if !lies_on_known_line(mesh, e, &triple_lines) {
            if triple_lines.len() < 2 {
                triple_lines.push(e);
            }
            triple_line_count += 1;
        }
    }

    match triple_line_count {
        0 => {
            let mut sum = Vector3::zeros();
            let mut count = 0usize;
            let mut current = first;
            // Walks the one-ring within the sheet of the first edge.
            loop {
                sum += edge_vector(current);
                count += 1;
                match mesh.edge(mesh.edge(current).prev_face_edge).opposite {
                    Some(next) if next != first && count < edges.len() => current = next,
                    _ => break,
                }
            }
            sum * (prefactor / count as f64)
        }
        2 => (edge_vector(triple_lines[0]) + edge_vector(triple_lines[1])) * (prefactor / 2.0),
        _ => Vector3::zeros(),
    }
}

/// Returns `true` if walking the sheets around `edge` reaches one of `known`.
fn lies_on_known_line<F>(mesh: &HalfEdgeMesh<F>, edge: EdgeIndex, known: &[EdgeIndex]) -> bool {
    let mut current = edge;
    for _ in 0..mesh.edge_count() {
        if known.contains(&current) {
            return true;
        }
        match mesh.next_sheet_edge(current) {
            Some(next) if next != edge => current = next,
            _ => return false,
        }
    }
    false
}
