use crate::core::mesh::half_edge::{FaceIndex, HalfEdgeMesh};
use crate::core::mesh::tri_mesh::{Plane3, TriMesh};
use crate::core::models::cell::SimulationCell;
use crate::core::models::cluster::{ClusterGraph, ClusterVector, StructureType};
use crate::engine::context::ComputeContext;
use crate::engine::error::EngineError;
use crate::engine::progress::Progress;
use crate::engine::state::Outcome;
use nalgebra::Vector3;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Reduced-coordinate distance along an axis beyond which an edge is taken to wrap around the cell.
const WRAP_THRESHOLD: f64 = 0.5;

/// Burgers vector components are compared after rounding to this many units per lattice vector.
const BURGERS_QUANTUM: f64 = 1e6;

/// Converts a periodic half-edge mesh into a finite triangle mesh for display.
///
/// Faces are triangulated, vertices are wrapped into the primary cell image, and
/// every triangle that crosses a periodic boundary is split into three. The result
/// is then clipped at each of `cutting_planes` in turn. The material of every output
/// triangle comes from `material_of_face`, applied to the half-edge face it was cut
/// from.
///
/// # Errors
///
/// Returns [`EngineError::MeshTopology`] if a face spans half the cell or more along
/// a periodic axis, so that no consistent split exists.
#[instrument(skip_all, name = "display_mesh_task")]
pub fn build_display_mesh<F, M>(
    mesh: &HalfEdgeMesh<F>,
    cell: &SimulationCell,
    cutting_planes: &[Plane3],
    material_of_face: M,
    context: &ComputeContext<'_>,
) -> Result<Outcome<TriMesh>, EngineError>
where
    M: Fn(FaceIndex, &F) -> u32,
{
    context.reporter.report(Progress::PhaseStart {
        name: "Periodic Mesh Splitting",
    });
    info!(
        faces = mesh.face_count(),
        planes = cutting_planes.len(),
        "Building display mesh."
    );

    // === Stage 1: Triangulation ===
    let triangles = mesh.convert_to_tri_mesh(material_of_face);

    // === Stage 2: Periodic boundary splitting ===
    let mut output = match split_at_periodic_boundaries(triangles, cell, context)? {
        Outcome::Completed(output) => output,
        Outcome::Canceled => return Ok(Outcome::Canceled),
    };

    // === Stage 3: Clipping ===
    for plane in cutting_planes {
        if context.is_canceled() {
            return Ok(Outcome::Canceled);
        }
        output.clip_at_plane(plane);
    }

    context.reporter.report(Progress::PhaseFinish);
    debug!(
        vertices = output.vertex_count(),
        faces = output.face_count(),
        "Display mesh ready."
    );
    Ok(Outcome::Completed(output))
}

/// Wraps a triangle mesh into the primary cell image and cuts every face that
/// crosses a periodic boundary, so no triangle spans the cell.
///
/// Meshes that cross no boundary come back unchanged up to rounding of the
/// reduced-coordinate round trip.
pub fn split_at_periodic_boundaries(
    mut mesh: TriMesh,
    cell: &SimulationCell,
    context: &ComputeContext<'_>,
) -> Result<Outcome<TriMesh>, EngineError> {
    let pbc = cell.pbc_flags();
    for p in &mut mesh.vertices {
        *p = cell.absolute_to_reduced(p);
    }

    for dim in (0..3).filter(|&d| pbc[d]) {
        if context.is_canceled() {
            return Ok(Outcome::Canceled);
        }
        for p in &mut mesh.vertices {
            p[dim] -= p[dim].floor();
        }
        let before = mesh.face_count();
        split_faces_along(&mut mesh, dim, pbc)?;
        debug!(
            axis = dim,
            split = (mesh.face_count() - before) / 2,
            "Split faces at periodic boundary."
        );
    }

    if context.is_canceled() {
        return Ok(Outcome::Canceled);
    }
    for p in &mut mesh.vertices {
        *p = cell.reduced_to_absolute(p);
    }
    Ok(Outcome::Completed(mesh))
}

/// Splits all faces crossing the boundary at reduced coordinate 0/1 along `dim`.
///
/// Each crossing edge receives two new vertices, one on each side of the
/// boundary, shared with the neighboring face through a lookup keyed by the
/// edge's (low side, high side) endpoints.
fn split_faces_along(mesh: &mut TriMesh, dim: usize, pbc: [bool; 3]) -> Result<(), EngineError> {
    let mut crossings: HashMap<(usize, usize), (usize, usize)> = HashMap::new();

    for face_index in 0..mesh.face_count() {
        let face = mesh.faces[face_index];
        let z = face.vertices.map(|v| mesh.vertices[v][dim]);
        let zd = [z[1] - z[0], z[2] - z[1], z[0] - z[2]];
        if zd.iter().all(|d| d.abs() < WRAP_THRESHOLD) {
            continue;
        }

        let topology_error = EngineError::MeshTopology {
            face_index,
            axis: dim,
        };
        let mut proper_edge = None;
        // For each crossing edge: the new vertex next to its start, and the one next to its end.
        let mut cut = [(0usize, 0usize); 3];
        for e in 0..3 {
            if zd[e].abs() < WRAP_THRESHOLD {
                if proper_edge.is_some() {
                    return Err(topology_error);
                }
                proper_edge = Some(e);
                continue;
            }
            let start = face.vertex(e);
            let end = face.vertex((e + 1) % 3);
            let reversed = zd[e] <= -WRAP_THRESHOLD;
            let key = if reversed { (end, start) } else { (start, end) };
            let (low, high) = match crossings.get(&key) {
                Some(&pair) => pair,
                None => {
                    let pair = insert_crossing(mesh, key, dim, pbc);
                    crossings.insert(key, pair);
                    pair
                }
            };
            cut[e] = if reversed { (high, low) } else { (low, high) };
        }
        let pe = proper_edge.ok_or(topology_error)?;

        let original = face.vertices;
        let next = (pe + 1) % 3;
        let last = (pe + 2) % 3;
        mesh.faces[face_index].vertices = [original[pe], original[next], cut[last].1];
        mesh.add_face([original[next], cut[next].0, cut[last].1], face.material);
        mesh.add_face([cut[next].1, original[last], cut[last].0], face.material);
    }
    Ok(())
}

/// Creates the two images of the point where the edge `low -> high` crosses the
/// boundary: one at reduced coordinate 0 and one at 1 along `dim`.
fn insert_crossing(mesh: &mut TriMesh, (low, high): (usize, usize), dim: usize, pbc: [bool; 3]) -> (usize, usize) {
    let origin = mesh.vertices[low];
    let mut delta = mesh.vertices[high] - origin;
    delta[dim] -= 1.0;
    for d in dim + 1..3 {
        if pbc[d] {
            delta[d] -= (delta[d] + 0.5).floor();
        }
    }
    let t = if delta[dim] != 0.0 {
        origin[dim] / -delta[dim]
    } else {
        0.5
    };
    let p = origin + delta * t;
    let mut image = p;
    image[dim] += 1.0;
    (mesh.add_vertex(p), mesh.add_vertex(image))
}

/// A distinct slip system encountered while coloring a slip surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlipFamily {
    pub structure: StructureType,
    pub burgers_vector: Vector3<f64>,
}

/// Assigns display materials to slip-surface faces.
///
/// Faces whose slip vector has no crystal cluster get material 0. Every distinct
/// combination of lattice structure and local slip vector gets its own material,
/// numbered from 1 in order of first appearance.
#[derive(Debug, Clone, Default)]
pub struct SlipMaterialTable {
    families: Vec<SlipFamily>,
    lookup: HashMap<(StructureType, [i64; 3]), u32>,
}

impl SlipMaterialTable {
    pub const UNASSIGNED: u32 = 0;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn material_for(&mut self, slip: &ClusterVector, graph: &ClusterGraph) -> u32 {
        let Some(cluster) = slip.cluster.and_then(|id| graph.cluster(id)) else {
            return Self::UNASSIGNED;
        };
        let quantize = |c: f64| (c * BURGERS_QUANTUM).round() as i64;
        let key = (
            cluster.structure,
            [quantize(slip.local.x), quantize(slip.local.y), quantize(slip.local.z)],
        );
        if let Some(&material) = self.lookup.get(&key) {
            return material;
        }
        self.families.push(SlipFamily {
            structure: cluster.structure,
            burgers_vector: slip.local,
        });
        let material = self.families.len() as u32;
        self.lookup.insert(key, material);
        material
    }

    /// The slip family drawn with `material`, if any.
    pub fn family(&self, material: u32) -> Option<&SlipFamily> {
        (material as usize)
            .checked_sub(1)
            .and_then(|i| self.families.get(i))
    }

    pub fn families(&self) -> &[SlipFamily] {
        &self.families
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}

/// Builds the display mesh of a slip surface, coloring faces by slip family.
pub fn build_slip_surface_mesh(
    mesh: &HalfEdgeMesh<ClusterVector>,
    graph: &ClusterGraph,
    cell: &SimulationCell,
    cutting_planes: &[Plane3],
    context: &ComputeContext<'_>,
) -> Result<Outcome<(TriMesh, SlipMaterialTable)>, EngineError> {
    let mut table = SlipMaterialTable::new();
    let materials: Vec<u32> = mesh
        .faces()
        .iter()
        .map(|face| table.material_for(&face.data, graph))
        .collect();
    debug!(families = table.len(), "Assigned slip surface materials.");

    let outcome = build_display_mesh(mesh, cell, cutting_planes, |f, _| materials[f], context)?;
    Ok(outcome.map(|output| (output, table)))
}
