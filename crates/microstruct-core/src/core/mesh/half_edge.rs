use super::tri_mesh::TriMesh;
use nalgebra::Point3;
use std::collections::HashMap;
use std::hash::Hash;
use thiserror::Error;

pub type VertexIndex = usize;
pub type EdgeIndex = usize;
pub type FaceIndex = usize;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum MeshError {
    #[error("Face {face} references vertex {vertex}, but the mesh has only {count} vertices")]
    VertexOutOfRange {
        face: usize,
        vertex: usize,
        count: usize,
    },
    #[error("Face {face} has fewer than three vertices")]
    DegenerateFace { face: usize },
    #[error("Edge {v1} -> {v2} is used by more than one face of the same manifold")]
    NonManifoldEdge { v1: usize, v2: usize },
    #[error("Mesh is not closed: {open_edges} half-edge(s) have no opposite edge")]
    OpenMesh { open_edges: usize },
    #[error("Edges {0} and {1} cannot be cross-linked: they do not connect the same vertices in reverse order")]
    IncompatibleManifoldLink(EdgeIndex, EdgeIndex),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HalfEdge {
    pub vertex1: VertexIndex,
    pub vertex2: VertexIndex,
    pub face: FaceIndex,
    pub next_face_edge: EdgeIndex,
    pub prev_face_edge: EdgeIndex,
    /// The reverse half-edge within the same manifold sheet.
    pub opposite: Option<EdgeIndex>,
    /// The reverse half-edge on the opposite side of the same face, in the adjacent sheet.
    pub next_manifold: Option<EdgeIndex>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Face<F> {
    pub edge: EdgeIndex,
    pub data: F,
    pub opposite_face: Option<FaceIndex>,
}

/// A polygon mesh with half-edge connectivity and a per-face payload `F`.
///
/// Partition meshes store a region id in `F`, slip surfaces their slip vector.
/// Every face is bounded by a closed cycle of half-edges; each half-edge knows
/// its reverse partner within the same manifold sheet (if the mesh is closed there)
/// and, for two-sided meshes, its partner across the face.
#[derive(Debug, Clone, PartialEq)]
pub struct HalfEdgeMesh<F> {
    positions: Vec<Point3<f64>>,
    vertex_edges: Vec<Vec<EdgeIndex>>,
    edges: Vec<HalfEdge>,
    faces: Vec<Face<F>>,
}

impl<F> HalfEdgeMesh<F> {
    /// Builds a single-sheet mesh from polygons given as vertex index cycles.
    pub fn from_polygons(
        positions: Vec<Point3<f64>>,
        polygons: Vec<(Vec<VertexIndex>, F)>,
    ) -> Result<Self, MeshError> {
        Self::from_polygons_by(positions, polygons, |_| ())
    }

    /// Builds a mesh whose faces are grouped into sheets by `sheet_of`.
    ///
    /// Opposite half-edges are matched only between faces of the same sheet, so
    /// several closed sheets may share edges (as the regions of a partition mesh do).
    pub fn from_polygons_by<K, S>(
        positions: Vec<Point3<f64>>,
        polygons: Vec<(Vec<VertexIndex>, F)>,
        sheet_of: S,
    ) -> Result<Self, MeshError>
    where
        K: Eq + Hash + Clone,
        S: Fn(&F) -> K,
    {
        let vertex_count = positions.len();
        let mut mesh = Self {
            positions,
            vertex_edges: vec![Vec::new(); vertex_count],
            edges: Vec::new(),
            faces: Vec::with_capacity(polygons.len()),
        };

        let mut directed: HashMap<(K, VertexIndex, VertexIndex), EdgeIndex> = HashMap::new();

        for (face_index, (vertices, data)) in polygons.into_iter().enumerate() {
            if vertices.len() < 3 {
                return Err(MeshError::DegenerateFace { face: face_index });
            }
            if let Some(&v) = vertices.iter().find(|&&v| v >= vertex_count) {
                return Err(MeshError::VertexOutOfRange {
                    face: face_index,
                    vertex: v,
                    count: vertex_count,
                });
            }

            let sheet = sheet_of(&data);
            let first_edge = mesh.edges.len();
            let n = vertices.len();
            for k in 0..n {
                let v1 = vertices[k];
                let v2 = vertices[(k + 1) % n];
                let edge_index = first_edge + k;
                if directed
                    .insert((sheet.clone(), v1, v2), edge_index)
                    .is_some()
                {
                    return Err(MeshError::NonManifoldEdge { v1, v2 });
                }
                mesh.edges.push(HalfEdge {
                    vertex1: v1,
                    vertex2: v2,
                    face: face_index,
                    next_face_edge: first_edge + (k + 1) % n,
                    prev_face_edge: first_edge + (k + n - 1) % n,
                    opposite: None,
                    next_manifold: None,
                });
                mesh.vertex_edges[v1].push(edge_index);
            }
            mesh.faces.push(Face {
                edge: first_edge,
                data,
                opposite_face: None,
            });
        }

        for ((sheet, v1, v2), &edge_index) in &directed {
            if let Some(&reverse) = directed.get(&(sheet.clone(), *v2, *v1)) {
                mesh.edges[edge_index].opposite = Some(reverse);
            }
        }

        Ok(mesh)
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn position(&self, v: VertexIndex) -> &Point3<f64> {
        &self.positions[v]
    }

    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [Point3<f64>] {
        &mut self.positions
    }

    pub fn edge(&self, e: EdgeIndex) -> &HalfEdge {
        &self.edges[e]
    }

    pub fn face(&self, f: FaceIndex) -> &Face<F> {
        &self.faces[f]
    }

    pub fn faces(&self) -> &[Face<F>] {
        &self.faces
    }

    /// Outgoing half-edges of a vertex.
    pub fn vertex_edges(&self, v: VertexIndex) -> &[EdgeIndex] {
        &self.vertex_edges[v]
    }

    /// Iterates over the half-edges bounding a face, in cycle order.
    pub fn face_edges(&self, f: FaceIndex) -> impl Iterator<Item = EdgeIndex> + '_ {
        let first = self.faces[f].edge;
        let mut current = Some(first);
        std::iter::from_fn(move || {
            let e = current?;
            let next = self.edges[e].next_face_edge;
            current = (next != first).then_some(next);
            Some(e)
        })
    }

    pub fn face_vertices(&self, f: FaceIndex) -> Vec<VertexIndex> {
        self.face_edges(f).map(|e| self.edges[e].vertex1).collect()
    }

    pub fn open_edge_count(&self) -> usize {
        self.edges.iter().filter(|e| e.opposite.is_none()).count()
    }

    pub fn is_closed(&self) -> bool {
        self.open_edge_count() == 0
    }

    /// Fails with [`MeshError::OpenMesh`] unless every half-edge has an opposite.
    pub fn ensure_closed(&self) -> Result<(), MeshError> {
        match self.open_edge_count() {
            0 => Ok(()),
            open_edges => Err(MeshError::OpenMesh { open_edges }),
        }
    }

    /// Cross-links two reverse half-edges that lie on the two sides of the same face.
    pub fn link_manifolds(&mut self, e1: EdgeIndex, e2: EdgeIndex) -> Result<(), MeshError> {
        let (a, b) = (&self.edges[e1], &self.edges[e2]);
        if a.vertex1 != b.vertex2 || a.vertex2 != b.vertex1 {
            return Err(MeshError::IncompatibleManifoldLink(e1, e2));
        }
        let (f1, f2) = (a.face, b.face);
        self.edges[e1].next_manifold = Some(e2);
        self.edges[e2].next_manifold = Some(e1);
        self.faces[f1].opposite_face = Some(f2);
        self.faces[f2].opposite_face = Some(f1);
        Ok(())
    }

    /// Pairs faces that span the same vertices with reversed orientation and
    /// cross-links their edges. Returns the number of face pairs linked.
    pub fn link_opposite_faces(&mut self) -> usize {
        let mut by_vertex_set: HashMap<Vec<VertexIndex>, Vec<FaceIndex>> = HashMap::new();
        for f in 0..self.faces.len() {
            let mut key = self.face_vertices(f);
            key.sort_unstable();
            by_vertex_set.entry(key).or_default().push(f);
        }

        let mut pairs = Vec::new();
        for candidates in by_vertex_set.values() {
            for (i, &f1) in candidates.iter().enumerate() {
                for &f2 in &candidates[i + 1..] {
                    if self.is_reversed_pair(f1, f2) {
                        pairs.push((f1, f2));
                    }
                }
            }
        }

        let mut linked = 0;
        for (f1, f2) in pairs {
            if self.faces[f1].opposite_face.is_some() || self.faces[f2].opposite_face.is_some() {
                continue;
            }
            let edges1: Vec<EdgeIndex> = self.face_edges(f1).collect();
            let edges2: Vec<EdgeIndex> = self.face_edges(f2).collect();
            for e1 in edges1 {
                let (v1, v2) = (self.edges[e1].vertex1, self.edges[e1].vertex2);
                if let Some(&e2) = edges2
                    .iter()
                    .find(|&&e| self.edges[e].vertex1 == v2 && self.edges[e].vertex2 == v1)
                {
                    self.edges[e1].next_manifold = Some(e2);
                    self.edges[e2].next_manifold = Some(e1);
                }
            }
            self.faces[f1].opposite_face = Some(f2);
            self.faces[f2].opposite_face = Some(f1);
            linked += 1;
        }
        linked
    }

    fn is_reversed_pair(&self, f1: FaceIndex, f2: FaceIndex) -> bool {
        let a = self.face_vertices(f1);
        let mut b = self.face_vertices(f2);
        if a.len() != b.len() {
            return false;
        }
        b.reverse();
        (0..b.len()).any(|_| {
            b.rotate_left(1);
            a == b
        })
    }

    /// Returns `true` if the half-edge lies on a line where more than two sheets meet.
    ///
    /// Walking around an ordinary two-sheet edge via `opposite` and `next_manifold`
    /// returns to the starting edge after two steps; on a triple line it does not.
    /// Edges without cross-links are never triple lines.
    pub fn is_triple_line(&self, e: EdgeIndex) -> bool {
        let Some(step1) = self.edges[e].opposite.and_then(|o| self.edges[o].next_manifold) else {
            return false;
        };
        match self.edges[step1]
            .opposite
            .and_then(|o| self.edges[o].next_manifold)
        {
            Some(back) => back != e,
            None => false,
        }
    }

    /// Advances around the sheets meeting at an edge.
    pub fn next_sheet_edge(&self, e: EdgeIndex) -> Option<EdgeIndex> {
        self.edges[e]
            .opposite
            .and_then(|o| self.edges[o].next_manifold)
    }

    /// Triangulates all faces as fans and assigns each triangle the material of its face.
    pub fn convert_to_tri_mesh<M>(&self, material_of_face: M) -> TriMesh
    where
        M: Fn(FaceIndex, &F) -> u32,
    {
        let mut mesh = TriMesh::new();
        mesh.vertices = self.positions.clone();
        for (f, face) in self.faces.iter().enumerate() {
            let material = material_of_face(f, &face.data);
            let vertices = self.face_vertices(f);
            for k in 1..vertices.len() - 1 {
                mesh.add_face([vertices[0], vertices[k], vertices[k + 1]], material);
            }
        }
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tetrahedron() -> HalfEdgeMesh<u32> {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        let polygons = vec![
            (vec![0, 2, 1], 0),
            (vec![0, 1, 3], 0),
            (vec![1, 2, 3], 0),
            (vec![0, 3, 2], 0),
        ];
        HalfEdgeMesh::from_polygons(positions, polygons).unwrap()
    }

    #[test]
    fn closed_polyhedron_links_every_opposite_edge() {
        let mesh = tetrahedron();
        assert_eq!(mesh.edge_count(), 12);
        assert!(mesh.is_closed());
        for e in 0..mesh.edge_count() {
            let edge = mesh.edge(e);
            let opposite = mesh.edge(edge.opposite.unwrap());
            assert_eq!(opposite.vertex1, edge.vertex2);
            assert_eq!(opposite.vertex2, edge.vertex1);
            assert_eq!(opposite.opposite, Some(e));
        }
    }

    #[test]
    fn face_edges_walk_the_polygon_cycle() {
        let mesh = tetrahedron();
        assert_eq!(mesh.face_vertices(2), vec![1, 2, 3]);
        for e in mesh.face_edges(1) {
            let edge = mesh.edge(e);
            assert_eq!(mesh.edge(edge.next_face_edge).prev_face_edge, e);
        }
    }

    #[test]
    fn open_mesh_is_reported() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mesh = HalfEdgeMesh::from_polygons(positions, vec![(vec![0, 1, 2], ())]).unwrap();
        assert_eq!(mesh.ensure_closed(), Err(MeshError::OpenMesh { open_edges: 3 }));
    }

    #[test]
    fn duplicated_directed_edge_is_non_manifold() {
        let positions = vec![Point3::origin(); 4];
        let polygons = vec![(vec![0, 1, 2], ()), (vec![0, 1, 3], ())];
        let result = HalfEdgeMesh::from_polygons(positions, polygons);
        assert_eq!(result, Err(MeshError::NonManifoldEdge { v1: 0, v2: 1 }));
    }

    #[test]
    fn invalid_polygons_are_rejected() {
        let positions = vec![Point3::origin(); 3];
        assert_eq!(
            HalfEdgeMesh::from_polygons(positions.clone(), vec![(vec![0, 1], ())]),
            Err(MeshError::DegenerateFace { face: 0 })
        );
        assert_eq!(
            HalfEdgeMesh::from_polygons(positions, vec![(vec![0, 1, 5], ())]),
            Err(MeshError::VertexOutOfRange {
                face: 0,
                vertex: 5,
                count: 3
            })
        );
    }

    #[test]
    fn sheets_allow_shared_edges_and_opposite_faces_are_cross_linked() {
        // Two regions separated by a single two-sided triangle, each closed by its own cap.
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(0.0, 0.0, -1.0),
        ];
        let polygons = vec![
            (vec![0, 2, 1], 1u32),
            (vec![0, 1, 3], 1),
            (vec![1, 2, 3], 1),
            (vec![0, 3, 2], 1),
            (vec![0, 1, 2], 2),
            (vec![1, 0, 4], 2),
            (vec![2, 1, 4], 2),
            (vec![0, 2, 4], 2),
        ];
        let mut mesh = HalfEdgeMesh::from_polygons_by(positions, polygons, |&r| r).unwrap();
        assert_eq!(mesh.link_opposite_faces(), 1);
        assert_eq!(mesh.face(0).opposite_face, Some(4));
        for e in mesh.face_edges(0) {
            let partner = mesh.edge(e).next_manifold.unwrap();
            assert_eq!(mesh.edge(partner).face, 4);
            assert!(!mesh.is_triple_line(e));
        }
    }

    #[test]
    fn fan_triangulation_keeps_face_material() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mesh = HalfEdgeMesh::from_polygons(positions, vec![(vec![0, 1, 2, 3], 9u32)]).unwrap();
        let tri = mesh.convert_to_tri_mesh(|_, &m| m);
        assert_eq!(tri.face_count(), 2);
        assert_eq!(tri.faces[0].vertices, [0, 1, 2]);
        assert_eq!(tri.faces[1].vertices, [0, 2, 3]);
        assert!(tri.faces.iter().all(|f| f.material == 9));
    }
}
