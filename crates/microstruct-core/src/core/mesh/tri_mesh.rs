use nalgebra::{Point3, Vector3};
use std::collections::HashMap;

/// Default tolerance used when classifying points against a plane.
pub const PLANE_EPSILON: f64 = 1e-12;

/// An oriented plane `normal · p = dist`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane3 {
    pub normal: Vector3<f64>,
    pub dist: f64,
}

impl Plane3 {
    pub fn new(normal: Vector3<f64>, dist: f64) -> Self {
        Self { normal, dist }
    }

    /// Creates the plane through `point` with the given normal.
    pub fn from_point_normal(point: &Point3<f64>, normal: Vector3<f64>) -> Self {
        Self {
            normal,
            dist: normal.dot(&point.coords),
        }
    }

    /// Signed distance of a point from the plane, scaled by the normal length.
    #[inline]
    pub fn point_distance(&self, p: &Point3<f64>) -> f64 {
        self.normal.dot(&p.coords) - self.dist
    }

    /// Returns `+1` on the positive side, `-1` on the negative side, `0` within `epsilon`.
    #[inline]
    pub fn classify_point(&self, p: &Point3<f64>, epsilon: f64) -> i8 {
        let d = self.point_distance(p);
        if d < -epsilon {
            -1
        } else if d > epsilon {
            1
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriFace {
    pub vertices: [usize; 3],
    pub material: u32,
}

impl TriFace {
    pub fn new(vertices: [usize; 3], material: u32) -> Self {
        Self { vertices, material }
    }

    #[inline]
    pub fn vertex(&self, i: usize) -> usize {
        self.vertices[i]
    }
}

/// A flat triangle mesh used for display output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriMesh {
    pub vertices: Vec<Point3<f64>>,
    pub faces: Vec<TriFace>,
}

impl TriMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn add_vertex(&mut self, p: Point3<f64>) -> usize {
        self.vertices.push(p);
        self.vertices.len() - 1
    }

    pub fn add_face(&mut self, vertices: [usize; 3], material: u32) -> usize {
        self.faces.push(TriFace::new(vertices, material));
        self.faces.len() - 1
    }

    /// Removes the part of the mesh on the positive side of `plane`.
    ///
    /// Edges crossing the plane are cut at the intersection point. Each intersection
    /// vertex is created once per (unordered) edge so that adjacent faces stay connected.
    /// Triangles that become quadrilaterals are split into two triangles.
    pub fn clip_at_plane(&mut self, plane: &Plane3) {
        let mut clipped = TriMesh::new();

        let classes: Vec<i8> = self
            .vertices
            .iter()
            .map(|p| plane.classify_point(p, PLANE_EPSILON))
            .collect();

        let mut existing: Vec<Option<usize>> = vec![None; self.vertices.len()];
        for (i, p) in self.vertices.iter().enumerate() {
            if classes[i] != 1 {
                existing[i] = Some(clipped.add_vertex(*p));
            }
        }

        let mut intersections: HashMap<(usize, usize), usize> = HashMap::new();
        for face in &self.faces {
            for v in 0..3 {
                let key = ordered_pair(face.vertex(v), face.vertex((v + 1) % 3));
                let v1 = &self.vertices[key.0];
                let v2 = &self.vertices[key.1];
                let z1 = plane.point_distance(v1);
                let z2 = plane.point_distance(v2);
                let crosses = (z1 < PLANE_EPSILON && z2 > PLANE_EPSILON)
                    || (z2 < PLANE_EPSILON && z1 > PLANE_EPSILON);
                if crosses && !intersections.contains_key(&key) {
                    let p = v1 + (v1 - v2) * (z1 / (z2 - z1));
                    intersections.insert(key, clipped.add_vertex(p));
                }
            }
        }

        for face in &self.faces {
            let Some(v0) = (0..3).find(|&v| classes[face.vertex(v)] == -1) else {
                continue;
            };

            let mut polygon: Vec<usize> = Vec::with_capacity(4);
            let mut current = classes[face.vertex(v0)];
            for v in v0..v0 + 3 {
                let this_vertex = face.vertex(v % 3);
                let next_vertex = face.vertex((v + 1) % 3);
                let next = classes[next_vertex];
                if (next <= 0 && current <= 0) || (next == 1 && current == 0) {
                    if let Some(idx) = existing[this_vertex] {
                        polygon.push(idx);
                    }
                } else if (current == 1 && next == -1) || (current == -1 && next == 1) {
                    if current == -1 {
                        if let Some(idx) = existing[this_vertex] {
                            polygon.push(idx);
                        }
                    }
                    if let Some(&idx) = intersections.get(&ordered_pair(this_vertex, next_vertex)) {
                        polygon.push(idx);
                    }
                }
                current = next;
            }

            if polygon.len() >= 3 {
                clipped.add_face([polygon[0], polygon[1], polygon[2]], face.material);
                if polygon.len() == 4 {
                    clipped.add_face([polygon[0], polygon[2], polygon[3]], face.material);
                }
            }
        }

        *self = clipped;
    }

    /// Volume enclosed by a closed, consistently oriented mesh (divergence theorem).
    pub fn signed_volume(&self) -> f64 {
        self.faces
            .iter()
            .map(|f| {
                let a = self.vertices[f.vertex(0)].coords;
                let b = self.vertices[f.vertex(1)].coords;
                let c = self.vertices[f.vertex(2)].coords;
                a.dot(&b.cross(&c))
            })
            .sum::<f64>()
            / 6.0
    }

    /// Counts the faces adjacent to every undirected edge.
    pub fn edge_face_counts(&self) -> HashMap<(usize, usize), usize> {
        let mut counts = HashMap::new();
        for face in &self.faces {
            for v in 0..3 {
                let key = ordered_pair(face.vertex(v), face.vertex((v + 1) % 3));
                *counts.entry(key).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Returns `true` if every undirected edge is shared by exactly two faces.
    pub fn is_closed(&self) -> bool {
        self.edge_face_counts().values().all(|&n| n == 2)
    }
}

#[inline]
fn ordered_pair(a: usize, b: usize) -> (usize, usize) {
    if a <= b { (a, b) } else { (b, a) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_cube() -> TriMesh {
        let mut mesh = TriMesh::new();
        for z in 0..2 {
            for y in 0..2 {
                for x in 0..2 {
                    mesh.add_vertex(Point3::new(x as f64, y as f64, z as f64));
                }
            }
        }
        let quads = [
            [0, 2, 3, 1],
            [4, 5, 7, 6],
            [0, 1, 5, 4],
            [2, 6, 7, 3],
            [0, 4, 6, 2],
            [1, 3, 7, 5],
        ];
        for q in quads {
            mesh.add_face([q[0], q[1], q[2]], 0);
            mesh.add_face([q[0], q[2], q[3]], 0);
        }
        mesh
    }

    #[test]
    fn classify_point_respects_epsilon() {
        let plane = Plane3::new(Vector3::z(), 1.0);
        assert_eq!(plane.classify_point(&Point3::new(0.0, 0.0, 2.0), 1e-6), 1);
        assert_eq!(plane.classify_point(&Point3::new(0.0, 0.0, 0.0), 1e-6), -1);
        assert_eq!(plane.classify_point(&Point3::new(5.0, 5.0, 1.0 + 1e-9), 1e-6), 0);
    }

    #[test]
    fn unit_cube_is_closed_with_unit_volume() {
        let cube = unit_cube();
        assert!(cube.is_closed());
        assert!((cube.signed_volume() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn clip_removes_positive_half_space() {
        let mut cube = unit_cube();
        cube.clip_at_plane(&Plane3::new(Vector3::x(), 0.5));
        assert!(cube.face_count() > 0);
        for p in &cube.vertices {
            assert!(p.x <= 0.5 + 1e-12);
        }
    }

    #[test]
    fn clip_shares_intersection_vertices_between_adjacent_faces() {
        let mut cube = unit_cube();
        cube.clip_at_plane(&Plane3::new(Vector3::x(), 0.5));
        // 4 kept corners, plus one cut point on each of the 4 x-parallel edges
        // and each of the 4 face diagonals that cross the plane.
        assert_eq!(cube.vertex_count(), 12);
    }

    #[test]
    fn clip_with_plane_outside_mesh_keeps_everything() {
        let mut cube = unit_cube();
        let before = cube.clone();
        cube.clip_at_plane(&Plane3::new(Vector3::x(), 2.0));
        assert_eq!(cube, before);
    }

    #[test]
    fn clip_with_plane_below_mesh_removes_everything() {
        let mut cube = unit_cube();
        cube.clip_at_plane(&Plane3::new(-Vector3::x(), -2.0));
        assert_eq!(cube.face_count(), 0);
        assert_eq!(cube.vertex_count(), 0);
    }

    #[test]
    fn clipped_faces_keep_material_index() {
        let mut mesh = TriMesh::new();
        let a = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vertex(Point3::new(2.0, 0.0, 0.0));
        let c = mesh.add_vertex(Point3::new(0.0, 2.0, 0.0));
        mesh.add_face([a, b, c], 7);
        mesh.clip_at_plane(&Plane3::new(Vector3::x(), 1.0));
        assert_eq!(mesh.face_count(), 2);
        assert!(mesh.faces.iter().all(|f| f.material == 7));
    }
}
