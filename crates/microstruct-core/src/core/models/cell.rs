use nalgebra::{Matrix3, Point3, Vector3};
use thiserror::Error;

/// Cells whose determinant falls below this threshold are treated as degenerate.
const DEGENERATE_VOLUME_EPSILON: f64 = 1e-12;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum CellError {
    #[error("Simulation cell is degenerate (volume {volume:e})")]
    Degenerate { volume: f64 },
    #[error("Simulation cell contains non-finite values")]
    NonFinite,
}

/// A parallelepiped simulation cell with optional periodic boundary conditions.
///
/// The three cell edge vectors are stored as the columns of `matrix`. Points are
/// mapped between absolute coordinates and reduced (fractional) coordinates via
/// the affine transformation `p = matrix * r + origin`.
///
/// A `SimulationCell` is immutable once constructed and always has a positive
/// volume, so the inverse matrix is computed once up front.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationCell {
    matrix: Matrix3<f64>,
    inverse: Matrix3<f64>,
    origin: Point3<f64>,
    pbc: [bool; 3],
}

impl SimulationCell {
    /// Creates a new simulation cell.
    ///
    /// # Arguments
    ///
    /// * `matrix` - The cell matrix whose columns are the three edge vectors.
    /// * `origin` - The position of the cell corner.
    /// * `pbc` - Periodic boundary flags for the three cell axes.
    ///
    /// # Errors
    ///
    /// Returns [`CellError::Degenerate`] if the cell has (nearly) zero volume and
    /// [`CellError::NonFinite`] if the matrix or origin contains NaN or infinity.
    pub fn new(matrix: Matrix3<f64>, origin: Point3<f64>, pbc: [bool; 3]) -> Result<Self, CellError> {
        if matrix.iter().chain(origin.coords.iter()).any(|v| !v.is_finite()) {
            return Err(CellError::NonFinite);
        }
        let volume = matrix.determinant().abs();
        if volume <= DEGENERATE_VOLUME_EPSILON {
            return Err(CellError::Degenerate { volume });
        }
        let inverse = matrix
            .try_inverse()
            .ok_or(CellError::Degenerate { volume })?;
        Ok(Self {
            matrix,
            inverse,
            origin,
            pbc,
        })
    }

    /// Creates an orthogonal box with edge lengths `lengths` at the coordinate origin.
    pub fn orthogonal(lengths: Vector3<f64>, pbc: [bool; 3]) -> Result<Self, CellError> {
        Self::new(Matrix3::from_diagonal(&lengths), Point3::origin(), pbc)
    }

    /// Creates a fully periodic cube of side `length` at the coordinate origin.
    pub fn cubic(length: f64) -> Result<Self, CellError> {
        Self::orthogonal(Vector3::repeat(length), [true; 3])
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    pub fn inverse_matrix(&self) -> &Matrix3<f64> {
        &self.inverse
    }

    pub fn origin(&self) -> &Point3<f64> {
        &self.origin
    }

    pub fn pbc_flags(&self) -> [bool; 3] {
        self.pbc
    }

    pub fn has_pbc(&self, dim: usize) -> bool {
        self.pbc[dim]
    }

    /// Returns the cell edge vector along the given axis.
    pub fn edge(&self, dim: usize) -> Vector3<f64> {
        self.matrix.column(dim).into_owned()
    }

    /// Returns the volume of the cell.
    pub fn volume(&self) -> f64 {
        self.matrix.determinant().abs()
    }

    /// Returns the perpendicular distances between opposite cell faces.
    ///
    /// For axis `d` this is `1 / |row_d(H⁻¹)|`, i.e. the width of the cell
    /// measured normal to the face spanned by the other two edge vectors.
    pub fn face_distances(&self) -> Vector3<f64> {
        Vector3::from_fn(|d, _| 1.0 / self.inverse.row(d).norm())
    }

    /// Returns the smallest of the three face distances.
    pub fn min_face_distance(&self) -> f64 {
        self.face_distances().min()
    }

    pub fn absolute_to_reduced(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.inverse * (point - self.origin))
    }

    pub fn reduced_to_absolute(&self, reduced: &Point3<f64>) -> Point3<f64> {
        self.origin + self.matrix * reduced.coords
    }

    pub fn absolute_to_reduced_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.inverse * vector
    }

    pub fn reduced_to_absolute_vector(&self, reduced: &Vector3<f64>) -> Vector3<f64> {
        self.matrix * reduced
    }

    /// Applies the minimum image convention to a displacement vector.
    ///
    /// Along every periodic axis the vector is shifted by integer multiples of the
    /// cell edge so that its reduced component lies in `[-0.5, 0.5)`.
    /// Non-periodic axes are left untouched.
    pub fn wrap_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        let mut reduced = self.inverse * vector;
        for dim in 0..3 {
            if self.pbc[dim] {
                reduced[dim] -= (reduced[dim] + 0.5).floor();
            }
        }
        self.matrix * reduced
    }

    /// Maps a point into the primary cell image along all periodic axes.
    pub fn wrap_point(&self, point: &Point3<f64>) -> Point3<f64> {
        let mut reduced = self.absolute_to_reduced(point);
        for dim in 0..3 {
            if self.pbc[dim] {
                reduced[dim] -= reduced[dim].floor();
            }
        }
        self.reduced_to_absolute(&reduced)
    }

    /// Integer modulo that always returns a value in `[0, n)`.
    #[inline]
    pub fn modulo(i: i64, n: i64) -> i64 {
        i.rem_euclid(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    fn triclinic_cell() -> SimulationCell {
        let matrix = Matrix3::new(4.0, 1.0, 0.5, 0.0, 5.0, 0.8, 0.0, 0.0, 6.0);
        SimulationCell::new(matrix, Point3::new(-1.0, 2.0, 0.5), [true, true, false]).unwrap()
    }

    #[test]
    fn new_rejects_degenerate_matrix() {
        let matrix = Matrix3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 1.0);
        let result = SimulationCell::new(matrix, Point3::origin(), [true; 3]);
        assert!(matches!(result, Err(CellError::Degenerate { .. })));
    }

    #[test]
    fn new_rejects_non_finite_values() {
        let mut matrix = Matrix3::identity();
        matrix[(1, 1)] = f64::NAN;
        let result = SimulationCell::new(matrix, Point3::origin(), [true; 3]);
        assert_eq!(result, Err(CellError::NonFinite));
    }

    #[test]
    fn reduced_and_absolute_coordinates_are_inverse_mappings() {
        let cell = triclinic_cell();
        let p = Point3::new(1.3, -2.7, 4.4);
        let back = cell.reduced_to_absolute(&cell.absolute_to_reduced(&p));
        assert!((back - p).norm() < TOLERANCE);
    }

    #[test]
    fn cell_corner_maps_to_reduced_origin() {
        let cell = triclinic_cell();
        let reduced = cell.absolute_to_reduced(cell.origin());
        assert!(reduced.coords.norm() < TOLERANCE);
    }

    #[test]
    fn volume_matches_determinant() {
        let cell = triclinic_cell();
        assert!((cell.volume() - 120.0).abs() < TOLERANCE);
    }

    #[test]
    fn face_distances_of_orthogonal_box_are_edge_lengths() {
        let cell = SimulationCell::orthogonal(Vector3::new(2.0, 3.0, 4.0), [true; 3]).unwrap();
        let d = cell.face_distances();
        assert!((d - Vector3::new(2.0, 3.0, 4.0)).norm() < TOLERANCE);
        assert!((cell.min_face_distance() - 2.0).abs() < TOLERANCE);
    }

    #[test]
    fn wrap_vector_returns_minimum_image_along_periodic_axes() {
        let cell = SimulationCell::orthogonal(Vector3::new(10.0, 10.0, 10.0), [true, true, false])
            .unwrap();
        let wrapped = cell.wrap_vector(&Vector3::new(9.0, -6.0, 9.0));
        assert!((wrapped - Vector3::new(-1.0, 4.0, 9.0)).norm() < TOLERANCE);
    }

    #[test]
    fn wrap_point_moves_point_into_primary_image() {
        let cell = SimulationCell::cubic(10.0).unwrap();
        let wrapped = cell.wrap_point(&Point3::new(-1.0, 12.0, 5.0));
        assert!((wrapped - Point3::new(9.0, 2.0, 5.0)).norm() < TOLERANCE);
    }

    #[test]
    fn modulo_is_always_non_negative() {
        assert_eq!(SimulationCell::modulo(-1, 5), 4);
        assert_eq!(SimulationCell::modulo(7, 5), 2);
        assert_eq!(SimulationCell::modulo(-10, 5), 0);
    }
}
