use crate::core::models::cell::SimulationCell;
use crate::core::models::property::ParticleProperty;
use nalgebra::Point3;

/// Accumulates one property component onto a regular grid spanning the cell.
///
/// The bin of a particle along axis `d` is its reduced coordinate times `dims[d]`,
/// truncated toward zero. Periodic axes wrap the bin index; along non-periodic
/// axes particles outside the cell are dropped. NaN values are skipped and
/// values landing in the same bin are summed.
///
/// The result is laid out as `z + nz * (y + ny * x)`.
pub fn map_to_spatial_grid(
    positions: &[Point3<f64>],
    property: &ParticleProperty,
    component: usize,
    cell: &SimulationCell,
    dims: [usize; 3],
) -> Vec<f64> {
    let mut grid = vec![0.0; dims[0] * dims[1] * dims[2]];
    if grid.is_empty() {
        return grid;
    }

    'particles: for (i, p) in positions.iter().enumerate() {
        let Some(value) = property.get(i, component) else {
            continue;
        };
        if value.is_nan() {
            continue;
        }

        let reduced = cell.absolute_to_reduced(p);
        let mut bin = [0usize; 3];
        for d in 0..3 {
            let scaled = reduced[d] * dims[d] as f64;
            if !scaled.is_finite() {
                continue 'particles;
            }
            let n = dims[d] as i64;
            let b = scaled as i64;
            if cell.has_pbc(d) {
                bin[d] = SimulationCell::modulo(b, n) as usize;
            } else if (0..n).contains(&b) {
                bin[d] = b as usize;
            } else {
                continue 'particles;
            }
        }
        grid[bin[2] + dims[2] * (bin[1] + dims[1] * bin[0])] += value;
    }

    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn total_is_conserved_for_periodic_cell() {
        let cell = SimulationCell::cubic(10.0).unwrap();
        let positions = vec![
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(12.0, -3.0, 5.0),
            Point3::new(9.99, 0.0, 4.0),
        ];
        let property = ParticleProperty::scalar_float("Charge", vec![1.0, 2.5, -0.5]);
        let grid = map_to_spatial_grid(&positions, &property, 0, &cell, [4, 4, 4]);
        assert!((grid.iter().sum::<f64>() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn colliding_values_are_summed_into_row_major_bin() {
        let cell = SimulationCell::cubic(4.0).unwrap();
        let positions = vec![Point3::new(1.2, 2.1, 3.5), Point3::new(1.8, 2.9, 3.1)];
        let property = ParticleProperty::scalar_int("Type", vec![2, 3]);
        let grid = map_to_spatial_grid(&positions, &property, 0, &cell, [4, 4, 4]);
        assert_eq!(grid[3 + 4 * (2 + 4 * 1)], 5.0);
    }

    #[test]
    fn non_periodic_axis_drops_outside_particles() {
        let cell = SimulationCell::orthogonal(Vector3::new(4.0, 4.0, 4.0), [true, true, false])
            .unwrap();
        let positions = vec![Point3::new(1.0, 1.0, 5.0), Point3::new(1.0, 1.0, 1.0)];
        let property = ParticleProperty::scalar_float("Mass", vec![1.0, 1.0]);
        let grid = map_to_spatial_grid(&positions, &property, 0, &cell, [2, 2, 2]);
        assert_eq!(grid.iter().sum::<f64>(), 1.0);
    }

    #[test]
    fn nan_values_are_skipped() {
        let cell = SimulationCell::cubic(4.0).unwrap();
        let positions = vec![Point3::new(1.0, 1.0, 1.0), Point3::new(2.0, 2.0, 2.0)];
        let property = ParticleProperty::scalar_float("Energy", vec![f64::NAN, 4.0]);
        let grid = map_to_spatial_grid(&positions, &property, 0, &cell, [2, 2, 2]);
        assert_eq!(grid.iter().sum::<f64>(), 4.0);
    }

    #[test]
    fn vector_component_is_selected() {
        let cell = SimulationCell::cubic(4.0).unwrap();
        let property = ParticleProperty::vector_float("Force", 3, vec![1.0, 2.0, 3.0]).unwrap();
        let grid = map_to_spatial_grid(&[Point3::new(1.0, 1.0, 1.0)], &property, 2, &cell, [1, 1, 1]);
        assert_eq!(grid, vec![3.0]);
    }
}
