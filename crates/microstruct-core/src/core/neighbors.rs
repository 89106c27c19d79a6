use crate::core::models::cell::SimulationCell;
use itertools::iproduct;
use nalgebra::{Point3, Vector3};
use thiserror::Error;
use tracing::debug;

/// Upper bound on the number of bins along each cell axis.
pub const MAX_BINS_PER_DIM: usize = 128;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum NeighborError {
    #[error("Invalid neighbor cutoff radius: {0} (must be positive and finite)")]
    InvalidCutoff(f64),
    #[error("Particle {index} has a non-finite position")]
    NonFinitePosition { index: usize },
}

/// A particle found within the cutoff of a query particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    /// Vector from the query particle to this (possibly periodic image of the) neighbor.
    pub delta: Vector3<f64>,
    pub distance_squared: f64,
}

/// Finds all particles within a fixed cutoff radius using a cell list.
///
/// Particles are sorted into a regular grid of bins laid out in reduced cell
/// coordinates. A query visits every bin of a precomputed stencil around the
/// query particle's bin. Along periodic axes the stencil wraps around and
/// carries an image shift, so cutoffs exceeding half the cell width still
/// report every periodic image, including images of the query particle itself.
#[derive(Debug, Clone)]
pub struct CutoffNeighborFinder {
    cutoff: f64,
    cutoff_squared: f64,
    cell: SimulationCell,
    num_bins: [usize; 3],
    stencil: Vec<[i64; 3]>,
    /// Positions mapped into the primary image along periodic axes.
    wrapped: Vec<Point3<f64>>,
    particle_bins: Vec<[usize; 3]>,
    bin_starts: Vec<usize>,
    sorted_particles: Vec<usize>,
}

impl CutoffNeighborFinder {
    /// Builds the bin grid for `positions` inside `cell`.
    ///
    /// # Errors
    ///
    /// Returns [`NeighborError::InvalidCutoff`] for a non-positive or non-finite
    /// cutoff and [`NeighborError::NonFinitePosition`] if any coordinate is NaN or infinite.
    pub fn prepare(
        cutoff: f64,
        positions: &[Point3<f64>],
        cell: &SimulationCell,
    ) -> Result<Self, NeighborError> {
        if !(cutoff.is_finite() && cutoff > 0.0) {
            return Err(NeighborError::InvalidCutoff(cutoff));
        }
        if let Some(index) = positions
            .iter()
            .position(|p| !p.coords.iter().all(|c| c.is_finite()))
        {
            return Err(NeighborError::NonFinitePosition { index });
        }

        let face_distances = cell.face_distances();
        let mut num_bins = [1usize; 3];
        let mut reach = [0i64; 3];
        for d in 0..3 {
            let n = (face_distances[d] / cutoff).floor() as usize;
            num_bins[d] = n.clamp(1, MAX_BINS_PER_DIM);
            reach[d] = (cutoff * num_bins[d] as f64 / face_distances[d]).ceil() as i64;
            if !cell.has_pbc(d) {
                // Bins beyond the grid edge are skipped anyway.
                reach[d] = reach[d].min(num_bins[d] as i64 - 1);
            }
        }
        let stencil: Vec<[i64; 3]> = iproduct!(
            -reach[0]..=reach[0],
            -reach[1]..=reach[1],
            -reach[2]..=reach[2]
        )
        .map(|(x, y, z)| [x, y, z])
        .collect();

        debug!(
            cutoff,
            bins = ?num_bins,
            stencil_size = stencil.len(),
            particles = positions.len(),
            "Building cutoff neighbor list."
        );

        let mut wrapped = Vec::with_capacity(positions.len());
        let mut particle_bins = Vec::with_capacity(positions.len());
        for p in positions {
            let mut reduced = cell.absolute_to_reduced(p);
            let mut bin = [0usize; 3];
            for d in 0..3 {
                if cell.has_pbc(d) {
                    reduced[d] -= reduced[d].floor();
                }
                let b = (reduced[d] * num_bins[d] as f64).floor() as i64;
                bin[d] = b.clamp(0, num_bins[d] as i64 - 1) as usize;
            }
            wrapped.push(cell.reduced_to_absolute(&reduced));
            particle_bins.push(bin);
        }

        let total_bins = num_bins[0] * num_bins[1] * num_bins[2];
        let linear = |b: &[usize; 3]| b[0] + num_bins[0] * (b[1] + num_bins[1] * b[2]);

        let mut counts = vec![0usize; total_bins];
        for b in &particle_bins {
            counts[linear(b)] += 1;
        }
        let mut bin_starts = vec![0usize; total_bins + 1];
        for i in 0..total_bins {
            bin_starts[i + 1] = bin_starts[i] + counts[i];
        }
        let mut fill = bin_starts.clone();
        let mut sorted_particles = vec![0usize; positions.len()];
        for (i, b) in particle_bins.iter().enumerate() {
            let slot = &mut fill[linear(b)];
            sorted_particles[*slot] = i;
            *slot += 1;
        }

        Ok(Self {
            cutoff,
            cutoff_squared: cutoff * cutoff,
            cell: cell.clone(),
            num_bins,
            stencil,
            wrapped,
            particle_bins,
            bin_starts,
            sorted_particles,
        })
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn particle_count(&self) -> usize {
        self.wrapped.len()
    }

    pub fn cell(&self) -> &SimulationCell {
        &self.cell
    }

    /// Returns the number of bins along each cell axis.
    pub fn bin_counts(&self) -> [usize; 3] {
        self.num_bins
    }

    /// Iterates over all neighbors of particle `index` within the cutoff.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not smaller than [`Self::particle_count`].
    pub fn query(&self, index: usize) -> NeighborQuery<'_> {
        NeighborQuery {
            finder: self,
            center_index: index,
            center: self.wrapped[index],
            center_bin: self.particle_bins[index],
            stencil_pos: 0,
            shift: Vector3::zeros(),
            zero_shift: true,
            current: 0,
            end: 0,
        }
    }

    fn bin_range(&self, bin: [usize; 3]) -> (usize, usize) {
        let linear = bin[0] + self.num_bins[0] * (bin[1] + self.num_bins[1] * bin[2]);
        (self.bin_starts[linear], self.bin_starts[linear + 1])
    }
}

/// Lazy iterator over the neighbors of one particle.
pub struct NeighborQuery<'a> {
    finder: &'a CutoffNeighborFinder,
    center_index: usize,
    center: Point3<f64>,
    center_bin: [usize; 3],
    stencil_pos: usize,
    shift: Vector3<f64>,
    zero_shift: bool,
    current: usize,
    end: usize,
}

impl NeighborQuery<'_> {
    /// Moves to the next stencil bin that exists. Returns `false` when the stencil is exhausted.
    fn advance_bin(&mut self) -> bool {
        let finder = self.finder;
        while self.stencil_pos < finder.stencil.len() {
            let offset = finder.stencil[self.stencil_pos];
            self.stencil_pos += 1;

            let mut bin = [0usize; 3];
            let mut image = Vector3::<f64>::zeros();
            let mut in_range = true;
            for d in 0..3 {
                let n = finder.num_bins[d] as i64;
                let target = self.center_bin[d] as i64 + offset[d];
                if finder.cell.has_pbc(d) {
                    bin[d] = SimulationCell::modulo(target, n) as usize;
                    image[d] = target.div_euclid(n) as f64;
                } else if (0..n).contains(&target) {
                    bin[d] = target as usize;
                } else {
                    in_range = false;
                    break;
                }
            }
            if !in_range {
                continue;
            }

            let (start, end) = finder.bin_range(bin);
            if start == end {
                continue;
            }
            self.zero_shift = image == Vector3::zeros();
            self.shift = finder.cell.reduced_to_absolute_vector(&image);
            self.current = start;
            self.end = end;
            return true;
        }
        false
    }
}

impl Iterator for NeighborQuery<'_> {
    type Item = Neighbor;

    fn next(&mut self) -> Option<Neighbor> {
        loop {
            while self.current < self.end {
                let j = self.finder.sorted_particles[self.current];
                self.current += 1;
                if j == self.center_index && self.zero_shift {
                    continue;
                }
                let delta = (self.finder.wrapped[j] - self.center) + self.shift;
                let distance_squared = delta.norm_squared();
                if distance_squared <= self.finder.cutoff_squared {
                    return Some(Neighbor {
                        index: j,
                        delta,
                        distance_squared,
                    });
                }
            }
            if !self.advance_bin() {
                return None;
            }
        }
    }
}
