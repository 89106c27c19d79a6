use crate::core::models::cell::SimulationCell;
use crate::core::models::particles::ParticleData;
use crate::core::models::property::{ParticleProperty, PropertyReference};
use crate::core::neighbors::CutoffNeighborFinder;
use crate::core::utils::fft::Grid3;
use crate::core::utils::spatial_grid::map_to_spatial_grid;
use crate::engine::ComputeEngine;
use crate::engine::config::{CorrelationConfig, ShortRangedPairing};
use crate::engine::context::ComputeContext;
use crate::engine::error::EngineError;
use crate::engine::progress::Progress;
use crate::engine::state::Outcome;
use nalgebra::Vector3;
use std::f64::consts::PI;
use std::ops::Range;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Widens the short-ranged histogram so that pairs exactly at the cutoff land in the last bin.
const BIN_EPSILON: f64 = 1e-12;

/// Particle snapshot shared with a correlation run.
pub type CorrelationInput = ParticleData;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Curve {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Curve {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrelationResults {
    /// Real-space correlation from the inverse FFT, binned by distance.
    pub real_space: Curve,
    /// Direct neighbor summation within the short-ranged cutoff.
    pub short_ranged: Curve,
    /// Cross power spectrum binned by wavevector magnitude.
    ///
    /// Only the real part of `F1 * conj(F2)` is binned; for cross-correlations
    /// of two different properties the imaginary part is discarded.
    pub reciprocal_space: Curve,
    pub mean1: f64,
    pub mean2: f64,
    /// Mean of the per-particle products of the two properties.
    pub covariance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationStage {
    GridMapping,
    ForwardFft,
    RadialBinningReciprocal,
    InverseFft,
    RadialBinningRealSpace,
    DirectNeighborSum,
}

impl CorrelationStage {
    pub fn name(self) -> &'static str {
        match self {
            CorrelationStage::GridMapping => "Mapping to Spatial Grid",
            CorrelationStage::ForwardFft => "Forward FFT",
            CorrelationStage::RadialBinningReciprocal => "Binning Reciprocal Space",
            CorrelationStage::InverseFft => "Inverse FFT",
            CorrelationStage::RadialBinningRealSpace => "Binning Real Space",
            CorrelationStage::DirectNeighborSum => "Short-Ranged Neighbor Sum",
        }
    }
}

/// Spatial correlation function between two particle properties.
#[derive(Debug)]
pub struct CorrelationEngine {
    input: Arc<CorrelationInput>,
    config: CorrelationConfig,
    property1: usize,
    property2: usize,
}

impl ComputeEngine for CorrelationEngine {
    type Input = CorrelationInput;
    type Config = CorrelationConfig;
    type Output = CorrelationResults;

    const NAME: &'static str = "correlation";

    fn prepare(input: Arc<CorrelationInput>, config: CorrelationConfig) -> Result<Self, EngineError> {
        let property1 = resolve_property(&input, &config.property1)?;
        let property2 = resolve_property(&input, &config.property2)?;
        Ok(Self {
            input,
            config,
            property1,
            property2,
        })
    }

    #[instrument(skip_all, name = "correlation_task")]
    fn perform(&self, context: &ComputeContext<'_>) -> Result<Outcome<CorrelationResults>, EngineError> {
        let data = &*self.input;
        let cell = &data.cell;
        let particle_count = data.particle_count();
        let property1 = &data.properties[self.property1];
        let property2 = &data.properties[self.property2];
        let component1 = self.config.property1.component_index();
        let component2 = self.config.property2.component_index();
        let spacing = self.config.fft_grid_spacing;

        let dims = grid_dimensions(cell, spacing);
        info!(
            particles = particle_count,
            grid = ?dims,
            "Starting correlation function calculation."
        );

        // === Stage 1: Map both properties onto the spatial grid ===
        if canceled_before(context, CorrelationStage::GridMapping) {
            return Ok(Outcome::Canceled);
        }
        let (grid1, grid2) = context.reporter.phase(CorrelationStage::GridMapping.name(), || {
            (
                map_to_spatial_grid(&data.positions, property1, component1, cell, dims),
                map_to_spatial_grid(&data.positions, property2, component2, cell, dims),
            )
        });

        // === Stage 2: Forward transform and cross power spectrum ===
        if canceled_before(context, CorrelationStage::ForwardFft) {
            return Ok(Outcome::Canceled);
        }
        let mut spectrum = context.reporter.phase(CorrelationStage::ForwardFft.name(), || {
            cross_spectrum(&grid1, &grid2, dims)
        });

        // === Stage 3: Bin the spectrum by wavevector magnitude ===
        if canceled_before(context, CorrelationStage::RadialBinningReciprocal) {
            return Ok(Outcome::Canceled);
        }
        let reciprocal_space = context
            .reporter
            .phase(CorrelationStage::RadialBinningReciprocal.name(), || {
                bin_reciprocal_space(&spectrum, cell, spacing, particle_count)
            });

        // === Stage 4: Inverse transform back to real space ===
        if canceled_before(context, CorrelationStage::InverseFft) {
            return Ok(Outcome::Canceled);
        }
        context
            .reporter
            .phase(CorrelationStage::InverseFft.name(), || spectrum.inverse());

        // === Stage 5: Bin the real-space correlation by distance ===
        if canceled_before(context, CorrelationStage::RadialBinningRealSpace) {
            return Ok(Outcome::Canceled);
        }
        let real_space = context
            .reporter
            .phase(CorrelationStage::RadialBinningRealSpace.name(), || {
                bin_real_space(&spectrum, cell, spacing, particle_count)
            });

        let values1: Vec<f64> = property1.component_values(component1)?.collect();
        let values2: Vec<f64> = property2.component_values(component2)?.collect();

        // === Stage 6: Direct summation over neighbors within the cutoff ===
        let short_ranged = if self.config.compute_short_ranged {
            if canceled_before(context, CorrelationStage::DirectNeighborSum) {
                return Ok(Outcome::Canceled);
            }
            context.reporter.report(Progress::PhaseStart {
                name: CorrelationStage::DirectNeighborSum.name(),
            });
            let finder =
                CutoffNeighborFinder::prepare(self.config.short_ranged_cutoff, &data.positions, cell)?;
            let curve = sum_short_ranged(&finder, &values1, &values2, &self.config, context);
            context.reporter.report(Progress::PhaseFinish);
            curve
        } else {
            Curve::default()
        };

        if context.is_canceled() {
            return Ok(Outcome::Canceled);
        }

        let (mean1, mean2, covariance) = property_statistics(&values1, &values2);
        info!(mean1, mean2, covariance, "Correlation function calculation finished.");

        Ok(Outcome::Completed(CorrelationResults {
            real_space,
            short_ranged,
            reciprocal_space,
            mean1,
            mean2,
            covariance,
        }))
    }
}

fn resolve_property(data: &ParticleData, reference: &PropertyReference) -> Result<usize, EngineError> {
    let index = data
        .properties
        .iter()
        .position(|p| p.name() == reference.name)
        .ok_or_else(|| EngineError::MissingProperty {
            name: reference.name.clone(),
        })?;
    let property: &ParticleProperty = &data.properties[index];
    if property.len() != data.particle_count() {
        return Err(EngineError::PropertySizeMismatch {
            name: reference.name.clone(),
            len: property.len(),
            expected: data.particle_count(),
        });
    }
    // Surfaces an out-of-range component before any work starts.
    property.component_values(reference.component_index())?;
    Ok(index)
}

fn canceled_before(context: &ComputeContext<'_>, stage: CorrelationStage) -> bool {
    let canceled = context.is_canceled();
    if canceled {
        info!(stage = stage.name(), "Correlation calculation canceled.");
    }
    canceled
}

/// Grid resolution along each cell vector: `max(1, floor(|a_d| / spacing))`.
pub fn grid_dimensions(cell: &SimulationCell, spacing: f64) -> [usize; 3] {
    std::array::from_fn(|d| ((cell.edge(d).norm() / spacing).floor() as usize).max(1))
}

/// Forward-transforms both grids and returns `F1 * conj(F2)`.
fn cross_spectrum(grid1: &[f64], grid2: &[f64], dims: [usize; 3]) -> Grid3 {
    let mut ft1 = Grid3::from_real(dims, grid1);
    ft1.forward();
    let mut ft2 = Grid3::from_real(dims, grid2);
    ft2.forward();
    for (a, b) in ft1.data_mut().iter_mut().zip(ft2.data()) {
        *a *= b.conj();
    }
    ft1
}

/// Signed frequency of grid index `b` on an axis with `n` points.
#[inline]
fn wave_index(b: usize, n: usize) -> i64 {
    let half = n as i64 / 2;
    SimulationCell::modulo(b as i64 + half, n as i64) - half
}

fn pair_normalization(particle_count: usize) -> f64 {
    if particle_count == 0 {
        0.0
    } else {
        1.0 / (particle_count as f64 * particle_count as f64)
    }
}

fn averaged_curve(x: Vec<f64>, sums: Vec<f64>, counts: Vec<usize>, factor: f64) -> Curve {
    let y = sums
        .into_iter()
        .zip(counts)
        .map(|(sum, count)| if count > 0 { sum * factor / count as f64 } else { 0.0 })
        .collect();
    Curve { x, y }
}

fn bin_reciprocal_space(
    spectrum: &Grid3,
    cell: &SimulationCell,
    spacing: f64,
    particle_count: usize,
) -> Curve {
    let min_reciprocal = 1.0 / cell.min_face_distance();
    let bin_count = ((1.0 / (2.0 * min_reciprocal * spacing)).floor() as usize).max(1);
    let reciprocal = cell.inverse_matrix().transpose();
    let [nx, ny, nz] = spectrum.dims();

    let mut sums = vec![0.0; bin_count];
    let mut counts = vec![0usize; bin_count];
    for x in 0..nx {
        for y in 0..ny {
            // Real input makes the spectrum Hermitian; half of the z axis suffices.
            for z in 0..=nz / 2 {
                if x == 0 && y == 0 && z == 0 {
                    continue;
                }
                let frequency = Vector3::new(
                    wave_index(x, nx) as f64,
                    wave_index(y, ny) as f64,
                    wave_index(z, nz) as f64,
                );
                let wavevector = reciprocal * frequency;
                let bin = (wavevector.norm() / min_reciprocal).floor() as usize;
                if bin < bin_count {
                    sums[bin] += spectrum.get(x, y, z).re;
                    counts[bin] += 1;
                }
            }
        }
    }

    let x = (0..bin_count)
        .map(|k| 2.0 * PI * (k as f64 + 0.5) * min_reciprocal)
        .collect();
    let factor = cell.volume() * pair_normalization(particle_count);
    debug!(bins = bin_count, "Reciprocal-space binning done.");
    averaged_curve(x, sums, counts, factor)
}

fn bin_real_space(
    correlation: &Grid3,
    cell: &SimulationCell,
    spacing: f64,
    particle_count: usize,
) -> Curve {
    let min_face_distance = cell.min_face_distance();
    let bin_count = ((min_face_distance / (2.0 * spacing)).floor() as usize).max(1);
    let bin_width = min_face_distance / (2.0 * bin_count as f64);
    let [nx, ny, nz] = correlation.dims();

    let mut sums = vec![0.0; bin_count];
    let mut counts = vec![0usize; bin_count];
    for x in 0..nx {
        for y in 0..ny {
            for z in 0..nz {
                if x == 0 && y == 0 && z == 0 {
                    continue;
                }
                let reduced = Vector3::new(
                    wave_index(x, nx) as f64 / nx as f64,
                    wave_index(y, ny) as f64 / ny as f64,
                    wave_index(z, nz) as f64 / nz as f64,
                );
                let distance = cell.reduced_to_absolute_vector(&reduced).norm();
                let bin = (distance / bin_width).floor() as usize;
                if bin < bin_count {
                    sums[bin] += correlation.get(x, y, z).re;
                    counts[bin] += 1;
                }
            }
        }
    }

    let x = (0..bin_count)
        .map(|k| (k as f64 + 0.5) * bin_width)
        .collect();
    debug!(bins = bin_count, "Real-space binning done.");
    averaged_curve(x, sums, counts, pair_normalization(particle_count))
}

#[cfg(feature = "parallel")]
fn worker_count() -> usize {
    rayon::current_num_threads()
}

#[cfg(not(feature = "parallel"))]
fn worker_count() -> usize {
    1
}

fn particle_chunks(particle_count: usize, chunk_count: usize) -> Vec<Range<usize>> {
    let chunk_size = particle_count.div_ceil(chunk_count.max(1)).max(1);
    (0..particle_count)
        .step_by(chunk_size)
        .map(|start| start..(start + chunk_size).min(particle_count))
        .collect()
}

fn sum_short_ranged(
    finder: &CutoffNeighborFinder,
    values1: &[f64],
    values2: &[f64],
    config: &CorrelationConfig,
    context: &ComputeContext<'_>,
) -> Curve {
    let bin_count = config.number_of_bins;
    let bin_width = (config.short_ranged_cutoff + BIN_EPSILON) / bin_count as f64;
    let particle_count = finder.particle_count();
    let histogram = Mutex::new(vec![0.0; bin_count]);

    let chunks = particle_chunks(particle_count, worker_count());
    context.reporter.report(Progress::TaskStart {
        total_steps: particle_count as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = chunks.iter();

    #[cfg(feature = "parallel")]
    let iterator = chunks.par_iter();

    iterator.for_each(|range| {
        let mut local = vec![0.0; bin_count];
        for i in range.clone() {
            // The partial histogram is dropped; the caller discards the curve on cancel.
            if context.is_canceled() {
                return;
            }
            for neighbor in finder.query(i) {
                let distance = neighbor.distance_squared.sqrt();
                let bin = ((distance / bin_width) as usize).min(bin_count - 1);
                let partner = match config.short_ranged_pairing {
                    ShortRangedPairing::CentralParticle => values2[i],
                    ShortRangedPairing::NeighborPair => values2[neighbor.index],
                };
                local[bin] += values1[i] * partner;
            }
            context.reporter.report(Progress::TaskIncrement);
        }
        let mut total = histogram.lock().unwrap_or_else(PoisonError::into_inner);
        for (sum, value) in total.iter_mut().zip(local) {
            *sum += value;
        }
    });
    context.reporter.report(Progress::TaskFinish);

    let histogram = histogram.into_inner().unwrap_or_else(PoisonError::into_inner);
    let prefactor = 3.0 * finder.cell().volume() * pair_normalization(particle_count) / (4.0 * PI);
    let (x, y) = histogram
        .into_iter()
        .enumerate()
        .map(|(k, sum)| {
            let r1 = k as f64 * bin_width;
            let r2 = r1 + bin_width;
            let shell = r2 * r2 * r2 - r1 * r1 * r1;
            (0.5 * (r1 + r2), sum * prefactor / shell)
        })
        .unzip();
    Curve { x, y }
}

fn property_statistics(values1: &[f64], values2: &[f64]) -> (f64, f64, f64) {
    let n = values1.len();
    if n == 0 {
        return (0.0, 0.0, 0.0);
    }
    let n = n as f64;
    let mean1 = values1.iter().sum::<f64>() / n;
    let mean2 = values2.iter().sum::<f64>() / n;
    let covariance = values1
        .iter()
        .zip(values2)
        .map(|(a, b)| a * b)
        .sum::<f64>()
        / n;
    (mean1, mean2, covariance)
}
