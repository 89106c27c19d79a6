use crate::core::models::cell::SimulationCell;
use crate::core::models::cluster::ClusterGraph;
use crate::core::models::structure::StructureAnalysis;
use crate::engine::ComputeEngine;
use crate::engine::config::{ElasticStrainConfig, ideal_axial_ratio};
use crate::engine::context::ComputeContext;
use crate::engine::error::EngineError;
use crate::engine::progress::Progress;
use crate::engine::state::Outcome;
use nalgebra::{Matrix3, Point3, Vector3};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Everything the strain calculation reads: the deformed configuration and the
/// output of a structure identification step performed on it.
#[derive(Debug, Clone)]
pub struct ElasticStrainInput {
    pub cell: SimulationCell,
    pub positions: Vec<Point3<f64>>,
    pub structure: StructureAnalysis,
    pub graph: ClusterGraph,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElasticStrainResults {
    pub volumetric_strains: Vec<f64>,
    /// Symmetric strain tensors as `[XX, YY, ZZ, XY, XZ, YZ]`.
    pub strain_tensors: Option<Vec<[f64; 6]>>,
    /// Elastic deformation gradients, column-major.
    pub deformation_gradients: Option<Vec<[f64; 9]>>,
    /// Number of particles for which no strain could be computed.
    pub invalid_particle_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ParticleStrain {
    strain: Matrix3<f64>,
    deformation_gradient: Matrix3<f64>,
}

type WorkResult = Result<Option<ParticleStrain>, EngineError>;

/// Stops the per-particle loop early.
enum Interrupt {
    Canceled,
    Failed(EngineError),
}

impl From<EngineError> for Interrupt {
    fn from(e: EngineError) -> Self {
        Interrupt::Failed(e)
    }
}

/// Per-particle elastic deformation gradient and strain tensor relative to an ideal lattice.
#[derive(Debug)]
pub struct ElasticStrainEngine {
    input: Arc<ElasticStrainInput>,
    config: ElasticStrainConfig,
    ideal_unit_cell: Matrix3<f64>,
}

impl ComputeEngine for ElasticStrainEngine {
    type Input = ElasticStrainInput;
    type Config = ElasticStrainConfig;
    type Output = ElasticStrainResults;

    const NAME: &'static str = "elastic-strain";

    fn prepare(
        input: Arc<ElasticStrainInput>,
        config: ElasticStrainConfig,
    ) -> Result<Self, EngineError> {
        input.structure.validate(input.positions.len())?;
        let ideal_unit_cell = ideal_unit_cell(&config);
        Ok(Self {
            input,
            config,
            ideal_unit_cell,
        })
    }

    #[instrument(skip_all, name = "elastic_strain_task")]
    fn perform(
        &self,
        context: &ComputeContext<'_>,
    ) -> Result<Outcome<ElasticStrainResults>, EngineError> {
        let particle_count = self.input.positions.len();
        info!(
            particles = particle_count,
            structure = ?self.config.input_crystal_structure,
            "Starting elastic strain calculation."
        );
        if context.is_canceled() {
            return Ok(Outcome::Canceled);
        }

        context.reporter.report(Progress::PhaseStart {
            name: "Elastic Strain",
        });
        context.reporter.report(Progress::TaskStart {
            total_steps: particle_count as u64,
        });

        #[cfg(not(feature = "parallel"))]
        let iterator = 0..particle_count;

        #[cfg(feature = "parallel")]
        let iterator = (0..particle_count).into_par_iter();

        let collected: Result<Vec<Option<ParticleStrain>>, Interrupt> = iterator
            .map(|index| {
                if context.is_canceled() {
                    return Err(Interrupt::Canceled);
                }
                let particle = self.compute_particle(index)?;
                context.reporter.report(Progress::TaskIncrement);
                Ok(particle)
            })
            .collect();

        context.reporter.report(Progress::TaskFinish);
        context.reporter.report(Progress::PhaseFinish);

        let particles = match collected {
            Ok(particles) => particles,
            Err(Interrupt::Canceled) => {
                info!("Elastic strain calculation canceled.");
                return Ok(Outcome::Canceled);
            }
            Err(Interrupt::Failed(e)) => return Err(e),
        };
        if context.is_canceled() {
            return Ok(Outcome::Canceled);
        }

        let mut output = ElasticStrainResults {
            volumetric_strains: Vec::with_capacity(particle_count),
            strain_tensors: self
                .config
                .calculate_strain_tensors
                .then(|| Vec::with_capacity(particle_count)),
            deformation_gradients: self
                .config
                .calculate_deformation_gradients
                .then(|| Vec::with_capacity(particle_count)),
            invalid_particle_count: 0,
        };

        for particle in particles {
            let (strain, gradient) = match particle {
                Some(p) => (p.strain, p.deformation_gradient),
                None => {
                    output.invalid_particle_count += 1;
                    (Matrix3::zeros(), Matrix3::zeros())
                }
            };
            output.volumetric_strains.push(strain.trace() / 3.0);
            if let Some(tensors) = &mut output.strain_tensors {
                tensors.push(symmetric_components(&strain));
            }
            if let Some(gradients) = &mut output.deformation_gradients {
                let mut columns = [0.0; 9];
                columns.copy_from_slice(gradient.as_slice());
                gradients.push(columns);
            }
        }

        if output.invalid_particle_count > 0 {
            warn!(
                count = output.invalid_particle_count,
                "Some particles are not part of a crystal of the reference structure; their strain is zero."
            );
        }
        info!("Elastic strain calculation finished.");
        Ok(Outcome::Completed(output))
    }
}

impl ElasticStrainEngine {
    /// Fits the elastic deformation gradient of one particle.
    ///
    /// Returns `Ok(None)` for particles that cannot be processed (no cluster,
    /// wrong crystal structure, or a degenerate neighbor set).
    fn compute_particle(&self, index: usize) -> WorkResult {
        let input = &*self.input;
        let graph = &input.graph;

        let Some(cluster_id) = input.structure.atom_clusters[index] else {
            return Ok(None);
        };
        if cluster_id == graph.null_cluster() {
            return Ok(None);
        }
        let Some(cluster) = graph.cluster(cluster_id) else {
            return Ok(None);
        };

        let target = self.config.input_crystal_structure;
        let lattice_frame = match cluster.parent_transition.and_then(|t| graph.transition(t)) {
            Some(transition) => {
                let parent_matches = graph
                    .cluster(transition.cluster2)
                    .is_some_and(|parent| parent.structure == target);
                if !parent_matches {
                    return Ok(None);
                }
                self.ideal_unit_cell * transition.tm
            }
            None if cluster.structure == target => self.ideal_unit_cell,
            None => return Ok(None),
        };

        let origin = input.positions[index];
        let mut v = Matrix3::<f64>::zeros();
        let mut w = Matrix3::<f64>::zeros();
        for neighbor in &input.structure.neighbors[index] {
            let lattice_vector = lattice_frame * neighbor.lattice_vector;
            let spatial_vector = input
                .cell
                .wrap_vector(&(input.positions[neighbor.index] - origin));
            v += lattice_vector * lattice_vector.transpose();
            w += spatial_vector * lattice_vector.transpose();
        }

        let Some(v_inverse) = v.try_inverse() else {
            debug!(particle = index, "Lattice vectors of particle do not span 3D space.");
            return Ok(None);
        };
        let f = w * v_inverse;

        let strain = if self.config.push_strain_tensors_forward {
            // Euler strain in the spatial frame.
            let f_inverse = f
                .try_inverse()
                .ok_or(EngineError::SingularDeformation {
                    particle_index: index,
                })?;
            (Matrix3::identity() - f_inverse.transpose() * f_inverse) * 0.5
        } else {
            // Green strain in the material frame.
            (f.transpose() * f - Matrix3::identity()) * 0.5
        };

        Ok(Some(ParticleStrain {
            strain,
            deformation_gradient: f,
        }))
    }
}

/// Shape of the ideal unit cell of the reference structure in internal units.
///
/// Hexagonal lattice vectors are expressed in units of the nearest-neighbor
/// distance, so the lattice constant is scaled by `sqrt(2)` and the c axis by
/// the deviation of c/a from the ideal ratio.
fn ideal_unit_cell(config: &ElasticStrainConfig) -> Matrix3<f64> {
    let (a, axial_scaling) = if config.input_crystal_structure.is_cubic() {
        (config.lattice_constant, 1.0)
    } else {
        (
            config.lattice_constant * 2f64.sqrt(),
            config.axial_ratio / ideal_axial_ratio(),
        )
    };
    Matrix3::from_diagonal(&Vector3::new(a, a, a * axial_scaling))
}

fn symmetric_components(m: &Matrix3<f64>) -> [f64; 6] {
    [
        m[(0, 0)],
        m[(1, 1)],
        m[(2, 2)],
        m[(0, 1)],
        m[(0, 2)],
        m[(1, 2)],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::cluster::StructureType;
    use crate::core::models::ids::ClusterId;
    use crate::core::models::structure::LatticeNeighbor;
    use crate::core::neighbors::CutoffNeighborFinder;
    use crate::engine::config::ElasticStrainConfigBuilder;
    use crate::engine::context::CancellationToken;
    use crate::engine::progress::ProgressReporter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TOLERANCE: f64 = 1e-10;

    /// A periodic FCC crystal of `n^3` unit cells with unit lattice constant,
    /// deformed homogeneously by `deformation`.
    fn deformed_fcc(n: usize, deformation: Matrix3<f64>) -> (ElasticStrainInput, ClusterId) {
        let basis = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.5, 0.5, 0.0),
            Vector3::new(0.5, 0.0, 0.5),
            Vector3::new(0.0, 0.5, 0.5),
        ];
        let mut reference = Vec::new();
        for x in 0..n {
            for y in 0..n {
                for z in 0..n {
                    for b in &basis {
                        reference.push(Point3::from(Vector3::new(x as f64, y as f64, z as f64) + b));
                    }
                }
            }
        }
        let reference_cell = SimulationCell::cubic(n as f64).unwrap();

        let finder = CutoffNeighborFinder::prepare(0.75, &reference, &reference_cell).unwrap();
        let neighbors: Vec<Vec<LatticeNeighbor>> = (0..reference.len())
            .map(|i| {
                finder
                    .query(i)
                    .map(|nb| LatticeNeighbor::new(nb.index, nb.delta))
                    .collect()
            })
            .collect();
        assert!(neighbors.iter().all(|list| list.len() == 12));

        let mut graph = ClusterGraph::new();
        let crystal = graph.create_cluster(StructureType::Fcc, 1).unwrap();

        let cell = SimulationCell::new(
            deformation * reference_cell.matrix(),
            Point3::origin(),
            [true; 3],
        )
        .unwrap();
        let positions = reference.iter().map(|p| deformation * p).collect();
        let input = ElasticStrainInput {
            cell,
            positions,
            structure: StructureAnalysis::new(vec![Some(crystal); reference.len()], neighbors),
            graph,
        };
        (input, crystal)
    }

    fn fcc_config() -> ElasticStrainConfigBuilder {
        ElasticStrainConfigBuilder::new()
            .input_crystal_structure(StructureType::Fcc)
            .lattice_constant(1.0)
    }

    fn run(
        input: ElasticStrainInput,
        config: ElasticStrainConfig,
    ) -> Result<Outcome<ElasticStrainResults>, EngineError> {
        let reporter = ProgressReporter::new();
        let token = CancellationToken::new();
        let context = ComputeContext::new(&reporter, &token);
        ElasticStrainEngine::prepare(Arc::new(input), config)?.perform(&context)
    }

    fn assert_matrix_close(actual: &[f64; 9], expected: &Matrix3<f64>) {
        for (a, e) in actual.iter().zip(expected.as_slice()) {
            assert!((a - e).abs() < TOLERANCE, "{actual:?} != {expected}");
        }
    }

    #[test]
    fn perfect_crystal_has_zero_strain() {
        let (input, _) = deformed_fcc(2, Matrix3::identity());
        let config = fcc_config().calculate_deformation_gradients(true).build().unwrap();
        let results = run(input, config).unwrap().completed().unwrap();

        assert_eq!(results.invalid_particle_count, 0);
        assert!(results.volumetric_strains.iter().all(|s| s.abs() < TOLERANCE));
        for tensor in results.strain_tensors.unwrap() {
            assert!(tensor.iter().all(|c| c.abs() < TOLERANCE));
        }
        for gradient in results.deformation_gradients.unwrap() {
            assert_matrix_close(&gradient, &Matrix3::identity());
        }
    }

    #[test]
    fn homogeneous_deformation_is_recovered() {
        let deformation = Matrix3::new(1.02, 0.01, 0.0, 0.0, 0.99, 0.0, 0.0, 0.005, 1.01);
        let (input, _) = deformed_fcc(2, deformation);
        let config = fcc_config()
            .push_strain_tensors_forward(false)
            .calculate_deformation_gradients(true)
            .build()
            .unwrap();
        let results = run(input, config).unwrap().completed().unwrap();

        let green = (deformation.transpose() * deformation - Matrix3::identity()) * 0.5;
        let expected = symmetric_components(&green);
        for (gradient, tensor) in results
            .deformation_gradients
            .unwrap()
            .iter()
            .zip(results.strain_tensors.unwrap())
        {
            assert_matrix_close(gradient, &deformation);
            for (a, e) in tensor.iter().zip(expected) {
                assert!((a - e).abs() < TOLERANCE);
            }
        }
        assert!((results.volumetric_strains[0] - green.trace() / 3.0).abs() < TOLERANCE);
    }

    #[test]
    fn euler_strain_uses_inverse_deformation() {
        let deformation = Matrix3::from_diagonal(&Vector3::new(1.1, 1.0, 1.0));
        let (input, _) = deformed_fcc(2, deformation);
        let results = run(input, fcc_config().build().unwrap())
            .unwrap()
            .completed()
            .unwrap();
        let expected_xx = 0.5 * (1.0 - 1.0 / (1.1 * 1.1));
        let tensor = results.strain_tensors.unwrap()[0];
        assert!((tensor[0] - expected_xx).abs() < TOLERANCE);
        assert!(tensor[1].abs() < TOLERANCE);
        assert!(results.deformation_gradients.is_none());
    }

    #[test]
    fn lattice_constant_scales_reference() {
        let (input, _) = deformed_fcc(2, Matrix3::identity());
        let config = fcc_config().lattice_constant(0.5).build().unwrap();
        let results = run(input, config).unwrap().completed().unwrap();
        // Spatial bonds are twice as long as the ideal ones: F = 2 I.
        let expected = 0.5 * (1.0 - 0.25);
        assert!(results
            .volumetric_strains
            .iter()
            .all(|s| (s - expected).abs() < TOLERANCE));
    }

    #[test]
    fn unassigned_and_foreign_particles_are_invalid() {
        let (mut input, _) = deformed_fcc(2, Matrix3::identity());
        let bcc = input.graph.create_cluster(StructureType::Bcc, 2).unwrap();
        input.structure.atom_clusters[0] = None;
        input.structure.atom_clusters[1] = Some(input.graph.null_cluster());
        input.structure.atom_clusters[2] = Some(bcc);
        input.structure.neighbors[3].clear();

        let config = fcc_config().calculate_deformation_gradients(true).build().unwrap();
        let results = run(input, config).unwrap().completed().unwrap();
        assert_eq!(results.invalid_particle_count, 4);
        for i in 0..4 {
            assert_eq!(results.volumetric_strains[i], 0.0);
            assert_eq!(results.deformation_gradients.as_ref().unwrap()[i], [0.0; 9]);
        }
    }

    #[test]
    fn defect_cluster_uses_parent_transition() {
        let (mut input, crystal) = deformed_fcc(2, Matrix3::identity());
        let rotation = Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        let fault = input.graph.create_cluster(StructureType::Hcp, 2).unwrap();
        let transition = input
            .graph
            .create_transition(fault, crystal, rotation, 1)
            .unwrap();
        input.graph.set_parent_transition(fault, transition).unwrap();

        // Express the bonds of particle 0 in the rotated frame of the fault cluster.
        input.structure.atom_clusters[0] = Some(fault);
        let inverse = rotation.transpose();
        for neighbor in &mut input.structure.neighbors[0] {
            neighbor.lattice_vector = inverse * neighbor.lattice_vector;
        }

        let config = fcc_config().calculate_deformation_gradients(true).build().unwrap();
        let results = run(input, config).unwrap().completed().unwrap();
        assert_eq!(results.invalid_particle_count, 0);
        assert_matrix_close(&results.deformation_gradients.unwrap()[0], &Matrix3::identity());
    }

    #[test]
    fn hexagonal_reference_scales_lattice_constant() {
        let config = ElasticStrainConfigBuilder::new()
            .input_crystal_structure(StructureType::Hcp)
            .lattice_constant(2.0)
            .axial_ratio(ideal_axial_ratio() * 1.1)
            .build()
            .unwrap();
        let cell = ideal_unit_cell(&config);
        let a = 2.0 * 2f64.sqrt();
        assert!((cell[(0, 0)] - a).abs() < TOLERANCE);
        assert!((cell[(1, 1)] - a).abs() < TOLERANCE);
        assert!((cell[(2, 2)] - a * 1.1).abs() < TOLERANCE);
    }

    /// Runs the engine with a progress callback that counts finished particles
    /// and, if `cancel_on_first` is set, requests cancellation after the first one.
    fn run_counting(
        input: ElasticStrainInput,
        cancel_on_first: bool,
    ) -> (Result<Outcome<ElasticStrainResults>, EngineError>, usize) {
        let token = CancellationToken::new();
        let increments = Arc::new(AtomicUsize::new(0));
        let reporter = {
            let token = token.clone();
            let increments = Arc::clone(&increments);
            ProgressReporter::with_callback(Box::new(move |event: Progress| {
                if matches!(event, Progress::TaskIncrement) {
                    increments.fetch_add(1, Ordering::SeqCst);
                    if cancel_on_first {
                        token.cancel();
                    }
                }
            }))
        };
        let context = ComputeContext::new(&reporter, &token);
        let result = ElasticStrainEngine::prepare(Arc::new(input), fcc_config().build().unwrap())
            .and_then(|engine| engine.perform(&context));
        (result, increments.load(Ordering::SeqCst))
    }

    /// Moves every neighbor of `particle` onto the x axis through it, so its
    /// fitted deformation gradient has rank one.
    fn collapse_bonds(input: &mut ElasticStrainInput, particle: usize) {
        let collapsed: Vec<Point3<f64>> = input.structure.neighbors[particle]
            .iter()
            .map(|nb| {
                let mut p = input.positions[particle];
                p.x += nb.lattice_vector.x;
                p
            })
            .collect();
        let first = input.positions.len();
        for (k, p) in collapsed.into_iter().enumerate() {
            input.positions.push(p);
            input.structure.atom_clusters.push(None);
            input.structure.neighbors.push(Vec::new());
            input.structure.neighbors[particle][k].index = first + k;
        }
    }

    #[test]
    fn singular_deformation_aborts_with_particle_index() {
        let (mut input, _) = deformed_fcc(2, Matrix3::identity());
        collapse_bonds(&mut input, 5);

        let result = run(input, fcc_config().build().unwrap());
        assert!(matches!(
            result,
            Err(EngineError::SingularDeformation { particle_index: 5 })
        ));
    }

    #[test]
    fn prepare_rejects_inconsistent_structure_analysis() {
        let (mut input, _) = deformed_fcc(1, Matrix3::identity());
        input.structure.neighbors.pop();
        let result = ElasticStrainEngine::prepare(Arc::new(input), fcc_config().build().unwrap());
        assert!(matches!(result, Err(EngineError::Structure(_))));
    }

    #[test]
    fn canceled_run_returns_canceled() {
        let (input, _) = deformed_fcc(1, Matrix3::identity());
        let reporter = ProgressReporter::new();
        let token = CancellationToken::new();
        token.cancel();
        let context = ComputeContext::new(&reporter, &token);
        let engine =
            ElasticStrainEngine::prepare(Arc::new(input), fcc_config().build().unwrap()).unwrap();
        assert_eq!(engine.perform(&context).unwrap(), Outcome::Canceled);
    }

    #[test]
    fn singular_deformation_stops_remaining_particles() {
        let (mut input, _) = deformed_fcc(6, Matrix3::identity());
        let particle_count = input.positions.len();
        collapse_bonds(&mut input, 0);

        let (result, processed) = run_counting(input, false);
        assert!(matches!(
            result,
            Err(EngineError::SingularDeformation { particle_index: 0 })
        ));
        assert!(
            processed < particle_count / 2,
            "{processed} of {particle_count} particles fitted after the failure"
        );
    }

    #[test]
    fn cancel_during_fit_stops_remaining_particles() {
        let (input, _) = deformed_fcc(6, Matrix3::identity());
        let particle_count = input.positions.len();

        let (result, processed) = run_counting(input, true);
        assert_eq!(result.unwrap(), Outcome::Canceled);
        assert!(processed >= 1);
        assert!(
            processed < particle_count / 2,
            "{processed} of {particle_count} particles fitted after cancel"
        );
    }
}
