use microstruct::core::io::traits::DataFile;
use microstruct::core::io::vtk::{PolygonMesh, VtkFile};
use microstruct::core::models::cell::SimulationCell;
use microstruct::core::models::particles::ParticleData;
use microstruct::core::models::property::{ParticleProperty, PropertyReference};
use microstruct::engine::config::{CorrelationConfig, CorrelationConfigBuilder, MeshConfig};
use microstruct::engine::context::{CancellationToken, ComputeContext};
use microstruct::engine::progress::ProgressReporter;
use microstruct::engine::tasks::correlation::{CorrelationEngine, Curve};
use microstruct::engine::tasks::display_mesh::PartitionMesh;
use microstruct::workflows::pipeline::{PipelineStage, StageStatus};
use microstruct::workflows::{correlate, mesh};
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tempfile::tempdir;

fn random_particles(count: usize, box_length: f64, seed: u64) -> ParticleData {
    let mut rng = StdRng::seed_from_u64(seed);
    let cell = SimulationCell::orthogonal(Vector3::repeat(box_length), [true; 3]).unwrap();
    let positions = (0..count)
        .map(|_| {
            Point3::new(
                rng.gen_range(0.0..box_length),
                rng.gen_range(0.0..box_length),
                rng.gen_range(0.0..box_length),
            )
        })
        .collect();
    let mut data = ParticleData::new(cell, positions);
    let values = (0..count).map(|_| rng.gen_range(0.0..1.0)).collect();
    data.insert_property(ParticleProperty::scalar_float("Value", values));
    data
}

fn correlation_config(property: &str) -> CorrelationConfig {
    CorrelationConfigBuilder::new()
        .property1(PropertyReference::new(property))
        .property2(PropertyReference::new(property))
        .fft_grid_spacing(1.0)
        .short_ranged_cutoff(2.0)
        .number_of_bins(20)
        .build()
        .unwrap()
}

fn assert_well_formed(curve: &Curve) {
    assert!(!curve.is_empty());
    assert_eq!(curve.x.len(), curve.y.len());
    assert!(curve.x.windows(2).all(|w| w[0] < w[1]));
    assert!(curve.y.iter().all(|y| y.is_finite()));
}

#[test]
fn correlation_of_random_particles_produces_three_curves() {
    let data = Arc::new(random_particles(1000, 10.0, 7));
    let reporter = ProgressReporter::new();
    let cancel = CancellationToken::new();

    let results = correlate::run(data, correlation_config("Value"), &reporter, &cancel)
        .unwrap()
        .completed()
        .unwrap();

    assert_well_formed(&results.real_space);
    assert_well_formed(&results.short_ranged);
    assert_well_formed(&results.reciprocal_space);
    assert!(results.short_ranged.len() <= 20);
    assert!((results.mean1 - 0.5).abs() < 0.05);
    assert_eq!(results.mean1, results.mean2);
    assert!((results.covariance - 1.0 / 3.0).abs() < 0.05);
}

#[test]
fn pipeline_stage_keeps_last_good_correlation() {
    let data = Arc::new(random_particles(200, 8.0, 11));
    let reporter = ProgressReporter::new();
    let cancel = CancellationToken::new();
    let context = ComputeContext::new(&reporter, &cancel);
    let mut stage = PipelineStage::<CorrelationEngine>::new();

    assert!(
        stage
            .evaluate(data.clone(), correlation_config("Value"), &context)
            .is_success()
    );
    let first = stage.results().cloned().unwrap();

    let status = stage
        .evaluate(data, correlation_config("Missing"), &context)
        .clone();
    assert!(matches!(status, StageStatus::Error(ref m) if m.contains("Missing")));
    assert_eq!(stage.results(), Some(&first));
}

#[test]
fn partition_mesh_survives_vtk_round_trip_and_splitting() {
    let cell = SimulationCell::orthogonal(Vector3::repeat(2.0), [true; 3]).unwrap();
    let (lo, hi) = (Vector3::new(1.6, 0.5, 0.5), Vector3::new(2.4, 1.0, 1.0));
    let vertices = (0..8)
        .map(|i| {
            Point3::new(
                if i & 1 == 0 { lo.x } else { hi.x },
                if i & 2 == 0 { lo.y } else { hi.y },
                if i & 4 == 0 { lo.z } else { hi.z },
            )
        })
        .collect();
    let polygons = vec![
        vec![0, 4, 6, 2],
        vec![1, 3, 7, 5],
        vec![0, 1, 5, 4],
        vec![2, 6, 7, 3],
        vec![0, 2, 3, 1],
        vec![4, 5, 7, 6],
    ];
    let input = PolygonMesh {
        vertices,
        materials: vec![4; polygons.len()],
        polygons,
    };

    let dir = tempdir().unwrap();
    let input_path = dir.path().join("partition.vtk");
    VtkFile::write_to_path(&input, &input_path).unwrap();
    let loaded = VtkFile::read_from_path(&input_path).unwrap();

    let partition = Arc::new(PartitionMesh::from_polygons(cell, loaded).unwrap());
    let reporter = ProgressReporter::new();
    let cancel = CancellationToken::new();
    let output = mesh::run(partition, MeshConfig::default(), &reporter, &cancel)
        .unwrap()
        .completed()
        .unwrap();

    assert_eq!(output.face_count(), 28);
    assert!(output.faces.iter().all(|f| f.material == 4));
    assert!(
        output
            .edge_face_counts()
            .values()
            .all(|&n| n == 1 || n == 2)
    );

    let output_path = dir.path().join("display.vtk");
    VtkFile::write_to_path(&PolygonMesh::from(&output), &output_path).unwrap();
    let reloaded = VtkFile::read_from_path(&output_path).unwrap();
    assert_eq!(reloaded.polygons.len(), 28);
    assert_eq!(reloaded.materials, vec![4; 28]);
}
