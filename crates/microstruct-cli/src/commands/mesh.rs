use crate::cli::MeshArgs;
use crate::config::builder::build_mesh_config;
use crate::error::{CliError, Result};
use crate::utils::progress::ProgressDisplay;
use microstruct::core::io::traits::DataFile;
use microstruct::core::io::vtk::{PolygonMesh, VtkFile};
use microstruct::core::io::xyz::XyzFile;
use microstruct::core::models::cell::SimulationCell;
use microstruct::engine::context::CancellationToken;
use microstruct::engine::progress::ProgressReporter;
use microstruct::engine::state::Outcome;
use microstruct::engine::tasks::display_mesh::PartitionMesh;
use microstruct::workflows;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub fn run(args: MeshArgs, quiet: bool) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let app_config = build_mesh_config(&args)?;

    let cell = match (app_config.cell, &app_config.cell_source) {
        (Some(cell), _) => cell,
        (None, Some(source)) => read_cell(source)?,
        (None, None) => {
            return Err(CliError::Argument(
                "no simulation cell was given".to_string(),
            ));
        }
    };

    info!("Loading partition mesh from {:?}", &app_config.input_path);
    let polygons = VtkFile::read_from_path(&app_config.input_path).map_err(|e| {
        CliError::FileParsing {
            path: app_config.input_path.clone(),
            source: e.into(),
        }
    })?;
    let partition = PartitionMesh::from_polygons(cell, polygons)?;

    let display = ProgressDisplay::new(quiet);
    let reporter = ProgressReporter::with_callback(display.callback());
    let cancel = CancellationToken::new();

    println!(
        "Building display mesh from {} faces ({} smoothing iterations)...",
        partition.mesh.face_count(),
        app_config.core_config.fairing.iterations
    );
    let mesh = match workflows::mesh::run(
        Arc::new(partition),
        app_config.core_config,
        &reporter,
        &cancel,
    )? {
        Outcome::Completed(mesh) => mesh,
        Outcome::Canceled => return Err(CliError::Canceled),
    };

    let output_path = &app_config.output_path;
    VtkFile::write_to_path(&PolygonMesh::from(&mesh), output_path).map_err(|e| {
        CliError::FileWriting {
            path: output_path.clone(),
            source: e.into(),
        }
    })?;
    println!(
        "✓ {} triangles written to: {}",
        mesh.face_count(),
        output_path.display()
    );
    Ok(())
}

fn read_cell(path: &Path) -> Result<SimulationCell> {
    info!("Reading simulation cell from {:?}", path);
    XyzFile::read_from_path(path)
        .map(|data| data.cell)
        .map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
}
