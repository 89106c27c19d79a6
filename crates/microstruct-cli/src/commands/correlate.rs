use crate::cli::CorrelateArgs;
use crate::config::builder::build_correlate_config;
use crate::error::{CliError, Result};
use crate::utils::progress::ProgressDisplay;
use microstruct::core::io::table;
use microstruct::core::io::traits::DataFile;
use microstruct::core::io::xyz::XyzFile;
use microstruct::engine::context::CancellationToken;
use microstruct::engine::progress::ProgressReporter;
use microstruct::engine::state::Outcome;
use microstruct::engine::tasks::correlation::Curve;
use microstruct::workflows;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub fn run(args: CorrelateArgs, quiet: bool) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let app_config = build_correlate_config(&args)?;

    info!("Loading particles from {:?}", &app_config.input_path);
    let data = XyzFile::read_from_path(&app_config.input_path).map_err(|e| {
        CliError::FileParsing {
            path: app_config.input_path.clone(),
            source: e.into(),
        }
    })?;

    let display = ProgressDisplay::new(quiet);
    let reporter = ProgressReporter::with_callback(display.callback());
    let cancel = CancellationToken::new();

    println!(
        "Correlating '{}' with '{}' over {} particles...",
        app_config.core_config.property1,
        app_config.core_config.property2,
        data.particle_count()
    );
    let results = match workflows::correlate::run(
        Arc::new(data),
        app_config.core_config,
        &reporter,
        &cancel,
    )? {
        Outcome::Completed(results) => results,
        Outcome::Canceled => return Err(CliError::Canceled),
    };

    println!(
        "  <p1> = {:.6}, <p2> = {:.6}, <p1*p2> = {:.6}",
        results.mean1, results.mean2, results.covariance
    );

    let prefix = &app_config.output_prefix;
    write_curve(&output_path(prefix, "real"), "distance", &results.real_space)?;
    if results.short_ranged.is_empty() {
        warn!("Short-ranged correlation is empty; skipping its output file.");
    } else {
        write_curve(&output_path(prefix, "short"), "distance", &results.short_ranged)?;
    }
    write_curve(
        &output_path(prefix, "reciprocal"),
        "wavevector",
        &results.reciprocal_space,
    )?;

    Ok(())
}

/// `PREFIX.<kind>.csv`, keeping any dots already present in the prefix.
fn output_path(prefix: &Path, kind: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(format!(".{kind}.csv"));
    PathBuf::from(name)
}

fn write_curve(path: &Path, x_label: &str, curve: &Curve) -> Result<()> {
    info!(rows = curve.len(), "Writing {:?}", path);
    table::write_columns_to_path(path, &[x_label, "correlation"], &[&curve.x, &curve.y]).map_err(
        |e| CliError::FileWriting {
            path: path.to_path_buf(),
            source: e.into(),
        },
    )?;
    println!("✓ {} bins written to: {}", curve.len(), path.display());
    Ok(())
}
