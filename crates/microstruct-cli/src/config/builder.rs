use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FileCorrelationConfig, FileMeshConfig, FileSmoothingConfig};
use super::models::{CorrelateAppConfig, MeshAppConfig};
use crate::cli::{CorrelateArgs, MeshArgs};
use crate::error::{CliError, Result};
use microstruct::core::models::property::PropertyReference;
use microstruct::engine::config as core_config;
use std::path::Path;
use std::str::FromStr;

pub fn build_correlate_config(args: &CorrelateArgs) -> Result<CorrelateAppConfig> {
    let defaults = DefaultsConfig::default();
    let mut file_config = apply_set_values(load_file_config(args.config.as_deref())?, &args.set_values)?;
    let file = file_config.correlation.take().unwrap_or_default();

    let property1 = args
        .property1
        .as_deref()
        .or(file.property1.as_deref())
        .ok_or_else(|| {
            CliError::Config(
                "A first property is required, via --property1 or `correlation.property1`."
                    .to_string(),
            )
        })
        .and_then(parse_property)?;
    let property2 = match args.property2.as_deref().or(file.property2.as_deref()) {
        Some(name) => parse_property(name)?,
        None => property1.clone(),
    };

    let compute_short_ranged = !args.no_short_ranged
        && file
            .compute_short_ranged
            .unwrap_or(defaults.compute_short_ranged);

    let core_config = core_config::CorrelationConfigBuilder::new()
        .property1(property1)
        .property2(property2)
        .fft_grid_spacing(
            args.fft_grid_spacing
                .or(file.fft_grid_spacing)
                .unwrap_or(defaults.fft_grid_spacing),
        )
        .compute_short_ranged(compute_short_ranged)
        .short_ranged_cutoff(
            args.short_ranged_cutoff
                .or(file.short_ranged_cutoff)
                .unwrap_or(defaults.short_ranged_cutoff),
        )
        .number_of_bins(
            args.number_of_bins
                .or(file.number_of_bins)
                .unwrap_or(defaults.number_of_bins),
        )
        .short_ranged_pairing(
            file.short_ranged_pairing
                .unwrap_or(defaults.short_ranged_pairing),
        )
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(CorrelateAppConfig {
        input_path: args.input.clone(),
        output_prefix: args.output.clone(),
        core_config,
    })
}

pub fn build_mesh_config(args: &MeshArgs) -> Result<MeshAppConfig> {
    let defaults = DefaultsConfig::default();
    let mut file_config = apply_set_values(load_file_config(args.config.as_deref())?, &args.set_values)?;
    let file = file_config.mesh.take().unwrap_or_default();
    let smoothing = file.smoothing.clone().unwrap_or_default();

    let fairing = core_config::FairingConfig {
        iterations: args
            .iterations
            .or(smoothing.iterations)
            .unwrap_or(defaults.smoothing_iterations),
        k_pb: smoothing.pass_band.unwrap_or(defaults.pass_band),
        lambda: smoothing.lambda.unwrap_or(defaults.lambda),
    };
    fairing
        .validate()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let cell = match (&args.cell_from, &file.cell) {
        (Some(_), _) => None,
        (None, Some(cell)) => Some(cell.to_cell()?),
        (None, None) => {
            return Err(CliError::Config(
                "The mesh command needs a simulation cell, via --cell-from or a `mesh.cell` section."
                    .to_string(),
            ));
        }
    };

    Ok(MeshAppConfig {
        input_path: args.input.clone(),
        output_path: args.output.clone(),
        cell,
        cell_source: args.cell_from.clone(),
        core_config: core_config::MeshConfig {
            fairing,
            cutting_planes: file.cutting_planes.iter().map(|&p| p.into()).collect(),
        },
    })
}

fn load_file_config(path: Option<&Path>) -> Result<FileConfig> {
    match path {
        Some(path) => FileConfig::from_file(path),
        None => Ok(FileConfig::default()),
    }
}

fn parse_property(name: &str) -> Result<PropertyReference> {
    PropertyReference::from_str(name).map_err(|e| CliError::Argument(e.to_string()))
}

fn parse_value<T: FromStr>(key: &str, value_str: &str, kind: &str) -> Result<T> {
    value_str.parse().map_err(|_| {
        CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value_str))
    })
}

fn smoothing(mesh: &mut Option<FileMeshConfig>) -> &mut FileSmoothingConfig {
    mesh.get_or_insert_with(Default::default)
        .smoothing
        .get_or_insert_with(Default::default)
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };

        let correlation = FileCorrelationConfig::default;

        match key {
            "correlation.property1" => {
                config.correlation.get_or_insert_with(correlation).property1 =
                    Some(value_str.to_string());
            }
            "correlation.property2" => {
                config.correlation.get_or_insert_with(correlation).property2 =
                    Some(value_str.to_string());
            }
            "correlation.fft-grid-spacing" => {
                config
                    .correlation
                    .get_or_insert_with(correlation)
                    .fft_grid_spacing = Some(parse_value(key, value_str, "float")?);
            }
            "correlation.compute-short-ranged" => {
                config
                    .correlation
                    .get_or_insert_with(correlation)
                    .compute_short_ranged = Some(parse_value(key, value_str, "boolean")?);
            }
            "correlation.short-ranged-cutoff" => {
                config
                    .correlation
                    .get_or_insert_with(correlation)
                    .short_ranged_cutoff = Some(parse_value(key, value_str, "float")?);
            }
            "correlation.number-of-bins" => {
                config
                    .correlation
                    .get_or_insert_with(correlation)
                    .number_of_bins = Some(parse_value(key, value_str, "integer")?);
            }
            "correlation.short-ranged-pairing" => {
                let pairing = match value_str {
                    "central-particle" => core_config::ShortRangedPairing::CentralParticle,
                    "neighbor-pair" => core_config::ShortRangedPairing::NeighborPair,
                    _ => {
                        return Err(CliError::Config(format!(
                            "Invalid value for {}: '{}'. Expected 'central-particle' or 'neighbor-pair'.",
                            key, value_str
                        )));
                    }
                };
                config
                    .correlation
                    .get_or_insert_with(correlation)
                    .short_ranged_pairing = Some(pairing);
            }
            "mesh.smoothing.iterations" => {
                smoothing(&mut config.mesh).iterations =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "mesh.smoothing.pass-band" => {
                smoothing(&mut config.mesh).pass_band = Some(parse_value(key, value_str, "float")?);
            }
            "mesh.smoothing.lambda" => {
                smoothing(&mut config.mesh).lambda = Some(parse_value(key, value_str, "float")?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn base_correlate_args() -> CorrelateArgs {
        CorrelateArgs {
            input: PathBuf::from("in.xyz"),
            output: PathBuf::from("out"),
            config: None,
            property1: None,
            property2: None,
            fft_grid_spacing: None,
            short_ranged_cutoff: None,
            number_of_bins: None,
            no_short_ranged: false,
            set_values: vec![],
        }
    }

    fn base_mesh_args() -> MeshArgs {
        MeshArgs {
            input: PathBuf::from("in.vtk"),
            output: PathBuf::from("out.vtk"),
            config: None,
            cell_from: Some(PathBuf::from("cell.xyz")),
            iterations: None,
            set_values: vec![],
        }
    }

    #[test]
    fn correlate_uses_defaults_and_auto_correlation() {
        let mut args = base_correlate_args();
        args.property1 = Some("Velocity.Z".to_string());

        let app = build_correlate_config(&args).expect("build ok");
        let cfg = app.core_config;
        let defaults = DefaultsConfig::default();

        assert_eq!(cfg.property1, PropertyReference::with_component("Velocity", 2));
        assert_eq!(cfg.property2, cfg.property1);
        assert_eq!(cfg.fft_grid_spacing, defaults.fft_grid_spacing);
        assert_eq!(cfg.short_ranged_cutoff, defaults.short_ranged_cutoff);
        assert_eq!(cfg.number_of_bins, defaults.number_of_bins);
        assert!(cfg.compute_short_ranged);
        assert_eq!(app.output_prefix, PathBuf::from("out"));
    }

    #[test]
    fn correlate_reads_file_and_cli_overrides_it() {
        let dir = tempdir().unwrap();
        let cfg_path = dir.path().join("job.toml");
        fs::write(
            &cfg_path,
            r#"
            [correlation]
            property1 = "Charge"
            property2 = "Potential"
            fft-grid-spacing = 2.0
            number-of-bins = 30
            short-ranged-pairing = "neighbor-pair"
            "#,
        )
        .unwrap();

        let mut args = base_correlate_args();
        args.config = Some(cfg_path);
        args.number_of_bins = Some(64);
        args.no_short_ranged = true;

        let cfg = build_correlate_config(&args).expect("build ok").core_config;
        assert_eq!(cfg.property1, PropertyReference::new("Charge"));
        assert_eq!(cfg.property2, PropertyReference::new("Potential"));
        assert_eq!(cfg.fft_grid_spacing, 2.0);
        assert_eq!(cfg.number_of_bins, 64);
        assert!(!cfg.compute_short_ranged);
        assert_eq!(
            cfg.short_ranged_pairing,
            core_config::ShortRangedPairing::NeighborPair
        );
    }

    #[test]
    fn set_values_override_file_values() {
        let cli = Cli::parse_from([
            "microstruct",
            "correlate",
            "-i",
            "in.xyz",
            "-o",
            "out",
            "-S",
            "correlation.property1=Stress.2",
            "-S",
            "correlation.short-ranged-cutoff=7.5",
        ]);
        let Commands::Correlate(args) = cli.command else {
            panic!("Expected 'correlate' subcommand");
        };

        let cfg = build_correlate_config(&args).expect("build ok").core_config;
        assert_eq!(cfg.property1, PropertyReference::with_component("Stress", 2));
        assert!((cfg.short_ranged_cutoff - 7.5).abs() < 1e-12);
    }

    #[test]
    fn missing_property_is_a_config_error() {
        let result = build_correlate_config(&base_correlate_args());
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("property1")));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let mut args = base_correlate_args();
        args.property1 = Some("Charge".to_string());
        args.number_of_bins = Some(1);
        assert!(matches!(build_correlate_config(&args), Err(CliError::Config(_))));

        args.number_of_bins = None;
        args.set_values = vec!["correlation.fft-grid-spacing=wide".to_string()];
        assert!(matches!(build_correlate_config(&args), Err(CliError::Config(_))));

        args.set_values = vec!["correlation.bins=3".to_string()];
        let result = build_correlate_config(&args);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("Unsupported")));
    }

    #[test]
    fn mesh_config_merges_smoothing_planes_and_cell() {
        let dir = tempdir().unwrap();
        let cfg_path = dir.path().join("mesh.toml");
        fs::write(
            &cfg_path,
            r#"
            [mesh.smoothing]
            iterations = 4
            lambda = 0.6

            [[mesh.cutting-planes]]
            normal = [0.0, 0.0, 1.0]
            distance = 3.0

            [mesh.cell]
            vectors = [[8.0, 0.0, 0.0], [0.0, 8.0, 0.0], [0.0, 0.0, 8.0]]
            "#,
        )
        .unwrap();

        let mut args = base_mesh_args();
        args.config = Some(cfg_path);
        args.cell_from = None;
        args.set_values = vec!["mesh.smoothing.pass-band=0.05".to_string()];

        let app = build_mesh_config(&args).expect("build ok");
        let fairing = app.core_config.fairing;
        assert_eq!(fairing.iterations, 4);
        assert_eq!(fairing.lambda, 0.6);
        assert_eq!(fairing.k_pb, 0.05);
        assert_eq!(app.core_config.cutting_planes.len(), 1);
        assert_eq!(app.core_config.cutting_planes[0].dist, 3.0);
        assert!(app.cell.is_some());
        assert!(app.cell_source.is_none());
    }

    #[test]
    fn mesh_cli_iterations_override_and_cell_from_wins() {
        let mut args = base_mesh_args();
        args.iterations = Some(12);

        let app = build_mesh_config(&args).expect("build ok");
        assert_eq!(app.core_config.fairing.iterations, 12);
        assert_eq!(
            app.core_config.fairing.k_pb,
            DefaultsConfig::default().pass_band
        );
        assert!(app.cell.is_none());
        assert_eq!(app.cell_source, Some(PathBuf::from("cell.xyz")));
    }

    #[test]
    fn mesh_without_cell_is_rejected() {
        let mut args = base_mesh_args();
        args.cell_from = None;
        let result = build_mesh_config(&args);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("cell")));
    }

    #[test]
    fn mesh_rejects_invalid_lambda() {
        let mut args = base_mesh_args();
        args.set_values = vec!["mesh.smoothing.lambda=-1".to_string()];
        assert!(matches!(build_mesh_config(&args), Err(CliError::Config(_))));
    }
}
