use crate::error::{CliError, Result};
use microstruct::core::mesh::tri_mesh::Plane3;
use microstruct::core::models::cell::SimulationCell;
use microstruct::engine::config::ShortRangedPairing;
use nalgebra::{Matrix3, Point3, Vector3};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Root of a TOML job file. Every section and key is optional.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub correlation: Option<FileCorrelationConfig>,
    pub mesh: Option<FileMeshConfig>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileCorrelationConfig {
    pub property1: Option<String>,
    pub property2: Option<String>,
    pub fft_grid_spacing: Option<f64>,
    pub compute_short_ranged: Option<bool>,
    pub short_ranged_cutoff: Option<f64>,
    pub number_of_bins: Option<usize>,
    pub short_ranged_pairing: Option<ShortRangedPairing>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileMeshConfig {
    pub smoothing: Option<FileSmoothingConfig>,
    #[serde(default)]
    pub cutting_planes: Vec<FilePlane>,
    pub cell: Option<FileCell>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSmoothingConfig {
    pub iterations: Option<usize>,
    pub pass_band: Option<f64>,
    pub lambda: Option<f64>,
}

/// A cutting plane `normal . p = distance`; the side the normal points to is removed.
#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FilePlane {
    pub normal: [f64; 3],
    pub distance: f64,
}

impl From<FilePlane> for Plane3 {
    fn from(p: FilePlane) -> Self {
        Plane3::new(Vector3::from(p.normal), p.distance)
    }
}

/// Simulation cell given as its three edge vectors.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileCell {
    pub vectors: [[f64; 3]; 3],
    #[serde(default)]
    pub origin: [f64; 3],
    #[serde(default = "fully_periodic")]
    pub pbc: [bool; 3],
}

fn fully_periodic() -> [bool; 3] {
    [true; 3]
}

impl FileCell {
    pub fn to_cell(&self) -> Result<SimulationCell> {
        let [a, b, c] = self.vectors.map(Vector3::from);
        let matrix = Matrix3::from_columns(&[a, b, c]);
        SimulationCell::new(matrix, Point3::from(self.origin), self.pbc)
            .map_err(|e| CliError::Config(format!("Invalid `mesh.cell`: {e}")))
    }
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_job_file() {
        let config: FileConfig = toml::from_str(
            r#"
            [correlation]
            property1 = "Velocity.X"
            property2 = "Velocity.Y"
            fft-grid-spacing = 2.0
            number-of-bins = 40
            short-ranged-pairing = "neighbor-pair"

            [mesh.smoothing]
            iterations = 8
            lambda = 0.6

            [[mesh.cutting-planes]]
            normal = [1.0, 0.0, 0.0]
            distance = 5.0

            [mesh.cell]
            vectors = [[10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 20.0]]
            pbc = [true, true, false]
            "#,
        )
        .unwrap();

        let correlation = config.correlation.unwrap();
        assert_eq!(correlation.property1.as_deref(), Some("Velocity.X"));
        assert_eq!(correlation.number_of_bins, Some(40));
        assert_eq!(
            correlation.short_ranged_pairing,
            Some(ShortRangedPairing::NeighborPair)
        );

        let mesh = config.mesh.unwrap();
        assert_eq!(mesh.smoothing.unwrap().iterations, Some(8));
        assert_eq!(mesh.cutting_planes.len(), 1);
        let cell = mesh.cell.unwrap().to_cell().unwrap();
        assert_eq!(cell.pbc_flags(), [true, true, false]);
        assert!((cell.volume() - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: std::result::Result<FileConfig, _> =
            toml::from_str("[correlation]\nbins = 10\n");
        assert!(result.is_err());
    }

    #[test]
    fn degenerate_cell_is_a_config_error() {
        let cell = FileCell {
            vectors: [[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
            origin: [0.0; 3],
            pbc: [true; 3],
        };
        assert!(matches!(cell.to_cell(), Err(CliError::Config(_))));
    }
}
