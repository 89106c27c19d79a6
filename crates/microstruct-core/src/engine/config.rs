use crate::core::mesh::tri_mesh::Plane3;
use crate::core::models::cluster::StructureType;
use crate::core::models::property::PropertyReference;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

pub const DEFAULT_FFT_GRID_SPACING: f64 = 3.0;
pub const DEFAULT_SHORT_RANGED_CUTOFF: f64 = 5.0;
pub const DEFAULT_NUMBER_OF_BINS: usize = 50;
pub const MIN_NUMBER_OF_BINS: usize = 4;
pub const MAX_NUMBER_OF_BINS: usize = 100_000;

/// Which particle's second property value enters a short-ranged pair product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShortRangedPairing {
    /// `p1[i] * p2[i]` for every neighbor `j` of `i`.
    #[default]
    CentralParticle,
    /// `p1[i] * p2[j]`.
    NeighborPair,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationConfig {
    pub property1: PropertyReference,
    pub property2: PropertyReference,
    pub fft_grid_spacing: f64,
    pub compute_short_ranged: bool,
    pub short_ranged_cutoff: f64,
    pub number_of_bins: usize,
    pub short_ranged_pairing: ShortRangedPairing,
}

#[derive(Default)]
pub struct CorrelationConfigBuilder {
    property1: Option<PropertyReference>,
    property2: Option<PropertyReference>,
    fft_grid_spacing: Option<f64>,
    compute_short_ranged: Option<bool>,
    short_ranged_cutoff: Option<f64>,
    number_of_bins: Option<usize>,
    short_ranged_pairing: Option<ShortRangedPairing>,
}

impl CorrelationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property1(mut self, reference: PropertyReference) -> Self {
        self.property1 = Some(reference);
        self
    }
    pub fn property2(mut self, reference: PropertyReference) -> Self {
        self.property2 = Some(reference);
        self
    }
    pub fn fft_grid_spacing(mut self, spacing: f64) -> Self {
        self.fft_grid_spacing = Some(spacing);
        self
    }
    pub fn compute_short_ranged(mut self, enabled: bool) -> Self {
        self.compute_short_ranged = Some(enabled);
        self
    }
    pub fn short_ranged_cutoff(mut self, cutoff: f64) -> Self {
        self.short_ranged_cutoff = Some(cutoff);
        self
    }
    pub fn number_of_bins(mut self, bins: usize) -> Self {
        self.number_of_bins = Some(bins);
        self
    }
    pub fn short_ranged_pairing(mut self, pairing: ShortRangedPairing) -> Self {
        self.short_ranged_pairing = Some(pairing);
        self
    }

    pub fn build(self) -> Result<CorrelationConfig, ConfigError> {
        let config = CorrelationConfig {
            property1: self
                .property1
                .ok_or(ConfigError::MissingParameter("property1"))?,
            property2: self
                .property2
                .ok_or(ConfigError::MissingParameter("property2"))?,
            fft_grid_spacing: self.fft_grid_spacing.unwrap_or(DEFAULT_FFT_GRID_SPACING),
            compute_short_ranged: self.compute_short_ranged.unwrap_or(true),
            short_ranged_cutoff: self
                .short_ranged_cutoff
                .unwrap_or(DEFAULT_SHORT_RANGED_CUTOFF),
            number_of_bins: self.number_of_bins.unwrap_or(DEFAULT_NUMBER_OF_BINS),
            short_ranged_pairing: self.short_ranged_pairing.unwrap_or_default(),
        };

        ensure_positive("fft_grid_spacing", config.fft_grid_spacing)?;
        ensure_positive("short_ranged_cutoff", config.short_ranged_cutoff)?;
        if !(MIN_NUMBER_OF_BINS..=MAX_NUMBER_OF_BINS).contains(&config.number_of_bins) {
            return Err(ConfigError::InvalidParameter {
                name: "number_of_bins",
                reason: format!(
                    "{} is outside the range {MIN_NUMBER_OF_BINS}..={MAX_NUMBER_OF_BINS}",
                    config.number_of_bins
                ),
            });
        }
        Ok(config)
    }
}

pub const DEFAULT_LATTICE_CONSTANT: f64 = 1.0;

/// Ideal c/a ratio of a hexagonal close-packed lattice, `sqrt(8/3)`.
pub fn ideal_axial_ratio() -> f64 {
    (8.0f64 / 3.0).sqrt()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElasticStrainConfig {
    pub input_crystal_structure: StructureType,
    pub lattice_constant: f64,
    pub axial_ratio: f64,
    pub push_strain_tensors_forward: bool,
    pub calculate_strain_tensors: bool,
    pub calculate_deformation_gradients: bool,
}

#[derive(Default)]
pub struct ElasticStrainConfigBuilder {
    input_crystal_structure: Option<StructureType>,
    lattice_constant: Option<f64>,
    axial_ratio: Option<f64>,
    push_strain_tensors_forward: Option<bool>,
    calculate_strain_tensors: Option<bool>,
    calculate_deformation_gradients: Option<bool>,
}

impl ElasticStrainConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input_crystal_structure(mut self, structure: StructureType) -> Self {
        self.input_crystal_structure = Some(structure);
        self
    }
    pub fn lattice_constant(mut self, a: f64) -> Self {
        self.lattice_constant = Some(a);
        self
    }
    pub fn axial_ratio(mut self, c_over_a: f64) -> Self {
        self.axial_ratio = Some(c_over_a);
        self
    }
    pub fn push_strain_tensors_forward(mut self, enabled: bool) -> Self {
        self.push_strain_tensors_forward = Some(enabled);
        self
    }
    pub fn calculate_strain_tensors(mut self, enabled: bool) -> Self {
        self.calculate_strain_tensors = Some(enabled);
        self
    }
    pub fn calculate_deformation_gradients(mut self, enabled: bool) -> Self {
        self.calculate_deformation_gradients = Some(enabled);
        self
    }

    pub fn build(self) -> Result<ElasticStrainConfig, ConfigError> {
        let structure = self
            .input_crystal_structure
            .ok_or(ConfigError::MissingParameter("input_crystal_structure"))?;
        if structure == StructureType::Other {
            return Err(ConfigError::InvalidParameter {
                name: "input_crystal_structure",
                reason: "a crystalline reference structure is required".into(),
            });
        }
        let config = ElasticStrainConfig {
            input_crystal_structure: structure,
            lattice_constant: self.lattice_constant.unwrap_or(DEFAULT_LATTICE_CONSTANT),
            axial_ratio: self.axial_ratio.unwrap_or_else(ideal_axial_ratio),
            push_strain_tensors_forward: self.push_strain_tensors_forward.unwrap_or(true),
            calculate_strain_tensors: self.calculate_strain_tensors.unwrap_or(true),
            calculate_deformation_gradients: self
                .calculate_deformation_gradients
                .unwrap_or(false),
        };
        ensure_positive("lattice_constant", config.lattice_constant)?;
        ensure_positive("axial_ratio", config.axial_ratio)?;
        Ok(config)
    }
}

pub const DEFAULT_PASS_BAND: f64 = 0.1;
pub const DEFAULT_LAMBDA: f64 = 0.5;

/// Parameters of Taubin lambda|mu smoothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FairingConfig {
    pub iterations: usize,
    pub k_pb: f64,
    pub lambda: f64,
}

impl FairingConfig {
    pub fn new(iterations: usize) -> Self {
        Self {
            iterations,
            k_pb: DEFAULT_PASS_BAND,
            lambda: DEFAULT_LAMBDA,
        }
    }

    /// The shrink-compensating factor `1 / (k_pb - 1/lambda)`.
    pub fn mu(&self) -> f64 {
        1.0 / (self.k_pb - 1.0 / self.lambda)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("lambda", self.lambda)?;
        if !self.k_pb.is_finite() {
            return Err(ConfigError::InvalidParameter {
                name: "k_pb",
                reason: format!("{} is not finite", self.k_pb),
            });
        }
        if !self.mu().is_finite() {
            return Err(ConfigError::InvalidParameter {
                name: "k_pb",
                reason: format!("k_pb must differ from 1/lambda = {}", 1.0 / self.lambda),
            });
        }
        Ok(())
    }
}

impl Default for FairingConfig {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Settings for turning a periodic half-edge mesh into a displayable triangle mesh.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshConfig {
    pub fairing: FairingConfig,
    pub cutting_planes: Vec<Plane3>,
}

fn ensure_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!("{value} must be a positive finite number"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(name: &str) -> PropertyReference {
        PropertyReference::new(name)
    }

    #[test]
    fn correlation_builder_applies_defaults() {
        let config = CorrelationConfigBuilder::new()
            .property1(reference("a"))
            .property2(reference("b"))
            .build()
            .unwrap();
        assert_eq!(config.fft_grid_spacing, DEFAULT_FFT_GRID_SPACING);
        assert_eq!(config.short_ranged_cutoff, DEFAULT_SHORT_RANGED_CUTOFF);
        assert_eq!(config.number_of_bins, DEFAULT_NUMBER_OF_BINS);
        assert!(config.compute_short_ranged);
        assert_eq!(config.short_ranged_pairing, ShortRangedPairing::CentralParticle);
    }

    #[test]
    fn correlation_builder_requires_both_properties() {
        let result = CorrelationConfigBuilder::new()
            .property1(reference("a"))
            .build();
        assert_eq!(result, Err(ConfigError::MissingParameter("property2")));
    }

    #[test]
    fn correlation_builder_rejects_bad_numbers() {
        let base = || {
            CorrelationConfigBuilder::new()
                .property1(reference("a"))
                .property2(reference("a"))
        };
        assert!(matches!(
            base().fft_grid_spacing(0.0).build(),
            Err(ConfigError::InvalidParameter { name: "fft_grid_spacing", .. })
        ));
        assert!(matches!(
            base().short_ranged_cutoff(f64::NAN).build(),
            Err(ConfigError::InvalidParameter { name: "short_ranged_cutoff", .. })
        ));
        assert!(matches!(
            base().number_of_bins(3).build(),
            Err(ConfigError::InvalidParameter { name: "number_of_bins", .. })
        ));
        assert!(base().number_of_bins(MAX_NUMBER_OF_BINS).build().is_ok());
    }

    #[test]
    fn elastic_strain_builder_defaults_and_validation() {
        let config = ElasticStrainConfigBuilder::new()
            .input_crystal_structure(StructureType::Fcc)
            .build()
            .unwrap();
        assert_eq!(config.lattice_constant, 1.0);
        assert!((config.axial_ratio - 1.632_993_161_855_452).abs() < 1e-12);
        assert!(config.push_strain_tensors_forward);
        assert!(config.calculate_strain_tensors);
        assert!(!config.calculate_deformation_gradients);

        assert_eq!(
            ElasticStrainConfigBuilder::new().build(),
            Err(ConfigError::MissingParameter("input_crystal_structure"))
        );
        assert!(
            ElasticStrainConfigBuilder::new()
                .input_crystal_structure(StructureType::Other)
                .build()
                .is_err()
        );
        assert!(
            ElasticStrainConfigBuilder::new()
                .input_crystal_structure(StructureType::Bcc)
                .lattice_constant(-1.0)
                .build()
                .is_err()
        );
    }

    #[test]
    fn fairing_mu_uses_pass_band() {
        let config = FairingConfig::new(3);
        assert!((config.mu() - 1.0 / (0.1 - 2.0)).abs() < 1e-15);
        assert!(config.validate().is_ok());

        let degenerate = FairingConfig {
            iterations: 1,
            k_pb: 2.0,
            lambda: 0.5,
        };
        assert!(degenerate.validate().is_err());
    }
}
