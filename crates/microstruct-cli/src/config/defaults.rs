use microstruct::engine::config as core_config;

/// Fallback values for every setting that neither the command line nor the
/// job file provides.
pub struct DefaultsConfig {
    pub fft_grid_spacing: f64,
    pub compute_short_ranged: bool,
    pub short_ranged_cutoff: f64,
    pub number_of_bins: usize,
    pub short_ranged_pairing: core_config::ShortRangedPairing,
    pub smoothing_iterations: usize,
    pub pass_band: f64,
    pub lambda: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            fft_grid_spacing: core_config::DEFAULT_FFT_GRID_SPACING,
            compute_short_ranged: true,
            short_ranged_cutoff: core_config::DEFAULT_SHORT_RANGED_CUTOFF,
            number_of_bins: core_config::DEFAULT_NUMBER_OF_BINS,
            short_ranged_pairing: core_config::ShortRangedPairing::default(),
            smoothing_iterations: 0,
            pass_band: core_config::DEFAULT_PASS_BAND,
            lambda: core_config::DEFAULT_LAMBDA,
        }
    }
}
