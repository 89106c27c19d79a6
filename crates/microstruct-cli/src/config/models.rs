use microstruct::core::models::cell::SimulationCell;
use microstruct::engine::config as core_config;
use std::path::PathBuf;

pub struct CorrelateAppConfig {
    pub input_path: PathBuf,
    pub output_prefix: PathBuf,
    pub core_config: core_config::CorrelationConfig,
}

pub struct MeshAppConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// The cell from the job file; `None` when it is taken from `--cell-from`.
    pub cell: Option<SimulationCell>,
    pub cell_source: Option<PathBuf>,
    pub core_config: core_config::MeshConfig,
}
