use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::common::{SimError, SimResult};
use crate::domains::streets::PartitionLayout;

pub const ENV_PREFIX: &str = "STREETSIM";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub simulation: SimulationConfig,
    pub network: NetworkConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Concurrent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    #[default]
    Local,
    Tcp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub vehicles: usize,
    pub min_speed: f64,
    pub max_speed: f64,
    pub graph_path: String,
    pub mode: ExecutionMode,
    pub distributed: bool,
    pub seed: Option<u64>,
    pub partition_layout: PartitionLayout,
    pub cache_edge_lengths: bool,
    pub max_route_attempts: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub transport: TransportKind,
    pub world_size: usize,
    pub rank: usize,
    pub root_address: String,
    pub connect_attempts: u32,
    pub connect_backoff_ms: u64,
    pub max_frame_bytes: usize,
    /// How long the root waits for a connecting leaf to send its rank.
    pub handshake_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub debug: bool,
    pub log_file: Option<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            vehicles: 100,
            min_speed: 5.5,
            max_speed: 8.5,
            graph_path: "assets/sample_grid.json".to_string(),
            mode: ExecutionMode::Sequential,
            distributed: false,
            seed: None,
            partition_layout: PartitionLayout::Strips,
            cache_edge_lengths: false,
            max_route_attempts: 32,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Local,
            world_size: 2,
            rank: 0,
            root_address: "127.0.0.1:7400".to_string(),
            connect_attempts: 50,
            connect_backoff_ms: 100,
            max_frame_bytes: 16 * 1024 * 1024,
            handshake_timeout_ms: 5000,
        }
    }
}

impl Config {
    pub async fn from_file<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await.map_err(|e| {
            SimError::Configuration(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> SimResult<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| SimError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Layered load: defaults, then the optional TOML file, then
    /// `STREETSIM__<SECTION>__<KEY>` environment variables.
    pub fn load(path: Option<&Path>) -> SimResult<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Toml)
                    .required(true),
            );
        }
        let config: Config = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| SimError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SimResult<()> {
        let sim = &self.simulation;
        if !(sim.min_speed.is_finite() && sim.max_speed.is_finite()) {
            return Err(SimError::Configuration("speeds must be finite".to_string()));
        }
        if sim.min_speed <= 0.0 || sim.min_speed > sim.max_speed {
            return Err(SimError::Configuration(format!(
                "speed bounds must satisfy 0 < min <= max, got {}..{}",
                sim.min_speed, sim.max_speed
            )));
        }
        if sim.max_route_attempts == 0 {
            return Err(SimError::Configuration(
                "max_route_attempts must be at least 1".to_string(),
            ));
        }
        if sim.distributed && self.network.world_size < 2 {
            return Err(SimError::InsufficientWorkers {
                world_size: self.network.world_size,
            });
        }
        if self.network.world_size > 0 && self.network.rank >= self.network.world_size {
            return Err(SimError::Configuration(format!(
                "rank {} is outside world of size {}",
                self.network.rank, self.network.world_size
            )));
        }
        Ok(())
    }
}
