//! Everything an instance is built from, loadable from one TOML file.

use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use events::Region;
use serde::{Deserialize, Serialize};
use shatter::config::FractureConfig;
use sim::{EnvConfig, SimConfig};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

/// Longest accepted tick, in seconds.
pub const MAX_TICK_DURATION: f32 = 60.;
/// Finest accepted voxel lattice, in cells per axis.
pub const MAX_RESOLUTION: u32 = 512;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed configuration")]
    Parse(#[from] toml::de::Error),
    #[error("`{field}` {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Submissions that may wait for the next tick before submitters block.
    pub queue_capacity: usize,
    /// Contact events buffered for the consumer. Newer events are dropped
    /// while the buffer is full.
    pub contact_capacity: usize,
    pub regions: Vec<Region>,
}
impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            contact_capacity: 4096,
            regions: vec![],
        }
    }
}

/// Fixed for the life of the instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    pub fracture: FractureConfig,
    pub simulation: SimConfig,
    pub environment: EnvConfig,
    pub dispatcher: DispatcherConfig,
}

impl InstanceConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let cfg: Self = text.parse()?;
        info!("Loaded configuration from {:?}.", path);
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        if !(sim.tick_duration > 0. && sim.tick_duration <= MAX_TICK_DURATION) {
            return Err(ConfigError::Invalid {
                field: "simulation.tick_duration",
                reason: "must be a positive number of seconds, at most 60",
            });
        }
        if sim.substeps == 0 {
            return Err(ConfigError::Invalid {
                field: "simulation.substeps",
                reason: "must be at least 1",
            });
        }
        if !(0. ..=1.).contains(&sim.stress_decay) {
            return Err(ConfigError::Invalid {
                field: "simulation.stress_decay",
                reason: "must lie in [0, 1]",
            });
        }
        if !(1..=MAX_RESOLUTION).contains(&self.fracture.resolution) {
            return Err(ConfigError::Invalid {
                field: "fracture.resolution",
                reason: "must lie in [1, 512]",
            });
        }
        let bounds = &sim.world_bounds;
        if (0..3).any(|i| !(bounds.min[i] < bounds.max[i])) {
            return Err(ConfigError::Invalid {
                field: "simulation.world_bounds",
                reason: "must have min below max on every axis",
            });
        }
        if self.dispatcher.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "dispatcher.queue_capacity",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}

impl FromStr for InstanceConfig {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shatter::config::PatternKind;

    #[test]
    fn partial_files_keep_defaults() {
        let cfg: InstanceConfig = r#"
            [fracture]
            pattern = "uniform-grid"
            cell_count = 10

            [simulation]
            gravity = [0.0, 0.0, 0.0]

            [[environment.planes]]
            normal = [0.0, 1.0, 0.0]
            offset = -1.0

            [[dispatcher.regions]]
            name = "corner"
            center = [0.0, -0.25, -0.5]
            radius = 0.3
        "#
        .parse()
        .unwrap();
        assert_eq!(cfg.fracture.pattern, PatternKind::UniformGrid);
        assert_eq!(cfg.fracture.cell_count, 10);
        assert_eq!(cfg.fracture.resolution, FractureConfig::default().resolution);
        assert_eq!(cfg.simulation.gravity, [0.; 3]);
        assert_eq!(cfg.simulation.substeps, SimConfig::default().substeps);
        assert_eq!(cfg.environment.planes[0].offset, -1.);
        assert_eq!(cfg.dispatcher.regions[0].name, "corner");
        assert_eq!(cfg.dispatcher.queue_capacity, 1024);
    }

    #[test]
    fn bad_values_are_rejected() {
        let err = "[simulation]\ntick_duration = 0.0".parse::<InstanceConfig>().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "simulation.tick_duration",
                ..
            }
        ));
        for tick in ["1e30", "inf", "nan", "61.0"] {
            let err = format!("[simulation]\ntick_duration = {}", tick)
                .parse::<InstanceConfig>()
                .unwrap_err();
            assert!(matches!(
                err,
                ConfigError::Invalid {
                    field: "simulation.tick_duration",
                    ..
                }
            ));
        }
        let slow: InstanceConfig = "[simulation]\ntick_duration = 60.0".parse().unwrap();
        assert_eq!(slow.simulation.tick_duration, MAX_TICK_DURATION);
        for resolution in [0, 513, 1_000_000] {
            let err = format!("[fracture]\nresolution = {}", resolution)
                .parse::<InstanceConfig>()
                .unwrap_err();
            assert!(matches!(
                err,
                ConfigError::Invalid {
                    field: "fracture.resolution",
                    ..
                }
            ));
        }
        let err = "[dispatcher]\nqueue_capacity = 0".parse::<InstanceConfig>().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(matches!(
            "fracture = 3".parse::<InstanceConfig>(),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            InstanceConfig::load("/nonexistent/barrage.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
