//! Engine configuration for ETSIM
//!
//! One explicit value passed into the engine constructor. It can be built in
//! code with the chainable helpers or loaded from a YAML, JSON or TOML file.

use crate::error::{EtsimError, EtsimResult};
use crate::scheduling::resources::ResourceCapacity;
use crate::scheduling::roofline::RooflineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What happens when a node lacks the attributes its class requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Abort the run with the offending node id
    #[default]
    Strict,
    /// Warn and treat the node as invalid
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Id of the simulated system (NPU) this engine replays
    pub sys_id: u64,
    pub validation: ValidationMode,
    /// Replay recorded durations for every node, whatever its class
    pub replay_only: bool,
    /// Roofline cost model for CPU compute; recorded durations when `None`
    pub roofline: Option<RooflineConfig>,
    pub resources: ResourceCapacity,
    /// Record tensor reads/writes and rebuild the memory timeline
    pub track_memory: bool,
    /// Emit one debug line per issue and per callback
    pub trace_enabled: bool,
    /// Ticks per recorded runtime unit (microseconds to nanoseconds)
    pub replay_tick_scale: u64,
    /// Length of the per-dimension involvement mask for collectives
    pub network_dims: usize,
    /// Communicator-group file; a path containing `empty` means none
    pub comm_group_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sys_id: 0,
            validation: ValidationMode::Strict,
            replay_only: false,
            roofline: None,
            resources: ResourceCapacity::default(),
            track_memory: false,
            trace_enabled: false,
            replay_tick_scale: 1000,
            network_dims: 1,
            comm_group_file: None,
        }
    }
}

impl EngineConfig {
    /// Recorded durations, strict validation, single slot per class
    pub fn standard() -> Self {
        Self::default()
    }

    /// Replay every node's recorded duration
    pub fn replay() -> Self {
        Self {
            replay_only: true,
            ..Self::default()
        }
    }

    /// Roofline-costed CPU compute
    pub fn roofline(peak_perf: f64, bandwidth: f64) -> Self {
        Self {
            roofline: Some(RooflineConfig::new(peak_perf, bandwidth)),
            ..Self::default()
        }
    }

    pub fn with_sys_id(mut self, sys_id: u64) -> Self {
        self.sys_id = sys_id;
        self
    }

    pub fn with_validation(mut self, mode: ValidationMode) -> Self {
        self.validation = mode;
        self
    }

    pub fn lenient(self) -> Self {
        self.with_validation(ValidationMode::Lenient)
    }

    pub fn with_roofline(mut self, roofline: RooflineConfig) -> Self {
        self.roofline = Some(roofline);
        self
    }

    pub fn with_resources(mut self, resources: ResourceCapacity) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_memory_tracking(mut self) -> Self {
        self.track_memory = true;
        self
    }

    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    pub fn with_network_dims(mut self, dims: usize) -> Self {
        self.network_dims = dims;
        self
    }

    pub fn with_comm_group_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.comm_group_file = Some(path.into());
        self
    }

    pub fn roofline_enabled(&self) -> bool {
        self.roofline.is_some()
    }

    pub fn is_strict(&self) -> bool {
        self.validation == ValidationMode::Strict
    }

    /// Convert a recorded runtime (microseconds) to ticks; 0 replays as 1 tick
    pub fn replay_ticks(&self, runtime: u64) -> u64 {
        if runtime == 0 {
            1
        } else {
            runtime.saturating_mul(self.replay_tick_scale)
        }
    }

    pub fn validate(&self) -> EtsimResult<()> {
        if self.replay_tick_scale == 0 {
            return Err(EtsimError::config("replay_tick_scale must be positive"));
        }
        self.resources.validate()?;
        if let Some(roofline) = &self.roofline {
            roofline.validate()?;
        }
        Ok(())
    }

    /// Load from `.yaml`/`.yml`, `.json` or `.toml`, chosen by extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> EtsimResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let config: EngineConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            other => {
                return Err(EtsimError::config(format!(
                    "unsupported config format {:?} for {}",
                    other,
                    path.display()
                )))
            }
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_presets() {
        let config = EngineConfig::standard();
        assert!(config.is_strict());
        assert!(!config.roofline_enabled());
        assert_eq!(config.resources.cpu_compute, 1);

        assert!(EngineConfig::replay().replay_only);
        assert!(EngineConfig::roofline(100.0, 10.0).roofline_enabled());
        assert!(!EngineConfig::standard().lenient().is_strict());
    }

    #[test]
    fn test_replay_ticks() {
        let config = EngineConfig::default();
        assert_eq!(config.replay_ticks(0), 1);
        assert_eq!(config.replay_ticks(7), 7000);
    }

    #[test]
    fn test_validate_rejects_zero_scale() {
        let config = EngineConfig {
            replay_tick_scale: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        fs::write(
            &path,
            "sys_id: 3\nvalidation: lenient\ntrack_memory: true\nroofline:\n  peak_perf: 2000.0\n  bandwidth: 50.0\n",
        )
        .unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.sys_id, 3);
        assert_eq!(config.validation, ValidationMode::Lenient);
        assert!(config.track_memory);
        assert_eq!(config.roofline.unwrap().peak_perf, 2000.0);
        assert_eq!(config.replay_tick_scale, 1000);
    }

    #[test]
    fn test_load_toml_and_json() {
        let dir = tempdir().unwrap();

        let toml_path = dir.path().join("engine.toml");
        fs::write(
            &toml_path,
            "replay_only = true\n\n[resources]\ncpu_compute = 2\n",
        )
        .unwrap();
        let config = EngineConfig::from_file(&toml_path).unwrap();
        assert!(config.replay_only);
        assert_eq!(config.resources.cpu_compute, 2);
        assert_eq!(config.resources.communication, 1);

        let json_path = dir.path().join("engine.json");
        fs::write(&json_path, r#"{"network_dims": 3, "trace_enabled": true}"#).unwrap();
        let config = EngineConfig::from_file(&json_path).unwrap();
        assert_eq!(config.network_dims, 3);
        assert!(config.trace_enabled);
    }

    #[test]
    fn test_unknown_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.ini");
        fs::write(&path, "sys_id=1").unwrap();
        assert!(matches!(
            EngineConfig::from_file(&path),
            Err(EtsimError::Config(_))
        ));
    }
}
