use crate::error::{McTestError, Result};
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
}

/// Launch and port-selection settings for supervised server instances.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Path to the server binary. When absent, `$HOME/bin/memcached` and
    /// `$PATH` are searched at startup.
    pub program: Option<Utf8PathBuf>,
    /// How long to watch a freshly spawned server's stderr for a bind
    /// failure before declaring the launch successful.
    #[serde(default = "default_launch_probe_ms")]
    pub launch_probe_ms: u64,
    /// Ceiling on port-sampling attempts before `start()` gives up.
    #[serde(default = "default_max_port_attempts")]
    pub max_port_attempts: u32,
    #[serde(default = "default_port_min")]
    pub port_min: u16,
    #[serde(default = "default_port_max")]
    pub port_max: u16,
    /// Pass `-vv` to spawned servers.
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeConfig {
    /// Deadline for one complete sideband exchange (connect or
    /// request/response round trip).
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,
}

fn default_launch_probe_ms() -> u64 {
    1000
}

fn default_max_port_attempts() -> u32 {
    64
}

fn default_port_min() -> u16 {
    1025
}

fn default_port_max() -> u16 {
    65535
}

fn default_probe_timeout() -> u64 {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            program: None,
            launch_probe_ms: default_launch_probe_ms(),
            max_port_attempts: default_max_port_attempts(),
            port_min: default_port_min(),
            port_max: default_port_max(),
            verbose: false,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_probe_timeout(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::find_config_file()?;
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| McTestError::Config(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| McTestError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    fn find_config_file() -> Result<PathBuf> {
        let candidates = [
            dirs::config_dir().map(|p| p.join("mctest/mctest.toml")),
            Some(PathBuf::from("/etc/mctest/mctest.toml")),
        ];

        for candidate in candidates.into_iter().flatten() {
            if candidate.exists() {
                return Ok(candidate);
            }
        }

        Err(McTestError::Config("Config file not found".to_owned()))
    }

    fn validate(&self) -> Result<()> {
        if self.server.port_min > self.server.port_max {
            return Err(McTestError::Config(format!(
                "port_min {} exceeds port_max {}",
                self.server.port_min, self.server.port_max
            )));
        }
        if self.server.max_port_attempts == 0 {
            return Err(McTestError::Config(
                "max_port_attempts must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}
