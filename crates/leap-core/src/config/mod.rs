// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Engine configuration.
//!
//! Settings are plain serde structs with sensible defaults, read from RON
//! documents. Every field is optional in the document; missing fields keep
//! their default value.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// An error raised while loading a configuration document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The document could not be read from disk.
    #[error("failed to read configuration file '{path}': {source}")]
    Io {
        /// The path that failed to load.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The document is not valid RON for the requested settings type.
    #[error("invalid configuration: {0}")]
    Parse(String),
}

/// Settings for the process-wide block allocator hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorSettings {
    /// Whether `shutdown` logs the blocks still registered.
    pub report_leaks_on_shutdown: bool,
    /// Maximum number of leaked blocks listed individually in the report.
    pub leak_report_limit: usize,
}

impl Default for AllocatorSettings {
    fn default() -> Self {
        Self {
            report_leaks_on_shutdown: true,
            leak_report_limit: 8,
        }
    }
}

impl AllocatorSettings {
    /// Parses allocator settings from a RON document.
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        ron::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Settings for the sandbox demo host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Number of frames to simulate.
    pub frames: u32,
    /// Fixed time step per frame, in seconds.
    pub delta_seconds: f32,
    /// Spin speed of the demo's root node around Y.
    pub spin_degrees_per_second: f32,
    /// Allocator hook settings.
    pub allocator: AllocatorSettings,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            frames: 120,
            delta_seconds: 1.0 / 60.0,
            spin_degrees_per_second: 90.0,
            allocator: AllocatorSettings::default(),
        }
    }
}

impl SandboxConfig {
    /// Parses sandbox settings from a RON document.
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        ron::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Loads the settings at `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!(
                "No configuration found at '{}', using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_ron_str(&source)?;
        log::info!("Loaded configuration from '{}'", path.display());
        Ok(config)
    }
}
