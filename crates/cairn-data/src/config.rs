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

//! Loading of [`ComputeSettings`] from RON.

use cairn_core::renderer::ComputeSettings;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    /// The settings text is not valid RON for [`ComputeSettings`].
    #[error("failed to parse settings: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// A value is outside its valid range.
    #[error("invalid setting '{field}': {reason}")]
    Invalid {
        /// The offending field.
        field: &'static str,
        /// Why the value is rejected.
        reason: &'static str,
    },
}

/// Parses settings from RON text. Missing fields keep their defaults.
pub fn settings_from_ron(text: &str) -> Result<ComputeSettings, ConfigError> {
    let settings: ComputeSettings = ron::from_str(text)?;
    validate(&settings)?;
    Ok(settings)
}

/// Reads and parses a RON settings file.
pub fn load_settings(path: impl AsRef<Path>) -> Result<ComputeSettings, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let settings = settings_from_ron(&text)?;
    log::info!("Loaded compute settings from '{}'", path.display());
    Ok(settings)
}

fn validate(settings: &ComputeSettings) -> Result<(), ConfigError> {
    let factor_ok = |f: f32| f.is_finite() && f > 0.0 && f <= 1.0;
    if !factor_ok(settings.full_update_factor) {
        return Err(ConfigError::Invalid {
            field: "full_update_factor",
            reason: "must be in (0, 1]",
        });
    }
    if !factor_ok(settings.full_update_geometry_factor) {
        return Err(ConfigError::Invalid {
            field: "full_update_geometry_factor",
            reason: "must be in (0, 1]",
        });
    }
    if settings.max_build_attempts == 0 {
        return Err(ConfigError::Invalid {
            field: "max_build_attempts",
            reason: "must be at least 1",
        });
    }
    if settings.pool_log_interval == 0 {
        return Err(ConfigError::Invalid {
            field: "pool_log_interval",
            reason: "must be at least 1",
        });
    }
    Ok(())
}
