// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Gearbook reservation service.
//!
//! Provides YAML configuration parsing with strict validation
//! (`deny_unknown_fields`), `${ENV_VAR}` expansion inside the file,
//! environment variable overrides, and Elm-style diagnostic error rendering
//! with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use gearbook_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("binding {}", config.server.http_bind);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::GearbookConfig;

/// Load configuration from the resolved YAML path and validate it.
///
/// This is the high-level entry point that:
/// 1. Loads config from the YAML file + env vars via Figment
/// 2. On success: runs post-deserialization validation
/// 3. On Figment error: converts to rich miette diagnostics with typo suggestions
///
/// Returns either a valid `GearbookConfig` or a list of diagnostic errors.
pub fn load_and_validate() -> Result<GearbookConfig, Vec<ConfigError>> {
    match loader::load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            // Read the YAML source for error source span information.
            let yaml_sources = collect_yaml_sources();
            Err(diagnostic::figment_to_config_errors(err, &yaml_sources))
        }
    }
}

/// Load configuration from a specific YAML string and validate it.
///
/// Useful for testing and explicit configuration.
pub fn load_and_validate_str(yaml_content: &str) -> Result<GearbookConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(yaml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = vec![("<inline>".to_string(), yaml_content.to_string())];
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Collect YAML source file contents for error span resolution.
fn collect_yaml_sources() -> Vec<(String, String)> {
    let mut sources = Vec::new();
    if let Some(path) = loader::resolve_config_path()
        && let Ok(content) = std::fs::read_to_string(&path)
    {
        sources.push((path.display().to_string(), content));
    }
    sources
}
