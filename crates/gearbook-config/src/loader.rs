// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! The YAML file path comes from `GEARBOOK_CONFIG_PATH`, then `CONFIG_PATH`,
//! then `./gearbook.yaml`. `${ENV_VAR}` references inside the file are
//! expanded before parsing. Environment variables with the `GEARBOOK_`
//! prefix override individual keys.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use regex::Regex;
use tracing::debug;

// `$FOO` without braces is left alone; only `${IDENT}` expands.
static ENV_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

use crate::model::GearbookConfig;

/// Environment variables consulted, in order, for the config file path.
const CONFIG_PATH_VARS: [&str; 2] = ["GEARBOOK_CONFIG_PATH", "CONFIG_PATH"];

/// Fallback config file looked up in the working directory.
const DEFAULT_CONFIG_FILE: &str = "gearbook.yaml";

/// Load configuration from the resolved YAML path with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. The YAML file (if present), with `${ENV}` references expanded
/// 3. `GEARBOOK_*` environment variables
pub fn load_config() -> Result<GearbookConfig, figment::Error> {
    let mut figment = Figment::new().merge(Serialized::defaults(GearbookConfig::default()));
    if let Some(path) = resolve_config_path() {
        figment = merge_yaml_file(figment, &path);
    }
    figment.merge(env_provider()).extract()
}

/// Load configuration from a YAML string only (no file lookup, no env).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(yaml_content: &str) -> Result<GearbookConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GearbookConfig::default()))
        .merge(Yaml::string(&expand_env_refs(yaml_content)))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<GearbookConfig, figment::Error> {
    let figment = Figment::new().merge(Serialized::defaults(GearbookConfig::default()));
    merge_yaml_file(figment, path).merge(env_provider()).extract()
}

/// Resolve the config file path from the environment, falling back to the
/// working directory. Returns `None` when no candidate file exists.
pub fn resolve_config_path() -> Option<PathBuf> {
    for var in CONFIG_PATH_VARS {
        if let Ok(value) = std::env::var(var)
            && !value.trim().is_empty()
        {
            return Some(PathBuf::from(value));
        }
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() { Some(local) } else { None }
}

/// Merge a YAML file into the figment, expanding `${ENV}` references first.
///
/// A missing file is silently skipped to match `Yaml::file` semantics; the
/// defaults and environment overrides still apply.
fn merge_yaml_file(figment: Figment, path: &Path) -> Figment {
    match std::fs::read_to_string(path) {
        Ok(content) => figment.merge(Yaml::string(&expand_env_refs(&content))),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "config file not readable, skipping");
            figment
        }
    }
}

/// Expand `${ENV_VAR}` references against the process environment.
///
/// Unset variables expand to the empty string, matching envsubst behavior,
/// so validation catches the resulting empty values instead of a literal
/// `${...}` leaking into credentials.
pub fn expand_env_refs(content: &str) -> String {
    ENV_REF.replace_all(content, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match std::env::var(name) {
            Ok(value) => value,
            Err(_) => {
                debug!(var = name, "config references unset environment variable");
                String::new()
            }
        }
    })
    .into_owned()
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names. For example, `GEARBOOK_STORAGE_DATABASE_PATH`
/// must map to `storage.database_path`, not `storage.database.path`.
fn env_provider() -> Env {
    Env::prefixed("GEARBOOK_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: GEARBOOK_STORAGE_DATABASE_PATH -> "storage_database_path"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("service_", "service.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("server_", "server.", 1)
            .replacen("api_", "api.", 1)
            .replacen("booking_", "booking.", 1)
            .replacen("cache_", "cache.", 1)
            .replacen("sync_", "sync.", 1)
            .replacen("sheets_", "sheets.", 1)
            .replacen("state_", "state.", 1)
            .into();
        mapped
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn expands_set_variables_and_blanks_unset_ones() {
        // SAFETY: test runs serially; no other thread reads the environment.
        unsafe {
            std::env::set_var("GEARBOOK_TEST_TOKEN", "sekrit");
            std::env::remove_var("GEARBOOK_TEST_MISSING");
        }
        let expanded = expand_env_refs(
            "api_token: \"${GEARBOOK_TEST_TOKEN}\"\nother: \"${GEARBOOK_TEST_MISSING}\"\n",
        );
        assert!(expanded.contains("api_token: \"sekrit\""));
        assert!(expanded.contains("other: \"\""));
        unsafe {
            std::env::remove_var("GEARBOOK_TEST_TOKEN");
        }
    }

    #[test]
    fn leaves_braceless_dollars_alone() {
        let expanded = expand_env_refs("comment: \"costs $5\"\n");
        assert_eq!(expanded, "comment: \"costs $5\"\n");
    }

    #[test]
    #[serial]
    fn resolve_prefers_gearbook_config_path() {
        unsafe {
            std::env::set_var("GEARBOOK_CONFIG_PATH", "/tmp/a.yaml");
            std::env::set_var("CONFIG_PATH", "/tmp/b.yaml");
        }
        assert_eq!(resolve_config_path(), Some(PathBuf::from("/tmp/a.yaml")));
        unsafe {
            std::env::remove_var("GEARBOOK_CONFIG_PATH");
        }
        assert_eq!(resolve_config_path(), Some(PathBuf::from("/tmp/b.yaml")));
        unsafe {
            std::env::remove_var("CONFIG_PATH");
        }
    }
}
