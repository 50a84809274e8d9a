// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as parseable bind addresses, positive retry budgets,
//! and backend-specific required fields.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::GearbookConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &GearbookConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.server.http_bind.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ConfigError::Validation {
            message: format!(
                "server.http_bind `{}` is not a valid host:port address",
                config.server.http_bind
            ),
        });
    }

    // Empty grpc_bind disables gRPC; anything else must parse.
    if !config.server.grpc_bind.is_empty()
        && config.server.grpc_bind.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ConfigError::Validation {
            message: format!(
                "server.grpc_bind `{}` is not a valid host:port address",
                config.server.grpc_bind
            ),
        });
    }

    if config.api.rate_limit_rps <= 0.0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "api.rate_limit_rps must be positive, got {}",
                config.api.rate_limit_rps
            ),
        });
    }

    if config.api.rate_limit_burst < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "api.rate_limit_burst must be at least 1, got {}",
                config.api.rate_limit_burst
            ),
        });
    }

    let mut seen_keys = HashSet::new();
    for (i, client) in config.api.clients.iter().enumerate() {
        if client.key.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("api.clients[{i}].key must not be empty"),
            });
        }
        if client.extra.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("api.clients[{i}].extra must not be empty"),
            });
        }
        if !client.key.trim().is_empty() && !seen_keys.insert(&client.key) {
            errors.push(ConfigError::Validation {
                message: format!("duplicate api key in api.clients[{i}]"),
            });
        }
    }

    if config.booking.min_advance_minutes < 0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "booking.min_advance_minutes must be non-negative, got {}",
                config.booking.min_advance_minutes
            ),
        });
    }

    if config.booking.max_advance_days_hour < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "booking.max_advance_days_hour must be at least 1, got {}",
                config.booking.max_advance_days_hour
            ),
        });
    }

    if config.booking.max_advance_days_day < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "booking.max_advance_days_day must be at least 1, got {}",
                config.booking.max_advance_days_day
            ),
        });
    }

    if config.booking.max_active_per_user == Some(0) {
        errors.push(ConfigError::Validation {
            message: "booking.max_active_per_user must be at least 1 when set".to_string(),
        });
    }

    if config.cache.items_ttl_minutes < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "cache.items_ttl_minutes must be at least 1, got {}",
                config.cache.items_ttl_minutes
            ),
        });
    }

    if config.sync.backoff_factor < 1.0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "sync.backoff_factor must be at least 1.0, got {}",
                config.sync.backoff_factor
            ),
        });
    }

    if config.sync.max_retries < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "sync.max_retries must be at least 1, got {}",
                config.sync.max_retries
            ),
        });
    }

    if config.sync.batch_size < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "sync.batch_size must be at least 1, got {}",
                config.sync.batch_size
            ),
        });
    }

    match config.sheets.backend.as_str() {
        "memory" => {}
        "http" => {
            let missing_url = config
                .sheets
                .base_url
                .as_deref()
                .map(|u| u.trim().is_empty())
                .unwrap_or(true);
            if missing_url {
                errors.push(ConfigError::Validation {
                    message: "sheets.base_url is required when sheets.backend is `http`"
                        .to_string(),
                });
            }
        }
        other => {
            errors.push(ConfigError::Validation {
                message: format!("sheets.backend must be `memory` or `http`, got `{other}`"),
            });
        }
    }

    match config.state.backend.as_str() {
        "memory" => {}
        "redis" => {
            let missing_url = config
                .state
                .redis_url
                .as_deref()
                .map(|u| u.trim().is_empty())
                .unwrap_or(true);
            if missing_url {
                errors.push(ConfigError::Validation {
                    message: "state.redis_url is required when state.backend is `redis`"
                        .to_string(),
                });
            }
        }
        other => {
            errors.push(ConfigError::Validation {
                message: format!("state.backend must be `memory` or `redis`, got `{other}`"),
            });
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = GearbookConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = GearbookConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("database_path"))));
    }

    #[test]
    fn bad_bind_address_fails_validation() {
        let mut config = GearbookConfig::default();
        config.server.http_bind = "not-an-address".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("http_bind"))));
    }

    #[test]
    fn empty_grpc_bind_disables_grpc_without_error() {
        let mut config = GearbookConfig::default();
        config.server.grpc_bind = String::new();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn http_sheets_requires_base_url() {
        let mut config = GearbookConfig::default();
        config.sheets.backend = "http".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("base_url"))));

        config.sheets.base_url = Some("https://sheets.example/v4/abc".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn redis_state_requires_url() {
        let mut config = GearbookConfig::default();
        config.state.backend = "redis".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("redis_url"))));
    }

    #[test]
    fn duplicate_api_keys_fail_validation() {
        use crate::model::ApiClientConfig;
        let mut config = GearbookConfig::default();
        config.api.clients = vec![
            ApiClientConfig {
                name: "a".to_string(),
                key: "key-1".to_string(),
                extra: "extra-1".to_string(),
                permissions: vec![],
            },
            ApiClientConfig {
                name: "b".to_string(),
                key: "key-1".to_string(),
                extra: "extra-2".to_string(),
                permissions: vec!["read:items".to_string()],
            },
        ];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("duplicate api key"))));
    }

    #[test]
    fn zero_max_active_per_user_fails_validation() {
        let mut config = GearbookConfig::default();
        config.booking.max_active_per_user = Some(0);
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("max_active_per_user"))));
    }

    #[test]
    fn sub_one_backoff_factor_fails_validation() {
        let mut config = GearbookConfig::default();
        config.sync.backoff_factor = 0.5;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("backoff_factor"))));
    }
}
