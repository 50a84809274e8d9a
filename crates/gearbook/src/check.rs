// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `gearbook check` command implementation.
//!
//! Runs diagnostic checks against the Gearbook environment to identify
//! configuration issues, connectivity problems, and resource constraints.

use std::io::IsTerminal;
use std::time::{Duration, Instant};

use gearbook_config::GearbookConfig;
use gearbook_core::GearbookError;
use gearbook_sheets::{HttpSheetClient, SheetWriter};
use gearbook_state::RedisStateStore;
use gearbook_sync::RemoteQueue;

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    /// Check passed successfully.
    Pass,
    /// Check passed with a warning.
    Warn,
    /// Check failed.
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Name of the check.
    pub name: String,
    /// Check status.
    pub status: CheckStatus,
    /// Human-readable message.
    pub message: String,
    /// Duration the check took.
    pub duration: Duration,
}

/// Run the `gearbook check` command.
///
/// Runs quick diagnostic checks. With `--deep`, runs additional intensive
/// checks. With `--plain`, disables colored output.
pub async fn run_check(
    config: &GearbookConfig,
    deep: bool,
    plain: bool,
) -> Result<(), GearbookError> {
    let use_color = !plain && std::io::stdout().is_terminal();
    let mut results = Vec::new();

    // Quick checks (always run)
    results.push(check_config().await);
    results.push(check_database(&config.storage.database_path).await);
    results.push(check_sheet(config).await);
    results.push(check_redis(config).await);
    results.push(check_health_endpoint(config).await);

    // Deep checks (only with --deep)
    if deep {
        results.push(check_db_integrity(&config.storage.database_path).await);
        results.push(check_disk_space(&config.storage.database_path).await);
        results.push(check_memory_baseline().await);
    }

    // Print results
    println!();
    println!("  gearbook check");
    println!("  {}", "-".repeat(50));

    let mut fail_count = 0;
    let mut warn_count = 0;

    for result in &results {
        let duration_ms = result.duration.as_millis();
        let status_symbol;
        let line;

        match result.status {
            CheckStatus::Pass => {
                if use_color {
                    use colored::Colorize;
                    status_symbol = "✓".green().to_string();
                    line = format!(
                        "    {status_symbol} {:<20} {} ({duration_ms}ms)",
                        result.name, result.message
                    );
                } else {
                    line = format!(
                        "    [OK]   {:<20} {} ({duration_ms}ms)",
                        result.name, result.message
                    );
                }
            }
            CheckStatus::Warn => {
                warn_count += 1;
                if use_color {
                    use colored::Colorize;
                    status_symbol = "!".yellow().to_string();
                    line = format!(
                        "    {status_symbol} {:<20} {} ({duration_ms}ms)",
                        result.name,
                        result.message.yellow()
                    );
                } else {
                    line = format!(
                        "    [WARN] {:<20} {} ({duration_ms}ms)",
                        result.name, result.message
                    );
                }
            }
            CheckStatus::Fail => {
                fail_count += 1;
                if use_color {
                    use colored::Colorize;
                    status_symbol = "✗".red().to_string();
                    line = format!(
                        "    {status_symbol} {:<20} {} ({duration_ms}ms)",
                        result.name,
                        result.message.red()
                    );
                } else {
                    line = format!(
                        "    [FAIL] {:<20} {} ({duration_ms}ms)",
                        result.name, result.message
                    );
                }
            }
        }

        println!("{line}");
    }

    println!();

    if fail_count > 0 || warn_count > 0 {
        let issues = fail_count + warn_count;
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
        if !deep {
            println!("  Run with --deep for detailed diagnostics.");
        }
    } else {
        println!("  All checks passed.");
    }

    println!();

    Ok(())
}

/// Check configuration loads without errors.
async fn check_config() -> CheckResult {
    let start = Instant::now();
    match gearbook_config::load_and_validate() {
        Ok(_) => CheckResult {
            name: "Configuration".to_string(),
            status: CheckStatus::Pass,
            message: "valid".to_string(),
            duration: start.elapsed(),
        },
        Err(errors) => CheckResult {
            name: "Configuration".to_string(),
            status: CheckStatus::Fail,
            message: format!("{} error(s)", errors.len()),
            duration: start.elapsed(),
        },
    }
}

/// Check database file exists and can be opened.
async fn check_database(db_path: &str) -> CheckResult {
    let start = Instant::now();
    let path = std::path::Path::new(db_path);

    if !path.exists() {
        return CheckResult {
            name: "Database".to_string(),
            status: CheckStatus::Warn,
            message: format!("not found: {db_path} (will be created on first run)"),
            duration: start.elapsed(),
        };
    }

    match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => {
            let query_result = conn
                .call(|conn| -> Result<(), rusqlite::Error> {
                    conn.query_row("SELECT 1", [], |_| Ok(()))
                })
                .await;

            match query_result {
                Ok(()) => CheckResult {
                    name: "Database".to_string(),
                    status: CheckStatus::Pass,
                    message: "connected".to_string(),
                    duration: start.elapsed(),
                },
                Err(e) => CheckResult {
                    name: "Database".to_string(),
                    status: CheckStatus::Fail,
                    message: format!("query failed: {e}"),
                    duration: start.elapsed(),
                },
            }
        }
        Err(e) => CheckResult {
            name: "Database".to_string(),
            status: CheckStatus::Fail,
            message: format!("open failed: {e}"),
            duration: start.elapsed(),
        },
    }
}

/// Check the configured sheet mirror backend is reachable.
async fn check_sheet(config: &GearbookConfig) -> CheckResult {
    let start = Instant::now();

    if config.sheets.backend != "http" {
        return CheckResult {
            name: "Sheet mirror".to_string(),
            status: CheckStatus::Pass,
            message: "memory backend (local dev)".to_string(),
            duration: start.elapsed(),
        };
    }

    let Some(base_url) = config.sheets.base_url.clone() else {
        return CheckResult {
            name: "Sheet mirror".to_string(),
            status: CheckStatus::Fail,
            message: "sheets.base_url not set".to_string(),
            duration: start.elapsed(),
        };
    };

    let client = match HttpSheetClient::new(
        base_url,
        config.sheets.api_token.clone(),
        config.sheets.bookings_sheet.clone(),
        config.sheets.schedule_sheet.clone(),
        Duration::from_secs(5),
        Duration::from_secs(config.sheets.row_cache_refresh_secs),
    ) {
        Ok(client) => client,
        Err(e) => {
            return CheckResult {
                name: "Sheet mirror".to_string(),
                status: CheckStatus::Fail,
                message: format!("client error: {e}"),
                duration: start.elapsed(),
            };
        }
    };

    match client.ping().await {
        Ok(()) => CheckResult {
            name: "Sheet mirror".to_string(),
            status: CheckStatus::Pass,
            message: "reachable".to_string(),
            duration: start.elapsed(),
        },
        Err(e) => CheckResult {
            name: "Sheet mirror".to_string(),
            status: CheckStatus::Fail,
            message: format!("{e}"),
            duration: start.elapsed(),
        },
    }
}

/// Check every configured Redis backend answers a ping.
async fn check_redis(config: &GearbookConfig) -> CheckResult {
    let start = Instant::now();

    let state_url = if config.state.backend == "redis" {
        config.state.redis_url.as_deref()
    } else {
        None
    };
    let sync_url = config.sync.redis_url.as_deref();

    if state_url.is_none() && sync_url.is_none() {
        return CheckResult {
            name: "Redis".to_string(),
            status: CheckStatus::Pass,
            message: "not configured".to_string(),
            duration: start.elapsed(),
        };
    }

    if let Some(url) = state_url {
        let probe = async {
            let store =
                RedisStateStore::connect(url, Duration::from_secs(config.state.ttl_secs)).await?;
            store.ping().await
        };
        match tokio::time::timeout(Duration::from_secs(5), probe).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return CheckResult {
                    name: "Redis".to_string(),
                    status: CheckStatus::Fail,
                    message: format!("state store: {e}"),
                    duration: start.elapsed(),
                };
            }
            Err(_) => {
                return CheckResult {
                    name: "Redis".to_string(),
                    status: CheckStatus::Fail,
                    message: "state store: timeout (5s)".to_string(),
                    duration: start.elapsed(),
                };
            }
        }
    }

    if let Some(url) = sync_url {
        let probe = async {
            let queue =
                RemoteQueue::connect(url, &config.sync.queue_key, &config.sync.dead_letter_key)
                    .await?;
            queue.ping().await
        };
        match tokio::time::timeout(Duration::from_secs(5), probe).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return CheckResult {
                    name: "Redis".to_string(),
                    status: CheckStatus::Fail,
                    message: format!("sync queue: {e}"),
                    duration: start.elapsed(),
                };
            }
            Err(_) => {
                return CheckResult {
                    name: "Redis".to_string(),
                    status: CheckStatus::Fail,
                    message: "sync queue: timeout (5s)".to_string(),
                    duration: start.elapsed(),
                };
            }
        }
    }

    CheckResult {
        name: "Redis".to_string(),
        status: CheckStatus::Pass,
        message: "reachable".to_string(),
        duration: start.elapsed(),
    }
}

/// Check the availability API health endpoint.
async fn check_health_endpoint(config: &GearbookConfig) -> CheckResult {
    let start = Instant::now();
    let url = format!("http://{}/healthz", config.server.http_bind);

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            return CheckResult {
                name: "Health endpoint".to_string(),
                status: CheckStatus::Fail,
                message: format!("HTTP client error: {e}"),
                duration: start.elapsed(),
            };
        }
    };

    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => CheckResult {
            name: "Health endpoint".to_string(),
            status: CheckStatus::Pass,
            message: "reachable".to_string(),
            duration: start.elapsed(),
        },
        Ok(resp) => CheckResult {
            name: "Health endpoint".to_string(),
            status: CheckStatus::Warn,
            message: format!("status {}", resp.status()),
            duration: start.elapsed(),
        },
        Err(_) => CheckResult {
            name: "Health endpoint".to_string(),
            status: CheckStatus::Warn,
            message: format!("not reachable at {url} (service may not be running)"),
            duration: start.elapsed(),
        },
    }
}

/// Deep check: SQLite integrity check.
async fn check_db_integrity(db_path: &str) -> CheckResult {
    let start = Instant::now();
    let path = std::path::Path::new(db_path);

    if !path.exists() {
        return CheckResult {
            name: "DB integrity".to_string(),
            status: CheckStatus::Warn,
            message: "database not found (skipped)".to_string(),
            duration: start.elapsed(),
        };
    }

    match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => {
            let result = conn
                .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                    let mut stmt = conn.prepare("PRAGMA integrity_check")?;
                    let rows: Vec<String> = stmt
                        .query_map([], |row| row.get(0))?
                        .filter_map(|r| r.ok())
                        .collect();
                    Ok(rows)
                })
                .await;

            match result {
                Ok(rows) if rows.len() == 1 && rows[0] == "ok" => CheckResult {
                    name: "DB integrity".to_string(),
                    status: CheckStatus::Pass,
                    message: "ok".to_string(),
                    duration: start.elapsed(),
                },
                Ok(rows) => CheckResult {
                    name: "DB integrity".to_string(),
                    status: CheckStatus::Fail,
                    message: format!("{} issue(s) found", rows.len()),
                    duration: start.elapsed(),
                },
                Err(e) => CheckResult {
                    name: "DB integrity".to_string(),
                    status: CheckStatus::Fail,
                    message: format!("check failed: {e}"),
                    duration: start.elapsed(),
                },
            }
        }
        Err(e) => CheckResult {
            name: "DB integrity".to_string(),
            status: CheckStatus::Fail,
            message: format!("open failed: {e}"),
            duration: start.elapsed(),
        },
    }
}

/// Deep check: available disk space.
async fn check_disk_space(db_path: &str) -> CheckResult {
    let start = Instant::now();
    let path = std::path::Path::new(db_path);
    let check_path = if path.exists() {
        path.to_path_buf()
    } else {
        path.parent()
            .unwrap_or(std::path::Path::new("."))
            .to_path_buf()
    };

    match std::fs::metadata(&check_path) {
        Ok(_) => {
            // On most platforms we can't easily get free disk space from std.
            // Report the DB file size as a heuristic.
            if path.exists() {
                let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
                let size_mb = size as f64 / (1024.0 * 1024.0);
                CheckResult {
                    name: "Disk space".to_string(),
                    status: CheckStatus::Pass,
                    message: format!("DB size: {size_mb:.1} MB"),
                    duration: start.elapsed(),
                }
            } else {
                CheckResult {
                    name: "Disk space".to_string(),
                    status: CheckStatus::Pass,
                    message: "directory accessible".to_string(),
                    duration: start.elapsed(),
                }
            }
        }
        Err(e) => CheckResult {
            name: "Disk space".to_string(),
            status: CheckStatus::Warn,
            message: format!("cannot access: {e}"),
            duration: start.elapsed(),
        },
    }
}

/// Deep check: memory baseline via jemalloc.
async fn check_memory_baseline() -> CheckResult {
    let start = Instant::now();

    #[cfg(not(target_env = "msvc"))]
    {
        let _ = tikv_jemalloc_ctl::epoch::advance();
        let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
        let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);
        let allocated_mb = allocated as f64 / (1024.0 * 1024.0);
        let resident_mb = resident as f64 / (1024.0 * 1024.0);

        CheckResult {
            name: "Memory baseline".to_string(),
            status: CheckStatus::Pass,
            message: format!("heap: {allocated_mb:.1} MB, resident: {resident_mb:.1} MB"),
            duration: start.elapsed(),
        }
    }

    #[cfg(target_env = "msvc")]
    {
        CheckResult {
            name: "Memory baseline".to_string(),
            status: CheckStatus::Warn,
            message: "jemalloc not available on MSVC".to_string(),
            duration: start.elapsed(),
        }
    }
}
