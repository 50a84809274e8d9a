// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Catalog seeding from a YAML file at startup.
//!
//! The file path comes from `GEARBOOK_ITEMS_PATH`, then `ITEMS_PATH`; no
//! file configured means no seeding. Entries are upserted by name, so the
//! file can be re-applied on every start without duplicating rows. Items
//! get their sort order from file order; cabinets with an `open` window are
//! scheduled for every day of the week.

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Format, Yaml},
};
use gearbook_core::GearbookError;
use gearbook_core::validate::parse_time_label;
use gearbook_storage::Database;
use gearbook_storage::queries::{catalog, schedules};
use serde::Deserialize;

/// Environment variables consulted, in order, for the items file path.
const ITEMS_PATH_VARS: [&str; 2] = ["GEARBOOK_ITEMS_PATH", "ITEMS_PATH"];

const DEFAULT_SLOT_MINUTES: i64 = 60;

/// Schema of the seed file.
#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    items: Vec<ItemSpec>,
    #[serde(default)]
    cabinets: Vec<CabinetSpec>,
}

#[derive(Debug, Deserialize)]
struct ItemSpec {
    name: String,
    #[serde(default)]
    description: Option<String>,
    quantity: i64,
}

#[derive(Debug, Deserialize)]
struct CabinetSpec {
    name: String,
    #[serde(default)]
    description: Option<String>,
    /// Weekly window `HH:MM-HH:MM`, applied Monday through Sunday.
    /// A cabinet without one is created closed; overrides and later edits
    /// open it up.
    #[serde(default)]
    open: Option<String>,
    #[serde(default = "default_slot_minutes")]
    slot_minutes: i64,
}

fn default_slot_minutes() -> i64 {
    DEFAULT_SLOT_MINUTES
}

/// What the seeding pass wrote, for the startup log line.
#[derive(Debug, PartialEq, Eq)]
pub struct SeedReport {
    pub items: usize,
    pub cabinets: usize,
}

/// Resolve the items file path from the environment.
///
/// Returns `None` when neither variable is set, which disables seeding.
pub fn resolve_items_path() -> Option<PathBuf> {
    for var in ITEMS_PATH_VARS {
        if let Ok(value) = std::env::var(var)
            && !value.trim().is_empty()
        {
            return Some(PathBuf::from(value));
        }
    }
    None
}

/// Upsert every item and cabinet in the seed file.
///
/// A configured file that is missing or malformed is a startup error; the
/// operator asked for seeding and silence would hide a broken deploy.
pub async fn seed_catalog(db: &Database, path: &Path) -> Result<SeedReport, GearbookError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        GearbookError::Config(format!("cannot read items file {}: {e}", path.display()))
    })?;
    let file: SeedFile = Figment::new()
        .merge(Yaml::string(&content))
        .extract()
        .map_err(|e| {
            GearbookError::Config(format!("invalid items file {}: {e}", path.display()))
        })?;

    for (position, item) in file.items.iter().enumerate() {
        if item.quantity < 0 {
            return Err(GearbookError::Config(format!(
                "item {:?} has a negative quantity",
                item.name
            )));
        }
        catalog::upsert_item(
            db,
            &item.name,
            item.description.as_deref(),
            item.quantity,
            position as i64 + 1,
        )
        .await?;
    }

    for spec in &file.cabinets {
        let cabinet = catalog::upsert_cabinet(db, &spec.name, spec.description.as_deref()).await?;
        let Some(label) = spec.open.as_deref() else {
            continue;
        };
        let (start, end) = parse_time_label(label).map_err(|e| {
            GearbookError::Config(format!("cabinet {:?} has a bad open window: {e}", spec.name))
        })?;
        if start >= end {
            return Err(GearbookError::Config(format!(
                "cabinet {:?} open window must end after it starts",
                spec.name
            )));
        }
        if spec.slot_minutes < 1 {
            return Err(GearbookError::Config(format!(
                "cabinet {:?} slot_minutes must be at least 1",
                spec.name
            )));
        }
        let start = start.format("%H:%M").to_string();
        let end = end.format("%H:%M").to_string();
        for day_of_week in 1..=7 {
            schedules::upsert_weekly(db, cabinet.id, day_of_week, &start, &end, spec.slot_minutes)
                .await?;
        }
    }

    Ok(SeedReport {
        items: file.items.len(),
        cabinets: file.cabinets.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn write_seed(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("items.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn seeds_items_and_cabinets() {
        let db = Database::open_in_memory().await.unwrap();
        let (_dir, path) = write_seed(
            "items:\n\
             \x20 - name: camera\n\
             \x20   description: Sony A7 III\n\
             \x20   quantity: 2\n\
             \x20 - name: lens\n\
             \x20   quantity: 3\n\
             cabinets:\n\
             \x20 - name: Main hall\n\
             \x20   open: \"09:00-18:00\"\n\
             \x20   slot_minutes: 30\n",
        );

        let report = seed_catalog(&db, &path).await.unwrap();
        assert_eq!(
            report,
            SeedReport {
                items: 2,
                cabinets: 1
            }
        );

        let items = catalog::list_active_items(&db).await.unwrap();
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["camera", "lens"]);
        assert_eq!(items[0].total_quantity, 2);
        assert_eq!(items[0].description.as_deref(), Some("Sony A7 III"));

        let cabinet = catalog::find_cabinet_by_name(&db, "Main hall")
            .await
            .unwrap()
            .unwrap();
        for day_of_week in [1, 7] {
            let weekly = schedules::weekly_for_day(&db, cabinet.id, day_of_week)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(weekly.start_time, "09:00");
            assert_eq!(weekly.end_time, "18:00");
            assert_eq!(weekly.slot_duration_minutes, 30);
        }
    }

    #[tokio::test]
    async fn reapplying_the_file_updates_in_place() {
        let db = Database::open_in_memory().await.unwrap();
        let (_dir, first) = write_seed("items:\n  - name: camera\n    quantity: 2\n");
        seed_catalog(&db, &first).await.unwrap();

        let (_dir2, second) = write_seed("items:\n  - name: camera\n    quantity: 5\n");
        seed_catalog(&db, &second).await.unwrap();

        let items = catalog::list_active_items(&db).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].total_quantity, 5);
    }

    #[tokio::test]
    async fn cabinet_without_window_gets_no_schedule() {
        let db = Database::open_in_memory().await.unwrap();
        let (_dir, path) = write_seed("cabinets:\n  - name: Annex\n");
        seed_catalog(&db, &path).await.unwrap();

        let cabinet = catalog::find_cabinet_by_name(&db, "Annex")
            .await
            .unwrap()
            .unwrap();
        let weekly = schedules::weekly_for_day(&db, cabinet.id, 1).await.unwrap();
        assert!(weekly.is_none());
    }

    #[tokio::test]
    async fn missing_file_is_a_config_error() {
        let db = Database::open_in_memory().await.unwrap();
        let err = seed_catalog(&db, Path::new("/nonexistent/items.yaml"))
            .await
            .unwrap_err();
        assert!(matches!(err, GearbookError::Config(_)), "got: {err}");
    }

    #[tokio::test]
    async fn inverted_window_is_rejected() {
        let db = Database::open_in_memory().await.unwrap();
        let (_dir, path) =
            write_seed("cabinets:\n  - name: Main hall\n    open: \"18:00-09:00\"\n");
        let err = seed_catalog(&db, &path).await.unwrap_err();
        assert!(err.to_string().contains("end after it starts"), "got: {err}");
    }

    #[tokio::test]
    async fn negative_quantity_is_rejected() {
        let db = Database::open_in_memory().await.unwrap();
        let (_dir, path) = write_seed("items:\n  - name: camera\n    quantity: -1\n");
        let err = seed_catalog(&db, &path).await.unwrap_err();
        assert!(err.to_string().contains("negative quantity"), "got: {err}");
    }

    #[test]
    #[serial]
    fn resolve_prefers_gearbook_items_path() {
        // SAFETY: test runs serially; no other thread reads the environment.
        unsafe {
            std::env::set_var("GEARBOOK_ITEMS_PATH", "/tmp/a.yaml");
            std::env::set_var("ITEMS_PATH", "/tmp/b.yaml");
        }
        assert_eq!(resolve_items_path(), Some(PathBuf::from("/tmp/a.yaml")));
        unsafe {
            std::env::remove_var("GEARBOOK_ITEMS_PATH");
        }
        assert_eq!(resolve_items_path(), Some(PathBuf::from("/tmp/b.yaml")));
        unsafe {
            std::env::remove_var("ITEMS_PATH");
        }
        assert_eq!(resolve_items_path(), None);
    }
}
