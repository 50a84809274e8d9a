// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Availability queries over the item catalog.

use std::sync::Arc;

use gearbook_core::GearbookError;
use gearbook_core::types::Item;
use gearbook_core::validate::parse_date;
use gearbook_storage::Database;
use gearbook_storage::queries::bookings;
use serde::Serialize;

use crate::cache::ItemCache;

/// Availability of one item on one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Availability {
    pub item_name: String,
    pub date: String,
    pub available: bool,
    pub booked_count: i64,
    pub total: i64,
}

/// Read side of the reservation engine.
///
/// Item resolution goes through the cache; booked counts always come from
/// the store.
#[derive(Clone)]
pub struct AvailabilityReader {
    db: Arc<Database>,
    cache: Arc<ItemCache>,
}

impl AvailabilityReader {
    pub fn new(db: Arc<Database>, cache: Arc<ItemCache>) -> Self {
        Self { db, cache }
    }

    /// Availability for a single (item, date).
    pub async fn get_availability(
        &self,
        item_name: &str,
        date: &str,
    ) -> Result<Availability, GearbookError> {
        parse_date(date)?;
        let item = self
            .cache
            .find_by_name(&self.db, item_name)
            .await?
            .ok_or_else(|| GearbookError::NotFound {
                what: "item",
                name: item_name.to_string(),
            })?;
        self.availability_of(&item, date).await
    }

    /// Cross product of items and dates.
    ///
    /// Unknown items are skipped; a malformed date or an empty input list
    /// rejects the whole call. Result order follows the input order, items
    /// outer, dates inner.
    pub async fn get_availability_bulk(
        &self,
        items: &[String],
        dates: &[String],
    ) -> Result<Vec<Availability>, GearbookError> {
        if items.is_empty() || dates.is_empty() {
            return Err(GearbookError::InvalidArgument(
                "items and dates must be non-empty".to_string(),
            ));
        }
        for date in dates {
            parse_date(date)?;
        }

        let mut results = Vec::with_capacity(items.len() * dates.len());
        for name in items {
            let Some(item) = self.cache.find_by_name(&self.db, name).await? else {
                continue;
            };
            for date in dates {
                results.push(self.availability_of(&item, date).await?);
            }
        }
        Ok(results)
    }

    /// All active items in (sort_order, id) order.
    pub async fn list_items(&self) -> Result<Vec<Item>, GearbookError> {
        self.cache.list_active(&self.db).await
    }

    async fn availability_of(
        &self,
        item: &Item,
        date: &str,
    ) -> Result<Availability, GearbookError> {
        let booked = bookings::booked_count(&self.db, item.id, date).await?;
        Ok(Availability {
            item_name: item.name.clone(),
            date: date.to_string(),
            available: booked < item.total_quantity,
            booked_count: booked,
            total: item.total_quantity,
        })
    }
}
