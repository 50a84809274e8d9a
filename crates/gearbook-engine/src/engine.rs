// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The reservation engine.
//!
//! Validates booking requests against the catalog, the schedule, and the
//! booking policy, then delegates to the storage layer's composite
//! transactions, which commit the booking row and its sync task together.
//! After every commit the engine nudges the sync worker over an in-process
//! hint channel so the mirror catches up without waiting for the next poll.

use std::sync::Arc;

use chrono::NaiveTime;
use gearbook_core::types::{
    ActorRole, BookingStatus, DayBooking, HourBooking, NewDayBooking, NewHourBooking,
    ScheduleRange, SyncTaskType,
};
use gearbook_core::validate::{normalize_phone, parse_date, parse_time_label};
use gearbook_core::{Clock, GearbookError, schedule_weekday};
use gearbook_storage::Database;
use gearbook_storage::queries::bookings::{
    CancelOutcome, ChangeItemOutcome, CreateDayOutcome, StatusUpdateOutcome,
};
use gearbook_storage::queries::hourly::{CreateHourOutcome, HourCancelOutcome, HourStatusOutcome};
use gearbook_storage::queries::{bookings, catalog, hourly, schedules, sync_queue, users};
use tokio::sync::mpsc;
use tracing::info;

use crate::cache::ItemCache;
use crate::policy::BookingPolicy;
use crate::slots::{self, ScheduleWindow, Slot};

/// Who is asking for a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub role: ActorRole,
}

impl Actor {
    pub fn user(id: i64) -> Self {
        Self {
            id,
            role: ActorRole::User,
        }
    }

    pub fn manager(id: i64) -> Self {
        Self {
            id,
            role: ActorRole::Manager,
        }
    }
}

/// Input for a day-granular booking, with the item given by name.
#[derive(Debug, Clone)]
pub struct DayBookingRequest {
    pub user_id: i64,
    pub item_name: String,
    pub date: String,
    pub comment: Option<String>,
    pub user_name: Option<String>,
    pub user_phone: Option<String>,
}

/// Input for an hour-granular cabinet booking.
///
/// `time_label` is `HH:MM-HH:MM` on `date`. `external_item_name` optionally
/// ties the booking to a catalog item whose day capacity must still admit it.
#[derive(Debug, Clone)]
pub struct HourBookingRequest {
    pub user_id: i64,
    pub cabinet_name: String,
    pub date: String,
    pub time_label: String,
    pub client_name: String,
    pub client_phone: String,
    pub external_item_name: Option<String>,
    pub comment: Option<String>,
}

/// Business rules over the reservation store.
#[derive(Clone)]
pub struct ReservationEngine {
    db: Arc<Database>,
    cache: Arc<ItemCache>,
    clock: Arc<dyn Clock>,
    policy: BookingPolicy,
    hint_tx: Option<mpsc::Sender<()>>,
}

impl ReservationEngine {
    pub fn new(
        db: Arc<Database>,
        cache: Arc<ItemCache>,
        clock: Arc<dyn Clock>,
        policy: BookingPolicy,
    ) -> Self {
        Self {
            db,
            cache,
            clock,
            policy,
            hint_tx: None,
        }
    }

    /// Wire the in-process hint channel to the sync worker.
    pub fn with_sync_hint(mut self, hint_tx: mpsc::Sender<()>) -> Self {
        self.hint_tx = Some(hint_tx);
        self
    }

    /// Book an item for a whole day.
    ///
    /// The capacity check and the insert run in one storage transaction;
    /// a full day reports `ItemNotAvailable`.
    pub async fn create_day_booking(
        &self,
        req: DayBookingRequest,
    ) -> Result<DayBooking, GearbookError> {
        let date = parse_date(&req.date)?;
        self.policy.check_day_date(self.clock.today(), date)?;

        let item = self
            .cache
            .find_by_name(&self.db, &req.item_name)
            .await?
            .ok_or_else(|| GearbookError::NotFound {
                what: "item",
                name: req.item_name.clone(),
            })?;

        if users::is_blacklisted(&self.db, req.user_id).await? {
            return Err(GearbookError::PermissionDenied(
                "user is blacklisted".to_string(),
            ));
        }
        self.check_user_cap(req.user_id).await?;

        let phone = req.user_phone.map(|p| normalize_phone(&p)).transpose()?;
        let outcome = bookings::create_day_booking(
            &self.db,
            NewDayBooking {
                user_id: req.user_id,
                item_id: item.id,
                item_name: item.name.clone(),
                date: req.date.clone(),
                comment: req.comment,
                user_name: req.user_name,
                user_phone: phone,
            },
        )
        .await?;

        match outcome {
            CreateDayOutcome::Created(booking) => {
                info!(
                    booking_id = booking.id,
                    item = %booking.item_name,
                    date = %booking.date,
                    "day booking created"
                );
                metrics::counter!("gearbook_bookings_total", "kind" => "day").increment(1);
                self.nudge_worker();
                Ok(booking)
            }
            CreateDayOutcome::NoCapacity { .. } => Err(GearbookError::ItemNotAvailable {
                item: item.name,
                date: req.date,
            }),
        }
    }

    /// Book a cabinet slot.
    ///
    /// Alignment against the resolved schedule window is checked before the
    /// overlap check; an occupied interval reports `SlotNotAvailable`.
    pub async fn create_hour_booking(
        &self,
        req: HourBookingRequest,
    ) -> Result<HourBooking, GearbookError> {
        let date = parse_date(&req.date)?;
        let (from, to) = parse_time_label(&req.time_label)?;
        let phone = normalize_phone(&req.client_phone)?;

        let cabinet = catalog::find_cabinet_by_name(&self.db, &req.cabinet_name)
            .await?
            .filter(|c| c.active)
            .ok_or_else(|| GearbookError::NotFound {
                what: "cabinet",
                name: req.cabinet_name.clone(),
            })?;

        self.policy
            .check_hour_start(self.clock.now(), date.and_time(from))?;

        let weekly = schedules::weekly_for_day(&self.db, cabinet.id, schedule_weekday(date)).await?;
        let override_row = schedules::override_for_date(&self.db, cabinet.id, &req.date).await?;
        let window = slots::resolve_window(weekly.as_ref(), override_row.as_ref())?.ok_or_else(
            || GearbookError::SlotMisaligned("no schedule window for this date".to_string()),
        )?;
        check_alignment(&window, from, to)?;

        self.check_user_cap(req.user_id).await?;

        if let Some(item_name) = req.external_item_name.as_deref() {
            self.check_item_capacity(item_name, &req.date).await?;
        }

        let outcome = hourly::create_hour_booking(
            &self.db,
            NewHourBooking {
                user_id: req.user_id,
                cabinet_id: cabinet.id,
                item_name: req.external_item_name,
                client_name: req.client_name,
                client_phone: phone,
                start_time: format!("{}T{}", req.date, from.format("%H:%M")),
                end_time: format!("{}T{}", req.date, to.format("%H:%M")),
                comment: req.comment,
            },
        )
        .await?;

        match outcome {
            CreateHourOutcome::Created(booking) => {
                info!(
                    booking_id = booking.id,
                    cabinet = %cabinet.name,
                    interval = %req.time_label,
                    "hour booking created"
                );
                metrics::counter!("gearbook_bookings_total", "kind" => "hour").increment(1);
                self.nudge_worker();
                Ok(booking)
            }
            CreateHourOutcome::Overlap => Err(GearbookError::SlotNotAvailable),
        }
    }

    /// Transition a day booking's status.
    ///
    /// Managers may set any status; users may only cancel their own booking,
    /// which routes through [`ReservationEngine::cancel_as_user`] and ignores
    /// `expected_version`.
    pub async fn change_status(
        &self,
        booking_id: i64,
        new_status: BookingStatus,
        actor: Actor,
        expected_version: Option<i64>,
    ) -> Result<DayBooking, GearbookError> {
        match actor.role {
            ActorRole::User => {
                if new_status != BookingStatus::Canceled {
                    return Err(GearbookError::PermissionDenied(
                        "manager role required for this status".to_string(),
                    ));
                }
                self.cancel_as_user(booking_id, actor.id).await
            }
            ActorRole::Manager => {
                let outcome =
                    bookings::change_status(&self.db, booking_id, new_status, expected_version)
                        .await?;
                match outcome {
                    StatusUpdateOutcome::Updated(booking) => {
                        info!(
                            booking_id,
                            status = %new_status,
                            "booking status changed"
                        );
                        self.nudge_worker();
                        Ok(booking)
                    }
                    StatusUpdateOutcome::NotFound => Err(not_found_booking(booking_id)),
                    StatusUpdateOutcome::StaleVersion { .. } => {
                        Err(GearbookError::ConcurrentModification)
                    }
                    StatusUpdateOutcome::AlreadyTerminal { status } => {
                        Err(GearbookError::AlreadyFinalized(status.to_string()))
                    }
                }
            }
        }
    }

    /// Move a day booking to another item, re-checking capacity on the
    /// target (item, date) in the same transaction. Optionally changes the
    /// status in the same write.
    pub async fn change_item(
        &self,
        booking_id: i64,
        new_item_name: &str,
        new_status: Option<BookingStatus>,
        expected_version: i64,
    ) -> Result<DayBooking, GearbookError> {
        let item = self
            .cache
            .find_by_name(&self.db, new_item_name)
            .await?
            .ok_or_else(|| GearbookError::NotFound {
                what: "item",
                name: new_item_name.to_string(),
            })?;

        let outcome =
            bookings::change_item(&self.db, booking_id, item.id, new_status, expected_version)
                .await?;
        match outcome {
            ChangeItemOutcome::Changed(booking) => {
                info!(booking_id, item = %booking.item_name, "booking moved to another item");
                self.nudge_worker();
                Ok(booking)
            }
            ChangeItemOutcome::NotFound => Err(not_found_booking(booking_id)),
            ChangeItemOutcome::ItemMissing => Err(GearbookError::NotFound {
                what: "item",
                name: new_item_name.to_string(),
            }),
            ChangeItemOutcome::StaleVersion { .. } => Err(GearbookError::ConcurrentModification),
            ChangeItemOutcome::NoCapacity { .. } => {
                let date = match bookings::get(&self.db, booking_id).await? {
                    Some(b) => b.date,
                    None => String::new(),
                };
                Err(GearbookError::ItemNotAvailable {
                    item: item.name,
                    date,
                })
            }
            ChangeItemOutcome::AlreadyTerminal { status } => {
                Err(GearbookError::AlreadyFinalized(status.to_string()))
            }
        }
    }

    /// Owner-initiated cancellation of a day booking.
    ///
    /// Distinct rejections: `NotFound`, `PermissionDenied` (not the owner),
    /// `TooLate` (the day already started), `AlreadyFinalized`.
    pub async fn cancel_as_user(
        &self,
        booking_id: i64,
        user_id: i64,
    ) -> Result<DayBooking, GearbookError> {
        let today = self.clock.today().format("%Y-%m-%d").to_string();
        let outcome = bookings::cancel_owned(&self.db, booking_id, user_id, &today).await?;
        match outcome {
            CancelOutcome::Canceled(booking) => {
                info!(booking_id, user_id, "booking canceled by owner");
                self.nudge_worker();
                Ok(booking)
            }
            CancelOutcome::NotFound => Err(not_found_booking(booking_id)),
            CancelOutcome::NotOwner => Err(GearbookError::PermissionDenied(
                "not the booking owner".to_string(),
            )),
            CancelOutcome::TooLate => Err(GearbookError::TooLate),
            CancelOutcome::AlreadyFinalized { status } => {
                Err(GearbookError::AlreadyFinalized(status.to_string()))
            }
        }
    }

    /// Transition an hour booking's status. Same role rules as day bookings;
    /// hour bookings carry no version column, so there is no optimistic lock.
    pub async fn change_hour_status(
        &self,
        booking_id: i64,
        new_status: BookingStatus,
        actor: Actor,
    ) -> Result<HourBooking, GearbookError> {
        match actor.role {
            ActorRole::User => {
                if new_status != BookingStatus::Canceled {
                    return Err(GearbookError::PermissionDenied(
                        "manager role required for this status".to_string(),
                    ));
                }
                self.cancel_hour_as_user(booking_id, actor.id).await
            }
            ActorRole::Manager => {
                let outcome = hourly::change_status(&self.db, booking_id, new_status).await?;
                match outcome {
                    HourStatusOutcome::Updated(booking) => {
                        info!(booking_id, status = %new_status, "hour booking status changed");
                        self.nudge_worker();
                        Ok(booking)
                    }
                    HourStatusOutcome::NotFound => Err(not_found_booking(booking_id)),
                    HourStatusOutcome::AlreadyTerminal { status } => {
                        Err(GearbookError::AlreadyFinalized(status.to_string()))
                    }
                }
            }
        }
    }

    /// Owner-initiated cancellation of an hour booking. Cancellation closes
    /// at the interval's start minute.
    pub async fn cancel_hour_as_user(
        &self,
        booking_id: i64,
        user_id: i64,
    ) -> Result<HourBooking, GearbookError> {
        let now = self.clock.now().format("%Y-%m-%dT%H:%M").to_string();
        let outcome = hourly::cancel_owned(&self.db, booking_id, user_id, &now).await?;
        match outcome {
            HourCancelOutcome::Canceled(booking) => {
                info!(booking_id, user_id, "hour booking canceled by owner");
                self.nudge_worker();
                Ok(booking)
            }
            HourCancelOutcome::NotFound => Err(not_found_booking(booking_id)),
            HourCancelOutcome::NotOwner => Err(GearbookError::PermissionDenied(
                "not the booking owner".to_string(),
            )),
            HourCancelOutcome::TooLate => Err(GearbookError::TooLate),
            HourCancelOutcome::AlreadyFinalized { status } => {
                Err(GearbookError::AlreadyFinalized(status.to_string()))
            }
        }
    }

    /// Slot list for a cabinet on a date. An unknown or inactive cabinet is
    /// `NotFound`; a date without a schedule window yields an empty list.
    pub async fn available_slots(
        &self,
        cabinet_name: &str,
        date: &str,
    ) -> Result<Vec<Slot>, GearbookError> {
        let date = parse_date(date)?;
        let cabinet = catalog::find_cabinet_by_name(&self.db, cabinet_name)
            .await?
            .filter(|c| c.active)
            .ok_or_else(|| GearbookError::NotFound {
                what: "cabinet",
                name: cabinet_name.to_string(),
            })?;
        slots::slots_for_date(&self.db, cabinet.id, date).await
    }

    /// Enqueue a schedule re-render for the sheet mirror.
    pub async fn request_schedule_sync(&self, range: &ScheduleRange) -> Result<i64, GearbookError> {
        let payload = serde_json::to_string(range)
            .map_err(|e| GearbookError::Internal(format!("encode schedule range: {e}")))?;
        let id = sync_queue::enqueue(&self.db, SyncTaskType::SyncSchedule, None, &payload).await?;
        self.nudge_worker();
        Ok(id)
    }

    async fn check_user_cap(&self, user_id: i64) -> Result<(), GearbookError> {
        if self.policy.max_active_per_user.is_none() {
            return Ok(());
        }
        let day = bookings::active_count_for_user(&self.db, user_id).await?;
        let hour = hourly::active_count_for_user(&self.db, user_id).await?;
        self.policy.check_user_cap(day + hour)
    }

    async fn check_item_capacity(&self, item_name: &str, date: &str) -> Result<(), GearbookError> {
        let not_available = || GearbookError::ItemNotAvailable {
            item: item_name.to_string(),
            date: date.to_string(),
        };
        let item = self
            .cache
            .find_by_name(&self.db, item_name)
            .await?
            .ok_or_else(not_available)?;
        let booked = bookings::booked_count(&self.db, item.id, date).await?;
        if booked >= item.total_quantity {
            return Err(not_available());
        }
        Ok(())
    }

    /// Wake the sync worker without waiting for its poll interval. A full
    /// channel already holds a wakeup, so the send result is ignored.
    fn nudge_worker(&self) {
        if let Some(tx) = &self.hint_tx {
            let _ = tx.try_send(());
        }
    }
}

fn not_found_booking(booking_id: i64) -> GearbookError {
    GearbookError::NotFound {
        what: "booking",
        name: booking_id.to_string(),
    }
}

/// The interval must match the slot width, sit inside the window, and start
/// on the slot grid.
fn check_alignment(
    window: &ScheduleWindow,
    from: NaiveTime,
    to: NaiveTime,
) -> Result<(), GearbookError> {
    if window.slot_minutes <= 0 {
        return Err(GearbookError::SlotMisaligned(
            "schedule has no usable slot width".to_string(),
        ));
    }
    if (to - from).num_minutes() != window.slot_minutes {
        return Err(GearbookError::SlotMisaligned(format!(
            "interval must be exactly {} minutes",
            window.slot_minutes
        )));
    }
    if from < window.start || to > window.end {
        return Err(GearbookError::SlotMisaligned(
            "interval is outside the schedule window".to_string(),
        ));
    }
    if (from - window.start).num_minutes() % window.slot_minutes != 0 {
        return Err(GearbookError::SlotMisaligned(
            "interval does not start on the slot grid".to_string(),
        ));
    }
    Ok(())
}
