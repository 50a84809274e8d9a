// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for a values-API spreadsheet backend.
//!
//! Speaks the values surface of the sheet service: `GET values/{range}`,
//! `PUT values/{range}`, `POST values/{range}:append`, and
//! `POST values/{range}:clear`. Booking rows occupy columns A..J of the
//! bookings tab: A id, B user id, C item id, D date, E status, F user name,
//! G user phone, H item name, I created_at, J updated_at.
//!
//! Deleting a booking clears its cells rather than dropping the sheet row:
//! removing a row would shift every row below it and invalidate the cached
//! row numbers.

use std::time::Duration;

use async_trait::async_trait;
use gearbook_core::GearbookError;
use gearbook_core::types::{BookingStatus, ScheduleRange};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::rows::RowCache;
use crate::writer::{BookingRow, SCHEDULE_HEADER, ScheduleRow, SheetWriter};

/// Request and response body of the values API: a block of cell rows.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct AppendResponse {
    #[serde(default)]
    updates: AppendUpdates,
}

#[derive(Debug, Default, Deserialize)]
struct AppendUpdates {
    #[serde(default, rename = "updatedRange")]
    updated_range: String,
}

/// [`SheetWriter`] backed by a remote values-API spreadsheet.
///
/// Transient responses (429, 500, 503) are retried once after a short pause.
/// Durable retry with backoff belongs to the sync queue, not this client.
pub struct HttpSheetClient {
    client: reqwest::Client,
    base_url: String,
    bookings_sheet: String,
    schedule_sheet: String,
    max_retries: u32,
    rows: RowCache,
}

impl HttpSheetClient {
    /// Creates a client for the values API rooted at `base_url`
    /// (including the spreadsheet id).
    pub fn new(
        base_url: String,
        api_token: Option<String>,
        bookings_sheet: String,
        schedule_sheet: String,
        timeout: Duration,
        row_cache_refresh: Duration,
    ) -> Result<Self, GearbookError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = api_token {
            headers.insert(
                "authorization",
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|e| GearbookError::Config(format!("invalid sheets API token: {e}")))?,
            );
        }
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| GearbookError::Sheet {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bookings_sheet,
            schedule_sheet,
            max_retries: 1,
            rows: RowCache::new(row_cache_refresh),
        })
    }

    /// Sends a request, retrying transient failures after a 1-second delay.
    async fn send_with_retry(
        &self,
        req: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<reqwest::Response, GearbookError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, what, "retrying sheet request after transient error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let request = req.try_clone().ok_or_else(|| GearbookError::Sheet {
                message: format!("{what}: request body not replayable"),
                source: None,
            })?;

            let response = request.send().await.map_err(|e| GearbookError::Sheet {
                message: format!("{what}: HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

            let status = response.status();
            debug!(status = %status, attempt, what, "sheet response received");

            if status.is_success() {
                return Ok(response);
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %body, what, "transient sheet error, will retry");
                last_error = Some(GearbookError::Sheet {
                    message: format!("{what}: sheet API returned {status}: {body}"),
                    source: None,
                });
                continue;
            }

            return Err(GearbookError::Sheet {
                message: format!("{what}: sheet API returned {status}: {body}"),
                source: None,
            });
        }

        Err(last_error.unwrap_or_else(|| GearbookError::Sheet {
            message: format!("{what}: request failed after retries"),
            source: None,
        }))
    }

    /// Rebuilds the row cache from a full scan of column A.
    async fn scan_rows(&self) -> Result<(), GearbookError> {
        let url = format!("{}/values/{}!A:A", self.base_url, self.bookings_sheet);
        let response = self.send_with_retry(self.client.get(&url), "scan").await?;
        let body: ValueRange = response.json().await.map_err(|e| GearbookError::Sheet {
            message: format!("failed to parse column scan response: {e}"),
            source: Some(Box::new(e)),
        })?;

        let mut pairs = Vec::new();
        for (i, row) in body.values.iter().enumerate() {
            // Sheet rows are 1-based; non-numeric cells (header, blanks) are skipped.
            if let Some(cell) = row.first()
                && let Ok(id) = cell.trim().parse::<i64>()
            {
                pairs.push((id, (i + 1) as u32));
            }
        }
        debug!(rows = pairs.len(), "row cache rebuilt from column scan");
        self.rows.replace_all(pairs).await;
        Ok(())
    }

    /// Resolves the sheet row for a booking, rescanning on staleness or miss.
    async fn resolve_row(&self, booking_id: i64) -> Result<Option<u32>, GearbookError> {
        let scanned = if self.rows.is_stale().await {
            self.scan_rows().await?;
            true
        } else {
            false
        };

        if let Some(row) = self.rows.get(booking_id).await {
            return Ok(Some(row));
        }
        if scanned {
            return Ok(None);
        }

        // Miss against a warm cache: the sheet may have changed out-of-band,
        // so one forced rescan before concluding the row is absent.
        self.scan_rows().await?;
        Ok(self.rows.get(booking_id).await)
    }
}

#[async_trait]
impl SheetWriter for HttpSheetClient {
    async fn upsert_row(&self, row: &BookingRow) -> Result<(), GearbookError> {
        let payload = ValueRange {
            values: vec![row.to_cells()],
        };

        match self.resolve_row(row.id).await? {
            Some(n) => {
                let url = format!(
                    "{}/values/{}!A{}:J{}",
                    self.base_url, self.bookings_sheet, n, n
                );
                self.send_with_retry(self.client.put(&url).json(&payload), "upsert")
                    .await?;
                debug!(booking_id = row.id, row = n, "sheet row overwritten");
            }
            None => {
                let url = format!(
                    "{}/values/{}!A:J:append",
                    self.base_url, self.bookings_sheet
                );
                let response = self
                    .send_with_retry(self.client.post(&url).json(&payload), "append")
                    .await?;
                let body: AppendResponse =
                    response.json().await.map_err(|e| GearbookError::Sheet {
                        message: format!("failed to parse append response: {e}"),
                        source: Some(Box::new(e)),
                    })?;
                if let Some(n) = parse_first_row(&body.updates.updated_range) {
                    self.rows.insert(row.id, n).await;
                }
                debug!(booking_id = row.id, "sheet row appended");
            }
        }
        Ok(())
    }

    async fn delete_row(&self, booking_id: i64) -> Result<(), GearbookError> {
        let Some(n) = self.resolve_row(booking_id).await? else {
            debug!(booking_id, "sheet row already absent");
            return Ok(());
        };

        let url = format!(
            "{}/values/{}!A{}:J{}:clear",
            self.base_url, self.bookings_sheet, n, n
        );
        self.send_with_retry(self.client.post(&url), "clear").await?;
        self.rows.remove(booking_id).await;
        debug!(booking_id, row = n, "sheet row cleared");
        Ok(())
    }

    async fn update_status(
        &self,
        booking_id: i64,
        status: BookingStatus,
        updated_at: &str,
    ) -> Result<(), GearbookError> {
        let Some(n) = self.resolve_row(booking_id).await? else {
            // The row may not exist yet if its upsert is still queued; fail
            // so the task retries once the row has landed.
            return Err(GearbookError::Sheet {
                message: format!("no sheet row for booking {booking_id}"),
                source: None,
            });
        };

        let url = format!("{}/values/{}!E{}", self.base_url, self.bookings_sheet, n);
        let payload = ValueRange {
            values: vec![vec![status.to_string()]],
        };
        self.send_with_retry(self.client.put(&url).json(&payload), "status cell")
            .await?;

        let url = format!("{}/values/{}!J{}", self.base_url, self.bookings_sheet, n);
        let payload = ValueRange {
            values: vec![vec![updated_at.to_string()]],
        };
        self.send_with_retry(self.client.put(&url).json(&payload), "updated cell")
            .await?;

        debug!(booking_id, row = n, status = %status, "sheet status patched");
        Ok(())
    }

    async fn write_schedule(
        &self,
        rows: &[ScheduleRow],
        range: &ScheduleRange,
    ) -> Result<(), GearbookError> {
        let url = format!(
            "{}/values/{}!A:F:clear",
            self.base_url, self.schedule_sheet
        );
        self.send_with_retry(self.client.post(&url), "schedule clear")
            .await?;

        let mut values = Vec::with_capacity(rows.len() + 1);
        values.push(SCHEDULE_HEADER.iter().map(|s| s.to_string()).collect());
        for row in rows {
            values.push(row.to_cells());
        }

        let url = format!("{}/values/{}!A1", self.base_url, self.schedule_sheet);
        let payload = ValueRange { values };
        self.send_with_retry(self.client.put(&url).json(&payload), "schedule write")
            .await?;

        debug!(
            rows = rows.len(),
            from = range.from.as_deref().unwrap_or("-"),
            to = range.to.as_deref().unwrap_or("-"),
            "schedule view rewritten"
        );
        Ok(())
    }

    async fn ping(&self) -> Result<(), GearbookError> {
        let url = format!("{}/values/{}!A1", self.base_url, self.bookings_sheet);
        self.send_with_retry(self.client.get(&url), "ping").await?;
        Ok(())
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503)
}

/// Extracts the first row number from a range like `Bookings!A7:J7`.
fn parse_first_row(range: &str) -> Option<u32> {
    let cell = range.rsplit('!').next()?;
    let first = cell.split(':').next()?;
    let digits: String = first.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gearbook_core::types::{BookingSnapshot, DayBooking};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> HttpSheetClient {
        HttpSheetClient::new(
            base_url.to_string(),
            Some("test-token".into()),
            "Bookings".into(),
            "Schedule".into(),
            Duration::from_secs(5),
            Duration::from_secs(300),
        )
        .unwrap()
    }

    fn day_row(id: i64) -> BookingRow {
        BookingRow::from_snapshot(&BookingSnapshot::Day(DayBooking {
            id,
            user_id: 100,
            item_id: 3,
            item_name: "camera".into(),
            date: "2025-12-01".into(),
            status: BookingStatus::Pending,
            comment: None,
            version: 1,
            user_name: Some("Ada".into()),
            user_phone: Some("+15551234567".into()),
            created_at: "2025-11-20T09:00:00Z".into(),
            updated_at: "2025-11-20T09:00:00Z".into(),
        }))
    }

    async fn mount_scan(server: &MockServer, ids: &[&str]) {
        let mut values = vec![vec!["id".to_string()]];
        for id in ids {
            values.push(vec![id.to_string()]);
        }
        Mock::given(method("GET"))
            .and(path("/values/Bookings!A:A"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "range": "Bookings!A:A",
                "values": values,
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn upsert_appends_new_row_then_overwrites_it() {
        let server = MockServer::start().await;
        mount_scan(&server, &[]).await;

        Mock::given(method("POST"))
            .and(path("/values/Bookings!A:J:append"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "updates": {"updatedRange": "Bookings!A2:J2"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/values/Bookings!A2:J2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let row = day_row(7);
        // First call scans, misses, and appends; the append response seeds
        // the cache so the second call overwrites in place.
        client.upsert_row(&row).await.unwrap();
        client.upsert_row(&row).await.unwrap();
    }

    #[tokio::test]
    async fn upsert_overwrites_row_found_by_scan() {
        let server = MockServer::start().await;
        mount_scan(&server, &["41", "42"]).await;

        let expected_cells = serde_json::json!({
            "values": [[
                "42", "100", "3", "2025-12-01", "pending", "Ada",
                "+15551234567", "camera", "2025-11-20T09:00:00Z",
                "2025-11-20T09:00:00Z"
            ]]
        });
        Mock::given(method("PUT"))
            .and(path("/values/Bookings!A3:J3"))
            .and(body_json(&expected_cells))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        client.upsert_row(&day_row(42)).await.unwrap();
    }

    #[tokio::test]
    async fn delete_clears_existing_row() {
        let server = MockServer::start().await;
        mount_scan(&server, &["41"]).await;

        Mock::given(method("POST"))
            .and(path("/values/Bookings!A2:J2:clear"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        client.delete_row(41).await.unwrap();
    }

    #[tokio::test]
    async fn delete_of_missing_row_succeeds_without_clear() {
        let server = MockServer::start().await;
        mount_scan(&server, &["41"]).await;

        // No clear mock mounted: a clear attempt would 404 and fail the call.
        let client = test_client(&server.uri());
        client.delete_row(999).await.unwrap();
    }

    #[tokio::test]
    async fn update_status_patches_both_cells() {
        let server = MockServer::start().await;
        mount_scan(&server, &["41", "42"]).await;

        Mock::given(method("PUT"))
            .and(path("/values/Bookings!E3"))
            .and(body_json(serde_json::json!({"values": [["confirmed"]]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/values/Bookings!J3"))
            .and(body_json(
                serde_json::json!({"values": [["2025-11-21T10:00:00Z"]]}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        client
            .update_status(42, BookingStatus::Confirmed, "2025-11-21T10:00:00Z")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn update_status_of_missing_row_fails() {
        let server = MockServer::start().await;
        mount_scan(&server, &["41"]).await;

        let client = test_client(&server.uri());
        let err = client
            .update_status(999, BookingStatus::Confirmed, "2025-11-21T10:00:00Z")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no sheet row"), "got: {err}");
    }

    #[tokio::test]
    async fn write_schedule_clears_then_rewrites_the_tab() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/values/Schedule!A:F:clear"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;
        let expected = serde_json::json!({
            "values": [
                ["date", "cabinet", "status", "start", "end", "slot minutes"],
                ["2025-12-01", "Main hall", "open", "09:00", "18:00", "60"],
                ["2025-12-02", "Main hall", "closed", "", "", ""],
            ]
        });
        Mock::given(method("PUT"))
            .and(path("/values/Schedule!A1"))
            .and(body_json(&expected))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let rows = vec![
            ScheduleRow {
                date: "2025-12-01".into(),
                cabinet: "Main hall".into(),
                closed: false,
                start_time: Some("09:00".into()),
                end_time: Some("18:00".into()),
                slot_minutes: Some(60),
            },
            ScheduleRow {
                date: "2025-12-02".into(),
                cabinet: "Main hall".into(),
                closed: true,
                start_time: None,
                end_time: None,
                slot_minutes: None,
            },
        ];

        let client = test_client(&server.uri());
        client
            .write_schedule(&rows, &ScheduleRange::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn ping_retries_on_transient_error() {
        let server = MockServer::start().await;

        // First request returns 503, second returns 200.
        Mock::given(method("GET"))
            .and(path("/values/Bookings!A1"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/values/Bookings!A1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        client.ping().await.unwrap();
    }

    #[tokio::test]
    async fn ping_fails_on_non_transient_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/values/Bookings!A1"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such sheet"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.ping().await.unwrap_err();
        assert!(err.to_string().contains("404"), "got: {err}");
    }

    #[tokio::test]
    async fn client_sends_bearer_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/values/Bookings!A1"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let result = client.ping().await;
        assert!(result.is_ok(), "auth header should match: {result:?}");
    }

    #[test]
    fn parse_first_row_handles_ranges_and_cells() {
        assert_eq!(parse_first_row("Bookings!A7:J7"), Some(7));
        assert_eq!(parse_first_row("Bookings!A12"), Some(12));
        assert_eq!(parse_first_row("My Tab!A3:J3"), Some(3));
        assert_eq!(parse_first_row("Bookings!A:J"), None);
        assert_eq!(parse_first_row(""), None);
    }
}
