//! Google Calendar API client: calendar list, windowed event fetch, and
//! sync-token incremental fetch.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::error::GoogleError;

const API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const PAGE_SIZE: u32 = 250;

/// A calendar from the provider's calendar list
#[derive(Debug, Clone)]
pub struct ProviderCalendar {
    pub external_id: String,
    pub name: String,
    pub color: Option<String>,
    pub is_primary: bool,
}

/// A normalized event from the provider
#[derive(Debug, Clone)]
pub struct ProviderEvent {
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_all_day: bool,
    pub attendees: Vec<String>,
    pub organizer_email: Option<String>,
    pub is_recurring: bool,
    /// The authenticated user's own response status
    pub response_status: Option<String>,
    pub transparency: Option<String>,
}

/// One full fetch result: upserts, provider-side deletions, and the token
/// for the next incremental fetch.
#[derive(Debug, Clone, Default)]
pub struct EventsPage {
    pub events: Vec<ProviderEvent>,
    pub cancelled_ids: Vec<String>,
    pub next_sync_token: Option<String>,
}

/// Authenticated client; one instance per (user, access token)
pub struct GoogleCalendarClient {
    client: Client,
    access_token: String,
}

impl GoogleCalendarClient {
    pub fn new(access_token: String) -> Self {
        Self {
            client: Client::new(),
            access_token,
        }
    }

    /// All calendars visible to the account
    pub async fn list_calendars(&self) -> Result<Vec<ProviderCalendar>, GoogleError> {
        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!("{}/users/me/calendarList?maxResults={}", API_BASE, PAGE_SIZE);
            if let Some(token) = &page_token {
                url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
            }

            let page: CalendarListResponse = self.get(&url).await?;
            for item in page.items {
                calendars.push(ProviderCalendar {
                    external_id: item.id,
                    name: item.summary.unwrap_or_default(),
                    color: item.background_color,
                    is_primary: item.primary.unwrap_or(false),
                });
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(calendars)
    }

    /// Fetch every event instance in `[start, end)` for one calendar.
    ///
    /// Recurring events are expanded to single instances. The response's
    /// sync token (valid for subsequent incremental fetches of the same
    /// calendar) is returned alongside the events.
    pub async fn list_events_window(
        &self,
        calendar_external_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<EventsPage, GoogleError> {
        let time_min = Utc
            .from_utc_datetime(&start.and_hms_opt(0, 0, 0).expect("valid midnight"))
            .to_rfc3339();
        let time_max = Utc
            .from_utc_datetime(&end.and_hms_opt(23, 59, 59).expect("valid day end"))
            .to_rfc3339();

        let base = format!(
            "{}/calendars/{}/events?singleEvents=true&maxResults={}&timeMin={}&timeMax={}",
            API_BASE,
            urlencoding::encode(calendar_external_id),
            PAGE_SIZE,
            urlencoding::encode(&time_min),
            urlencoding::encode(&time_max),
        );

        self.fetch_all_pages(&base).await
    }

    /// Incremental fetch using a sync token from a previous response.
    ///
    /// Returns `SyncTokenInvalid` when the provider has expired the token
    /// (HTTP 410); callers fall back to a full window fetch.
    pub async fn list_events_incremental(
        &self,
        calendar_external_id: &str,
        sync_token: &str,
    ) -> Result<EventsPage, GoogleError> {
        let base = format!(
            "{}/calendars/{}/events?maxResults={}&syncToken={}",
            API_BASE,
            urlencoding::encode(calendar_external_id),
            PAGE_SIZE,
            urlencoding::encode(sync_token),
        );

        self.fetch_all_pages(&base).await
    }

    async fn fetch_all_pages(&self, base_url: &str) -> Result<EventsPage, GoogleError> {
        let mut result = EventsPage::default();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = base_url.to_string();
            if let Some(token) = &page_token {
                url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
            }

            let page: EventsResponse = self.get(&url).await?;

            for raw in page.items {
                if raw.status.as_deref() == Some("cancelled") {
                    result.cancelled_ids.push(raw.id);
                    continue;
                }
                if let Some(event) = convert_event(raw) {
                    result.events.push(event);
                }
            }

            if let Some(token) = page.next_sync_token {
                result.next_sync_token = Some(token);
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(result)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, GoogleError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GoogleError::from_status(status, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GoogleError::Parse(e.to_string()))
    }
}

fn convert_event(raw: RawEvent) -> Option<ProviderEvent> {
    let (start, end, is_all_day) = match (raw.start, raw.end) {
        (Some(start), Some(end)) => {
            let all_day = start.date.is_some();
            let start_ts = start.resolve()?;
            let end_ts = end.resolve()?;
            (start_ts, end_ts, all_day)
        }
        _ => return None,
    };

    let attendees: Vec<String> = raw
        .attendees
        .iter()
        .filter_map(|a| a.email.clone())
        .collect();

    // The calendar owner's own response lives on the self attendee
    let response_status = raw
        .attendees
        .iter()
        .find(|a| a.is_self.unwrap_or(false))
        .and_then(|a| a.response_status.clone());

    Some(ProviderEvent {
        external_id: raw.id,
        title: raw.summary.unwrap_or_default(),
        description: raw.description,
        start,
        end,
        is_all_day,
        attendees,
        organizer_email: raw.organizer.and_then(|o| o.email),
        is_recurring: raw.recurring_event_id.is_some() || raw.recurrence.is_some(),
        response_status,
        transparency: raw.transparency,
    })
}

// Response types for the Calendar API

#[derive(Debug, Deserialize)]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<CalendarListEntry>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CalendarListEntry {
    id: String,
    summary: Option<String>,
    #[serde(rename = "backgroundColor")]
    background_color: Option<String>,
    primary: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    items: Vec<RawEvent>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
    #[serde(rename = "nextSyncToken")]
    next_sync_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    status: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    start: Option<RawEventTime>,
    end: Option<RawEventTime>,
    #[serde(default)]
    attendees: Vec<RawAttendee>,
    organizer: Option<RawOrganizer>,
    #[serde(rename = "recurringEventId")]
    recurring_event_id: Option<String>,
    recurrence: Option<Vec<String>>,
    transparency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEventTime {
    /// Set for all-day events (YYYY-MM-DD)
    date: Option<NaiveDate>,
    #[serde(rename = "dateTime")]
    date_time: Option<DateTime<Utc>>,
}

impl RawEventTime {
    fn resolve(&self) -> Option<DateTime<Utc>> {
        if let Some(ts) = self.date_time {
            return Some(ts);
        }
        self.date
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
    }
}

#[derive(Debug, Deserialize)]
struct RawAttendee {
    email: Option<String>,
    #[serde(rename = "responseStatus")]
    response_status: Option<String>,
    #[serde(rename = "self")]
    is_self: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawOrganizer {
    email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_timed_event() {
        let raw: RawEvent = serde_json::from_value(serde_json::json!({
            "id": "evt-1",
            "status": "confirmed",
            "summary": "Weekly Sync",
            "start": {"dateTime": "2024-01-15T09:00:00Z"},
            "end": {"dateTime": "2024-01-15T09:30:00Z"},
            "attendees": [
                {"email": "alice@acme.com", "responseStatus": "accepted", "self": true},
                {"email": "bob@acme.com", "responseStatus": "needsAction"}
            ],
            "organizer": {"email": "bob@acme.com"},
            "transparency": "opaque"
        }))
        .unwrap();

        let event = convert_event(raw).unwrap();
        assert_eq!(event.external_id, "evt-1");
        assert_eq!(event.title, "Weekly Sync");
        assert!(!event.is_all_day);
        assert_eq!(event.attendees.len(), 2);
        assert_eq!(event.response_status.as_deref(), Some("accepted"));
        assert_eq!(event.organizer_email.as_deref(), Some("bob@acme.com"));
        assert!(!event.is_recurring);
    }

    #[test]
    fn test_convert_all_day_event() {
        let raw: RawEvent = serde_json::from_value(serde_json::json!({
            "id": "evt-2",
            "summary": "Conference",
            "start": {"date": "2024-01-15"},
            "end": {"date": "2024-01-16"}
        }))
        .unwrap();

        let event = convert_event(raw).unwrap();
        assert!(event.is_all_day);
        assert_eq!(event.start.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_convert_recurring_instance() {
        let raw: RawEvent = serde_json::from_value(serde_json::json!({
            "id": "evt-3_20240115",
            "summary": "Standup",
            "start": {"dateTime": "2024-01-15T09:00:00Z"},
            "end": {"dateTime": "2024-01-15T09:15:00Z"},
            "recurringEventId": "evt-3"
        }))
        .unwrap();

        let event = convert_event(raw).unwrap();
        assert!(event.is_recurring);
    }

    #[test]
    fn test_event_without_times_is_dropped() {
        let raw: RawEvent = serde_json::from_value(serde_json::json!({
            "id": "evt-4",
            "summary": "Broken"
        }))
        .unwrap();

        assert!(convert_event(raw).is_none());
    }
}
