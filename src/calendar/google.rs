// Google Calendar REST client
// Events list/insert/update/delete and the calendar list, over bearer auth

use super::{RemoteCalendarProvider, RemoteEventWriter};
use crate::error::{AppError, AppResult};
use crate::http_config::HttpConfig;
use crate::models::{CalendarListEntry, OutgoingEvent, RemoteEvent, RemoteEventTime, TimeWindow};
use crate::utils::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, GOOGLE_CALENDAR};
use crate::utils::logging;
use crate::utils::retry::{retry_with_exponential_backoff, RetryConfig};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use url::Url;

pub const GOOGLE_CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";

/// Google's ceiling for `maxResults` on events.list.
const DEFAULT_PAGE_SIZE: u32 = 2500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventsPage {
    #[serde(default)]
    items: Vec<GoogleEvent>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEvent {
    id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    start: Option<GoogleEventTime>,
    end: Option<GoogleEventTime>,
    updated: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
}

#[derive(Debug, Serialize)]
struct GoogleEventBody<'a> {
    summary: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    start: GoogleEventTime,
    end: GoogleEventTime,
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleCalendarListPage {
    #[serde(default)]
    items: Vec<GoogleCalendarListItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleCalendarListItem {
    id: Option<String>,
    summary: Option<String>,
}

impl From<GoogleEventTime> for RemoteEventTime {
    fn from(time: GoogleEventTime) -> Self {
        RemoteEventTime {
            date_time: time.date_time,
            date: time.date,
        }
    }
}

impl From<GoogleEvent> for RemoteEvent {
    fn from(event: GoogleEvent) -> Self {
        RemoteEvent {
            external_id: event.id,
            title: event.summary,
            description: event.description,
            start: event.start.map(Into::into),
            end: event.end.map(Into::into),
            // An unparseable stamp counts as absent and never wins a tie-break.
            last_modified: event
                .updated
                .as_deref()
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

impl<'a> From<&'a OutgoingEvent> for GoogleEventBody<'a> {
    fn from(event: &'a OutgoingEvent) -> Self {
        let at = |dt: DateTime<Utc>| GoogleEventTime {
            date_time: Some(dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
            date: None,
        };
        GoogleEventBody {
            summary: &event.title,
            description: event.description.as_deref(),
            start: at(event.start),
            end: at(event.end),
        }
    }
}

pub struct GoogleCalendarClient {
    http: Client,
    base_url: Url,
    access_token: String,
    page_size: u32,
    retry: RetryConfig,
    breaker: Arc<CircuitBreaker>,
}

impl GoogleCalendarClient {
    /// The breaker starts private to this client; use `with_circuit_breaker`
    /// to share the process-wide one.
    pub fn new(access_token: &str, http_config: &HttpConfig) -> AppResult<Self> {
        Ok(Self {
            http: http_config.build_client()?,
            base_url: Url::parse(GOOGLE_CALENDAR_API)
                .map_err(|e| AppError::config(format!("Invalid Google API url: {}", e)))?,
            access_token: access_token.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            retry: http_config.to_retry_config(),
            breaker: Arc::new(CircuitBreaker::new(
                GOOGLE_CALENDAR,
                CircuitBreakerConfig::default(),
            )),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> AppResult<Self> {
        self.base_url = Url::parse(base_url)
            .map_err(|e| AppError::config(format!("Invalid base url {}: {}", base_url, e)))?;
        Ok(self)
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, DEFAULT_PAGE_SIZE);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = breaker;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::config("Google API url cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.access_token)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        query: &[(&str, String)],
    ) -> AppResult<T> {
        let response = self
            .authorized(self.http.get(url.clone()))
            .query(query)
            .send()
            .await
            .map_err(|e| {
                logging::log_network_error(&format!("GET {}", url.path()), &e);
                e
            })?;
        Ok(check_status(response).await?.json().await?)
    }

    /// Every event in `window`, following `nextPageToken` until exhausted.
    pub async fn list_events(
        &self,
        calendar_id: &str,
        window: &TimeWindow,
    ) -> AppResult<Vec<RemoteEvent>> {
        let url = self.endpoint(&["calendars", calendar_id, "events"])?;
        let started = Instant::now();
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("maxResults", self.page_size.to_string()),
                ("timeMin", rfc3339(window.start)),
            ];
            if let Some(end) = window.end {
                query.push(("timeMax", rfc3339(end)));
            }
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let page: GoogleEventsPage =
                retry_with_exponential_backoff(&self.retry, || self.get_json(&url, &query))
                    .await?;
            debug!(
                "Fetched page of {} events from calendar {}",
                page.items.len(),
                calendar_id
            );
            events.extend(page.items.into_iter().map(RemoteEvent::from));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        info!(
            "Listed {} events from calendar {} in {}ms",
            events.len(),
            calendar_id,
            started.elapsed().as_millis()
        );
        Ok(events)
    }

    /// Calendars visible to the token. Entries without an id or summary are dropped.
    pub async fn list_calendars(&self) -> AppResult<Vec<CalendarListEntry>> {
        let url = self.endpoint(&["users", "me", "calendarList"])?;
        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let query: Vec<(&str, String)> = page_token
                .iter()
                .map(|token| ("pageToken", token.clone()))
                .collect();
            let page: GoogleCalendarListPage =
                retry_with_exponential_backoff(&self.retry, || self.get_json(&url, &query))
                    .await?;

            calendars.extend(page.items.into_iter().filter_map(|item| {
                Some(CalendarListEntry {
                    id: item.id?,
                    summary: item.summary?,
                })
            }));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(calendars)
    }

    pub async fn insert_event(&self, calendar_id: &str, event: &OutgoingEvent) -> AppResult<String> {
        let url = self.endpoint(&["calendars", calendar_id, "events"])?;
        let response = self
            .authorized(self.http.post(url))
            .json(&GoogleEventBody::from(event))
            .send()
            .await?;
        let created: CreatedEvent = check_status(response).await?.json().await?;
        Ok(created.id)
    }

    pub async fn update_event(
        &self,
        calendar_id: &str,
        external_id: &str,
        event: &OutgoingEvent,
    ) -> AppResult<()> {
        let url = self.endpoint(&["calendars", calendar_id, "events", external_id])?;
        let response = self
            .authorized(self.http.put(url))
            .json(&GoogleEventBody::from(event))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    pub async fn delete_event(&self, calendar_id: &str, external_id: &str) -> AppResult<()> {
        let url = self.endpoint(&["calendars", calendar_id, "events", external_id])?;
        let response = self.authorized(self.http.delete(url)).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

async fn check_status(response: Response) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status.as_u16() == 401 || status.as_u16() == 403 {
        logging::log_auth_event("Google Calendar request rejected", status.as_str());
        return Err(AppError::auth(format!("HTTP {}: {}", status, body)));
    }
    Err(AppError::calendar(format!("HTTP {}: {}", status, body)))
}

#[async_trait]
impl RemoteCalendarProvider for GoogleCalendarClient {
    async fn fetch_events(
        &self,
        calendar_id: &str,
        window: &TimeWindow,
    ) -> anyhow::Result<Vec<RemoteEvent>> {
        let events = self
            .breaker
            .execute(|| self.list_events(calendar_id, window))
            .await?;
        Ok(events)
    }
}

#[async_trait]
impl RemoteEventWriter for GoogleCalendarClient {
    async fn insert_remote_event(
        &self,
        calendar_id: &str,
        event: &OutgoingEvent,
    ) -> anyhow::Result<String> {
        Ok(self.insert_event(calendar_id, event).await?)
    }

    async fn update_remote_event(
        &self,
        calendar_id: &str,
        external_id: &str,
        event: &OutgoingEvent,
    ) -> anyhow::Result<()> {
        Ok(self.update_event(calendar_id, external_id, event).await?)
    }

    async fn delete_remote_event(&self, calendar_id: &str, external_id: &str) -> anyhow::Result<()> {
        Ok(self.delete_event(calendar_id, external_id).await?)
    }
}
