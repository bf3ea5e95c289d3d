//! Provider access through the web app's calendar API routes.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CACHE_CONTROL, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::date_range::DateRange;
use crate::error::{CalendarError, CalendarResult};
use crate::event::CalendarEvent;
use crate::provider::{CalendarProvider, ProviderDeleteOutcome, ProviderEvent};

const AUTH_PATH: &str = "api/v1/calendar/auth";
const FETCH_PATH: &str = "api/v1/calendar/auth/fetch";
const SYNC_PATH: &str = "api/v1/calendar/auth/sync";

#[derive(Deserialize)]
struct EventsResponse {
    #[serde(default)]
    events: Vec<ProviderEvent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    auth_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushResponse {
    event: Option<ProviderEvent>,
}

/// Error body of the sync route. Flags classify provider failures.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    not_found: bool,
    #[serde(default, alias = "needsReauth")]
    needs_re_auth: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    ws_id: &'a str,
    google_calendar_event_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PushRequest<'a> {
    ws_id: &'a str,
    event: ProviderEvent,
}

#[derive(Clone)]
pub struct HttpProvider {
    client: Client,
    base_url: Url,
}

impl HttpProvider {
    /// `api_url` is the web app origin, e.g. `https://app.example.com`.
    pub fn new(api_url: &str, api_key: Option<&str>, timeout: Duration) -> CalendarResult<Self> {
        let base_url = Url::parse(&format!("{}/", api_url.trim_end_matches('/')))
            .map_err(|e| CalendarError::Config(format!("Invalid api_url '{api_url}': {e}")))?;

        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| CalendarError::Config("API key contains invalid characters".into()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(HttpProvider { client, base_url })
    }

    fn endpoint(&self, path: &str) -> CalendarResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| CalendarError::Config(format!("Invalid endpoint '{path}': {e}")))
    }

    async fn error_body(response: reqwest::Response) -> (StatusCode, SyncErrorBody) {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(SyncErrorBody {
            error: Some(text),
            ..Default::default()
        });
        (status, body)
    }
}

fn provider_error(status: StatusCode, body: SyncErrorBody) -> CalendarError {
    CalendarError::Provider(format!(
        "{status}: {}",
        body.error.unwrap_or_else(|| "request failed".to_string())
    ))
}

fn cache_buster() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().to_string())
        .unwrap_or_default()
}

#[async_trait]
impl CalendarProvider for HttpProvider {
    async fn list_events(
        &self,
        ws_id: &str,
        range: &DateRange,
        force_refresh: bool,
    ) -> CalendarResult<Vec<ProviderEvent>> {
        let mut params = vec![
            ("wsId", ws_id.to_string()),
            ("startDate", range.from_rfc3339()),
            ("endDate", range.to_rfc3339()),
        ];

        let mut request = self.client.get(self.endpoint(FETCH_PATH)?);
        if force_refresh {
            params.push(("_t", cache_buster()));
            request = request.header(CACHE_CONTROL, "no-cache");
        }

        let response = request.query(&params).send().await?;
        if response.status().is_success() {
            let body: EventsResponse = response.json().await?;
            return Ok(body.events);
        }

        let (status, body) = Self::error_body(response).await;
        if status == StatusCode::UNAUTHORIZED || body.needs_re_auth {
            return Err(CalendarError::ProviderNeedsReauth);
        }
        Err(provider_error(status, body))
    }

    async fn delete_event(
        &self,
        ws_id: &str,
        provider_event_id: &str,
    ) -> CalendarResult<ProviderDeleteOutcome> {
        let response = self
            .client
            .delete(self.endpoint(SYNC_PATH)?)
            .json(&DeleteRequest {
                ws_id,
                google_calendar_event_id: provider_event_id,
            })
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(ProviderDeleteOutcome::Deleted);
        }

        let (status, body) = Self::error_body(response).await;
        if body.not_found || status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            Ok(ProviderDeleteOutcome::NotFound)
        } else if body.needs_re_auth || status == StatusCode::UNAUTHORIZED {
            Ok(ProviderDeleteOutcome::NeedsReauth)
        } else {
            Err(provider_error(status, body))
        }
    }

    async fn push_event(&self, ws_id: &str, event: &CalendarEvent) -> CalendarResult<ProviderEvent> {
        let pushed = ProviderEvent::from_event(event);
        let response = self
            .client
            .post(self.endpoint(SYNC_PATH)?)
            .json(&PushRequest {
                ws_id,
                event: pushed.clone(),
            })
            .send()
            .await?;

        if response.status().is_success() {
            let body: PushResponse = response.json().await.unwrap_or(PushResponse { event: None });
            return Ok(body.event.unwrap_or(pushed));
        }

        let (status, body) = Self::error_body(response).await;
        if body.needs_re_auth || status == StatusCode::UNAUTHORIZED {
            return Err(CalendarError::ProviderNeedsReauth);
        }
        Err(provider_error(status, body))
    }

    async fn auth_url(&self, ws_id: &str) -> CalendarResult<String> {
        let response = self
            .client
            .get(self.endpoint(AUTH_PATH)?)
            .query(&[("wsId", ws_id)])
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, body) = Self::error_body(response).await;
            return Err(provider_error(status, body));
        }

        let body: AuthResponse = response.json().await?;
        Ok(body.auth_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;

    fn provider(server: &mockito::Server) -> HttpProvider {
        HttpProvider::new(&server.url(), None, Duration::from_secs(5)).unwrap()
    }

    fn range() -> DateRange {
        DateRange::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_list_events() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/calendar/auth/fetch")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("wsId".into(), "ws-1".into()),
                Matcher::UrlEncoded("startDate".into(), "2024-01-01T00:00:00.000Z".into()),
            ]))
            .with_body(
                r#"{"events":[{"id":"g1","summary":"Lunch","start":{"dateTime":"2024-01-02T12:00:00Z"},"end":{"dateTime":"2024-01-02T13:00:00Z"}}]}"#,
            )
            .create_async()
            .await;

        let events = provider(&server)
            .list_events("ws-1", &range(), false)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title(), "Lunch");
    }

    #[tokio::test]
    async fn test_forced_fetch_bypasses_cache() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/calendar/auth/fetch")
            .match_query(Matcher::Regex("_t=".into()))
            .match_header("cache-control", "no-cache")
            .with_body(r#"{"events":[]}"#)
            .create_async()
            .await;

        provider(&server)
            .list_events("ws-1", &range(), true)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_fetch_needs_reauth() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/calendar/auth/fetch")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let result = provider(&server).list_events("ws-1", &range(), false).await;
        assert!(matches!(result, Err(CalendarError::ProviderNeedsReauth)));
    }

    #[tokio::test]
    async fn test_delete_classification() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/api/v1/calendar/auth/sync")
            .match_body(Matcher::PartialJson(
                serde_json::json!({"googleCalendarEventId": "missing"}),
            ))
            .with_status(404)
            .with_body(r#"{"error":"Event not found","notFound":true}"#)
            .create_async()
            .await;
        server
            .mock("DELETE", "/api/v1/calendar/auth/sync")
            .match_body(Matcher::PartialJson(
                serde_json::json!({"googleCalendarEventId": "expired"}),
            ))
            .with_status(400)
            .with_body(r#"{"error":"Token expired","needsReAuth":true}"#)
            .create_async()
            .await;
        server
            .mock("DELETE", "/api/v1/calendar/auth/sync")
            .match_body(Matcher::PartialJson(
                serde_json::json!({"googleCalendarEventId": "broken"}),
            ))
            .with_status(500)
            .with_body(r#"{"error":"boom"}"#)
            .create_async()
            .await;

        let provider = provider(&server);
        assert_eq!(
            provider.delete_event("ws-1", "missing").await.unwrap(),
            ProviderDeleteOutcome::NotFound
        );
        assert_eq!(
            provider.delete_event("ws-1", "expired").await.unwrap(),
            ProviderDeleteOutcome::NeedsReauth
        );
        assert!(matches!(
            provider.delete_event("ws-1", "broken").await,
            Err(CalendarError::Provider(msg)) if msg.contains("boom")
        ));
    }

    #[tokio::test]
    async fn test_auth_url() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/calendar/auth")
            .match_query(Matcher::UrlEncoded("wsId".into(), "ws-1".into()))
            .with_body(r#"{"authUrl":"https://accounts.example.com/o/oauth2"}"#)
            .create_async()
            .await;

        let url = provider(&server).auth_url("ws-1").await.unwrap();
        assert_eq!(url, "https://accounts.example.com/o/oauth2");
    }
}
