//! Event store backed by a PostgREST-style HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::constants::EVENTS_TABLE;
use crate::error::{CalendarError, CalendarResult};
use crate::event::{CalendarEvent, NewEvent, StoreUpdate};
use crate::store::{EventQuery, EventStore};

const PREFER: &str = "Prefer";
const RETURN_REPRESENTATION: &str = "return=representation";
const MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=minimal";

/// Talks to the `workspace_calendar_events` table over REST.
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    table_url: String,
}

impl RestStore {
    /// `base_url` is the REST root, e.g. `https://db.example.com/rest/v1`.
    pub fn new(base_url: &str, api_key: Option<&str>, timeout: Duration) -> CalendarResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let invalid = |_| CalendarError::Config("API key contains invalid characters".into());
            headers.insert("apikey", HeaderValue::from_str(key).map_err(invalid)?);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {key}")).map_err(invalid)?,
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(RestStore {
            client,
            table_url: format!("{}/{}", base_url.trim_end_matches('/'), EVENTS_TABLE),
        })
    }

    async fn send(request: RequestBuilder) -> CalendarResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(CalendarError::Store(format!("{status}: {body}")))
    }

    async fn rows<T: DeserializeOwned>(request: RequestBuilder) -> CalendarResult<Vec<T>> {
        let response = Self::send(request).await?;
        Ok(response.json().await?)
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

#[async_trait]
impl EventStore for RestStore {
    async fn list(&self, query: &EventQuery) -> CalendarResult<Vec<CalendarEvent>> {
        let mut params = vec![
            ("select", "*".to_string()),
            ("ws_id", eq(&query.ws_id)),
            ("order", "start_at.asc".to_string()),
        ];
        if query.range.to.is_some() {
            params.push(("start_at", format!("lte.{}", query.range.to_rfc3339())));
        }
        if query.range.from.is_some() {
            params.push(("end_at", format!("gte.{}", query.range.from_rfc3339())));
        }
        if query.mirrored_only {
            params.push(("google_event_id", "not.is.null".to_string()));
        }

        Self::rows(self.client.get(&self.table_url).query(&params)).await
    }

    async fn get(&self, id: &str) -> CalendarResult<Option<CalendarEvent>> {
        let id_filter = eq(id);
        let rows: Vec<CalendarEvent> = Self::rows(
            self.client
                .get(&self.table_url)
                .query(&[("select", "*"), ("id", id_filter.as_str()), ("limit", "1")]),
        )
        .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, event: &NewEvent) -> CalendarResult<CalendarEvent> {
        let rows: Vec<CalendarEvent> = Self::rows(
            self.client
                .post(&self.table_url)
                .header(PREFER, RETURN_REPRESENTATION)
                .json(event),
        )
        .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| CalendarError::Store("Insert returned no row".into()))
    }

    async fn insert_many(&self, events: &[NewEvent]) -> CalendarResult<Vec<CalendarEvent>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }
        Self::rows(
            self.client
                .post(&self.table_url)
                .header(PREFER, RETURN_REPRESENTATION)
                .json(events),
        )
        .await
    }

    async fn update(&self, id: &str, update: &StoreUpdate) -> CalendarResult<CalendarEvent> {
        let rows: Vec<CalendarEvent> = Self::rows(
            self.client
                .patch(&self.table_url)
                .query(&[("id", eq(id))])
                .header(PREFER, RETURN_REPRESENTATION)
                .json(update),
        )
        .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| CalendarError::EventNotFound(id.to_string()))
    }

    async fn upsert_mirrored(&self, events: &[NewEvent]) -> CalendarResult<usize> {
        if events.is_empty() {
            return Ok(0);
        }
        Self::send(
            self.client
                .post(&self.table_url)
                .query(&[("on_conflict", "ws_id,google_event_id")])
                .header(PREFER, MERGE_DUPLICATES)
                .json(events),
        )
        .await?;
        Ok(events.len())
    }

    async fn delete(&self, id: &str) -> CalendarResult<()> {
        Self::send(self.client.delete(&self.table_url).query(&[("id", eq(id))])).await?;
        Ok(())
    }

    async fn delete_many(&self, ids: &[String]) -> CalendarResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let filter = format!("in.({})", ids.join(","));
        Self::send(self.client.delete(&self.table_url).query(&[("id", filter)])).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::SupportedColor;
    use crate::date_range::DateRange;
    use crate::event::EventPatch;
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;

    fn row_json(id: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "title": "Planning",
            "description": null,
            "location": "",
            "start_at": "2024-01-01T09:00:00+00:00",
            "end_at": "2024-01-01T10:00:00+00:00",
            "color": "GREEN",
            "locked": false,
            "google_event_id": "g-1",
            "ws_id": "ws-1"
        })
    }

    fn store(server: &mockito::Server) -> RestStore {
        RestStore::new(&server.url(), Some("secret"), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_list_sends_filters() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/workspace_calendar_events")
            .match_header("apikey", "secret")
            .match_header("authorization", "Bearer secret")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("ws_id".into(), "eq.ws-1".into()),
                Matcher::UrlEncoded("google_event_id".into(), "not.is.null".into()),
                Matcher::UrlEncoded("start_at".into(), "lte.2024-01-31T00:00:00.000Z".into()),
                Matcher::UrlEncoded("end_at".into(), "gte.2024-01-01T00:00:00.000Z".into()),
            ]))
            .with_body(serde_json::json!([row_json("e1")]).to_string())
            .create_async()
            .await;

        let query = EventQuery::workspace("ws-1")
            .in_range(DateRange::new(
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(),
            ))
            .mirrored();
        let events = store(&server).list(&query).await.unwrap();

        mock.assert_async().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].color, SupportedColor::Green);
        assert_eq!(events[0].description, "");
    }

    #[tokio::test]
    async fn test_update_patches_only_set_fields() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/workspace_calendar_events")
            .match_query(Matcher::UrlEncoded("id".into(), "eq.e1".into()))
            .match_header("prefer", "return=representation")
            .match_body(Matcher::Json(serde_json::json!({"title": "Planning"})))
            .with_body(serde_json::json!([row_json("e1")]).to_string())
            .create_async()
            .await;

        let update = StoreUpdate::from(EventPatch {
            title: Some("Planning".into()),
            ..Default::default()
        });
        let row = store(&server).update("e1", &update).await.unwrap();

        mock.assert_async().await;
        assert_eq!(row.id, "e1");
    }

    #[tokio::test]
    async fn test_update_of_missing_row_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PATCH", "/workspace_calendar_events")
            .match_query(Matcher::Any)
            .with_body("[]")
            .create_async()
            .await;

        let result = store(&server)
            .update("gone", &StoreUpdate::adopt_provider_id("g"))
            .await;
        assert!(matches!(result, Err(CalendarError::EventNotFound(id)) if id == "gone"));
    }

    #[tokio::test]
    async fn test_delete_many_uses_in_filter() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/workspace_calendar_events")
            .match_query(Matcher::UrlEncoded("id".into(), "in.(a,b)".into()))
            .with_status(204)
            .create_async()
            .await;

        store(&server)
            .delete_many(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_surfaces_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/workspace_calendar_events")
            .with_status(409)
            .with_body("duplicate key")
            .create_async()
            .await;

        let event = NewEvent {
            ws_id: "ws-1".into(),
            title: "x".into(),
            description: String::new(),
            location: String::new(),
            start_at: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
            end_at: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
            color: SupportedColor::Blue,
            locked: false,
            google_event_id: None,
        };
        let err = store(&server).insert(&event).await.unwrap_err();
        assert!(matches!(err, CalendarError::Store(msg) if msg.contains("duplicate key")));
    }
}
