use crate::components::events::models::{
    CalendarLink, CreatedEvent, ErrorBody, EventRequest, ServerEvent, StateEnvelope,
};
use crate::config::Config;
use crate::error::{other_error, AppResult, Error};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Thin wrapper over the backend's HTTP endpoints
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client for the configured backend
    pub fn new(config: &Config, token: Option<String>) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.backend_url.clone(),
            token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an endpoint URL, percent-encoding each segment
    pub fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| other_error("Backend URL cannot have a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Pass 2xx replies through, turn anything else into an API error
    async fn check(response: Response, fallback: &str) -> AppResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string());

        debug!("Backend replied {}: {}", status, message);
        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn fetch_events(&self, url: Url, fallback: &str) -> AppResult<Option<Vec<ServerEvent>>> {
        let response = self.authed(self.client.get(url)).send().await?;
        let response = Self::check(response, fallback).await?;
        let envelope: StateEnvelope = response.json().await?;

        // A reply without a state block leaves the map as it is
        let Some(state) = envelope.state else {
            return Ok(None);
        };

        let events = state
            .events
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<ServerEvent>(value) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!("Skipping unreadable event: {}", e);
                    None
                }
            })
            .collect();

        Ok(Some(events))
    }

    /// `GET /state`
    pub async fn get_state(&self) -> AppResult<Option<Vec<ServerEvent>>> {
        let url = self.endpoint(&["state"])?;
        self.fetch_events(url, "Failed to fetch events").await
    }

    /// `GET /filter_events/{category}`
    pub async fn filter_events(&self, category: &str) -> AppResult<Option<Vec<ServerEvent>>> {
        let url = self.endpoint(&["filter_events", category])?;
        self.fetch_events(url, "Failed to filter events").await
    }

    /// `GET /filter_times/{time}`
    pub async fn filter_times(&self, time: &str) -> AppResult<Option<Vec<ServerEvent>>> {
        let url = self.endpoint(&["filter_times", time])?;
        self.fetch_events(url, "Failed to filter events").await
    }

    /// `POST /create_event`
    pub async fn create_event(&self, body: &EventRequest) -> AppResult<CreatedEvent> {
        let url = self.endpoint(&["create_event"])?;
        let response = self.authed(self.client.post(url)).json(body).send().await?;
        let response = Self::check(response, "Failed to create event").await?;
        Ok(response.json().await?)
    }

    /// `POST /update_event`
    pub async fn update_event(&self, body: &EventRequest) -> AppResult<()> {
        let url = self.endpoint(&["update_event"])?;
        let response = self.authed(self.client.post(url)).json(body).send().await?;
        Self::check(response, "Failed to update event").await?;
        Ok(())
    }

    /// `DELETE /delete_event/{id}`
    pub async fn delete_event(&self, id: &str) -> AppResult<()> {
        let url = self.endpoint(&["delete_event", id])?;
        let response = self.authed(self.client.delete(url)).send().await?;
        Self::check(response, "Failed to delete event").await?;
        Ok(())
    }

    /// `POST /rsvp/{id}`
    pub async fn rsvp(&self, id: &str) -> AppResult<()> {
        let url = self.endpoint(&["rsvp", id])?;
        let response = self.authed(self.client.post(url)).send().await?;
        Self::check(response, "Failed to RSVP").await?;
        Ok(())
    }

    /// `DELETE /unrsvp/{id}`, leaving any calendar entry in place
    pub async fn unrsvp(&self, id: &str) -> AppResult<()> {
        let url = self.endpoint(&["unrsvp", id])?;
        let response = self
            .authed(self.client.delete(url))
            .json(&json!({ "keepInCalendar": true }))
            .send()
            .await?;
        Self::check(response, "Failed to remove RSVP").await?;
        Ok(())
    }

    /// `GET /rsvps/{id}`
    pub async fn rsvps(&self, id: &str) -> AppResult<Vec<String>> {
        let url = self.endpoint(&["rsvps", id])?;
        let response = self.authed(self.client.get(url)).send().await?;
        let response = Self::check(response, "Failed to fetch RSVPs").await?;
        Ok(response.json().await?)
    }

    /// `POST /add_to_calendar/{id}`, returning the calendar entry id
    pub async fn add_to_calendar(&self, id: &str) -> AppResult<String> {
        let url = self.endpoint(&["add_to_calendar", id])?;
        let response = self.authed(self.client.post(url)).send().await?;
        let response = Self::check(response, "Failed to add to calendar").await?;
        let link: CalendarLink = response.json().await?;
        Ok(link.calendar_event_id)
    }

    /// `DELETE /remove_from_calendar/{id}`
    pub async fn remove_from_calendar(&self, id: &str) -> AppResult<()> {
        let url = self.endpoint(&["remove_from_calendar", id])?;
        let response = self.authed(self.client.delete(url)).send().await?;
        Self::check(response, "Failed to remove from calendar").await?;
        Ok(())
    }

    /// `GET /logout`; cookie based, so no bearer header
    pub async fn logout(&self) -> AppResult<()> {
        let url = self.endpoint(&["logout"])?;
        let response = self.client.get(url).send().await?;
        // The backend answers with a redirect
        if response.status().is_server_error() {
            return Err(Error::Api {
                status: response.status().as_u16(),
                message: "Failed to log out".to_string(),
            });
        }
        Ok(())
    }

    /// Backend login page that comes back to `next` with a token
    pub fn login_url(&self, next: &str) -> AppResult<Url> {
        let mut url = self.endpoint(&["login"])?;
        url.query_pairs_mut().append_pair("next", next);
        Ok(url)
    }
}

/// Whether a failure means the calendar grant needs a fresh login
pub fn is_unauthorized(err: &Error) -> bool {
    match err {
        Error::Api { status, message } => {
            *status == StatusCode::UNAUTHORIZED.as_u16()
                || message.to_lowercase().contains("not authorized")
        }
        _ => false,
    }
}
