use crate::components::geofence::LatLng;
use crate::utils::time::parse_server_time;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Event as the client keeps it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub category: String,
    pub address: String,
    pub location: LatLng,
    pub capacity: Option<String>,
    pub age_limit: Option<String>,
    pub image: Option<String>,
    pub owner_email: String,
    /// Emails of attendees
    pub rsvps: BTreeSet<String>,
    /// Safe email key to calendar entry id
    pub calendar_events: BTreeMap<String, String>,
}

impl Event {
    pub fn is_owned_by(&self, email: &str) -> bool {
        self.owner_email == email
    }

    pub fn has_rsvp(&self, email: &str) -> bool {
        self.rsvps.contains(email)
    }

    /// Calendar entry this user linked to the event, if any
    pub fn calendar_entry_for(&self, email: &str) -> Option<&str> {
        self.calendar_events
            .get(&safe_email_key(email))
            .map(String::as_str)
    }
}

/// Key the backend files a user's calendar entry under.
///
/// Only the first `@` and then the first `.` are replaced, matching the
/// keys already stored server-side.
pub fn safe_email_key(email: &str) -> String {
    email.replacen('@', "_at_", 1).replacen('.', "_dot_", 1)
}

/// Location as the backend encodes it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServerLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<LatLng> for ServerLocation {
    fn from(point: LatLng) -> Self {
        Self {
            latitude: point.lat,
            longitude: point.lng,
        }
    }
}

impl From<ServerLocation> for LatLng {
    fn from(location: ServerLocation) -> Self {
        LatLng::new(location.latitude, location.longitude)
    }
}

/// Event as the backend returns it
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerEvent {
    pub event_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub location: Option<ServerLocation>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub capacity: Option<String>,
    #[serde(rename = "age_limit", default, deserialize_with = "string_or_number")]
    pub age_limit: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub owner_email: Option<String>,
    #[serde(default)]
    pub rsvps: Option<Vec<String>>,
    #[serde(rename = "calendar_events", default)]
    pub calendar_events: Option<BTreeMap<String, String>>,
}

/// Why a server event could not be mapped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventMappingError {
    #[error("event has no id")]
    MissingId,

    #[error("event {0} has no location")]
    MissingLocation(String),

    #[error("event {id} has an unreadable {field}")]
    BadTime { id: String, field: &'static str },
}

/// Event mapped from the backend, noting whether attendance came with it
#[derive(Debug, Clone, PartialEq)]
pub struct SyncedEvent {
    pub event: Event,
    pub rsvps_included: bool,
}

impl TryFrom<ServerEvent> for SyncedEvent {
    type Error = EventMappingError;

    fn try_from(server: ServerEvent) -> Result<Self, Self::Error> {
        let id = server
            .event_id
            .filter(|id| !id.is_empty())
            .ok_or(EventMappingError::MissingId)?;

        let location = server
            .location
            .ok_or_else(|| EventMappingError::MissingLocation(id.clone()))?;

        let start_time = server
            .start_time
            .as_deref()
            .and_then(parse_server_time)
            .ok_or_else(|| EventMappingError::BadTime {
                id: id.clone(),
                field: "start time",
            })?;

        let end_time = server
            .end_time
            .as_deref()
            .and_then(parse_server_time)
            .ok_or_else(|| EventMappingError::BadTime {
                id: id.clone(),
                field: "end time",
            })?;

        let rsvps_included = server.rsvps.is_some();

        let event = Event {
            id,
            title: server.title,
            description: server.description,
            start_time,
            end_time,
            category: server.category.unwrap_or_default(),
            address: server.address.unwrap_or_default(),
            location: location.into(),
            capacity: server.capacity,
            age_limit: server.age_limit,
            image: server.image.filter(|image| !image.is_empty()),
            owner_email: server.owner_email.unwrap_or_default(),
            rsvps: server.rsvps.unwrap_or_default().into_iter().collect(),
            calendar_events: server.calendar_events.unwrap_or_default(),
        };

        Ok(SyncedEvent {
            event,
            rsvps_included,
        })
    }
}

/// Body of `GET /state` and the filter endpoints
#[derive(Debug, Default, Deserialize)]
pub struct StateEnvelope {
    pub state: Option<StateBody>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StateBody {
    #[serde(default)]
    pub events: Vec<serde_json::Value>,
}

/// Body sent to create and update
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub title: String,
    pub description: String,
    pub start_time: String,
    pub end_time: String,
    pub category: String,
    pub address: String,
    pub location: ServerLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<String>,
    #[serde(rename = "age_limit", skip_serializing_if = "Option::is_none")]
    pub age_limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub host: String,
}

/// Reply to a successful create
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEvent {
    pub event_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Reply to a successful calendar add
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarLink {
    pub calendar_event_id: String,
}

/// Error body the backend sends with non-2xx replies
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn server_event(value: serde_json::Value) -> ServerEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_safe_email_key() {
        assert_eq!(safe_email_key("sammy@ucsc.edu"), "sammy_at_ucsc_dot_edu");
        // Only the first dot is replaced
        assert_eq!(safe_email_key("sammy.slug@ucsc.edu"), "sammy_dot_slug_at_ucsc.edu");
        assert_eq!(safe_email_key("nobody"), "nobody");
    }

    #[test]
    fn test_map_server_event() {
        let server = server_event(json!({
            "eventId": "evt1",
            "title": "Banana Slug Derby",
            "description": "Racing, slowly",
            "startTime": "Tue, 01 Apr 2025 17:00:00 GMT",
            "endTime": "2025-04-01T19:00:00Z",
            "category": "sports",
            "address": "East Field",
            "location": {"latitude": 36.99, "longitude": -122.05},
            "capacity": 50,
            "age_limit": "18",
            "image": "",
            "ownerEmail": "host@ucsc.edu",
            "rsvps": ["a@ucsc.edu", "b@ucsc.edu"],
            "calendar_events": {"a_at_ucsc_dot_edu": "gcal-1"},
            "status": "active"
        }));

        let synced = SyncedEvent::try_from(server).unwrap();
        let event = synced.event;
        assert!(synced.rsvps_included);
        assert_eq!(event.id, "evt1");
        assert_eq!(event.location, LatLng::new(36.99, -122.05));
        assert_eq!(event.capacity.as_deref(), Some("50"));
        assert_eq!(event.age_limit.as_deref(), Some("18"));
        assert_eq!(event.image, None);
        assert!(event.has_rsvp("a@ucsc.edu"));
        assert!(event.is_owned_by("host@ucsc.edu"));
        assert_eq!(event.calendar_entry_for("a@ucsc.edu"), Some("gcal-1"));
        assert_eq!(event.calendar_entry_for("b@ucsc.edu"), None);
    }

    #[test]
    fn test_map_server_event_without_rsvps() {
        let server = server_event(json!({
            "eventId": "evt2",
            "title": "Quiet Study",
            "startTime": "2025-04-01T17:00:00Z",
            "endTime": "2025-04-01T18:00:00Z",
            "location": {"latitude": 36.99, "longitude": -122.05},
            "capacity": null
        }));

        let synced = SyncedEvent::try_from(server).unwrap();
        assert!(!synced.rsvps_included);
        assert!(synced.event.rsvps.is_empty());
        assert_eq!(synced.event.capacity, None);
    }

    #[test]
    fn test_reject_incomplete_server_event() {
        let no_location = server_event(json!({
            "eventId": "evt3",
            "startTime": "2025-04-01T17:00:00Z",
            "endTime": "2025-04-01T18:00:00Z"
        }));
        assert_eq!(
            SyncedEvent::try_from(no_location),
            Err(EventMappingError::MissingLocation("evt3".to_string()))
        );

        let no_id = server_event(json!({
            "startTime": "2025-04-01T17:00:00Z",
            "endTime": "2025-04-01T18:00:00Z",
            "location": {"latitude": 36.99, "longitude": -122.05}
        }));
        assert_eq!(SyncedEvent::try_from(no_id), Err(EventMappingError::MissingId));

        let bad_time = server_event(json!({
            "eventId": "evt4",
            "startTime": "soon",
            "endTime": "2025-04-01T18:00:00Z",
            "location": {"latitude": 36.99, "longitude": -122.05}
        }));
        let err = SyncedEvent::try_from(bad_time).unwrap_err();
        assert_eq!(err.to_string(), "event evt4 has an unreadable start time");
    }

    #[test]
    fn test_event_request_skips_empty_optionals() {
        let request = EventRequest {
            event_id: None,
            title: "Title".to_string(),
            description: "Desc".to_string(),
            start_time: "2025-04-01T17:00:00.000Z".to_string(),
            end_time: "2025-04-01T18:00:00.000Z".to_string(),
            category: "music".to_string(),
            address: "Quarry Plaza".to_string(),
            location: ServerLocation {
                latitude: 36.99,
                longitude: -122.05,
            },
            capacity: None,
            age_limit: Some("21".to_string()),
            image: None,
            host: "host@ucsc.edu".to_string(),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["startTime"], "2025-04-01T17:00:00.000Z");
        assert_eq!(value["age_limit"], "21");
        assert_eq!(value["location"]["latitude"], 36.99);
        assert!(value.get("eventId").is_none());
        assert!(value.get("capacity").is_none());
        assert!(value.get("image").is_none());
    }
}
