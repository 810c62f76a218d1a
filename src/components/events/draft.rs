use super::models::{Event, EventRequest, ServerLocation};
use crate::components::geofence::{Bounds, LatLng};
use crate::error::{validation_error, AppResult};
use crate::utils::time::{parse_form_time, to_wire};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Largest banner image accepted, in raw bytes
pub const MAX_IMAGE_BYTES: usize = 286_720;

/// What the user filled in on the create or edit form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Wall-clock time in the configured timezone, or RFC 3339
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub location: Option<LatLng>,
    #[serde(default)]
    pub capacity: Option<String>,
    #[serde(default)]
    pub age_limit: Option<String>,
    /// Banner as a data URL
    #[serde(default)]
    pub image: Option<String>,
}

/// A draft that passed every client-side check
#[derive(Debug, Clone, PartialEq)]
pub struct ValidDraft {
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
}

impl EventDraft {
    /// Prefill a draft from an existing event, for editing
    pub fn from_event(event: &Event) -> Self {
        Self {
            title: event.title.clone(),
            description: event.description.clone(),
            start_time: to_wire(&event.start_time),
            end_time: to_wire(&event.end_time),
            category: event.category.clone(),
            address: event.address.clone(),
            location: Some(event.location),
            capacity: event.capacity.clone(),
            age_limit: event.age_limit.clone(),
            image: event.image.clone(),
        }
    }

    /// Attach a banner image read from disk
    pub fn attach_image(&mut self, path: impl AsRef<Path>) -> AppResult<()> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        self.image = Some(encode_image(&bytes, image_mime(path))?);
        Ok(())
    }

    /// Check the draft the way the form does before anything is sent
    pub fn validate(&self, event_bounds: &Bounds, tz: Tz) -> AppResult<ValidDraft> {
        let required = [
            ("title", &self.title),
            ("description", &self.description),
            ("start time", &self.start_time),
            ("end time", &self.end_time),
            ("category", &self.category),
            ("address", &self.address),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(validation_error(&format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let location = self
            .location
            .ok_or_else(|| validation_error("Please select a location on the map"))?;
        if !event_bounds.contains(location) {
            return Err(validation_error(
                "You can't place an event outside the allowed area.",
            ));
        }

        let start_time = parse_form_time(&self.start_time, tz)
            .ok_or_else(|| validation_error(&format!("Invalid start time: {}", self.start_time)))?;
        let end_time = parse_form_time(&self.end_time, tz)
            .ok_or_else(|| validation_error(&format!("Invalid end time: {}", self.end_time)))?;
        if end_time <= start_time {
            return Err(validation_error("End time must be after start time"));
        }

        if let Some(image) = &self.image {
            check_image_size(image)?;
        }

        Ok(ValidDraft {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            start_time,
            end_time,
            category: self.category.trim().to_string(),
            address: self.address.trim().to_string(),
            location,
            capacity: non_blank(&self.capacity),
            age_limit: non_blank(&self.age_limit),
            image: non_blank(&self.image),
        })
    }
}

impl ValidDraft {
    /// Request body for create (`event_id` unset) or update
    pub fn to_request(&self, host: &str, event_id: Option<&str>) -> EventRequest {
        EventRequest {
            event_id: event_id.map(str::to_string),
            title: self.title.clone(),
            description: self.description.clone(),
            start_time: to_wire(&self.start_time),
            end_time: to_wire(&self.end_time),
            category: self.category.clone(),
            address: self.address.clone(),
            location: ServerLocation::from(self.location),
            capacity: self.capacity.clone(),
            age_limit: self.age_limit.clone(),
            image: self.image.clone(),
            host: host.to_string(),
        }
    }

    /// Local copy of the event once the backend accepted it
    pub fn into_event(self, id: String, owner_email: &str) -> Event {
        Event {
            id,
            title: self.title,
            description: self.description,
            start_time: self.start_time,
            end_time: self.end_time,
            category: self.category,
            address: self.address,
            location: self.location,
            capacity: self.capacity,
            age_limit: self.age_limit,
            image: self.image,
            owner_email: owner_email.to_string(),
            rsvps: BTreeSet::new(),
            calendar_events: BTreeMap::new(),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Encode raw image bytes as a data URL, enforcing the size limit
pub fn encode_image(bytes: &[u8], mime: &str) -> AppResult<String> {
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(validation_error(
            "File is too big! Please ensure it is less than 280KB.",
        ));
    }
    Ok(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
}

fn check_image_size(image: &str) -> AppResult<()> {
    let payload = image.split_once(',').map(|(_, data)| data).unwrap_or(image);
    // Decoded size of a base64 payload
    let padding = payload.bytes().rev().take_while(|b| *b == b'=').count();
    let decoded = ((payload.len() / 4) * 3).saturating_sub(padding.min(2));
    if decoded > MAX_IMAGE_BYTES {
        return Err(validation_error(
            "File is too big! Please ensure it is less than 280KB.",
        ));
    }
    Ok(())
}

fn image_mime(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::geofence::EVENT_BOUNDS;
    use chrono::TimeZone;

    fn draft() -> EventDraft {
        EventDraft {
            title: "Farm Stand".to_string(),
            description: "Fresh produce".to_string(),
            start_time: "2025-04-01T10:00".to_string(),
            end_time: "2025-04-01T12:00".to_string(),
            category: "food".to_string(),
            address: "UCSC Farm".to_string(),
            location: Some(LatLng::new(36.98, -122.06)),
            capacity: Some("  ".to_string()),
            age_limit: None,
            image: None,
        }
    }

    #[test]
    fn test_valid_draft() {
        let valid = draft()
            .validate(&EVENT_BOUNDS, chrono_tz::America::Los_Angeles)
            .unwrap();
        assert_eq!(valid.start_time, Utc.with_ymd_and_hms(2025, 4, 1, 17, 0, 0).unwrap());
        assert_eq!(valid.capacity, None);

        let request = valid.to_request("host@ucsc.edu", None);
        assert_eq!(request.start_time, "2025-04-01T17:00:00.000Z");
        assert_eq!(request.host, "host@ucsc.edu");
        assert_eq!(request.location.latitude, 36.98);
    }

    #[test]
    fn test_missing_fields_listed() {
        let mut incomplete = draft();
        incomplete.title = String::new();
        incomplete.address = "   ".to_string();

        let err = incomplete
            .validate(&EVENT_BOUNDS, chrono_tz::America::Los_Angeles)
            .unwrap_err();
        assert_eq!(err.user_message(), "Missing required fields: title, address");
    }

    #[test]
    fn test_location_required_and_bounded() {
        let mut no_location = draft();
        no_location.location = None;
        assert!(no_location
            .validate(&EVENT_BOUNDS, chrono_tz::America::Los_Angeles)
            .is_err());

        let mut far_away = draft();
        far_away.location = Some(LatLng::new(37.77, -122.42));
        let err = far_away
            .validate(&EVENT_BOUNDS, chrono_tz::America::Los_Angeles)
            .unwrap_err();
        assert!(err.user_message().contains("outside the allowed area"));
    }

    #[test]
    fn test_end_before_start() {
        let mut backwards = draft();
        backwards.end_time = "2025-04-01T09:00".to_string();
        let err = backwards
            .validate(&EVENT_BOUNDS, chrono_tz::America::Los_Angeles)
            .unwrap_err();
        assert_eq!(err.user_message(), "End time must be after start time");
    }

    #[test]
    fn test_image_size_limit() {
        let small = encode_image(&[0u8; 1024], "image/png").unwrap();
        assert!(small.starts_with("data:image/png;base64,"));
        assert!(check_image_size(&small).is_ok());

        assert!(encode_image(&vec![0u8; MAX_IMAGE_BYTES + 1], "image/png").is_err());

        let exact = encode_image(&vec![0u8; MAX_IMAGE_BYTES], "image/png").unwrap();
        assert!(check_image_size(&exact).is_ok());
    }

    #[test]
    fn test_draft_from_event_round_trips_through_validation() {
        let valid = draft()
            .validate(&EVENT_BOUNDS, chrono_tz::America::Los_Angeles)
            .unwrap();
        let event = valid.clone().into_event("evt1".to_string(), "host@ucsc.edu");

        let again = EventDraft::from_event(&event)
            .validate(&EVENT_BOUNDS, chrono_tz::America::Los_Angeles)
            .unwrap();
        assert_eq!(again, valid);
    }
}
