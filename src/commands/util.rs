use crate::commands::{CommandContext, CommandResult, Reply};
use crate::components::events::Event;
use crate::utils::time::display_local;
use chrono_tz::Tz;

const HELP: &str = "\
Commands:
  list                          events on the map
  show <id>                     event details
  refresh                       reload with the current filter
  filter all|category <c>|time <t>
  create <draft> [--image <file>]
  edit <id> <draft> [--image <file>]
  delete <id>
  rsvp <id> | unrsvp <id> | attendees <id>
  calendar add|remove <id>
  whoami | signout | quit";

pub fn help() -> Reply {
    Reply::text(HELP)
}

/// Who is signed in
pub fn whoami(ctx: &CommandContext) -> Reply {
    let session = &ctx.client.session;
    if session.user_name.is_empty() {
        Reply::text(session.user_email.clone())
    } else {
        Reply::text(format!("{} <{}>", session.user_name, session.user_email))
    }
}

pub async fn sign_out(ctx: &CommandContext) -> CommandResult {
    let navigation = ctx.client.sign_out().await?;
    Ok(Reply::navigate("Signed out", navigation))
}

/// One line per event
pub fn event_line(event: &Event, tz: Tz, me: &str) -> String {
    let mut marks = String::new();
    if event.is_owned_by(me) {
        marks.push_str(" [host]");
    }
    if event.has_rsvp(me) {
        marks.push_str(" [going]");
    }
    format!(
        "{}  {}  {} @ {}{}",
        event.id,
        display_local(&event.start_time, tz),
        event.title,
        event.address,
        marks
    )
}

/// Full description of one event
pub fn event_details(event: &Event, tz: Tz, me: &str) -> String {
    let mut lines = vec![
        format!("{} ({})", event.title, event.category),
        event.description.clone(),
        format!(
            "{} - {}",
            display_local(&event.start_time, tz),
            display_local(&event.end_time, tz)
        ),
        format!(
            "{} ({:.5}, {:.5})",
            event.address, event.location.lat, event.location.lng
        ),
        format!("Host: {}", event.owner_email),
    ];
    if let Some(capacity) = &event.capacity {
        lines.push(format!("Capacity: {}", capacity));
    }
    if let Some(age_limit) = &event.age_limit {
        lines.push(format!("Age limit: {}", age_limit));
    }
    lines.push(format!("Going: {}", event.rsvps.len()));
    if event.has_rsvp(me) {
        lines.push("You're going".to_string());
    }
    if event.calendar_entry_for(me).is_some() {
        lines.push("In your calendar".to_string());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::geofence::LatLng;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn event() -> Event {
        Event {
            id: "evt1".to_string(),
            title: "Slug Fest".to_string(),
            description: "Annual".to_string(),
            start_time: Utc.with_ymd_and_hms(2025, 4, 1, 17, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 4, 1, 19, 0, 0).unwrap(),
            category: "music".to_string(),
            address: "Quarry Plaza".to_string(),
            location: LatLng::new(36.99, -122.06),
            capacity: Some("100".to_string()),
            age_limit: None,
            image: None,
            owner_email: "me@ucsc.edu".to_string(),
            rsvps: ["me@ucsc.edu".to_string()].into_iter().collect(),
            calendar_events: BTreeMap::new(),
        }
    }

    #[test]
    fn test_event_line_marks() {
        let line = event_line(&event(), chrono_tz::America::Los_Angeles, "me@ucsc.edu");
        assert!(line.starts_with("evt1"));
        assert!(line.ends_with("[host] [going]"));

        let line = event_line(&event(), chrono_tz::America::Los_Angeles, "you@ucsc.edu");
        assert!(!line.contains('['));
    }

    #[test]
    fn test_event_details() {
        let details = event_details(&event(), chrono_tz::America::Los_Angeles, "me@ucsc.edu");
        assert!(details.contains("Capacity: 100"));
        assert!(details.contains("Going: 1"));
        assert!(!details.contains("Age limit"));
        assert!(!details.contains("In your calendar"));
    }
}
