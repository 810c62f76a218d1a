use crate::commands::util::{event_details, event_line};
use crate::commands::{CommandContext, CommandResult, FilterTarget, Reply};
use crate::components::events::{EventDraft, EventFilter};
use crate::error::{validation_error, AppResult};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Events currently on the map
pub async fn list(ctx: &CommandContext) -> CommandResult {
    let state = ctx.client.state().read().await;
    if state.events.is_empty() {
        return Ok(Reply::text("No events on the map"));
    }

    let me = &ctx.client.session.user_email;
    let mut lines: Vec<String> = state
        .events
        .iter()
        .map(|event| event_line(event, ctx.timezone, me))
        .collect();

    match &state.filter {
        EventFilter::All => {}
        EventFilter::Category(category) => lines.push(format!("(category: {})", category)),
        EventFilter::Time(time) => lines.push(format!("(time: {})", time)),
    }

    Ok(Reply::text(lines.join("\n")))
}

pub async fn refresh(ctx: &CommandContext) -> CommandResult {
    ctx.client.events.refresh().await;
    let count = ctx.client.state().read().await.events.len();
    Ok(Reply::text(format!("{} events", count)))
}

/// Select an event and describe it
pub async fn show(ctx: &CommandContext, id: &str) -> CommandResult {
    let Some(pan_to) = ctx.client.focus(id).await else {
        return Err(validation_error(&format!("No event with id {}", id)));
    };
    debug!("Panning to {:?}", pan_to);

    let state = ctx.client.state().read().await;
    let event = state
        .selected_event()
        .ok_or_else(|| validation_error(&format!("No event with id {}", id)))?;
    Ok(Reply::text(event_details(
        event,
        ctx.timezone,
        &ctx.client.session.user_email,
    )))
}

/// Apply a filter; failures leave the map as it was
pub async fn filter(ctx: &CommandContext, target: FilterTarget) -> CommandResult {
    let events = &ctx.client.events;
    match &target {
        FilterTarget::All => events.fetch_all().await,
        FilterTarget::Category(category) => events.filter_by_category(category).await,
        FilterTarget::Time(time) => events.filter_by_time(time).await,
    }
    list(ctx).await
}

pub async fn create(ctx: &CommandContext, draft: &Path, image: Option<&Path>) -> CommandResult {
    let mut draft = load_draft(EventDraft::default(), draft)?;
    if let Some(image) = image {
        draft.attach_image(image)?;
    }
    let location = match draft.location {
        Some(location) => location,
        None => ctx.client.create_start().await,
    };
    draft.location = Some(ctx.client.pick_location(location)?);

    let event = ctx.client.events.create(&draft).await?;
    Ok(Reply::text(format!("Created {} ({})", event.title, event.id)))
}

/// Edit an event; fields missing from the draft keep their current values
pub async fn edit(
    ctx: &CommandContext,
    id: &str,
    draft: &Path,
    image: Option<&Path>,
) -> CommandResult {
    let base = {
        let state = ctx.client.state().read().await;
        state.event(id).map(EventDraft::from_event).unwrap_or_default()
    };

    let mut draft = load_draft(base, draft)?;
    if let Some(image) = image {
        draft.attach_image(image)?;
    }

    let event = ctx.client.events.update(id, &draft).await?;
    Ok(Reply::text(format!("Updated {} ({})", event.title, event.id)))
}

pub async fn delete(ctx: &CommandContext, id: &str) -> CommandResult {
    ctx.client.events.delete(id).await?;
    Ok(Reply::text(format!("Deleted {}", id)))
}

/// Read a draft from a TOML or JSON file on top of `base`
pub fn load_draft(base: EventDraft, path: &Path) -> AppResult<EventDraft> {
    let content = fs::read_to_string(path)?;
    let patch: Value = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => serde_json::to_value(toml::from_str::<toml::Value>(&content)?)?,
        _ => serde_json::from_str(&content)?,
    };
    merge_draft(base, patch)
}

fn merge_draft(base: EventDraft, patch: Value) -> AppResult<EventDraft> {
    let Value::Object(fields) = patch else {
        return Err(validation_error("Draft file must hold a table of fields"));
    };

    let mut merged = serde_json::to_value(base)?;
    if let Value::Object(target) = &mut merged {
        target.extend(fields);
    }
    Ok(serde_json::from_value(merged)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::geofence::LatLng;
    use serde_json::json;

    #[test]
    fn test_merge_draft_overlays_fields() {
        let base = EventDraft {
            title: "Old".to_string(),
            address: "Porter Meadow".to_string(),
            location: Some(LatLng::new(36.99, -122.06)),
            ..Default::default()
        };

        let merged = merge_draft(base, json!({"title": "New", "capacity": "30"})).unwrap();
        assert_eq!(merged.title, "New");
        assert_eq!(merged.address, "Porter Meadow");
        assert_eq!(merged.capacity.as_deref(), Some("30"));
        assert_eq!(merged.location, Some(LatLng::new(36.99, -122.06)));
    }

    #[test]
    fn test_merge_draft_rejects_non_table() {
        assert!(merge_draft(EventDraft::default(), json!(["title"])).is_err());
    }

    #[test]
    fn test_load_toml_draft() {
        let path = std::env::temp_dir().join(format!("draft-{}.toml", uuid::Uuid::new_v4()));
        fs::write(
            &path,
            "title = \"Trivia\"\ncategory = \"social\"\n\n[location]\nlat = 36.99\nlng = -122.06\n",
        )
        .unwrap();

        let draft = load_draft(EventDraft::default(), &path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(draft.title, "Trivia");
        assert_eq!(draft.location, Some(LatLng::new(36.99, -122.06)));
        assert!(draft.description.is_empty());
    }
}
