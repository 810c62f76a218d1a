use crate::commands::{CalendarOp, CommandContext, CommandResult, Reply};

pub async fn rsvp(ctx: &CommandContext, id: &str) -> CommandResult {
    ctx.client.rsvp.rsvp(id).await?;
    Ok(Reply::text(format!("You're going to {}", id)))
}

pub async fn unrsvp(ctx: &CommandContext, id: &str) -> CommandResult {
    ctx.client.rsvp.unrsvp(id).await?;
    Ok(Reply::text(format!("You're no longer going to {}", id)))
}

/// Attendee list straight from the backend
pub async fn attendees(ctx: &CommandContext, id: &str) -> CommandResult {
    let attendees = ctx.client.rsvp.try_fetch_rsvps(id).await?;
    if attendees.is_empty() {
        return Ok(Reply::text("Nobody is going yet"));
    }
    Ok(Reply::text(attendees.join("\n")))
}

pub async fn calendar(ctx: &CommandContext, op: CalendarOp, id: &str) -> CommandResult {
    match op {
        CalendarOp::Add => {
            ctx.client.rsvp.add_to_calendar(id).await?;
            Ok(Reply::text(format!("Added {} to your calendar", id)))
        }
        CalendarOp::Remove => {
            ctx.client.rsvp.remove_from_calendar(id).await?;
            Ok(Reply::text(format!("Removed {} from your calendar", id)))
        }
    }
}
