use crate::components::api::is_unauthorized;
use crate::components::events::{safe_email_key, Action, EventSync};
use crate::components::requests::{RequestKey, RequestKind};
use crate::error::{AppResult, Error};
use tracing::{debug, info, warn};

/// Attendance and calendar actions for the signed-in user
#[derive(Clone)]
pub struct RsvpClient {
    sync: EventSync,
}

impl RsvpClient {
    pub fn new(sync: EventSync) -> Self {
        Self { sync }
    }

    /// Join an event's attendee list
    pub async fn rsvp(&self, id: &str) -> AppResult<()> {
        let email = self.sync.require_user()?.to_string();
        let ticket = self
            .sync
            .inflight
            .begin(RequestKey::for_event(RequestKind::Attendance, id));

        ticket.guard(self.sync.api.rsvp(id)).await?;
        self.sync
            .commit(&ticket, Action::RsvpAdded { id: id.to_string(), email })
            .await?;

        info!("RSVP'd to event {}", id);
        Ok(())
    }

    /// Leave an event's attendee list; any calendar entry stays
    pub async fn unrsvp(&self, id: &str) -> AppResult<()> {
        let email = self.sync.require_user()?.to_string();
        let ticket = self
            .sync
            .inflight
            .begin(RequestKey::for_event(RequestKind::Attendance, id));

        ticket.guard(self.sync.api.unrsvp(id)).await?;
        self.sync
            .commit(&ticket, Action::RsvpRemoved { id: id.to_string(), email })
            .await?;

        info!("Removed RSVP for event {}", id);
        Ok(())
    }

    /// Replace the local attendee list with the backend's
    pub async fn try_fetch_rsvps(&self, id: &str) -> AppResult<Vec<String>> {
        let ticket = self
            .sync
            .inflight
            .begin(RequestKey::for_event(RequestKind::AttendeeList, id));

        let attendees = ticket.guard(self.sync.api.rsvps(id)).await?;
        self.sync
            .commit(
                &ticket,
                Action::AttendeesLoaded {
                    id: id.to_string(),
                    attendees: attendees.clone(),
                },
            )
            .await?;

        debug!("Event {} has {} attendees", id, attendees.len());
        Ok(attendees)
    }

    /// Like `try_fetch_rsvps`, but failures only get logged
    pub async fn fetch_rsvps(&self, id: &str) {
        match self.try_fetch_rsvps(id).await {
            Ok(_) => {}
            Err(Error::Cancelled) => debug!("Superseded attendee fetch for {}", id),
            Err(e) => warn!("Failed to fetch RSVPs for {}: {}", id, e),
        }
    }

    /// Add the event to the user's calendar.
    ///
    /// A missing or expired calendar grant turns into a re-login that
    /// returns to the map page.
    pub async fn add_to_calendar(&self, id: &str) -> AppResult<String> {
        let email = self.sync.require_user()?.to_string();
        let ticket = self
            .sync
            .inflight
            .begin(RequestKey::for_event(RequestKind::Calendar, id));

        let calendar_event_id = ticket
            .guard(self.sync.api.add_to_calendar(id))
            .await
            .map_err(|e| self.reauth_if_unauthorized(e))?;

        self.sync
            .commit(
                &ticket,
                Action::CalendarLinked {
                    id: id.to_string(),
                    key: safe_email_key(&email),
                    calendar_event_id: calendar_event_id.clone(),
                },
            )
            .await?;
        info!("Added event {} to calendar as {}", id, calendar_event_id);

        self.sync.refresh().await;
        Ok(calendar_event_id)
    }

    /// Remove the user's calendar entry for the event
    pub async fn remove_from_calendar(&self, id: &str) -> AppResult<()> {
        let email = self.sync.require_user()?.to_string();
        let ticket = self
            .sync
            .inflight
            .begin(RequestKey::for_event(RequestKind::Calendar, id));

        ticket
            .guard(self.sync.api.remove_from_calendar(id))
            .await
            .map_err(|e| self.reauth_if_unauthorized(e))?;

        self.sync
            .commit(
                &ticket,
                Action::CalendarUnlinked {
                    id: id.to_string(),
                    key: safe_email_key(&email),
                },
            )
            .await?;
        info!("Removed event {} from calendar", id);

        self.sync.refresh().await;
        Ok(())
    }

    fn reauth_if_unauthorized(&self, err: Error) -> Error {
        if is_unauthorized(&err) {
            warn!("Calendar access was refused, asking for a new login");
            Error::ReauthRequired {
                next: self.sync.page_path.clone(),
            }
        } else {
            err
        }
    }
}
