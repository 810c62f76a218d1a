use super::draft::EventDraft;
use super::models::{Event, ServerEvent, SyncedEvent};
use super::state::{Action, EventFilter, SharedState};
use crate::components::api::ApiClient;
use crate::components::geofence::Bounds;
use crate::components::requests::{InFlight, RequestKey, RequestKind, RequestTicket};
use crate::config::Config;
use crate::error::{auth_error, validation_error, AppResult, Error};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

/// Keeps the local event list in step with the backend
#[derive(Clone)]
pub struct EventSync {
    pub(crate) api: ApiClient,
    pub(crate) state: SharedState,
    pub(crate) inflight: InFlight,
    pub(crate) user_email: Option<String>,
    pub(crate) page_path: String,
    event_bounds: Bounds,
    tz: Tz,
}

impl EventSync {
    pub fn new(
        config: &Config,
        api: ApiClient,
        state: SharedState,
        user_email: Option<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            api,
            state,
            inflight: InFlight::new(),
            user_email,
            page_path: config.page_path.clone(),
            event_bounds: config.event_bounds,
            tz: config.tz()?,
        })
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn inflight(&self) -> &InFlight {
        &self.inflight
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn user_email(&self) -> Option<&str> {
        self.user_email.as_deref()
    }

    pub(crate) fn require_user(&self) -> AppResult<&str> {
        self.user_email
            .as_deref()
            .filter(|email| !email.is_empty())
            .ok_or_else(|| auth_error("no user on this session"))
    }

    /// Apply an action unless the request was superseded meanwhile
    pub(crate) async fn commit(&self, ticket: &RequestTicket, action: Action) -> AppResult<()> {
        let mut state = self.state.write().await;
        ticket.ensure_current()?;
        state.apply(action);
        Ok(())
    }

    /// Fetch every event, returning how many are now shown
    pub async fn try_fetch_all(&self) -> AppResult<usize> {
        self.load(EventFilter::All).await
    }

    /// Fetch every event; failures are logged and the map left as is
    pub async fn fetch_all(&self) {
        log_quietly(self.try_fetch_all().await, "fetch events");
    }

    /// Show one category; `"all"` or an empty category shows everything
    pub async fn try_filter_by_category(&self, category: &str) -> AppResult<usize> {
        let category = category.trim();
        if category.is_empty() || category.eq_ignore_ascii_case("all") {
            return self.try_fetch_all().await;
        }
        self.load(EventFilter::Category(category.to_string())).await
    }

    pub async fn filter_by_category(&self, category: &str) {
        log_quietly(self.try_filter_by_category(category).await, "filter events");
    }

    /// Show events in a time window the backend understands, e.g. `today`
    pub async fn try_filter_by_time(&self, time: &str) -> AppResult<usize> {
        let time = time.trim();
        if time.is_empty() || time.eq_ignore_ascii_case("all") {
            return self.try_fetch_all().await;
        }
        self.load(EventFilter::Time(time.to_string())).await
    }

    pub async fn filter_by_time(&self, time: &str) {
        log_quietly(self.try_filter_by_time(time).await, "filter events");
    }

    /// Reload with whatever filter is active
    pub async fn refresh(&self) {
        let filter = self.state.read().await.filter.clone();
        log_quietly(self.load(filter).await, "refresh events");
    }

    async fn request_events(&self, filter: &EventFilter) -> AppResult<Option<Vec<ServerEvent>>> {
        match filter {
            EventFilter::All => self.api.get_state().await,
            EventFilter::Category(category) => self.api.filter_events(category).await,
            EventFilter::Time(time) => self.api.filter_times(time).await,
        }
    }

    async fn load(&self, filter: EventFilter) -> AppResult<usize> {
        let ticket = self.inflight.begin(RequestKey::new(RequestKind::Refresh));
        let fetched = ticket.guard(self.request_events(&filter)).await?;

        let Some(server_events) = fetched else {
            debug!("Backend sent no event state, keeping current list");
            return Ok(self.state.read().await.events.len());
        };

        let events: Vec<SyncedEvent> = server_events
            .into_iter()
            .filter_map(|server| match SyncedEvent::try_from(server) {
                Ok(synced) => Some(synced),
                Err(reason) => {
                    warn!("Skipping event: {}", reason);
                    None
                }
            })
            .collect();

        let count = events.len();
        self.commit(&ticket, Action::EventsLoaded { events, filter })
            .await?;
        debug!("Loaded {} events", count);
        Ok(count)
    }

    /// Create an event from a form draft.
    ///
    /// Nothing is sent unless the draft passes validation. On success the
    /// event is added locally with the backend's id and the list reloaded.
    pub async fn create(&self, draft: &EventDraft) -> AppResult<Event> {
        let valid = draft.validate(&self.event_bounds, self.tz)?;
        let email = self.require_user()?.to_string();

        let ticket = self.inflight.begin(RequestKey::new(RequestKind::Create));
        let request = valid.to_request(&email, None);
        let created = ticket.guard(self.api.create_event(&request)).await?;

        let event = valid.into_event(created.event_id, &email);
        self.commit(&ticket, Action::EventCreated(event.clone()))
            .await?;
        info!("Created event {} ({})", event.id, event.title);

        self.refresh().await;
        Ok(event)
    }

    /// Save edits to an event the user owns
    pub async fn update(&self, id: &str, draft: &EventDraft) -> AppResult<Event> {
        let valid = draft.validate(&self.event_bounds, self.tz)?;
        let email = self.require_user()?.to_string();
        self.ensure_owner(id, &email).await?;

        let ticket = self
            .inflight
            .begin(RequestKey::for_event(RequestKind::Update, id));
        let request = valid.to_request(&email, Some(id));
        ticket.guard(self.api.update_event(&request)).await?;

        let event = valid.into_event(id.to_string(), &email);
        self.commit(&ticket, Action::EventUpdated(event.clone()))
            .await?;
        info!("Updated event {}", id);

        self.refresh().await;
        Ok(event)
    }

    /// Delete an event the user owns
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let email = self.require_user()?.to_string();
        self.ensure_owner(id, &email).await?;

        let ticket = self
            .inflight
            .begin(RequestKey::for_event(RequestKind::Delete, id));
        ticket.guard(self.api.delete_event(id)).await?;

        self.commit(&ticket, Action::EventDeleted { id: id.to_string() })
            .await?;
        info!("Deleted event {}", id);

        self.refresh().await;
        Ok(())
    }

    /// Reject edits to events someone else owns. Unknown events are left
    /// for the backend to judge.
    async fn ensure_owner(&self, id: &str, email: &str) -> AppResult<()> {
        let state = self.state.read().await;
        match state.event(id) {
            Some(event) if !event.is_owned_by(email) => Err(validation_error(
                "You can only change events you created",
            )),
            _ => Ok(()),
        }
    }
}

fn log_quietly(result: AppResult<usize>, what: &str) {
    match result {
        Ok(_) => {}
        Err(Error::Cancelled) => debug!("Superseded request to {}", what),
        Err(e) => warn!("Failed to {}: {}", what, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::events::state::MapState;
    use crate::components::geofence::LatLng;
    use crate::components::session::Navigation;

    fn sync(user: Option<&str>) -> EventSync {
        let config = Config::for_backend("http://127.0.0.1:9").unwrap();
        let api = ApiClient::new(&config, Some("tok".to_string())).unwrap();
        EventSync::new(&config, api, MapState::shared(), user.map(str::to_string)).unwrap()
    }

    fn draft() -> EventDraft {
        EventDraft {
            title: "Open Mic".to_string(),
            description: "Bring a song".to_string(),
            start_time: "2025-04-01T19:00".to_string(),
            end_time: "2025-04-01T21:00".to_string(),
            category: "music".to_string(),
            address: "Kresge Town Hall".to_string(),
            location: Some(LatLng::new(36.997, -122.066)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_requires_valid_draft() {
        let sync = sync(Some("me@ucsc.edu"));
        let mut bad = draft();
        bad.location = None;

        let err = sync.create(&bad).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(sync.state().read().await.events.is_empty());
    }

    #[tokio::test]
    async fn test_create_requires_user() {
        let sync = sync(None);
        let err = sync.create(&draft()).await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert_eq!(err.redirect(), Some(Navigation::Login));
    }

    #[tokio::test]
    async fn test_update_rejects_other_owner() {
        let sync = sync(Some("me@ucsc.edu"));
        let theirs = draft()
            .validate(&sync.event_bounds, sync.tz)
            .unwrap()
            .into_event("evt1".to_string(), "them@ucsc.edu");
        sync.state()
            .write()
            .await
            .apply(Action::EventCreated(theirs.clone()));

        let err = sync.update("evt1", &draft()).await.unwrap_err();
        assert_eq!(err.user_message(), "You can only change events you created");
        assert!(sync.delete("evt1").await.is_err());
        assert_eq!(sync.state().read().await.event("evt1"), Some(&theirs));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_silent() {
        let sync = sync(Some("me@ucsc.edu"));
        sync.inflight().cancel_all();
        sync.fetch_all().await;
        assert!(sync.state().read().await.events.is_empty());
        assert!(matches!(sync.try_fetch_all().await, Err(Error::Cancelled)));
    }
}
