use crate::config::Config;
use crate::error::{validation_error, AppResult};
use std::sync::Arc;
use tracing::info;

pub mod api;
pub mod events;
pub mod geofence;
pub mod requests;
pub mod rsvp;
pub mod session;

pub use api::ApiClient;
pub use events::{EventSync, MapState, SharedState};
pub use geofence::{Bounds, LatLng};
pub use rsvp::RsvpClient;
pub use session::{Navigation, Session, SessionManager, SessionOutcome, TokenStore};

use events::Action;
use geofence::{clamp_inside, is_within_bounds, nudge_from_edges, CREATE_CENTER_BUFFER, PAN_EDGE_BUFFER};

/// Everything a signed-in map page needs, wired to one backend
#[derive(Clone)]
pub struct MapClient {
    pub session: Session,
    pub events: EventSync,
    pub rsvp: RsvpClient,
    sessions: SessionManager,
    map_bounds: Bounds,
    event_bounds: Bounds,
}

impl MapClient {
    /// Build the clients for an established session
    pub fn new(config: &Config, session: Session, store: Arc<dyn TokenStore>) -> AppResult<Self> {
        let api = ApiClient::new(config, Some(session.token.clone()))?;
        let events = EventSync::new(
            config,
            api,
            MapState::shared(),
            Some(session.user_email.clone()),
        )?;
        let rsvp = RsvpClient::new(events.clone());

        Ok(Self {
            session,
            rsvp,
            events,
            sessions: SessionManager::new(store),
            map_bounds: config.map_bounds,
            event_bounds: config.event_bounds,
        })
    }

    pub fn state(&self) -> &SharedState {
        self.events.state()
    }

    /// Initial load of the map
    pub async fn start(&self) {
        info!("Loading events for {}", self.session.user_email);
        self.events.fetch_all().await;
    }

    /// Cancel every pending request; nothing lands after this
    pub fn shutdown(&self) {
        info!("Cancelling pending requests");
        self.events.inflight().cancel_all();
    }

    /// Stop everything, drop the token and tell the backend
    pub async fn sign_out(&self) -> AppResult<Navigation> {
        self.shutdown();
        self.state().write().await.apply(Action::Cleared);
        self.sessions.sign_out(Some(self.events.api())).await
    }

    /// Starting point for a new event when the map is centred on `center`
    pub fn create_origin(&self, center: LatLng) -> LatLng {
        clamp_inside(center, &self.event_bounds, CREATE_CENTER_BUFFER)
    }

    /// Where a new event's marker starts: the selected event, or the middle
    /// of the map, pulled inside the event area
    pub async fn create_start(&self) -> LatLng {
        let center = self
            .state()
            .read()
            .await
            .selected_event()
            .map(|event| event.location)
            .unwrap_or_else(|| self.map_bounds.center());
        self.create_origin(center)
    }

    /// Accept a clicked location for a new event, if it is inside the area
    pub fn pick_location(&self, point: LatLng) -> AppResult<LatLng> {
        if is_within_bounds(point.lat, point.lng, &self.event_bounds) {
            Ok(point)
        } else {
            Err(validation_error(
                "You can't place an event outside the allowed area.",
            ))
        }
    }

    /// Select an event and return where the map should pan to
    pub async fn focus(&self, id: &str) -> Option<LatLng> {
        let mut state = self.state().write().await;
        let location = state.event(id)?.location;
        state.apply(Action::Selected(Some(id.to_string())));
        Some(nudge_from_edges(location, &self.map_bounds, PAN_EDGE_BUFFER))
    }
}
