use super::models::{Event, SyncedEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// State shared by everything that reads or changes the map
pub type SharedState = Arc<RwLock<MapState>>;

/// Which subset of events is on the map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EventFilter {
    #[default]
    All,
    Category(String),
    Time(String),
}

/// Everything the map shows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapState {
    pub events: Vec<Event>,
    pub filter: EventFilter,
    pub selected: Option<String>,
}

/// State changes, one per thing that can happen
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    EventsLoaded {
        events: Vec<SyncedEvent>,
        filter: EventFilter,
    },
    EventCreated(Event),
    EventUpdated(Event),
    EventDeleted {
        id: String,
    },
    AttendeesLoaded {
        id: String,
        attendees: Vec<String>,
    },
    RsvpAdded {
        id: String,
        email: String,
    },
    RsvpRemoved {
        id: String,
        email: String,
    },
    CalendarLinked {
        id: String,
        key: String,
        calendar_event_id: String,
    },
    CalendarUnlinked {
        id: String,
        key: String,
    },
    Selected(Option<String>),
    Cleared,
}

impl MapState {
    pub fn shared() -> SharedState {
        Arc::new(RwLock::new(MapState::default()))
    }

    pub fn event(&self, id: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.id == id)
    }

    fn event_mut(&mut self, id: &str) -> Option<&mut Event> {
        self.events.iter_mut().find(|e| e.id == id)
    }

    pub fn selected_event(&self) -> Option<&Event> {
        self.selected.as_deref().and_then(|id| self.event(id))
    }

    /// Apply one change
    pub fn apply(&mut self, action: Action) {
        debug!("Applying {}", action_name(&action));
        match action {
            Action::EventsLoaded { events, filter } => self.load_events(events, filter),
            Action::EventCreated(event) => self.insert_event(event),
            Action::EventUpdated(event) => self.update_event(event),
            Action::EventDeleted { id } => self.remove_event(&id),
            Action::AttendeesLoaded { id, attendees } => {
                if let Some(event) = self.event_mut(&id) {
                    event.rsvps = attendees.into_iter().collect();
                }
            }
            Action::RsvpAdded { id, email } => {
                if let Some(event) = self.event_mut(&id) {
                    event.rsvps.insert(email);
                }
            }
            Action::RsvpRemoved { id, email } => {
                if let Some(event) = self.event_mut(&id) {
                    event.rsvps.remove(&email);
                }
            }
            Action::CalendarLinked {
                id,
                key,
                calendar_event_id,
            } => {
                if let Some(event) = self.event_mut(&id) {
                    event.calendar_events.insert(key, calendar_event_id);
                }
            }
            Action::CalendarUnlinked { id, key } => {
                if let Some(event) = self.event_mut(&id) {
                    event.calendar_events.remove(&key);
                }
            }
            Action::Selected(id) => self.selected = id,
            Action::Cleared => *self = MapState::default(),
        }
    }

    fn load_events(&mut self, incoming: Vec<SyncedEvent>, filter: EventFilter) {
        // Keep known attendance for events the server listed without it
        let mut previous: HashMap<String, Event> =
            self.events.drain(..).map(|e| (e.id.clone(), e)).collect();

        self.events = incoming
            .into_iter()
            .map(|synced| {
                let mut event = synced.event;
                if !synced.rsvps_included {
                    if let Some(old) = previous.remove(&event.id) {
                        event.rsvps = old.rsvps;
                    }
                }
                event
            })
            .collect();
        self.filter = filter;

        let selection_gone = self
            .selected
            .as_deref()
            .is_some_and(|id| self.event(id).is_none());
        if selection_gone {
            self.selected = None;
        }
    }

    fn insert_event(&mut self, event: Event) {
        if let Some(existing) = self.event_mut(&event.id) {
            *existing = event;
        } else {
            self.events.push(event);
        }
    }

    fn update_event(&mut self, mut event: Event) {
        match self.event_mut(&event.id) {
            Some(existing) => {
                // Attendance and calendar links are not part of an edit
                event.rsvps = std::mem::take(&mut existing.rsvps);
                event.calendar_events = std::mem::take(&mut existing.calendar_events);
                *existing = event;
            }
            None => self.events.push(event),
        }
    }

    fn remove_event(&mut self, id: &str) {
        self.events.retain(|e| e.id != id);
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
    }
}

fn action_name(action: &Action) -> &'static str {
    match action {
        Action::EventsLoaded { .. } => "EventsLoaded",
        Action::EventCreated(_) => "EventCreated",
        Action::EventUpdated(_) => "EventUpdated",
        Action::EventDeleted { .. } => "EventDeleted",
        Action::AttendeesLoaded { .. } => "AttendeesLoaded",
        Action::RsvpAdded { .. } => "RsvpAdded",
        Action::RsvpRemoved { .. } => "RsvpRemoved",
        Action::CalendarLinked { .. } => "CalendarLinked",
        Action::CalendarUnlinked { .. } => "CalendarUnlinked",
        Action::Selected(_) => "Selected",
        Action::Cleared => "Cleared",
    }
}
