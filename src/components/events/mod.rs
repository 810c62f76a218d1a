pub mod draft;
pub mod models;
pub mod state;
pub mod sync;

pub use draft::{EventDraft, ValidDraft, MAX_IMAGE_BYTES};
pub use models::{safe_email_key, Event, EventMappingError, ServerEvent, SyncedEvent};
pub use state::{Action, EventFilter, MapState, SharedState};
pub use sync::EventSync;
