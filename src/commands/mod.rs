use crate::components::{MapClient, Navigation};
use crate::error::{validation_error, AppResult, Error};
use chrono_tz::Tz;
use std::path::PathBuf;
use tracing::debug;

// Export submodules
pub mod events;
pub mod rsvp;
pub mod util;

/// Shared context for all commands
#[derive(Clone)]
pub struct CommandContext {
    pub client: MapClient,
    /// Timezone event times are shown in
    pub timezone: Tz,
}

impl CommandContext {
    pub fn new(client: MapClient, timezone: Tz) -> Self {
        Self { client, timezone }
    }
}

/// What a command produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    /// Text for the user
    pub text: String,
    /// Where the user has to go, when the session can't continue
    pub navigation: Option<Navigation>,
    /// Stop reading commands
    pub quit: bool,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn navigate(text: impl Into<String>, navigation: Navigation) -> Self {
        Self {
            text: text.into(),
            navigation: Some(navigation),
            quit: true,
        }
    }
}

/// Type alias for command result
pub type CommandResult = AppResult<Reply>;

/// Which subset to filter by
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterTarget {
    All,
    Category(String),
    Time(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarOp {
    Add,
    Remove,
}

/// One line of user input, parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    WhoAmI,
    List,
    Refresh,
    Show(String),
    Filter(FilterTarget),
    Create {
        draft: PathBuf,
        image: Option<PathBuf>,
    },
    Edit {
        id: String,
        draft: PathBuf,
        image: Option<PathBuf>,
    },
    Delete(String),
    Rsvp(String),
    Unrsvp(String),
    Attendees(String),
    Calendar {
        op: CalendarOp,
        id: String,
    },
    SignOut,
    Quit,
}

impl Command {
    /// Parse a line such as `rsvp evt1` or `filter category music`
    pub fn parse(line: &str) -> AppResult<Self> {
        let mut words = line.split_whitespace();
        let name = words
            .next()
            .ok_or_else(|| validation_error("Type a command, or 'help'"))?
            .to_ascii_lowercase();
        let args: Vec<&str> = words.collect();

        let command = match (name.as_str(), args.as_slice()) {
            ("help" | "?", _) => Command::Help,
            ("whoami", []) => Command::WhoAmI,
            ("list" | "ls", []) => Command::List,
            ("refresh", []) => Command::Refresh,
            ("show", [id]) => Command::Show(id.to_string()),
            ("filter", ["all"]) => Command::Filter(FilterTarget::All),
            ("filter", ["category", rest @ ..]) if !rest.is_empty() => {
                Command::Filter(FilterTarget::Category(rest.join(" ")))
            }
            ("filter", ["time", time]) => Command::Filter(FilterTarget::Time(time.to_string())),
            ("create", [draft]) => Command::Create {
                draft: PathBuf::from(draft),
                image: None,
            },
            ("create", [draft, "--image", image]) => Command::Create {
                draft: PathBuf::from(draft),
                image: Some(PathBuf::from(image)),
            },
            ("edit", [id, draft]) => Command::Edit {
                id: id.to_string(),
                draft: PathBuf::from(draft),
                image: None,
            },
            ("edit", [id, draft, "--image", image]) => Command::Edit {
                id: id.to_string(),
                draft: PathBuf::from(draft),
                image: Some(PathBuf::from(image)),
            },
            ("delete", [id]) => Command::Delete(id.to_string()),
            ("rsvp", [id]) => Command::Rsvp(id.to_string()),
            ("unrsvp", [id]) => Command::Unrsvp(id.to_string()),
            ("attendees", [id]) => Command::Attendees(id.to_string()),
            ("calendar", ["add", id]) => Command::Calendar {
                op: CalendarOp::Add,
                id: id.to_string(),
            },
            ("calendar", ["remove", id]) => Command::Calendar {
                op: CalendarOp::Remove,
                id: id.to_string(),
            },
            ("signout" | "logout", []) => Command::SignOut,
            ("quit" | "exit", []) => Command::Quit,
            _ => {
                return Err(validation_error(&format!(
                    "Unknown command or wrong arguments: {}",
                    line.trim()
                )))
            }
        };

        Ok(command)
    }
}

/// Run a command.
///
/// Failures come back as a reply carrying the error text, plus a
/// navigation when the session needs a new login.
pub async fn dispatch(ctx: &CommandContext, command: Command) -> Reply {
    debug!("Running command {:?}", command);
    let result = match command {
        Command::Help => Ok(util::help()),
        Command::WhoAmI => Ok(util::whoami(ctx)),
        Command::List => events::list(ctx).await,
        Command::Refresh => events::refresh(ctx).await,
        Command::Show(id) => events::show(ctx, &id).await,
        Command::Filter(target) => events::filter(ctx, target).await,
        Command::Create { draft, image } => events::create(ctx, &draft, image.as_deref()).await,
        Command::Edit { id, draft, image } => {
            events::edit(ctx, &id, &draft, image.as_deref()).await
        }
        Command::Delete(id) => events::delete(ctx, &id).await,
        Command::Rsvp(id) => rsvp::rsvp(ctx, &id).await,
        Command::Unrsvp(id) => rsvp::unrsvp(ctx, &id).await,
        Command::Attendees(id) => rsvp::attendees(ctx, &id).await,
        Command::Calendar { op, id } => rsvp::calendar(ctx, op, &id).await,
        Command::SignOut => util::sign_out(ctx).await,
        Command::Quit => Ok(Reply {
            text: "Bye".to_string(),
            quit: true,
            ..Default::default()
        }),
    };

    result.unwrap_or_else(|e| error_reply(&e))
}

/// Reply for a failed command
pub fn error_reply(err: &Error) -> Reply {
    match err.redirect() {
        Some(navigation) => Reply::navigate(
            format!("{} (go to {})", err.user_message(), navigation.path()),
            navigation,
        ),
        None => Reply::text(format!("Error: {}", err.user_message())),
    }
}
