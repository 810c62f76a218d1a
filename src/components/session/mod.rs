pub mod claims;
pub mod store;

pub use claims::{decode_unverified, Claims, UserClaims};
pub use store::{FileTokenStore, MemoryTokenStore, RedisTokenStore, TokenStore, TokenStoreKind};

use crate::components::api::ApiClient;
use crate::error::AppResult;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::{form_urlencoded, Url};

/// Query parameter the backend uses to hand over a fresh token
pub const TOKEN_PARAM: &str = "token";

/// Route shown to signed-out users
pub const LOGIN_ROUTE: &str = "/";

/// Signed-in user as far as the client can tell
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_email: String,
    pub user_name: String,
    pub picture: Option<String>,
}

impl Session {
    /// Build a session from a token and its decoded claims
    pub fn from_claims(token: &str, claims: Claims) -> Self {
        Self {
            token: token.to_string(),
            user_email: claims.user.email,
            user_name: claims.user.name.unwrap_or_default(),
            picture: claims.user.picture,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user_email", &self.user_email)
            .field("user_name", &self.user_name)
            .finish()
    }
}

/// Where the user has to go next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Back to the landing page to sign in
    Login,
    /// Through the backend login, returning to `next` afterwards
    Reauth { next: String },
}

impl Navigation {
    /// Path to navigate to
    pub fn path(&self) -> String {
        match self {
            Navigation::Login => LOGIN_ROUTE.to_string(),
            Navigation::Reauth { next } => {
                let query = form_urlencoded::Serializer::new(String::new())
                    .append_pair("next", next)
                    .finish();
                format!("/login?{}", query)
            }
        }
    }
}

/// Result of looking for a usable session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// Signed in; `page` is the page URL with the token removed
    Active { session: Session, page: Url },
    /// No usable token
    Redirect(Navigation),
}

/// Finds, persists and drops the bearer token
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn TokenStore>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Find a token in the page URL or storage and decode it.
    ///
    /// A token in the URL wins and is persisted before anything else. No
    /// network call is made.
    pub async fn establish_session(&self, page: &Url) -> AppResult<SessionOutcome> {
        let url_token = page
            .query_pairs()
            .find(|(key, _)| key == TOKEN_PARAM)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.trim().is_empty());

        let cleaned = strip_token(page);

        if let Some(token) = &url_token {
            debug!("Token found in page URL, persisting it");
            self.store.save(token).await?;
        }

        let token = match self.store.load().await? {
            Some(token) if !token.trim().is_empty() => token,
            _ => {
                info!("No session token found, redirecting to login");
                return Ok(SessionOutcome::Redirect(Navigation::Login));
            }
        };

        match decode_unverified(&token) {
            Ok(claims) => {
                let session = Session::from_claims(&token, claims);
                info!("Session established for {}", session.user_email);
                Ok(SessionOutcome::Active {
                    session,
                    page: cleaned,
                })
            }
            Err(e) => {
                warn!("Stored token is unusable ({}), clearing it", e);
                self.store.clear().await?;
                Ok(SessionOutcome::Redirect(Navigation::Login))
            }
        }
    }

    /// Drop the stored token and tell the backend, best effort
    pub async fn sign_out(&self, api: Option<&ApiClient>) -> AppResult<Navigation> {
        self.store.clear().await?;

        if let Some(api) = api {
            if let Err(e) = api.logout().await {
                warn!("Backend logout failed: {}", e);
            }
        }

        info!("Signed out");
        Ok(Navigation::Login)
    }
}

/// Page URL without the token parameter
pub fn strip_token(page: &Url) -> Url {
    let kept: Vec<(String, String)> = page
        .query_pairs()
        .filter(|(key, _)| key != TOKEN_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut cleaned = page.clone();
    if kept.is_empty() {
        cleaned.set_query(None);
    } else {
        cleaned.query_pairs_mut().clear().extend_pairs(kept);
    }
    cleaned
}
