use slug_events::components::session::TOKEN_PARAM;
use slug_events::components::{ApiClient, SessionManager, SessionOutcome};
use slug_events::error::{other_error, AppResult};
use slug_events::startup;
use tracing::{info, warn};
use url::Url;

#[tokio::main]
async fn main() -> miette::Result<()> {
    startup::init_logging()?;

    // Load configuration
    let config = startup::load_config()?;
    let callback = startup::default_page_url(&config)?;

    // The backend sends the browser back to the callback with `?token=`
    let api = ApiClient::new(&config, None)?;
    let login_url = api.login_url(callback.as_str())?;

    // Start local server to receive the callback
    let server = tiny_http::Server::http(("127.0.0.1", config.login_callback_port))
        .map_err(|e| other_error(&format!("Failed to listen for the login callback: {}", e)))?;

    // Open browser for sign-in
    println!("Opening browser to sign in...");
    if let Err(e) = webbrowser::open(login_url.as_str()) {
        warn!("Could not open a browser: {}", e);
        println!("Open this URL to sign in: {}", login_url);
    }
    println!("Waiting for the login callback...");

    let base = callback.clone();
    let page = tokio::task::spawn_blocking(move || wait_for_token(server, &base))
        .await
        .map_err(|e| other_error(&format!("Callback listener failed: {}", e)))??;

    let store = config.token_store.build()?;
    let sessions = SessionManager::new(store);

    match sessions.establish_session(&page).await? {
        SessionOutcome::Active { session, .. } => {
            info!("Token saved for {}", session.user_email);
            println!("Signed in as {}", session.user_email);
            Ok(())
        }
        SessionOutcome::Redirect(_) => {
            Err(other_error("The backend returned an unusable token").into())
        }
    }
}

/// Block until a request carrying a token arrives and return its full URL
fn wait_for_token(server: tiny_http::Server, base: &Url) -> AppResult<Url> {
    loop {
        let request = server.recv()?;
        let url = base.join(request.url())?;

        let has_token = url
            .query_pairs()
            .any(|(key, value)| key == TOKEN_PARAM && !value.is_empty());

        if !has_token {
            // Favicon and other stray requests
            let response = tiny_http::Response::from_string("Waiting for sign-in").with_status_code(404);
            if let Err(e) = request.respond(response) {
                warn!("Failed to answer stray request: {}", e);
            }
            continue;
        }

        let response =
            tiny_http::Response::from_string("Signed in! You can close this window.");
        if let Err(e) = request.respond(response) {
            warn!("Failed to answer the callback: {}", e);
        }
        return Ok(url);
    }
}
