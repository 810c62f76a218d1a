use slug_events::components::Navigation;
use slug_events::error::Error;
use slug_events::startup::{self, Launch};
use tracing::info;
use url::Url;

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize logging
    startup::init_logging()?;

    info!("Starting Slug Events");

    // Load configuration
    let config = startup::load_config()?;

    // The page URL may carry a fresh `?token=` from the login redirect
    let page = match std::env::args().nth(1) {
        Some(arg) => Url::parse(&arg).map_err(Error::from)?,
        None => startup::default_page_url(&config)?,
    };

    let navigation = match startup::open_map(&config, &page).await? {
        Launch::Ready { client, page } => {
            info!(
                "Signed in as {} on {}",
                client.session.user_email,
                page.path()
            );
            startup::run_shell(&config, client).await?
        }
        Launch::Redirect(navigation) => Some(navigation),
    };

    match navigation {
        Some(Navigation::Login) => println!("Not signed in. Run slug_login to sign in."),
        Some(Navigation::Reauth { next }) => println!(
            "Please sign in again with slug_login, then return to {}",
            next
        ),
        None => {}
    }

    Ok(())
}
