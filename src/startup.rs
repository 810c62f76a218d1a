use crate::commands::{dispatch, error_reply, Command, CommandContext};
use crate::components::{MapClient, Navigation, SessionManager, SessionOutcome};
use crate::config::Config;
use crate::error::Error;
use crate::shutdown;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::oneshot;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use url::Url;

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn")),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load the application config
pub fn load_config() -> miette::Result<Config> {
    match Config::load() {
        Ok(config) => Ok(config),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Page the map lives at on this machine
pub fn default_page_url(config: &Config) -> miette::Result<Url> {
    let base = format!("http://localhost:{}", config.login_callback_port);
    let page = Url::parse(&base)
        .and_then(|url| url.join(&config.page_path))
        .map_err(Error::from)?;
    Ok(page)
}

/// What opening the map page led to
pub enum Launch {
    Ready { client: MapClient, page: Url },
    Redirect(Navigation),
}

/// Find a session for `page` and build the clients around it
pub async fn open_map(config: &Config, page: &Url) -> miette::Result<Launch> {
    let store = config.token_store.build()?;
    let sessions = SessionManager::new(store.clone());

    match sessions.establish_session(page).await? {
        SessionOutcome::Active { session, page } => {
            let client = MapClient::new(config, session, store)?;
            Ok(Launch::Ready { client, page })
        }
        SessionOutcome::Redirect(navigation) => Ok(Launch::Redirect(navigation)),
    }
}

/// Read commands from stdin until quit, sign-out or a shutdown signal
pub async fn run_shell(config: &Config, client: MapClient) -> miette::Result<Option<Navigation>> {
    let ctx = CommandContext::new(client.clone(), config.tz()?);

    client.start().await;
    let count = client.state().read().await.events.len();
    info!("Map ready with {} events", count);

    // Create shutdown channel
    let (shutdown_send, mut shutdown_recv) = oneshot::channel();

    // Spawn signal handler task
    let shutdown_client = client.clone();
    tokio::spawn(async move {
        shutdown::handle_signals(shutdown_send, shutdown_client).await;
    });

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    write_out(&mut stdout, "Type 'help' for commands").await?;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.map_err(Error::from)?,
            _ = &mut shutdown_recv => {
                info!("Received shutdown signal, leaving the map");
                return Ok(None);
            }
        };

        // End of input
        let Some(line) = line else {
            client.shutdown();
            return Ok(None);
        };
        if line.trim().is_empty() {
            continue;
        }

        let reply = match Command::parse(&line) {
            Ok(command) => dispatch(&ctx, command).await,
            Err(e) => error_reply(&e),
        };
        write_out(&mut stdout, &reply.text).await?;

        if reply.quit {
            client.shutdown();
            return Ok(reply.navigation);
        }
    }
}

async fn write_out<W: AsyncWrite + Unpin>(out: &mut W, text: &str) -> miette::Result<()> {
    out.write_all(text.as_bytes()).await.map_err(Error::from)?;
    out.write_all(b"\n").await.map_err(Error::from)?;
    out.flush().await.map_err(Error::from)?;
    Ok(())
}
