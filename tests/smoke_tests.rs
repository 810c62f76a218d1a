use mockito::{Matcher, Server};
use serde_json::json;
use slug_events::commands::{dispatch, Command, CommandContext};
use slug_events::components::geofence::{is_within_bounds, EVENT_BOUNDS, MAP_BOUNDS};
use slug_events::components::session::{MemoryTokenStore, TokenStoreKind};
use slug_events::components::{MapClient, Navigation, Session};
use slug_events::config::Config;
use std::sync::Arc;

fn session() -> Session {
    Session {
        token: "test-token".to_string(),
        user_email: "me@ucsc.edu".to_string(),
        user_name: "Me".to_string(),
        picture: None,
    }
}

/// Smoke test to verify that the config can be built
#[tokio::test]
async fn test_config_defaults() {
    let config = Config::for_backend("http://127.0.0.1:5000").unwrap();

    assert_eq!(config.page_path, "/map");
    assert_eq!(config.login_callback_port, 8765);
    assert!(matches!(config.token_store, TokenStoreKind::File(_)));
    assert_eq!(config.map_bounds, MAP_BOUNDS);
    assert!(config.validate().is_ok());
}

/// Default regions behave as the map expects
#[test]
fn test_default_regions() {
    assert!(is_within_bounds(36.9914, -122.0609, &EVENT_BOUNDS));
    assert!(is_within_bounds(EVENT_BOUNDS.north, EVENT_BOUNDS.west, &EVENT_BOUNDS));
    assert!(!is_within_bounds(37.7749, -122.4194, &EVENT_BOUNDS));
    assert!(is_within_bounds(37.15, -122.40, &MAP_BOUNDS));
}

/// Commands drive the clients end to end
#[tokio::test]
async fn test_shell_commands() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/state")
        .with_status(200)
        .with_body(
            json!({"status": 200, "state": {"events": [{
                "eventId": "evt1",
                "title": "Glow Run",
                "description": "5k around the loop",
                "startTime": "2025-04-01T03:00:00Z",
                "endTime": "2025-04-01T04:00:00Z",
                "category": "sports",
                "address": "East Field",
                "location": {"latitude": 36.9940, "longitude": -122.0550},
                "ownerEmail": "host@ucsc.edu"
            }]}})
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("POST", "/rsvp/evt1")
        .with_status(200)
        .with_body(json!({"message": "RSVP successful"}).to_string())
        .create_async()
        .await;
    server
        .mock("GET", "/logout")
        .with_status(200)
        .create_async()
        .await;

    let config = Config::for_backend(&server.url()).unwrap();
    let store = Arc::new(MemoryTokenStore::with_token("test-token"));
    let client = MapClient::new(&config, session(), store).unwrap();
    client.start().await;
    let ctx = CommandContext::new(client, config.tz().unwrap());

    let reply = dispatch(&ctx, Command::parse("list").unwrap()).await;
    assert!(reply.text.contains("Glow Run"));

    let reply = dispatch(&ctx, Command::parse("rsvp evt1").unwrap()).await;
    assert!(!reply.text.starts_with("Error"));

    let reply = dispatch(&ctx, Command::parse("show evt1").unwrap()).await;
    assert!(reply.text.contains("You're going"));

    let reply = dispatch(&ctx, Command::parse("show nope").unwrap()).await;
    assert!(reply.text.starts_with("Error"));

    let reply = dispatch(&ctx, Command::parse("signout").unwrap()).await;
    assert!(reply.quit);
    assert_eq!(reply.navigation, Some(Navigation::Login));
    assert!(ctx.client.state().read().await.events.is_empty());
}

/// A draft without a location starts at the middle of the map
#[tokio::test]
async fn test_create_command_places_unlocated_draft() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/create_event")
        .match_header("authorization", "Bearer test-token")
        .match_body(Matcher::PartialJson(json!({
            "title": "Study Jam",
            "host": "me@ucsc.edu"
        })))
        .with_status(201)
        .with_body(json!({"message": "Event created", "eventId": "new1"}).to_string())
        .create_async()
        .await;
    server
        .mock("GET", "/state")
        .with_status(503)
        .create_async()
        .await;

    let config = Config::for_backend(&server.url()).unwrap();
    let store = Arc::new(MemoryTokenStore::with_token("test-token"));
    let client = MapClient::new(&config, session(), store).unwrap();
    let ctx = CommandContext::new(client, config.tz().unwrap());

    let path = std::env::temp_dir().join(format!("draft-{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(
        &path,
        "title = \"Study Jam\"\n\
         description = \"Finals prep\"\n\
         start_time = \"2025-04-02T18:00\"\n\
         end_time = \"2025-04-02T20:00\"\n\
         category = \"academic\"\n\
         address = \"McHenry Library\"\n",
    )
    .unwrap();

    let reply = dispatch(&ctx, Command::parse(&format!("create {}", path.display())).unwrap()).await;
    std::fs::remove_file(&path).ok();
    assert_eq!(reply.text, "Created Study Jam (new1)");

    let map = ctx.client.state().read().await;
    let location = map.event("new1").unwrap().location;
    let center = MAP_BOUNDS.center();
    assert!((location.lat - center.lat).abs() < 1e-9);
    assert!((location.lng - center.lng).abs() < 1e-9);
    assert!(is_within_bounds(location.lat, location.lng, &EVENT_BOUNDS));
    create.assert_async().await;
}
