use std::time::Duration;

use super::support::*;
use crate::error::GameError;
use crate::rate_limit::{RateDelay, Unlimited};
use crate::registry::GameRegistry;
use tokio::sync::mpsc;

fn registry() -> GameRegistry {
    GameRegistry::new(test_config(), Unlimited)
}

#[tokio::test(start_paused = true)]
async fn test_create_and_find_ignore_case() {
    let registry = registry();
    let game = registry.create("10.0.0.1").unwrap();
    assert_eq!(game.code().len(), 4);

    let found = registry.find(&game.code().to_lowercase()).unwrap();
    assert!(std::sync::Arc::ptr_eq(&game, &found));
    assert_eq!(registry.codes().unwrap(), vec![game.code().to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_codes_are_unique() {
    let registry = registry();
    for _ in 0..200 {
        registry.create("10.0.0.1").unwrap();
    }
    let mut codes = registry.codes().unwrap();
    codes.sort();
    codes.dedup();
    assert_eq!(codes.len(), 200);
    assert_eq!(registry.len(), 200);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_code() {
    let registry = registry();
    assert_eq!(
        registry.find("ZZZZ").unwrap_err(),
        GameError::NotFound("Invalid game code, try again".to_string())
    );
    let (tx, _rx) = mpsc::unbounded_channel();
    assert!(matches!(registry.join("ZZZZ", "ann", tx).await, Err(GameError::NotFound(_))));
    assert!(registry.remove("ZZZZ").is_err());
}

#[tokio::test(start_paused = true)]
async fn test_creation_is_rate_limited() {
    let limiter = RateDelay::new(1, Duration::from_secs(5), Duration::from_secs(60), Duration::from_secs(30));
    let registry = GameRegistry::new(test_config(), limiter);
    registry.create("10.0.0.1").unwrap();
    assert!(matches!(
        registry.create("10.0.0.1"),
        Err(GameError::RateLimited { .. })
    ));
    registry.create("10.0.0.2").unwrap();
    assert_eq!(registry.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_join_through_registry() {
    let registry = registry();
    let game = registry.create("10.0.0.1").unwrap();
    let (tx, _rx) = mpsc::unbounded_channel();
    let ann = registry.join(game.code(), "ann", tx).await.unwrap();
    assert!(ann.is_leader());
    assert!(!game.is_dead());
}

#[tokio::test(start_paused = true)]
async fn test_reap_spares_new_games() {
    let registry = registry();
    registry.create("10.0.0.1").unwrap();
    assert_eq!(registry.reap().await.unwrap(), 0);

    tokio::time::advance(test_config().reap_interval()).await;
    assert_eq!(registry.reap().await.unwrap(), 1);
    assert!(registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reap_drops_games_whose_players_went_silent() {
    let registry = registry();
    let busy = registry.create("10.0.0.1").unwrap();
    let quiet = registry.create("10.0.0.1").unwrap();
    let _ann = TestClient::join(&busy, "ann").await;
    let bob = TestClient::join(&quiet, "bob").await;
    bob.go_silent();

    tokio::time::advance(test_config().reap_interval()).await;
    assert_eq!(registry.reap().await.unwrap(), 1);
    assert!(registry.find(busy.code()).is_ok());
    assert!(registry.find(quiet.code()).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_reaper_task_runs_on_interval() {
    let registry = registry();
    registry.create("10.0.0.1").unwrap();
    let reaper = registry.spawn_reaper();

    tokio::time::sleep(test_config().reap_interval() * 2 + Duration::from_secs(1)).await;
    assert!(registry.is_empty());
    reaper.abort();
}

#[tokio::test(start_paused = true)]
async fn test_remove() {
    let registry = registry();
    let game = registry.create("10.0.0.1").unwrap();
    registry.remove(game.code()).unwrap();
    assert!(registry.find(game.code()).is_err());
}
