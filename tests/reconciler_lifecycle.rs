//! End-to-end lifecycle tests driving the reconciler over in-memory
//! collaborators: feeds, store, chat, and the replay feed.

mod fixtures;

use chrono::{Duration, Utc};
use fixtures::*;
use lobby_herald::store::{AlertStore, LobbyStore};
use lobby_herald::types::MessageRef;
use tokio_test::assert_ok;

#[tokio::test]
async fn test_new_lobby_is_posted_and_persisted() {
    let h = harness();
    h.store.upsert_alert(&map_alert("100", "dota")).await.unwrap();
    let l = lobby("Game", "Host", "DotA Allstars");
    h.primary.set_lobbies(vec![l.clone()]);

    let stats = tokio_test::assert_ok!(h.reconciler.run_cycle(Utc::now()).await);

    assert_eq!(stats.found, 1);
    assert_eq!(stats.new, 1);
    assert_eq!(h.chat.created_in("100").len(), 1);
    // The first successful poll announces the data source to the operator
    assert_eq!(h.chat.created_in(OPERATOR_CHANNEL).len(), 1);

    let stored = h.store.get_lobby(l.id).await.unwrap().unwrap();
    assert_eq!(stored.messages.len(), 1);
    assert_eq!(stored.messages[0].channel, "100");
}

#[tokio::test]
async fn test_non_matching_lobby_is_tracked_without_messages() {
    let h = harness();
    h.store.upsert_alert(&map_alert("100", "wintermaul")).await.unwrap();
    let l = lobby("Game", "Host", "DotA Allstars");
    h.primary.set_lobbies(vec![l.clone()]);

    let stats = h.reconciler.run_cycle(Utc::now()).await.unwrap();

    assert_eq!(stats.new, 1);
    assert!(h.chat.created_in("100").is_empty());
    let stored = h.store.get_lobby(l.id).await.unwrap().unwrap();
    assert!(stored.messages.is_empty());
}

#[tokio::test]
async fn test_unchanged_lobby_is_stable_on_second_cycle() {
    let h = harness();
    h.store.upsert_alert(&map_alert("100", "dota")).await.unwrap();
    h.primary
        .set_lobbies(vec![lobby("Game", "Host", "DotA Allstars")]);

    let t0 = Utc::now();
    h.reconciler.run_cycle(t0).await.unwrap();
    let stats = h.reconciler.run_cycle(t0 + Duration::seconds(10)).await.unwrap();

    assert_eq!(stats.stable, 1);
    assert_eq!(stats.new, 0);
    assert_eq!(h.chat.created_in("100").len(), 1);
    assert!(h.chat.edited().is_empty());
}

#[tokio::test]
async fn test_slot_change_triggers_alive_update() {
    let h = harness();
    h.store.upsert_alert(&map_alert("100", "dota")).await.unwrap();
    let mut l = lobby("Game", "Host", "DotA Allstars");
    h.primary.set_lobbies(vec![l.clone()]);

    let t0 = Utc::now();
    h.reconciler.run_cycle(t0).await.unwrap();

    l.slots_taken = 7;
    h.primary.set_lobbies(vec![l.clone()]);
    let stats = h.reconciler.run_cycle(t0 + Duration::seconds(10)).await.unwrap();

    assert_eq!(stats.updated, 1);
    assert_eq!(h.chat.edits_in("100").len(), 1);
    let stored = h.store.get_lobby(l.id).await.unwrap().unwrap();
    assert_eq!(stored.slots_taken, 7);
}

#[tokio::test]
async fn test_vanished_lobby_walks_grace_period_before_dying() {
    let h = harness();
    h.store.upsert_alert(&map_alert("100", "dota")).await.unwrap();
    let l = lobby("Game", "Host", "DotA Allstars");
    let decoy = lobby("Other", "H2", "Wintermaul");
    let t0 = Utc::now();
    h.primary.set_lobbies(vec![l.clone(), decoy.clone()]);
    h.reconciler.run_cycle(t0).await.unwrap();

    // The lobby disappears from the poll
    h.primary.set_lobbies(vec![decoy.clone()]);
    let t1 = t0 + Duration::seconds(10);
    let stats = h.reconciler.run_cycle(t1).await.unwrap();
    assert_eq!(stats.missing, 1);
    let stored = h.store.get_lobby(l.id).await.unwrap().unwrap();
    assert!(stored.dead_at.is_some());
    assert!(!stored.dead);

    // Still inside the grace period
    let stats = h
        .reconciler
        .run_cycle(t1 + Duration::minutes(4))
        .await
        .unwrap();
    assert_eq!(stats.dying, 1);
    assert_eq!(stats.dead, 0);

    // Grace expired: declared dead, retained for replay correlation
    let stats = h
        .reconciler
        .run_cycle(t1 + Duration::minutes(6))
        .await
        .unwrap();
    assert_eq!(stats.dead, 1);
    let stored = h.store.get_lobby(l.id).await.unwrap().unwrap();
    assert!(stored.dead);
}

#[tokio::test]
async fn test_dead_lobby_without_messages_is_deleted_immediately() {
    let h = harness();
    let l = lobby("Game", "Host", "DotA Allstars");
    let decoy = lobby("Other", "H2", "Wintermaul");
    let t0 = Utc::now();
    h.primary.set_lobbies(vec![l.clone(), decoy.clone()]);
    h.reconciler.run_cycle(t0).await.unwrap();

    h.primary.set_lobbies(vec![decoy.clone()]);
    let t1 = t0 + Duration::seconds(10);
    h.reconciler.run_cycle(t1).await.unwrap();

    let stats = h
        .reconciler
        .run_cycle(t1 + Duration::minutes(6))
        .await
        .unwrap();
    assert_eq!(stats.dead, 1);
    assert!(h.store.get_lobby(l.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_dead_lobby_is_retired_when_replay_window_closes() {
    let h = harness();
    h.store.upsert_alert(&map_alert("100", "dota")).await.unwrap();
    let l = lobby("Game", "Host", "DotA Allstars");
    let decoy = lobby("Other", "H2", "Wintermaul");
    let t0 = Utc::now();
    h.primary.set_lobbies(vec![l.clone(), decoy.clone()]);
    h.reconciler.run_cycle(t0).await.unwrap();

    h.primary.set_lobbies(vec![decoy.clone()]);
    let t1 = t0 + Duration::seconds(10);
    h.reconciler.run_cycle(t1).await.unwrap();
    let dead_at = h
        .store
        .get_lobby(l.id)
        .await
        .unwrap()
        .unwrap()
        .dead_at
        .unwrap();
    h.reconciler.run_cycle(dead_at).await.unwrap();

    // Dead but still within the correlation window
    h.reconciler
        .run_cycle(dead_at + Duration::hours(12))
        .await
        .unwrap();
    assert!(h.store.get_lobby(l.id).await.unwrap().is_some());

    h.reconciler
        .run_cycle(dead_at + Duration::hours(25))
        .await
        .unwrap();
    assert!(h.store.get_lobby(l.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_reappearing_lobby_clears_grace_state() {
    let h = harness();
    h.store.upsert_alert(&map_alert("100", "dota")).await.unwrap();
    let l = lobby("Game", "Host", "DotA Allstars");
    let decoy = lobby("Other", "H2", "Wintermaul");
    let t0 = Utc::now();
    h.primary.set_lobbies(vec![l.clone(), decoy.clone()]);
    h.reconciler.run_cycle(t0).await.unwrap();

    h.primary.set_lobbies(vec![decoy.clone()]);
    let t1 = t0 + Duration::seconds(10);
    h.reconciler.run_cycle(t1).await.unwrap();

    h.primary.set_lobbies(vec![l.clone(), decoy.clone()]);
    let stats = h
        .reconciler
        .run_cycle(t1 + Duration::minutes(2))
        .await
        .unwrap();

    assert_eq!(stats.reappeared, 1);
    let stored = h.store.get_lobby(l.id).await.unwrap().unwrap();
    assert!(stored.dead_at.is_none());
    assert!(!stored.dead);
    // One missing edit plus one alive edit
    assert_eq!(h.chat.edits_in("100").len(), 2);
}

#[tokio::test]
async fn test_empty_poll_skips_reconciliation() {
    let h = harness();
    h.store.upsert_alert(&map_alert("100", "dota")).await.unwrap();
    let l = lobby("Game", "Host", "DotA Allstars");
    let t0 = Utc::now();
    h.primary.set_lobbies(vec![l.clone()]);
    h.reconciler.run_cycle(t0).await.unwrap();

    // Both feeds go dark; nothing may be marked missing
    h.primary.set_lobbies(Vec::new());
    let stats = h
        .reconciler
        .run_cycle(t0 + Duration::seconds(10))
        .await
        .unwrap();

    assert_eq!(stats.found, 0);
    assert_eq!(stats.missing, 0);
    let stored = h.store.get_lobby(l.id).await.unwrap().unwrap();
    assert!(stored.dead_at.is_none());
}

#[tokio::test]
async fn test_remake_of_dead_lobby_is_treated_as_new() {
    let h = harness();
    h.store.upsert_alert(&map_alert("100", "dota")).await.unwrap();
    let t0 = Utc::now();

    let mut prior = lobby("Game", "Host", "DotA Allstars");
    prior.dead = true;
    prior.dead_at = Some(t0 - Duration::minutes(1));
    prior.messages = vec![MessageRef {
        channel: "100".to_string(),
        message: "stale".to_string(),
    }];
    h.store.put_lobby(prior.id, &prior).await.unwrap();

    h.primary
        .set_lobbies(vec![lobby("Game", "Host", "DotA Allstars")]);
    let stats = h.reconciler.run_cycle(t0).await.unwrap();

    assert_eq!(stats.new, 1);
    assert_eq!(h.chat.created_in("100").len(), 1);
    let stored = h.store.get_lobby(prior.id).await.unwrap().unwrap();
    assert!(!stored.dead);
    assert_ne!(stored.messages[0].message, "stale");
}

#[tokio::test]
async fn test_record_under_stale_key_is_healed() {
    let h = harness();
    let l = lobby("Game", "Host", "DotA Allstars");
    h.store.put_lobby(999, &l).await.unwrap();
    h.primary.set_lobbies(vec![l.clone()]);

    let stats = h.reconciler.run_cycle(Utc::now()).await.unwrap();

    assert_eq!(stats.stable, 1);
    assert!(h.store.get_lobby(999).await.unwrap().is_none());
    assert!(h.store.get_lobby(l.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_replay_correlation_closes_vanished_lobby() {
    let h = harness();
    h.store.upsert_alert(&map_alert("100", "dota")).await.unwrap();
    let l = lobby("Game", "Host", "DotA Allstars");
    let decoy = lobby("Other", "H2", "Wintermaul");
    let t0 = Utc::now();
    h.primary.set_lobbies(vec![l.clone(), decoy.clone()]);
    h.reconciler.run_cycle(t0).await.unwrap();

    // A matching game record surfaces as the lobby vanishes
    h.replays
        .publish(replay(42, "Game", &["Host", "P2"]), "DotA Allstars");
    h.primary.set_lobbies(vec![decoy.clone()]);
    let stats = h
        .reconciler
        .run_cycle(t0 + Duration::seconds(10))
        .await
        .unwrap();

    // Correlation closes the lobby immediately, skipping the grace period
    assert_eq!(stats.dead, 1);
    assert_eq!(stats.missing, 0);
    assert!(h.store.get_lobby(l.id).await.unwrap().is_none());

    let edits = h.chat.edits_in("100");
    assert_eq!(edits.len(), 1);
    let replay_field = edits[0].payload.embeds[0]
        .fields
        .iter()
        .find(|f| f.name == "Replay")
        .expect("dead edit should carry the replay link");
    assert!(replay_field.value.ends_with("/42"));
}

#[tokio::test]
async fn test_replay_outage_falls_back_to_grace_period() {
    let h = harness();
    h.store.upsert_alert(&map_alert("100", "dota")).await.unwrap();
    let l = lobby("Game", "Host", "DotA Allstars");
    let decoy = lobby("Other", "H2", "Wintermaul");
    let t0 = Utc::now();
    h.primary.set_lobbies(vec![l.clone(), decoy.clone()]);
    h.reconciler.run_cycle(t0).await.unwrap();

    h.replays.set_fail(true);
    h.primary.set_lobbies(vec![decoy.clone()]);
    let stats = h
        .reconciler
        .run_cycle(t0 + Duration::seconds(10))
        .await
        .unwrap();

    assert_eq!(stats.missing, 1);
    assert!(h.store.get_lobby(l.id).await.unwrap().is_some());
}
