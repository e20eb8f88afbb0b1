//! Contract Test: Update & Delete
//!
//! Constraints verified:
//! - Update changes (never deletes and re-adds) every address record
//! - Update is best-effort across records but always persists the address
//! - An unchanged address is a heartbeat that only refreshes the timestamp
//! - Delete removes every record the Host owns, even when some deletes fail
//! - Unknown tokens are rejected without side effects
//!
//! If this test fails, hosts can drift from their records.

mod common;

use common::*;
use dnsreg_core::{EngineEvent, Error, HostStore, RecordType};
use std::time::Duration;

#[tokio::test]
async fn update_moves_every_record() {
    let h = Harness::new();
    let t1 = h
        .engine
        .register("myhome", "cam1", "", ip("192.0.2.10"))
        .await
        .unwrap();
    let before = h.store.find_by_token(t1.as_str()).await.unwrap().unwrap();
    h.provider.clear_calls();
    tokio::time::sleep(Duration::from_millis(5)).await;

    h.engine
        .update(t1.as_str(), ip("10.0.0.2"))
        .await
        .expect("update succeeds");

    assert_eq!(h.a("myhome.example.net").await, values(&["10.0.0.2"]));
    assert_eq!(h.a("cam1.myhome.example.net").await, values(&["10.0.0.2"]));

    let mutations: Vec<Call> = h
        .provider
        .calls()
        .into_iter()
        .filter(Call::is_mutation)
        .collect();
    assert_eq!(mutations.len(), 2);
    assert!(mutations.iter().all(|c| matches!(c, Call::Change { .. })));

    let after = h.store.find_by_token(t1.as_str()).await.unwrap().unwrap();
    assert_eq!(after.ip, ip("10.0.0.2"));
    assert!(after.updated_at > before.updated_at);
}

#[tokio::test]
async fn same_address_is_a_heartbeat() {
    let mut h = Harness::new();
    let t1 = h
        .engine
        .register("myhome", "cam1", "", ip("192.0.2.10"))
        .await
        .unwrap();
    let before = h.store.find_by_token(t1.as_str()).await.unwrap().unwrap();
    h.provider.clear_calls();
    h.drain_events();
    tokio::time::sleep(Duration::from_millis(5)).await;

    h.engine.update(t1.as_str(), ip("192.0.2.10")).await.unwrap();

    assert_eq!(h.provider.mutation_count(), 0);
    let after = h.store.find_by_token(t1.as_str()).await.unwrap().unwrap();
    assert_eq!(after.ip, before.ip);
    assert!(after.updated_at > before.updated_at);
    assert_eq!(
        h.drain_events(),
        vec![EngineEvent::Heartbeat {
            hostname: "myhome".to_string()
        }]
    );
}

#[tokio::test]
async fn update_is_best_effort_across_records() {
    let h = Harness::new();
    let t1 = h
        .engine
        .register("myhome", "cam1,cam2", "", ip("192.0.2.10"))
        .await
        .unwrap();
    h.provider.clear_calls();
    h.provider.fail_change(true);

    h.engine
        .update(t1.as_str(), ip("10.0.0.2"))
        .await
        .expect("record failures do not fail the update");

    // Every record was attempted despite the failures
    let changes = h
        .provider
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Change { .. }))
        .count();
    assert_eq!(changes, 3);

    let host = h.store.find_by_token(t1.as_str()).await.unwrap().unwrap();
    assert_eq!(host.ip, ip("10.0.0.2"));
}

#[tokio::test]
async fn update_survives_unreachable_zone() {
    let h = Harness::new();
    let t1 = h
        .engine
        .register("myhome", "", "", ip("192.0.2.10"))
        .await
        .unwrap();
    h.provider.fail_get_zone(true);

    h.engine.update(t1.as_str(), ip("10.0.0.2")).await.unwrap();

    assert_eq!(h.a("myhome.example.net").await, values(&["10.0.0.2"]));
}

#[tokio::test]
async fn address_family_change_swaps_record_type() {
    let h = Harness::new();
    let t1 = h
        .engine
        .register("myhome", "cam1", "", ip("192.0.2.10"))
        .await
        .unwrap();

    h.engine
        .update(t1.as_str(), ip("2001:db8::2"))
        .await
        .unwrap();

    assert_eq!(h.a("myhome.example.net").await, None);
    assert_eq!(h.a("cam1.myhome.example.net").await, None);
    assert_eq!(h.aaaa("myhome.example.net").await, values(&["2001:db8::2"]));
    assert_eq!(h.aaaa("cam1.myhome.example.net").await, values(&["2001:db8::2"]));
}

#[tokio::test]
async fn delete_removes_host_and_all_records() {
    let h = Harness::new();
    let t1 = h
        .engine
        .register("myhome", "cam1", "", ip("192.0.2.10"))
        .await
        .unwrap();
    h.engine
        .add_challenge_record(t1.as_str(), "cam1", "proof")
        .await
        .unwrap();
    h.engine
        .update(t1.as_str(), ip("10.0.0.2"))
        .await
        .unwrap();

    h.engine.delete(t1.as_str()).await.expect("delete succeeds");

    assert!(h.store.find_by_hostname("myhome").await.unwrap().is_none());
    assert_eq!(h.record_count().await, 0);

    // Deleted tokens are unknown from then on
    let err = h.engine.update(t1.as_str(), ip("10.0.0.3")).await.unwrap_err();
    assert!(matches!(err, Error::UnknownToken));
}

#[tokio::test]
async fn delete_tolerates_remote_failures() {
    let h = Harness::new();
    let t1 = h
        .engine
        .register("myhome", "cam1", "", ip("192.0.2.10"))
        .await
        .unwrap();
    h.provider.clear_calls();
    h.provider.fail_delete(true);
    h.provider.fail_get_zone(true);

    h.engine
        .delete(t1.as_str())
        .await
        .expect("delete succeeds while the zone misbehaves");

    assert!(h.store.is_empty().await);

    // Every possible challenge name, then sub-zone, then main record
    let deletes: Vec<(String, RecordType)> = h
        .provider
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Delete { name, record_type } => Some((name, record_type)),
            _ => None,
        })
        .collect();
    assert_eq!(
        deletes,
        vec![
            ("_acme-challenge.myhome.example.net".to_string(), RecordType::Txt),
            ("_acme-challenge.cam1.myhome.example.net".to_string(), RecordType::Txt),
            ("cam1.myhome.example.net".to_string(), RecordType::A),
            ("myhome.example.net".to_string(), RecordType::A),
        ]
    );
}

#[tokio::test]
async fn unknown_token_is_rejected() {
    let h = Harness::new();
    h.engine
        .register("myhome", "", "", ip("192.0.2.10"))
        .await
        .unwrap();
    h.provider.clear_calls();

    let bogus = "ffffffffffffffffffffffffffffffff";
    assert!(matches!(
        h.engine.update(bogus, ip("10.0.0.2")).await,
        Err(Error::UnknownToken)
    ));
    assert!(matches!(h.engine.delete(bogus).await, Err(Error::UnknownToken)));
    assert!(matches!(h.engine.delete("").await, Err(Error::UnknownToken)));

    assert!(h.provider.calls().is_empty());
    assert_eq!(h.a("myhome.example.net").await, values(&["192.0.2.10"]));
}

#[tokio::test]
async fn host_records_lists_only_owned_records() {
    let h = Harness::new();
    let t1 = h
        .engine
        .register("myhome", "cam1", "", ip("192.0.2.10"))
        .await
        .unwrap();
    h.engine
        .register("otherhome", "", "", ip("192.0.2.20"))
        .await
        .unwrap();
    h.engine
        .add_challenge_record(t1.as_str(), "myhome", "proof")
        .await
        .unwrap();

    let host = h.store.find_by_token(t1.as_str()).await.unwrap().unwrap();
    let records = h.engine.host_records(&host).await.unwrap();
    let mut lines: Vec<String> = records.iter().map(ToString::to_string).collect();
    lines.sort();

    assert_eq!(
        lines,
        vec![
            "_acme-challenge.myhome.example.net\tTXT\t60\tproof",
            "cam1.myhome.example.net\tA\t60\t192.0.2.10",
            "myhome.example.net\tA\t60\t192.0.2.10",
        ]
    );
}
