//! Contract Test: ACME DNS-01 Challenge Records
//!
//! Constraints verified:
//! - A token can only publish challenges for names it controls
//! - Rejected requests issue no remote call
//! - Cleanup is best-effort and never fails the caller
//!
//! If this test fails, one client could obtain certificates for another's names.

mod common;

use common::*;
use dnsreg_core::{EngineEvent, Error, ErrorKind};
use tokio_test::{assert_err, assert_ok};

async fn registered(h: &Harness) -> String {
    h.engine
        .register("myhome", "cam1", "", ip("192.0.2.10"))
        .await
        .unwrap()
        .as_str()
        .to_string()
}

#[tokio::test]
async fn challenge_for_main_name_is_published_and_cleared() {
    let mut h = Harness::new();
    let token = registered(&h).await;
    h.drain_events();

    assert_ok!(
        h.engine
            .add_challenge_record(&token, "myhome", "abc123")
            .await
    );
    assert_eq!(
        h.txt("_acme-challenge.myhome.example.net").await,
        values(&["abc123"])
    );

    assert_ok!(h.engine.remove_challenge_record(&token, "myhome").await);
    assert_eq!(h.txt("_acme-challenge.myhome.example.net").await, None);

    assert_eq!(
        h.drain_events(),
        vec![
            EngineEvent::ChallengePublished {
                hostname: "myhome".to_string(),
                name: "_acme-challenge.myhome.example.net".to_string(),
            },
            EngineEvent::ChallengeCleared {
                hostname: "myhome".to_string(),
                name: "_acme-challenge.myhome.example.net".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn challenge_for_subzone_sits_under_the_host() {
    let h = Harness::new();
    let token = registered(&h).await;

    assert_ok!(h.engine.add_challenge_record(&token, "cam1", "v1").await);
    assert_ok!(h.engine.add_challenge_record(&token, "cam1", "v2").await);

    // Concurrent challenges for one name coexist
    assert_eq!(
        h.txt("_acme-challenge.cam1.myhome.example.net").await,
        values(&["v1", "v2"])
    );
}

#[tokio::test]
async fn foreign_domain_is_not_owned() {
    let h = Harness::new();
    let token = registered(&h).await;
    h.engine
        .register("otherhome", "", "", ip("192.0.2.20"))
        .await
        .unwrap();
    h.provider.clear_calls();

    for domain in ["otherhome", "cam2", "myhome.example.net"] {
        let err = h
            .engine
            .add_challenge_record(&token, domain, "abc123")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DomainNotOwned(_)), "{}", domain);
    }
    let err = h
        .engine
        .remove_challenge_record(&token, "otherhome")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DomainNotOwned);

    assert!(h.provider.calls().is_empty());
}

#[tokio::test]
async fn empty_fields_are_bad_input() {
    let h = Harness::new();
    let token = registered(&h).await;
    h.provider.clear_calls();

    let err = h
        .engine
        .add_challenge_record(&token, "", "abc123")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadInput);

    let err = h
        .engine
        .add_challenge_record(&token, "myhome", "")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadInput);

    let err = h
        .engine
        .remove_challenge_record(&token, "")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadInput);

    assert!(h.provider.calls().is_empty());
}

#[tokio::test]
async fn unknown_token_cannot_touch_challenges() {
    let h = Harness::new();
    registered(&h).await;
    h.provider.clear_calls();

    let bogus = "00000000000000000000000000000000";
    assert!(matches!(
        h.engine.add_challenge_record(bogus, "myhome", "x").await,
        Err(Error::UnknownToken)
    ));
    assert!(matches!(
        h.engine.remove_challenge_record(bogus, "myhome").await,
        Err(Error::UnknownToken)
    ));
    assert!(h.provider.calls().is_empty());
}

#[tokio::test]
async fn publish_failure_is_reported() {
    let h = Harness::new();
    let token = registered(&h).await;
    h.provider.fail_add_for(Some("_acme-challenge."));

    let err = assert_err!(
        h.engine
            .add_challenge_record(&token, "myhome", "abc123")
            .await
    );
    assert_eq!(err.kind(), ErrorKind::Internal);
}

#[tokio::test]
async fn cleanup_failure_is_not_fatal() {
    let h = Harness::new();
    let token = registered(&h).await;
    assert_ok!(
        h.engine
            .add_challenge_record(&token, "myhome", "abc123")
            .await
    );
    h.provider.fail_delete(true);

    assert_ok!(h.engine.remove_challenge_record(&token, "myhome").await);
}
