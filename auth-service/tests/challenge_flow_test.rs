//! Ephemeral challenge lifecycle against the in-memory store.

use auth_service::services::challenge::{
    self, expiry_millis, LoginChallenge, SetupStage,
};
use auth_service::services::{MockEphemeralStore, ServiceError};
use uuid::Uuid;

fn pending_login(ttl_seconds: i64) -> LoginChallenge {
    LoginChallenge {
        user_id: Uuid::new_v4(),
        organization_id: Uuid::new_v4(),
        email: "member@example.com".to_string(),
        role_id: Uuid::new_v4(),
        expires_at: expiry_millis(ttl_seconds),
    }
}

#[tokio::test]
async fn two_consumers_one_challenge_only_one_wins() {
    let store = MockEphemeralStore::new();
    let id = challenge::mint_verification_challenge(&store, &pending_login(300), 300)
        .await
        .unwrap();

    let first = challenge::consume_verification_challenge(&store, &id).await;
    let second = challenge::consume_verification_challenge(&store, &id).await;

    assert!(first.is_ok());
    assert!(matches!(second, Err(ServiceError::MfaChallengeInvalid)));
}

#[tokio::test]
async fn stale_challenge_is_reported_as_expired() {
    let store = MockEphemeralStore::new();
    // Store TTL has not fired yet (mock never evicts), but the embedded
    // expiry is authoritative
    let id = challenge::mint_verification_challenge(&store, &pending_login(-1), 300)
        .await
        .unwrap();

    assert!(matches!(
        challenge::consume_verification_challenge(&store, &id).await,
        Err(ServiceError::MfaChallengeExpired)
    ));
}

#[tokio::test]
async fn setup_and_verification_tokens_do_not_cross() {
    let store = MockEphemeralStore::new();
    let pending = pending_login(1800);

    let setup_id = challenge::mint_login_setup_challenge(&store, &pending, 1800)
        .await
        .unwrap();

    // The setup token cannot drive the verification path
    assert!(matches!(
        challenge::peek_verification_challenge(&store, &setup_id).await,
        Err(ServiceError::MfaChallengeInvalid)
    ));

    // But it resolves through the setup lookup, in the login namespace
    let (key, _) = challenge::find_setup_token(&store, &setup_id)
        .await
        .unwrap()
        .expect("setup token should resolve");
    assert!(key.starts_with(challenge::LOGIN_SETUP_PREFIX));
}

#[tokio::test]
async fn staged_secret_survives_wrong_code_until_consumed() {
    let store = MockEphemeralStore::new();
    let stage = SetupStage {
        user_id: Uuid::new_v4(),
        organization_id: Uuid::new_v4(),
        user_email: "member@example.com".to_string(),
        secret: "JBSWY3DPEHPK3PXP".to_string(),
        backup_codes: vec!["AAAA1111".to_string(), "BBBB2222".to_string()],
        otp_label: "Acme:member@example.com".to_string(),
        expires_at: expiry_millis(600),
    };

    let id = challenge::stage_setup(&store, &stage, 600).await.unwrap();

    // Peeking (as a failed confirmation attempt would) does not consume
    let peeked = challenge::peek_setup_stage(&store, &id).await.unwrap();
    assert_eq!(peeked.secret, stage.secret);
    assert!(challenge::peek_setup_stage(&store, &id).await.is_ok());

    // Confirmation consumes exactly once
    assert!(challenge::consume_setup_stage(&store, &id).await.is_ok());
    assert!(matches!(
        challenge::consume_setup_stage(&store, &id).await,
        Err(ServiceError::MfaChallengeInvalid)
    ));
}

#[tokio::test]
async fn discarded_login_setup_token_stops_resolving() {
    let store = MockEphemeralStore::new();
    let id = challenge::mint_login_setup_challenge(&store, &pending_login(1800), 1800)
        .await
        .unwrap();

    challenge::discard_login_setup_challenge(&store, &id)
        .await
        .unwrap();

    assert!(challenge::find_setup_token(&store, &id)
        .await
        .unwrap()
        .is_none());
}
