//! Shared state under many simultaneous request workers.

use anyhow::Result;
use sparring::auth::{
    AuthError, RateLimiter, RotationScheduler, Secret, SecretStore, TokenConfig, TokenService,
};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::Barrier;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_admission_is_exact() -> Result<()> {
    let limiter = Arc::new(RateLimiter::new(5, Duration::from_secs(60)));
    let callers = 64;
    let barrier = Arc::new(Barrier::new(callers));
    let admitted = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..callers)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            let barrier = Arc::clone(&barrier);
            let admitted = Arc::clone(&admitted);
            tokio::spawn(async move {
                barrier.wait().await;
                if limiter.admit("192.0.2.1") {
                    admitted.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.await?;
    }

    assert_eq!(admitted.load(Ordering::SeqCst), 5);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn verification_keeps_working_during_rotation() -> Result<()> {
    let store = Arc::new(SecretStore::new(Secret::from("s0"), Vec::new(), 3)?);
    let tokens = Arc::new(TokenService::new(Arc::clone(&store), TokenConfig::default()));

    let rotation = RotationScheduler::start(Arc::clone(&store), Duration::from_millis(5))?;

    let verifiers: Vec<_> = (0..4u64)
        .map(|subject| {
            let tokens = Arc::clone(&tokens);
            tokio::spawn(async move {
                for _ in 0..200 {
                    // issued and checked back to back, so at most a couple of
                    // rotations can happen in between
                    let credential = tokens.issue_access(subject)?;
                    let verified = tokens.verify(&credential.token)?;
                    assert_eq!(verified.subject_id, subject);
                    tokio::task::yield_now().await;
                }
                Ok::<_, AuthError>(())
            })
        })
        .collect();

    for verifier in verifiers {
        verifier.await??;
    }

    rotation.stop().await;
    Ok(())
}

#[test]
fn scenario_three_rotations_then_eviction() -> Result<()> {
    let store = Arc::new(SecretStore::new(Secret::from("s0"), Vec::new(), 3)?);
    let tokens = TokenService::new(Arc::clone(&store), TokenConfig::default());
    let token = tokens.issue_access(100)?.token;

    for _ in 0..3 {
        store.rotate(Secret::generate());
    }
    assert_eq!(tokens.verify(&token)?.subject_id, 100);

    store.rotate(Secret::generate());
    assert_eq!(
        tokens.verify(&token),
        Err(AuthError::InvalidOrExpiredCredential)
    );
    Ok(())
}

#[test]
fn scenario_login_throttling() {
    let limiter = RateLimiter::default();
    let t0 = std::time::Instant::now();

    for second in 0..5 {
        assert!(limiter.admit_at("1.2.3.4", t0 + Duration::from_secs(second)));
    }
    assert!(!limiter.admit_at("1.2.3.4", t0 + Duration::from_secs(5)));
    assert!(limiter.admit_at("1.2.3.4", t0 + Duration::from_secs(61)));
}
