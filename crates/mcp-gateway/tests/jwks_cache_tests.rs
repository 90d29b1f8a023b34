//! JWKS cache tests against a mocked identity provider.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use futures::future::join_all;
use gateway_test_utils::{jwks_json, test_keypair, test_keypair_2, JWKS_PATH};
use mcp_gateway::auth::{HttpKeySource, JwksCache, JwksError, KeySource};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn cache_for(server: &MockServer, timeout: Duration) -> Arc<JwksCache> {
    let source = HttpKeySource::new(format!("{}{}", server.uri(), JWKS_PATH), timeout);
    Arc::new(JwksCache::new(Arc::new(source)))
}

async fn serve(server: &MockServer, body: serde_json::Value, expected_fetches: u64) {
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(expected_fetches)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_first_resolve_fetches_then_hits() {
    let server = MockServer::start().await;
    serve(&server, jwks_json(&[&test_keypair()]), 1).await;
    let cache = cache_for(&server, Duration::from_secs(2));

    assert!(cache.is_empty().await);

    let first = cache.resolve(&test_keypair().kid).await.unwrap();
    let second = cache.resolve(&test_keypair().kid).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.n, test_keypair().n);
    assert_eq!(first.e, test_keypair().e);
}

#[tokio::test]
async fn test_concurrent_misses_share_one_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(jwks_json(&[&test_keypair()]))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    let cache = cache_for(&server, Duration::from_secs(2));
    let kid = test_keypair().kid;

    let results = join_all((0..20).map(|_| {
        let cache = cache.clone();
        let kid = kid.clone();
        tokio::spawn(async move { cache.resolve(&kid).await })
    }))
    .await;

    for result in results {
        assert!(result.unwrap().is_ok());
    }
}

#[tokio::test]
async fn test_each_unknown_kid_triggers_refetch() {
    let server = MockServer::start().await;
    serve(&server, jwks_json(&[&test_keypair()]), 2).await;
    let cache = cache_for(&server, Duration::from_secs(2));

    assert!(matches!(
        cache.resolve("missing-1").await,
        Err(JwksError::KeyNotFound)
    ));
    assert!(matches!(
        cache.resolve("missing-2").await,
        Err(JwksError::KeyNotFound)
    ));

    // The known key was admitted by the first fetch
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn test_unusable_keys_are_skipped() {
    let server = MockServer::start().await;
    let keypair = test_keypair();
    serve(
        &server,
        json!({
            "keys": [
                {"kty": "EC", "kid": "ec-key", "crv": "P-256", "x": "abc", "y": "def"},
                {"kty": "RSA", "kid": "enc-key", "use": "enc", "n": keypair.n, "e": "AQAB"},
                {"kty": "RSA", "kid": "ps-key", "alg": "PS256", "n": keypair.n, "e": "AQAB"},
                {"kty": "RSA", "n": keypair.n, "e": "AQAB"},
                {"kty": "RSA", "kid": "empty-n", "n": "", "e": "AQAB"},
                keypair.jwk_json(),
            ]
        }),
        1,
    )
    .await;
    let cache = cache_for(&server, Duration::from_secs(2));

    assert!(cache.resolve(&keypair.kid).await.is_ok());
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn test_server_error_is_fetch_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let cache = cache_for(&server, Duration::from_secs(2));

    let result = cache.resolve(&test_keypair().kid).await;

    assert!(matches!(result, Err(JwksError::FetchFailed(_))));
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(jwks_json(&[&test_keypair()]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    let cache = cache_for(&server, Duration::from_millis(300));

    let started = std::time::Instant::now();
    let result = cache.resolve(&test_keypair().kid).await;

    assert!(matches!(result, Err(JwksError::FetchFailed(_))));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_failed_fetch_is_retried_on_next_miss() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    serve(&server, jwks_json(&[&test_keypair()]), 1).await;
    let cache = cache_for(&server, Duration::from_secs(2));

    assert!(cache.resolve(&test_keypair().kid).await.is_err());
    assert!(cache.resolve(&test_keypair().kid).await.is_ok());
}

#[tokio::test]
async fn test_refetch_keeps_withdrawn_keys() {
    let server = MockServer::start().await;
    serve(&server, jwks_json(&[&test_keypair()]), 1).await;
    let cache = cache_for(&server, Duration::from_secs(2));
    cache.resolve(&test_keypair().kid).await.unwrap();

    server.reset().await;
    serve(&server, jwks_json(&[&test_keypair_2()]), 1).await;
    cache.resolve(&test_keypair_2().kid).await.unwrap();

    // The rotated-out key stays cached alongside the new one
    assert_eq!(cache.len().await, 2);
    assert!(cache.resolve(&test_keypair().kid).await.is_ok());
}

#[tokio::test]
async fn test_http_source_returns_raw_keys() {
    let server = MockServer::start().await;
    serve(
        &server,
        jwks_json(&[&test_keypair(), &test_keypair_2()]),
        1,
    )
    .await;
    let source = HttpKeySource::new(
        format!("{}{}", server.uri(), JWKS_PATH),
        Duration::from_secs(2),
    );

    let keys = source.fetch().await.unwrap();

    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0].kty, "RSA");
    assert_eq!(keys[0].kid.as_deref(), Some(test_keypair().kid.as_str()));
}
