//! Integration tests for the REST cart gateway and catalog.
//!
//! A real `BackendClient` talks to the in-process fake backend over HTTP.

#![allow(clippy::unwrap_used)]

use basket_cart::backend::types::LineRecord;
use basket_cart::{ApiError, BackendClient, CartGateway, Catalog};
use basket_core::{LineId, ProductId};
use basket_integration_tests::{Endpoint, FakeBackend, Failure, catalog, product};

async fn setup() -> (FakeBackend, BackendClient) {
    let backend = FakeBackend::start(catalog()).await;
    let client = BackendClient::new(&backend.config()).unwrap();
    (backend, client)
}

// =============================================================================
// Cart lines
// =============================================================================

#[tokio::test]
async fn test_add_returns_server_line() {
    let (backend, client) = setup().await;

    let line = client
        .add(&ProductId::new("P1"), 2, Some("Large"))
        .await
        .unwrap();

    assert_eq!(line.line_id.as_str(), "gid://cart/Line/1");
    assert_eq!(line.quantity, 2);
    assert_eq!(line.selected_variant.as_deref(), Some("Large"));
    assert_eq!(line.product.display_name, "Dried Pineapple");
    assert_eq!(line.line_price().display(), "$10.00");
    assert_eq!(backend.lines().len(), 1);
}

#[tokio::test]
async fn test_line_ids_survive_path_encoding() {
    let (backend, client) = setup().await;
    let line = client.add(&ProductId::new("P1"), 1, None).await.unwrap();

    client.update_quantity(&line.line_id, 3).await.unwrap();
    assert_eq!(backend.lines()[0].quantity, 4);

    client.update_variant(&line.line_id, "Small").await.unwrap();
    assert_eq!(backend.lines()[0].variant.as_deref(), Some("Small"));

    client.remove(&line.line_id).await.unwrap();
    assert!(backend.lines().is_empty());
}

#[tokio::test]
async fn test_list_returns_server_order() {
    let (backend, client) = setup().await;
    backend.seed_line("P2", 1, None);
    backend.seed_line("P1", 2, Some("Large"));

    let lines = client.list().await.unwrap();
    let products: Vec<_> = lines.iter().map(|l| l.product_id.as_str()).collect();
    assert_eq!(products, vec!["P2", "P1"]);
}

#[tokio::test]
async fn test_list_skips_unusable_lines() {
    let (backend, client) = setup().await;
    let good = LineRecord {
        id: Some("gid://cart/Line/9".to_string()),
        quantity: 1,
        variant: None,
        product: product("P1", "Dried Pineapple", "5.00"),
    };
    let no_id = LineRecord {
        id: None,
        ..good.clone()
    };
    let local_id = LineRecord {
        id: Some("local-abc".to_string()),
        ..good.clone()
    };
    let zero = LineRecord {
        id: Some("gid://cart/Line/10".to_string()),
        quantity: 0,
        ..good.clone()
    };
    backend.set_lines(vec![no_id, good, local_id, zero]);

    let lines = client.list().await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].line_id, LineId::new("gid://cart/Line/9"));
}

#[tokio::test]
async fn test_remove_unknown_line_is_not_found() {
    let (_backend, client) = setup().await;
    let err = client.remove(&LineId::new("gid://cart/Line/404")).await;
    assert!(matches!(err, Err(ApiError::NotFound(_))));
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_server_error_maps_to_status() {
    let (backend, client) = setup().await;
    backend.fail(Endpoint::List, Failure::Unavailable);

    match client.list().await {
        Err(ApiError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert!(body.contains("unavailable"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rate_limit_reports_retry_after() {
    let (backend, client) = setup().await;
    backend.fail(Endpoint::Add, Failure::RateLimited(7));

    let err = client.add(&ProductId::new("P1"), 1, None).await;
    assert!(matches!(err, Err(ApiError::RateLimited(7))));
}

#[tokio::test]
async fn test_wrong_token_is_rejected() {
    let backend = FakeBackend::start(catalog()).await;
    let client = BackendClient::new(&backend.config_with_token("nope")).unwrap();

    let err = client.list().await;
    assert!(matches!(err, Err(ApiError::Status { status: 401, .. })));
    assert_eq!(backend.request_count(), 0);
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn test_catalog_lookup() {
    let (_backend, client) = setup().await;

    let product = client.get_product(&ProductId::new("P3")).await.unwrap();
    assert_eq!(product.display_name, "Pineapple Tee");
    assert_eq!(product.unit_price.display(), "$20.00");
    assert_eq!(
        product.featured_image(),
        Some("https://cdn.shop.test/P3.jpg")
    );
}

#[tokio::test]
async fn test_catalog_unknown_product() {
    let (_backend, client) = setup().await;

    match client.get_product(&ProductId::new("P404")).await {
        Err(ApiError::NotFound(id)) => assert_eq!(id, "P404"),
        other => panic!("expected not found, got {other:?}"),
    }
}
