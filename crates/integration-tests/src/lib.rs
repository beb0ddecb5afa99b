//! Integration test support for basket.
//!
//! [`FakeBackend`] is an in-process axum server speaking the cart backend's
//! REST protocol against an in-memory cart. Tests point a real
//! [`BackendClient`](basket_cart::BackendClient) at it and inject failures
//! per endpoint.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p basket-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::header::{AUTHORIZATION, RETRY_AFTER};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch};
use axum::{Json, Router};
use basket_cart::backend::types::{
    AddLineRequest, ImageRecord, LineRecord, LinesResponse, MoneyRecord, ProductRecord,
    QuantityChangeRequest, VariantChangeRequest,
};
use basket_cart::config::BackendConfig;
use secrecy::SecretString;
use url::Url;

/// Bearer token the fake backend accepts.
pub const TOKEN: &str = "kX9#mQ2$vL7@pR4!";

/// Backend endpoints that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    List,
    Add,
    Remove,
    Quantity,
    Variant,
    Product,
}

/// How an injected failure answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// 500 Internal Server Error.
    Unavailable,
    /// 429 with the given `Retry-After` seconds.
    RateLimited(u64),
}

#[derive(Default)]
struct FakeState {
    lines: Mutex<Vec<LineRecord>>,
    products: Mutex<HashMap<String, ProductRecord>>,
    failures: Mutex<HashMap<Endpoint, Failure>>,
    rejected_products: Mutex<HashSet<String>>,
    next_id: AtomicUsize,
    requests: AtomicUsize,
    hits: Mutex<HashMap<Endpoint, usize>>,
}

type Reply<T> = Result<Json<T>, Response>;

/// In-process cart backend.
pub struct FakeBackend {
    addr: SocketAddr,
    state: Arc<FakeState>,
}

impl FakeBackend {
    /// Start a backend serving `products` on an ephemeral port.
    pub async fn start(products: impl IntoIterator<Item = ProductRecord>) -> Self {
        let state = Arc::new(FakeState::default());
        {
            let mut catalog = state.products.lock().unwrap();
            for product in products {
                catalog.insert(product.id.clone(), product);
            }
        }

        let api = Router::new()
            .route("/cart/lines", get(list_lines).post(add_line))
            .route("/cart/lines/{id}", axum::routing::delete(remove_line))
            .route("/cart/lines/{id}/quantity", patch(change_quantity))
            .route("/cart/lines/{id}/variant", patch(change_variant))
            .route("/products/{id}", get(get_product))
            .with_state(state.clone());
        let app = Router::new().nest("/v1", api);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    /// Base URL of the API.
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}/v1/", self.addr)).unwrap()
    }

    /// Client configuration pointing at this backend.
    pub fn config(&self) -> BackendConfig {
        self.config_with_token(TOKEN)
    }

    /// Client configuration with an arbitrary token.
    pub fn config_with_token(&self, token: &str) -> BackendConfig {
        BackendConfig {
            base_url: self.base_url(),
            api_token: SecretString::from(token),
            timeout: Duration::from_secs(5),
        }
    }

    /// Make every call to `endpoint` fail until [`FakeBackend::recover`].
    pub fn fail(&self, endpoint: Endpoint, failure: Failure) {
        self.state.failures.lock().unwrap().insert(endpoint, failure);
    }

    /// Clear all injected failures.
    pub fn recover(&self) {
        self.state.failures.lock().unwrap().clear();
        self.state.rejected_products.lock().unwrap().clear();
    }

    /// Reject adds of one product with 422.
    pub fn reject_product(&self, product_id: &str) {
        self.state
            .rejected_products
            .lock()
            .unwrap()
            .insert(product_id.to_string());
    }

    /// Lines in the server cart.
    pub fn lines(&self) -> Vec<LineRecord> {
        self.state.lines.lock().unwrap().clone()
    }

    /// Replace the server cart verbatim, malformed lines included.
    pub fn set_lines(&self, lines: Vec<LineRecord>) {
        *self.state.lines.lock().unwrap() = lines;
    }

    /// Add a line as another device would.
    pub fn seed_line(&self, product_id: &str, quantity: i64, variant: Option<&str>) -> String {
        let product = self.state.products.lock().unwrap()[product_id].clone();
        let id = self.state.issue_id();
        self.state.lines.lock().unwrap().push(LineRecord {
            id: Some(id.clone()),
            quantity,
            variant: variant.map(str::to_string),
            product,
        });
        id
    }

    /// Authorized requests served so far.
    pub fn request_count(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// Authorized requests served by one endpoint.
    pub fn hits(&self, endpoint: Endpoint) -> usize {
        self.state
            .hits
            .lock()
            .unwrap()
            .get(&endpoint)
            .copied()
            .unwrap_or(0)
    }
}

impl FakeState {
    fn issue_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("gid://cart/Line/{n}")
    }

    /// Check auth and injected failures for one request.
    fn admit(&self, headers: &HeaderMap, endpoint: Endpoint) -> Result<(), Response> {
        let expected = format!("Bearer {TOKEN}");
        let authorized = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected);
        if !authorized {
            return Err((StatusCode::UNAUTHORIZED, "invalid token").into_response());
        }

        self.requests.fetch_add(1, Ordering::SeqCst);
        *self.hits.lock().unwrap().entry(endpoint).or_default() += 1;

        match self.failures.lock().unwrap().get(&endpoint) {
            None => Ok(()),
            Some(Failure::Unavailable) => {
                Err((StatusCode::INTERNAL_SERVER_ERROR, "backend unavailable").into_response())
            }
            Some(Failure::RateLimited(secs)) => Err((
                StatusCode::TOO_MANY_REQUESTS,
                [(RETRY_AFTER, secs.to_string())],
                "slow down",
            )
                .into_response()),
        }
    }
}

fn not_found(what: &str) -> Response {
    (StatusCode::NOT_FOUND, format!("{what} not found")).into_response()
}

async fn list_lines(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
) -> Reply<LinesResponse> {
    state.admit(&headers, Endpoint::List)?;
    Ok(Json(LinesResponse {
        lines: state.lines.lock().unwrap().clone(),
    }))
}

async fn add_line(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Json(body): Json<AddLineRequest>,
) -> Reply<LineRecord> {
    state.admit(&headers, Endpoint::Add)?;

    if state
        .rejected_products
        .lock()
        .unwrap()
        .contains(&body.product_id)
    {
        return Err((StatusCode::UNPROCESSABLE_ENTITY, "product unavailable").into_response());
    }

    let Some(product) = state.products.lock().unwrap().get(&body.product_id).cloned() else {
        return Err(not_found("product"));
    };

    let mut lines = state.lines.lock().unwrap();
    if let Some(line) = lines
        .iter_mut()
        .find(|l| l.product.id == body.product_id && l.variant == body.variant)
    {
        line.quantity += i64::from(body.quantity);
        return Ok(Json(line.clone()));
    }

    let line = LineRecord {
        id: Some(state.issue_id()),
        quantity: i64::from(body.quantity),
        variant: body.variant,
        product,
    };
    lines.push(line.clone());
    Ok(Json(line))
}

async fn remove_line(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, Response> {
    state.admit(&headers, Endpoint::Remove)?;

    let mut lines = state.lines.lock().unwrap();
    let before = lines.len();
    lines.retain(|l| l.id.as_deref() != Some(id.as_str()));
    if lines.len() == before {
        return Err(not_found("line"));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn change_quantity(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<QuantityChangeRequest>,
) -> Result<StatusCode, Response> {
    state.admit(&headers, Endpoint::Quantity)?;

    let mut lines = state.lines.lock().unwrap();
    let Some(line) = lines.iter_mut().find(|l| l.id.as_deref() == Some(id.as_str())) else {
        return Err(not_found("line"));
    };
    line.quantity += body.delta;
    lines.retain(|l| l.quantity > 0);
    Ok(StatusCode::NO_CONTENT)
}

async fn change_variant(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<VariantChangeRequest>,
) -> Result<StatusCode, Response> {
    state.admit(&headers, Endpoint::Variant)?;

    let mut lines = state.lines.lock().unwrap();
    let Some(index) = lines
        .iter()
        .position(|l| l.id.as_deref() == Some(id.as_str()))
    else {
        return Err(not_found("line"));
    };

    let product_id = lines[index].product.id.clone();
    let clash = lines.iter().enumerate().any(|(i, l)| {
        i != index && l.product.id == product_id && l.variant.as_deref() == Some(&body.variant)
    });
    if clash {
        return Err((StatusCode::CONFLICT, "variant already in cart").into_response());
    }

    lines[index].variant = Some(body.variant);
    Ok(StatusCode::NO_CONTENT)
}

async fn get_product(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply<ProductRecord> {
    state.admit(&headers, Endpoint::Product)?;
    state
        .products
        .lock()
        .unwrap()
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| not_found("product"))
}

// =============================================================================
// Fixtures
// =============================================================================

/// A USD product record.
pub fn product(id: &str, title: &str, amount: &str) -> ProductRecord {
    ProductRecord {
        id: id.to_string(),
        title: title.to_string(),
        price: MoneyRecord {
            amount: amount.to_string(),
            currency_code: "USD".to_string(),
        },
        images: vec![ImageRecord {
            url: format!("https://cdn.shop.test/{id}.jpg"),
        }],
    }
}

/// The default test catalog.
pub fn catalog() -> Vec<ProductRecord> {
    vec![
        product("P1", "Dried Pineapple", "5.00"),
        product("P2", "Pineapple Chips", "2.50"),
        product("P3", "Pineapple Tee", "20.00"),
    ]
}

/// A fresh cart file path in the system temp dir.
pub fn temp_cart_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("basket-it-{}", uuid::Uuid::new_v4()))
        .join("cart.json")
}
