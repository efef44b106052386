use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use dukaan_api::{app, auth::bootstrap_admin, AppState};
use dukaan_core::payment::{EasyPaisaGateway, EasyPaisaSettings, GatewayFields};
use dukaan_store::app_config::Config;
use dukaan_store::{LogEventPublisher, Repositories};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const ADMIN_EMAIL: &str = "admin@test.pk";
const ADMIN_PASSWORD: &str = "admin-password";
const EASYPAISA_STORE_ID: &str = "4321";
const EASYPAISA_HASH_KEY: &str = "HASHKEY123";

fn test_config() -> Config {
    serde_json::from_value(json!({
        "server": { "port": 0 },
        "storage": { "backend": "memory" },
        "database": { "url": "postgres://unused" },
        "auth": {
            "jwt_secret": "test-secret",
            "jwt_expiration_seconds": 3600,
            "admin_email": ADMIN_EMAIL,
            "admin_password": ADMIN_PASSWORD
        },
        "shop": {
            "name": "Test Shop",
            "shipping_fee": 25000,
            "free_shipping_threshold": 500000,
            "ip_salt": "salt"
        },
        "payments": {
            "easypaisa": {
                "enabled": true,
                "store_id": EASYPAISA_STORE_ID,
                "hash_key": EASYPAISA_HASH_KEY,
                "return_url": "https://shop.test/payments/easypaisa/callback"
            }
        }
    }))
    .expect("test config")
}

async fn test_app() -> Router {
    let config = test_config();
    let repos = Repositories::memory(3600);
    repos.seed_demo().await.expect("seed");
    bootstrap_admin(&repos, &config.auth).await.expect("admin");
    let (state, _worker) =
        AppState::new(&config, repos, None, Arc::new(LogEventPublisher)).expect("state");
    app(state)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(req).await.expect("response");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, headers, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request")
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn with_bearer(mut req: Request<Body>, token: &str) -> Request<Body> {
    req.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {}", token).parse().expect("header"),
    );
    req
}

async fn login(app: &Router, email: &str, password: &str) -> String {
    let (status, _, body) = send(
        app,
        json_request("POST", "/api/auth/login", json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["token"].as_str().expect("token").to_string()
}

async fn product_id(app: &Router, sku: &str) -> String {
    let (_, _, body) = send(app, get("/api/products?per_page=50")).await;
    body["data"]
        .as_array()
        .expect("products")
        .iter()
        .find(|p| p["sku"] == sku)
        .and_then(|p| p["id"].as_str())
        .expect("seeded product")
        .to_string()
}

fn checkout_body(payment_method: &str) -> Value {
    json!({
        "name": "Ayesha Khan",
        "email": "ayesha@example.pk",
        "phone": "0300 1234567",
        "address": { "line1": "House 12, Street 4", "city": "Lahore" },
        "payment_method": payment_method
    })
}

/// Guest cart with two Kashmiri Chai, returning the cart token.
async fn guest_cart(app: &Router, product: &str) -> String {
    let (status, headers, body) = send(
        app,
        json_request("POST", "/api/cart/items", json!({ "product_id": product, "quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = headers
        .get("x-cart-token")
        .and_then(|v| v.to_str().ok())
        .expect("cart token header")
        .to_string();
    assert_eq!(body["data"]["cart_token"], token.as_str());
    token
}

async fn place_order(app: &Router, cart_token: &str) -> Value {
    let mut req = json_request("POST", "/api/orders", checkout_body("cash_on_delivery"));
    req.headers_mut()
        .insert("x-cart-token", cart_token.parse().expect("header"));
    let (status, _, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["data"].clone()
}

#[tokio::test]
async fn test_health() {
    let app = test_app().await;
    let (status, _, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_product_list_is_paginated() {
    let app = test_app().await;
    let (status, _, body) = send(&app, get("/api/products?per_page=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["meta"]["total"], 5);
    assert_eq!(body["meta"]["per_page"], 2);
    assert_eq!(body["meta"]["last_page"], 3);
}

#[tokio::test]
async fn test_unknown_product_slug_is_404() {
    let app = test_app().await;
    let (status, _, body) = send(&app, get("/api/products/no-such-thing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_guest_checkout_and_order_access() {
    let app = test_app().await;
    let chai = product_id(&app, "CHAI-250").await;
    let cart_token = guest_cart(&app, &chai).await;

    let placed = place_order(&app, &cart_token).await;
    let order = &placed["order"];
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["payment_status"], "UNPAID");
    // 2 x 850.00 plus flat shipping below the free threshold
    assert_eq!(order["subtotal"], 170_000);
    assert_eq!(order["shipping_fee"], 25_000);
    assert_eq!(order["total"], 195_000);
    assert!(order.get("access_token").is_none());
    assert!(placed["payment"].is_null());

    let number = order["order_number"].as_str().expect("order number");
    let access = placed["access_token"].as_str().expect("access token");

    let (status, _, body) = send(&app, get(&format!("/api/orders/{}/view?token={}", number, access))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order_number"], number);

    let (status, _, _) = send(&app, get(&format!("/api/orders/{}/view", number))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(&app, get(&format!("/api/orders/{}/view?token=wrong", number))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // the cart is gone after checkout
    let mut req = json_request("POST", "/api/orders", checkout_body("cash_on_delivery"));
    req.headers_mut()
        .insert("x-cart-token", cart_token.parse().expect("header"));
    let (status, _, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_invalid_checkout_reports_field_errors() {
    let app = test_app().await;
    let chai = product_id(&app, "CHAI-250").await;
    let cart_token = guest_cart(&app, &chai).await;

    let mut req = json_request(
        "POST",
        "/api/orders",
        json!({
            "name": "",
            "email": "not-an-email",
            "phone": "12",
            "address": { "line1": "", "city": "" },
            "payment_method": "cash_on_delivery"
        }),
    );
    req.headers_mut()
        .insert("x-cart-token", cart_token.parse().expect("header"));
    let (status, _, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    for field in ["name", "email", "phone", "address.line1", "address.city"] {
        assert!(body["errors"][field].is_array(), "missing error for {}", field);
    }
}

#[tokio::test]
async fn test_admin_requires_admin_token() {
    let app = test_app().await;

    let (status, _, _) = send(&app, get("/api/admin/dashboard")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/register",
            json!({ "name": "Bilal", "email": "bilal@example.pk", "password": "password123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let customer = body["data"]["token"].as_str().expect("token").to_string();

    let (status, _, _) = send(&app, with_bearer(get("/api/admin/dashboard"), &customer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let (status, _, body) = send(&app, with_bearer(get("/api/admin/dashboard"), &admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["orders"]["total_orders"], 0);
}

#[tokio::test]
async fn test_duplicate_registration_is_rejected() {
    let app = test_app().await;
    let payload = json!({ "name": "Admin Again", "email": ADMIN_EMAIL.to_uppercase(), "password": "password123" });
    let (status, _, body) = send(&app, json_request("POST", "/api/auth/register", payload)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["email"].is_array());
}

#[tokio::test]
async fn test_cancelling_an_order_restocks() {
    let app = test_app().await;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let chai = product_id(&app, "CHAI-250").await;
    let stock_uri = format!("/api/admin/products/{}", chai);

    let cart_token = guest_cart(&app, &chai).await;
    let placed = place_order(&app, &cart_token).await;
    let order_id = placed["order"]["id"].as_str().expect("order id").to_string();

    let (_, _, body) = send(&app, with_bearer(get(&stock_uri), &admin)).await;
    assert_eq!(body["data"]["stock"], 38);

    // delivered is not reachable straight from pending
    let (status, _, _) = send(
        &app,
        with_bearer(
            json_request("PATCH", &format!("/api/admin/orders/{}/status", order_id), json!({ "status": "DELIVERED" })),
            &admin,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _, body) = send(
        &app,
        with_bearer(
            json_request("PATCH", &format!("/api/admin/orders/{}/status", order_id), json!({ "status": "CANCELLED" })),
            &admin,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "CANCELLED");

    let (_, _, body) = send(&app, with_bearer(get(&stock_uri), &admin)).await;
    assert_eq!(body["data"]["stock"], 40);
}

#[tokio::test]
async fn test_track_accepts_valid_events() {
    let app = test_app().await;
    let (status, _, body) = send(
        &app,
        json_request(
            "POST",
            "/api/track",
            json!({ "event_type": "page_view", "path": "/", "session_id": "session-1234" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "accepted");

    let (status, _, body) = send(
        &app,
        json_request(
            "POST",
            "/api/track",
            json!({ "event_type": "page_view", "path": "no-slash", "session_id": "short" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["path"].is_array());
    assert!(body["errors"]["session_id"].is_array());

    let malformed = Request::builder()
        .method("POST")
        .uri("/api/track")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"event_type\":"))
        .expect("request");
    let (status, _, body) = send(&app, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_homepage_lists_sections_in_order() {
    let app = test_app().await;
    let (status, _, body) = send(&app, get("/api/homepage")).await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<&str> = body["data"]["sections"]
        .as_array()
        .expect("sections")
        .iter()
        .filter_map(|s| s["kind"].as_str())
        .collect();
    assert_eq!(kinds, vec!["hero", "featured_bundles", "featured_products"]);
}

fn with_cart(mut req: Request<Body>, cart_token: &str) -> Request<Body> {
    req.headers_mut()
        .insert("x-cart-token", cart_token.parse().expect("header"));
    req
}

fn form_request(uri: &str, fields: &GatewayFields) -> Request<Body> {
    let body = fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .expect("request")
}

/// An EasyPaisa postback for `order_number`, signed the way the wallet signs it.
fn easypaisa_callback(order_number: &str, amount: &str, status: &str) -> GatewayFields {
    let gateway = EasyPaisaGateway::new(EasyPaisaSettings {
        enabled: true,
        store_id: EASYPAISA_STORE_ID.to_string(),
        hash_key: EASYPAISA_HASH_KEY.to_string(),
        ..Default::default()
    })
    .expect("gateway");

    let mut fields = GatewayFields::new();
    fields.insert("amount".to_string(), amount.to_string());
    fields.insert("orderRefNum".to_string(), order_number.to_string());
    fields.insert("status".to_string(), status.to_string());
    fields.insert("transactionRefNumber".to_string(), "EP778899".to_string());
    let hash = gateway.request_hash(&fields);
    fields.insert("merchantHashedReq".to_string(), hash);
    fields
}

async fn admin_create(app: &Router, admin: &str, uri: &str, body: Value) -> Value {
    let (status, _, body) = send(app, with_bearer(json_request("POST", uri, body), admin)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["data"].clone()
}

/// `{"selection": {slot: [product, ..]}}` for the bundle price endpoint.
fn price_request(picks: Vec<(&String, Vec<&String>)>) -> Value {
    let slots: serde_json::Map<String, Value> = picks
        .into_iter()
        .map(|(slot, ids)| (slot.clone(), json!(ids)))
        .collect();
    json!({ "selection": slots })
}

async fn bundle_by_slug(app: &Router, slug: &str) -> Value {
    let (status, _, body) = send(app, get(&format!("/api/bundles/{}", slug))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["data"].clone()
}

#[tokio::test]
async fn test_easypaisa_callback_confirms_order() {
    let app = test_app().await;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let soap = admin_create(
        &app,
        &admin,
        "/api/admin/products",
        json!({ "sku": "SOAP-NEEM", "name": "Neem Soap", "price": 12_345, "stock": 10 }),
    )
    .await;

    let (status, headers, _) = send(
        &app,
        json_request("POST", "/api/cart/items", json!({ "product_id": soap["id"], "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let cart_token = headers
        .get("x-cart-token")
        .and_then(|v| v.to_str().ok())
        .expect("cart token")
        .to_string();

    let (status, _, body) = send(
        &app,
        with_cart(json_request("POST", "/api/orders", checkout_body("easypaisa")), &cart_token),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let order = &body["data"]["order"];
    assert_eq!(order["total"], 37_345);
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["payment_status"], "PENDING");
    // one decimal place, rounded half up
    assert_eq!(body["data"]["payment"]["fields"]["amount"], "373.5");
    let number = order["order_number"].as_str().expect("order number").to_string();
    let uri = "/api/payments/easypaisa/callback";

    let mut tampered = easypaisa_callback(&number, "373.5", "0000");
    tampered.insert("amount".to_string(), "1.0".to_string());
    let (status, _, _) = send(&app, form_request(uri, &tampered)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let underpaid = easypaisa_callback(&number, "100.0", "0000");
    let (status, _, body) = send(&app, form_request(uri, &underpaid)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().expect("error").contains("amount"));

    let paid = easypaisa_callback(&number, "373.5", "0000");
    let (status, _, body) = send(&app, form_request(uri, &paid)).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "CONFIRMED");
    assert_eq!(body["data"]["payment_status"], "PAID");

    // the wallet retries its postback; nothing moves a second time
    let (status, _, body) = send(&app, form_request(uri, &paid)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "CONFIRMED");
    assert_eq!(body["data"]["payment_status"], "PAID");

    let order_id = order["id"].as_str().expect("order id");
    let (_, _, body) = send(&app, with_bearer(get(&format!("/api/admin/orders/{}", order_id)), &admin)).await;
    assert_eq!(body["data"]["payment_reference"], "EP778899");
}

#[tokio::test]
async fn test_callback_for_another_payment_method_is_rejected() {
    let app = test_app().await;
    let chai = product_id(&app, "CHAI-250").await;
    let cart_token = guest_cart(&app, &chai).await;
    let placed = place_order(&app, &cart_token).await;
    let number = placed["order"]["order_number"].as_str().expect("order number");

    // cash on delivery order, 1,950.00 due
    let fields = easypaisa_callback(number, "1950.0", "0000");
    let (status, _, body) = send(&app, form_request("/api/payments/easypaisa/callback", &fields)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().expect("error").contains("easypaisa"));

    let (status, _, _) = send(&app, form_request("/api/payments/cash_on_delivery/callback", &fields)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(&app, form_request("/api/payments/jazzcash/callback", &fields)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bundle_listing_and_detail() {
    let app = test_app().await;
    let (status, _, body) = send(&app, get("/api/bundles")).await;
    assert_eq!(status, StatusCode::OK);
    let mut slugs: Vec<&str> = body["data"]
        .as_array()
        .expect("bundles")
        .iter()
        .filter_map(|b| b["slug"].as_str())
        .collect();
    slugs.sort_unstable();
    assert_eq!(slugs, vec!["breakfast-box", "build-your-pantry"]);

    let breakfast = bundle_by_slug(&app, "breakfast-box").await;
    // chai plus two mugs, 10% off
    assert_eq!(breakfast["original_price"], 175_000);
    assert_eq!(breakfast["price"], 157_500);
    assert_eq!(breakfast["is_available"], true);
    // two mugs per box and 18 on the shelf
    assert_eq!(breakfast["stock_remaining"], 9);

    let (status, _, _) = send(&app, get("/api/bundles/no-such-bundle")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_configurable_bundle_pricing() {
    let app = test_app().await;
    let pantry = bundle_by_slug(&app, "build-your-pantry").await;
    let slot = |name: &str| {
        pantry["slots"]
            .as_array()
            .expect("slots")
            .iter()
            .find(|s| s["name"] == name)
            .and_then(|s| s["id"].as_str())
            .expect("slot")
            .to_string()
    };
    let (tea, sweet) = (slot("Tea"), slot("Sweet"));
    let chai = product_id(&app, "CHAI-250").await;
    let green = product_id(&app, "GREEN-100").await;
    let honey = product_id(&app, "HONEY-500").await;
    let uri = "/api/bundles/build-your-pantry/price";

    // the tea slot takes exactly one pick
    let (status, _, body) = send(
        &app,
        json_request("POST", uri, price_request(vec![(&tea, vec![&chai, &green]), (&sweet, vec![&honey])])),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["selection"].is_array());

    let (status, _, body) = send(&app, json_request("POST", uri, json!({ "selection": {} }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["selection"].is_array());

    let (status, _, body) = send(
        &app,
        json_request("POST", uri, price_request(vec![(&tea, vec![&chai]), (&sweet, vec![&honey])])),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["original"], 325_000);
    assert_eq!(body["data"]["discounted"], 305_000);
}

#[tokio::test]
async fn test_bundle_quantity_is_capped_by_stock() {
    let app = test_app().await;
    let breakfast = bundle_by_slug(&app, "breakfast-box").await;
    let bundle_id = breakfast["id"].as_str().expect("bundle id").to_string();

    let (status, headers, body) = send(
        &app,
        json_request("POST", "/api/cart/items", json!({ "bundle_id": bundle_id, "quantity": 9 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let cart_token = headers
        .get("x-cart-token")
        .and_then(|v| v.to_str().ok())
        .expect("cart token")
        .to_string();
    let line_id = body["data"]["lines"][0]["id"].as_str().expect("line id").to_string();

    // the merged line would need 20 mugs
    let (status, _, _) = send(
        &app,
        with_cart(
            json_request("POST", "/api/cart/items", json!({ "bundle_id": bundle_id, "quantity": 1 })),
            &cart_token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _, _) = send(
        &app,
        with_cart(
            json_request("PATCH", &format!("/api/cart/items/{}", line_id), json!({ "quantity": 10 })),
            &cart_token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _, body) = send(&app, with_cart(get("/api/cart"), &cart_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["lines"][0]["quantity"], 9);
}

#[tokio::test]
async fn test_cart_coupon_apply_and_remove() {
    let app = test_app().await;
    let chai = product_id(&app, "CHAI-250").await;
    let cart_token = guest_cart(&app, &chai).await;

    let (status, _, body) = send(
        &app,
        with_cart(json_request("POST", "/api/cart/coupon", json!({ "code": " welcome10 " })), &cart_token),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["coupon_code"], "WELCOME10");
    assert_eq!(body["data"]["discount"], 17_000);
    assert_eq!(body["data"]["total"], 178_000);

    let (status, _, body) = send(
        &app,
        with_cart(json_request("POST", "/api/cart/coupon", json!({ "code": "NOPE99" })), &cart_token),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, _, body) = send(
        &app,
        with_cart(
            Request::builder()
                .method("DELETE")
                .uri("/api/cart/coupon")
                .body(Body::empty())
                .expect("request"),
            &cart_token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["coupon_code"].is_null());
    assert_eq!(body["data"]["discount"], 0);
    assert_eq!(body["data"]["total"], 195_000);

    // a single mug is below the coupon minimum
    let mug = product_id(&app, "MUG-CLAY").await;
    let (_, headers, _) = send(
        &app,
        json_request("POST", "/api/cart/items", json!({ "product_id": mug, "quantity": 1 })),
    )
    .await;
    let small_cart = headers
        .get("x-cart-token")
        .and_then(|v| v.to_str().ok())
        .expect("cart token")
        .to_string();
    let (status, _, body) = send(
        &app,
        with_cart(json_request("POST", "/api/cart/coupon", json!({ "code": "WELCOME10" })), &small_cart),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["code"].is_array());
}

#[tokio::test]
async fn test_admin_sets_payment_status() {
    let app = test_app().await;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let chai = product_id(&app, "CHAI-250").await;
    let cart_token = guest_cart(&app, &chai).await;
    let placed = place_order(&app, &cart_token).await;
    let uri = format!("/api/admin/orders/{}/payment", placed["order"]["id"].as_str().expect("order id"));

    let (status, _, body) = send(
        &app,
        with_bearer(
            json_request("PATCH", &uri, json!({ "payment_status": "PAID", "reference": "CASH-0042" })),
            &admin,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["payment_status"], "PAID");
    assert_eq!(body["data"]["payment_reference"], "CASH-0042");

    let (status, _, body) = send(
        &app,
        with_bearer(json_request("PATCH", &uri, json!({ "payment_status": "REFUNDED" })), &admin),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["payment_status"], "REFUNDED");
    assert_eq!(body["data"]["payment_reference"], "CASH-0042");

    // a refund is final
    let (status, _, _) = send(
        &app,
        with_bearer(json_request("PATCH", &uri, json!({ "payment_status": "PAID" })), &admin),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _, _) = send(&app, json_request("PATCH", &uri, json!({ "payment_status": "PAID" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_analytics_summary_validates_days() {
    let app = test_app().await;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    for days in [0, 91] {
        let (status, _, body) = send(
            &app,
            with_bearer(get(&format!("/api/admin/analytics/summary?days={}", days)), &admin),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["errors"]["days"].is_array());
    }

    let (status, _, body) = send(&app, with_bearer(get("/api/admin/analytics/summary?days=7"), &admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["daily"].as_array().map(Vec::len), Some(7));
    assert_eq!(body["data"]["total_events"], 0);
}

#[tokio::test]
async fn test_dashboard_reports_orders_and_low_stock() {
    let app = test_app().await;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let chai = product_id(&app, "CHAI-250").await;
    let cart_token = guest_cart(&app, &chai).await;
    let placed = place_order(&app, &cart_token).await;

    let (status, _, body) = send(&app, with_bearer(get("/api/admin/dashboard"), &admin)).await;
    assert_eq!(status, StatusCode::OK);
    let dashboard = &body["data"];
    assert_eq!(dashboard["orders"]["total_orders"], 1);
    assert_eq!(dashboard["orders"]["orders_since"], 1);
    assert_eq!(dashboard["orders"]["by_status"]["PENDING"], 1);
    // cash on delivery is not revenue until delivered
    assert_eq!(dashboard["orders"]["revenue"], 0);
    assert_eq!(dashboard["low_stock_threshold"], 5);

    let low: Vec<&str> = dashboard["low_stock"]
        .as_array()
        .expect("low stock")
        .iter()
        .filter_map(|p| p["sku"].as_str())
        .collect();
    assert_eq!(low, vec!["DATES-1KG"]);
    assert_eq!(dashboard["recent_orders"][0]["id"], placed["order"]["id"]);
}

#[tokio::test]
async fn test_admin_coupon_crud() {
    let app = test_app().await;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let input = json!({ "code": "eid25", "discount_type": "fixed", "value": 25000.0, "min_order_amount": 150000 });

    let coupon = admin_create(&app, &admin, "/api/admin/coupons", input.clone()).await;
    assert_eq!(coupon["code"], "EID25");
    let uri = format!("/api/admin/coupons/{}", coupon["id"].as_str().expect("coupon id"));

    let (status, _, _) = send(&app, with_bearer(json_request("POST", "/api/admin/coupons", input), &admin)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _, body) = send(
        &app,
        with_bearer(
            json_request("POST", "/api/admin/coupons", json!({ "code": "x", "discount_type": "percentage", "value": 150.0 })),
            &admin,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["code"].is_array());
    assert!(body["errors"]["value"].is_array());

    let (status, _, body) = send(
        &app,
        with_bearer(
            json_request("PUT", &uri, json!({ "code": "EID25", "discount_type": "fixed", "value": 30000.0 })),
            &admin,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["value"], 30000.0);
    assert!(body["data"]["min_order_amount"].is_null());

    let (status, _, _) = send(
        &app,
        with_bearer(Request::builder().method("DELETE").uri(&uri).body(Body::empty()).expect("request"), &admin),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, _, body) = send(&app, with_bearer(get("/api/admin/coupons"), &admin)).await;
    let codes: Vec<&str> = body["data"]
        .as_array()
        .expect("coupons")
        .iter()
        .filter_map(|c| c["code"].as_str())
        .collect();
    assert_eq!(codes, vec!["WELCOME10"]);
}

#[tokio::test]
async fn test_admin_bundle_crud_guards_products() {
    let app = test_app().await;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let delete = |uri: String| {
        with_bearer(
            Request::builder().method("DELETE").uri(uri).body(Body::empty()).expect("request"),
            &admin,
        )
    };

    // seeded bundles hold on to their products
    let chai = product_id(&app, "CHAI-250").await;
    let (status, _, body) = send(&app, delete(format!("/api/admin/products/{}", chai))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().expect("error").contains("part of bundle"));

    let jar = admin_create(
        &app,
        &admin,
        "/api/admin/products",
        json!({ "sku": "JAR-GLASS", "name": "Glass Jar", "price": 30_000, "stock": 6 }),
    )
    .await;
    let jar_id = jar["id"].as_str().expect("product id").to_string();
    let bundle_input = |discount: f64| {
        json!({
            "name": "Jar Pair",
            "bundle_type": "fixed",
            "discount_type": "percentage",
            "discount_value": discount,
            "items": [{ "product_id": jar_id, "quantity": 2 }]
        })
    };

    let (status, _, body) = send(
        &app,
        with_bearer(
            json_request(
                "POST",
                "/api/admin/bundles",
                json!({
                    "name": "Ghost Pair",
                    "bundle_type": "fixed",
                    "discount_type": "fixed",
                    "discount_value": 0.0,
                    "items": [{ "product_id": uuid::Uuid::new_v4(), "quantity": 1 }]
                }),
            ),
            &admin,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["items"].is_array());

    let bundle = admin_create(&app, &admin, "/api/admin/bundles", bundle_input(5.0)).await;
    assert_eq!(bundle["slug"], "jar-pair");
    assert_eq!(bundle["price"], 57_000);
    let bundle_uri = format!("/api/admin/bundles/{}", bundle["id"].as_str().expect("bundle id"));

    let (status, _, body) = send(&app, with_bearer(json_request("PUT", &bundle_uri, bundle_input(10.0)), &admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["price"], 54_000);
    assert_eq!(bundle_by_slug(&app, "jar-pair").await["price"], 54_000);

    let (status, _, _) = send(&app, delete(format!("/api/admin/products/{}", jar_id))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _, _) = send(&app, delete(bundle_uri.clone())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _, _) = send(&app, with_bearer(get(&bundle_uri), &admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(&app, delete(format!("/api/admin/products/{}", jar_id))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
