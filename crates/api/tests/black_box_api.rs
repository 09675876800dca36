use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use moldtrack_auth::{JwtClaims, Role};
use moldtrack_core::UserId;
use reqwest::StatusCode;
use serde_json::json;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let app = moldtrack_api::app::build_app(jwt_secret.to_string()).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(jwt_secret: &str, roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::new(),
        roles,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn get_item_eventually(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    id: &str,
) -> serde_json::Value {
    // The API is intentionally eventual-consistent (command path vs projection update).
    // Poll briefly until the projection catches up.
    for _ in 0..50 {
        let res = client
            .get(format!("{}/stock/items/{}", base_url, id))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();

        if res.status() == StatusCode::OK {
            return res.json().await.unwrap();
        }

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    panic!("item did not become visible in projection within timeout");
}

async fn get_quantity_eventually(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    id: &str,
    expected: i64,
) -> serde_json::Value {
    for _ in 0..50 {
        let res = client
            .get(format!("{}/stock/items/{}", base_url, id))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();

        if res.status() == StatusCode::OK {
            let body: serde_json::Value = res.json().await.unwrap();
            if body["quantity"] == json!(expected) {
                return body;
            }
        }

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    panic!("item quantity did not reach {expected} within timeout");
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn whoami_reflects_token_roles() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let token = mint_jwt(jwt_secret, vec![Role::Admin]);

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["user_id"].as_str().is_some());
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "admin"));
}

#[tokio::test]
async fn stock_lifecycle_register_adjust_query() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let token = mint_jwt(jwt_secret, vec![Role::Admin]);

    let client = reqwest::Client::new();

    // Register
    let res = client
        .post(format!("{}/stock/items", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "kind": "material",
            "code": "pp-gran",
            "name": "PP granulate",
            "unit": "kilograms",
            "initial_quantity": 5,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    // Adjust
    let res = client
        .post(format!("{}/stock/items/{}/adjust", srv.base_url, id))
        .bearer_auth(&token)
        .json(&json!({ "direction": "IN", "quantity": 10 }))
        .send()
        .await
        .unwrap();
    if res.status() != StatusCode::OK {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        panic!("expected 200 OK from adjust, got {status} body={body}");
    }

    // Query (eventually consistent with projection)
    let item = get_quantity_eventually(&client, &srv.base_url, &token, &id, 15).await;
    assert_eq!(item["name"], "PP granulate");
    // Codes are canonicalized to uppercase.
    assert_eq!(item["code"], "PP-GRAN");

    // The movement ledger shows both the opening entry and the adjustment.
    let res = client
        .get(format!("{}/stock/items/{}/movements", srv.base_url, id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let movements = body["movements"].as_array().unwrap();
    assert!(movements.iter().any(|m| m["signed_delta"] == json!(10)));
}

#[tokio::test]
async fn operator_cannot_register_items() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let token = mint_jwt(jwt_secret, vec![Role::StockOperator]);

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/stock/items", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "kind": "kit",
            "code": null,
            "name": "Kit 01",
            "unit": "pieces",
            "initial_quantity": 0,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn order_delivery_deducts_stock_and_rejects_a_second_delivery() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let token = mint_jwt(jwt_secret, vec![Role::Admin]);
    let client = reqwest::Client::new();

    // Register a kit with opening stock.
    let res = client
        .post(format!("{}/stock/items", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "kind": "kit",
            "code": "KIT-01",
            "name": "Kit 01",
            "unit": "pieces",
            "initial_quantity": 10,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let kit_id = created["id"].as_str().unwrap().to_string();

    // Place an order for 4 kits.
    let res = client
        .post(format!("{}/orders", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "code": "ORD-1",
            "customer_name": "Acme",
            "requested_delivery_date": null,
            "lines": [{ "kit_id": kit_id, "quantity": 4 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let placed: serde_json::Value = res.json().await.unwrap();
    let order_id = placed["id"].as_str().unwrap().to_string();

    // Deliver.
    let res = client
        .post(format!("{}/orders/{}/deliver", srv.base_url, order_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let report: serde_json::Value = res.json().await.unwrap();
    assert_eq!(report["lines_fulfilled"], 1);
    assert_eq!(report["lines_skipped"], 0);

    // Stock was deducted through the ledger.
    get_quantity_eventually(&client, &srv.base_url, &token, &kit_id, 6).await;

    // A second delivery is rejected, not re-deducted.
    let res = client
        .post(format!("{}/orders/{}/deliver", srv.base_url, order_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn scan_intake_books_one_unit_for_a_known_code() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let token = mint_jwt(jwt_secret, vec![Role::Admin]);
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/stock/items", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "kind": "kit",
            "code": "KIT-SCAN",
            "name": "Kit scan",
            "unit": "pieces",
            "initial_quantity": 0,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    // The code index is populated by the projection worker.
    get_item_eventually(&client, &srv.base_url, &token, &id).await;

    // Scan with surrounding whitespace and lowercase; resolution canonicalizes.
    let mut scanned = false;
    for _ in 0..50 {
        let res = client
            .post(format!("{}/stock/intake/scan", srv.base_url))
            .bearer_auth(&token)
            .json(&json!({ "code": "  kit-scan  " }))
            .send()
            .await
            .unwrap();
        if res.status() == StatusCode::OK {
            let body: serde_json::Value = res.json().await.unwrap();
            assert_eq!(body["id"].as_str().unwrap(), id);
            scanned = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(scanned, "scan intake did not resolve the code within timeout");

    get_quantity_eventually(&client, &srv.base_url, &token, &id, 1).await;
}

#[tokio::test]
async fn unknown_code_resolves_to_not_found() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let token = mint_jwt(jwt_secret, vec![Role::StockOperator]);
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/stock/resolve/NO-SUCH-CODE", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
