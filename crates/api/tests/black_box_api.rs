use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use lexbill_auth::{JwtClaims, PrincipalId, Role};
use lexbill_core::TenantId;
use reqwest::StatusCode;
use serde_json::json;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let app = lexbill_api::app::build_app(jwt_secret.to_string());
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

fn mint_jwt(jwt_secret: &str, tenant_id: TenantId, roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: PrincipalId::new(),
        tenant_id,
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

async fn get_invoice_eventually(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    id: &str,
) -> serde_json::Value {
    // The API is intentionally eventual-consistent (command path vs projection update).
    // Poll briefly until the projection catches up.
    for _ in 0..50 {
        let res = client
            .get(format!("{}/invoices/{}", base_url, id))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();

        if res.status() == StatusCode::OK {
            return res.json().await.unwrap();
        }

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    panic!("invoice did not become visible in projection within timeout");
}

async fn get_invoice_when(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    id: &str,
    pred: impl Fn(&serde_json::Value) -> bool,
) -> serde_json::Value {
    for _ in 0..50 {
        let res = client
            .get(format!("{}/invoices/{}", base_url, id))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();

        if res.status() == StatusCode::OK {
            let body: serde_json::Value = res.json().await.unwrap();
            if pred(&body) {
                return body;
            }
        }

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    panic!("invoice never reached the expected projection state");
}

async fn upload_invoice(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    line_count: usize,
    seed: u64,
) -> String {
    let res = client
        .post(format!("{}/invoices", base_url))
        .bearer_auth(token)
        .json(&json!({
            "file_name": "invoice_may.txt",
            "line_count": line_count,
            "seed": seed,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/invoices", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tenant_context_is_derived_from_token() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["tenant_id"].as_str().unwrap(), tenant_id.to_string());
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "admin"));
}

#[tokio::test]
async fn upload_rejects_unsupported_file_extensions() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/invoices", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "file_name": "invoice_may.pdf" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"].as_str().unwrap(), "invalid_file_format");
}

#[tokio::test]
async fn upload_rejects_oversized_line_counts() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);

    let client = reqwest::Client::new();

    // The cap is checked before any generation, so a huge request must fail
    // fast instead of allocating the dataset.
    for line_count in [0u64, 10_001, 4_000_000_000] {
        let res = client
            .post(format!("{}/invoices", srv.base_url))
            .bearer_auth(&token)
            .json(&json!({ "file_name": "invoice_may.txt", "line_count": line_count }))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"].as_str().unwrap(), "validation_error");
    }

    // The cap itself is accepted.
    let res = client
        .post(format!("{}/invoices", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "file_name": "invoice_may.txt", "line_count": 10_000, "seed": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn upload_reject_line_and_approve_lifecycle() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);

    let client = reqwest::Client::new();

    let id = upload_invoice(&client, &srv.base_url, &token, 25, 42).await;

    let invoice = get_invoice_eventually(&client, &srv.base_url, &token, &id).await;
    assert_eq!(invoice["status"].as_str().unwrap(), "pending");
    assert_eq!(invoice["line_count"].as_u64().unwrap(), 25);
    let total_original = invoice["total_original"].as_f64().unwrap();
    assert_eq!(
        invoice["total_adjusted"].as_f64().unwrap(),
        total_original
    );

    let lines = invoice["line_items"].as_array().unwrap();
    let first_line_id = lines[0]["id"].as_str().unwrap().to_string();
    let first_amount = lines[0]["amount"].as_f64().unwrap();

    // Rejecting a line drops its amount from the reviewed total.
    let res = client
        .post(format!(
            "{}/invoices/{}/lines/{}/reject",
            srv.base_url, id, first_line_id
        ))
        .bearer_auth(&token)
        .json(&json!({ "reviewer_comment": "duplicate entry" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let invoice = get_invoice_when(&client, &srv.base_url, &token, &id, |body| {
        body["total_adjusted"].as_f64().unwrap() < total_original
    })
    .await;
    let expected = ((total_original - first_amount) * 100.0).round() / 100.0;
    assert!((invoice["total_adjusted"].as_f64().unwrap() - expected).abs() < 1e-9);

    // Filtered line listing only returns the rejected item.
    let res = client
        .get(format!(
            "{}/invoices/{}/lines?status=rejected",
            srv.base_url, id
        ))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["matched"].as_u64().unwrap(), 1);
    assert_eq!(
        body["items"][0]["id"].as_str().unwrap(),
        first_line_id
    );

    // Approve, then further edits are refused.
    let res = client
        .post(format!("{}/invoices/{}/approve", srv.base_url, id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let invoice = get_invoice_when(&client, &srv.base_url, &token, &id, |body| {
        body["status"].as_str() == Some("approved")
    })
    .await;
    assert_eq!(invoice["status"].as_str().unwrap(), "approved");

    let res = client
        .post(format!(
            "{}/invoices/{}/lines/{}/accept",
            srv.base_url, id, first_line_id
        ))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn seeded_compliance_run_is_reproducible() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);

    let client = reqwest::Client::new();

    // Two invoices generated from the same seed hold identical billed numbers.
    let id_a = upload_invoice(&client, &srv.base_url, &token, 31, 7).await;
    let id_b = upload_invoice(&client, &srv.base_url, &token, 31, 7).await;
    get_invoice_eventually(&client, &srv.base_url, &token, &id_a).await;
    get_invoice_eventually(&client, &srv.base_url, &token, &id_b).await;

    let mut reports = Vec::new();
    for id in [&id_a, &id_b] {
        let res = client
            .post(format!("{}/invoices/{}/compliance/run", srv.base_url, id))
            .bearer_auth(&token)
            .json(&json!({ "seed": 99 }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = res.json().await.unwrap();
        reports.push(body);
    }

    // Every tenth row is inspected: rows 1, 11, 21, 31 of 31.
    assert_eq!(reports[0]["flagged_count"].as_u64().unwrap(), 4);

    let verdicts = |report: &serde_json::Value| {
        report["report"]["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| (r["ai_score"].as_f64().unwrap(), r["action"].as_str().unwrap().to_string()))
            .collect::<Vec<_>>()
    };
    assert_eq!(verdicts(&reports[0]), verdicts(&reports[1]));

    // The recorded findings move the invoice out of `pending`.
    let invoice = get_invoice_when(&client, &srv.base_url, &token, &id_a, |body| {
        body["status"].as_str() == Some("reviewed")
    })
    .await;
    assert_eq!(invoice["status"].as_str().unwrap(), "reviewed");
}

#[tokio::test]
async fn viewer_role_is_read_only() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let admin = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);
    let viewer = mint_jwt(jwt_secret, tenant_id, vec![Role::new("viewer")]);

    let client = reqwest::Client::new();

    let id = upload_invoice(&client, &srv.base_url, &admin, 12, 5).await;
    get_invoice_eventually(&client, &srv.base_url, &viewer, &id).await;

    // Reads are allowed, mutations are not.
    let res = client
        .get(format!("{}/invoices", srv.base_url))
        .bearer_auth(&viewer)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{}/invoices", srv.base_url))
        .bearer_auth(&viewer)
        .json(&json!({ "file_name": "invoice.txt" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .post(format!("{}/invoices/{}/approve", srv.base_url, id))
        .bearer_auth(&viewer)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn tenant_isolation_blocks_cross_tenant_reads() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_a = TenantId::new();
    let tenant_b = TenantId::new();
    let token_a = mint_jwt(jwt_secret, tenant_a, vec![Role::new("admin")]);
    let token_b = mint_jwt(jwt_secret, tenant_b, vec![Role::new("admin")]);

    let client = reqwest::Client::new();

    let id = upload_invoice(&client, &srv.base_url, &token_a, 10, 3).await;
    get_invoice_eventually(&client, &srv.base_url, &token_a, &id).await;

    let res = client
        .get(format!("{}/invoices/{}", srv.base_url, id))
        .bearer_auth(&token_b)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(format!("{}/invoices", srv.base_url))
        .bearer_auth(&token_b)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn audit_trail_lists_events_in_order() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);

    let client = reqwest::Client::new();

    let id = upload_invoice(&client, &srv.base_url, &token, 15, 11).await;
    let invoice = get_invoice_eventually(&client, &srv.base_url, &token, &id).await;
    let line_id = invoice["line_items"][0]["id"].as_str().unwrap().to_string();

    let res = client
        .post(format!(
            "{}/invoices/{}/lines/{}/accept",
            srv.base_url, id, line_id
        ))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/invoices/{}/audit", srv.base_url, id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["sequence_number"].as_u64().unwrap(), 1);
    assert_eq!(
        entries[0]["event_type"].as_str().unwrap(),
        "billing.invoice.ingested"
    );
    assert_eq!(
        entries[1]["event_type"].as_str().unwrap(),
        "billing.invoice.line_accepted"
    );
}
