//! Admin sync integration tests against a mocked Kiwify API.

mod common;

use common::{TestApp, TEST_YEARLY_PLAN};
use reqwest::StatusCode;
use serde_json::json;
use subscription_service::models::PlanTier;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_page(server: &MockServer, page: u32, data: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/v1/subscriptions"))
        .and(query_param("page_number", page.to_string()))
        .and(header("authorization", "Bearer kiwify-test-token"))
        .and(header("x-kiwify-account-id", "acc_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": data })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn sync_all_pages_through_provider() {
    let server = MockServer::start().await;
    let app = TestApp::spawn_with_kiwify(&server.uri()).await;
    let ana = app.seed_user("ana@example.com", PlanTier::Free).await;
    let bia = app.seed_user("bia@example.com", PlanTier::Yearly).await;

    mount_page(
        &server,
        1,
        json!([
            { "id": "sub_a", "status": "paid", "plan_id": TEST_YEARLY_PLAN,
              "customer": { "email": "ana@example.com" } },
            { "id": "sub_b", "status": "canceled", "plan_id": TEST_YEARLY_PLAN,
              "customer": { "email": "bia@example.com" } }
        ]),
    )
    .await;
    mount_page(
        &server,
        2,
        json!([
            { "id": "sub_c", "status": "paid", "plan_id": TEST_YEARLY_PLAN,
              "customer": { "email": "nobody@example.com" } }
        ]),
    )
    .await;

    let response = app.post_sync(&json!({ "action": "sync_all" })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["action"], "sync_all");
    assert_eq!(body["fetched"], 3);
    assert_eq!(body["matched"], 3);
    assert_eq!(body["report"]["processed"], 3);
    assert_eq!(body["report"]["updated"], 2);
    assert_eq!(body["report"]["skipped"], 1);
    assert_eq!(body["report"]["errors"], 0);

    assert_eq!(app.plan_of(ana).await, PlanTier::Yearly);
    assert_eq!(app.plan_of(bia).await, PlanTier::Free);

    app.cleanup().await;
}

#[tokio::test]
async fn sync_emails_only_touches_listed_customers() {
    let server = MockServer::start().await;
    let app = TestApp::spawn_with_kiwify(&server.uri()).await;
    let ana = app.seed_user("ana@example.com", PlanTier::Free).await;
    let bia = app.seed_user("bia@example.com", PlanTier::Free).await;

    mount_page(
        &server,
        1,
        json!([
            { "id": "sub_a", "status": "paid", "plan_id": TEST_YEARLY_PLAN,
              "customer_email": "ana@example.com" },
            { "id": "sub_b", "status": "paid", "plan_id": TEST_YEARLY_PLAN,
              "customer_email": "bia@example.com" }
        ]),
    )
    .await;
    mount_page(&server, 2, json!([])).await;

    let response = app
        .post_sync(&json!({ "action": "sync_emails", "emails": ["ANA@example.com"] }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["fetched"], 2);
    assert_eq!(body["matched"], 1);
    assert_eq!(body["report"]["updated"], 1);

    assert_eq!(app.plan_of(ana).await, PlanTier::Yearly);
    assert_eq!(app.plan_of(bia).await, PlanTier::Free);

    app.cleanup().await;
}

#[tokio::test]
async fn transient_provider_failure_is_retried() {
    let server = MockServer::start().await;
    let app = TestApp::spawn_with_kiwify(&server.uri()).await;
    let ana = app.seed_user("ana@example.com", PlanTier::Free).await;

    Mock::given(method("GET"))
        .and(path("/v1/subscriptions"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_page(
        &server,
        1,
        json!([
            { "id": "sub_a", "status": "active", "plan_id": "plano-mensal",
              "customer_email": "ana@example.com" }
        ]),
    )
    .await;

    let response = app.post_sync(&json!({ "action": "sync_all" })).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.plan_of(ana).await, PlanTier::Monthly);

    app.cleanup().await;
}

#[tokio::test]
async fn provider_rejection_is_bad_gateway() {
    let server = MockServer::start().await;
    let app = TestApp::spawn_with_kiwify(&server.uri()).await;

    Mock::given(method("GET"))
        .and(path("/v1/subscriptions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
        .mount(&server)
        .await;

    let response = app.post_sync(&json!({ "action": "sync_all" })).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    app.cleanup().await;
}

#[tokio::test]
async fn unknown_action_is_bad_request() {
    let app = TestApp::spawn().await;

    let response = app.post_sync(&json!({ "action": "sync_everything" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.post_sync(&json!({ "action": "sync_emails", "emails": [] })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await;
}

#[tokio::test]
async fn admin_routes_require_token() {
    let app = TestApp::spawn().await;
    let user_id = app.seed_user("ana@example.com", PlanTier::Free).await;

    let response = app
        .client
        .post(format!("{}/admin/subscriptions/sync", app.address))
        .json(&json!({ "action": "sync_all" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .client
        .get(format!("{}/admin/users/{}/plan", app.address, user_id))
        .bearer_auth("wrong-token")
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    app.cleanup().await;
}

#[tokio::test]
async fn admin_can_inspect_user_plan() {
    let app = TestApp::spawn().await;
    let user_id = app.seed_user("ana@example.com", PlanTier::Quarterly).await;

    let response = app
        .client
        .get(format!("{}/admin/users/{}/plan", app.address, user_id))
        .bearer_auth(common::TEST_ADMIN_TOKEN)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["plan"], "quarterly");
    assert_eq!(body["effective_plan"], "quarterly");
    assert_eq!(body["history_limit_days"], 365);
    assert_eq!(body["subscriptions"], json!([]));

    let missing = app
        .client
        .get(format!("{}/admin/users/{}/plan", app.address, uuid::Uuid::new_v4()))
        .bearer_auth(common::TEST_ADMIN_TOKEN)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    app.cleanup().await;
}
