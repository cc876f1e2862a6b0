// ============================================================================
// Gateway Dispatcher Tests
// ============================================================================
//
// - bearer access token on mutating routes and the live upgrade when required
// - credential scrubbing on user payloads
// - owning-service answers passed through
// - /filter aliases of the list routes
// - health and metrics
//
// ============================================================================

use serde_json::{Value, json};
use serial_test::serial;

mod test_utils;
use test_utils::{TestOptions, spawn_app, unique_username};

fn protected() -> TestOptions {
    TestOptions {
        require_access_token: true,
        ..TestOptions::default()
    }
}

#[tokio::test]
#[serial]
async fn test_mutations_require_access_token_when_enabled() {
    let app = spawn_app(protected()).await;

    let resp = app.post("/countries", &json!({"name": "Chile"})).await;
    assert_eq!(resp.status(), 401);
    assert_eq!(app.services.countries.create_calls(), 0);

    let resp = app
        .client
        .post(app.url("/countries"))
        .bearer_auth("forged.token.value")
        .json(&json!({"name": "Chile"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let login = app.login_as(&unique_username("admin"), "secret").await;
    let access = login["access_token"].as_str().unwrap();
    let resp = app
        .client
        .post(app.url("/countries"))
        .bearer_auth(access)
        .json(&json!({"name": "Chile"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    assert_eq!(app.services.countries.create_calls(), 1);
}

#[tokio::test]
#[serial]
async fn test_refresh_token_is_not_an_access_token() {
    let app = spawn_app(protected()).await;
    let login = app.login_as(&unique_username("mallory"), "secret").await;

    let resp = app
        .client
        .post(app.url("/events"))
        .bearer_auth(login["refresh_token"].as_str().unwrap())
        .json(&json!({"name": "Relay"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
#[serial]
async fn test_reads_and_auth_routes_stay_open() {
    let app = spawn_app(protected()).await;
    app.services
        .countries
        .seed("fra", json!({"name": "France"}))
        .await;

    let resp = app.client.get(app.url("/countries/fra")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["name"], "France");

    // Registration and login never need a token
    app.login_as(&unique_username("open"), "secret").await;
}

#[tokio::test]
#[serial]
async fn test_user_payloads_never_carry_credentials() {
    let app = spawn_app(TestOptions::default()).await;
    let username = unique_username("scrub");
    let login = app.login_as(&username, "secret").await;
    let id = login["user"]["id"].as_str().unwrap();
    assert!(!login.to_string().contains("$2"));

    let resp = app
        .client
        .get(app.url(&format!("/users/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["username"], username);
    assert!(body.get("password_hash").is_none());

    let resp = app
        .client
        .get(app.url("/users"))
        .query(&[("username", username.as_str())])
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert!(!body.to_string().contains("password"));
}

#[tokio::test]
#[serial]
async fn test_post_users_registers() {
    let app = spawn_app(TestOptions::default()).await;
    let username = unique_username("viaUsers");

    let resp = app
        .post("/users", &json!({"username": username, "password": "secret"}))
        .await;
    assert_eq!(resp.status(), 201);

    let stored = app.services.users.find("username", &username).await.unwrap();
    assert_ne!(stored["password_hash"], "secret");
}

#[tokio::test]
#[serial]
async fn test_unknown_record_is_404() {
    let app = spawn_app(TestOptions::default()).await;

    let resp = app
        .client
        .get(app.url("/athletes/nobody"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // Owning service 4xx answers pass through
    let resp = app
        .client
        .delete(app.url("/athletes/nobody"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
#[serial]
async fn test_owning_service_outage_is_502() {
    let app = spawn_app(TestOptions::default()).await;
    app.services.countries.set_unavailable(true);

    let resp = app.client.get(app.url("/countries")).send().await.unwrap();
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error_code"], "UPSTREAM_UNAVAILABLE");
    assert!(!body.to_string().contains("connection refused"));
}

#[tokio::test]
#[serial]
async fn test_list_forwards_query() {
    let app = spawn_app(TestOptions::default()).await;
    app.services
        .athletes
        .seed("a1", json!({"name": "A", "country_id": "ken"}))
        .await;
    app.services
        .athletes
        .seed("a2", json!({"name": "B", "country_id": "eth"}))
        .await;

    let resp = app
        .client
        .get(app.url("/athletes"))
        .query(&[("country_id", "eth")])
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let athletes = body.as_array().unwrap();
    assert_eq!(athletes.len(), 1);
    assert_eq!(athletes[0]["id"], "a2");
}

#[tokio::test]
#[serial]
async fn test_health_and_metrics() {
    let app = spawn_app(TestOptions::default()).await;

    let resp = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    // Touch a counter so the family is present
    app.post("/auth/login", &json!({"username": "nobody", "password": "x"}))
        .await;
    app.login_as(&unique_username("metrics"), "secret").await;

    let resp = app.client.get(app.url("/metrics")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let text = resp.text().await.unwrap();
    assert!(text.contains("medalstream_logins_total"));
}

#[tokio::test]
#[serial]
async fn test_live_upgrade_requires_access_token_when_enabled() {
    let app = spawn_app(protected()).await;

    let resp = app
        .client
        .get(app.url("/live"))
        .header("connection", "upgrade")
        .header("upgrade", "websocket")
        .header("sec-websocket-version", "13")
        .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    assert_eq!(app.services.live.create_calls(), 0);

    // With a token the request gets past auth and fails only on the missing handshake
    let login = app.login_as(&unique_username("viewer"), "secret").await;
    let resp = app
        .client
        .get(app.url("/live"))
        .bearer_auth(login["access_token"].as_str().unwrap())
        .send()
        .await
        .unwrap();
    assert_ne!(resp.status(), 401);
    assert!(resp.status().is_client_error());
}

#[tokio::test]
#[serial]
async fn test_filter_routes_list_instead_of_lookup() {
    let app = spawn_app(TestOptions::default()).await;
    app.services
        .medals
        .seed("m1", json!({"athlete_id": "a1", "event_id": "e1"}))
        .await;
    app.services
        .medals
        .seed("m2", json!({"athlete_id": "a2", "event_id": "e1"}))
        .await;
    app.services
        .users
        .seed(
            "u1",
            json!({"username": "ana", "country_id": "bra", "password_hash": "$2b$04$abc"}),
        )
        .await;

    let resp = app
        .client
        .get(app.url("/medals/filter"))
        .query(&[("athlete_id", "a2")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let medals = body.as_array().unwrap();
    assert_eq!(medals.len(), 1);
    assert_eq!(medals[0]["id"], "m2");
    assert_eq!(app.services.medals.lookup_calls(), 0);

    let resp = app
        .client
        .get(app.url("/users/filter"))
        .query(&[("country_id", "bra")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let users = body.as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["username"], "ana");
    assert!(users[0].get("password_hash").is_none());
}
