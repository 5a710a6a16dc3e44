use std::net::SocketAddr;

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::{json, Value};
use service::{app::Managements, user::TokenVerifier};
use tokio::net::TcpListener;

use server::{startup, state::AppState};

struct TestApp {
    base_url: String,
    client: reqwest::Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Log `user_id` in and return the token to send back.
    async fn login(&self, user_id: &str) -> anyhow::Result<String> {
        let token = signed_token(user_id, JWT_SECRET)?;
        let body = json!({
            "id": user_id,
            "token": token,
            "nickname": user_id,
        });
        let res = self.client.post(self.url("/v2/login")).json(&body).send().await?;
        assert_eq!(res.status(), StatusCode::OK);
        Ok(token)
    }

    async fn put(&self, token: &str, path: &str, body: Value) -> anyhow::Result<reqwest::Response> {
        Ok(self.client.put(self.url(path)).header("Authorization", format!("token {token}")).json(&body).send().await?)
    }

    async fn get(&self, token: Option<&str>, path: &str) -> anyhow::Result<reqwest::Response> {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.header("Authorization", format!("token {token}"));
        }
        Ok(req.send().await?)
    }
}

const JWT_SECRET: &str = "e2e-secret";

#[derive(Serialize)]
struct LoginClaims<'a> {
    sub: &'a str,
    exp: i64,
}

fn signed_token(user_id: &str, secret: &str) -> anyhow::Result<String> {
    let claims = LoginClaims { sub: user_id, exp: (Utc::now() + Duration::days(1)).timestamp() };
    Ok(encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))?)
}

async fn start_server() -> anyhow::Result<TestApp> {
    let managements = Managements::in_memory().with_token_verifier(TokenVerifier::hs256(JWT_SECRET, None));
    let app = startup::app(AppState::new(managements));
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("server error: {}", e);
        }
    });
    Ok(TestApp { base_url: format!("http://{}", addr), client: reqwest::Client::new() })
}

#[tokio::test]
async fn e2e_public_health() -> anyhow::Result<()> {
    let app = start_server().await?;
    let res = app.get(None, "/health").await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn e2e_openapi_document_served() -> anyhow::Result<()> {
    let app = start_server().await?;
    let doc: Value = app.get(None, "/api-docs/openapi.json").await?.json().await?;
    assert!(doc["paths"]["/v2/hackathon/{name}"].is_object());
    Ok(())
}

#[tokio::test]
async fn e2e_login_requires_token() -> anyhow::Result<()> {
    let app = start_server().await?;
    let res = app.client.post(app.url("/v2/login")).json(&json!({ "id": "alice" })).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn e2e_login_rejects_unverified_tokens() -> anyhow::Result<()> {
    let app = start_server().await?;
    for token in ["made-up".to_string(), signed_token("mallory", JWT_SECRET)?, signed_token("alice", "wrong-secret")?] {
        let body = json!({ "id": "alice", "token": token });
        let res = app.client.post(app.url("/v2/login")).json(&body).send().await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let res = app.get(Some(&token), "/v2/hackathon/none/enrollment").await?;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
    Ok(())
}

#[tokio::test]
async fn e2e_protected_routes_reject_anonymous() -> anyhow::Result<()> {
    let app = start_server().await?;
    let res = app.client.put(app.url("/v2/hackathon/anon")).json(&json!({})).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app
        .client
        .put(app.url("/v2/hackathon/anon"))
        .header("Authorization", "token not-a-real-token")
        .json(&json!({}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn e2e_hackathon_lifecycle() -> anyhow::Result<()> {
    let app = start_server().await?;
    let alice = app.login("alice").await?;

    let res = app.put(&alice, "/v2/hackathon/Spring-Hack", json!({ "displayName": "Spring Hack" })).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let created: Value = res.json().await?;
    assert_eq!(created["name"], "spring-hack");
    assert_eq!(created["creatorId"], "alice");
    assert_eq!(created["roles"]["isAdmin"], true);

    let res = app.put(&alice, "/v2/hackathon/bad_name!", json!({})).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let fetched: Value = app.get(None, "/v2/hackathon/spring-hack").await?.json().await?;
    assert_eq!(fetched["displayName"], "Spring Hack");

    let admins: Value = app.get(Some(&alice), "/v2/hackathon/spring-hack/admins").await?.json().await?;
    assert_eq!(admins["value"][0]["userId"], "alice");

    let bob = app.login("bob").await?;
    let res = app.client
        .patch(app.url("/v2/hackathon/spring-hack"))
        .header("Authorization", format!("token {bob}"))
        .json(&json!({ "summary": "hijack" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app.get(None, "/v2/hackathon/missing").await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn e2e_enrollment_and_team_flow() -> anyhow::Result<()> {
    let app = start_server().await?;
    let alice = app.login("alice").await?;
    let bob = app.login("bob").await?;
    let res = app.put(&alice, "/v2/hackathon/relay", json!({ "autoApprove": false })).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let enrollment: Value = app.put(&bob, "/v2/hackathon/relay/enrollment", json!({})).await?.json().await?;
    assert_eq!(enrollment["status"], "pendingApproval");

    let res = app.put(&bob, "/v2/hackathon/relay/team", json!({ "displayName": "rockets" })).await?;
    assert_eq!(res.status(), StatusCode::PRECONDITION_FAILED);

    let res = app
        .client
        .post(app.url("/v2/hackathon/relay/enrollment/bob/approve"))
        .header("Authorization", format!("token {alice}"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let approved: Value = res.json().await?;
    assert_eq!(approved["status"], "approved");

    let res = app.put(&bob, "/v2/hackathon/relay/team", json!({ "displayName": "rockets" })).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let team: Value = res.json().await?;
    assert_eq!(team["creatorId"], "bob");
    assert_eq!(team["membersCount"], 1);

    let check = |name: &'static str| {
        app.client
            .post(app.url("/v2/hackathon/relay/team/checkNameAvailability"))
            .header("Authorization", format!("token {alice}"))
            .json(&json!({ "name": name }))
            .send()
    };
    let taken: Value = check("rockets").await?.json().await?;
    assert_eq!(taken["nameAvailable"], false);
    assert_eq!(taken["reason"], "AlreadyExists");
    let free: Value = check("comets").await?.json().await?;
    assert_eq!(free["nameAvailable"], true);

    let res = app.put(&bob, "/v2/hackathon/relay/team", json!({ "displayName": "rockets-2" })).await?;
    assert_eq!(res.status(), StatusCode::PRECONDITION_FAILED);

    let team_id = team["id"].as_str().unwrap_or_default().to_string();
    let res = app.put(&alice, "/v2/hackathon/other", json!({})).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let res = app.get(None, &format!("/v2/hackathon/relay/team/{team_id}")).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let res = app.get(None, &format!("/v2/hackathon/other/team/{team_id}")).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    app.client
        .delete(app.url(&format!("/v2/hackathon/other/team/{team_id}")))
        .header("Authorization", format!("token {alice}"))
        .send()
        .await?;
    let res = app.get(None, &format!("/v2/hackathon/relay/team/{team_id}")).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let teams: Value = app.get(None, "/v2/hackathon/relay/teams").await?.json().await?;
    assert_eq!(teams["value"].as_array().map(Vec::len), Some(1));

    let logs: Value = app.get(None, "/v2/hackathon/relay/activityLogs").await?.json().await?;
    assert!(logs["value"].as_array().is_some_and(|v| !v.is_empty()));
    Ok(())
}

#[tokio::test]
async fn e2e_experiment_reset() -> anyhow::Result<()> {
    let app = start_server().await?;
    let alice = app.login("alice").await?;
    let bob = app.login("bob").await?;
    assert_eq!(app.put(&alice, "/v2/hackathon/lab", json!({})).await?.status(), StatusCode::OK);

    let template: Value = app.put(&alice, "/v2/hackathon/lab/template", json!({ "image": "ubuntu" })).await?.json().await?;
    let res = app.put(&alice, "/v2/hackathon/lab/experiment", json!({ "templateId": template["id"] })).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let experiment: Value = res.json().await?;
    let id = experiment["id"].as_str().unwrap_or_default().to_string();

    let reset = |token: &str, id: &str| {
        app.client
            .post(app.url(&format!("/v2/hackathon/lab/experiment/{id}/reset")))
            .header("Authorization", format!("token {token}"))
            .send()
    };
    assert_eq!(reset(&bob, &id).await?.status(), StatusCode::FORBIDDEN);
    assert_eq!(reset(&alice, "missing").await?.status(), StatusCode::NOT_FOUND);

    let res = reset(&alice, &id).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["id"], id.as_str());
    assert_eq!(body["status"]["code"], 201);
    Ok(())
}
