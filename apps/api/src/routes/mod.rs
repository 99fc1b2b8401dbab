pub mod health;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::analysis::handlers as analysis;
use crate::profile::handlers as profile;
use crate::rate_limit::{rate_limit_middleware, RateLimitState, RatePolicy};
use crate::state::AppState;
use crate::users::handlers as users;

pub fn build_router(state: AppState) -> Router {
    let trust_proxy = state.config.trust_proxy_headers;
    let auth_limit = RateLimitState::new(
        state.limiter.clone(),
        RatePolicy::per_minute("auth", state.config.auth_rate_limit_per_minute),
    )
    .trusting_proxy_headers(trust_proxy);
    let api_limit = RateLimitState::new(
        state.limiter.clone(),
        RatePolicy::per_minute("api", state.config.rate_limit_per_minute),
    )
    .trusting_proxy_headers(trust_proxy);

    // Sign-up and sign-in get the tighter budget.
    let auth_routes = Router::new()
        .route("/users/auth/register", post(users::handle_register))
        .route("/users/auth/token", post(users::handle_token))
        .layer(middleware::from_fn_with_state(auth_limit, rate_limit_middleware));

    let api_routes = Router::new()
        .route(
            "/users/:user_id",
            get(users::handle_get_user)
                .put(users::handle_replace_user)
                .delete(users::handle_delete_user),
        )
        .route(
            "/profile/:user_id",
            get(profile::handle_get_profile).put(profile::handle_update_profile),
        )
        .route(
            "/profile/:user_id/:card",
            get(profile::handle_get_card).post(profile::handle_save_card),
        )
        .route("/analysis/:user_id/analyze", post(analysis::handle_analyze))
        .route("/analysis/:user_id/report", get(analysis::handle_get_report))
        .route("/analysis/:user_id/history", get(analysis::handle_history))
        .layer(middleware::from_fn_with_state(api_limit, rate_limit_middleware));

    Router::new()
        .route("/health", get(health::health_handler))
        .merge(auth_routes)
        .merge(api_routes)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        extract::ConnectInfo,
        http::{header, HeaderMap, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::llm_client::{LlmError, FALLBACK_MODEL};
    use crate::test_support::{test_state, ScriptedCompletion};

    const PASSWORD: &str = "correct-horse";
    const REPORT: &str = r#"{"summary": "Good fit for backend roles.", "categories": [{"name": "Technical Skills", "strengths": ["Rust"], "recommendations": ["Contribute to an open source crate"]}]}"#;

    fn app_with(llm: ScriptedCompletion) -> Router {
        build_router(test_state(Arc::new(llm)))
    }

    fn app() -> Router {
        app_with(ScriptedCompletion::new(Vec::new()))
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, body)
    }

    fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn token_request(form: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/users/auth/token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap()
    }

    fn registration(uid: &str) -> Value {
        json!({
            "uid": uid,
            "firstName": "Grace",
            "lastName": "Hopper",
            "email": format!("{uid}@example.com"),
            "birthYear": 1998,
            "location": {"city": "Izmir", "country": "TR"},
            "password": PASSWORD
        })
    }

    /// Registers `uid` and returns a fresh access token.
    async fn sign_up(router: &Router, uid: &str) -> String {
        let (status, _, body) = send(
            router,
            json_request(Method::POST, "/users/auth/register", None, registration(uid)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["uid"], uid);

        let (status, _, body) =
            send(router, token_request(&format!("username={uid}&password={PASSWORD}"))).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["token_type"], "bearer");
        body["access_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, _, body) = send(&app(), get_request("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "skillcompass-api");
    }

    #[tokio::test]
    async fn test_register_then_token_is_usable() {
        let router = app();
        let token = sign_up(&router, "u1").await;

        let (status, _, body) = send(&router, get_request("/users/u1", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["firstName"], "Grace");
        assert_eq!(body["location"]["city"], "Izmir");
        assert!(body.get("password_hash").is_none());
        assert!(body.get("password").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let router = app();
        sign_up(&router, "u1").await;
        let (status, _, body) = send(
            &router,
            json_request(Method::POST, "/users/auth/register", None, registration("u1")),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_wrong_password_and_missing_fields() {
        let router = app();
        sign_up(&router, "u1").await;

        let (status, _, body) = send(&router, token_request("username=u1&password=nope-nope")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["message"], "Incorrect username or password");

        let (status, _, _) = send(&router, token_request("username=u1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_or_garbage_token_is_401() {
        let router = app();
        let (status, _, body) = send(&router, get_request("/profile/u1/networking", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["message"], "Authentication required");

        let (status, _, body) =
            send(&router, get_request("/profile/u1/networking", Some("not.a.jwt"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["message"], "Invalid token");
    }

    #[tokio::test]
    async fn test_card_round_trip_and_defaults() {
        let router = app();
        let token = sign_up(&router, "u1").await;

        let (status, _, body) =
            send(&router, get_request("/profile/u1/career-vision", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["short_term_goal"], "");
        assert_eq!(body["priorities"], json!([]));

        let card = json!({
            "short_term_goal": "Land a backend internship",
            "long_term_goal": "Lead a platform team",
            "priorities": ["learning", "mentorship"],
            "custom_priority": "",
            "progress": 25
        });
        let (status, _, body) = send(
            &router,
            json_request(Method::POST, "/profile/u1/career-vision", Some(&token), card.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "success"}));

        let (_, _, body) =
            send(&router, get_request("/profile/u1/career-vision", Some(&token))).await;
        assert_eq!(body, card);
    }

    #[tokio::test]
    async fn test_unknown_card_is_404() {
        let router = app();
        let token = sign_up(&router, "u1").await;
        let (status, _, _) = send(&router, get_request("/profile/u1/hobbies", Some(&token))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_other_users_data_is_forbidden() {
        let router = app();
        sign_up(&router, "u1").await;
        let intruder = sign_up(&router, "u2").await;

        let (status, _, _) =
            send(&router, get_request("/profile/u1/networking", Some(&intruder))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, _) = send(
            &router,
            json_request(Method::POST, "/analysis/u1/analyze", Some(&intruder), Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_bulk_profile_update() {
        let router = app();
        let token = sign_up(&router, "u1").await;

        let (status, _, _) = send(&router, get_request("/profile/u1", Some(&token))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, body) = send(
            &router,
            json_request(
                Method::PUT,
                "/profile/u1",
                Some(&token),
                json!({
                    "networking": {"networkingGoal": "Join a Rust meetup"},
                    "personal-brand": {"brand_goal": "Start a blog"}
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["updated"], json!(["networking", "personal-brand"]));

        let (status, _, body) = send(&router, get_request("/profile/u1", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["networking"]["networking_goal"], "Join a Rust meetup");
        assert_eq!(body["personal-brand"]["brand_goal"], "Start a blog");

        let (status, _, _) = send(
            &router,
            json_request(Method::PUT, "/profile/u1", Some(&token), json!({"hobbies": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_analysis_without_cards_has_no_data() {
        let router = app_with(ScriptedCompletion::replying(REPORT));
        let token = sign_up(&router, "u1").await;

        let (status, _, body) = send(
            &router,
            json_request(Method::POST, "/analysis/u1/analyze", Some(&token), Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "Profile data missing");
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn test_analysis_success_then_report_and_history() {
        let router = app_with(ScriptedCompletion::replying(REPORT));
        let token = sign_up(&router, "u1").await;
        send(
            &router,
            json_request(
                Method::POST,
                "/profile/u1/technical-profile",
                Some(&token),
                json!({"skills": ["Rust", "PostgreSQL"], "confidence": 3}),
            ),
        )
        .await;

        let (status, _, body) = send(
            &router,
            json_request(Method::POST, "/analysis/u1/analyze", Some(&token), Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["progress"].as_array().unwrap().len(), 4);
        let data = body["data"].clone();
        assert_eq!(data["summary"], "Good fit for backend roles.");

        let (status, _, report) = send(&router, get_request("/analysis/u1/report", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["report"], data);

        let (_, _, history) = send(&router, get_request("/analysis/u1/history", Some(&token))).await;
        assert_eq!(history.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_analysis_falls_back_and_reports_total_failure() {
        let router = app_with(ScriptedCompletion::new(vec![
            Err(LlmError::EmptyContent),
            Ok(REPORT.to_string()),
            Err(LlmError::Api { status: 500, message: "primary down".into() }),
            Err(LlmError::Api { status: 500, message: "fallback down".into() }),
        ]));
        let token = sign_up(&router, "u1").await;
        send(
            &router,
            json_request(
                Method::POST,
                "/profile/u1/networking",
                Some(&token),
                json!({"mentorship_need": "system design"}),
            ),
        )
        .await;

        let analyze = || json_request(Method::POST, "/analysis/u1/analyze", Some(&token), Value::Null);

        let (_, _, body) = send(&router, analyze()).await;
        assert_eq!(body["status"], "success");
        let (_, _, report) = send(&router, get_request("/analysis/u1/report", Some(&token))).await;
        assert_eq!(report["model"], FALLBACK_MODEL);

        let (status, _, body) = send(&router, analyze()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "error");
        assert!(body["error"].as_str().unwrap().contains("fallback down"));
    }

    #[tokio::test]
    async fn test_report_before_analysis_is_404() {
        let router = app();
        let token = sign_up(&router, "u1").await;
        let (status, _, _) = send(&router, get_request("/analysis/u1/report", Some(&token))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sixth_token_request_is_rate_limited() {
        let router = app();
        for _ in 0..5 {
            let (status, _, _) =
                send(&router, token_request("username=ghost&password=whatever1")).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }

        let (status, headers, _) =
            send(&router, token_request("username=ghost&password=whatever1")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(headers.contains_key(header::RETRY_AFTER));

        let (status, _, _) = send(&router, get_request("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_spoofed_forwarded_for_does_not_reset_login_budget() {
        let router = app();
        let mut statuses = Vec::new();
        for i in 0..6 {
            let mut request = token_request("username=ghost&password=whatever1");
            request
                .headers_mut()
                .insert("x-forwarded-for", format!("10.9.0.{i}").parse().unwrap());
            request
                .extensions_mut()
                .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 44], 51000))));
            let (status, _, _) = send(&router, request).await;
            statuses.push(status);
        }
        assert!(statuses[..5].iter().all(|s| *s == StatusCode::UNAUTHORIZED));
        assert_eq!(statuses[5], StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_trusted_proxy_headers_separate_clients() {
        let mut state = test_state(Arc::new(ScriptedCompletion::new(Vec::new())));
        state.config.trust_proxy_headers = true;
        let router = build_router(state);

        for _ in 0..5 {
            let mut request = token_request("username=ghost&password=whatever1");
            request
                .headers_mut()
                .insert("x-forwarded-for", "203.0.113.5".parse().unwrap());
            send(&router, request).await;
        }
        let mut request = token_request("username=ghost&password=whatever1");
        request
            .headers_mut()
            .insert("x-forwarded-for", "203.0.113.6".parse().unwrap());
        let (status, _, _) = send(&router, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_replace_and_delete_user() {
        let router = app();
        let token = sign_up(&router, "u1").await;

        let mut replacement = registration("u1");
        replacement["firstName"] = json!("Amazing Grace");
        let (status, _, body) = send(
            &router,
            json_request(Method::PUT, "/users/u1", Some(&token), replacement),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["firstName"], "Amazing Grace");

        let (status, _, body) = send(
            &router,
            Request::builder()
                .method(Method::DELETE)
                .uri("/users/u1")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "User deleted");

        let (status, _, _) = send(&router, get_request("/users/u1", Some(&token))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
