use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header::RETRY_AFTER},
};
use chrono::Duration;
use forms_backend::{
    AppState,
    cache::{KeyValueStore, MemoryStore, SharedStore},
    config::Config,
    rate_limit::{Clock, EscalatingPolicy, ManualClock, PolicyTable},
    router::create_router,
};
use serde_json::Value;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    clock: ManualClock,
    signup: MemoryStore,
    contact: MemoryStore,
    limits: MemoryStore,
}

fn app_with(config: Config, with_stores: bool) -> TestApp {
    let clock = ManualClock::default();
    let signup = MemoryStore::with_clock(Arc::new(clock.clone()));
    let contact = MemoryStore::with_clock(Arc::new(clock.clone()));
    let limits = MemoryStore::with_clock(Arc::new(clock.clone()));

    let shared = |store: &MemoryStore| -> Option<SharedStore> {
        with_stores.then(|| Arc::new(store.clone()) as SharedStore)
    };
    let state = AppState {
        policies: Arc::new(config.rate_limits.clone()),
        config: Arc::new(config),
        signup_store: shared(&signup),
        contact_store: shared(&contact),
        rate_limit_store: shared(&limits),
        clock: Arc::new(clock.clone()),
    };

    TestApp {
        router: create_router(state),
        clock,
        signup,
        contact,
        limits,
    }
}

fn app() -> TestApp {
    app_with(
        Config {
            global_rate_limit: false,
            ..Config::default()
        },
        true,
    )
}

fn form(path: &str, body: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/x-www-form-urlencoded")
        .header("cf-connecting-ip", ip)
        .header("user-agent", "test-agent")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn stored(store: &MemoryStore, key: &str) -> Option<Value> {
    store
        .get(key)
        .await
        .unwrap()
        .map(|raw| serde_json::from_str(&raw).unwrap())
}

#[tokio::test]
async fn signup_stores_email_and_throttles_repeats() {
    let app = app();

    let (status, body) = send(&app, form("/api/signup", "email=a%40b.com", "1.1.1.1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert_eq!(body["msg"], "Thank you! We'll notify you when we launch.");
    assert_eq!(body["resp_data"]["alreadyExists"], false);

    let record = stored(&app.signup, "a@b.com").await.unwrap();
    assert_eq!(record["status"], "stored");
    assert_eq!(record["source"], "works-page-signup");
    assert_eq!(record["ip"], "1.1.1.1");
    assert_eq!(record["userAgent"], "test-agent");
    assert!(stored(&app.signup, "signup_email_rate_limit:a@b.com").await.is_some());
    assert!(stored(&app.signup, "signup_ip_rate_limit:1.1.1.1").await.is_some());

    let (status, body) = send(&app, form("/api/signup", "email=a%40b.com", "1.1.1.1")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], 1005);
    assert_eq!(body["kind"], "TOO_MANY_REQUESTS");
    assert_eq!(
        body["error_message"],
        "You can only sign up once every 10 minutes. Please wait before trying again."
    );
}

#[tokio::test]
async fn signup_reports_existing_subscription_after_window() {
    let app = app();
    send(&app, form("/api/signup", "email=a%40b.com", "1.1.1.1")).await;

    app.clock.advance(Duration::minutes(10) + Duration::seconds(1));
    let (status, body) = send(&app, form("/api/signup", "email=a%40b.com", "1.1.1.1")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["msg"], "You are already subscribed!");
    assert_eq!(body["resp_data"]["alreadyExists"], true);
}

#[tokio::test]
async fn signup_throttles_by_ip() {
    let app = app();
    send(&app, form("/api/signup", "email=a%40b.com", "2.2.2.2")).await;

    let (status, body) = send(&app, form("/api/signup", "email=c%40d.com", "2.2.2.2")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        body["error_message"],
        "Too many signup requests from your location. Please wait before trying again."
    );
    assert!(stored(&app.signup, "c@d.com").await.is_none());

    let (status, _) = send(&app, form("/api/signup", "email=e%40f.com", "3.3.3.3")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn contact_stores_submission_and_email_index() {
    let app = app();
    let millis = app.clock.now().timestamp_millis();

    let (status, body) = send(
        &app,
        form(
            "/api/contact",
            "name=Ada&email=ada%40example.com&company=&message=Hello+there%2C+friend",
            "4.4.4.4",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["msg"], "Thank you for your message! We'll get back to you soon.");

    let contact_id = body["resp_data"]["contactId"].as_str().unwrap().to_string();
    assert!(contact_id.starts_with(&format!("{}-", millis)));

    let record = stored(&app.contact, &contact_id).await.unwrap();
    assert_eq!(record["name"], "Ada");
    assert_eq!(record["email"], "ada@example.com");
    assert_eq!(record["company"], Value::Null);
    assert_eq!(record["message"], "Hello there, friend");
    assert_eq!(record["source"], "contact-page");
    assert_eq!(record["status"], "new");

    let index = stored(&app.contact, &format!("email:ada@example.com:{}", millis))
        .await
        .unwrap();
    assert_eq!(index["contactId"], contact_id.as_str());

    let (status, body) = send(
        &app,
        form(
            "/api/contact",
            "name=Ada&email=ada%40example.com&message=Hello+again+friend",
            "5.5.5.5",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        body["error_message"],
        "You can only send one message every 5 minutes. Please wait before sending another message."
    );
}

#[tokio::test]
async fn invalid_input_is_rejected_before_rate_limiting() {
    let app = app();

    let (status, body) = send(&app, form("/api/signup", "email=not-an-email", "6.6.6.6")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1000);
    assert_eq!(body["error_message"], "Please enter a valid email address");

    let (status, body) = send(
        &app,
        form("/api/contact", "name=Ada&email=ada%40example.com&message=short", "6.6.6.6"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_message"], "Message must be at least 10 characters");

    assert!(app.signup.is_empty().await);
    assert!(app.contact.is_empty().await);
}

#[tokio::test]
async fn missing_store_is_an_internal_error() {
    let app = app_with(Config::default(), false);

    let (status, body) = send(&app, form("/api/signup", "email=a%40b.com", "7.7.7.7")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error_message"], "Email store not configured");

    let (status, body) = send(
        &app,
        form(
            "/api/contact",
            "name=Ada&email=ada%40example.com&message=Hello+there+friend",
            "7.7.7.7",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error_message"], "Contact store not configured");
}

#[tokio::test]
async fn throttled_responses_carry_retry_after() {
    let app = app();
    send(&app, form("/api/signup", "email=a%40b.com", "1.1.1.1")).await;
    app.clock.advance(Duration::seconds(150));

    let response = app
        .router
        .clone()
        .oneshot(form("/api/signup", "email=a%40b.com", "1.1.1.1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    // 剩余 7.5 分钟，向上取整为 8 分钟
    assert_eq!(response.headers()[RETRY_AFTER], "480");
}

#[tokio::test]
async fn global_limit_blocks_noisy_ip() {
    let escalating = EscalatingPolicy::new("rate_limit", 2, 15.0, 60.0).unwrap();
    let app = app_with(
        Config {
            rate_limits: PolicyTable::default().with_escalating(escalating),
            ..Config::default()
        },
        true,
    );

    for _ in 0..2 {
        let (status, _) = send(&app, form("/api/signup", "email=bad", "9.9.9.9")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, body) = send(&app, form("/api/signup", "email=bad", "9.9.9.9")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error_message"], "Please wait 60 minutes before trying again.");
    assert!(stored(&app.limits, "blocked:9.9.9.9").await.is_some());

    let (status, _) = send(&app, form("/api/signup", "email=bad", "8.8.8.8")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.clock.advance(Duration::minutes(61));
    let (status, _) = send(&app, form("/api/signup", "email=bad", "9.9.9.9")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
