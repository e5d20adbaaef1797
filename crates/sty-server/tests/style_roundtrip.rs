use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use image::{DynamicImage, ImageFormat};
use serde_json::{Value, json};
use sty_client::{
    ApiErrorKind, AspectRatio, ClientConfig, DEFAULT_TIMEOUT, FluxParams, StyleClient, StyleModel,
    StyleParams,
};
use sty_server::backend::{AppState, PROBLEM_CONTENT_TYPE, Problem, serve_on};
use sty_server::replicate::ReplicateClient;
use sty_server::{PollConfig, ServerConfig};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Stand-in for the remote prediction API
#[derive(Default)]
struct FakeReplicate {
    base: String,
    unavailable_submits: usize,
    omit_status_url: bool,
    hang_submits: bool,
    never_finishes: bool,
    submits: AtomicUsize,
    polls: AtomicUsize,
    bodies: Mutex<Vec<Value>>,
    auth: Mutex<Vec<Option<String>>>,
}

impl FakeReplicate {
    fn output_url(&self) -> String {
        format!("{}/files/out.png", self.base)
    }
}

async fn create_prediction(
    State(fake): State<Arc<FakeReplicate>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let call = fake.submits.fetch_add(1, Ordering::SeqCst);
    let auth = headers.get(header::AUTHORIZATION).map(|v| v.to_str().unwrap().to_string());
    fake.auth.lock().unwrap().push(auth);
    fake.bodies.lock().unwrap().push(body);

    if fake.hang_submits {
        tokio::time::sleep(Duration::from_secs(30)).await;
    }
    if call < fake.unavailable_submits {
        return (StatusCode::SERVICE_UNAVAILABLE, "try again").into_response();
    }
    if fake.omit_status_url {
        return Json(json!({ "id": "p1", "status": "starting" })).into_response();
    }
    Json(json!({
        "id": "p1",
        "status": "starting",
        "urls": { "get": format!("{}/v1/predictions/p1", fake.base) }
    }))
    .into_response()
}

async fn get_prediction(State(fake): State<Arc<FakeReplicate>>) -> Json<Value> {
    let call = fake.polls.fetch_add(1, Ordering::SeqCst);
    if fake.never_finishes || call < 2 {
        Json(json!({ "id": "p1", "status": "processing", "logs": "loading model\nstep 12/30" }))
    } else {
        Json(json!({ "id": "p1", "status": "succeeded", "output": [fake.output_url()] }))
    }
}

async fn output_file() -> impl IntoResponse {
    let body = encode(&DynamicImage::new_rgb8(768, 768), ImageFormat::Png);
    ([(header::CONTENT_TYPE, "image/png")], body)
}

fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
}

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    (listener, base)
}

struct Harness {
    client: StyleClient,
    service_base: String,
    fake: Arc<FakeReplicate>,
    shutdown: CancellationToken,
}

async fn start(fake: FakeReplicate) -> Harness {
    start_tuned(fake, |_| {}).await
}

async fn start_tuned(mut fake: FakeReplicate, tune: impl FnOnce(&mut ServerConfig)) -> Harness {
    let (fake_listener, fake_base) = bind().await;
    fake.base = fake_base.clone();
    let fake = Arc::new(fake);
    let fake_router = Router::new()
        .route("/v1/predictions", post(create_prediction))
        .route("/v1/predictions/{id}", get(get_prediction))
        .route("/files/out.png", get(output_file))
        .with_state(fake.clone());
    tokio::spawn(async move {
        axum::serve(fake_listener, fake_router).await.unwrap();
    });

    let mut config = ServerConfig::new("test-token");
    config.api_base = format!("{fake_base}/v1");
    config.poll = PollConfig {
        initial_interval: Duration::from_millis(10),
        interval_step: Duration::from_millis(10),
        max_interval: Duration::from_millis(50),
        budget: Duration::from_secs(10),
        max_ticks: 180,
    };
    tune(&mut config);
    let api = ReplicateClient::new(&config).unwrap();

    let shutdown = CancellationToken::new();
    let state = AppState::new(config, Arc::new(api), shutdown.clone());
    let (listener, service_base) = bind().await;
    let token = shutdown.clone();
    tokio::spawn(async move {
        serve_on(listener, state, token).await.unwrap();
    });

    let client = StyleClient::new(ClientConfig::new(service_base.clone())).unwrap();
    Harness { client, service_base, fake, shutdown }
}

fn anime() -> StyleParams {
    StyleParams::new("anime style").unwrap()
}

#[tokio::test]
async fn test_style_transfer_round_trip() {
    let harness = start(FakeReplicate::default()).await;

    let styled = harness
        .client
        .style_image(&DynamicImage::new_rgb8(256, 256), anime())
        .await
        .unwrap();

    assert_eq!(styled.format, ImageFormat::Jpeg);
    assert_eq!((styled.image.width(), styled.image.height()), (256, 256));
    assert_eq!(harness.fake.submits.load(Ordering::SeqCst), 1);
    assert_eq!(harness.fake.polls.load(Ordering::SeqCst), 3);

    let auth = harness.fake.auth.lock().unwrap().clone();
    assert_eq!(auth, vec![Some("Bearer test-token".to_string())]);

    let body = harness.fake.bodies.lock().unwrap()[0].clone();
    assert_eq!(body["version"], StyleModel::StyleTransfer.version());
    assert_eq!(body["input"]["prompt"], "anime style");
    assert_eq!(body["input"]["num_inference_steps"], 30);
    assert!(body["input"]["image"].as_str().unwrap().starts_with("data:image/png;base64,"));
    assert!(!body["input"]["negative_prompt"].as_str().unwrap().is_empty());

    harness.shutdown.cancel();
}

#[tokio::test]
async fn test_flux_round_trip() {
    let harness = start(FakeReplicate::default()).await;

    let params = FluxParams::new("90s cartoon", AspectRatio::Ratio(4, 3)).unwrap();
    let styled = harness
        .client
        .style_image_flux(&DynamicImage::new_rgb8(2000, 1500), params)
        .await
        .unwrap();
    assert_eq!((styled.image.width(), styled.image.height()), (2000, 1500));

    let body = harness.fake.bodies.lock().unwrap()[0].clone();
    assert_eq!(body["version"], StyleModel::Flux.version());
    assert_eq!(body["input"]["aspect_ratio"], "4:3");
    assert!(body["input"]["input_image"].as_str().unwrap().starts_with("data:"));
}

#[tokio::test]
async fn test_unavailable_submission_is_retried() {
    let harness = start(FakeReplicate {
        unavailable_submits: 1,
        ..FakeReplicate::default()
    })
    .await;

    harness
        .client
        .style_image(&DynamicImage::new_rgb8(64, 64), anime())
        .await
        .unwrap();
    assert_eq!(harness.fake.submits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_missing_status_url_is_bad_gateway() {
    let harness = start(FakeReplicate {
        omit_status_url: true,
        ..FakeReplicate::default()
    })
    .await;

    let err = harness
        .client
        .style_image(&DynamicImage::new_rgb8(64, 64), anime())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::ServerError);
    assert_eq!(err.status, Some(502));
    assert!(err.message.contains("urls.get"));
    assert_eq!(harness.fake.submits.load(Ordering::SeqCst), 1);
    assert_eq!(harness.fake.polls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_client_outlasts_service_deadline() {
    let config = ServerConfig::new("token");
    let service_worst_case = config.poll.budget + config.request_timeout * 2;
    assert!(DEFAULT_TIMEOUT > service_worst_case);
}

#[tokio::test]
async fn test_polling_budget_reaches_client_as_gateway_timeout() {
    let harness = start_tuned(
        FakeReplicate {
            never_finishes: true,
            ..FakeReplicate::default()
        },
        |config| config.poll.budget = Duration::from_millis(300),
    )
    .await;

    let err = harness
        .client
        .style_image(&DynamicImage::new_rgb8(64, 64), anime())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::ServerError);
    assert_eq!(err.status, Some(504));
    assert_eq!(harness.fake.submits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stuck_submission_is_retried_then_bad_gateway() {
    let harness = start_tuned(
        FakeReplicate {
            hang_submits: true,
            ..FakeReplicate::default()
        },
        |config| config.request_timeout = Duration::from_millis(200),
    )
    .await;

    let err = harness
        .client
        .style_image(&DynamicImage::new_rgb8(64, 64), anime())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::ServerError);
    assert_eq!(err.status, Some(502));
    assert!(err.message.contains("timeout"), "{}", err.message);
    assert_eq!(harness.fake.submits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_missing_file_never_reaches_remote() {
    let harness = start(FakeReplicate::default()).await;

    let form = reqwest::multipart::Form::new().text("prompt", "anime style");
    let response = reqwest::Client::new()
        .post(format!("{}/api/style", harness.service_base))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[header::CONTENT_TYPE], PROBLEM_CONTENT_TYPE);
    let problem: Problem = response.json().await.unwrap();
    assert_eq!(problem.kind, "validation");
    assert_eq!(harness.fake.submits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unacceptable_accept_header() {
    let harness = start(FakeReplicate::default()).await;

    let png = encode(&DynamicImage::new_rgb8(8, 8), ImageFormat::Png);
    let file = reqwest::multipart::Part::bytes(png).file_name("image.png");
    let form = reqwest::multipart::Form::new()
        .part("file", file)
        .text("prompt", "anime style");
    let response = reqwest::Client::new()
        .post(format!("{}/api/style", harness.service_base))
        .header(header::ACCEPT, "application/json")
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    assert_eq!(harness.fake.submits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_health() {
    let harness = start(FakeReplicate::default()).await;

    let body: Value = reqwest::get(format!("{}/health", harness.service_base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "status": "ok" }));
}
