use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use qrart::generate::{
    fal::FalProvider, gemini::GeminiProvider, openai::OpenAiProvider, GenerationJob,
    GenerationState, ImageProvider, Orchestrator, OrchestratorError, ProviderError, ProviderImage,
    ProviderRequest, RetryPolicy,
};
use reqwest::Client;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const IMAGE: &[u8] = b"\x89PNG fake image bytes";

fn request(conditioning: bool) -> ProviderRequest {
    ProviderRequest {
        prompt: "Maintain finder patterns".to_string(),
        conditioning: if conditioning { vec![IMAGE.to_vec()] } else { vec![] },
        size: 1024,
    }
}

fn gemini_ok() -> Value {
    json!({
        "candidates": [{
            "content": { "parts": [
                { "text": "here you go" },
                { "inlineData": { "mimeType": "image/png", "data": STANDARD.encode(IMAGE) } }
            ]}
        }]
    })
}

// OpenAI
//------------------------------------------------------------------------------

#[tokio::test]
async fn openai_generation_returns_decoded_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": [{ "b64_json": STANDARD.encode(IMAGE) }] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(Client::new(), server.uri(), "sk-test");
    let image = provider.submit(&request(false)).await.unwrap();
    assert_eq!(image, ProviderImage::Bytes(IMAGE.to_vec()));

    let received = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["model"], "gpt-image-1");
    assert_eq!(body["size"], "1024x1024");
}

#[tokio::test]
async fn openai_edit_sends_multipart_and_reads_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/edits"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": [{ "url": "https://cdn.example.com/a.png" }] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(Client::new(), server.uri(), "sk-test");
    let image = provider.submit(&request(true)).await.unwrap();
    assert_eq!(image, ProviderImage::Url("https://cdn.example.com/a.png".into()));

    let received = server.received_requests().await.unwrap();
    let content_type = received[0].headers.get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("multipart/form-data"));
}

#[tokio::test]
async fn openai_error_classification() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer busy"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer bad"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_api_key"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer empty"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;

    let submit = |key: &str| OpenAiProvider::new(Client::new(), server.uri(), key);

    let busy = submit("busy").submit(&request(false)).await.unwrap_err();
    assert!(matches!(busy, ProviderError::Http { status: 429, .. }));
    assert!(busy.is_transient());

    let bad = submit("bad").submit(&request(false)).await.unwrap_err();
    match &bad {
        ProviderError::Http { status, body } => {
            assert_eq!(*status, 401);
            assert!(body.contains("invalid_api_key"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(!bad.is_transient());

    let empty = submit("empty").submit(&request(false)).await.unwrap_err();
    assert!(matches!(empty, ProviderError::NoImage));

    let missing = submit("").submit(&request(false)).await.unwrap_err();
    assert!(matches!(missing, ProviderError::MissingCredential("OPENAI_API_KEY")));
}

// Gemini
//------------------------------------------------------------------------------

#[tokio::test]
async fn gemini_reads_inline_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash-image:generateContent"))
        .and(header("x-goog-api-key", "g-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_ok()))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GeminiProvider::new(Client::new(), server.uri(), "g-key");
    let image = provider.submit(&request(true)).await.unwrap();
    assert_eq!(image, ProviderImage::Bytes(IMAGE.to_vec()));

    let received = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&received[0].body).unwrap();
    let parts = &body["contents"][0]["parts"];
    assert_eq!(parts[0]["text"], "Maintain finder patterns");
    assert_eq!(parts[1]["inline_data"]["data"], STANDARD.encode(IMAGE));
}

#[tokio::test]
async fn gemini_without_image_or_with_garbage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-goog-api-key", "text-only"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "I cannot draw that" }] } }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("x-goog-api-key", "garbage"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let text_only = GeminiProvider::new(Client::new(), server.uri(), "text-only");
    assert!(matches!(text_only.submit(&request(true)).await, Err(ProviderError::NoImage)));

    let garbage = GeminiProvider::new(Client::new(), server.uri(), "garbage");
    let err = garbage.submit(&request(true)).await.unwrap_err();
    assert!(matches!(err, ProviderError::MalformedResponse(_)));
    assert!(!err.is_transient());
}

// fal
//------------------------------------------------------------------------------

async fn mount_fal_queue(server: &MockServer) {
    let base = server.uri();
    Mock::given(method("POST"))
        .and(path("/fal-ai/illusion-diffusion"))
        .and(header("authorization", "Key fal-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "request_id": "req-1",
            "status_url": format!("{base}/requests/req-1/status"),
            "response_url": format!("{base}/requests/req-1"),
        })))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/requests/req-1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "IN_PROGRESS" })))
        .up_to_n_times(2)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/requests/req-1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "COMPLETED" })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/requests/req-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "image": { "url": "https://fal.media/files/result.png" }
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn fal_submits_polls_and_fetches() {
    let server = MockServer::start().await;
    mount_fal_queue(&server).await;

    let provider = FalProvider::new(Client::new(), server.uri(), "fal-secret")
        .with_poll_interval(Duration::from_millis(5));
    let image = provider.submit(&request(true)).await.unwrap();
    assert_eq!(image, ProviderImage::Url("https://fal.media/files/result.png".into()));

    let received = server.received_requests().await.unwrap();
    let submit: Value = serde_json::from_slice(&received[0].body).unwrap();
    let expected = format!("data:image/png;base64,{}", STANDARD.encode(IMAGE));
    assert_eq!(submit["image_url"], expected.as_str());
    let polls = received.iter().filter(|r| r.url.path().ends_with("/status")).count();
    assert_eq!(polls, 3);
}

#[tokio::test]
async fn fal_needs_a_qr_image() {
    let provider = FalProvider::new(Client::new(), "http://127.0.0.1:9", "fal-secret");
    let err = provider.submit(&request(false)).await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidRequest(_)));
    assert!(!err.is_transient());
}

// Orchestrator over HTTP providers
//------------------------------------------------------------------------------

fn job() -> GenerationJob {
    GenerationJob {
        payload: "https://example.com".into(),
        description: Some("mosaic tiles".into()),
        conditioning: vec![IMAGE.to_vec()],
        size: 1024,
    }
}

fn policy(timeout: Duration) -> RetryPolicy {
    RetryPolicy { attempts: 2, delay: Duration::from_millis(10), timeout }
}

#[tokio::test]
async fn server_errors_are_retried_then_fall_back() {
    let fal_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&fal_server)
        .await;
    let gemini_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_ok()))
        .expect(1)
        .mount(&gemini_server)
        .await;

    let providers: Vec<Arc<dyn ImageProvider>> = vec![
        Arc::new(FalProvider::new(Client::new(), fal_server.uri(), "fal-secret")),
        Arc::new(GeminiProvider::new(Client::new(), gemini_server.uri(), "g-key")),
    ];
    let orchestrator = Orchestrator::new(providers, policy(Duration::from_secs(5)));
    let generated = orchestrator.generate(&job(), None, None).await.unwrap();

    assert_eq!(generated.provider, "gemini");
    assert_eq!(generated.image, ProviderImage::Bytes(IMAGE.to_vec()));
    let retries = generated
        .trail
        .iter()
        .filter(|s| matches!(s, GenerationState::RetryableFailure { .. }))
        .count();
    assert_eq!(retries, 1);
    assert!(generated.trail.contains(&GenerationState::Fallback { provider: "gemini".into() }));

    // The prompt sent to the fallback carries the structure rules
    let received = gemini_server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&received[0].body).unwrap();
    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap().to_lowercase();
    assert!(prompt.contains("finder patterns"));
    assert!(prompt.contains("mosaic tiles"));
}

#[tokio::test]
async fn rejected_credentials_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .expect(1)
        .mount(&server)
        .await;

    let providers: Vec<Arc<dyn ImageProvider>> =
        vec![Arc::new(OpenAiProvider::new(Client::new(), server.uri(), "sk-bad"))];
    let orchestrator = Orchestrator::new(providers, policy(Duration::from_secs(5)));
    let failure = orchestrator.generate(&job(), None, None).await.unwrap_err();

    assert!(matches!(failure.error, OrchestratorError::Exhausted { tiers: 1, .. }));
    assert_eq!(failure.trail.last(), Some(&GenerationState::TerminalFailure));
}

#[tokio::test]
async fn slow_provider_times_out_per_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(gemini_ok()).set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let providers: Vec<Arc<dyn ImageProvider>> =
        vec![Arc::new(GeminiProvider::new(Client::new(), server.uri(), "g-key"))];
    let orchestrator = Orchestrator::new(providers, policy(Duration::from_millis(200)));
    let started = std::time::Instant::now();
    let failure = orchestrator.generate(&job(), None, None).await.unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(3));
    match failure.error {
        OrchestratorError::Exhausted { last, .. } => assert!(last.contains("timed out")),
        other => panic!("unexpected {other:?}"),
    }
    let calls = failure
        .trail
        .iter()
        .filter(|s| matches!(s, GenerationState::CallingProvider { .. }))
        .count();
    assert_eq!(calls, 2);
}
