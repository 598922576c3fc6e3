//! Integration tests: boot the gateway on a free port with mock LINE and
//! Azure OpenAI endpoints, then drive it through POST /callback over HTTP.
//! No real network services are required.

use base64::Engine;
use hmac::{Hmac, Mac};
use lib::config::Config;
use lib::gateway;
use lib::llm::FALLBACK_DESCRIPTION;
use serde_json::{json, Value};
use sha2::Sha256;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CHANNEL_SECRET: &str = "test-channel-secret";
const FALLBACK_IMAGE_URL: &str = "https://fallback.example.com/stop.png";

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

fn sign(body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(CHANNEL_SECRET.as_bytes()).unwrap();
    mac.update(body);
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// Recorded upstream traffic: replies sent to the LINE mock and the set of
/// reply tokens it has already accepted.
#[derive(Clone, Default)]
struct MockState {
    replies: Arc<Mutex<Vec<Value>>>,
    used_tokens: Arc<Mutex<HashSet<String>>>,
}

/// Mock LINE + Azure OpenAI server. A deployment named "broken" answers 500,
/// which is how tests exercise the fallback paths.
async fn start_mock_upstream(state: MockState) -> String {
    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    async fn chat_completions(
        Path(dep): Path<String>,
        Json(body): Json<Value>,
    ) -> axum::response::Response {
        if dep == "broken" {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        // fetch the staged image the gateway published and echo its bytes
        // back as the "description", so each reply is traceable to the
        // exact image that request staged
        let image_url = body["messages"][1]["content"][1]["image_url"]["url"]
            .as_str()
            .expect("image_url in vision request")
            .to_string();
        let bytes = reqwest::get(&image_url)
            .await
            .expect("fetch staged image")
            .bytes()
            .await
            .expect("staged image bytes");
        let description = format!("描述:{}", String::from_utf8_lossy(&bytes));
        Json(json!({
            "choices": [ { "message": { "role": "assistant", "content": description } } ]
        }))
        .into_response()
    }

    async fn image_generations(
        Path(dep): Path<String>,
        Json(body): Json<Value>,
    ) -> axum::response::Response {
        if dep == "broken" {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        let prompt = body["prompt"].as_str().unwrap_or_default();
        assert_eq!(body["n"], json!(1));
        Json(json!({
            "data": [ { "url": format!("https://img.example.com/gen?prompt={}", prompt) } ]
        }))
        .into_response()
    }

    async fn reply(
        State(state): State<MockState>,
        Json(body): Json<Value>,
    ) -> axum::response::Response {
        let token = body["replyToken"].as_str().unwrap_or_default().to_string();
        if !state.used_tokens.lock().unwrap().insert(token) {
            // reply tokens are single-use
            return (StatusCode::BAD_REQUEST, "Invalid reply token").into_response();
        }
        state.replies.lock().unwrap().push(body);
        Json(json!({})).into_response()
    }

    async fn message_content(Path(id): Path<String>) -> Vec<u8> {
        format!("image-bytes-{}", id).into_bytes()
    }

    let app = Router::new()
        .route("/openai/deployments/:dep/chat/completions", post(chat_completions))
        .route("/openai/deployments/:dep/images/generations", post(image_generations))
        .route("/v2/bot/message/reply", post(reply))
        .route("/v2/bot/message/:id/content", get(message_content))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock upstream");
    let addr = listener.local_addr().expect("mock addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

struct Harness {
    gw_url: String,
    media_dir: PathBuf,
    mock: MockState,
    client: reqwest::Client,
}

impl Harness {
    /// Recorded reply bodies, oldest first.
    fn replies(&self) -> Vec<Value> {
        self.mock.replies.lock().unwrap().clone()
    }

    async fn post_callback(&self, body: &Value, signature: Option<&str>) -> reqwest::Response {
        let raw = serde_json::to_vec(body).unwrap();
        let mut req = self
            .client
            .post(format!("{}/callback", self.gw_url))
            .body(raw);
        if let Some(sig) = signature {
            req = req.header("X-Line-Signature", sig.to_string());
        }
        req.send().await.expect("POST /callback")
    }

    async fn post_signed(&self, body: &Value) -> reqwest::Response {
        let raw = serde_json::to_vec(body).unwrap();
        self.post_callback(body, Some(&sign(&raw))).await
    }
}

/// Boot a mock upstream and a gateway wired to it. Deployment names select
/// mock behavior ("broken" => 500 from that service).
async fn start_harness(vision_dep: &str, image_gen_dep: &str) -> Harness {
    let mock = MockState::default();
    let upstream = start_mock_upstream(mock.clone()).await;

    let gw_port = free_port();
    let gw_url = format!("http://127.0.0.1:{}", gw_port);
    let media_dir =
        std::env::temp_dir().join(format!("kagami-callback-test-{}", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.gateway.port = gw_port;
    config.gateway.bind = "127.0.0.1".to_string();
    config.line.channel_secret = Some(CHANNEL_SECRET.to_string());
    config.line.channel_access_token = Some("test-access-token".to_string());
    config.line.api_base = Some(upstream.clone());
    config.line.data_api_base = Some(upstream.clone());
    config.vision.endpoint = Some(upstream.clone());
    config.vision.api_key = Some("vision-key".to_string());
    config.vision.deployment = Some(vision_dep.to_string());
    config.image_gen.endpoint = Some(upstream.clone());
    config.image_gen.api_key = Some("dalle-key".to_string());
    config.image_gen.deployment = Some(image_gen_dep.to_string());
    config.deploy.base_url = Some(gw_url.clone());
    config.deploy.media_dir = Some(media_dir.clone());
    config.deploy.fallback_image_url = Some(FALLBACK_IMAGE_URL.to_string());

    tokio::spawn(async move {
        let _ = gateway::run_gateway(config).await;
    });

    let client = reqwest::Client::new();
    let health = format!("{}/", gw_url);
    for _ in 0..100 {
        if let Ok(resp) = client.get(&health).send().await {
            if resp.status().is_success() {
                return Harness {
                    gw_url,
                    media_dir,
                    mock,
                    client,
                };
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("gateway did not become healthy at {}", health);
}

fn text_event(reply_token: &str, text: &str) -> Value {
    json!({
        "events": [{
            "type": "message",
            "replyToken": reply_token,
            "message": { "type": "text", "id": "m-text", "text": text }
        }]
    })
}

fn image_event(reply_token: &str, message_id: &str) -> Value {
    json!({
        "events": [{
            "type": "message",
            "replyToken": reply_token,
            "message": { "type": "image", "id": message_id }
        }]
    })
}

#[tokio::test]
async fn health_responds_with_running() {
    let h = start_harness("gpt4v", "dalle3").await;
    let resp = h
        .client
        .get(format!("{}/", h.gw_url))
        .send()
        .await
        .expect("GET /");
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.expect("health json");
    assert_eq!(body["runtime"], json!("running"));
}

#[tokio::test]
async fn rejects_missing_and_invalid_signature() {
    let h = start_harness("gpt4v", "dalle3").await;
    let body = text_event("tok-sig", "a cat");

    let resp = h.post_callback(&body, None).await;
    assert_eq!(resp.status().as_u16(), 400);

    let resp = h.post_callback(&body, Some("bm90IGEgcmVhbCBzaWduYXR1cmU=")).await;
    assert_eq!(resp.status().as_u16(), 400);

    // no downstream calls were made
    assert!(h.replies().is_empty());
}

#[tokio::test]
async fn acknowledges_unhandled_event_types() {
    let h = start_harness("gpt4v", "dalle3").await;
    let body = json!({
        "events": [{
            "type": "message",
            "replyToken": "tok-sticker",
            "message": { "type": "sticker", "id": "m-sticker" }
        }]
    });
    let resp = h.post_signed(&body).await;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
    assert!(h.replies().is_empty());
}

#[tokio::test]
async fn text_event_replies_with_one_generated_image() {
    let h = start_harness("gpt4v", "dalle3").await;
    let resp = h.post_signed(&text_event("tok-text", "a cat")).await;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");

    let replies = h.replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0]["replyToken"], json!("tok-text"));
    let messages = replies[0]["messages"].as_array().expect("messages");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["type"], json!("image"));
    assert_eq!(
        messages[0]["originalContentUrl"],
        json!("https://img.example.com/gen?prompt=a cat")
    );
    assert_eq!(
        messages[0]["previewImageUrl"],
        messages[0]["originalContentUrl"]
    );
}

#[tokio::test]
async fn text_event_falls_back_when_generation_fails() {
    let h = start_harness("gpt4v", "broken").await;
    let resp = h.post_signed(&text_event("tok-fb", "a cat")).await;
    assert_eq!(resp.status().as_u16(), 200);

    let replies = h.replies();
    assert_eq!(replies.len(), 1);
    let messages = replies[0]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["originalContentUrl"], json!(FALLBACK_IMAGE_URL));
}

#[tokio::test]
async fn image_event_replies_description_then_image() {
    let h = start_harness("gpt4v", "dalle3").await;
    let resp = h.post_signed(&image_event("tok-img", "msg-7")).await;
    assert_eq!(resp.status().as_u16(), 200);

    let replies = h.replies();
    assert_eq!(replies.len(), 1);
    let messages = replies[0]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["type"], json!("text"));
    assert_eq!(messages[0]["text"], json!("描述:image-bytes-msg-7"));
    assert_eq!(messages[1]["type"], json!("image"));
    assert_eq!(
        messages[1]["originalContentUrl"],
        json!("https://img.example.com/gen?prompt=描述:image-bytes-msg-7")
    );

    // staged image was garbage-collected after the request
    let leftover: Vec<_> = std::fs::read_dir(&h.media_dir)
        .map(|d| d.filter_map(|e| e.ok()).collect())
        .unwrap_or_default();
    assert!(leftover.is_empty(), "media dir not cleaned: {:?}", leftover);
}

#[tokio::test]
async fn vision_failure_uses_fallback_description_and_still_generates() {
    let h = start_harness("broken", "dalle3").await;
    let resp = h.post_signed(&image_event("tok-vf", "msg-9")).await;
    assert_eq!(resp.status().as_u16(), 200);

    let replies = h.replies();
    assert_eq!(replies.len(), 1);
    let messages = replies[0]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["text"], json!(FALLBACK_DESCRIPTION));
    // generation is still attempted, with the fallback string as the prompt
    assert_eq!(
        messages[1]["originalContentUrl"],
        json!(format!(
            "https://img.example.com/gen?prompt={}",
            FALLBACK_DESCRIPTION
        ))
    );
}

#[tokio::test]
async fn replayed_reply_token_surfaces_delivery_error() {
    let h = start_harness("gpt4v", "dalle3").await;
    let body = text_event("tok-replay", "a cat");

    let resp = h.post_signed(&body).await;
    assert_eq!(resp.status().as_u16(), 200);

    // identical redelivery: the platform rejects the token and the failure
    // surfaces instead of a silent second success
    let resp = h.post_signed(&body).await;
    assert_eq!(resp.status().as_u16(), 500);
    assert_eq!(h.replies().len(), 1);
}

#[tokio::test]
async fn concurrent_image_events_do_not_cross_talk() {
    let h = start_harness("gpt4v", "dalle3").await;
    let body_a = image_event("tok-a", "msg-a");
    let body_b = image_event("tok-b", "msg-b");
    let a = h.post_signed(&body_a);
    let b = h.post_signed(&body_b);
    let (ra, rb) = tokio::join!(a, b);
    assert_eq!(ra.status().as_u16(), 200);
    assert_eq!(rb.status().as_u16(), 200);

    let replies = h.replies();
    assert_eq!(replies.len(), 2);
    for reply in replies {
        let token = reply["replyToken"].as_str().unwrap();
        let text = reply["messages"][0]["text"].as_str().unwrap();
        match token {
            "tok-a" => assert_eq!(text, "描述:image-bytes-msg-a"),
            "tok-b" => assert_eq!(text, "描述:image-bytes-msg-b"),
            other => panic!("unexpected reply token {}", other),
        }
    }
}
