//! End-to-end provider tests against mocked HTTP endpoints.

use futures::StreamExt;
use martai::{
    is_error_fragment, ChatSession, Error, GenerationOptions, ProviderConfig, StreamingClient,
    Turn,
};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GEMINI_PATH: &str = "/v1beta/models/gemini-2.5-flash:streamGenerateContent";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Gemini frames SSE events with CRLF.
fn gemini_sse(chunks: &[serde_json::Value]) -> String {
    chunks
        .iter()
        .map(|chunk| format!("data: {chunk}\r\n\r\n"))
        .collect()
}

fn gemini_text(text: &str) -> serde_json::Value {
    json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})
}

fn gemini_client(server: &MockServer) -> StreamingClient {
    StreamingClient::from_config(&ProviderConfig::gemini("test-key").with_base_url(server.uri()))
        .expect("client should build without network access")
}

fn openai_client(server: &MockServer) -> StreamingClient {
    StreamingClient::from_config(&ProviderConfig::openai("test-key").with_base_url(server.uri()))
        .expect("client should build without network access")
}

#[tokio::test]
async fn test_gemini_streams_fragments_in_order() {
    init_tracing();
    let server = MockServer::start().await;

    let final_chunk = json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": " * FROM authors"}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 42, "candidatesTokenCount": 6, "totalTokenCount": 48}
    });

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .and(query_param("alt", "sse"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_json(json!({
            "contents": [{
                "role": "user",
                "parts": [{"text": "Eres un asistente SQL...\n\nUsuario: lista los autores\n\n"}]
            }],
            "generationConfig": {"temperature": 0.7, "maxOutputTokens": 200}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(gemini_sse(&[gemini_text("SELECT"), final_chunk]))
                .insert_header("content-type", "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let fragments: Vec<String> = gemini_client(&server)
        .generate(
            "Eres un asistente SQL...",
            &[Turn::user("lista los autores")],
            &GenerationOptions::new(0.7, 200),
        )
        .collect()
        .await;

    assert_eq!(fragments, vec!["SELECT", " * FROM authors"]);
}

#[tokio::test]
async fn test_gemini_rejected_key_becomes_error_fragment() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT"
            }
        })))
        .mount(&server)
        .await;

    let fragments: Vec<String> = gemini_client(&server)
        .generate("ctx", &[], &GenerationOptions::default())
        .collect()
        .await;

    assert_eq!(fragments.len(), 1);
    assert!(is_error_fragment(&fragments[0]));
    assert!(fragments[0].contains("API key not valid"));
}

#[tokio::test]
async fn test_gemini_error_inside_stream_ends_sequence() {
    init_tracing();
    let server = MockServer::start().await;

    let body = gemini_sse(&[
        gemini_text("SEL"),
        json!({"error": {"code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE"}}),
        gemini_text("never delivered"),
    ]);
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/event-stream"),
        )
        .mount(&server)
        .await;

    let fragments: Vec<String> = gemini_client(&server)
        .generate("ctx", &[Turn::user("q")], &GenerationOptions::default())
        .collect()
        .await;

    assert_eq!(fragments.len(), 2);
    assert_eq!(fragments[0], "SEL");
    assert!(fragments[1].starts_with("Error al generar respuesta: "));
    assert!(fragments[1].contains("The model is overloaded."));
}

#[tokio::test]
async fn test_gemini_forbidden_is_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let items: Vec<Result<String, Error>> = gemini_client(&server)
        .try_generate("ctx", &[], &GenerationOptions::default())
        .collect()
        .await;

    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], Err(Error::Auth(_))));
}

#[tokio::test]
async fn test_openai_compatible_streams_fragments() {
    init_tracing();
    let server = MockServer::start().await;

    let body = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"SELECT\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\" * FROM authors\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": "Eres un asistente SQL..."},
                {"role": "user", "content": "lista los autores"}
            ],
            "temperature": 0.5,
            "max_tokens": 150,
            "stream": true
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let fragments: Vec<String> = openai_client(&server)
        .generate(
            "Eres un asistente SQL...",
            &[Turn::user("lista los autores")],
            &GenerationOptions::new(0.5, 150),
        )
        .collect()
        .await;

    assert_eq!(fragments, vec!["SELECT", " * FROM authors"]);
}

#[tokio::test]
async fn test_openai_rate_limit_is_tagged() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "Rate limit reached", "type": "requests"}
        })))
        .mount(&server)
        .await;

    let client = openai_client(&server);
    let items: Vec<Result<String, Error>> = client
        .try_generate("ctx", &[], &GenerationOptions::default())
        .collect()
        .await;
    assert!(matches!(items.as_slice(), [Err(Error::RateLimit)]));

    let fragments: Vec<String> = client
        .generate("ctx", &[], &GenerationOptions::default())
        .collect()
        .await;
    assert_eq!(fragments, vec!["Error al generar respuesta: Rate limit exceeded"]);
}

#[tokio::test]
async fn test_gemini_safety_block_without_text_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(gemini_sse(&[json!({"candidates": [{"finishReason": "SAFETY"}]})]))
                .insert_header("content-type", "text/event-stream"),
        )
        .mount(&server)
        .await;

    let fragments: Vec<String> = gemini_client(&server)
        .generate("ctx", &[Turn::user("q")], &GenerationOptions::default())
        .collect()
        .await;

    assert_eq!(
        fragments,
        vec!["Error al generar respuesta: Provider error: Gemini - response blocked/truncated: content_filter"]
    );
}

#[tokio::test]
async fn test_gemini_token_limit_with_only_thoughts_is_reported() {
    let server = MockServer::start().await;

    let chunk = json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": "Pensando...", "thought": true}]},
            "finishReason": "MAX_TOKENS"
        }]
    });
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(gemini_sse(&[chunk]))
                .insert_header("content-type", "text/event-stream"),
        )
        .mount(&server)
        .await;

    let items: Vec<Result<String, Error>> = gemini_client(&server)
        .try_generate("ctx", &[Turn::user("q")], &GenerationOptions::new(0.7, 10))
        .collect()
        .await;

    assert_eq!(items.len(), 1);
    let err = items[0].as_ref().unwrap_err();
    assert!(err.to_string().contains("response blocked/truncated: length"));
}

#[tokio::test]
async fn test_openai_content_filter_without_text_is_reported() {
    let server = MockServer::start().await;

    let body = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"content_filter\"}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/event-stream"),
        )
        .mount(&server)
        .await;

    let fragments: Vec<String> = openai_client(&server)
        .generate("ctx", &[Turn::user("q")], &GenerationOptions::default())
        .collect()
        .await;

    assert_eq!(fragments.len(), 1);
    assert!(is_error_fragment(&fragments[0]));
    assert!(fragments[0].contains("OpenAI - response blocked/truncated: content_filter"));
}

#[tokio::test]
async fn test_unreachable_provider_becomes_error_fragment() {
    // Nothing listens on port 1.
    let config = ProviderConfig::gemini("test-key").with_base_url("http://127.0.0.1:1");
    let client = StreamingClient::from_config(&config).unwrap();

    let fragments: Vec<String> = client
        .generate("ctx", &[], &GenerationOptions::default())
        .collect()
        .await;

    assert_eq!(fragments.len(), 1);
    assert!(is_error_fragment(&fragments[0]));
}

#[tokio::test]
async fn test_session_round_trip_over_gemini() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(gemini_sse(&[
                    gemini_text("SELECT TOP 100 au_fname, au_lname"),
                    gemini_text(" FROM authors"),
                ]))
                .insert_header("content-type", "text/event-stream"),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = gemini_client(&server);
    let mut session = ChatSession::new();
    let options = GenerationOptions::default();

    let first = session
        .respond(Some(&client), "lista los autores", &options, |_| {})
        .await;
    assert_eq!(first, "SELECT TOP 100 au_fname, au_lname FROM authors");

    session
        .respond(Some(&client), "ordénalos por apellido", &options, |_| {})
        .await;

    let stats = session.stats();
    assert_eq!(stats.total_messages, 4);
    assert_eq!(stats.user_messages, 2);

    // The second call carried the whole transcript.
    let requests = server.received_requests().await.unwrap();
    let second: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    let prompt = second["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("Usuario: lista los autores\n\n"));
    assert!(prompt.contains("Asistente: SELECT TOP 100 au_fname, au_lname FROM authors\n\n"));
    assert!(prompt.ends_with("Usuario: ordénalos por apellido\n\n"));
}
