//! End-to-end invocation tests against a local mock agent endpoint.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{json, Value};
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, Request, ResponseTemplate,
};

use tessera_contracts::{
    agent::{Agent, AuthConfig, PayloadConvention},
    error::TesseraError,
    invoke::InvocationRequest,
};
use tessera_core::StaticSecretResolver;
use tessera_invoke::{
    auth::{sign_hmac, AgentTokenClaims},
    AgentClient, ClientConfig,
};

const HMAC_SECRET: &str = "pre-shared-key";
const SERVICE_SECRET: &str = "service-signing-key";

fn client(config: ClientConfig) -> AgentClient {
    let secrets = StaticSecretResolver::new()
        .with_secret("agent/echo/hmac", HMAC_SECRET)
        .with_secret("AGENT_JWT_SECRET", SERVICE_SECRET);
    AgentClient::http(config, Arc::new(secrets)).unwrap()
}

fn fast_config() -> ClientConfig {
    ClientConfig {
        retry_delay_ms: 5,
        ..ClientConfig::default()
    }
}

fn agent(server: &MockServer) -> Agent {
    Agent::new("echo", "Echo", "owner-1", format!("{}/agent", server.uri()))
}

async fn received(server: &MockServer) -> Vec<Request> {
    server.received_requests().await.unwrap_or_default()
}

fn header_value<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request.headers.get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn hmac_signature_covers_exact_bytes_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/agent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "ok" })))
        .mount(&server)
        .await;

    let mut agent = agent(&server);
    agent.auth = AuthConfig::Hmac {
        secret_ref: "agent/echo/hmac".to_string(),
    };
    let client = client(fast_config());

    client
        .invoke(&agent, InvocationRequest::new(json!({ "b": 2, "a": "x" }), "k-1"))
        .await
        .unwrap();
    client
        .invoke(&agent, InvocationRequest::new(json!({ "b": 3, "a": "x" }), "k-2"))
        .await
        .unwrap();

    let requests = received(&server).await;
    assert_eq!(requests.len(), 2);

    for request in &requests {
        let signature = header_value(request, "x-hmac-signature").unwrap();
        let expected = sign_hmac(HMAC_SECRET.as_bytes(), &request.body).unwrap();
        assert_eq!(signature, expected);
    }
    assert_eq!(requests[0].body, br#"{"a":"x","b":2}"#.to_vec());
    assert_ne!(
        header_value(&requests[0], "x-hmac-signature"),
        header_value(&requests[1], "x-hmac-signature"),
        "changing a payload field must change the signature"
    );
}

#[tokio::test]
async fn bearer_token_is_minted_for_the_agent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/agent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let mut agent = agent(&server);
    agent.auth = AuthConfig::Bearer;
    client(fast_config())
        .invoke(&agent, InvocationRequest::new(json!({}), "k-1"))
        .await
        .unwrap();

    let requests = received(&server).await;
    let token = header_value(&requests[0], "authorization")
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap();
    let data = decode::<AgentTokenClaims>(
        token,
        &DecodingKey::from_secret(SERVICE_SECRET.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .unwrap();
    assert_eq!(data.claims.sub, "echo");
    assert_eq!(data.claims.exp - data.claims.iat, 3600);
}

#[tokio::test]
async fn generic_agent_receives_payload_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/agent"))
        .and(header("x-idempotency-key", "k-1"))
        .and(header("x-agent-id", "echo"))
        .and(header("content-type", "application/json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "result": "ok" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let payload = json!({ "text": "hello", "items": [1, 2, 3] });
    let invocation = client(fast_config())
        .invoke(&agent(&server), InvocationRequest::new(payload.clone(), "k-1"))
        .await
        .unwrap();

    assert_eq!(invocation.response, json!({ "result": "ok" }));
    let requests = received(&server).await;
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent, payload);
}

#[tokio::test]
async fn legacy_webhook_agent_receives_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/agent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": "kept" })))
        .mount(&server)
        .await;

    let mut agent = agent(&server);
    let mut static_fields = serde_json::Map::new();
    static_fields.insert("workflow".to_string(), json!("wf-7"));
    agent.convention = PayloadConvention::LegacyWebhook { static_fields };

    let payload = json!({ "text": "hello" });
    let invocation = client(fast_config())
        .invoke(&agent, InvocationRequest::new(payload.clone(), "k-1").with_trace_id("t-1"))
        .await
        .unwrap();

    // Legacy responses are never unwrapped.
    assert_eq!(invocation.response, json!({ "data": "kept" }));

    let requests = received(&server).await;
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let keys: Vec<&String> = sent.as_object().unwrap().keys().collect();
    assert!(keys.contains(&&"body".to_string()));
    assert!(keys.contains(&&"headers".to_string()));
    assert!(keys.contains(&&"query".to_string()));
    assert_eq!(sent["body"], payload);
    assert_eq!(sent["workflow"], "wf-7");
    assert_eq!(sent["headers"]["x-trace-id"], "t-1");
}

#[tokio::test]
async fn failing_endpoint_is_attempted_exactly_three_times() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/agent"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(3)
        .mount(&server)
        .await;

    let agent = agent(&server);
    let client = client(fast_config());
    let err = client
        .invoke(&agent, InvocationRequest::new(json!({}), "k-1"))
        .await
        .unwrap_err();

    match &err {
        TesseraError::RetryExhausted { attempts, last } => {
            assert_eq!(*attempts, 3);
            assert_eq!(
                **last,
                TesseraError::Http {
                    status: 500,
                    body: "boom".to_string()
                }
            );
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
    assert!(!err.is_rate_limited());
    assert_eq!(received(&server).await.len(), 3);
    assert_eq!(client.metrics(&agent.id).unwrap().success_rate, 0.0);
}

#[tokio::test]
async fn rate_limited_call_is_retried_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/agent"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/agent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "ok" })))
        .with_priority(2)
        .mount(&server)
        .await;

    let invocation = client(fast_config())
        .invoke(&agent(&server), InvocationRequest::new(json!({}), "k-1"))
        .await
        .unwrap();

    assert_eq!(invocation.attempts, 2);
    assert_eq!(invocation.metrics.success_rate, 1.0);
    assert_eq!(received(&server).await.len(), 2);
}

#[tokio::test]
async fn persistent_rate_limit_stays_classified_as_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/agent"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(fast_config())
        .invoke(&agent(&server), InvocationRequest::new(json!({}), "k-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, TesseraError::RetryExhausted { attempts: 3, .. }));
    assert!(err.is_rate_limited());
}

#[tokio::test]
async fn slow_agent_times_out_every_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/agent"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let config = ClientConfig {
        timeout_ms: 50,
        ..fast_config()
    };
    let err = client(config)
        .invoke(&agent(&server), InvocationRequest::new(json!({}), "k-1"))
        .await
        .unwrap_err();

    match err {
        TesseraError::RetryExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert_eq!(*last, TesseraError::Timeout { elapsed_ms: 50 });
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_calls_to_one_agent_keep_exact_counts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/agent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "ok" })))
        .mount(&server)
        .await;

    let client = Arc::new(client(fast_config()));
    let agent = agent(&server);

    let calls = (0..20).map(|i| {
        let client = client.clone();
        let agent = agent.clone();
        tokio::spawn(async move {
            client
                .invoke(&agent, InvocationRequest::new(json!({ "i": i }), format!("k-{i}")))
                .await
        })
    });
    for call in calls.collect::<Vec<_>>() {
        call.await.unwrap().unwrap();
    }

    let metrics = client.metrics(&agent.id).unwrap();
    assert_eq!(metrics.call_volume, 20);
    assert_eq!(metrics.success_count, 20);
    assert_eq!(metrics.success_rate, 1.0);
}
