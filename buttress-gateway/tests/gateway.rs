//! Gateway transport tests against a local mock server.

use buttress_core::{ClientConfig, Method, ServiceClient, ServiceRequest, Transport, TransportError};
use buttress_gateway::{GatewayConfig, GatewayTransport};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport_for(server: &MockServer) -> GatewayTransport {
    GatewayTransport::new(GatewayConfig::new(server.uri(), "crm", "secret-token")).unwrap()
}

#[tokio::test]
async fn test_request_shape_and_identity_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gateway/listings/api/v1/listings"))
        .and(query_param("city", "dubai"))
        .and(header("X-Service-Name", "crm"))
        .and(header("X-Service-Token", "secret-token"))
        .and(header_exists("X-Request-ID"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"total": 3})))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let request = ServiceRequest::new("listings", Method::GET, "/api/v1/listings")
        .query("city", "dubai");

    let response = transport.execute(&request).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["total"], 3);
}

#[tokio::test]
async fn test_json_body_gets_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gateway/listings/api/v1/listings"))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({"city": "dubai"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let request = ServiceRequest::new("listings", Method::POST, "/api/v1/listings")
        .json(&serde_json::json!({"city": "dubai"}))
        .unwrap();

    let response = transport.execute(&request).await.unwrap();
    assert_eq!(response.status().as_u16(), 201);
}

#[tokio::test]
async fn test_request_ids_are_unique_per_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gateway/users/whoami"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let request = ServiceRequest::new("users", Method::GET, "/whoami");
    transport.execute(&request).await.unwrap();
    transport.execute(&request).await.unwrap();

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);
    let ids: Vec<&str> = received
        .iter()
        .map(|r| r.headers.get("X-Request-ID").unwrap().to_str().unwrap())
        .collect();
    assert_ne!(ids[0], ids[1]);
}

#[tokio::test]
async fn test_connection_refused_maps_to_connection_error() {
    // Nothing listens on port 9 locally.
    let transport = GatewayTransport::new(
        GatewayConfig::new("http://127.0.0.1:9", "crm", "secret-token")
            .connect_timeout(Duration::from_millis(500)),
    )
    .unwrap();

    let request = ServiceRequest::new("listings", Method::GET, "/api/v1/listings");
    let error = transport.execute(&request).await.unwrap_err();
    assert!(matches!(
        error,
        TransportError::Connection(_) | TransportError::Timeout(_)
    ));
}

#[tokio::test]
async fn test_slow_gateway_maps_to_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gateway/listings/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let transport = GatewayTransport::new(
        GatewayConfig::new(server.uri(), "crm", "secret-token")
            .timeout(Duration::from_millis(100)),
    )
    .unwrap();

    let request = ServiceRequest::new("listings", Method::GET, "/slow");
    let error = transport.execute(&request).await.unwrap_err();
    assert!(error.is_timeout());
}

#[tokio::test]
async fn test_orchestrated_call_retries_through_the_gateway() {
    let server = MockServer::start().await;
    // Two 503s, then steady 200s.
    Mock::given(method("GET"))
        .and(path("/gateway/listings/api/v1/listings"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gateway/listings/api/v1/listings"))
        .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
        .mount(&server)
        .await;

    let transport = Arc::new(transport_for(&server));
    let config = ClientConfig::builder()
        .max_attempts(3)
        .base_delay(Duration::from_millis(10))
        .build();
    let client = ServiceClient::new(config, transport);

    let response = client
        .get("listings", "/api/v1/listings")
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().unwrap(), "recovered");

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 3);
}
