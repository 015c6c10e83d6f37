use actix_web::{http::StatusCode, test, web, App};
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use inference_service::config::InferenceConfig;
use inference_service::models::{FrameAcceptedResponse, InternalStateDto, PredictionRecord};
use inference_service::services::{
    ClassifierError, FrameClassifier, InferenceState, PredictionHistory,
};
use inference_service::swagger::SwaggerResources;
use inference_service::{configure_api, configure_docs, openapi};

struct StubClassifier {
    ids: Vec<String>,
}

impl FrameClassifier for StubClassifier {
    fn model_ids(&self) -> &[String] {
        &self.ids
    }

    fn classify(&self, _frame: &[u8]) -> Result<f32, ClassifierError> {
        Ok(0.1)
    }
}

fn build_state(model_ids: &[&str]) -> Arc<InferenceState> {
    let config = InferenceConfig {
        prediction_interval_ms: 500,
        image_queue_min_len: 4,
        ..InferenceConfig::default()
    };
    let classifier = StubClassifier {
        ids: model_ids.iter().map(|s| s.to_string()).collect(),
    };
    Arc::new(InferenceState::new(&config, Arc::new(classifier)))
}

macro_rules! api_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .app_data(web::PayloadConfig::new(1024))
                .configure(configure_api),
        )
        .await
    };
}

#[actix_rt::test]
async fn state_endpoint_uses_external_field_names() {
    let state = build_state(&["cnn-a", "cnn-b"]);
    state.push_frame(Bytes::from_static(b"jpeg")).unwrap();
    let app = api_app!(state);

    let req = test::TestRequest::get().uri("/api/v1/state").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        serde_json::json!({
            "predictionIntervalMs": 500,
            "modelIds": "cnn-a,cnn-b",
            "imageQueueSize": 1,
            "inferenceDurationStats": []
        })
    );
}

#[actix_rt::test]
async fn prediction_interval_can_be_changed() {
    let state = build_state(&["cnn-a"]);
    let app = api_app!(Arc::clone(&state));

    let req = test::TestRequest::put()
        .uri("/api/v1/state/prediction-interval")
        .set_json(serde_json::json!({ "predictionIntervalMs": 1500 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let dto: InternalStateDto = test::read_body_json(resp).await;
    assert_eq!(dto.prediction_interval_ms, 1500);
    assert_eq!(state.prediction_interval_ms(), 1500);
}

#[actix_rt::test]
async fn non_positive_interval_is_rejected() {
    let state = build_state(&["cnn-a"]);
    let app = api_app!(Arc::clone(&state));

    let req = test::TestRequest::put()
        .uri("/api/v1/state/prediction-interval")
        .set_json(serde_json::json!({ "predictionIntervalMs": 0 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 400);
    assert_eq!(state.prediction_interval_ms(), 500);
}

#[actix_rt::test]
async fn malformed_interval_body_gets_error_response() {
    let state = build_state(&["cnn-a"]);
    let app = api_app!(Arc::clone(&state));

    let req = test::TestRequest::put()
        .uri("/api/v1/state/prediction-interval")
        .insert_header(("content-type", "application/json"))
        .set_payload(r#"{"predictionIntervalMs":"abc"}"#)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 400);
    assert!(body["error"].as_str().unwrap().starts_with("Validation error"));
    assert_eq!(state.prediction_interval_ms(), 500);
}

#[actix_rt::test]
async fn frames_are_queued_and_evicted_when_full() {
    let state = build_state(&["cnn-a"]);
    let app = api_app!(Arc::clone(&state));

    // capacity is 2 * min_len = 8
    for expected in 1..=8u32 {
        let req = test::TestRequest::post()
            .uri("/api/v1/frames")
            .insert_header(("content-type", "image/jpeg"))
            .set_payload(vec![expected as u8; 16])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let accepted: FrameAcceptedResponse = test::read_body_json(resp).await;
        assert_eq!(accepted.image_queue_size, expected);
        assert!(!accepted.dropped);
    }

    let req = test::TestRequest::post()
        .uri("/api/v1/frames")
        .set_payload(vec![9u8; 16])
        .to_request();
    let accepted: FrameAcceptedResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(accepted.image_queue_size, 8);
    assert!(accepted.dropped);
}

#[actix_rt::test]
async fn empty_and_oversized_frames_are_rejected() {
    let state = build_state(&["cnn-a"]);
    let app = api_app!(Arc::clone(&state));

    let req = test::TestRequest::post().uri("/api/v1/frames").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/v1/frames")
        .set_payload(vec![0u8; 4096])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

    assert_eq!(state.queue().len(), 0);
}

#[actix_rt::test]
async fn latest_prediction_is_not_found_before_first_pass() {
    let app = api_app!(build_state(&["cnn-a"]));

    let req = test::TestRequest::get()
        .uri("/api/v1/predictions/latest")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn prediction_history_is_listed_newest_first() {
    let history = PredictionHistory::connect("sqlite::memory:").await.unwrap();
    history.prepare(Duration::from_secs(3600)).await.unwrap();
    let now = Utc::now();
    for i in 0..3 {
        history
            .insert(&PredictionRecord {
                timestamp: now + chrono::Duration::seconds(i),
                prediction: 0.1 * (i + 1) as f32,
                elapsed_time_ms: 20.5,
                model_ids: "cnn-a".to_string(),
            })
            .await
            .unwrap();
    }
    let state = Arc::new(
        InferenceState::new(
            &InferenceConfig::default(),
            Arc::new(StubClassifier {
                ids: vec!["cnn-a".to_string()],
            }),
        )
        .with_history(history),
    );
    let app = api_app!(state);

    let req = test::TestRequest::get()
        .uri("/api/v1/predictions?limit=2")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let records: Vec<PredictionRecord> = test::read_body_json(resp).await;
    assert_eq!(records.len(), 2);
    assert!((records[0].prediction - 0.3).abs() < 1e-5);
    assert!((records[1].prediction - 0.2).abs() < 1e-5);

    let req = test::TestRequest::get().uri("/api/v1/predictions").to_request();
    let records: Vec<PredictionRecord> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(records.len(), 3);

    for uri in ["/api/v1/predictions?limit=0", "/api/v1/predictions?limit=abc"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], 400);
    }
}

#[actix_rt::test]
async fn prediction_history_unavailable_without_database() {
    let app = api_app!(build_state(&["cnn-a"]));
    let req = test::TestRequest::get().uri("/api/v1/predictions").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[actix_rt::test]
async fn readiness_requires_a_model() {
    let app = api_app!(build_state(&["cnn-a"]));
    let req = test::TestRequest::get().uri("/api/v1/health/ready").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let app = api_app!(build_state(&[]));
    let req = test::TestRequest::get().uri("/api/v1/health/ready").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );

    let req = test::TestRequest::get().uri("/api/v1/health/live").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn metrics_are_exposed() {
    let state = build_state(&["cnn-a"]);
    state.push_frame(Bytes::from_static(b"frame")).unwrap();
    let app = api_app!(state);

    let req = test::TestRequest::get().uri("/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("frames_received_total"));
}

#[actix_rt::test]
async fn disk_swagger_bundle_and_document_are_served() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<html>ui</html>").unwrap();
    std::fs::write(dir.path().join("swagger-ui.css"), "body {}").unwrap();
    let resources = SwaggerResources::load(dir.path()).unwrap();

    let app = test::init_service(App::new().configure(configure_docs(
        openapi::doc("http://camera-box:4386"),
        Some(resources),
    )))
    .await;

    let req = test::TestRequest::get().uri("/swagger/ui").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(&test::read_body(resp).await[..], b"<html>ui</html>");

    let req = test::TestRequest::get()
        .uri("/swagger/swagger-ui.css")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/css; charset=utf-8"
    );

    let req = test::TestRequest::get().uri("/swagger/missing.js").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );

    let req = test::TestRequest::get()
        .uri("/api-docs/oas-3.0.0.json")
        .to_request();
    let doc: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(doc["info"]["title"], "User entity service");
    assert_eq!(doc["info"]["version"], "1.0");
    assert_eq!(doc["servers"][0]["url"], "http://camera-box:4386");
    assert_eq!(
        doc["servers"][0]["description"],
        "server on http://camera-box:4386"
    );
}

#[actix_rt::test]
async fn bundled_swagger_ui_serves_document() {
    let app = test::init_service(
        App::new().configure(configure_docs(openapi::doc("http://localhost:4386"), None)),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api-docs/oas-3.0.0.json")
        .to_request();
    let doc: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        doc["info"]["license"]["name"],
        "Apache License, Version 2.0"
    );
}
