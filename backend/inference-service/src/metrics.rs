//! Prometheus metrics for the prediction pipeline and the HTTP surface.

use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpResponse, Responder,
};
use futures::future::{ready, Ready};
use prometheus::{
    Encoder, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::time::{Duration, Instant};

lazy_static::lazy_static! {
    pub static ref INFERENCE_DURATION_SECONDS: Histogram = prometheus::register_histogram!(
        "inference_duration_seconds",
        "Time needed to classify one frame with the whole ensemble",
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    ).unwrap();

    pub static ref PREDICTIONS_TOTAL: IntCounterVec = prometheus::register_int_counter_vec!(
        "predictions_total",
        "Prediction passes by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref FRAMES_RECEIVED_TOTAL: IntCounter = prometheus::register_int_counter!(
        "frames_received_total",
        "Frames accepted into the image queue"
    ).unwrap();

    pub static ref FRAMES_DROPPED_TOTAL: IntCounter = prometheus::register_int_counter!(
        "frames_dropped_total",
        "Frames evicted from a full image queue"
    ).unwrap();

    pub static ref IMAGE_QUEUE_SIZE: IntGauge = prometheus::register_int_gauge!(
        "image_queue_size",
        "Frames currently buffered"
    ).unwrap();

    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = prometheus::register_int_counter_vec!(
        "http_requests_total",
        "Total HTTP requests",
        &["method", "path", "status"]
    ).unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = prometheus::register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latency",
        &["method", "path", "status"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();
}

/// Prediction outcome label values
pub mod outcome {
    pub const NEGATIVE: &str = "negative";
    pub const DETECTED: &str = "detected";
    pub const ERROR: &str = "error";
}

pub fn observe_inference(elapsed: Duration) {
    INFERENCE_DURATION_SECONDS.observe(elapsed.as_secs_f64());
}

pub fn record_prediction(outcome: &str) {
    PREDICTIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_frame(dropped: bool, queue_len: usize) {
    FRAMES_RECEIVED_TOTAL.inc();
    if dropped {
        FRAMES_DROPPED_TOTAL.inc();
    }
    IMAGE_QUEUE_SIZE.set(queue_len as i64);
}

/// Handler that serialises Prometheus metrics in text format.
pub async fn serve_metrics() -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => HttpResponse::Ok()
            .content_type(encoder.format_type())
            .body(buffer),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

/// Prometheus Metrics Middleware
pub struct MetricsMiddleware;

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = MetricsMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    actix_web::dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let start = Instant::now();
        let method = req.method().to_string();
        // Route pattern keeps label cardinality bounded for /swagger/{file}
        let path = req
            .match_pattern()
            .unwrap_or_else(|| req.path().to_string());

        Box::pin(async move {
            let res = service.call(req).await?;
            let status = res.status().as_u16().to_string();
            let duration = start.elapsed().as_secs_f64();

            HTTP_REQUESTS_TOTAL
                .with_label_values(&[&method, &path, &status])
                .inc();

            HTTP_REQUEST_DURATION_SECONDS
                .with_label_values(&[&method, &path, &status])
                .observe(duration);

            Ok(res)
        })
    }
}
