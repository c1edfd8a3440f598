use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

pub static HTTP_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "docfilter_http_requests_total",
        "Requests by route and status",
        &["route", "status"]
    )
    .unwrap()
});

pub static HTTP_REQUEST_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "docfilter_http_request_seconds",
        "Request latency by route",
        &["route"],
        vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap()
});

pub static FIELD_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "docfilter_field_errors_total",
        "Rejected form inputs by filter set and key",
        &["set", "key"]
    )
    .unwrap()
});
