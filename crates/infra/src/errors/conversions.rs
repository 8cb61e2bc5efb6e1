//! Conversions from transport errors into [`ApiError`].

use std::time::Duration;

use reqwest::Error as HttpError;

use crate::api::ApiError;

/// Classify a `reqwest` failure.
///
/// `timeout` is the budget the request ran under; reqwest does not report
/// it back.
pub fn classify_transport_error(err: &HttpError, timeout: Duration) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout(timeout);
    }
    if err.is_builder() {
        return ApiError::Config(format!("invalid http request: {err}"));
    }
    if err.is_decode() {
        return ApiError::Decode(err.to_string());
    }
    if err.is_connect() {
        return ApiError::Network(format!("http connection failed: {err}"));
    }
    if err.is_body() {
        return ApiError::Network(format!("http body transfer failed: {err}"));
    }
    if err.is_request() {
        return ApiError::Network(format!("http request failed: {err}"));
    }
    if let Some(status) = err.status() {
        return ApiError::from_status(status, err.url().map(|u| u.as_str()).unwrap_or(""), "");
    }
    ApiError::Network(format!("http error: {err}"))
}

/// Classify a JSON body that did not match the expected shape.
pub fn classify_decode_error(err: &serde_json::Error, url: &str) -> ApiError {
    ApiError::Decode(format!("{url}: {err}"))
}
