use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use cafeops_infra::fulfillment::BatchError;
use cafeops_infra::store::StoreError;

pub fn batch_error_to_response(err: BatchError) -> axum::response::Response {
    match err {
        BatchError::Storage(e) => store_error_to_response(e),
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    tracing::error!(error = %err, "storage failure");
    match err {
        StoreError::Unavailable(msg) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable", msg)
        }
        StoreError::Query(msg) | StoreError::Constraint(msg) | StoreError::Decode(msg) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "storage_error", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
