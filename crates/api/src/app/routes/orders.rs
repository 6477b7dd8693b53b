use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use cafeops_core::OrderId;

use crate::app::dto;
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/batch-process", post(batch_process))
        .route("/:id", get(get_order))
}

pub async fn batch_process(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::BatchProcessRequest>, JsonRejection>,
) -> axum::response::Response {
    // Bodies serde cannot read (fractional or missing quantity, wrong types)
    // share the JSON error shape instead of axum's plain-text rejection.
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "batch_input_invalid",
                rejection.body_text(),
            );
        }
    };

    match services.process_batch(body.orders).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::batch_error_to_response(e),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id"),
    };

    match services.order_receipt(id).await {
        Ok(Some(receipt)) => {
            (StatusCode::OK, Json(dto::OrderReceiptResponse::from(receipt))).into_response()
        }
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}
