use axum::response::Response;
use serde::Serialize;

use crate::utils::response::success;

pub mod caller;
pub mod events;
pub mod purchases;
pub mod search;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "ticketing-api",
    };

    success(payload, "Health check successful")
}
