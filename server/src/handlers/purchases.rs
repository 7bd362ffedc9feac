use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::Caller;
use crate::services::PurchaseRequest;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    pub rating: i32,
}

pub async fn submit_purchase(
    State(state): State<AppState>,
    event_id: Result<Path<Uuid>, PathRejection>,
    caller: Caller,
    request: Result<Json<PurchaseRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Path(event_id) = event_id?;
    let Json(request) = request?;
    let purchase = state.purchases.submit(event_id, request, &caller).await?;
    Ok(created(purchase, "Purchase confirmed"))
}

pub async fn get_purchase(
    State(state): State<AppState>,
    purchase_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Response, AppError> {
    let Path(purchase_id) = purchase_id?;
    let details = state.purchases.get_purchase(purchase_id).await?;
    Ok(success(details, "Purchase retrieved"))
}

pub async fn my_purchases(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Response, AppError> {
    let purchases = state.purchases.purchases_for_caller(&caller).await?;
    Ok(success(purchases, "Purchases retrieved"))
}

pub async fn list_purchases(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Response, AppError> {
    let purchases = state.purchases.list_purchases(&caller).await?;
    Ok(success(purchases, "Purchases retrieved"))
}

pub async fn rate_purchase(
    State(state): State<AppState>,
    purchase_id: Result<Path<Uuid>, PathRejection>,
    caller: Caller,
    request: Result<Json<RatingRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Path(purchase_id) = purchase_id?;
    let Json(request) = request?;
    let purchase = state
        .ratings
        .rate(purchase_id, request.rating, &caller)
        .await?;
    Ok(success(purchase, "Rating saved"))
}
