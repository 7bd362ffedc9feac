use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use crate::models::{Caller, EventInput};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

pub async fn list_categories(State(state): State<AppState>) -> Result<Response, AppError> {
    let categories = state.catalog.list_categories().await?;
    Ok(success(categories, "Categories retrieved"))
}

pub async fn list_events(State(state): State<AppState>) -> Result<Response, AppError> {
    let events = state.catalog.list_events().await?;
    Ok(success(events, "Events retrieved"))
}

pub async fn get_event(
    State(state): State<AppState>,
    event_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Response, AppError> {
    let Path(event_id) = event_id?;
    let event = state.catalog.get_event(event_id).await?;
    Ok(success(event, "Event retrieved"))
}

pub async fn create_event(
    State(state): State<AppState>,
    caller: Caller,
    input: Result<Json<EventInput>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(input) = input?;
    let event = state.catalog.create_event(input, &caller).await?;
    Ok(created(event, "Event created"))
}

pub async fn update_event(
    State(state): State<AppState>,
    event_id: Result<Path<Uuid>, PathRejection>,
    caller: Caller,
    input: Result<Json<EventInput>, JsonRejection>,
) -> Result<Response, AppError> {
    let Path(event_id) = event_id?;
    let Json(input) = input?;
    let event = state.catalog.update_event(event_id, input, &caller).await?;
    Ok(success(event, "Event updated"))
}

pub async fn delete_event(
    State(state): State<AppState>,
    event_id: Result<Path<Uuid>, PathRejection>,
    caller: Caller,
) -> Result<Response, AppError> {
    let Path(event_id) = event_id?;
    state.catalog.delete_event(event_id, &caller).await?;
    Ok(empty_success("Event deleted"))
}
