//! Flow-control endpoints. Every call answers with the current signal.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use super::super::AppState;
use super::helpers::{run_blocking, ApiError};
use crate::models::ControlSignal;

fn signal_body(signal: ControlSignal) -> Json<Value> {
    Json(json!({ "signal": signal }))
}

pub async fn get_control(State(state): State<AppState>) -> Json<Value> {
    signal_body(state.governor.current_signal())
}

pub async fn pause(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let signal = run_blocking(&state, |gov| gov.pause().map(|_| gov.current_signal())).await?;
    Ok(signal_body(signal))
}

pub async fn resume(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let signal = run_blocking(&state, |gov| gov.resume().map(|_| gov.current_signal())).await?;
    Ok(signal_body(signal))
}

pub async fn immediate(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let signal = run_blocking(&state, |gov| {
        gov.trigger_immediate().map(|_| gov.current_signal())
    })
    .await?;
    Ok(signal_body(signal))
}
