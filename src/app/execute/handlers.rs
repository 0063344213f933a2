use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::app::AppState;
use crate::error::ControlError;
use crate::remote::{DeliveryRequest, ExecutionResult};

use super::models::*;

// ============================================================================
// API Handlers
// ============================================================================

/// POST /execute - run a named command on a host
pub async fn execute_command(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ExecuteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ExecutionResult>), (StatusCode, Json<serde_json::Value>)> {
    let missing = || ControlError::Validation("Missing 'host' or 'command' in request body".to_string());

    let Ok(Json(req)) = body else {
        return Err(missing().into());
    };
    if req.validate().is_err() {
        return Err(missing().into());
    }
    let (Some(host), Some(command_name)) = (req.host, req.command) else {
        return Err(missing().into());
    };

    let command = command_name
        .parse::<NamedCommand>()
        .map_err(ControlError::Validation)?;

    tracing::info!(host = %host, command = command.as_str(), "executing named command");

    let result = state
        .delivery
        .deliver(&host, DeliveryRequest::command(command.shell_command()))
        .await;

    // Only a delivery failure is a server error; a non-zero exit is reported as-is.
    if result.is_failure() {
        return Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(result)));
    }
    Ok((StatusCode::OK, Json(result)))
}

/// GET /commands - list named commands
pub async fn list_commands() -> Json<CommandsResponse> {
    let available_commands = NamedCommand::catalog()
        .into_iter()
        .map(|(name, shell)| (name.to_string(), shell.to_string()))
        .collect();
    Json(CommandsResponse { available_commands })
}
