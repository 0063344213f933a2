use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::app::AppState;
use crate::error::ControlError;
use crate::registry::{self, DeviceRecord};
use crate::remote::DeliveryRequest;

use super::models::*;

// ============================================================================
// API Handlers
// ============================================================================

/// GET /heaters - registry contents
pub async fn list_heaters(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DeviceRecord>>, (StatusCode, Json<serde_json::Value>)> {
    let records = registry::load(&state.config.registry_path).await.map_err(|e| {
        tracing::error!(error = %e, "failed to load heater registry");
        ControlError::from(e)
    })?;
    Ok(Json(records))
}

/// POST /set_heater - apply a power-mode configuration to one heater
pub async fn set_heater(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SetHeaterRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, (StatusCode, Json<serde_json::Value>)> {
    let missing =
        || ControlError::Validation("Missing 'heaterName' or 'action' in request body".to_string());

    let Ok(Json(req)) = body else {
        return Err(missing().into());
    };
    if req.validate().is_err() {
        return Err(missing().into());
    }
    let (Some(heater_name), Some(action)) = (req.heater_name, req.action) else {
        return Err(missing().into());
    };

    // Reject unknown actions before touching the registry or filesystem.
    let action = action.parse::<PowerAction>().map_err(ControlError::Validation)?;

    let records = registry::load(&state.config.registry_path).await.map_err(|e| {
        tracing::error!(error = %e, "failed to load heater registry");
        ControlError::from(e)
    })?;
    let heater = registry::find(&records, &heater_name).map_err(ControlError::from)?;

    let device_class = heater.device_class();
    let template = state.config.template_path(device_class, action.as_str());
    let remote_path = state.config.remote_config_path_for(device_class);
    let target = heater.remote_address(&state.config.ssh.hostname_suffix);

    let rendered = state
        .renderer
        .render(&template, heater.identifier())
        .await
        .map_err(|e| {
            tracing::error!(heater = %heater_name, error = %e, "failed to render configuration");
            ControlError::from(e)
        })?;

    let result = state
        .delivery
        .deliver(&target, DeliveryRequest::upload(rendered.path(), remote_path))
        .await;
    if let Err(e) = rendered.close() {
        tracing::warn!(heater = %heater_name, error = %e, "failed to remove rendered configuration");
    }

    if let Some(err) = result.error.filter(|e| !e.is_empty()) {
        tracing::error!(heater = %heater_name, host = %target, error = %err, "configuration transfer failed");
        return Err(ControlError::Remote(format!(
            "Failed to update heater configuration: {err}"
        ))
        .into());
    }

    tracing::info!(
        heater = %heater_name,
        host = %target,
        action = action.as_str(),
        class = device_class,
        "heater configuration applied"
    );

    Ok(Json(MessageResponse {
        message: format!(
            "Heater '{}' configuration updated to '{}' mode for type '{}'",
            heater_name,
            action.as_str(),
            device_class
        ),
    }))
}
