use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use validator::Validate;

/// Power tier; selects which template variant is applied.
#[derive(ToSchema, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PowerAction {
    Low,
    Medium,
    High,
}

impl PowerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerAction::Low => "low",
            PowerAction::Medium => "medium",
            PowerAction::High => "high",
        }
    }
}

impl FromStr for PowerAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(PowerAction::Low),
            "medium" => Ok(PowerAction::Medium),
            "high" => Ok(PowerAction::High),
            _ => Err("Invalid action. Valid actions are 'low', 'medium', 'high'".to_string()),
        }
    }
}

#[derive(ToSchema, Deserialize, Serialize, Validate, Clone, Debug)]
pub struct SetHeaterRequest {
    #[serde(rename = "heaterName")]
    #[schema(example = "office-1")]
    #[validate(required, length(min = 1, max = 255))]
    pub heater_name: Option<String>,

    #[schema(example = "medium")]
    #[validate(required, length(min = 1))]
    pub action: Option<String>,
}

#[derive(ToSchema, Serialize, Clone, Debug)]
pub struct MessageResponse {
    pub message: String,
}
