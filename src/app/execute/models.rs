use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use utoipa::ToSchema;
use validator::Validate;

// ============================================================================
// Named Commands
// ============================================================================

/// The only commands the HTTP surface may run on a heater.
#[derive(ToSchema, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NamedCommand {
    Start,
    Stop,
}

impl NamedCommand {
    pub const ALL: [NamedCommand; 2] = [NamedCommand::Start, NamedCommand::Stop];

    pub fn as_str(&self) -> &'static str {
        match self {
            NamedCommand::Start => "start",
            NamedCommand::Stop => "stop",
        }
    }

    pub fn shell_command(&self) -> &'static str {
        match self {
            NamedCommand::Start => "/etc/init.d/bosminer start",
            NamedCommand::Stop => "/etc/init.d/bosminer stop",
        }
    }

    pub fn catalog() -> BTreeMap<&'static str, &'static str> {
        Self::ALL.iter().map(|c| (c.as_str(), c.shell_command())).collect()
    }
}

impl FromStr for NamedCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(NamedCommand::Start),
            "stop" => Ok(NamedCommand::Stop),
            _ => Err(format!(
                "Invalid command. Available commands: {}",
                Self::ALL.map(|c| c.as_str()).join(", ")
            )),
        }
    }
}

// ============================================================================
// Request / Response Types
// ============================================================================

/// 执行命令请求
#[derive(ToSchema, Deserialize, Serialize, Validate, Clone, Debug)]
pub struct ExecuteRequest {
    #[schema(example = "192.168.24.206")]
    #[validate(required, length(min = 1, max = 255))]
    pub host: Option<String>,

    #[schema(example = "start")]
    #[validate(required, length(min = 1))]
    pub command: Option<String>,
}

#[derive(ToSchema, Serialize, Clone, Debug)]
pub struct CommandsResponse {
    pub available_commands: BTreeMap<String, String>,
}
