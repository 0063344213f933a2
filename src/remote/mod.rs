pub mod error;
pub mod transport;

use crate::config::SshSettings;
use async_trait::async_trait;
use error::RemoteError;
use russh::keys::PrivateKey;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use transport::SshTransport;
use utoipa::ToSchema;

#[derive(Clone, Debug)]
pub struct Upload {
    pub local_path: PathBuf,
    pub remote_path: String,
}

/// What to do on the remote side. The command runs first when both are set.
#[derive(Clone, Debug, Default)]
pub struct DeliveryRequest {
    pub command: Option<String>,
    pub upload: Option<Upload>,
}

impl DeliveryRequest {
    pub fn command(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            upload: None,
        }
    }

    pub fn upload(local_path: impl Into<PathBuf>, remote_path: impl Into<String>) -> Self {
        Self {
            command: None,
            upload: Some(Upload {
                local_path: local_path.into(),
                remote_path: remote_path.into(),
            }),
        }
    }

    fn describe(&self) -> String {
        match (&self.command, &self.upload) {
            (Some(cmd), None) => cmd.clone(),
            (None, Some(up)) => format!("upload {}", up.remote_path),
            (Some(cmd), Some(up)) => format!("{cmd}; upload {}", up.remote_path),
            (None, None) => String::new(),
        }
    }
}

/// Outcome of one delivery. `error` is set only when the delivery itself
/// failed; a non-zero `exit_code` is a completed run.
#[derive(ToSchema, Serialize, Clone, Debug, PartialEq)]
pub struct ExecutionResult {
    #[schema(example = "miner-office.local")]
    pub host: String,

    #[schema(example = "/etc/init.d/bosminer start")]
    pub command: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn new(host: &str, command: &str) -> Self {
        Self {
            host: host.to_string(),
            command: command.to_string(),
            exit_code: None,
            output: None,
            stderr: None,
            error: None,
        }
    }

    pub fn failed(host: &str, command: &str, err: &RemoteError) -> Self {
        let mut result = Self::new(host, command);
        result.error = Some(err.to_string());
        result
    }

    pub fn is_failure(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }
}

#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, target: &str, request: DeliveryRequest) -> ExecutionResult;
}

/// Delivers over SSH with one process-wide private key.
pub struct SshDelivery {
    settings: SshSettings,
    key: OnceCell<Arc<PrivateKey>>,
}

impl SshDelivery {
    pub fn new(settings: SshSettings) -> Self {
        Self {
            settings,
            key: OnceCell::new(),
        }
    }

    async fn key(&self) -> Result<Arc<PrivateKey>, RemoteError> {
        self.key
            .get_or_try_init(|| async { transport::load_private_key(&self.settings).map(Arc::new) })
            .await
            .cloned()
    }

    async fn run(
        &self,
        transport: &mut SshTransport,
        request: &DeliveryRequest,
        result: &mut ExecutionResult,
    ) -> Result<(), RemoteError> {
        let key = self.key().await?;
        transport.authenticate(&self.settings.username, key).await?;

        if let Some(command) = &request.command {
            let out = transport.exec(command).await?;
            result.exit_code = out.exit_code;
            result.output = Some(String::from_utf8_lossy(&out.stdout).trim().to_string());
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            if !stderr.is_empty() {
                result.stderr = Some(stderr);
            }
        }

        if let Some(upload) = &request.upload {
            let content = tokio::fs::read(&upload.local_path).await.map_err(|e| {
                RemoteError::LocalFile(format!("{}: {e}", upload.local_path.display()))
            })?;
            transport.upload(&upload.remote_path, &content).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl Delivery for SshDelivery {
    async fn deliver(&self, target: &str, request: DeliveryRequest) -> ExecutionResult {
        let label = request.describe();

        let mut transport = match SshTransport::connect(&self.settings, target).await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(host = target, kind = e.kind(), error = %e, "remote connect failed");
                return ExecutionResult::failed(target, &label, &e);
            }
        };

        let mut result = ExecutionResult::new(target, &label);
        let outcome = self.run(&mut transport, &request, &mut result).await;
        transport.disconnect().await;

        match outcome {
            Ok(()) => {
                tracing::info!(host = target, command = %label, exit_code = ?result.exit_code, "remote delivery completed");
            }
            Err(e) => {
                tracing::error!(host = target, kind = e.kind(), error = %e, "remote delivery failed");
                result.error = Some(e.to_string());
            }
        }
        result
    }
}
