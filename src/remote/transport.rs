use crate::config::SshSettings;
use crate::remote::error::RemoteError;
use russh::client::{self, Handle};
use russh::keys::{PrivateKey, PrivateKeyWithHashAlg};
use russh::ChannelMsg;
use russh_sftp::client::SftpSession;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::time::Duration;

pub struct ExecOutput {
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

struct TransportHandler;

impl client::Handler for TransportHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Heaters are re-flashed often and their host keys rotate with them.
        Ok(true)
    }
}

pub struct SshTransport {
    session: Handle<TransportHandler>,
    operation_timeout: Duration,
}

impl SshTransport {
    /// Open a TCP connection to `target` and complete the SSH handshake.
    pub async fn connect(settings: &SshSettings, target: &str) -> Result<Self, RemoteError> {
        let client_cfg = Arc::new(client::Config {
            inactivity_timeout: None,
            ..Default::default()
        });

        let connect_timeout = Duration::from_millis(settings.connect_timeout_ms);
        let session = tokio::time::timeout(
            connect_timeout,
            client::connect(client_cfg, (target, settings.port), TransportHandler),
        )
        .await
        .map_err(|_| RemoteError::Timeout(format!("connect to {target} timed out")))?
        .map_err(|e| RemoteError::Connect(e.to_string()))?;

        Ok(Self {
            session,
            operation_timeout: Duration::from_millis(settings.operation_timeout_ms),
        })
    }

    pub async fn authenticate(
        &mut self,
        username: &str,
        key: Arc<PrivateKey>,
    ) -> Result<(), RemoteError> {
        let timeout = self.operation_timeout;

        let rsa_hash = tokio::time::timeout(timeout, self.session.best_supported_rsa_hash())
            .await
            .map_err(|_| RemoteError::Timeout("auth timed out".to_string()))?
            .map_err(|e| RemoteError::Auth(e.to_string()))?
            .flatten();

        let auth = tokio::time::timeout(
            timeout,
            self.session
                .authenticate_publickey(username, PrivateKeyWithHashAlg::new(key, rsa_hash)),
        )
        .await
        .map_err(|_| RemoteError::Timeout("auth timed out".to_string()))?
        .map_err(|e| RemoteError::Auth(e.to_string()))?;

        if !auth.success() {
            return Err(RemoteError::Auth(format!("key rejected for user {username}")));
        }
        Ok(())
    }

    /// Run `command` in the remote default shell and collect its output.
    pub async fn exec(&mut self, command: &str) -> Result<ExecOutput, RemoteError> {
        tokio::time::timeout(self.operation_timeout, self.exec_inner(command))
            .await
            .map_err(|_| RemoteError::Timeout(format!("command '{command}' timed out")))?
    }

    async fn exec_inner(&mut self, command: &str) -> Result<ExecOutput, RemoteError> {
        let mut channel = self.session.channel_open_session().await?;
        channel.exec(true, command).await?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;

        // Exit status may arrive after EOF, so read until the channel closes.
        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    stdout.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    if ext == 1 {
                        stderr.extend_from_slice(&data);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    exit_code = Some(exit_status as i32);
                }
                Some(ChannelMsg::Close) | None => break,
                _ => {}
            }
        }

        Ok(ExecOutput {
            exit_code,
            stdout,
            stderr,
        })
    }

    /// Write `content` to `remote_path` over an SFTP channel on this session.
    pub async fn upload(&mut self, remote_path: &str, content: &[u8]) -> Result<(), RemoteError> {
        tokio::time::timeout(self.operation_timeout, self.upload_inner(remote_path, content))
            .await
            .map_err(|_| RemoteError::Timeout(format!("upload to {remote_path} timed out")))?
    }

    async fn upload_inner(&mut self, remote_path: &str, content: &[u8]) -> Result<(), RemoteError> {
        let mut channel = self.session.channel_open_session().await?;
        channel.request_subsystem(true, "sftp").await?;
        let sftp = SftpSession::new(channel.into_stream()).await?;

        let mut file = sftp.create(remote_path).await?;
        file.write_all(content)
            .await
            .map_err(|e| RemoteError::Sftp(format!("write {remote_path}: {e}")))?;
        file.shutdown()
            .await
            .map_err(|e| RemoteError::Sftp(format!("close {remote_path}: {e}")))?;
        sftp.close().await?;
        Ok(())
    }

    /// Disconnect the session
    pub async fn disconnect(self) {
        let _ = self
            .session
            .disconnect(russh::Disconnect::ByApplication, "done", "en")
            .await;
    }
}

pub fn load_private_key(settings: &SshSettings) -> Result<PrivateKey, RemoteError> {
    russh::keys::load_secret_key(&settings.private_key_path, settings.passphrase.as_deref())
        .map_err(|e| {
            RemoteError::Key(format!(
                "load {}: {e}",
                settings.private_key_path.display()
            ))
        })
}
