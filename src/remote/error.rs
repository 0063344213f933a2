use thiserror::Error;

/// Failure kinds of a remote delivery. They are reported inside an
/// `ExecutionResult` rather than returned to the HTTP caller.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Private key error: {0}")]
    Key(String),

    #[error("SSH connection failed: {0}")]
    Transport(String),

    #[error("SFTP transfer failed: {0}")]
    Sftp(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Local file error: {0}")]
    LocalFile(String),
}

impl RemoteError {
    pub fn kind(&self) -> &'static str {
        match self {
            RemoteError::Connect(_) => "connect",
            RemoteError::Auth(_) => "auth",
            RemoteError::Key(_) => "key",
            RemoteError::Transport(_) => "transport",
            RemoteError::Sftp(_) => "sftp",
            RemoteError::Timeout(_) => "timeout",
            RemoteError::LocalFile(_) => "local_file",
        }
    }
}

impl From<russh::Error> for RemoteError {
    fn from(err: russh::Error) -> Self {
        RemoteError::Transport(err.to_string())
    }
}

impl From<russh_sftp::client::error::Error> for RemoteError {
    fn from(err: russh_sftp::client::error::Error) -> Self {
        RemoteError::Sftp(err.to_string())
    }
}
