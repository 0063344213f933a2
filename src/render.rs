use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template not found: {}", path.display())]
    TemplateNotFound { path: PathBuf },

    #[error("render io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A rendered configuration on local disk. The file is removed when the
/// value is closed or dropped.
#[derive(Debug)]
pub struct RenderedConfig {
    file: NamedTempFile,
}

impl RenderedConfig {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Remove the file now, reporting a failed removal.
    pub fn close(self) -> std::io::Result<()> {
        self.file.close()
    }
}

#[derive(Clone, Debug)]
pub struct TemplateRenderer {
    output_dir: PathBuf,
    placeholder: String,
}

impl TemplateRenderer {
    pub fn new(output_dir: impl Into<PathBuf>, placeholder: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            placeholder: placeholder.into(),
        }
    }

    /// Render `template` with `value` into a file unique to this call, so
    /// concurrent renders for different devices never share an output path.
    pub async fn render(&self, template: &Path, value: &str) -> Result<RenderedConfig, RenderError> {
        create_parent(&self.output_dir).await?;

        let file = tempfile::Builder::new()
            .prefix(&format!("{}-", sanitize(value)))
            .suffix(".toml")
            .tempfile_in(&self.output_dir)
            .map_err(|e| RenderError::Io {
                path: self.output_dir.clone(),
                source: e,
            })?;

        // On error the temp file is dropped and removed.
        render_to(template, &self.placeholder, value, file.path()).await?;
        Ok(RenderedConfig { file })
    }
}

/// Replace every occurrence of `placeholder` in `template` and write the
/// result to `destination`, creating its parent directory if needed.
/// Existing content at `destination` is overwritten.
pub async fn render_to(
    template: &Path,
    placeholder: &str,
    value: &str,
    destination: &Path,
) -> Result<(), RenderError> {
    let content = read_template(template).await?;
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            create_parent(parent).await?;
        }
    }
    write_rendered(destination, substitute(&content, placeholder, value)).await
}

async fn read_template(template: &Path) -> Result<String, RenderError> {
    tokio::fs::read_to_string(template).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RenderError::TemplateNotFound {
                path: template.to_path_buf(),
            }
        } else {
            RenderError::Io {
                path: template.to_path_buf(),
                source: e,
            }
        }
    })
}

async fn create_parent(dir: &Path) -> Result<(), RenderError> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| RenderError::Io {
        path: dir.to_path_buf(),
        source: e,
    })
}

async fn write_rendered(destination: &Path, rendered: String) -> Result<(), RenderError> {
    tokio::fs::write(destination, rendered)
        .await
        .map_err(|e| RenderError::Io {
            path: destination.to_path_buf(),
            source: e,
        })
}

pub fn substitute(content: &str, placeholder: &str, value: &str) -> String {
    if placeholder.is_empty() {
        return content.to_string();
    }
    content.replace(placeholder, value)
}

fn sanitize(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(64)
        .collect();
    if cleaned.is_empty() {
        "device".to_string()
    } else {
        cleaned
    }
}
