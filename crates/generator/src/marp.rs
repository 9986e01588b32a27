//! Marp CLI invocation.
//!
//! Each render gets a scratch directory holding the markdown source and
//! both outputs; the directory is removed when the render returns.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use slides_core::job::ArtifactBundle;
use slides_core::settings::Theme;

use crate::error::GenerateError;

/// Default invocation: the Marp CLI through `npx`.
pub const DEFAULT_COMMAND: &str = "npx @marp-team/marp-cli";

const SOURCE_FILE: &str = "presentation.md";
const PDF_FILE: &str = "presentation.pdf";
const HTML_FILE: &str = "presentation.html";

/// Markup-to-document seam.
#[async_trait]
pub trait DocumentRenderer: Send + Sync + 'static {
    async fn render(&self, markdown: &str, theme: Theme) -> Result<ArtifactBundle, GenerateError>;
}

#[derive(Debug, Clone, Copy)]
enum OutputFormat {
    Pdf,
    Html,
}

impl OutputFormat {
    fn flag(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "--pdf",
            OutputFormat::Html => "--html",
        }
    }

    fn file_name(self) -> &'static str {
        match self {
            OutputFormat::Pdf => PDF_FILE,
            OutputFormat::Html => HTML_FILE,
        }
    }

    fn failure(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "failed to generate PDF. Please try again.",
            OutputFormat::Html => "failed to generate HTML. Please try again.",
        }
    }
}

/// Renders Marp markdown with an external CLI.
pub struct MarpRenderer {
    program: String,
    leading_args: Vec<String>,
    themes_dir: PathBuf,
}

impl MarpRenderer {
    /// `command` is split on whitespace: the first word is the program,
    /// the rest are passed before the per-render arguments.
    pub fn new(command: &str, themes_dir: impl Into<PathBuf>) -> Self {
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words.next().unwrap_or_else(|| "npx".to_string());
        Self {
            program,
            leading_args: words.collect(),
            themes_dir: themes_dir.into(),
        }
    }

    /// A custom stylesheet in the themes directory wins over the CLI's
    /// built-in theme of the same name.
    async fn theme_arg(&self, theme: Theme) -> String {
        let css = self.themes_dir.join(format!("{theme}.css"));
        match tokio::fs::try_exists(&css).await {
            Ok(true) => css.to_string_lossy().into_owned(),
            _ => theme.as_str().to_string(),
        }
    }

    async fn run(
        &self,
        source: &Path,
        theme_arg: &str,
        dir: &Path,
        format: OutputFormat,
    ) -> Result<Vec<u8>, GenerateError> {
        let output_path = dir.join(format.file_name());
        let output = tokio::process::Command::new(&self.program)
            .args(&self.leading_args)
            .arg(source)
            .args(["--theme", theme_arg, "--output"])
            .arg(&output_path)
            .arg(format.flag())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                tracing::error!(program = %self.program, error = %e, "Failed to launch renderer");
                GenerateError::Render(format.failure().to_string())
            })?;

        if !output.status.success() {
            tracing::error!(
                exit_code = ?output.status.code(),
                stderr = %String::from_utf8_lossy(&output.stderr),
                format = format.flag(),
                "Renderer failed",
            );
            return Err(GenerateError::Render(format.failure().to_string()));
        }

        tokio::fs::read(&output_path).await.map_err(|e| {
            tracing::error!(path = %output_path.display(), error = %e, "Renderer output missing");
            GenerateError::Render(format.failure().to_string())
        })
    }
}

#[async_trait]
impl DocumentRenderer for MarpRenderer {
    async fn render(&self, markdown: &str, theme: Theme) -> Result<ArtifactBundle, GenerateError> {
        let scratch = tempfile::Builder::new()
            .prefix("slides-")
            .tempdir()
            .map_err(|e| GenerateError::Render(format!("failed to create scratch directory: {e}")))?;
        let source = scratch.path().join(SOURCE_FILE);
        tokio::fs::write(&source, markdown)
            .await
            .map_err(|e| GenerateError::Render(format!("failed to write markdown: {e}")))?;

        let theme_arg = self.theme_arg(theme).await;
        tracing::debug!(theme = %theme_arg, "Rendering presentation");

        let pdf = self
            .run(&source, &theme_arg, scratch.path(), OutputFormat::Pdf)
            .await?;
        let html = self
            .run(&source, &theme_arg, scratch.path(), OutputFormat::Html)
            .await?;

        tracing::info!(pdf_bytes = pdf.len(), html_bytes = html.len(), "Presentation rendered");
        Ok(ArtifactBundle { pdf, html })
    }
}
