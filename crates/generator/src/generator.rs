use std::sync::Arc;

use async_trait::async_trait;
use slides_core::job::{
    ArtifactBundle, MSG_ANALYZING, MSG_CREATING_PRESENTATION, MSG_FINALIZING,
    MSG_GENERATING_CONTENT,
};
use slides_core::progress::ProgressSink;
use slides_core::prompts::build_prompt;
use slides_core::settings::{SlideSettings, Theme};
use slides_core::upload::UploadedFile;

use crate::error::GenerateError;
use crate::gemini::{MarkupModel, ModelRequest};
use crate::markdown::extract_markdown;
use crate::marp::DocumentRenderer;

/// Default ceiling on input tokens per request.
pub const DEFAULT_MAX_INPUT_TOKENS: u64 = 16_384;

/// Opaque generation boundary used by the dispatcher.
///
/// Zero or more progress messages are reported before the call returns.
#[async_trait]
pub trait ArtifactGenerator: Send + Sync + 'static {
    async fn generate(
        &self,
        theme: Theme,
        files: &[UploadedFile],
        settings: &SlideSettings,
        progress: &dyn ProgressSink,
    ) -> Result<ArtifactBundle, GenerateError>;
}

/// Model-then-render generator.
pub struct SlideGenerator {
    model: Arc<dyn MarkupModel>,
    renderer: Arc<dyn DocumentRenderer>,
    max_input_tokens: u64,
}

impl SlideGenerator {
    pub fn new(
        model: Arc<dyn MarkupModel>,
        renderer: Arc<dyn DocumentRenderer>,
        max_input_tokens: u64,
    ) -> Self {
        Self {
            model,
            renderer,
            max_input_tokens,
        }
    }
}

#[async_trait]
impl ArtifactGenerator for SlideGenerator {
    async fn generate(
        &self,
        theme: Theme,
        files: &[UploadedFile],
        settings: &SlideSettings,
        progress: &dyn ProgressSink,
    ) -> Result<ArtifactBundle, GenerateError> {
        progress.report(MSG_ANALYZING);
        for file in files {
            tracing::debug!(filename = %file.filename, content_type = %file.content_type, bytes = file.data.len(), "Input file");
        }

        progress.report(MSG_GENERATING_CONTENT);
        let prompt = build_prompt(theme, settings);
        let request = ModelRequest {
            files,
            prompt: &prompt,
        };

        progress.report(MSG_CREATING_PRESENTATION);
        let tokens = self.model.count_tokens(request).await?;
        if tokens > self.max_input_tokens {
            tracing::warn!(tokens, limit = self.max_input_tokens, "Input exceeds token ceiling");
            return Err(GenerateError::InputTooLarge {
                tokens,
                limit: self.max_input_tokens,
            });
        }

        let response = self.model.generate(request).await?;
        let markdown = extract_markdown(&response);
        if markdown.trim().is_empty() {
            tracing::warn!("Model response contained no markdown");
            return Err(GenerateError::Upstream(
                "failed to generate presentation. Please try again.".to_string(),
            ));
        }

        progress.report(MSG_FINALIZING);
        self.renderer.render(&markdown, theme).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use assert_matches::assert_matches;

    use super::*;

    struct FakeModel {
        tokens: u64,
        response: String,
        generate_calls: AtomicUsize,
    }

    impl FakeModel {
        fn new(tokens: u64, response: &str) -> Arc<Self> {
            Arc::new(Self {
                tokens,
                response: response.to_string(),
                generate_calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MarkupModel for FakeModel {
        async fn count_tokens(&self, _request: ModelRequest<'_>) -> Result<u64, GenerateError> {
            Ok(self.tokens)
        }

        async fn generate(&self, request: ModelRequest<'_>) -> Result<String, GenerateError> {
            assert!(request.prompt.contains("Theme: "));
            self.generate_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    #[derive(Default)]
    struct EchoRenderer {
        seen: Mutex<Vec<(String, Theme)>>,
    }

    #[async_trait]
    impl DocumentRenderer for EchoRenderer {
        async fn render(
            &self,
            markdown: &str,
            theme: Theme,
        ) -> Result<ArtifactBundle, GenerateError> {
            self.seen.lock().unwrap().push((markdown.to_string(), theme));
            Ok(ArtifactBundle {
                pdf: b"%PDF-1.7".to_vec(),
                html: markdown.as_bytes().to_vec(),
            })
        }
    }

    fn md_file() -> Vec<UploadedFile> {
        vec![UploadedFile {
            filename: "notes.md".into(),
            content_type: "text/plain".into(),
            data: b"# Notes".to_vec(),
        }]
    }

    #[tokio::test]
    async fn reports_phases_in_order_and_renders() {
        let model = FakeModel::new(100, "```md\n# Deck\n```");
        let renderer = Arc::new(EchoRenderer::default());
        let generator = SlideGenerator::new(model, renderer.clone(), DEFAULT_MAX_INPUT_TOKENS);

        let seen = Mutex::new(Vec::new());
        let sink = |m: &str| seen.lock().unwrap().push(m.to_string());
        let bundle = generator
            .generate(Theme::Default, &md_file(), &SlideSettings::default(), &sink)
            .await
            .unwrap();

        assert_eq!(bundle.html, b"# Deck");
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                MSG_ANALYZING,
                MSG_GENERATING_CONTENT,
                MSG_CREATING_PRESENTATION,
                MSG_FINALIZING
            ]
        );
        assert_eq!(renderer.seen.lock().unwrap()[0].1, Theme::Default);
    }

    #[tokio::test]
    async fn too_many_tokens_fails_before_generation() {
        let model = FakeModel::new(DEFAULT_MAX_INPUT_TOKENS + 1, "```md\n# Deck\n```");
        let renderer = Arc::new(EchoRenderer::default());
        let generator =
            SlideGenerator::new(model.clone(), renderer.clone(), DEFAULT_MAX_INPUT_TOKENS);

        let err = generator
            .generate(Theme::Beam, &md_file(), &SlideSettings::default(), &|_: &str| {})
            .await
            .unwrap_err();

        assert_matches!(err, GenerateError::InputTooLarge { .. });
        assert_eq!(err.to_string(), "documents are too large to process");
        assert_eq!(model.generate_calls.load(Ordering::SeqCst), 0);
        assert!(renderer.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn exactly_at_ceiling_is_allowed() {
        let model = FakeModel::new(DEFAULT_MAX_INPUT_TOKENS, "# Deck");
        let generator = SlideGenerator::new(
            model,
            Arc::new(EchoRenderer::default()),
            DEFAULT_MAX_INPUT_TOKENS,
        );
        let bundle = generator
            .generate(Theme::Gaia, &md_file(), &SlideSettings::default(), &|_: &str| {})
            .await
            .unwrap();
        assert_eq!(bundle.html, b"# Deck");
    }

    #[tokio::test]
    async fn blank_response_is_upstream_failure() {
        let model = FakeModel::new(10, "```md\n\n```");
        let generator = SlideGenerator::new(
            model,
            Arc::new(EchoRenderer::default()),
            DEFAULT_MAX_INPUT_TOKENS,
        );
        let err = generator
            .generate(Theme::Gaia, &md_file(), &SlideSettings::default(), &|_: &str| {})
            .await
            .unwrap_err();
        assert_matches!(err, GenerateError::Upstream(m) if m.contains("Please try again"));
    }
}
