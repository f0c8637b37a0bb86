use std::sync::Arc;

use exam_core::model::QuestionDraft;

use super::chunk::{chunk_budget, chunk_text};
use super::decode::decode_candidates;
use super::prompts;
use crate::ai::{GenerateRequest, ModelClient, PageImage};
use crate::error::{ExtractionError, ProviderError};

/// Candidates recovered by one extraction run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Candidates in chunk (or page) order. Not deduplicated.
    pub candidates: Vec<QuestionDraft>,
    /// Number of requests sent.
    pub attempted: usize,
    /// Requests that failed or returned nothing usable, and were skipped.
    pub failed: usize,
}

/// Prompted extraction against a remote model.
///
/// Requests are issued one at a time so results keep document order. A bad
/// chunk or page is skipped; a rejected credential or a rate limit stops the
/// run immediately.
#[derive(Clone)]
pub struct ExtractionPipeline {
    client: Arc<dyn ModelClient>,
    max_chars: usize,
}

enum Step {
    Extracted(Vec<QuestionDraft>),
    Skipped,
}

impl ExtractionPipeline {
    #[must_use]
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        let max_chars = chunk_budget(client.provider());
        Self { client, max_chars }
    }

    #[must_use]
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars.max(1);
        self
    }

    #[must_use]
    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Extract from raw text, one request per line-aligned chunk.
    ///
    /// # Errors
    ///
    /// Returns `MissingInput` for blank text, `Unauthorized` or `RateLimited`
    /// as soon as the provider reports them, and `NothingExtracted` when no
    /// chunk produced a candidate.
    pub async fn extract_from_text(&self, text: &str) -> Result<ExtractionReport, ExtractionError> {
        if text.trim().is_empty() {
            return Err(ExtractionError::MissingInput);
        }

        let chunks: Vec<&str> = chunk_text(text, self.max_chars)
            .into_iter()
            .filter(|chunk| !chunk.trim().is_empty())
            .collect();
        tracing::info!(
            provider = %self.client.provider(),
            model = self.client.model(),
            chunks = chunks.len(),
            "extracting questions from text"
        );

        let mut report = ExtractionReport {
            candidates: Vec::new(),
            attempted: 0,
            failed: 0,
        };
        for (index, chunk) in chunks.iter().enumerate() {
            let request = GenerateRequest::text(prompts::text_extraction(chunk))
                .with_system(prompts::EXTRACTION_SYSTEM)
                .expect_json();
            tracing::debug!(chunk = index + 1, chars = chunk.chars().count(), "sending chunk");
            self.run(&request, &mut report, "chunk", index + 1).await?;
        }
        finish(report)
    }

    /// Extract from page images, one request per page.
    ///
    /// # Errors
    ///
    /// Same as [`Self::extract_from_text`], plus `ImagesUnsupported` when the
    /// provider cannot read images.
    pub async fn extract_from_pages(
        &self,
        pages: &[PageImage],
    ) -> Result<ExtractionReport, ExtractionError> {
        if pages.is_empty() {
            return Err(ExtractionError::MissingInput);
        }
        let provider = self.client.provider();
        if !provider.supports_images() {
            return Err(ExtractionError::ImagesUnsupported(provider.to_string()));
        }
        tracing::info!(
            provider = %provider,
            model = self.client.model(),
            pages = pages.len(),
            "extracting questions from page images"
        );

        let mut report = ExtractionReport {
            candidates: Vec::new(),
            attempted: 0,
            failed: 0,
        };
        for (index, page) in pages.iter().enumerate() {
            let request = GenerateRequest::text(prompts::page_extraction())
                .with_system(prompts::EXTRACTION_SYSTEM)
                .with_image(page.clone())
                .expect_json();
            self.run(&request, &mut report, "page", index + 1).await?;
        }
        finish(report)
    }

    async fn run(
        &self,
        request: &GenerateRequest,
        report: &mut ExtractionReport,
        unit: &'static str,
        number: usize,
    ) -> Result<(), ExtractionError> {
        report.attempted += 1;
        match self.step(request).await? {
            Step::Extracted(mut candidates) => {
                tracing::debug!(unit, number, found = candidates.len(), "extracted");
                report.candidates.append(&mut candidates);
            }
            Step::Skipped => {
                tracing::warn!(unit, number, "skipped after a failed request");
                report.failed += 1;
            }
        }
        Ok(())
    }

    async fn step(&self, request: &GenerateRequest) -> Result<Step, ExtractionError> {
        let raw = match self.client.generate(request).await {
            Ok(raw) => raw,
            Err(err) if err.is_auth() => return Err(ExtractionError::Unauthorized(err.to_string())),
            Err(ProviderError::RateLimited) => return Err(ExtractionError::RateLimited),
            Err(err) => {
                tracing::warn!(error = %err, "provider request failed");
                return Ok(Step::Skipped);
            }
        };
        match decode_candidates(&raw) {
            Ok(candidates) => Ok(Step::Extracted(candidates)),
            Err(err) => {
                tracing::warn!(error = %err, "could not decode provider response");
                Ok(Step::Skipped)
            }
        }
    }
}

fn finish(report: ExtractionReport) -> Result<ExtractionReport, ExtractionError> {
    if report.candidates.is_empty() {
        return Err(ExtractionError::NothingExtracted {
            attempted: report.attempted,
            failed: report.failed,
        });
    }
    tracing::info!(
        candidates = report.candidates.len(),
        attempted = report.attempted,
        failed = report.failed,
        "extraction finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use exam_core::model::ProviderKind;

    use super::*;

    struct ScriptedClient {
        provider: ProviderKind,
        replies: Mutex<VecDeque<Result<String, ProviderError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(provider: ProviderKind, replies: Vec<Result<String, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                provider,
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedClient {
        fn provider(&self) -> ProviderKind {
            self.provider
        }

        fn model(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, request: &GenerateRequest) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ProviderError::EmptyResponse))
        }

        async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
            Ok(vec!["scripted".into()])
        }
    }

    fn reply(prompt: &str) -> Result<String, ProviderError> {
        Ok(format!(
            r#"[{{"theme":"T","question":"{prompt}","options":["a","b","c","d"],"answer":2}}]"#
        ))
    }

    const TEXT: &str = "1. first\nA. a\n2. second\nA. a\n3. third\nA. a\n";

    #[tokio::test]
    async fn chunks_are_sent_in_order_and_concatenated() {
        let client = ScriptedClient::new(
            ProviderKind::Groq,
            vec![reply("one"), reply("two"), reply("three")],
        );
        let pipeline = ExtractionPipeline::new(client.clone()).with_max_chars(16);

        let report = pipeline.extract_from_text(TEXT).await.unwrap();
        let prompts: Vec<_> = report.candidates.iter().map(|c| c.question.as_str()).collect();
        assert_eq!(prompts, vec!["one", "two", "three"]);
        assert_eq!((report.attempted, report.failed), (3, 0));

        let sent = client.prompts();
        assert!(sent[0].contains("1. first"));
        assert!(sent[2].contains("3. third"));
    }

    #[tokio::test]
    async fn malformed_chunks_are_skipped() {
        let client = ScriptedClient::new(
            ProviderKind::Groq,
            vec![
                Ok("not json at all".into()),
                Err(ProviderError::EmptyResponse),
                Ok(format!("```json\n{}\n```", reply("kept").unwrap())),
            ],
        );
        let pipeline = ExtractionPipeline::new(client).with_max_chars(16);

        let report = pipeline.extract_from_text(TEXT).await.unwrap();
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].question, "kept");
        assert_eq!((report.attempted, report.failed), (3, 2));
    }

    #[tokio::test]
    async fn auth_failure_aborts_immediately() {
        let client = ScriptedClient::new(
            ProviderKind::Groq,
            vec![
                reply("one"),
                Err(ProviderError::Unauthorized("Invalid API Key".into())),
                reply("never sent"),
            ],
        );
        let pipeline = ExtractionPipeline::new(client.clone()).with_max_chars(16);

        let err = pipeline.extract_from_text(TEXT).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Unauthorized(_)));
        assert_eq!(client.prompts().len(), 2);
    }

    #[tokio::test]
    async fn rate_limit_aborts_the_run() {
        let client = ScriptedClient::new(ProviderKind::Groq, vec![Err(ProviderError::RateLimited)]);
        let pipeline = ExtractionPipeline::new(client);
        assert!(matches!(
            pipeline.extract_from_text(TEXT).await,
            Err(ExtractionError::RateLimited)
        ));
    }

    #[tokio::test]
    async fn empty_results_report_nothing_extracted() {
        let client = ScriptedClient::new(ProviderKind::Groq, vec![Ok("[]".into())]);
        let pipeline = ExtractionPipeline::new(client);
        assert!(matches!(
            pipeline.extract_from_text(TEXT).await,
            Err(ExtractionError::NothingExtracted {
                attempted: 1,
                failed: 0
            })
        ));
        assert!(matches!(
            pipeline.extract_from_text("  \n ").await,
            Err(ExtractionError::MissingInput)
        ));
    }

    #[tokio::test]
    async fn pages_are_sent_one_per_request() {
        let client = ScriptedClient::new(
            ProviderKind::Gemini,
            vec![reply("p1"), Err(ProviderError::EmptyResponse), reply("p3")],
        );
        let pipeline = ExtractionPipeline::new(client.clone());
        let pages = vec![PageImage::jpeg(vec![1]), PageImage::jpeg(vec![2]), PageImage::jpeg(vec![3])];

        let report = pipeline.extract_from_pages(&pages).await.unwrap();
        assert_eq!(report.candidates.len(), 2);
        assert_eq!((report.attempted, report.failed), (3, 1));
        assert_eq!(client.prompts().len(), 3);
    }

    #[tokio::test]
    async fn text_only_providers_reject_pages() {
        let client = ScriptedClient::new(ProviderKind::Groq, Vec::new());
        let pipeline = ExtractionPipeline::new(client.clone());
        assert!(matches!(
            pipeline.extract_from_pages(&[PageImage::jpeg(vec![1])]).await,
            Err(ExtractionError::ImagesUnsupported(_))
        ));
        assert!(client.prompts().is_empty());
    }
}
