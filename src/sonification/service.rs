//! # Sonification Pipeline
//!
//! One request-scoped, single-attempt pipeline:
//! 1. Validate the URL, variant and preset
//! 2. Fetch the page
//! 3. Select the slice window and assign the artifact name
//! 4. Kick off a background retention sweep
//! 5. Render the slice through the external routine
//! 6. Assemble the response metadata
//!
//! Validation failures (including unreachable URLs) end the pipeline before
//! any subprocess is started. Render failures end it after the attempt. No
//! step is retried.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::{AppConfig, DeploymentMode};
use crate::error::{AppError, AppResult};
use crate::sonification::fetcher::{ContentFetcher, HttpFetcher};
use crate::sonification::naming::assign_name;
use crate::sonification::render::{RenderDelegate, RenderRequest, ScriptRenderer};
use crate::sonification::slice::select_slice;
use crate::sonification::variant::{RenderPreset, ScriptVariant};
use crate::sonification::{ProcessingMetadata, RetentionSweeper};

/// Fixed pipeline parameters, resolved once from configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub limit: usize,
    pub mode: DeploymentMode,
    pub default_variant: ScriptVariant,
}

pub struct SonificationService {
    fetcher: Arc<dyn ContentFetcher>,
    renderer: Arc<dyn RenderDelegate>,
    sweeper: Arc<RetentionSweeper>,
    settings: PipelineSettings,
}

impl SonificationService {
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        renderer: Arc<dyn RenderDelegate>,
        sweeper: Arc<RetentionSweeper>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            fetcher,
            renderer,
            sweeper,
            settings,
        }
    }

    /// Wire up the production collaborators from configuration.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let sonification = &config.sonification;
        let mode = sonification.mode();

        let fetcher = HttpFetcher::new(sonification.fetch_timeout())?;
        let renderer = ScriptRenderer::new(sonification)?;
        let sweeper = RetentionSweeper::new(
            renderer.audio_dir().to_path_buf(),
            config.retention.max_age(),
            mode,
        );
        let settings = PipelineSettings {
            limit: sonification.limit,
            mode,
            default_variant: ScriptVariant::parse(&sonification.default_variant)?,
        };

        Ok(Self::new(
            Arc::new(fetcher),
            Arc::new(renderer),
            Arc::new(sweeper),
            settings,
        ))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn sweeper(&self) -> &Arc<RetentionSweeper> {
        &self.sweeper
    }

    /// Turn the page at `url` into an audio artifact and describe it.
    pub async fn sonify(
        &self,
        url: Option<&str>,
        variant: Option<&str>,
        preset: Option<&str>,
    ) -> AppResult<ProcessingMetadata> {
        let request_id = Uuid::new_v4();
        let span = info_span!("sonify", request_id = %request_id);
        self.run(request_id, url, variant, preset)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        request_id: Uuid,
        url: Option<&str>,
        variant: Option<&str>,
        preset: Option<&str>,
    ) -> AppResult<ProcessingMetadata> {
        let url = url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AppError::ValidationError("No URL provided".to_string()))?;

        let variant = match variant {
            Some(raw) => ScriptVariant::parse(raw)
                .map_err(|e| AppError::ValidationError(e.to_string()))?,
            None => self.settings.default_variant.clone(),
        };
        let preset = preset
            .map(RenderPreset::parse)
            .transpose()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;

        let started_at = Utc::now();

        let fetched = self.fetcher.fetch(url).await.map_err(|e| {
            AppError::ValidationError(format!("Error when downloading the URL: {}", e))
        })?;

        let slice = select_slice(&fetched.body, self.settings.limit);
        // The fetch already accepted this URL, so a naming failure here is a
        // server-side fault rather than bad input
        let file_name = assign_name(Some(url), started_at, self.settings.mode).map_err(|e| {
            AppError::AudioProcessingError(format!("Error when naming the audio: {}", e))
        })?;

        debug!(
            op = "sonify.prepare",
            original_chars = fetched.content_length,
            slice_chars = slice.chars().count(),
            file_name = %file_name,
            variant = %variant,
            "Slice selected"
        );

        self.sweeper.trigger();

        let rendered = self
            .renderer
            .render(RenderRequest {
                request_id,
                slice: &slice,
                variant: &variant,
                preset: preset.as_ref(),
                file_name: &file_name,
            })
            .await
            .map_err(|e| {
                AppError::AudioProcessingError(format!("Error when processing the audio: {}", e))
            })?;

        debug!(
            op = "sonify.render",
            output = %rendered.output_path.display(),
            stdout = %rendered.stdout.trim_end(),
            "Renderer output"
        );

        let metadata = ProcessingMetadata::assemble(
            url,
            &fetched,
            &slice,
            &file_name,
            started_at,
            Utc::now(),
        );

        info!(
            op = "sonify.complete",
            url = %url,
            file_name = %file_name,
            processing_time = %metadata.processing_info.processing_time,
            "Sonification completed"
        );

        Ok(metadata)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::sonification::fetcher::{FetchError, FetchResult};
    use crate::sonification::render::{RenderError, RenderOutput};
    use actix_web::ResponseError;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    pub(crate) struct StubFetcher {
        pub result: Result<FetchResult, String>,
        pub calls: AtomicUsize,
    }

    impl StubFetcher {
        pub(crate) fn ok(body: &str) -> Self {
            Self {
                result: Ok(FetchResult::new(body.to_string(), Some("text/html".to_string()), 200)),
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn failing(message: &str) -> Self {
            Self {
                result: Err(message.to_string()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ContentFetcher for StubFetcher {
        async fn fetch(&self, _url: &str) -> Result<FetchResult, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().map_err(FetchError::Transport)
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct RecordedRender {
        pub slice: String,
        pub variant: String,
        pub preset: Option<String>,
        pub file_name: String,
    }

    pub(crate) struct StubRenderer {
        pub fail_with: Option<String>,
        pub calls: Mutex<Vec<RecordedRender>>,
    }

    impl StubRenderer {
        pub(crate) fn ok() -> Self {
            Self {
                fail_with: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing(stderr: &str) -> Self {
            Self {
                fail_with: Some(stderr.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn recorded(&self) -> Vec<RecordedRender> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RenderDelegate for StubRenderer {
        async fn render(&self, request: RenderRequest<'_>) -> Result<RenderOutput, RenderError> {
            self.calls.lock().unwrap().push(RecordedRender {
                slice: request.slice.to_string(),
                variant: request.variant.to_string(),
                preset: request.preset.map(|p| p.to_string()),
                file_name: request.file_name.to_string(),
            });
            match &self.fail_with {
                Some(stderr) => Err(RenderError::Failed {
                    exit_code: Some(1),
                    stderr: stderr.clone(),
                }),
                None => Ok(RenderOutput {
                    stdout: "ok".to_string(),
                    output_path: PathBuf::from("audios").join(request.file_name),
                }),
            }
        }
    }

    pub(crate) fn service_with(
        fetcher: Arc<StubFetcher>,
        renderer: Arc<StubRenderer>,
        mode: DeploymentMode,
        audio_dir: &TempDir,
    ) -> SonificationService {
        service_sweeping(fetcher, renderer, mode, audio_dir.path().to_path_buf())
    }

    fn service_sweeping(
        fetcher: Arc<StubFetcher>,
        renderer: Arc<StubRenderer>,
        mode: DeploymentMode,
        audio_dir: PathBuf,
    ) -> SonificationService {
        let sweeper = RetentionSweeper::new(audio_dir, DAY, mode);
        SonificationService::new(
            fetcher,
            renderer,
            Arc::new(sweeper),
            PipelineSettings {
                limit: 300,
                mode,
                default_variant: ScriptVariant::parse("html_to_sound").unwrap(),
            },
        )
    }

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);
    const HOUR: Duration = Duration::from_secs(60 * 60);

    fn write_aged(dir: &Path, name: &str, age: Duration) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"RIFF").unwrap();
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
        path
    }

    fn numbered_body(len: usize) -> String {
        (0..len).map(|i| char::from(b'0' + (i % 10) as u8)).collect()
    }

    #[tokio::test]
    async fn missing_url_never_fetches_or_renders() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::ok("body"));
        let renderer = Arc::new(StubRenderer::ok());
        let service = service_with(fetcher.clone(), renderer.clone(), DeploymentMode::Development, &dir);

        for url in [None, Some(""), Some("   ")] {
            let err = service.sonify(url, None, None).await.unwrap_err();
            assert!(matches!(err, AppError::ValidationError(_)));
            assert_eq!(err.status_code().as_u16(), 400);
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert!(renderer.recorded().is_empty());
    }

    #[tokio::test]
    async fn invalid_variant_is_rejected_before_fetch() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::ok("body"));
        let renderer = Arc::new(StubRenderer::ok());
        let service = service_with(fetcher.clone(), renderer.clone(), DeploymentMode::Development, &dir);

        let err = service
            .sonify(Some("https://example.com"), Some("../../bin/sh"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = service
            .sonify(Some("https://example.com"), None, Some("lofi; rm -rf"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert!(renderer.recorded().is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_is_a_validation_error() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::failing("dns error: no such host"));
        let renderer = Arc::new(StubRenderer::ok());
        let service = service_with(fetcher.clone(), renderer.clone(), DeploymentMode::Development, &dir);

        let err = service
            .sonify(Some("https://nowhere.invalid"), None, None)
            .await
            .unwrap_err();
        match &err {
            AppError::ValidationError(msg) => {
                assert!(msg.starts_with("Error when downloading the URL"), "{msg}");
                assert!(msg.contains("no such host"), "{msg}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.status_code().as_u16(), 400);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(renderer.recorded().is_empty());
    }

    #[tokio::test]
    async fn render_failure_is_an_audio_processing_error() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::ok("<html></html>"));
        let renderer = Arc::new(StubRenderer::failing("Traceback: ValueError"));
        let service = service_with(fetcher, renderer.clone(), DeploymentMode::Development, &dir);

        let err = service
            .sonify(Some("https://example.com"), Some("didgeridoo"), None)
            .await
            .unwrap_err();
        match &err {
            AppError::AudioProcessingError(msg) => assert!(msg.contains("ValueError"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.status_code().as_u16(), 500);
        assert_eq!(renderer.recorded().len(), 1);
    }

    #[tokio::test]
    async fn renders_centered_slice_and_reports_metadata() {
        let dir = TempDir::new().unwrap();
        let body = numbered_body(1000);
        let fetcher = Arc::new(StubFetcher::ok(&body));
        let renderer = Arc::new(StubRenderer::ok());
        let service = service_with(fetcher, renderer.clone(), DeploymentMode::Development, &dir);

        let metadata = service
            .sonify(Some("https://example.com/page"), None, None)
            .await
            .unwrap();

        let calls = renderer.recorded();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].slice, body[350..650]);
        assert_eq!(calls[0].variant, "html_to_sound");
        assert_eq!(calls[0].preset, None);
        assert_eq!(calls[0].file_name, "example.com.wav");

        assert_eq!(metadata.audio_url, "example.com.wav");
        let info = &metadata.processing_info;
        assert_eq!(info.original_url, "https://example.com/page");
        assert_eq!(info.original_content_length, 1000);
        assert_eq!(info.processed_content_length, 300);
        assert_eq!(info.content_type.as_deref(), Some("text/html"));
        assert_eq!(info.status_code, 200);
        assert_eq!(info.file_name, "example.com.wav");
        assert!(info.processing_time.ends_with("ms"));
    }

    #[tokio::test]
    async fn production_names_are_unique_and_variant_is_forwarded() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::ok("short page"));
        let renderer = Arc::new(StubRenderer::ok());
        let service = service_with(fetcher, renderer.clone(), DeploymentMode::Production, &dir);

        let metadata = service
            .sonify(
                Some("https://example.com/"),
                Some("html_to_sound_trigrams"),
                Some("lofi"),
            )
            .await
            .unwrap();

        let expected = format!(
            "example.com_{}.wav",
            metadata.processing_info.timestamp.timestamp_millis()
        );
        assert_eq!(metadata.audio_url, expected);

        let calls = renderer.recorded();
        assert_eq!(calls[0].slice, "short page");
        assert_eq!(calls[0].variant, "html_to_sound_trigrams");
        assert_eq!(calls[0].preset.as_deref(), Some("lofi"));
        assert_eq!(calls[0].file_name, expected);
    }

    #[tokio::test]
    async fn production_request_sweeps_expired_artifacts() {
        let dir = TempDir::new().unwrap();
        let expired = write_aged(dir.path(), "old.example.com_1.wav", 25 * HOUR);
        let recent = write_aged(dir.path(), "new.example.com_2.wav", HOUR);
        let service = service_with(
            Arc::new(StubFetcher::ok("<html></html>")),
            Arc::new(StubRenderer::ok()),
            DeploymentMode::Production,
            &dir,
        );

        service
            .sonify(Some("https://example.com/"), None, None)
            .await
            .unwrap();

        for _ in 0..100 {
            if !expired.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!expired.exists());
        assert!(recent.exists());
    }

    #[tokio::test]
    async fn development_request_leaves_artifacts_alone() {
        let dir = TempDir::new().unwrap();
        let expired = write_aged(dir.path(), "old.wav", 25 * HOUR);
        let service = service_with(
            Arc::new(StubFetcher::ok("<html></html>")),
            Arc::new(StubRenderer::ok()),
            DeploymentMode::Development,
            &dir,
        );

        service
            .sonify(Some("https://example.com/"), None, None)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(expired.exists());
    }

    #[tokio::test]
    async fn sweep_failure_does_not_affect_the_response() {
        let dir = TempDir::new().unwrap();
        let renderer = Arc::new(StubRenderer::ok());
        let service = service_sweeping(
            Arc::new(StubFetcher::ok("<html></html>")),
            renderer.clone(),
            DeploymentMode::Production,
            dir.path().join("missing"),
        );

        let metadata = service
            .sonify(Some("https://example.com/"), None, None)
            .await
            .unwrap();

        assert!(metadata.audio_url.starts_with("example.com_"));
        assert_eq!(renderer.recorded().len(), 1);

        for _ in 0..100 {
            if !service.sweeper().is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!service.sweeper().is_running());
    }

    #[tokio::test]
    async fn unnameable_url_after_fetch_is_a_processing_error() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::ok("<html></html>"));
        let renderer = Arc::new(StubRenderer::ok());
        let service = service_with(fetcher.clone(), renderer.clone(), DeploymentMode::Development, &dir);

        let err = service.sonify(Some("not a url"), None, None).await.unwrap_err();

        assert!(matches!(err, AppError::AudioProcessingError(_)), "{err:?}");
        assert_eq!(err.status_code().as_u16(), 500);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(renderer.recorded().is_empty());
    }
}
