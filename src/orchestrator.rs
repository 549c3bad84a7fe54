use crate::client::PipelineClient;
use crate::error::{CaptionError, ErrorKind, Result};
use crate::generate::GenerationOutcome;
use crate::tracker::{RunHandle, RunTracker};
use crate::transport::Transport;
use crate::types::{
    DebugStep, FlavorId, FlavorReadiness, GenerationDiagnostics, ImageFile, ImageSource,
    RawResponse, RunEvent, RunRecord, RunSource, StoredImage,
};
use crate::{FlavorValidator, SessionProvider};

/// Everything one "generate captions" action needs.
#[derive(Debug, Clone, Default)]
pub struct InvocationRequest {
    pub flavor_id: Option<FlavorId>,
    /// Readiness from an earlier UI-level check, if one ran.
    pub cached_readiness: Option<FlavorReadiness>,
    pub source: ImageSource,
}

impl InvocationRequest {
    pub fn new(flavor_id: FlavorId) -> Self {
        Self {
            flavor_id: Some(flavor_id),
            ..Default::default()
        }
    }

    pub fn with_file(mut self, file: ImageFile) -> Self {
        self.source = ImageSource::File(file);
        self
    }

    pub fn with_images(mut self, images: Vec<StoredImage>) -> Self {
        self.source = ImageSource::Stored(images);
        self
    }

    pub fn with_cached_readiness(mut self, readiness: FlavorReadiness) -> Self {
        self.cached_readiness = Some(readiness);
        self
    }
}

/// Everything an invocation produced, for the presentation layer.
#[derive(Debug, Clone, Default)]
pub struct InvocationReport {
    /// One record per attempted image, in processing order.
    pub runs: Vec<RunRecord>,
    /// Captions of all successful runs, in completion order.
    pub captions: Vec<String>,
    /// Failure that aborted the whole invocation.
    pub error: Option<CaptionError>,
    /// Top-level banner text.
    pub banner: Option<String>,
    /// Non-fatal warning, set when the flavor parameter was rejected.
    pub warning: Option<String>,
    pub debug_steps: Vec<DebugStep>,
    pub last_generation: Option<GenerationDiagnostics>,
}

impl InvocationReport {
    fn aborted(error: CaptionError) -> Self {
        let mut report = Self::default();
        report.abort(error);
        report
    }

    fn abort(&mut self, error: CaptionError) {
        self.banner = Some(error.user_message());
        self.error = Some(error);
    }

    pub fn is_aborted(&self) -> bool {
        self.error.is_some()
    }

    pub fn succeeded(&self) -> usize {
        self.runs
            .iter()
            .filter(|r| r.status == crate::RunStatus::Success)
            .count()
    }
}

/// Mutable state of one invocation while runs execute.
#[derive(Default)]
struct Invocation {
    tracker: RunTracker,
    report: InvocationReport,
}

impl Invocation {
    fn record_generation(&mut self, image_id: &str, resp: Option<&RawResponse>) {
        self.report.last_generation = Some(GenerationDiagnostics {
            image_id: image_id.to_string(),
            status: resp.map(|r| r.status),
            body: resp.map(|r| r.body.clone()),
        });
    }

    fn settle_failure<F>(
        &mut self,
        handle: RunHandle,
        error: &CaptionError,
        image_id: Option<String>,
        flavor_rejected: bool,
        stage: &str,
        on_event: &mut F,
    ) where
        F: FnMut(RunEvent),
    {
        let image_url = self.tracker.get(handle).map(|r| r.image_url.clone());
        let debug = error.debug_step(image_url.as_deref()).map(|mut step| {
            step.step = stage.to_string();
            step
        });
        if let Some(step) = &debug {
            self.report.debug_steps.push(step.clone());
        }
        if error.is_soft() {
            self.report.banner = Some(error.user_message());
        }
        self.tracker
            .fail(handle, error, image_id, flavor_rejected, debug);
        self.emit_settled(handle, on_event);
    }

    fn settle_success<F>(
        &mut self,
        handle: RunHandle,
        captions: Vec<String>,
        image_id: String,
        flavor_rejected: bool,
        on_event: &mut F,
    ) where
        F: FnMut(RunEvent),
    {
        self.tracker
            .succeed(handle, captions, Some(image_id), flavor_rejected);
        self.emit_settled(handle, on_event);
    }

    fn emit_settled<F>(&self, handle: RunHandle, on_event: &mut F)
    where
        F: FnMut(RunEvent),
    {
        if let Some(record) = self.tracker.get(handle) {
            tracing::info!(
                run_id = %record.id,
                image_url = %record.image_url,
                status = ?record.status,
                captions = record.captions.len(),
                error = record.error.as_deref().unwrap_or(""),
                "run settled"
            );
            on_event(RunEvent::RunSettled(record.clone()));
        }
    }

    fn finish(self) -> InvocationReport {
        let (runs, captions) = self.tracker.into_parts();
        InvocationReport {
            runs,
            captions,
            ..self.report
        }
    }
}

/// A validated, non-empty image source.
enum Work {
    File(ImageFile),
    Batch(Vec<StoredImage>),
}

impl Work {
    fn from_source(source: ImageSource) -> Result<Self> {
        match source {
            ImageSource::File(file) => Ok(Work::File(file)),
            ImageSource::Stored(images) if !images.is_empty() => Ok(Work::Batch(images)),
            ImageSource::Stored(_) | ImageSource::None => Err(CaptionError::NoImageSource),
        }
    }
}

/// Drives caption runs for one image source through the remote pipeline.
///
/// Runs execute strictly one at a time in selection order. A failed run is
/// captured in its own record and never stops the rest of the batch; only
/// precondition, credential, and upload failures abort an invocation.
///
/// # Example
/// ```no_run
/// use caption_runner::*;
///
/// # async fn example() {
/// let orchestrator = Orchestrator::new(
///     PipelineClient::new(),
///     HttpFlavorValidator::new("http://localhost:3000"),
///     StaticSession::new("bearer-token"),
/// );
/// let report = orchestrator
///     .invoke(InvocationRequest::new(12).with_images(vec![
///         StoredImage::new(1, "https://picsum.photos/seed/humor-1/800/600"),
///     ]))
///     .await;
/// for caption in &report.captions {
///     println!("{}", caption);
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Orchestrator<T, V, S> {
    client: PipelineClient<T>,
    validator: V,
    session: S,
}

impl<T, V, S> Orchestrator<T, V, S>
where
    T: Transport,
    V: FlavorValidator,
    S: SessionProvider,
{
    pub fn new(client: PipelineClient<T>, validator: V, session: S) -> Self {
        Self {
            client,
            validator,
            session,
        }
    }

    pub fn client(&self) -> &PipelineClient<T> {
        &self.client
    }

    /// Run one invocation without progress reporting.
    pub async fn invoke(&self, request: InvocationRequest) -> InvocationReport {
        self.invoke_with_progress(request, |_| {}).await
    }

    /// Run one invocation, reporting run lifecycle events to `on_event`.
    ///
    /// Each call starts from an empty run history; nothing carries over from
    /// a previous invocation.
    pub async fn invoke_with_progress<F>(
        &self,
        request: InvocationRequest,
        mut on_event: F,
    ) -> InvocationReport
    where
        F: FnMut(RunEvent),
    {
        let (flavor_id, bearer, work) = match self.preflight(request).await {
            Ok(ready) => ready,
            Err(e) => {
                tracing::warn!(error = %e, "invocation rejected before any run");
                return InvocationReport::aborted(e);
            }
        };

        let mut inv = Invocation::default();
        match work {
            Work::File(file) => {
                tracing::info!(flavor_id, file = %file.name, "starting file invocation");
                match self.client.upload(&bearer, &file).await {
                    Ok(cdn_url) => {
                        self.run_for_url(
                            &mut inv,
                            &bearer,
                            flavor_id,
                            &cdn_url,
                            RunSource::File,
                            &mut on_event,
                        )
                        .await
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "upload failed, no run created");
                        if let Some(mut step) = e.debug_step(None) {
                            if e.kind() == ErrorKind::Network {
                                step.step = "upload".to_string();
                            }
                            inv.report.debug_steps.push(step);
                        }
                        inv.report.abort(e);
                    }
                }
            }
            Work::Batch(images) => {
                tracing::info!(flavor_id, images = images.len(), "starting batch invocation");
                for image in &images {
                    if !self.client.probe(&image.url).await {
                        tracing::warn!(image_id = image.id, url = %image.url, "image unreachable, skipping");
                        let error = CaptionError::Unreachable {
                            url: image.url.clone(),
                        };
                        inv.report.banner = Some(error.user_message());
                        let handle = inv
                            .tracker
                            .reject(RunSource::StoredImage, &image.url, &error);
                        inv.emit_settled(handle, &mut on_event);
                        continue;
                    }
                    self.run_for_url(
                        &mut inv,
                        &bearer,
                        flavor_id,
                        &image.url,
                        RunSource::StoredImage,
                        &mut on_event,
                    )
                    .await;
                }
            }
        }

        let report = inv.finish();
        tracing::info!(
            runs = report.runs.len(),
            succeeded = report.succeeded(),
            captions = report.captions.len(),
            aborted = report.is_aborted(),
            "invocation finished"
        );
        report
    }

    /// Check every invocation-wide precondition and fetch the credential.
    async fn preflight(&self, request: InvocationRequest) -> Result<(FlavorId, String, Work)> {
        let flavor_id = request.flavor_id.ok_or(CaptionError::NoFlavorSelected)?;

        if let Some(FlavorReadiness::NotReady(msg)) = &request.cached_readiness {
            return Err(CaptionError::FlavorNotReady(msg.clone()));
        }
        // Steps may have changed since the cached check; always re-verify.
        if let FlavorReadiness::NotReady(msg) = self.validator.check_steps(flavor_id).await {
            return Err(CaptionError::FlavorNotReady(msg));
        }

        let work = Work::from_source(request.source)?;

        let bearer = self.session.access_token().await?;
        Ok((flavor_id, bearer, work))
    }

    /// Register, generate, and if needed poll for one image URL.
    async fn run_for_url<F>(
        &self,
        inv: &mut Invocation,
        bearer: &str,
        flavor_id: FlavorId,
        image_url: &str,
        source: RunSource,
        on_event: &mut F,
    ) where
        F: FnMut(RunEvent),
    {
        let handle = inv.tracker.begin(source, image_url);
        let run_id = inv
            .tracker
            .get(handle)
            .map(|r| r.id.clone())
            .unwrap_or_default();
        on_event(RunEvent::RunStarted {
            run_id: run_id.clone(),
            image_url: image_url.to_string(),
        });

        let image_id = match self.client.register(bearer, image_url).await {
            Ok(id) => id,
            Err(e) => {
                inv.settle_failure(handle, &e, None, false, "upload-image-from-url", on_event);
                return;
            }
        };

        let generation = self.client.generate(bearer, &image_id, Some(flavor_id)).await;
        inv.record_generation(&image_id, generation.last_response.as_ref());
        let flavor_rejected = generation.flavor_rejected();
        if let Some(body) = &generation.rejection {
            inv.report.warning = Some(format!(
                "Flavor parameter rejected by API, retrying without it. ({})",
                body
            ));
            on_event(RunEvent::FlavorRejected {
                run_id: run_id.clone(),
                body: body.clone(),
            });
        }

        let (captions, polled) = match generation.outcome {
            Ok(GenerationOutcome::Results(captions)) => (Ok(captions), false),
            Ok(GenerationOutcome::Pending) => {
                let max_attempts = self.client.config().max_poll_attempts;
                let poll = self
                    .client
                    .poll_captions(bearer, &image_id, |attempt| {
                        on_event(RunEvent::PollAttempt {
                            run_id: run_id.clone(),
                            attempt,
                            max_attempts,
                        })
                    })
                    .await;
                if poll.last_response.is_some() {
                    inv.record_generation(&image_id, poll.last_response.as_ref());
                }
                (poll.outcome, true)
            }
            Err(e) => (Err(e), false),
        };

        match captions {
            Ok(captions) => {
                inv.settle_success(handle, captions, image_id, flavor_rejected, on_event)
            }
            Err(e) => {
                let stage = if polled {
                    "generate-captions (poll)"
                } else {
                    "generate-captions"
                };
                inv.settle_failure(
                    handle,
                    &e,
                    Some(image_id),
                    flavor_rejected,
                    stage,
                    on_event,
                );
            }
        }
    }
}
