//! # caption-runner
//!
//! Async orchestrator for test runs of a multi-step, LLM-driven caption
//! pipeline. Given a humor flavor and either an uploaded file or stored
//! image URLs, it drives each image through the remote pipeline and tracks
//! the outcome of every run.
//!
//! ## Features
//!
//! - **Upload**: content-type validation, presigned PUT, public CDN URL
//! - **Registration**: turns any public image URL into a pipeline image id
//! - **Generation with fallback**: a 400/422 on the flavor parameter is
//!   retried once without it, and the run is flagged
//! - **Bounded polling**: 20 attempts at 1.5s, with a distinct soft
//!   timeout when the job is still processing
//! - **Defensive parsing**: strings, `{content}` objects, and unknown item
//!   shapes all normalize to display text
//! - **Per-run isolation**: one image's failure never stops the batch
//! - **Reachability probing**: HEAD first, GET on transport failure
//!
//! ## Quick Start
//!
//! ```no_run
//! use caption_runner::*;
//!
//! #[tokio::main]
//! async fn main() {
//!     let orchestrator = Orchestrator::new(
//!         PipelineClient::new(),
//!         HttpFlavorValidator::new("http://localhost:3000"),
//!         StaticSession::new("bearer-token"),
//!     );
//!
//!     let request = InvocationRequest::new(42).with_images(vec![
//!         StoredImage::new(1, "https://picsum.photos/seed/humor-1/800/600"),
//!         StoredImage::new(2, "https://picsum.photos/seed/humor-2/800/600"),
//!     ]);
//!
//!     let report = orchestrator
//!         .invoke_with_progress(request, |event| {
//!             if let RunEvent::PollAttempt { attempt, max_attempts, .. } = event {
//!                 println!("Generating captions... (attempt {}/{})", attempt, max_attempts);
//!             }
//!         })
//!         .await;
//!
//!     for run in &report.runs {
//!         println!("{} {:?} {:?}", run.image_url, run.status, run.captions);
//!     }
//! }
//! ```

pub mod client;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod generate;
pub mod normalize;
pub mod orchestrator;
pub mod poll;
pub mod probe;
pub mod register;
pub mod selection;
pub mod tracker;
pub mod transport;
pub mod types;
pub mod upload;

pub use client::PipelineClient;
pub use collaborators::{HttpFlavorValidator, StaticSession};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use error::{CaptionError, ErrorKind, Result};
pub use generate::{Attempt, Generation, GenerationOutcome};
pub use normalize::{normalize_captions, CaptionItem};
pub use orchestrator::{InvocationReport, InvocationRequest, Orchestrator};
pub use poll::PollResult;
pub use selection::{ImageCatalog, Selection};
pub use tracker::{RunHandle, RunTracker};
pub use transport::{HttpTransport, Transport};
pub use types::{
    DebugStep, FlavorId, FlavorReadiness, GenerationDiagnostics, ImageFile, ImageSource,
    Presigned, RawResponse, RunEvent, RunRecord, RunSource, RunStatus, StoredImage,
};

/// Flavor step-count check consulted before every invocation.
///
/// A flavor is usable only if it has at least one step. The orchestrator
/// calls this immediately before generation even when an earlier check
/// passed, since steps can change while the console is open.
///
/// # Example
///
/// ```ignore
/// use caption_runner::*;
///
/// struct AlwaysReady;
///
/// impl FlavorValidator for AlwaysReady {
///     async fn check_steps(&self, _flavor_id: FlavorId) -> FlavorReadiness {
///         FlavorReadiness::Ready
///     }
/// }
/// ```
pub trait FlavorValidator: Send + Sync {
    fn check_steps(
        &self,
        flavor_id: FlavorId,
    ) -> impl std::future::Future<Output = FlavorReadiness> + Send;
}

/// Source of the bearer credential for pipeline calls.
///
/// Fetched once per invocation and reused for every stage of every run.
/// Return [`CaptionError::NoActiveSession`] when no valid credential exists.
pub trait SessionProvider: Send + Sync {
    fn access_token(&self) -> impl std::future::Future<Output = Result<String>> + Send;
}
