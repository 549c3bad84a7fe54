use crate::config::PipelineConfig;
use crate::transport::{HttpTransport, Transport};

/// Async client for the remote caption pipeline.
///
/// Each stage of a run lives in its own module as an `impl` block on this
/// type: [`probe`](crate::probe), [`upload`](crate::upload),
/// [`register`](crate::register), [`generate`](crate::generate) and
/// [`poll`](crate::poll).
///
/// # Example
/// ```no_run
/// use caption_runner::PipelineClient;
///
/// # async fn example() -> caption_runner::Result<()> {
/// let client = PipelineClient::new();
/// let reachable = client.probe("https://picsum.photos/seed/humor-1/800/600").await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PipelineClient<T = HttpTransport> {
    pub(crate) transport: T,
    pub(crate) config: PipelineConfig,
}

impl PipelineClient<HttpTransport> {
    /// Client for the production pipeline over `reqwest`.
    pub fn new() -> Self {
        Self::with_transport(HttpTransport::new())
    }
}

impl Default for PipelineClient<HttpTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> PipelineClient<T> {
    /// Client over a custom transport, with default configuration.
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}
