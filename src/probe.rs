use futures::future::join_all;

use crate::client::PipelineClient;
use crate::transport::Transport;

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

impl<T: Transport> PipelineClient<T> {
    /// Check whether `url` is fetchable from here. Never fails.
    ///
    /// Issues a HEAD first. Only a transport failure on the HEAD (not a
    /// non-2xx status) falls back to a full GET, since some hosts refuse
    /// HEAD outright.
    pub async fn probe(&self, url: &str) -> bool {
        match self.transport.head(url).await {
            Ok(status) => is_success(status),
            Err(e) => {
                tracing::debug!(url, error = %e, "HEAD probe failed, retrying with GET");
                match self.transport.get(url).await {
                    Ok(status) => is_success(status),
                    Err(e) => {
                        tracing::debug!(url, error = %e, "GET probe failed");
                        false
                    }
                }
            }
        }
    }

    /// Probe several URLs concurrently. Results are in input order.
    pub async fn probe_all<'a, I>(&self, urls: I) -> Vec<bool>
    where
        I: IntoIterator<Item = &'a str>,
    {
        join_all(urls.into_iter().map(|url| self.probe(url))).await
    }
}
