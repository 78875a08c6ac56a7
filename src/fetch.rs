use crate::error::{CrawlError, FetchError};
use reqwest::Client;
use std::time::Duration;

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync + 'static {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Production fetcher over one shared reqwest client with a per-request
/// timeout. The body is returned whatever the status code says; only
/// transport failures (dns, connect, timeout) count as fetch failures.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, CrawlError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        Ok(response.text().await?)
    }
}
