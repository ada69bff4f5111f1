use async_trait::async_trait;
use reqwest::{Request, Response};

/// Seam between the source loader and the network, so tests can swap in a canned client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
