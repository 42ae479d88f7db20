use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::datetime::datetime_interval;
use crate::error::StacError;
use crate::types::{Item, ItemCollection, Link, SearchRequest};

const DEFAULT_BASE_URL: &str = "https://api.earthobservation.vam.wfp.org/stac";
const DEFAULT_USER_AGENT: &str = "stac-client-rs/0.1";
const PAGE_LIMIT: u32 = 100;
const MAX_PAGES: usize = 50;

/// The request that fetches one page of search results
enum PageRequest {
    Get(String),
    Post(String, serde_json::Value),
}

/// STAC API client
pub struct StacClient {
    client: Client,
    base_url: String,
}

impl StacClient {
    /// Create a new client for the default catalog
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a new client for a custom catalog root
    pub fn with_base_url(base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Search a collection for items intersecting `bbox` at `datetime`
    ///
    /// Calendar dates are widened to the interval they cover. Follows "next"
    /// links until the catalog stops advertising one.
    pub async fn search(
        &self,
        collection: &str,
        bbox: [f64; 4],
        datetime: &str,
    ) -> crate::Result<Vec<Item>> {
        let datetime = datetime_interval(datetime);
        let body = serde_json::to_value(SearchRequest {
            collections: vec![collection],
            bbox,
            datetime: &datetime,
            limit: PAGE_LIMIT,
        })?;

        let mut request = PageRequest::Post(format!("{}/search", self.base_url), body);
        let mut items = Vec::new();

        for page_number in 1..=MAX_PAGES {
            let page = self.fetch_page(&request).await?;
            debug!(
                collection,
                page = page_number,
                items = page.features.len(),
                "Fetched STAC search page"
            );

            let next = page.next_link().cloned();
            items.extend(page.features);

            match next {
                Some(link) => request = next_request(&request, link),
                None => return Ok(items),
            }
        }

        warn!(collection, max_pages = MAX_PAGES, "STAC search truncated");
        Ok(items)
    }

    async fn fetch_page(&self, request: &PageRequest) -> crate::Result<ItemCollection> {
        let builder = match request {
            PageRequest::Get(url) => self.client.get(url),
            PageRequest::Post(url, body) => self.client.post(url).json(body),
        };

        let response = builder
            .header("Accept", "application/geo+json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StacError::ApiError(format!(
                "STAC API returned status {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    /// Stream an asset to `dest`, returning the number of bytes written
    pub async fn download_asset(&self, href: &str, dest: &Path) -> crate::Result<u64> {
        let mut response = self.client.get(href).send().await?;

        if !response.status().is_success() {
            return Err(StacError::ApiError(format!(
                "Asset download returned status {}",
                response.status()
            )));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(href, bytes = written, "Downloaded asset");
        Ok(written)
    }
}

impl Default for StacClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the request for the page a "next" link points to
fn next_request(previous: &PageRequest, link: Link) -> PageRequest {
    let is_post = link
        .method
        .as_deref()
        .map(|m| m.eq_ignore_ascii_case("POST"))
        .unwrap_or(false);

    if !is_post {
        return PageRequest::Get(link.href);
    }

    let previous_body = match previous {
        PageRequest::Post(_, body) => Some(body),
        PageRequest::Get(_) => None,
    };

    let body = match (link.body, previous_body) {
        (Some(serde_json::Value::Object(update)), Some(serde_json::Value::Object(base)))
            if link.merge =>
        {
            let mut merged = base.clone();
            merged.extend(update);
            serde_json::Value::Object(merged)
        }
        (Some(body), _) => body,
        (None, Some(body)) => body.clone(),
        (None, None) => serde_json::Value::Object(Default::default()),
    };

    PageRequest::Post(link.href, body)
}
