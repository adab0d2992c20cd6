//! Global search client.

use async_trait::async_trait;
use pvcheck_core::provider::{Page, SearchApi, SearchHit};
use pvcheck_core::Result;
use serde::{Deserialize, Serialize};

use super::rest::RestClient;

#[derive(Debug, Serialize)]
struct SearchBody<'a> {
    query: &'a str,
    fields: [&'static str; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    search_cursor: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchHit>,
    search_cursor: Option<String>,
}

pub struct SearchClient {
    rest: RestClient,
    /// e.g. `https://api.global-search-tagging.cloud.ibm.com`
    base: String,
}

impl SearchClient {
    pub fn new(rest: RestClient, base: impl Into<String>) -> Self {
        Self {
            rest,
            base: base.into(),
        }
    }
}

#[async_trait]
impl SearchApi for SearchClient {
    async fn search(&self, query: &str, cursor: Option<&str>, limit: u32) -> Result<Page<SearchHit>> {
        let url = format!("{}/v3/resources/search", self.base);
        let body = SearchBody {
            query,
            fields: ["crn", "name"],
            search_cursor: cursor,
        };
        let response: SearchResponse = self
            .rest
            .post_json(&url, &[("limit", limit.to_string())], &body)
            .await?;

        // The service hands back a cursor even on the last page
        let next = if response.items.is_empty() {
            None
        } else {
            response.search_cursor
        };
        Ok(Page {
            items: response.items,
            next,
        })
    }
}
