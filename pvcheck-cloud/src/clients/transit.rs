//! Transit gateway client.

use async_trait::async_trait;
use pvcheck_core::provider::{ConnectionRecord, Page, TransitGatewayApi, TransitGatewayRecord};
use pvcheck_core::Result;
use serde::Deserialize;

use super::rest::{segment, RestClient};

pub const TRANSIT_API_VERSION: &str = "2024-01-01";

#[derive(Debug, Deserialize)]
struct Next {
    start: String,
}

#[derive(Debug, Deserialize)]
struct GatewayList {
    #[serde(default)]
    transit_gateways: Vec<TransitGatewayRecord>,
    next: Option<Next>,
}

#[derive(Debug, Deserialize)]
struct ConnectionList {
    #[serde(default)]
    connections: Vec<ConnectionRecord>,
    next: Option<Next>,
}

pub struct TransitClient {
    rest: RestClient,
    /// e.g. `https://transit.cloud.ibm.com/v1`
    base: String,
}

impl TransitClient {
    pub fn new(rest: RestClient, base: impl Into<String>) -> Self {
        Self {
            rest,
            base: base.into(),
        }
    }
}

fn query(start: Option<&str>, limit: Option<u32>) -> Vec<(&'static str, String)> {
    let mut q = vec![("version", TRANSIT_API_VERSION.to_string())];
    if let Some(limit) = limit {
        q.push(("limit", limit.to_string()));
    }
    if let Some(start) = start {
        q.push(("start", start.to_string()));
    }
    q
}

#[async_trait]
impl TransitGatewayApi for TransitClient {
    async fn list_gateways(
        &self,
        start: Option<&str>,
        limit: u32,
    ) -> Result<Page<TransitGatewayRecord>> {
        let url = format!("{}/transit_gateways", self.base);
        let list: GatewayList = self.rest.get_json(&url, &query(start, Some(limit))).await?;
        Ok(Page {
            items: list.transit_gateways,
            next: list.next.map(|n| n.start),
        })
    }

    async fn get_gateway(&self, id: &str) -> Result<TransitGatewayRecord> {
        let url = format!("{}/transit_gateways/{}", self.base, segment(id));
        Ok(self.rest.get_json(&url, &query(None, None)).await?)
    }

    async fn list_connections(
        &self,
        gateway_id: &str,
        start: Option<&str>,
        limit: u32,
    ) -> Result<Page<ConnectionRecord>> {
        let url = format!(
            "{}/transit_gateways/{}/connections",
            self.base,
            segment(gateway_id)
        );
        let list: ConnectionList = self.rest.get_json(&url, &query(start, Some(limit))).await?;
        Ok(Page {
            items: list.connections,
            next: list.next.map(|n| n.start),
        })
    }
}
