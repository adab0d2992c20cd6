//! CIS DNS client, bound to one CIS instance.

use async_trait::async_trait;
use pvcheck_core::provider::{DnsApi, DnsRecord, RecordPage, ZoneRecord};
use pvcheck_core::Result;
use serde::Deserialize;

use super::rest::{segment, RestClient};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
    #[serde(default)]
    result_info: ResultInfo,
}

#[derive(Debug, Default, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_count: u32,
}

pub struct DnsClient {
    rest: RestClient,
    /// `{cis}/v1/{crn}`
    base: String,
}

impl DnsClient {
    /// `cis` is the service root, e.g. `https://api.cis.cloud.ibm.com`.
    pub fn new(rest: RestClient, cis: &str, instance_crn: &str) -> Self {
        Self {
            rest,
            base: format!("{}/v1/{}", cis, segment(instance_crn)),
        }
    }
}

#[async_trait]
impl DnsApi for DnsClient {
    async fn list_zones(&self) -> Result<Vec<ZoneRecord>> {
        let url = format!("{}/zones", self.base);
        let envelope: Envelope<Vec<ZoneRecord>> = self.rest.get_json(&url, &[]).await?;
        Ok(envelope.result)
    }

    async fn get_zone(&self, id: &str) -> Result<ZoneRecord> {
        let url = format!("{}/zones/{}", self.base, segment(id));
        let envelope: Envelope<ZoneRecord> = self.rest.get_json(&url, &[]).await?;
        Ok(envelope.result)
    }

    async fn list_records(&self, zone_id: &str, page: u32, per_page: u32) -> Result<RecordPage> {
        let url = format!("{}/zones/{}/dns_records", self.base, segment(zone_id));
        let query = [("page", page.to_string()), ("per_page", per_page.to_string())];
        let envelope: Envelope<Vec<DnsRecord>> = self.rest.get_json(&url, &query).await?;
        Ok(RecordPage {
            records: envelope.result,
            total_count: envelope.result_info.total_count,
        })
    }
}
