//! VPC infrastructure client.

use async_trait::async_trait;
use pvcheck_core::provider::{
    InstanceRecord, LoadBalancerRecord, Page, PoolMember, SubnetRecord, VpcApi, VpcRecord,
};
use pvcheck_core::Result;
use serde::Deserialize;

use super::rest::{query_param, segment, RestClient};

/// API version date sent with every request.
pub const VPC_API_VERSION: &str = "2024-04-30";

#[derive(Debug, Default, Deserialize)]
struct Href {
    href: String,
}

#[derive(Debug, Deserialize)]
struct VpcList {
    #[serde(default)]
    vpcs: Vec<VpcRecord>,
    next: Option<Href>,
}

#[derive(Debug, Deserialize)]
struct SubnetList {
    #[serde(default)]
    subnets: Vec<SubnetRecord>,
}

#[derive(Debug, Deserialize)]
struct LoadBalancerList {
    #[serde(default)]
    load_balancers: Vec<LoadBalancerRecord>,
}

#[derive(Debug, Deserialize)]
struct MemberList {
    #[serde(default)]
    members: Vec<PoolMember>,
}

#[derive(Debug, Deserialize)]
struct InstanceList {
    #[serde(default)]
    instances: Vec<InstanceRecord>,
    next: Option<Href>,
}

pub struct VpcClient {
    rest: RestClient,
    /// e.g. `https://us-south.iaas.cloud.ibm.com/v1`
    base: String,
}

impl VpcClient {
    pub fn new(rest: RestClient, base: impl Into<String>) -> Self {
        Self {
            rest,
            base: base.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    fn query(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut q = vec![
            ("version", VPC_API_VERSION.to_string()),
            ("generation", "2".to_string()),
        ];
        q.extend(extra.iter().cloned());
        q
    }
}

fn paged(start: Option<&str>, limit: u32) -> Vec<(&'static str, String)> {
    let mut q = vec![("limit", limit.to_string())];
    if let Some(start) = start {
        q.push(("start", start.to_string()));
    }
    q
}

fn next_start(next: Option<Href>) -> Option<String> {
    next.and_then(|n| query_param(&n.href, "start"))
}

#[async_trait]
impl VpcApi for VpcClient {
    async fn list_vpcs(&self, start: Option<&str>, limit: u32) -> Result<Page<VpcRecord>> {
        let list: VpcList = self
            .rest
            .get_json(&self.url("vpcs"), &self.query(&paged(start, limit)))
            .await?;
        Ok(Page {
            items: list.vpcs,
            next: next_start(list.next),
        })
    }

    async fn get_vpc(&self, id: &str) -> Result<VpcRecord> {
        let url = self.url(&format!("vpcs/{}", segment(id)));
        Ok(self.rest.get_json(&url, &self.query(&[])).await?)
    }

    async fn list_subnets(&self, vpc_id: &str) -> Result<Vec<SubnetRecord>> {
        let query = self.query(&[("vpc.id", vpc_id.to_string()), ("limit", "100".to_string())]);
        let list: SubnetList = self.rest.get_json(&self.url("subnets"), &query).await?;
        Ok(list.subnets)
    }

    async fn list_load_balancers(&self) -> Result<Vec<LoadBalancerRecord>> {
        let list: LoadBalancerList = self
            .rest
            .get_json(&self.url("load_balancers"), &self.query(&[]))
            .await?;
        Ok(list.load_balancers)
    }

    async fn get_load_balancer(&self, id: &str) -> Result<LoadBalancerRecord> {
        let url = self.url(&format!("load_balancers/{}", segment(id)));
        Ok(self.rest.get_json(&url, &self.query(&[])).await?)
    }

    async fn list_pool_members(&self, lb_id: &str, pool_id: &str) -> Result<Vec<PoolMember>> {
        let url = self.url(&format!(
            "load_balancers/{}/pools/{}/members",
            segment(lb_id),
            segment(pool_id)
        ));
        let list: MemberList = self.rest.get_json(&url, &self.query(&[])).await?;
        Ok(list.members)
    }

    async fn list_instances(&self, start: Option<&str>, limit: u32) -> Result<Page<InstanceRecord>> {
        let list: InstanceList = self
            .rest
            .get_json(&self.url("instances"), &self.query(&paged(start, limit)))
            .await?;
        Ok(Page {
            items: list.instances,
            next: next_start(list.next),
        })
    }

    async fn get_instance(&self, id: &str) -> Result<InstanceRecord> {
        let url = self.url(&format!("instances/{}", segment(id)));
        Ok(self.rest.get_json(&url, &self.query(&[])).await?)
    }
}
