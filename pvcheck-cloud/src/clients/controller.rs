//! Resource controller client: service instances and resource groups.

use async_trait::async_trait;
use pvcheck_core::provider::{
    Page, ResourceControllerApi, ResourceInstanceQuery, ResourceInstanceRecord,
};
use pvcheck_core::Result;
use serde::Deserialize;

use super::rest::{query_param, segment, RestClient};

#[derive(Debug, Deserialize)]
struct InstanceList {
    #[serde(default)]
    resources: Vec<ResourceInstanceRecord>,
    next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResourceGroup {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ResourceGroupList {
    #[serde(default)]
    resources: Vec<ResourceGroup>,
}

pub struct ControllerClient {
    rest: RestClient,
    /// e.g. `https://resource-controller.cloud.ibm.com`
    base: String,
}

impl ControllerClient {
    pub fn new(rest: RestClient, base: impl Into<String>) -> Self {
        Self {
            rest,
            base: base.into(),
        }
    }
}

#[async_trait]
impl ResourceControllerApi for ControllerClient {
    async fn list_instances(
        &self,
        query: &ResourceInstanceQuery,
    ) -> Result<Page<ResourceInstanceRecord>> {
        let mut q = vec![("limit", query.limit.to_string())];
        if let Some(id) = &query.resource_id {
            q.push(("resource_id", id.clone()));
        }
        if let Some(group) = &query.resource_group_id {
            q.push(("resource_group_id", group.clone()));
        }
        if let Some(start) = &query.start {
            q.push(("start", start.clone()));
        }

        let url = format!("{}/v2/resource_instances", self.base);
        let list: InstanceList = self.rest.get_json(&url, &q).await?;
        Ok(Page {
            items: list.resources,
            next: list.next_url.and_then(|href| query_param(&href, "start")),
        })
    }

    async fn get_instance(&self, guid: &str) -> Result<ResourceInstanceRecord> {
        let url = format!("{}/v2/resource_instances/{}", self.base, segment(guid));
        Ok(self.rest.get_json(&url, &[]).await?)
    }

    async fn resource_group_id(&self, name: &str) -> Result<Option<String>> {
        let url = format!("{}/v2/resource_groups", self.base);
        let list: ResourceGroupList = self
            .rest
            .get_json(&url, &[("name", name.to_string())])
            .await?;
        Ok(list
            .resources
            .into_iter()
            .find(|g| g.name.is_empty() || g.name == name)
            .map(|g| g.id))
    }
}
