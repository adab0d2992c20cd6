//! Power Virtual Server workspace client.
//!
//! Every request carries the workspace CRN; the SSH key listing is scoped to
//! the account (tenant) instead of the workspace.

use std::sync::Arc;

use async_trait::async_trait;
use pvcheck_core::provider::{
    DhcpServer, ImageRecord, NetworkPort, NetworkRecord, PowerApi, PowerApiFactory, PvmInstance,
    ResourceInstanceRecord,
};
use pvcheck_core::Result;
use serde::Deserialize;
use tracing::debug;

use super::rest::{segment, RestClient};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PvmInstanceList {
    #[serde(default)]
    pvm_instances: Vec<PvmInstanceJson>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PvmInstanceJson {
    #[serde(rename = "pvmInstanceID")]
    id: String,
    #[serde(default)]
    server_name: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct DhcpJson {
    id: String,
    #[serde(default)]
    network: Option<NamedRef>,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ImageList {
    #[serde(default)]
    images: Vec<ImageJson>,
}

#[derive(Debug, Deserialize)]
struct ImageJson {
    #[serde(rename = "imageID")]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    state: String,
}

#[derive(Debug, Deserialize)]
struct NetworkList {
    #[serde(default)]
    networks: Vec<NetworkJson>,
}

#[derive(Debug, Deserialize)]
struct NetworkJson {
    #[serde(rename = "networkID")]
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct PortList {
    #[serde(default)]
    ports: Vec<PortJson>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PortJson {
    #[serde(rename = "portID")]
    id: String,
    #[serde(default)]
    pvm_instance: Option<PortInstance>,
}

#[derive(Debug, Deserialize)]
struct PortInstance {
    #[serde(rename = "pvmInstanceID")]
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SshKeyList {
    #[serde(default)]
    ssh_keys: Vec<NamedRef>,
}

/// Account id from a CRN: the scope segment `a/{account}`.
pub fn tenant_of(crn: &str) -> std::result::Result<String, ApiError> {
    crn.split(':')
        .nth(6)
        .and_then(|scope| scope.strip_prefix("a/"))
        .filter(|account| !account.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::Decode(format!("no account in CRN {}", crn)))
}

pub struct PowerClient {
    rest: RestClient,
    /// `{root}/pcloud/v1/cloud-instances/{guid}`
    base: String,
    /// `{root}/pcloud/v1/tenants/{tenant}`
    tenant: String,
}

impl PowerClient {
    /// `root` is the regional service root, e.g. `https://dal.power-iaas.cloud.ibm.com`.
    pub fn new(rest: RestClient, root: &str, instance: &ResourceInstanceRecord) -> std::result::Result<Self, ApiError> {
        let tenant = tenant_of(&instance.crn)?;
        Ok(Self {
            rest: rest.with_header("CRN", instance.crn.clone()),
            base: format!("{}/pcloud/v1/cloud-instances/{}", root, segment(&instance.guid)),
            tenant: format!("{}/pcloud/v1/tenants/{}", root, segment(&tenant)),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }
}

#[async_trait]
impl PowerApi for PowerClient {
    async fn list_pvm_instances(&self) -> Result<Vec<PvmInstance>> {
        let list: PvmInstanceList = self.rest.get_json(&self.url("pvm-instances"), &[]).await?;
        Ok(list
            .pvm_instances
            .into_iter()
            .map(|p| PvmInstance {
                id: p.id,
                name: p.server_name,
                status: p.status,
            })
            .collect())
    }

    async fn list_dhcp_servers(&self) -> Result<Vec<DhcpServer>> {
        let list: Vec<DhcpJson> = self.rest.get_json(&self.url("services/dhcp"), &[]).await?;
        Ok(list
            .into_iter()
            .map(|d| DhcpServer {
                id: d.id,
                network_name: d.network.map(|n| n.name).unwrap_or_default(),
            })
            .collect())
    }

    async fn list_images(&self) -> Result<Vec<ImageRecord>> {
        let list: ImageList = self.rest.get_json(&self.url("images"), &[]).await?;
        Ok(list
            .images
            .into_iter()
            .map(|i| ImageRecord {
                id: i.id,
                name: i.name,
                state: i.state,
            })
            .collect())
    }

    async fn list_networks(&self) -> Result<Vec<NetworkRecord>> {
        let list: NetworkList = self.rest.get_json(&self.url("networks"), &[]).await?;
        Ok(list
            .networks
            .into_iter()
            .map(|n| NetworkRecord {
                id: n.id,
                name: n.name,
            })
            .collect())
    }

    async fn list_network_ports(&self, network_id: &str) -> Result<Vec<NetworkPort>> {
        let url = self.url(&format!("networks/{}/ports", segment(network_id)));
        let list: PortList = self.rest.get_json(&url, &[]).await?;
        Ok(list
            .ports
            .into_iter()
            .map(|p| NetworkPort {
                id: p.id,
                pvm_instance_id: p.pvm_instance.map(|i| i.id),
            })
            .collect())
    }

    async fn list_ssh_keys(&self) -> Result<Vec<String>> {
        let url = format!("{}/sshkeys", self.tenant);
        let list: SshKeyList = self.rest.get_json(&url, &[]).await?;
        Ok(list.ssh_keys.into_iter().map(|k| k.name).collect())
    }

    async fn delete_pvm_instance(&self, id: &str) -> Result<()> {
        debug!(id, "deleting PVM instance");
        Ok(self
            .rest
            .delete(&self.url(&format!("pvm-instances/{}", segment(id))))
            .await?)
    }

    async fn delete_dhcp_server(&self, id: &str) -> Result<()> {
        debug!(id, "deleting DHCP server");
        Ok(self
            .rest
            .delete(&self.url(&format!("services/dhcp/{}", segment(id))))
            .await?)
    }

    async fn delete_image(&self, id: &str) -> Result<()> {
        debug!(id, "deleting image");
        Ok(self
            .rest
            .delete(&self.url(&format!("images/{}", segment(id))))
            .await?)
    }

    async fn delete_network(&self, id: &str) -> Result<()> {
        debug!(id, "deleting network");
        Ok(self
            .rest
            .delete(&self.url(&format!("networks/{}", segment(id))))
            .await?)
    }
}

/// Builds workspace clients against one regional service root.
pub struct PowerClientFactory {
    rest: RestClient,
    root: String,
}

impl PowerClientFactory {
    pub fn new(rest: RestClient, root: impl Into<String>) -> Self {
        Self {
            rest,
            root: root.into(),
        }
    }
}

#[async_trait]
impl PowerApiFactory for PowerClientFactory {
    async fn connect(&self, instance: &ResourceInstanceRecord) -> Result<Arc<dyn PowerApi>> {
        let client = PowerClient::new(self.rest.clone(), &self.root, instance)?;
        Ok(Arc::new(client))
    }
}
