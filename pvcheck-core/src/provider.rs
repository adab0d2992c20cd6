//! Provider ports.
//!
//! The engine talks to the cloud only through these traits. Concrete REST
//! clients live in `pvcheck-cloud`; tests use in-memory fakes. All handles are
//! built once per run and shared read-only through [`CloudContext`].

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::CheckConfig;
use crate::error::{CheckError, Result};
use crate::metadata::Metadata;

// =============================================================================
// Records
// =============================================================================

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Opaque cursor for the next page, `None` on the last page.
    pub next: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VpcRecord {
    pub id: String,
    pub name: String,
    pub crn: String,
    pub health_state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubnetRecord {
    pub id: String,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadBalancerRecord {
    pub id: String,
    pub name: String,
    pub crn: String,
    pub operating_status: String,
    pub pools: Vec<PoolRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolMember {
    pub id: String,
    pub health: String,
}

/// A VPC virtual server instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceRecord {
    pub id: String,
    pub name: String,
    pub crn: String,
    pub health_state: String,
}

/// A resource-controller instance (Power workspace or COS instance).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceInstanceRecord {
    pub guid: String,
    pub name: String,
    pub crn: String,
    pub state: String,
    pub region_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct ResourceInstanceQuery {
    pub resource_id: Option<String>,
    pub resource_group_id: Option<String>,
    pub start: Option<String>,
    pub limit: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitGatewayRecord {
    pub id: String,
    pub name: String,
    pub crn: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionRecord {
    pub id: String,
    pub name: String,
    pub network_type: String,
    pub status: String,
}

/// One hit from the global search service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchHit {
    pub crn: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneRecord {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
}

/// A page of DNS records with the total count reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPage {
    pub records: Vec<DnsRecord>,
    pub total_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectRecord {
    pub key: String,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PvmInstance {
    pub id: String,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DhcpServer {
    pub id: String,
    pub network_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageRecord {
    pub id: String,
    pub name: String,
    pub state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkRecord {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkPort {
    pub id: String,
    pub pvm_instance_id: Option<String>,
}

// =============================================================================
// Ports
// =============================================================================

/// VPC infrastructure service: VPCs, subnets, load balancers and instances.
#[async_trait]
pub trait VpcApi: Send + Sync {
    async fn list_vpcs(&self, start: Option<&str>, limit: u32) -> Result<Page<VpcRecord>>;
    async fn get_vpc(&self, id: &str) -> Result<VpcRecord>;
    async fn list_subnets(&self, vpc_id: &str) -> Result<Vec<SubnetRecord>>;
    async fn list_load_balancers(&self) -> Result<Vec<LoadBalancerRecord>>;
    async fn get_load_balancer(&self, id: &str) -> Result<LoadBalancerRecord>;
    async fn list_pool_members(&self, lb_id: &str, pool_id: &str) -> Result<Vec<PoolMember>>;
    async fn list_instances(&self, start: Option<&str>, limit: u32)
        -> Result<Page<InstanceRecord>>;
    async fn get_instance(&self, id: &str) -> Result<InstanceRecord>;
}

/// Resource controller: service instances and resource groups.
#[async_trait]
pub trait ResourceControllerApi: Send + Sync {
    async fn list_instances(
        &self,
        query: &ResourceInstanceQuery,
    ) -> Result<Page<ResourceInstanceRecord>>;
    async fn get_instance(&self, guid: &str) -> Result<ResourceInstanceRecord>;
    async fn resource_group_id(&self, name: &str) -> Result<Option<String>>;
}

#[async_trait]
pub trait TransitGatewayApi: Send + Sync {
    async fn list_gateways(
        &self,
        start: Option<&str>,
        limit: u32,
    ) -> Result<Page<TransitGatewayRecord>>;
    async fn get_gateway(&self, id: &str) -> Result<TransitGatewayRecord>;
    async fn list_connections(
        &self,
        gateway_id: &str,
        start: Option<&str>,
        limit: u32,
    ) -> Result<Page<ConnectionRecord>>;
}

/// Global search and tagging.
#[async_trait]
pub trait SearchApi: Send + Sync {
    async fn search(
        &self,
        query: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<SearchHit>>;
}

/// DNS zones and records of one CIS instance.
#[async_trait]
pub trait DnsApi: Send + Sync {
    async fn list_zones(&self) -> Result<Vec<ZoneRecord>>;
    async fn get_zone(&self, id: &str) -> Result<ZoneRecord>;
    async fn list_records(&self, zone_id: &str, page: u32, per_page: u32) -> Result<RecordPage>;
}

/// Object storage, addressed by the owning COS instance.
#[async_trait]
pub trait ObjectStorageApi: Send + Sync {
    async fn list_buckets(&self, instance_guid: &str) -> Result<Vec<String>>;
    async fn list_objects(&self, instance_guid: &str, bucket: &str)
        -> Result<Vec<ObjectRecord>>;
}

/// Power Virtual Server workspace client, bound to a single service instance.
#[async_trait]
pub trait PowerApi: Send + Sync {
    async fn list_pvm_instances(&self) -> Result<Vec<PvmInstance>>;
    async fn list_dhcp_servers(&self) -> Result<Vec<DhcpServer>>;
    async fn list_images(&self) -> Result<Vec<ImageRecord>>;
    async fn list_networks(&self) -> Result<Vec<NetworkRecord>>;
    async fn list_network_ports(&self, network_id: &str) -> Result<Vec<NetworkPort>>;
    async fn list_ssh_keys(&self) -> Result<Vec<String>>;
    async fn delete_pvm_instance(&self, id: &str) -> Result<()>;
    async fn delete_dhcp_server(&self, id: &str) -> Result<()>;
    async fn delete_image(&self, id: &str) -> Result<()>;
    async fn delete_network(&self, id: &str) -> Result<()>;
}

/// Builds [`PowerApi`] clients for discovered service instances.
#[async_trait]
pub trait PowerApiFactory: Send + Sync {
    async fn connect(&self, instance: &ResourceInstanceRecord) -> Result<Arc<dyn PowerApi>>;
}

// =============================================================================
// Shared context
// =============================================================================

/// Everything a run shares: metadata, settings and provider handles.
#[derive(Clone)]
pub struct CloudContext {
    pub metadata: Metadata,
    pub config: CheckConfig,
    pub vpc: Arc<dyn VpcApi>,
    pub controller: Arc<dyn ResourceControllerApi>,
    pub transit: Arc<dyn TransitGatewayApi>,
    pub search: Arc<dyn SearchApi>,
    pub dns: Option<Arc<dyn DnsApi>>,
    pub cos: Arc<dyn ObjectStorageApi>,
    pub power: Arc<dyn PowerApiFactory>,
}

impl CloudContext {
    /// Deadline for a call started now.
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.config.call_timeout
    }

    /// Run a provider call under the per-call timeout.
    pub async fn call<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        within(self.deadline(), self.config.call_timeout, fut).await
    }

    pub fn dns(&self) -> Result<&Arc<dyn DnsApi>> {
        self.dns
            .as_ref()
            .ok_or_else(|| CheckError::Setup("no DNS service configured".to_string()))
    }
}

/// Await `fut` unless `deadline` passes first.
pub async fn within<T, F>(
    deadline: Instant,
    budget: std::time::Duration,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout_at(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(CheckError::DeadlineExceeded(budget)),
    }
}
