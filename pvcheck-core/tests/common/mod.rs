//! In-memory cloud for pvcheck-core integration tests.
//!
//! `FakeCloud::healthy()` describes a freshly installed cluster `c1` with
//! infrastructure id `c1-x7k2p` in `example.com`; tests mutate the public
//! fields before wrapping it in an `Arc`.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pvcheck_core::discovery::{COS_RESOURCE_ID, POWER_IAAS_RESOURCE_ID};
use pvcheck_core::metadata::CreateMetadata;
use pvcheck_core::provider::*;
use pvcheck_core::{CheckConfig, CheckError, Metadata, Result};
use serde_json::json;

pub const CLUSTER: &str = "c1";
pub const INFRA_ID: &str = "c1-x7k2p";
pub const BASE_DOMAIN: &str = "example.com";

#[derive(Debug, Clone, Default)]
pub struct FakeCloud {
    pub vpcs: Vec<VpcRecord>,
    pub subnets: Vec<SubnetRecord>,
    pub load_balancers: Vec<LoadBalancerRecord>,
    /// Pool id -> members.
    pub members: HashMap<String, Vec<PoolMember>>,
    pub instances: Vec<InstanceRecord>,
    /// (resource id, instance).
    pub resource_instances: Vec<(String, ResourceInstanceRecord)>,
    /// (name, id).
    pub resource_groups: Vec<(String, String)>,
    pub gateways: Vec<TransitGatewayRecord>,
    pub connections: Vec<ConnectionRecord>,
    /// (query marker, hit): a hit is returned when its marker occurs in the query.
    pub hits: Vec<(String, SearchHit)>,
    pub zones: Vec<ZoneRecord>,
    pub records: Vec<DnsRecord>,
    pub buckets: Vec<String>,
    pub objects: Vec<ObjectRecord>,
    pub pvm_instances: Vec<PvmInstance>,
    pub dhcp_servers: Vec<DhcpServer>,
    pub images: Vec<ImageRecord>,
    pub networks: Vec<NetworkRecord>,
    pub ports: HashMap<String, Vec<NetworkPort>>,
    pub ssh_keys: Vec<String>,
    /// Ids whose delete call fails.
    pub failing_deletes: HashSet<String>,
    /// Load balancer ids whose lookup fails.
    pub failing_lookups: HashSet<String>,
    /// Delay applied to every VPC listing page.
    pub list_delay: Option<Duration>,
    pub deleted: Arc<Mutex<Vec<String>>>,
}

impl FakeCloud {
    pub fn healthy() -> Self {
        let mut cloud = FakeCloud {
            vpcs: vec![
                vpc("vpc-0", "vpc-other"),
                vpc("vpc-1", &format!("vpc-{}", CLUSTER)),
            ],
            subnets: (1..=3)
                .map(|i| SubnetRecord {
                    id: format!("sn-{}", i),
                    name: format!("{}-subnet-{}", INFRA_ID, i),
                    status: "available".to_string(),
                })
                .collect(),
            load_balancers: vec![
                load_balancer(
                    "lb-int",
                    &format!("{}-loadbalancer-int", CLUSTER),
                    &[("p1", "pool-6443"), ("p2", "machine-config-server")],
                ),
                load_balancer(
                    "lb-ext",
                    &format!("{}-loadbalancer", CLUSTER),
                    &[("p3", "pool-6443")],
                ),
                load_balancer(
                    "lb-kube",
                    &format!("kube-{}-ab12", CLUSTER),
                    &[("p4", "tcp-80"), ("p5", "tcp-443")],
                ),
            ],
            resource_instances: vec![
                (
                    POWER_IAAS_RESOURCE_ID.to_string(),
                    ResourceInstanceRecord {
                        guid: "si-1".to_string(),
                        name: format!("{}-power-iaas", CLUSTER),
                        crn: "crn:v1:bluemix:public:power-iaas:dal10:a/acct:si-1::".to_string(),
                        state: "active".to_string(),
                        region_id: "dal10".to_string(),
                    },
                ),
                (
                    COS_RESOURCE_ID.to_string(),
                    ResourceInstanceRecord {
                        guid: "cos-1".to_string(),
                        name: format!("{}-cos", INFRA_ID),
                        crn: "crn:v1:bluemix:public:cloud-object-storage:global:a/acct:cos-1::"
                            .to_string(),
                        state: "active".to_string(),
                        region_id: "global".to_string(),
                    },
                ),
            ],
            resource_groups: vec![("rg1".to_string(), "rg-id-1".to_string())],
            gateways: vec![TransitGatewayRecord {
                id: "tg-1".to_string(),
                name: format!("{}-tg", INFRA_ID),
                crn: "crn:v1:bluemix:public:transit:global:a/acct::gateway:tg-1".to_string(),
                status: "available".to_string(),
            }],
            connections: vec![
                connection("cn-1", "power_virtual_server"),
                connection("cn-2", "vpc"),
            ],
            zones: vec![ZoneRecord {
                id: "z-1".to_string(),
                name: BASE_DOMAIN.to_string(),
            }],
            records: vec![
                dns_record("r-1", &format!("api-int.{}.{}", CLUSTER, BASE_DOMAIN)),
                dns_record("r-2", &format!("api.{}.{}", CLUSTER, BASE_DOMAIN)),
                dns_record("r-3", &format!("*.apps.{}.{}", CLUSTER, BASE_DOMAIN)),
                dns_record("r-4", &format!("www.{}", BASE_DOMAIN)),
            ],
            buckets: vec![format!("{}-bootstrap-ign", INFRA_ID)],
            objects: ["bootstrap.ign", "master-0.ign", "master-1.ign", "master-2.ign"]
                .iter()
                .map(|k| ObjectRecord {
                    key: k.to_string(),
                    size: 1024,
                })
                .collect(),
            pvm_instances: vec![
                pvm("pvm-0", &format!("{}-master-0", INFRA_ID)),
                pvm("pvm-1", &format!("{}-master-1", INFRA_ID)),
                pvm("pvm-2", &format!("{}-master-2", INFRA_ID)),
                pvm("pvm-3", &format!("{}-worker-a", INFRA_ID)),
            ],
            dhcp_servers: vec![DhcpServer {
                id: "dhcp-1".to_string(),
                network_name: format!("DHCPSERVER{}_Private", INFRA_ID),
            }],
            images: vec![ImageRecord {
                id: "img-1".to_string(),
                name: format!("rhcos-{}", INFRA_ID),
                state: "active".to_string(),
            }],
            ssh_keys: vec![format!("{}-sshkey", INFRA_ID)],
            ..Default::default()
        };
        for pool in ["p1", "p2", "p3", "p4", "p5"] {
            cloud.members.insert(
                pool.to_string(),
                vec![PoolMember {
                    id: format!("{}-m1", pool),
                    health: "ok".to_string(),
                }],
            );
        }
        cloud.hits = vec![
            hit("type:vpc", "crn:v1:bluemix:public:is:us-south:a/acct::vpc:vpc-1"),
            hit(
                "type:load-balancer",
                "crn:v1:bluemix:public:is:us-south:a/acct::load-balancer:lb-int",
            ),
            hit(
                "type:load-balancer",
                "crn:v1:bluemix:public:is:us-south:a/acct::load-balancer:lb-ext",
            ),
            hit(
                "type:load-balancer",
                "crn:v1:bluemix:public:is:us-south:a/acct::load-balancer:lb-kube",
            ),
            hit("type:gateway", "crn:v1:bluemix:public:transit:global:a/acct::gateway:tg-1"),
            hit("power-iaas", "crn:v1:bluemix:public:power-iaas:dal10:a/acct:si-1::"),
            hit(
                "cloud-object-storage",
                "crn:v1:bluemix:public:cloud-object-storage:global:a/acct:cos-1::",
            ),
        ];
        cloud
    }

    /// A workspace left behind by an earlier CI run.
    pub fn with_leftovers(mut self) -> Self {
        self.networks = vec![NetworkRecord {
            id: "net-1".to_string(),
            name: "ci-net".to_string(),
        }];
        self.ports.insert(
            "net-1".to_string(),
            vec![NetworkPort {
                id: "port-1".to_string(),
                pvm_instance_id: Some("pvm-0".to_string()),
            }],
        );
        self
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    fn delete(&self, id: &str) -> Result<()> {
        if self.failing_deletes.contains(id) {
            return Err(CheckError::Provider(format!("delete {} refused", id)));
        }
        self.deleted.lock().unwrap().push(id.to_string());
        Ok(())
    }

    fn resource_instance(&self, guid: &str) -> Result<ResourceInstanceRecord> {
        self.resource_instances
            .iter()
            .map(|(_, r)| r)
            .find(|r| r.guid == guid || r.crn == guid)
            .cloned()
            .ok_or_else(|| CheckError::Provider(format!("no resource instance {}", guid)))
    }
}

fn vpc(id: &str, name: &str) -> VpcRecord {
    VpcRecord {
        id: id.to_string(),
        name: name.to_string(),
        crn: format!("crn:v1:bluemix:public:is:us-south:a/acct::vpc:{}", id),
        health_state: "ok".to_string(),
    }
}

pub fn load_balancer(id: &str, name: &str, pools: &[(&str, &str)]) -> LoadBalancerRecord {
    LoadBalancerRecord {
        id: id.to_string(),
        name: name.to_string(),
        crn: format!("crn:v1:bluemix:public:is:us-south:a/acct::load-balancer:{}", id),
        operating_status: "online".to_string(),
        pools: pools
            .iter()
            .map(|(id, name)| PoolRef {
                id: id.to_string(),
                name: name.to_string(),
            })
            .collect(),
    }
}

pub fn connection(id: &str, network_type: &str) -> ConnectionRecord {
    ConnectionRecord {
        id: id.to_string(),
        name: format!("{}-{}", INFRA_ID, network_type),
        network_type: network_type.to_string(),
        status: "attached".to_string(),
    }
}

pub fn dns_record(id: &str, name: &str) -> DnsRecord {
    DnsRecord {
        id: id.to_string(),
        name: name.to_string(),
        kind: "CNAME".to_string(),
        content: format!("lb.{}", BASE_DOMAIN),
    }
}

fn pvm(id: &str, name: &str) -> PvmInstance {
    PvmInstance {
        id: id.to_string(),
        name: name.to_string(),
        status: "ACTIVE".to_string(),
    }
}

fn hit(marker: &str, crn: &str) -> (String, SearchHit) {
    (
        marker.to_string(),
        SearchHit {
            crn: crn.to_string(),
            name: String::new(),
        },
    )
}

/// Slice `items` into pages addressed by a numeric start cursor.
fn paginate<T: Clone>(items: &[T], start: Option<&str>, limit: u32) -> Page<T> {
    let offset: usize = start.and_then(|s| s.parse().ok()).unwrap_or(0);
    let end = (offset + limit as usize).min(items.len());
    let page: Vec<T> = items.get(offset..end).map(<[T]>::to_vec).unwrap_or_default();
    let next = (end < items.len()).then(|| end.to_string());
    Page { items: page, next }
}

#[async_trait]
impl VpcApi for FakeCloud {
    async fn list_vpcs(&self, start: Option<&str>, limit: u32) -> Result<Page<VpcRecord>> {
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(paginate(&self.vpcs, start, limit))
    }

    async fn get_vpc(&self, id: &str) -> Result<VpcRecord> {
        self.vpcs
            .iter()
            .find(|v| v.id == id)
            .cloned()
            .ok_or_else(|| CheckError::Provider(format!("no vpc {}", id)))
    }

    async fn list_subnets(&self, _vpc_id: &str) -> Result<Vec<SubnetRecord>> {
        Ok(self.subnets.clone())
    }

    async fn list_load_balancers(&self) -> Result<Vec<LoadBalancerRecord>> {
        Ok(self.load_balancers.clone())
    }

    async fn get_load_balancer(&self, id: &str) -> Result<LoadBalancerRecord> {
        if self.failing_lookups.contains(id) {
            return Err(CheckError::Provider(format!("load balancer {} lookup failed", id)));
        }
        self.load_balancers
            .iter()
            .find(|lb| lb.id == id)
            .cloned()
            .ok_or_else(|| CheckError::Provider(format!("no load balancer {}", id)))
    }

    async fn list_pool_members(&self, _lb_id: &str, pool_id: &str) -> Result<Vec<PoolMember>> {
        Ok(self.members.get(pool_id).cloned().unwrap_or_default())
    }

    async fn list_instances(&self, start: Option<&str>, limit: u32) -> Result<Page<InstanceRecord>> {
        Ok(paginate(&self.instances, start, limit))
    }

    async fn get_instance(&self, id: &str) -> Result<InstanceRecord> {
        self.instances
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| CheckError::Provider(format!("no instance {}", id)))
    }
}

#[async_trait]
impl ResourceControllerApi for FakeCloud {
    async fn list_instances(
        &self,
        query: &ResourceInstanceQuery,
    ) -> Result<Page<ResourceInstanceRecord>> {
        let matching: Vec<ResourceInstanceRecord> = self
            .resource_instances
            .iter()
            .filter(|(rid, _)| query.resource_id.as_deref().map_or(true, |q| q == rid))
            .map(|(_, r)| r.clone())
            .collect();
        Ok(paginate(&matching, query.start.as_deref(), query.limit))
    }

    async fn get_instance(&self, guid: &str) -> Result<ResourceInstanceRecord> {
        self.resource_instance(guid)
    }

    async fn resource_group_id(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .resource_groups
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, id)| id.clone()))
    }
}

#[async_trait]
impl TransitGatewayApi for FakeCloud {
    async fn list_gateways(
        &self,
        start: Option<&str>,
        limit: u32,
    ) -> Result<Page<TransitGatewayRecord>> {
        Ok(paginate(&self.gateways, start, limit))
    }

    async fn get_gateway(&self, id: &str) -> Result<TransitGatewayRecord> {
        self.gateways
            .iter()
            .find(|g| g.id == id)
            .cloned()
            .ok_or_else(|| CheckError::Provider(format!("no transit gateway {}", id)))
    }

    async fn list_connections(
        &self,
        _gateway_id: &str,
        start: Option<&str>,
        limit: u32,
    ) -> Result<Page<ConnectionRecord>> {
        Ok(paginate(&self.connections, start, limit))
    }
}

#[async_trait]
impl SearchApi for FakeCloud {
    async fn search(&self, query: &str, cursor: Option<&str>, limit: u32) -> Result<Page<SearchHit>> {
        let matching: Vec<SearchHit> = self
            .hits
            .iter()
            .filter(|(marker, _)| query.contains(marker.as_str()))
            .map(|(_, h)| h.clone())
            .collect();
        Ok(paginate(&matching, cursor, limit))
    }
}

#[async_trait]
impl DnsApi for FakeCloud {
    async fn list_zones(&self) -> Result<Vec<ZoneRecord>> {
        Ok(self.zones.clone())
    }

    async fn get_zone(&self, id: &str) -> Result<ZoneRecord> {
        self.zones
            .iter()
            .find(|z| z.id == id)
            .cloned()
            .ok_or_else(|| CheckError::Provider(format!("no zone {}", id)))
    }

    async fn list_records(&self, _zone_id: &str, page: u32, per_page: u32) -> Result<RecordPage> {
        let start = ((page.max(1) - 1) * per_page).to_string();
        let slice = paginate(&self.records, Some(&start), per_page);
        Ok(RecordPage {
            records: slice.items,
            total_count: self.records.len() as u32,
        })
    }
}

#[async_trait]
impl ObjectStorageApi for FakeCloud {
    async fn list_buckets(&self, _instance_guid: &str) -> Result<Vec<String>> {
        Ok(self.buckets.clone())
    }

    async fn list_objects(&self, _instance_guid: &str, bucket: &str) -> Result<Vec<ObjectRecord>> {
        if !self.buckets.iter().any(|b| b == bucket) {
            return Err(CheckError::Provider(format!("NoSuchBucket {}", bucket)));
        }
        Ok(self.objects.clone())
    }
}

#[async_trait]
impl PowerApi for FakeCloud {
    async fn list_pvm_instances(&self) -> Result<Vec<PvmInstance>> {
        Ok(self.pvm_instances.clone())
    }

    async fn list_dhcp_servers(&self) -> Result<Vec<DhcpServer>> {
        Ok(self.dhcp_servers.clone())
    }

    async fn list_images(&self) -> Result<Vec<ImageRecord>> {
        Ok(self.images.clone())
    }

    async fn list_networks(&self) -> Result<Vec<NetworkRecord>> {
        Ok(self.networks.clone())
    }

    async fn list_network_ports(&self, network_id: &str) -> Result<Vec<NetworkPort>> {
        Ok(self.ports.get(network_id).cloned().unwrap_or_default())
    }

    async fn list_ssh_keys(&self) -> Result<Vec<String>> {
        Ok(self.ssh_keys.clone())
    }

    async fn delete_pvm_instance(&self, id: &str) -> Result<()> {
        self.delete(id)
    }

    async fn delete_dhcp_server(&self, id: &str) -> Result<()> {
        self.delete(id)
    }

    async fn delete_image(&self, id: &str) -> Result<()> {
        self.delete(id)
    }

    async fn delete_network(&self, id: &str) -> Result<()> {
        self.delete(id)
    }
}

/// Hands out the shared fake as the workspace client.
pub struct FakePowerFactory(pub Arc<FakeCloud>);

#[async_trait]
impl PowerApiFactory for FakePowerFactory {
    async fn connect(&self, instance: &ResourceInstanceRecord) -> Result<Arc<dyn PowerApi>> {
        self.0.resource_instance(&instance.guid)?;
        Ok(self.0.clone())
    }
}

pub fn create_metadata() -> Metadata {
    let create: CreateMetadata = serde_json::from_value(json!({
        "clusterName": CLUSTER,
        "clusterID": "5f1c-cluster-id",
        "infraID": INFRA_ID,
        "powervs": {
            "BaseDomain": BASE_DOMAIN,
            "cisInstanceCRN": "crn:v1:bluemix:public:internet-svcs:global:a/acct:cis-1::",
            "powerVSResourceGroup": "rg1",
            "region": "dal",
            "zone": "dal10"
        }
    }))
    .unwrap();
    Metadata::from_create(create).unwrap()
}

pub fn ci_metadata() -> Metadata {
    let ci = serde_json::from_value(json!({
        "region": "dal",
        "zone": "dal10",
        "resourceGroup": "rg1",
        "serviceInstance": "si-1",
        "vpc": "vpc-c1",
        "transitGateway": "c1-x7k2p-tg"
    }))
    .unwrap();
    Metadata::from_ci(ci).unwrap()
}

pub fn context(cloud: Arc<FakeCloud>, metadata: Metadata, config: CheckConfig) -> Arc<CloudContext> {
    Arc::new(CloudContext {
        metadata,
        config,
        vpc: cloud.clone(),
        controller: cloud.clone(),
        transit: cloud.clone(),
        search: cloud.clone(),
        dns: Some(cloud.clone()),
        cos: cloud.clone(),
        power: Arc::new(FakePowerFactory(cloud)),
    })
}
