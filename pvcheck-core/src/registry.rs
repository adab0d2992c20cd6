//! Resource registry.
//!
//! Builds [`ManagedResource`]s for a kind: resolve identifiers, fetch each
//! record, and pair every resource with its discovery error. A failed lookup
//! still yields a placeholder resource, so there is always something to
//! report.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::DiscoveryStrategy;
use crate::discovery::Resolver;
use crate::error::{CheckError, Result};
use crate::provider::{CloudContext, LoadBalancerRecord};
use crate::resource::{
    DnsZone, LoadBalancer, LoadBalancerRole, ManagedResource, Network, ObjectStore, ResourceKind,
    ServiceInstance, TransitGateway, VmInstance,
};
use crate::sink::StatusSink;

/// A resource and the fault, if any, hit while discovering it.
#[derive(Debug, Clone)]
pub struct Discovered {
    pub resource: ManagedResource,
    pub error: Option<CheckError>,
}

impl Discovered {
    pub fn found(resource: ManagedResource) -> Self {
        Self {
            resource,
            error: None,
        }
    }

    pub fn failed(resource: ManagedResource, error: CheckError) -> Self {
        Self {
            resource,
            error: Some(error),
        }
    }
}

/// Discovers and initializes managed resources.
pub struct Registry {
    ctx: Arc<CloudContext>,
    resolver: Resolver,
    sink: Arc<dyn StatusSink>,
}

impl Registry {
    pub fn new(ctx: Arc<CloudContext>, sink: Arc<dyn StatusSink>) -> Self {
        let resolver = Resolver::new(ctx.clone());
        Self {
            ctx,
            resolver,
            sink,
        }
    }

    pub fn context(&self) -> &Arc<CloudContext> {
        &self.ctx
    }

    /// Discover every kind in `kinds`, in the given order.
    ///
    /// Only setup faults abort; every other error stays attached to its slot.
    pub async fn discover_all(&self, kinds: &[ResourceKind]) -> Result<Vec<Discovered>> {
        let mut all = Vec::new();
        for &kind in kinds {
            self.sink.line(&format!("Querying the {}...", kind.label()));
            for discovered in self.discover(kind).await {
                if let Some(err) = &discovered.error {
                    if err.is_setup() {
                        return Err(err.clone());
                    }
                    warn!(kind = %kind, name = %discovered.resource.name(), "discovery: {}", err);
                }
                all.push(discovered);
            }
        }
        Ok(all)
    }

    /// All managed resources of `kind`, each paired with its discovery error.
    pub async fn discover(&self, kind: ResourceKind) -> Vec<Discovered> {
        let name = match self.ctx.metadata.target_name(kind) {
            Ok(Some(name)) => name,
            Ok(None) => {
                debug!(kind = %kind, "no name configured, skipping");
                return Vec::new();
            }
            Err(e) => return placeholders(kind, "", e),
        };

        let target = match self.ctx.config.strategy {
            DiscoveryStrategy::TagSearch if kind != ResourceKind::Dns => {
                self.ctx.metadata.cluster_name.clone()
            }
            _ => name.clone(),
        };
        let query = self.resolver.query(kind, target);

        let ids = match self.resolver.discover(&query).await {
            Ok(ids) => ids,
            Err(e) => return placeholders(kind, &name, e),
        };
        debug!(kind = %kind, name = %name, ids = ?ids, "resolved");

        if kind == ResourceKind::LoadBalancer {
            return self.load_balancers(&ids).await;
        }

        if ids.is_empty() {
            if !kind.is_required() {
                info!(kind = %kind, name = %name, "no instances found");
                return Vec::new();
            }
            let err = CheckError::NotFound {
                kind,
                name: name.clone(),
            };
            return placeholders(kind, &name, err);
        }

        let mut out = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.hydrate(kind, id).await {
                Ok(resource) => out.push(Discovered::found(resource)),
                Err(e) => out.push(Discovered::failed(
                    ManagedResource::placeholder(kind, name.clone()),
                    e,
                )),
            }
        }
        out
    }

    /// Fetch the record behind `id` and wrap it in a resolved resource.
    async fn hydrate(&self, kind: ResourceKind, id: &str) -> Result<ManagedResource> {
        let ctx = &self.ctx;
        let wrap = |e: CheckError| match e {
            CheckError::Provider(message) => CheckError::discovery(kind, message),
            other => other,
        };

        let resource = match kind {
            ResourceKind::Network => {
                let record = ctx.call(ctx.vpc.get_vpc(id)).await.map_err(wrap)?;
                ManagedResource::Network(Network {
                    name: record.name.clone(),
                    handle: Some(record),
                })
            }
            ResourceKind::TransitGateway => {
                let record = ctx.call(ctx.transit.get_gateway(id)).await.map_err(wrap)?;
                ManagedResource::TransitGateway(TransitGateway {
                    name: record.name.clone(),
                    handle: Some(record),
                })
            }
            ResourceKind::VmInstance => {
                let record = ctx.call(ctx.vpc.get_instance(id)).await.map_err(wrap)?;
                ManagedResource::VmInstance(VmInstance {
                    name: record.name.clone(),
                    handle: Some(record),
                })
            }
            ResourceKind::ServiceInstance => {
                let record = ctx.call(ctx.controller.get_instance(id)).await.map_err(wrap)?;
                ManagedResource::ServiceInstance(ServiceInstance {
                    name: record.name.clone(),
                    handle: Some(record),
                    power: None,
                })
            }
            ResourceKind::ObjectStore => {
                let record = ctx.call(ctx.controller.get_instance(id)).await.map_err(wrap)?;
                ManagedResource::ObjectStore(ObjectStore {
                    name: record.name.clone(),
                    handle: Some(record),
                })
            }
            ResourceKind::Dns => {
                let dns = ctx.dns()?;
                let record = ctx.call(dns.get_zone(id)).await.map_err(wrap)?;
                ManagedResource::Dns(DnsZone {
                    name: record.name.clone(),
                    handle: Some(record),
                })
            }
            ResourceKind::LoadBalancer => {
                let record = ctx.call(ctx.vpc.get_load_balancer(id)).await.map_err(wrap)?;
                let role = LoadBalancerRole::classify(&record.name).ok_or_else(|| {
                    CheckError::discovery(kind, format!("{} has no load balancer role", record.name))
                })?;
                load_balancer(role, record)
            }
        };
        Ok(resource)
    }

    /// Exactly one slot per role: internal, external, kube.
    async fn load_balancers(&self, ids: &[String]) -> Vec<Discovered> {
        let mut slots: Vec<(LoadBalancerRole, Option<Discovered>)> =
            LoadBalancerRole::ALL.iter().map(|r| (*r, None)).collect();

        // Roles left empty carry this instead of NotFound
        let mut fetch_error: Option<CheckError> = None;

        for id in ids {
            let record = match self.ctx.call(self.ctx.vpc.get_load_balancer(id)).await {
                Ok(record) => record,
                Err(e) => {
                    warn!(id = %id, "fetching load balancer: {}", e);
                    let e = match e {
                        CheckError::Provider(message) => {
                            CheckError::discovery(ResourceKind::LoadBalancer, message)
                        }
                        other => other,
                    };
                    fetch_error.get_or_insert(e);
                    continue;
                }
            };
            let Some(role) = LoadBalancerRole::classify(&record.name) else {
                debug!(name = %record.name, "load balancer does not belong to the cluster");
                continue;
            };
            let Some(slot) = slots.iter_mut().find(|(r, _)| *r == role) else {
                continue;
            };
            if slot.1.is_some() {
                warn!(name = %record.name, role = ?role, "ignoring additional load balancer");
                continue;
            }
            slot.1 = Some(Discovered::found(load_balancer(role, record)));
        }

        slots
            .into_iter()
            .map(|(role, found)| {
                found.unwrap_or_else(|| {
                    let error = fetch_error.clone().unwrap_or_else(|| CheckError::NotFound {
                        kind: ResourceKind::LoadBalancer,
                        name: role.placeholder_name().to_string(),
                    });
                    Discovered::failed(ManagedResource::load_balancer_placeholder(role), error)
                })
            })
            .collect()
    }

    /// Kind-specific setup after discovery.
    ///
    /// Service instances get their workspace client; other kinds need nothing.
    pub async fn initialize(&self, resource: &mut ManagedResource) -> Result<()> {
        match resource {
            ManagedResource::ServiceInstance(si) => {
                let Some(handle) = &si.handle else {
                    return Ok(());
                };
                let power = self.ctx.call(self.ctx.power.connect(handle)).await?;
                debug!(guid = %handle.guid, "connected workspace client");
                si.power = Some(power);
                Ok(())
            }
            ManagedResource::Network(_)
            | ManagedResource::TransitGateway(_)
            | ManagedResource::VmInstance(_)
            | ManagedResource::LoadBalancer(_)
            | ManagedResource::ObjectStore(_)
            | ManagedResource::Dns(_) => Ok(()),
        }
    }
}

fn load_balancer(role: LoadBalancerRole, record: LoadBalancerRecord) -> ManagedResource {
    ManagedResource::LoadBalancer(LoadBalancer {
        name: record.name.clone(),
        role,
        handle: Some(record),
    })
}

fn placeholders(kind: ResourceKind, name: &str, error: CheckError) -> Vec<Discovered> {
    match kind {
        ResourceKind::LoadBalancer => LoadBalancerRole::ALL
            .iter()
            .map(|role| {
                Discovered::failed(
                    ManagedResource::load_balancer_placeholder(*role),
                    error.clone(),
                )
            })
            .collect(),
        _ => vec![Discovered::failed(
            ManagedResource::placeholder(kind, name),
            error,
        )],
    }
}
