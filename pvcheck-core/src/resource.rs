//! Managed resources.
//!
//! Every kind the checker knows about is a variant of [`ManagedResource`].
//! Consumers dispatch with `match`, so adding a kind forces every consumer to
//! handle it. A variant whose handle is `None` is a placeholder: discovery did
//! not find it, and it always reports NOTOK.

use std::fmt;
use std::sync::Arc;

use crate::provider::{
    InstanceRecord, LoadBalancerRecord, PowerApi, ResourceInstanceRecord, TransitGatewayRecord,
    VpcRecord, ZoneRecord,
};

/// Kind discriminant with its fixed priority and display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Network,
    TransitGateway,
    VmInstance,
    ServiceInstance,
    LoadBalancer,
    ObjectStore,
    Dns,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Network,
        ResourceKind::TransitGateway,
        ResourceKind::VmInstance,
        ResourceKind::ServiceInstance,
        ResourceKind::LoadBalancer,
        ResourceKind::ObjectStore,
        ResourceKind::Dns,
    ];

    /// Higher priorities are initialized and reported first.
    pub fn priority(self) -> i32 {
        match self {
            ResourceKind::Network => 100,
            ResourceKind::TransitGateway => 90,
            ResourceKind::VmInstance => 85,
            ResourceKind::ServiceInstance => 80,
            ResourceKind::LoadBalancer => 70,
            ResourceKind::ObjectStore => 60,
            ResourceKind::Dns => 10,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Network => "Virtual Private Cloud",
            ResourceKind::TransitGateway => "Transit Gateway",
            ResourceKind::VmInstance => "Cloud VM",
            ResourceKind::ServiceInstance => "Power Service Instance",
            ResourceKind::LoadBalancer => "Load Balancer",
            ResourceKind::ObjectStore => "Cloud Object Storage",
            ResourceKind::Dns => "Domain Name Service",
        }
    }

    /// Plural kinds accumulate every match instead of stopping at the first.
    pub fn is_plural(self) -> bool {
        matches!(
            self,
            ResourceKind::Network | ResourceKind::LoadBalancer | ResourceKind::VmInstance
        )
    }

    /// Whether finding nothing is a reportable fault.
    pub fn is_required(self) -> bool {
        !matches!(self, ResourceKind::VmInstance)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Role of one of the three cluster load balancers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadBalancerRole {
    Internal,
    External,
    Kube,
}

impl LoadBalancerRole {
    pub const ALL: [LoadBalancerRole; 3] = [
        LoadBalancerRole::Internal,
        LoadBalancerRole::External,
        LoadBalancerRole::Kube,
    ];

    /// Display name for a missing load balancer of this role.
    pub fn placeholder_name(self) -> &'static str {
        match self {
            LoadBalancerRole::Internal => "(internal load balancer)",
            LoadBalancerRole::External => "(external load balancer)",
            LoadBalancerRole::Kube => "(kube load balancer)",
        }
    }

    /// Pools that must have a healthy member.
    pub fn required_pools(self) -> &'static [PoolRequirement] {
        match self {
            LoadBalancerRole::Internal => INTERNAL_POOLS,
            LoadBalancerRole::External => EXTERNAL_POOLS,
            LoadBalancerRole::Kube => KUBE_POOLS,
        }
    }
}

/// A load balancer pool, known by any of `names`, that needs a healthy member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolRequirement {
    pub names: &'static [&'static str],
    pub label: &'static str,
}

const INTERNAL_POOLS: &[PoolRequirement] = &[
    PoolRequirement {
        names: &["pool-6443"],
        label: "port 6443",
    },
    MACHINE_CONFIG_POOL,
];

const EXTERNAL_POOLS: &[PoolRequirement] = &[PoolRequirement {
    names: &["pool-6443"],
    label: "port 6443",
}];

const KUBE_POOLS: &[PoolRequirement] = &[
    PoolRequirement {
        names: &["tcp-80"],
        label: "port 80",
    },
    PoolRequirement {
        names: &["tcp-443"],
        label: "port 443",
    },
];

/// The internal load balancer pool serving ignition to new nodes.
pub const MACHINE_CONFIG_POOL: PoolRequirement = PoolRequirement {
    names: &["machine-config-server", "additional-pool-22623"],
    label: "machine config server",
};

#[derive(Debug, Clone)]
pub struct Network {
    pub name: String,
    pub handle: Option<VpcRecord>,
}

#[derive(Debug, Clone)]
pub struct TransitGateway {
    pub name: String,
    pub handle: Option<TransitGatewayRecord>,
}

#[derive(Debug, Clone)]
pub struct VmInstance {
    pub name: String,
    pub handle: Option<InstanceRecord>,
}

#[derive(Clone)]
pub struct ServiceInstance {
    pub name: String,
    pub handle: Option<ResourceInstanceRecord>,
    /// Workspace client, set by initialization.
    pub power: Option<Arc<dyn PowerApi>>,
}

impl fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .field("power", &self.power.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct LoadBalancer {
    pub name: String,
    pub role: LoadBalancerRole,
    pub handle: Option<LoadBalancerRecord>,
}

#[derive(Debug, Clone)]
pub struct ObjectStore {
    pub name: String,
    pub handle: Option<ResourceInstanceRecord>,
}

#[derive(Debug, Clone)]
pub struct DnsZone {
    pub name: String,
    pub handle: Option<ZoneRecord>,
}

/// A discovered (or placeholder) cloud object.
#[derive(Debug, Clone)]
pub enum ManagedResource {
    Network(Network),
    TransitGateway(TransitGateway),
    VmInstance(VmInstance),
    ServiceInstance(ServiceInstance),
    LoadBalancer(LoadBalancer),
    ObjectStore(ObjectStore),
    Dns(DnsZone),
}

impl ManagedResource {
    /// An unresolved resource carrying only the requested name.
    ///
    /// Load balancers need a role; use [`ManagedResource::load_balancer_placeholder`].
    pub fn placeholder(kind: ResourceKind, name: impl Into<String>) -> Self {
        let name = name.into();
        match kind {
            ResourceKind::Network => Self::Network(Network { name, handle: None }),
            ResourceKind::TransitGateway => {
                Self::TransitGateway(TransitGateway { name, handle: None })
            }
            ResourceKind::VmInstance => Self::VmInstance(VmInstance { name, handle: None }),
            ResourceKind::ServiceInstance => Self::ServiceInstance(ServiceInstance {
                name,
                handle: None,
                power: None,
            }),
            ResourceKind::LoadBalancer => Self::LoadBalancer(LoadBalancer {
                name,
                role: LoadBalancerRole::External,
                handle: None,
            }),
            ResourceKind::ObjectStore => Self::ObjectStore(ObjectStore { name, handle: None }),
            ResourceKind::Dns => Self::Dns(DnsZone { name, handle: None }),
        }
    }

    pub fn load_balancer_placeholder(role: LoadBalancerRole) -> Self {
        Self::LoadBalancer(LoadBalancer {
            name: role.placeholder_name().to_string(),
            role,
            handle: None,
        })
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Network(_) => ResourceKind::Network,
            Self::TransitGateway(_) => ResourceKind::TransitGateway,
            Self::VmInstance(_) => ResourceKind::VmInstance,
            Self::ServiceInstance(_) => ResourceKind::ServiceInstance,
            Self::LoadBalancer(_) => ResourceKind::LoadBalancer,
            Self::ObjectStore(_) => ResourceKind::ObjectStore,
            Self::Dns(_) => ResourceKind::Dns,
        }
    }

    pub fn priority(&self) -> i32 {
        self.kind().priority()
    }

    pub fn label(&self) -> &'static str {
        self.kind().label()
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Network(r) => &r.name,
            Self::TransitGateway(r) => &r.name,
            Self::VmInstance(r) => &r.name,
            Self::ServiceInstance(r) => &r.name,
            Self::LoadBalancer(r) => &r.name,
            Self::ObjectStore(r) => &r.name,
            Self::Dns(r) => &r.name,
        }
    }

    /// Provider identifier, `None` for placeholders.
    pub fn external_id(&self) -> Option<&str> {
        match self {
            Self::Network(r) => r.handle.as_ref().map(|h| h.id.as_str()),
            Self::TransitGateway(r) => r.handle.as_ref().map(|h| h.id.as_str()),
            Self::VmInstance(r) => r.handle.as_ref().map(|h| h.id.as_str()),
            Self::ServiceInstance(r) => r.handle.as_ref().map(|h| h.guid.as_str()),
            Self::LoadBalancer(r) => r.handle.as_ref().map(|h| h.id.as_str()),
            Self::ObjectStore(r) => r.handle.as_ref().map(|h| h.guid.as_str()),
            Self::Dns(r) => r.handle.as_ref().map(|h| h.id.as_str()),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.external_id().is_some()
    }
}
