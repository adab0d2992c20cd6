//! Discovery resolver.
//!
//! Turns a logical resource name into provider identifiers with one of two
//! strategies:
//!
//! - **NameMatch** walks the provider listing page by page and compares each
//!   candidate's name (substring) or identifier/CRN (exact).
//! - **TagSearch** runs one global-search query scoped by family, type and the
//!   cluster tag, and returns the resource segment of each hit's CRN.
//!
//! The deadline is re-checked before each page and each candidate, so a slow
//! listing aborts between items rather than running to the end. Zero matches
//! is not an error here; the registry decides whether an empty result is.

use std::future::Future;
use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;
use tokio::time::Instant;
use tracing::debug;

use crate::config::{DiscoveryStrategy, MatchMode};
use crate::error::{CheckError, Result};
use crate::provider::{
    within, CloudContext, InstanceRecord, LoadBalancerRecord, Page, ResourceInstanceQuery,
    ResourceInstanceRecord, TransitGatewayRecord, VpcRecord, ZoneRecord,
};
use crate::resource::{LoadBalancerRole, ResourceKind};

/// Resource-controller id of Power Virtual Server workspaces.
pub const POWER_IAAS_RESOURCE_ID: &str = "abd259f0-9990-11e8-acc8-b9f54a8f1661";
/// Resource-controller id of Cloud Object Storage instances.
pub const COS_RESOURCE_ID: &str = "dff97f5c-bc5e-4455-b470-411c3edbe49c";

const VPC_PAGE: u32 = 64;
const INSTANCE_PAGE: u32 = 50;
const SERVICE_INSTANCE_PAGE: u32 = 10;
const TRANSIT_GATEWAY_PAGE: u32 = 32;
const SEARCH_PAGE: u32 = 100;

/// A single resolution request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryQuery {
    pub kind: ResourceKind,
    /// Name, identifier or CRN to match (NameMatch), or the cluster tag (TagSearch).
    pub target: String,
    pub strategy: DiscoveryStrategy,
    /// Start cursor, normally `None`.
    pub cursor: Option<String>,
}

impl LoadBalancerRole {
    /// Role implied by a load balancer's name, if any.
    pub fn classify(name: &str) -> Option<LoadBalancerRole> {
        static PATTERNS: OnceLock<Vec<(Regex, LoadBalancerRole)>> = OnceLock::new();
        let patterns = PATTERNS.get_or_init(|| {
            [
                ("loadbalancer-int$", LoadBalancerRole::Internal),
                ("loadbalancer$", LoadBalancerRole::External),
                ("^kube-", LoadBalancerRole::Kube),
            ]
            .into_iter()
            .filter_map(|(pattern, role)| Regex::new(pattern).ok().map(|re| (re, role)))
            .collect()
        });
        patterns
            .iter()
            .find(|(re, _)| re.is_match(name))
            .map(|(_, role)| *role)
    }
}

/// Search-service query for `kind` tagged with `cluster`.
///
/// DNS zones carry no searchable tag; they are always resolved by name.
pub fn tag_query(kind: ResourceKind, cluster: &str) -> Option<String> {
    let scope = match kind {
        ResourceKind::Network => "family:is AND type:vpc",
        ResourceKind::LoadBalancer => "family:is AND type:load-balancer",
        ResourceKind::VmInstance => "family:is AND type:instance",
        ResourceKind::TransitGateway => "family:resource_controller AND type:gateway",
        ResourceKind::ServiceInstance => {
            "family:resource_controller AND type:resource-instance AND crn:crn\\:v1\\:bluemix\\:public\\:power-iaas*"
        }
        ResourceKind::ObjectStore => {
            "family:resource_controller AND type:resource-instance AND crn:crn\\:v1\\:bluemix\\:public\\:cloud-object-storage*"
        }
        ResourceKind::Dns => return None,
    };
    Some(format!("tags:{} AND {}", cluster, scope))
}

/// Identifier carried by a CRN: its resource segment, or the whole CRN when
/// that segment is empty (service instances).
pub fn crn_resource_id(crn: &str) -> Result<String> {
    let parts: Vec<&str> = crn.split(':').collect();
    if parts.len() != 10 || parts[0] != "crn" {
        return Err(CheckError::Provider(format!("malformed CRN {}", crn)));
    }
    if parts[9].is_empty() {
        Ok(crn.to_string())
    } else {
        Ok(parts[9].to_string())
    }
}

fn check_deadline(deadline: Instant, ctx: &CloudContext) -> Result<()> {
    if Instant::now() >= deadline {
        Err(CheckError::DeadlineExceeded(ctx.config.call_timeout))
    } else {
        Ok(())
    }
}

/// Resolves discovery queries against the shared provider context.
pub struct Resolver {
    ctx: Arc<CloudContext>,
}

impl Resolver {
    pub fn new(ctx: Arc<CloudContext>) -> Self {
        Self { ctx }
    }

    /// Build a query using the run's global strategy.
    pub fn query(&self, kind: ResourceKind, target: impl Into<String>) -> DiscoveryQuery {
        let strategy = match kind {
            ResourceKind::Dns => DiscoveryStrategy::NameMatch,
            _ => self.ctx.config.strategy,
        };
        DiscoveryQuery {
            kind,
            target: target.into(),
            strategy,
            cursor: None,
        }
    }

    /// Resolve `query` to identifiers in provider-listing order.
    pub async fn discover(&self, query: &DiscoveryQuery) -> Result<Vec<String>> {
        let deadline = self.ctx.deadline();
        debug!(kind = %query.kind, target = %query.target, strategy = %query.strategy, "discovering");

        let ids = match query.strategy {
            DiscoveryStrategy::NameMatch => self.name_match(query, deadline).await,
            DiscoveryStrategy::TagSearch => self.tag_search(query, deadline).await,
        }
        .map_err(|e| match e {
            CheckError::Provider(message) => CheckError::discovery(query.kind, message),
            other => other,
        })?;

        self.apply_match_mode(query, ids)
    }

    fn apply_match_mode(&self, query: &DiscoveryQuery, mut ids: Vec<String>) -> Result<Vec<String>> {
        if query.kind.is_plural() || ids.len() <= 1 {
            return Ok(ids);
        }
        match self.ctx.config.match_mode {
            MatchMode::First => {
                debug!(kind = %query.kind, candidates = ids.len(), "keeping first candidate");
                ids.truncate(1);
                Ok(ids)
            }
            MatchMode::Unique => Err(CheckError::Ambiguous {
                kind: query.kind,
                name: query.target.clone(),
                count: ids.len(),
            }),
        }
    }

    /// Stop at the first match only for singletons in first-match mode.
    fn stops_at_first(&self, kind: ResourceKind) -> bool {
        !kind.is_plural() && self.ctx.config.match_mode == MatchMode::First
    }

    /// Walk a cursor-paginated listing, keeping the ids `accept` returns.
    async fn walk<T, F, Fut>(
        &self,
        query: &DiscoveryQuery,
        deadline: Instant,
        mut fetch: F,
        accept: impl Fn(&T) -> Option<String>,
    ) -> Result<Vec<String>>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<Page<T>>>,
    {
        let stop_first = self.stops_at_first(query.kind);
        let mut cursor = query.cursor.clone();
        let mut found = Vec::new();
        let mut page_no = 0u32;

        loop {
            check_deadline(deadline, &self.ctx)?;
            let page = within(deadline, self.ctx.config.call_timeout, fetch(cursor.take())).await?;
            page_no += 1;
            debug!(kind = %query.kind, page = page_no, items = page.items.len(), "listing page");

            for item in &page.items {
                check_deadline(deadline, &self.ctx)?;
                if let Some(id) = accept(item) {
                    found.push(id);
                    if stop_first {
                        return Ok(found);
                    }
                }
            }

            match page.next {
                Some(next) if !page.items.is_empty() => cursor = Some(next),
                _ => return Ok(found),
            }
        }
    }

    async fn name_match(&self, query: &DiscoveryQuery, deadline: Instant) -> Result<Vec<String>> {
        let target = query.target.as_str();
        let ctx = &self.ctx;

        match query.kind {
            ResourceKind::Network => {
                self.walk(
                    query,
                    deadline,
                    |start| {
                        let vpc = ctx.vpc.clone();
                        async move { vpc.list_vpcs(start.as_deref(), VPC_PAGE).await }
                    },
                    |v: &VpcRecord| {
                        (v.name.contains(target) || v.crn == target || v.id == target)
                            .then(|| v.id.clone())
                    },
                )
                .await
            }
            ResourceKind::VmInstance => {
                self.walk(
                    query,
                    deadline,
                    |start| {
                        let vpc = ctx.vpc.clone();
                        async move { vpc.list_instances(start.as_deref(), INSTANCE_PAGE).await }
                    },
                    |i: &InstanceRecord| i.name.contains(target).then(|| i.id.clone()),
                )
                .await
            }
            ResourceKind::LoadBalancer => {
                self.walk(
                    query,
                    deadline,
                    |_| {
                        let vpc = ctx.vpc.clone();
                        async move { vpc.list_load_balancers().await.map(Page::last) }
                    },
                    |lb: &LoadBalancerRecord| {
                        (lb.name.contains(target) && LoadBalancerRole::classify(&lb.name).is_some())
                            .then(|| lb.id.clone())
                    },
                )
                .await
            }
            ResourceKind::TransitGateway => {
                self.walk(
                    query,
                    deadline,
                    |start| {
                        let transit = ctx.transit.clone();
                        async move {
                            transit
                                .list_gateways(start.as_deref(), TRANSIT_GATEWAY_PAGE)
                                .await
                        }
                    },
                    |tg: &TransitGatewayRecord| {
                        (tg.name.contains(target) || tg.crn == target || tg.id == target)
                            .then(|| tg.id.clone())
                    },
                )
                .await
            }
            ResourceKind::ServiceInstance | ResourceKind::ObjectStore => {
                let resource_id = match query.kind {
                    ResourceKind::ServiceInstance => POWER_IAAS_RESOURCE_ID,
                    _ => COS_RESOURCE_ID,
                };
                let resource_group_id = self.resource_group_id(deadline).await?;
                self.walk(
                    query,
                    deadline,
                    |start| {
                        let controller = ctx.controller.clone();
                        let q = ResourceInstanceQuery {
                            resource_id: Some(resource_id.to_string()),
                            resource_group_id: resource_group_id.clone(),
                            start,
                            limit: SERVICE_INSTANCE_PAGE,
                        };
                        async move { controller.list_instances(&q).await }
                    },
                    |si: &ResourceInstanceRecord| {
                        (si.name.contains(target) || si.guid == target || si.crn == target)
                            .then(|| si.guid.clone())
                    },
                )
                .await
            }
            ResourceKind::Dns => {
                let dns = ctx.dns()?.clone();
                self.walk(
                    query,
                    deadline,
                    |_| {
                        let dns = dns.clone();
                        async move { dns.list_zones().await.map(Page::last) }
                    },
                    |zone: &ZoneRecord| (zone.name == target).then(|| zone.id.clone()),
                )
                .await
            }
        }
    }

    async fn resource_group_id(&self, deadline: Instant) -> Result<Option<String>> {
        let group = self.ctx.metadata.resource_group.as_str();
        if group.is_empty() {
            return Ok(None);
        }
        let id = within(
            deadline,
            self.ctx.config.call_timeout,
            self.ctx.controller.resource_group_id(group),
        )
        .await?;
        if id.is_none() {
            return Err(CheckError::Setup(format!(
                "resource group {} does not exist",
                group
            )));
        }
        Ok(id)
    }

    async fn tag_search(&self, query: &DiscoveryQuery, deadline: Instant) -> Result<Vec<String>> {
        let Some(search_query) = tag_query(query.kind, &query.target) else {
            return Err(CheckError::discovery(
                query.kind,
                "kind cannot be discovered by tag",
            ));
        };
        if query.target.is_empty() {
            return Err(CheckError::Setup(
                "tag search needs a cluster name".to_string(),
            ));
        }

        let mut cursor = query.cursor.clone();
        let mut ids = Vec::new();
        loop {
            check_deadline(deadline, &self.ctx)?;
            let page = within(
                deadline,
                self.ctx.config.call_timeout,
                self.ctx
                    .search
                    .search(&search_query, cursor.as_deref(), SEARCH_PAGE),
            )
            .await?;
            debug!(kind = %query.kind, hits = page.items.len(), "search page");

            for hit in &page.items {
                check_deadline(deadline, &self.ctx)?;
                ids.push(crn_resource_id(&hit.crn)?);
            }

            let full = page.items.len() as u32 == SEARCH_PAGE;
            match page.next {
                Some(next) if full => cursor = Some(next),
                _ => return Ok(ids),
            }
        }
    }
}
