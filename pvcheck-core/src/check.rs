//! One-shot readiness and pre-flight runs.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::Result;
use crate::provider::CloudContext;
use crate::registry::{Discovered, Registry};
use crate::scheduler::Scheduler;
use crate::sink::StatusSink;
use crate::status::{Report, StatusAggregator};

/// Discovers, orders, initializes and evaluates every managed resource.
pub struct Checker {
    registry: Registry,
    aggregator: StatusAggregator,
    scheduler: Scheduler,
}

impl Checker {
    pub fn new(ctx: Arc<CloudContext>, sink: Arc<dyn StatusSink>) -> Self {
        Self {
            registry: Registry::new(ctx.clone(), sink.clone()),
            aggregator: StatusAggregator::new(ctx, sink),
            scheduler: Scheduler::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Post-create check: every resource must be ready.
    pub async fn run_create(&self) -> Result<Vec<Report>> {
        let discovered = self.prepare().await?;
        let reports = self.aggregator.report_all(&discovered).await;
        let failed = reports.iter().filter(|r| !r.is_ok()).count();
        info!(resources = reports.len(), failed, "readiness check finished");
        Ok(reports)
    }

    /// Pre-flight check: no stray objects may be left behind.
    ///
    /// With `clean`, strays are deleted as they are found.
    pub async fn run_ci(&self, clean: bool) -> Result<Vec<Report>> {
        let discovered = self.prepare().await?;
        let mut reports = Vec::with_capacity(discovered.len());
        for d in &discovered {
            reports.push(
                self.aggregator
                    .evaluate_absence(&d.resource, d.error.as_ref(), clean)
                    .await,
            );
        }
        let failed = reports.iter().filter(|r| !r.is_ok()).count();
        info!(resources = reports.len(), failed, clean, "pre-flight check finished");
        Ok(reports)
    }

    /// Discover, order and initialize; discovery faults stay with their resource.
    async fn prepare(&self) -> Result<Vec<Discovered>> {
        let kinds = self.registry.context().metadata.kinds();
        let discovered = self.registry.discover_all(kinds).await?;

        let mut ready = self.scheduler.order(discovered);
        for d in &mut ready {
            if let Err(e) = self.registry.initialize(&mut d.resource).await {
                if e.is_setup() {
                    return Err(e);
                }
                warn!(kind = %d.resource.kind(), name = %d.resource.name(), "initialize: {}", e);
            }
        }
        Ok(ready)
    }
}
