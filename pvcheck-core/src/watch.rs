//! Phase watcher.
//!
//! Runs phases strictly in order. Each phase polls its status source until
//! the completion predicate holds, its limits run out, or an unrecoverable
//! error occurs. A pass whose extraction recorded a fault is inconclusive and
//! simply retried after the phase's interval.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::checks::load_balancer::{pool_health, PoolHealth};
use crate::error::{CheckError, Result};
use crate::phase::{evaluate_pass, Pass, Phase, PhaseCheck, StatusLine, StatusQuery};
use crate::provider::{within, CloudContext, LoadBalancerRecord};
use crate::registry::Registry;
use crate::resource::{LoadBalancerRole, ManagedResource, PoolRequirement, ResourceKind};
use crate::sink::StatusSink;

/// Produces status documents, e.g. by running `oc get ... -o json`.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self, query: &StatusQuery) -> Result<Value>;
}

/// Reports the health of a load balancer pool.
#[async_trait]
pub trait PoolProbe: Send + Sync {
    async fn probe(&self, pool: &PoolRequirement) -> Result<PoolHealth>;
}

/// Probes pools of one load balancer through the VPC API.
pub struct LoadBalancerProbe {
    ctx: Arc<CloudContext>,
    record: LoadBalancerRecord,
}

impl LoadBalancerProbe {
    pub fn new(ctx: Arc<CloudContext>, record: LoadBalancerRecord) -> Self {
        Self { ctx, record }
    }

    /// Probe for the cluster's internal load balancer.
    pub async fn internal(registry: &Registry) -> Result<Self> {
        for discovered in registry.discover(ResourceKind::LoadBalancer).await {
            if let ManagedResource::LoadBalancer(lb) = discovered.resource {
                if lb.role != LoadBalancerRole::Internal {
                    continue;
                }
                return match (lb.handle, discovered.error) {
                    (Some(record), _) => Ok(Self::new(registry.context().clone(), record)),
                    (None, Some(e)) => Err(e),
                    (None, None) => Err(CheckError::NotFound {
                        kind: ResourceKind::LoadBalancer,
                        name: lb.name,
                    }),
                };
            }
        }
        Err(CheckError::NotFound {
            kind: ResourceKind::LoadBalancer,
            name: LoadBalancerRole::Internal.placeholder_name().to_string(),
        })
    }
}

#[async_trait]
impl PoolProbe for LoadBalancerProbe {
    async fn probe(&self, pool: &PoolRequirement) -> Result<PoolHealth> {
        pool_health(&self.ctx, &self.record, pool).await
    }
}

/// How a phase ended.
#[derive(Debug, Clone)]
pub enum PhaseOutcome {
    Succeeded { attempts: u32 },
    /// Attempt or time limit ran out before completion.
    Expired { attempts: u32 },
    Failed(CheckError),
}

impl PhaseOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PhaseOutcome::Succeeded { .. })
    }
}

/// Outcomes of the phases that ran, in order.
#[derive(Debug, Clone, Default)]
pub struct WatchReport {
    pub outcomes: Vec<(String, PhaseOutcome)>,
}

impl WatchReport {
    /// True when every phase that ran succeeded.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|(_, o)| o.is_success())
    }
}

#[derive(Clone)]
pub struct PhaseWatcher {
    source: Arc<dyn StatusSource>,
    probe: Option<Arc<dyn PoolProbe>>,
    sink: Arc<dyn StatusSink>,
    call_timeout: Duration,
}

impl PhaseWatcher {
    pub fn new(source: Arc<dyn StatusSource>, sink: Arc<dyn StatusSink>, call_timeout: Duration) -> Self {
        Self {
            source,
            probe: None,
            sink,
            call_timeout,
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn PoolProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Run `phases` in order, stopping at the first one that does not succeed.
    ///
    /// Each phase runs on its own task and hands its outcome back before the
    /// next one starts.
    pub async fn run(&self, phases: Vec<Phase>) -> WatchReport {
        let mut report = WatchReport::default();

        for phase in phases {
            let name = phase.name.clone();
            let (tx, rx) = oneshot::channel();
            let watcher = self.clone();
            tokio::spawn(async move {
                let outcome = watcher.run_phase(&phase).await;
                let _ = tx.send(outcome);
            });

            let outcome = rx.await.unwrap_or_else(|_| {
                PhaseOutcome::Failed(CheckError::StatusSource(format!(
                    "phase {} ended without an outcome",
                    name
                )))
            });
            let done = !outcome.is_success();
            report.outcomes.push((name, outcome));
            if done {
                break;
            }
        }
        report
    }

    /// Poll one phase until it completes, expires or fails.
    pub async fn run_phase(&self, phase: &Phase) -> PhaseOutcome {
        let started = Instant::now();
        let mut attempts = 0u32;
        info!(phase = %phase.name, ordinal = phase.ordinal, "phase started");

        loop {
            attempts += 1;
            match self.attempt(phase).await {
                Ok(Pass::Evaluated { complete, lines }) => {
                    for line in &lines {
                        self.sink.update(&line.key, &line.text);
                    }
                    if complete {
                        info!(phase = %phase.name, attempts, "phase complete");
                        return PhaseOutcome::Succeeded { attempts };
                    }
                }
                Ok(Pass::Inconclusive(fault)) => {
                    debug!(phase = %phase.name, attempts, "inconclusive pass: {}", fault);
                }
                Err(e) => {
                    warn!(phase = %phase.name, attempts, "phase failed: {}", e);
                    return PhaseOutcome::Failed(e);
                }
            }

            if let Some(max) = phase.limits.max_attempts {
                if attempts >= max {
                    return PhaseOutcome::Expired { attempts };
                }
            }

            tokio::time::sleep(phase.retry_interval).await;

            if let Some(deadline) = phase.limits.deadline {
                if started.elapsed() >= deadline {
                    return PhaseOutcome::Expired { attempts };
                }
            }
        }
    }

    async fn attempt(&self, phase: &Phase) -> Result<Pass> {
        if let PhaseCheck::PoolHealthy { pool } = &phase.check {
            let probe = self.probe.as_ref().ok_or_else(|| {
                CheckError::Setup(format!("phase {} needs a load balancer probe", phase.name))
            })?;
            let health = within(
                Instant::now() + self.call_timeout,
                self.call_timeout,
                probe.probe(pool),
            )
            .await?;
            let text = if health.is_healthy() {
                format!("The {} pool is healthy", pool.label)
            } else {
                format!("The {} pool is not healthy", pool.label)
            };
            return Ok(Pass::Evaluated {
                complete: health.is_healthy(),
                lines: vec![StatusLine {
                    key: pool.label.to_string(),
                    text,
                }],
            });
        }

        let Some(query) = phase.query() else {
            return Ok(evaluate_pass(&phase.check, &Value::Null));
        };
        let document = within(
            Instant::now() + self.call_timeout,
            self.call_timeout,
            self.source.fetch(query),
        )
        .await?;
        Ok(evaluate_pass(&phase.check, &document))
    }
}
