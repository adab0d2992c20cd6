//! Status aggregator.
//!
//! Composes the per-kind sub-checks in [`crate::checks`] into one OK/NOTOK
//! verdict per resource. Every sub-check runs even after an earlier one
//! fails, and every failure is reported before the final verdict line.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::checks;
use crate::error::CheckError;
use crate::provider::CloudContext;
use crate::registry::Discovered;
use crate::resource::{ManagedResource, ResourceKind};
use crate::sink::StatusSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ok,
    NotOk,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Ok => write!(f, "OK"),
            Verdict::NotOk => write!(f, "NOTOK"),
        }
    }
}

/// Outcome of evaluating one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub kind: ResourceKind,
    pub name: String,
    pub verdict: Verdict,
    pub failures: Vec<String>,
}

impl Report {
    pub fn is_ok(&self) -> bool {
        self.verdict == Verdict::Ok
    }
}

/// Collects sub-check results for one resource.
///
/// Failures and notes are written to the sink as they happen.
pub struct Checklist<'a> {
    kind: ResourceKind,
    name: String,
    sink: &'a dyn StatusSink,
    failures: Vec<String>,
}

impl<'a> Checklist<'a> {
    pub fn new(kind: ResourceKind, name: impl Into<String>, sink: &'a dyn StatusSink) -> Self {
        Self {
            kind,
            name: name.into(),
            sink,
            failures: Vec::new(),
        }
    }

    /// Record a failed sub-check.
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.sink
            .line(&format!("{} {} {}", self.kind.label(), self.name, message));
        self.failures.push(message);
    }

    /// Report an informational line that does not affect the verdict.
    pub fn note(&self, message: impl AsRef<str>) {
        self.sink.line(&format!(
            "{} {} {}",
            self.kind.label(),
            self.name,
            message.as_ref()
        ));
    }

    /// Fail with `message` unless `ok`.
    pub fn require(&mut self, ok: bool, message: impl FnOnce() -> String) {
        if !ok {
            self.fail(message());
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Emit the final verdict line.
    pub fn finish(self) -> Report {
        let verdict = if self.failures.is_empty() {
            self.sink
                .line(&format!("{} {} is OK.", self.kind.label(), self.name));
            Verdict::Ok
        } else {
            self.sink.line(&format!(
                "{} {} is NOTOK. {}",
                self.kind.label(),
                self.name,
                self.failures[0]
            ));
            Verdict::NotOk
        };
        Report {
            kind: self.kind,
            name: self.name,
            verdict,
            failures: self.failures,
        }
    }

    /// Verdict for a resource discovery never resolved.
    ///
    /// Prints the discovery fault when it was anything other than "no match".
    fn absent(self, error: Option<&CheckError>) -> Report {
        let label = self.kind.label();
        let message = match error {
            None | Some(CheckError::NotFound { .. }) => {
                format!("Could not find a {} named {}", label, self.name)
            }
            Some(e) => format!("Could not look up a {} named {}: {}", label, self.name, e),
        };
        self.sink.line(&format!("{} is NOTOK. {}", label, message));
        Report {
            kind: self.kind,
            name: self.name,
            verdict: Verdict::NotOk,
            failures: vec![message],
        }
    }
}

/// Evaluates managed resources and reports their verdicts.
pub struct StatusAggregator {
    ctx: Arc<CloudContext>,
    sink: Arc<dyn StatusSink>,
}

impl StatusAggregator {
    pub fn new(ctx: Arc<CloudContext>, sink: Arc<dyn StatusSink>) -> Self {
        Self { ctx, sink }
    }

    /// Run every post-create readiness sub-check for `resource`.
    ///
    /// `error` is the fault discovery hit for it, reported for placeholders.
    pub async fn evaluate_readiness(
        &self,
        resource: &ManagedResource,
        error: Option<&CheckError>,
    ) -> Report {
        let mut list = Checklist::new(resource.kind(), resource.name(), self.sink.as_ref());
        let ctx = self.ctx.as_ref();

        match resource {
            ManagedResource::Network(r) => match &r.handle {
                Some(h) => checks::network::readiness(ctx, h, &mut list).await,
                None => return list.absent(error),
            },
            ManagedResource::TransitGateway(r) => match &r.handle {
                Some(h) => checks::transit_gateway::readiness(ctx, h, &mut list).await,
                None => return list.absent(error),
            },
            ManagedResource::VmInstance(r) => match &r.handle {
                Some(h) => checks::vm_instance::readiness(h, &mut list),
                None => return list.absent(error),
            },
            ManagedResource::ServiceInstance(r) => match &r.handle {
                Some(h) => {
                    checks::service_instance::readiness(ctx, h, r.power.as_deref(), &mut list)
                        .await
                }
                None => return list.absent(error),
            },
            ManagedResource::LoadBalancer(r) => match &r.handle {
                Some(h) => checks::load_balancer::readiness(ctx, r.role, h, &mut list).await,
                None => return list.absent(error),
            },
            ManagedResource::ObjectStore(r) => match &r.handle {
                Some(h) => checks::object_store::readiness(ctx, h, &mut list).await,
                None => return list.absent(error),
            },
            ManagedResource::Dns(r) => match &r.handle {
                Some(h) => checks::dns::readiness(ctx, h, &mut list).await,
                None => return list.absent(error),
            },
        }

        debug!(kind = %resource.kind(), name = %resource.name(), failed = list.has_failures(), "evaluated");
        list.finish()
    }

    /// Pre-flight sweep: verify no stray child objects are left behind.
    ///
    /// With `clean`, each stray is deleted; a failed delete is reported and
    /// the sweep continues.
    pub async fn evaluate_absence(
        &self,
        resource: &ManagedResource,
        error: Option<&CheckError>,
        clean: bool,
    ) -> Report {
        let mut list = Checklist::new(resource.kind(), resource.name(), self.sink.as_ref());

        match resource {
            ManagedResource::ServiceInstance(r) => match (&r.handle, r.power.as_deref()) {
                (Some(_), Some(power)) => {
                    checks::service_instance::absence(self.ctx.as_ref(), power, clean, &mut list)
                        .await
                }
                (Some(_), None) => list.fail("has no workspace client"),
                (None, _) => return list.absent(error),
            },
            // Nothing is swept below these kinds; presence is all that matters
            ManagedResource::Network(_)
            | ManagedResource::TransitGateway(_)
            | ManagedResource::VmInstance(_)
            | ManagedResource::LoadBalancer(_)
            | ManagedResource::ObjectStore(_)
            | ManagedResource::Dns(_) => {
                if !resource.is_resolved() {
                    return list.absent(error);
                }
            }
        }

        list.finish()
    }

    /// Evaluate every discovered resource in order.
    pub async fn report_all(&self, discovered: &[Discovered]) -> Vec<Report> {
        let mut reports = Vec::with_capacity(discovered.len());
        for d in discovered {
            reports.push(self.evaluate_readiness(&d.resource, d.error.as_ref()).await);
        }
        reports
    }
}
