//! Watch phases.
//!
//! A phase is static configuration: what to fetch, how to read it, and when
//! it counts as complete. [`evaluate_pass`] turns one fetched document into
//! either report lines plus a completion flag, or an inconclusive pass when
//! extraction recorded a fault.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;

use crate::condition::{extract_deployment, extract_machines, extract_operator, Extractor, OperatorConditions};
use crate::config::{PhaseLimits, DEFAULT_RETRY_INTERVAL};
use crate::error::ExtractError;
use crate::resource::{PoolRequirement, MACHINE_CONFIG_POOL};

/// Namespace holding the cluster-API objects during install.
pub const CAPI_NAMESPACE: &str = "openshift-cluster-api-guests";

/// Conditions the cluster-API cluster object must report.
pub const CLUSTER_CONDITIONS: [&str; 8] = [
    "COSInstanceCreated",
    "LoadBalancerReady",
    "NetworkReady",
    "ServiceInstanceReady",
    "TransitGatewayReady",
    "VPCReady",
    "VPCSecurityGroupReady",
    "VPCSubnetReady",
];

/// A point-in-time status request against the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusQuery {
    pub kubeconfig: PathBuf,
    /// Arguments after `oc`, e.g. `["get", "co", "-o", "json"]`.
    pub args: Vec<String>,
}

impl StatusQuery {
    pub fn new(kubeconfig: impl Into<PathBuf>, args: &[&str]) -> Self {
        Self {
            kubeconfig: kubeconfig.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn describe(&self) -> String {
        self.args.join(" ")
    }
}

/// How a conditions document is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionShape {
    /// `status.conditions` of every item.
    Conditions,
    /// One condition per item from `status.ready` and `status.addresses`.
    Machines,
}

/// What a phase checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseCheck {
    Conditions {
        query: StatusQuery,
        shape: ConditionShape,
        /// Exact number of items the document must hold, if fixed.
        exact_items: Option<usize>,
        /// Exact number of conditions required for completion.
        expected_count: usize,
        /// Condition types this phase reports. Empty means all.
        required_types: Vec<String>,
        require_ready_flag: bool,
    },
    /// A cluster operator in `oc get co` output must be Available.
    Operator { query: StatusQuery, name: String },
    /// A single deployment object must be Available.
    Deployment { query: StatusQuery, name: String },
    /// A load balancer pool must have a healthy member.
    PoolHealthy { pool: PoolRequirement },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub ordinal: usize,
    pub name: String,
    pub check: PhaseCheck,
    pub retry_interval: Duration,
    pub limits: PhaseLimits,
}

impl Phase {
    pub fn new(ordinal: usize, name: impl Into<String>, check: PhaseCheck) -> Self {
        Self {
            ordinal,
            name: name.into(),
            check,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            limits: PhaseLimits::default(),
        }
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_limits(mut self, limits: PhaseLimits) -> Self {
        self.limits = limits;
        self
    }

    /// The status query this phase fetches, if it reads a document.
    pub fn query(&self) -> Option<&StatusQuery> {
        match &self.check {
            PhaseCheck::Conditions { query, .. }
            | PhaseCheck::Operator { query, .. }
            | PhaseCheck::Deployment { query, .. } => Some(query),
            PhaseCheck::PoolHealthy { .. } => None,
        }
    }
}

/// A report line, keyed so a dashboard sink can update it in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub key: String,
    pub text: String,
}

impl StatusLine {
    fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
        }
    }
}

/// Result of evaluating one fetched document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pass {
    /// Extraction recorded a fault; completion was not evaluated.
    Inconclusive(ExtractError),
    Evaluated {
        complete: bool,
        lines: Vec<StatusLine>,
    },
}

impl Pass {
    pub fn is_complete(&self) -> bool {
        matches!(self, Pass::Evaluated { complete: true, .. })
    }
}

/// Evaluate one document against a document-reading phase check.
///
/// Pool checks do not read documents and always evaluate as incomplete here.
pub fn evaluate_pass(check: &PhaseCheck, document: &Value) -> Pass {
    match check {
        PhaseCheck::Conditions {
            shape,
            exact_items,
            expected_count,
            required_types,
            require_ready_flag,
            ..
        } => {
            let mut extraction = match (shape, exact_items) {
                (ConditionShape::Conditions, Some(n)) => {
                    Extractor::strict().extract_exact(document, *n)
                }
                (ConditionShape::Conditions, None) => Extractor::strict().extract(document),
                (ConditionShape::Machines, _) => extract_machines(document),
            };
            if let Some(fault) = extraction.faults.drain() {
                return Pass::Inconclusive(fault);
            }

            let mut lines = Vec::new();
            let mut satisfied = true;
            for condition in &extraction.conditions {
                match shape {
                    ConditionShape::Conditions => {
                        if !required_types.is_empty() && !required_types.contains(&condition.kind) {
                            continue;
                        }
                        let state = if condition.status { "READY" } else { "NOT READY" };
                        satisfied &= condition.status;
                        lines.push(StatusLine::new(
                            condition.kind.clone(),
                            format!("{} is {}", condition.kind, state),
                        ));
                    }
                    ConditionShape::Machines => {
                        let name = condition.name.clone().unwrap_or_default();
                        let state = if condition.status { "READY" } else { "NOT READY" };
                        let address = match condition.address.as_deref() {
                            Some(a) => format!("address is {}", a),
                            None => "address is empty".to_string(),
                        };
                        satisfied &= condition.status && condition.address.is_some();
                        lines.push(StatusLine::new(
                            name.clone(),
                            format!("{} is {}, {}", name, state, address),
                        ));
                    }
                }
            }

            // Every required type must be present, not just true where seen
            let all_present = required_types
                .iter()
                .all(|t| extraction.conditions.iter().any(|c| &c.kind == t));
            satisfied &= all_present;

            let ready_ok = if *require_ready_flag {
                let ready = extraction.ready == Some(true);
                if satisfied {
                    let state = if ready { "READY" } else { "NOT READY" };
                    lines.push(StatusLine::new("Cluster", format!("Cluster is {}", state)));
                }
                ready
            } else {
                true
            };

            let complete =
                satisfied && extraction.conditions.len() == *expected_count && ready_ok;
            Pass::Evaluated { complete, lines }
        }
        PhaseCheck::Operator { name, .. } => {
            let (conditions, mut faults) = extract_operator(document, name);
            if let Some(fault) = faults.drain() {
                return Pass::Inconclusive(fault);
            }
            let text = format!(
                "The {} cluster operator is: {}",
                name,
                operator_summary(&conditions, true)
            );
            Pass::Evaluated {
                complete: conditions.is_available(),
                lines: vec![StatusLine::new(name.clone(), text)],
            }
        }
        PhaseCheck::Deployment { name, .. } => {
            let (conditions, mut faults) = extract_deployment(document);
            if let Some(fault) = faults.drain() {
                return Pass::Inconclusive(fault);
            }
            let text = format!(
                "The deployment of {} is: {}",
                name,
                operator_summary(&conditions, false)
            );
            Pass::Evaluated {
                complete: conditions.is_available(),
                lines: vec![StatusLine::new(name.clone(), text)],
            }
        }
        PhaseCheck::PoolHealthy { .. } => Pass::Evaluated {
            complete: false,
            lines: Vec::new(),
        },
    }
}

/// Render one operator condition: `LABEL`, `NOT LABEL`, `(EMPTY) LABEL` or
/// `(ERROR value) LABEL`.
pub fn render_status(status: &str, label: &str) -> String {
    match status {
        "True" => label.to_string(),
        "False" => format!("NOT {}", label),
        "" => format!("(EMPTY) {}", label),
        other => format!("(ERROR {}) {}", other, label),
    }
}

fn operator_summary(c: &OperatorConditions, full: bool) -> String {
    if !full {
        return render_status(&c.available, "AVAILABLE");
    }
    [
        render_status(&c.available, "AVAILABLE"),
        render_status(&c.degraded, "DEGRADED"),
        render_status(&c.progressing, "PROGRESSING"),
        render_status(&c.upgradeable, "UPGRADEABLE"),
    ]
    .join(", ")
}

/// Cluster-API phases, read through the installer's envtest kubeconfig.
pub fn capi_phases(install_dir: &Path) -> Vec<Phase> {
    let kubeconfig = install_dir.join(".clusterapi_output/envtest.kubeconfig");
    let get = |resource: &str| {
        StatusQuery::new(
            &kubeconfig,
            &["get", resource, "-n", CAPI_NAMESPACE, "-o", "json"],
        )
    };

    vec![
        Phase::new(
            1,
            "cluster-infrastructure-ready",
            PhaseCheck::Conditions {
                query: get("ibmpowervscluster"),
                shape: ConditionShape::Conditions,
                exact_items: Some(1),
                expected_count: CLUSTER_CONDITIONS.len(),
                required_types: CLUSTER_CONDITIONS.iter().map(|s| s.to_string()).collect(),
                require_ready_flag: true,
            },
        ),
        Phase::new(
            2,
            "image-import-ready",
            PhaseCheck::Conditions {
                query: get("ibmpowervsimage"),
                shape: ConditionShape::Conditions,
                exact_items: None,
                expected_count: 2,
                required_types: Vec::new(),
                require_ready_flag: false,
            },
        ),
        Phase::new(
            3,
            "node-provisioning-ready",
            PhaseCheck::Conditions {
                query: get("ibmpowervsmachines"),
                shape: ConditionShape::Machines,
                exact_items: None,
                expected_count: 4,
                required_types: Vec::new(),
                require_ready_flag: false,
            },
        ),
    ]
}

/// OpenShift phases, read through the cluster's admin kubeconfig.
pub fn openshift_phases(install_dir: &Path) -> Vec<Phase> {
    let kubeconfig = install_dir.join("auth/kubeconfig");
    let operators = StatusQuery::new(&kubeconfig, &["get", "co", "-o", "json"]);

    vec![
        Phase::new(
            1,
            "ingress-pool-healthy",
            PhaseCheck::PoolHealthy {
                pool: MACHINE_CONFIG_POOL,
            },
        ),
        Phase::new(
            2,
            "network-operator-available",
            PhaseCheck::Operator {
                query: operators.clone(),
                name: "network".to_string(),
            },
        ),
        Phase::new(
            3,
            "cloud-controller-available",
            PhaseCheck::Deployment {
                query: StatusQuery::new(
                    &kubeconfig,
                    &[
                        "get",
                        "deployment/powervs-cloud-controller-manager",
                        "-n",
                        "openshift-cloud-controller-manager",
                        "-o",
                        "json",
                    ],
                ),
                name: "powervs-cloud-controller-manager".to_string(),
            },
        ),
        Phase::new(
            4,
            "platform-operator-available",
            PhaseCheck::Operator {
                query: operators,
                name: "authentication".to_string(),
            },
        ),
    ]
}
