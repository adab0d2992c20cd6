//! `oc` as a status source.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;

use async_trait::async_trait;
use pvcheck_core::error::{CheckError, Result};
use pvcheck_core::StatusQuery;
use pvcheck_core::watch::StatusSource;
use regex::Regex;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

/// Server-side bound for every request `oc` makes.
const REQUEST_TIMEOUT: &str = "--request-timeout=5s";

/// Commands printed by `check-kubeconfig`, each run with `oc`.
pub const DIAGNOSTICS: &[&str] = &[
    "get clusterversion",
    "get co",
    "get nodes -o=wide",
    "get pods -n openshift-machine-api",
    "get machines.machine.openshift.io -n openshift-machine-api",
    "get machineset.machine.openshift.io -n openshift-machine-api",
    "logs -l k8s-app=controller -c machine-controller -n openshift-machine-api",
    "get co/cloud-controller-manager",
    "describe cm/cloud-provider-config -n openshift-config",
    "get pods -n openshift-cloud-controller-manager-operator",
    "get events -n openshift-cloud-controller-manager",
    "logs -l k8s-app=powervs-cloud-controller-manager -n openshift-cloud-controller-manager",
    "-n openshift-cloud-controller-manager-operator logs deployment/cluster-cloud-controller-manager-operator -c cluster-cloud-controller-manager",
    "get co/network",
    "describe co/machine-config",
    "get pods -A -o=wide",
];

/// Cluster API objects whose conditions `check-capi-kubeconfig` prints.
pub const CAPI_RESOURCES: &[&str] = &["ibmpowervscluster", "ibmpowervsimage", "ibmpowervsmachines"];

pub const CAPI_NAMESPACE: &str = "openshift-cluster-api-guests";

/// Directory the installer writes the local control plane's kubeconfig into.
const CAPI_OUTPUT_DIR: &str = ".clusterapi_output";

/// Separator printed before each diagnostic.
pub const SEPARATOR: &str =
    "8<--------8<--------8<--------8<--------8<--------8<--------8<--------8<--------";

/// Runs `oc` with `KUBECONFIG` pointing at the query's kubeconfig.
#[derive(Debug, Clone)]
pub struct OcStatusSource {
    program: PathBuf,
}

impl Default for OcStatusSource {
    fn default() -> Self {
        Self::new("oc")
    }
}

impl OcStatusSource {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run `oc` and return its stdout. A non-zero exit is an error carrying stderr.
    pub async fn run<S: AsRef<str>>(&self, kubeconfig: &Path, args: &[S]) -> Result<String> {
        let mut command = Command::new(&self.program);
        command
            .arg(REQUEST_TIMEOUT)
            .args(args.iter().map(|a| a.as_ref()))
            .env("KUBECONFIG", kubeconfig)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!(program = %self.program.display(), kubeconfig = %kubeconfig.display(), "running oc");
        let output = command.output().await.map_err(|e| {
            CheckError::StatusSource(format!("could not run {}: {}", self.program.display(), e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CheckError::StatusSource(format!(
                "oc exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl StatusSource for OcStatusSource {
    async fn fetch(&self, query: &StatusQuery) -> Result<Value> {
        let stdout = self.run(&query.kubeconfig, &query.args).await?;
        serde_json::from_str(&stdout).map_err(|e| {
            CheckError::StatusSource(format!("{} did not return JSON: {}", query.describe(), e))
        })
    }
}

/// Arguments listing every `resource` of the Cluster API namespace as JSON.
pub fn capi_args(resource: &str) -> [&str; 6] {
    ["get", resource, "-n", CAPI_NAMESPACE, "-o", "json"]
}

/// Every `.items[].status.conditions[]` entry of a list document.
pub fn item_conditions(doc: &Value) -> Vec<&Value> {
    doc.get("items")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.pointer("/status/conditions").and_then(Value::as_array))
        .flatten()
        .collect()
}

/// The installer log belonging to a kubeconfig under `.clusterapi_output`.
pub fn install_log_for(kubeconfig: &Path) -> Option<PathBuf> {
    let path = kubeconfig.to_str()?;
    let idx = path.find(CAPI_OUTPUT_DIR)?;
    Some(PathBuf::from(format!("{}.openshift_install.log", &path[..idx])))
}

/// Installer log lines about Cluster API progress, warnings and errors.
pub fn install_log_highlights(log: &str) -> Vec<&str> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(pattern) = PATTERN.get_or_init(|| {
        Regex::new(
            "Cluster API|level=info|level=warning|level=error|Created manifest|InfraReady|PostProvision|[Ff]ound internal [Ii][Pp] for VM from DHCP lease",
        )
        .ok()
    }) else {
        return Vec::new();
    };
    log.lines().filter(|line| pattern.is_match(line)).collect()
}

/// Split a diagnostic line into `oc` arguments.
pub fn diagnostic_args(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}
