//! pvcheck engine
//!
//! Discovers the cloud resources a PowerVS OpenShift cluster depends on,
//! evaluates their readiness, and watches install phases until the cluster
//! reports itself ready.
//!
//! # Example
//! ```ignore
//! use pvcheck_core::{Checker, CloudContext, ConsoleSink};
//!
//! let checker = Checker::new(Arc::new(ctx), Arc::new(ConsoleSink));
//! for report in checker.run_create().await? {
//!     println!("{} {}: {}", report.kind, report.name, report.verdict);
//! }
//! ```

pub mod check;
pub mod checks;
pub mod condition;
pub mod config;
pub mod discovery;
pub mod error;
pub mod faults;
pub mod metadata;
pub mod phase;
pub mod provider;
pub mod registry;
pub mod resource;
pub mod scheduler;
pub mod sink;
pub mod status;
pub mod watch;

pub use check::Checker;
pub use condition::{extract, Condition, Extraction, Extractor};
pub use config::{CheckConfig, DiscoveryStrategy, MatchMode, PhaseLimits};
pub use error::{CheckError, ExtractError, Result};
pub use faults::FaultSet;
pub use metadata::{Metadata, MetadataMode};
pub use phase::{capi_phases, openshift_phases, Phase, StatusQuery};
pub use provider::CloudContext;
pub use registry::{Discovered, Registry};
pub use resource::{LoadBalancerRole, ManagedResource, ResourceKind};
pub use scheduler::Scheduler;
pub use sink::{BufferSink, ConsoleSink, StatusSink};
pub use status::{Report, StatusAggregator, Verdict};
pub use watch::{LoadBalancerProbe, PhaseOutcome, PhaseWatcher, StatusSource, WatchReport};
