//! Per-kind readiness checks.
//!
//! Each module inspects one resolved resource and records failures in a
//! [`Checklist`](crate::status::Checklist). Provider errors during a
//! sub-check are failures of that sub-check, not of the whole evaluation.

pub mod dns;
pub mod load_balancer;
pub mod network;
pub mod object_store;
pub mod service_instance;
pub mod transit_gateway;
pub mod vm_instance;
