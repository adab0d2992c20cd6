//! Clients for the IBM Cloud services pvcheck reads.
//!
//! - VPC: VPCs, subnets, load balancers, instances
//! - Resource controller: Power workspaces, COS instances, resource groups
//! - Transit gateway, global search, CIS DNS, COS and Power workspaces

pub mod controller;
pub mod cos;
pub mod dns;
pub mod power;
pub mod rest;
pub mod search;
pub mod transit;
pub mod vpc;

pub use controller::ControllerClient;
pub use cos::CosClient;
pub use dns::DnsClient;
pub use power::{PowerClient, PowerClientFactory};
pub use rest::RestClient;
pub use search::SearchClient;
pub use transit::TransitClient;
pub use vpc::VpcClient;
