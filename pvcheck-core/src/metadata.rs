//! Cluster metadata.
//!
//! Two file formats are accepted: the installer's `metadata.json` written
//! during cluster creation, and a flat file describing a CI environment.
//! Both are normalised into [`Metadata`], which answers per-kind target names.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{CheckError, Result};
use crate::resource::ResourceKind;

/// Installer `metadata.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateMetadata {
    #[serde(rename = "clusterName", default)]
    pub cluster_name: String,
    #[serde(rename = "clusterID", default)]
    pub cluster_id: String,
    #[serde(rename = "infraID", default)]
    pub infra_id: String,
    pub powervs: Option<PowerVsMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PowerVsMetadata {
    #[serde(rename = "BaseDomain", default)]
    pub base_domain: String,
    #[serde(rename = "cisInstanceCRN", default)]
    pub cis_instance_crn: String,
    #[serde(rename = "dnsInstanceCRN", default)]
    pub dns_instance_crn: String,
    #[serde(rename = "powerVSResourceGroup", default)]
    pub resource_group: String,
    #[serde(default)]
    pub region: String,
    #[serde(rename = "vpcRegion", default)]
    pub vpc_region: String,
    #[serde(default)]
    pub zone: String,
    #[serde(rename = "serviceInstanceGUID", default)]
    pub service_instance_guid: String,
    #[serde(rename = "transitGatewayName", default)]
    pub transit_gateway_name: String,
    #[serde(rename = "vpcName", default)]
    pub vpc_name: String,
}

/// CI environment description.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CiMetadata {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub vpc_region: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub resource_group: String,
    #[serde(default)]
    pub service_instance: String,
    #[serde(default)]
    pub vpc: String,
    #[serde(default)]
    pub transit_gateway: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataMode {
    Create,
    Ci,
}

/// Normalised metadata consumed read-only by discovery and evaluation.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub mode: MetadataMode,
    pub cluster_name: String,
    pub cluster_id: String,
    pub infra_id: String,
    pub base_domain: String,
    pub cis_instance_crn: String,
    pub region: String,
    pub vpc_region: String,
    pub zone: String,
    pub resource_group: String,
    service_instance: String,
    transit_gateway: String,
    vpc: String,
}

impl Metadata {
    pub fn from_create(create: CreateMetadata) -> Result<Self> {
        let powervs = create
            .powervs
            .ok_or_else(|| CheckError::Metadata("missing powervs section".to_string()))?;
        if create.cluster_name.is_empty() {
            return Err(CheckError::Metadata("missing clusterName".to_string()));
        }
        let vpc_region = resolve_vpc_region(&powervs.region, &powervs.vpc_region)?;

        Ok(Self {
            mode: MetadataMode::Create,
            cluster_name: create.cluster_name,
            cluster_id: create.cluster_id,
            infra_id: create.infra_id,
            base_domain: powervs.base_domain,
            cis_instance_crn: powervs.cis_instance_crn,
            region: powervs.region,
            vpc_region,
            zone: powervs.zone,
            resource_group: powervs.resource_group,
            service_instance: powervs.service_instance_guid,
            transit_gateway: powervs.transit_gateway_name,
            vpc: powervs.vpc_name,
        })
    }

    pub fn from_ci(ci: CiMetadata) -> Result<Self> {
        if ci.service_instance.is_empty() {
            return Err(CheckError::Metadata("missing serviceInstance".to_string()));
        }
        let vpc_region = resolve_vpc_region(&ci.region, &ci.vpc_region)?;
        Ok(Self {
            mode: MetadataMode::Ci,
            cluster_name: String::new(),
            cluster_id: String::new(),
            infra_id: String::new(),
            base_domain: String::new(),
            cis_instance_crn: String::new(),
            region: ci.region,
            vpc_region,
            zone: ci.zone,
            resource_group: ci.resource_group,
            service_instance: ci.service_instance,
            transit_gateway: ci.transit_gateway,
            vpc: ci.vpc,
        })
    }

    /// Read an installer `metadata.json`.
    pub fn load_create(path: &Path) -> Result<Self> {
        let create: CreateMetadata = read_json(path)?;
        debug!(path = %path.display(), cluster = %create.cluster_name, "loaded create metadata");
        Self::from_create(create)
    }

    /// Read a CI metadata file.
    pub fn load_ci(path: &Path) -> Result<Self> {
        let ci: CiMetadata = read_json(path)?;
        debug!(path = %path.display(), region = %ci.region, "loaded CI metadata");
        Self::from_ci(ci)
    }

    /// Kinds that make sense for this metadata.
    pub fn kinds(&self) -> &'static [ResourceKind] {
        match self.mode {
            MetadataMode::Create => &ResourceKind::ALL,
            MetadataMode::Ci => &[
                ResourceKind::Network,
                ResourceKind::TransitGateway,
                ResourceKind::ServiceInstance,
            ],
        }
    }

    /// Logical name to discover for `kind`.
    ///
    /// `None` means the kind is not wanted for this run: CI metadata may leave
    /// the VPC or transit gateway blank when the workspace has neither.
    pub fn target_name(&self, kind: ResourceKind) -> Result<Option<String>> {
        match self.mode {
            MetadataMode::Ci => {
                let name = match kind {
                    ResourceKind::ServiceInstance => &self.service_instance,
                    ResourceKind::Network => &self.vpc,
                    ResourceKind::TransitGateway => &self.transit_gateway,
                    other => {
                        return Err(CheckError::Metadata(format!(
                            "{} is not described by CI metadata",
                            other
                        )))
                    }
                };
                Ok((!name.is_empty()).then(|| name.clone()))
            }
            MetadataMode::Create => Ok(Some(match kind {
                ResourceKind::ObjectStore => format!("{}-cos", self.infra_id),
                ResourceKind::LoadBalancer | ResourceKind::VmInstance => {
                    self.cluster_name.clone()
                }
                ResourceKind::ServiceInstance => {
                    non_empty_or(&self.service_instance, || self.cluster_name.clone())
                }
                ResourceKind::Network => {
                    non_empty_or(&self.vpc, || format!("vpc-{}", self.cluster_name))
                }
                ResourceKind::TransitGateway => {
                    non_empty_or(&self.transit_gateway, || format!("{}-tg", self.infra_id))
                }
                ResourceKind::Dns => self.base_domain.clone(),
            })),
        }
    }
}

fn non_empty_or(value: &str, fallback: impl FnOnce() -> String) -> String {
    if value.is_empty() {
        fallback()
    } else {
        value.to_string()
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CheckError::Metadata(format!("reading {}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| CheckError::Metadata(format!("parsing {}: {}", path.display(), e)))
}

fn resolve_vpc_region(region: &str, vpc_region: &str) -> Result<String> {
    if !vpc_region.is_empty() {
        return Ok(vpc_region.to_string());
    }
    vpc_region_for(region).map(str::to_string).ok_or_else(|| {
        CheckError::Metadata(format!(
            "VPC region corresponding to a PowerVS region {} not found",
            region
        ))
    })
}

/// VPC region paired with a PowerVS region.
pub fn vpc_region_for(powervs_region: &str) -> Option<&'static str> {
    let vpc = match powervs_region {
        "dal" => "us-south",
        "eu-de" => "eu-de",
        "lon" => "eu-gb",
        "mad" => "eu-es",
        "osa" => "jp-osa",
        "sao" => "br-sao",
        "syd" => "au-syd",
        "tor" => "ca-tor",
        "us-east" => "us-east",
        "us-south" => "us-south",
        "wdc" => "us-east",
        _ => return None,
    };
    Some(vpc)
}
