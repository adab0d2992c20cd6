//! IBM Cloud backends for pvcheck.
//!
//! Implements the provider ports of `pvcheck-core` over the public REST
//! APIs and assembles them into a [`CloudContext`].
//!
//! # Example
//! ```ignore
//! let metadata = Metadata::load_create(Path::new("metadata.json"))?;
//! let endpoints = Endpoints::for_regions(&metadata.region, &metadata.vpc_region);
//! let ctx = pvcheck_cloud::connect(&api_key, metadata, CheckConfig::default(), &endpoints).await?;
//! ```

pub mod auth;
pub mod clients;
pub mod error;

use std::sync::Arc;

use pvcheck_core::provider::DnsApi;
use pvcheck_core::{CheckConfig, CloudContext, Metadata};
use tracing::info;

pub use auth::Authenticator;
pub use error::{ApiError, Result};

use clients::rest::TokenHeader;
use clients::{
    ControllerClient, CosClient, DnsClient, PowerClientFactory, RestClient, SearchClient,
    TransitClient, VpcClient,
};

/// Service roots. Production values come from [`Endpoints::for_regions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub iam_token: String,
    pub vpc: String,
    pub resource_controller: String,
    pub transit: String,
    pub search: String,
    pub cis: String,
    pub cos: String,
    pub power: String,
}

impl Endpoints {
    /// Public endpoints for a PowerVS `region` and its paired `vpc_region`.
    pub fn for_regions(region: &str, vpc_region: &str) -> Self {
        Self {
            iam_token: "https://iam.cloud.ibm.com/identity/token".to_string(),
            vpc: format!("https://{}.iaas.cloud.ibm.com/v1", vpc_region),
            resource_controller: "https://resource-controller.cloud.ibm.com".to_string(),
            transit: "https://transit.cloud.ibm.com/v1".to_string(),
            search: "https://api.global-search-tagging.cloud.ibm.com".to_string(),
            cis: "https://api.cis.cloud.ibm.com".to_string(),
            cos: format!("https://s3.{}.cloud-object-storage.appdomain.cloud", vpc_region),
            power: format!("https://{}.power-iaas.cloud.ibm.com", region),
        }
    }

    /// Every service under one root, for local mock servers.
    pub fn local(root: &str) -> Self {
        Self {
            iam_token: format!("{}/identity/token", root),
            vpc: format!("{}/v1", root),
            resource_controller: root.to_string(),
            transit: format!("{}/transit/v1", root),
            search: root.to_string(),
            cis: format!("{}/cis", root),
            cos: format!("{}/cos", root),
            power: root.to_string(),
        }
    }
}

/// Authenticate and build every provider handle for one run.
///
/// The token is fetched up front so a bad API key fails before any resource
/// work starts.
pub async fn connect(
    api_key: &str,
    metadata: Metadata,
    config: CheckConfig,
    endpoints: &Endpoints,
) -> Result<CloudContext> {
    let client = reqwest::Client::builder()
        .timeout(config.call_timeout)
        .build()?;
    let auth = Arc::new(Authenticator::new(
        client.clone(),
        api_key,
        endpoints.iam_token.clone(),
    ));
    auth.token().await?;
    info!(region = %metadata.region, vpc_region = %metadata.vpc_region, "authenticated");

    let rest = RestClient::new(client, auth);
    let dns: Option<Arc<dyn DnsApi>> = if metadata.cis_instance_crn.is_empty() {
        None
    } else {
        let cis = rest.clone().with_token_header(TokenHeader::UserToken);
        Some(Arc::new(DnsClient::new(
            cis,
            &endpoints.cis,
            &metadata.cis_instance_crn,
        )))
    };

    Ok(CloudContext {
        vpc: Arc::new(VpcClient::new(rest.clone(), endpoints.vpc.clone())),
        controller: Arc::new(ControllerClient::new(
            rest.clone(),
            endpoints.resource_controller.clone(),
        )),
        transit: Arc::new(TransitClient::new(rest.clone(), endpoints.transit.clone())),
        search: Arc::new(SearchClient::new(rest.clone(), endpoints.search.clone())),
        dns,
        cos: Arc::new(CosClient::new(rest.clone(), endpoints.cos.clone())),
        power: Arc::new(PowerClientFactory::new(rest, endpoints.power.clone())),
        metadata,
        config,
    })
}
