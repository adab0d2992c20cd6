//! Cloud Object Storage client (S3-compatible XML API).

use async_trait::async_trait;
use pvcheck_core::provider::{ObjectRecord, ObjectStorageApi};
use pvcheck_core::Result;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use super::rest::{segment, RestClient};
use crate::error::ApiError;

pub struct CosClient {
    rest: RestClient,
    /// e.g. `https://s3.us-south.cloud-object-storage.appdomain.cloud`
    base: String,
}

impl CosClient {
    pub fn new(rest: RestClient, base: impl Into<String>) -> Self {
        Self {
            rest,
            base: base.into(),
        }
    }
}

#[async_trait]
impl ObjectStorageApi for CosClient {
    async fn list_buckets(&self, instance_guid: &str) -> Result<Vec<String>> {
        let rest = self
            .rest
            .clone()
            .with_header("ibm-service-instance-id", instance_guid);
        let body = rest.get_text(&format!("{}/", self.base), &[]).await?;
        let listing = parse_listing(&body)?;
        Ok(listing.buckets)
    }

    async fn list_objects(&self, instance_guid: &str, bucket: &str) -> Result<Vec<ObjectRecord>> {
        let rest = self
            .rest
            .clone()
            .with_header("ibm-service-instance-id", instance_guid);
        let url = format!("{}/{}", self.base, segment(bucket));

        let mut objects = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let query: Vec<(&str, String)> = marker
                .take()
                .map(|m| vec![("marker", m)])
                .unwrap_or_default();
            let body = rest.get_text(&url, &query).await?;
            let listing = parse_listing(&body)?;
            let last = listing.objects.last().map(|o| o.key.clone());
            objects.extend(listing.objects);
            match (listing.truncated, last) {
                (true, Some(key)) => marker = Some(key),
                _ => return Ok(objects),
            }
        }
    }
}

/// Everything of interest in a bucket or object listing.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Listing {
    pub buckets: Vec<String>,
    pub objects: Vec<ObjectRecord>,
    pub truncated: bool,
}

/// Parse `ListAllMyBucketsResult` or `ListBucketResult` XML.
pub fn parse_listing(xml: &str) -> std::result::Result<Listing, ApiError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut listing = Listing::default();
    let mut path: Vec<String> = Vec::new();
    let mut current: Option<ObjectRecord> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "Contents" {
                    current = Some(ObjectRecord::default());
                }
                path.push(name);
            }
            Ok(Event::End(_)) => {
                if path.pop().as_deref() == Some("Contents") {
                    if let Some(object) = current.take() {
                        listing.objects.push(object);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| ApiError::Decode(format!("listing text: {}", e)))?
                    .into_owned();
                let leaf = path.last().map(String::as_str);
                let parent = path.len().checked_sub(2).map(|i| path[i].as_str());
                match (parent, leaf) {
                    (Some("Bucket"), Some("Name")) => listing.buckets.push(text),
                    (Some("Contents"), Some("Key")) => {
                        if let Some(object) = current.as_mut() {
                            object.key = text;
                        }
                    }
                    (Some("Contents"), Some("Size")) => {
                        if let Some(object) = current.as_mut() {
                            object.size = text.parse().unwrap_or(0);
                        }
                    }
                    (_, Some("IsTruncated")) => listing.truncated = text == "true",
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ApiError::Decode(format!(
                    "listing at {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }
    Ok(listing)
}
