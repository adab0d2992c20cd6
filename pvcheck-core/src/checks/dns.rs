//! DNS zone checks.
//!
//! The cluster needs `api-int`, `api` and `*.apps` records under
//! `{cluster}.{baseDomain}` and nothing else.

use regex::Regex;

use crate::error::Result;
use crate::provider::{CloudContext, DnsRecord, ZoneRecord};
use crate::status::Checklist;

const RECORD_PAGE: u32 = 20;

/// Fully-qualified record names expected for `cluster` in `base_domain`.
pub fn expected_records(cluster: &str, base_domain: &str) -> [String; 3] {
    [
        format!("api-int.{}.{}", cluster, base_domain),
        format!("api.{}.{}", cluster, base_domain),
        format!("*.apps.{}.{}", cluster, base_domain),
    ]
}

pub async fn readiness(ctx: &CloudContext, zone: &ZoneRecord, list: &mut Checklist<'_>) {
    let cluster = &ctx.metadata.cluster_name;
    let base = &ctx.metadata.base_domain;
    let suffix = format!("{}.{}", cluster, base);

    let records = match cluster_records(ctx, zone, &suffix).await {
        Ok(records) => records,
        Err(e) => {
            list.fail(format!("could not list records: {}", e));
            return;
        }
    };

    for wanted in expected_records(cluster, base) {
        match records.iter().find(|r| r.name == wanted) {
            Some(record) => list.note(format!(
                "found {} record {} -> {}",
                record.kind, record.name, record.content
            )),
            None => list.fail(format!("could not find record {}", wanted)),
        }
    }
    list.require(records.len() == 3, || {
        format!("found {} records for {}, expected 3", records.len(), suffix)
    });
}

/// Every record whose name or content ends with `suffix`.
async fn cluster_records(
    ctx: &CloudContext,
    zone: &ZoneRecord,
    suffix: &str,
) -> Result<Vec<DnsRecord>> {
    let dns = ctx.dns()?;
    let pattern = Regex::new(&format!(".*{}$", regex::escape(suffix)))
        .map_err(|e| crate::error::CheckError::Provider(e.to_string()))?;

    let mut matched = Vec::new();
    let mut seen = 0u32;
    let mut page = 1;
    loop {
        let result = ctx
            .call(dns.list_records(&zone.id, page, RECORD_PAGE))
            .await?;
        if result.records.is_empty() {
            break;
        }
        seen += result.records.len() as u32;
        matched.extend(
            result
                .records
                .into_iter()
                .filter(|r| pattern.is_match(&r.name) || pattern.is_match(&r.content)),
        );
        if seen >= result.total_count {
            break;
        }
        page += 1;
    }
    Ok(matched)
}
