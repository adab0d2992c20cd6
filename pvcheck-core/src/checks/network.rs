//! Virtual Private Cloud checks.

use crate::provider::{CloudContext, VpcRecord};
use crate::status::Checklist;

/// A cluster VPC needs at least this many subnets (one per zone).
pub const MIN_SUBNETS: usize = 3;

pub async fn readiness(ctx: &CloudContext, vpc: &VpcRecord, list: &mut Checklist<'_>) {
    list.require(vpc.health_state == "ok", || {
        format!("health state is {}, expected ok", vpc.health_state)
    });

    let subnets = match ctx.call(ctx.vpc.list_subnets(&vpc.id)).await {
        Ok(subnets) => subnets,
        Err(e) => {
            list.fail(format!("could not list subnets: {}", e));
            return;
        }
    };

    for subnet in &subnets {
        list.require(subnet.status == "available", || {
            format!("subnet {} is {}, expected available", subnet.name, subnet.status)
        });
    }
    list.require(subnets.len() >= MIN_SUBNETS, || {
        format!(
            "has {} subnets, expected at least {}",
            subnets.len(),
            MIN_SUBNETS
        )
    });
}
