//! Load balancer checks.

use crate::error::Result;
use crate::provider::{CloudContext, LoadBalancerRecord};
use crate::resource::{LoadBalancerRole, PoolRequirement};
use crate::status::Checklist;

/// Health of one required pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolHealth {
    Missing,
    Healthy { pool: String, healthy_members: usize },
    Unhealthy { pool: String },
}

impl PoolHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, PoolHealth::Healthy { .. })
    }
}

/// Look up the pool matching `requirement` and count members reporting `ok`.
pub async fn pool_health(
    ctx: &CloudContext,
    lb: &LoadBalancerRecord,
    requirement: &PoolRequirement,
) -> Result<PoolHealth> {
    let Some(pool) = lb
        .pools
        .iter()
        .find(|p| requirement.names.contains(&p.name.as_str()))
    else {
        return Ok(PoolHealth::Missing);
    };

    let members = ctx
        .call(ctx.vpc.list_pool_members(&lb.id, &pool.id))
        .await?;
    let healthy = members.iter().filter(|m| m.health == "ok").count();
    Ok(if healthy > 0 {
        PoolHealth::Healthy {
            pool: pool.name.clone(),
            healthy_members: healthy,
        }
    } else {
        PoolHealth::Unhealthy {
            pool: pool.name.clone(),
        }
    })
}

pub async fn readiness(
    ctx: &CloudContext,
    role: LoadBalancerRole,
    lb: &LoadBalancerRecord,
    list: &mut Checklist<'_>,
) {
    list.require(lb.operating_status == "online", || {
        format!("operating status is {}, expected online", lb.operating_status)
    });

    for requirement in role.required_pools() {
        match pool_health(ctx, lb, requirement).await {
            Ok(PoolHealth::Healthy {
                pool,
                healthy_members,
            }) => list.note(format!(
                "found {} healthy members of pool {} ({})",
                healthy_members, pool, requirement.label
            )),
            Ok(PoolHealth::Unhealthy { pool }) => list.fail(format!(
                "did not find a healthy member of pool {} ({})",
                pool, requirement.label
            )),
            Ok(PoolHealth::Missing) => {
                list.fail(format!("could not find pool {}", requirement.label))
            }
            Err(e) => list.fail(format!(
                "could not list members of pool {}: {}",
                requirement.label, e
            )),
        }
    }
}
