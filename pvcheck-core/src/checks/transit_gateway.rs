//! Transit gateway checks.
//!
//! A cluster gateway joins exactly one Power workspace and exactly one VPC.

use crate::error::Result;
use crate::provider::{CloudContext, ConnectionRecord, TransitGatewayRecord};
use crate::status::Checklist;

const CONNECTION_PAGE: u32 = 32;

pub async fn readiness(ctx: &CloudContext, tg: &TransitGatewayRecord, list: &mut Checklist<'_>) {
    list.require(tg.status == "available", || {
        format!("status is {}, expected available", tg.status)
    });

    let connections = match connections(ctx, &tg.id).await {
        Ok(connections) => connections,
        Err(e) => {
            list.fail(format!("could not list connections: {}", e));
            return;
        }
    };

    for network_type in ["power_virtual_server", "vpc"] {
        let count = connections
            .iter()
            .filter(|c| c.network_type == network_type)
            .count();
        list.require(count == 1, || {
            format!("has {} {} connections, expected 1", count, network_type)
        });
    }
}

async fn connections(ctx: &CloudContext, gateway_id: &str) -> Result<Vec<ConnectionRecord>> {
    let mut all = Vec::new();
    let mut start: Option<String> = None;
    loop {
        let page = ctx
            .call(
                ctx.transit
                    .list_connections(gateway_id, start.as_deref(), CONNECTION_PAGE),
            )
            .await?;
        let empty = page.items.is_empty();
        all.extend(page.items);
        match page.next {
            Some(next) if !empty => start = Some(next),
            _ => return Ok(all),
        }
    }
}
