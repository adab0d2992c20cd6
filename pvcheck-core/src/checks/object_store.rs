//! Cloud Object Storage checks.
//!
//! The installer uploads bootstrap and master ignition into
//! `{infraID}-bootstrap-ign`; the instance is only useful once those exist.

use crate::provider::{CloudContext, ResourceInstanceRecord};
use crate::status::Checklist;

pub fn bootstrap_bucket(infra_id: &str) -> String {
    format!("{}-bootstrap-ign", infra_id)
}

pub async fn readiness(
    ctx: &CloudContext,
    instance: &ResourceInstanceRecord,
    list: &mut Checklist<'_>,
) {
    list.require(instance.state == "active", || {
        format!("state is {}, expected active", instance.state)
    });

    let bucket = bootstrap_bucket(&ctx.metadata.infra_id);
    match ctx.call(ctx.cos.list_buckets(&instance.guid)).await {
        Ok(buckets) if buckets.iter().any(|b| *b == bucket) => {}
        Ok(_) => {
            list.fail(format!("could not find bucket {}", bucket));
            return;
        }
        Err(e) => {
            list.fail(format!("could not list buckets: {}", e));
            return;
        }
    }

    let objects = match ctx.call(ctx.cos.list_objects(&instance.guid, &bucket)).await {
        Ok(objects) => objects,
        Err(e) => {
            list.fail(format!("could not list objects in {}: {}", bucket, e));
            return;
        }
    };

    for i in 0..3 {
        let wanted = format!("master-{}", i);
        match objects.iter().find(|o| o.key.contains(&wanted)) {
            Some(object) => list.note(format!(
                "Found {} (size {}) in {}",
                object.key, object.size, bucket
            )),
            None => list.fail(format!("could not find {} in {}", wanted, bucket)),
        }
    }
}
