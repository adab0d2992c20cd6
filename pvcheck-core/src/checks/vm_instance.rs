//! VPC virtual server instance checks.

use crate::provider::InstanceRecord;
use crate::status::Checklist;

pub fn readiness(instance: &InstanceRecord, list: &mut Checklist<'_>) {
    list.require(instance.health_state == "ok", || {
        format!("health state is {}, expected ok", instance.health_state)
    });
}
