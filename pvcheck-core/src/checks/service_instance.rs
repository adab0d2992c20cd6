//! Power Virtual Server workspace checks.
//!
//! Readiness looks inside the workspace: DHCP server, boot image, SSH key and
//! the master/worker PVM instances created by the installer. The absence
//! sweep runs before a CI job and verifies that a previous run left nothing
//! behind, optionally deleting what it finds.

use regex::Regex;
use tracing::debug;

use crate::error::{CheckError, Result};
use crate::provider::{CloudContext, PowerApi, PvmInstance, ResourceInstanceRecord};
use crate::status::Checklist;

const MASTER_COUNT: usize = 3;

pub async fn readiness(
    ctx: &CloudContext,
    instance: &ResourceInstanceRecord,
    power: Option<&dyn PowerApi>,
    list: &mut Checklist<'_>,
) {
    list.require(instance.state == "active", || {
        format!("state is {}, expected active", instance.state)
    });

    let Some(power) = power else {
        list.fail("has no workspace client");
        return;
    };
    let infra_id = &ctx.metadata.infra_id;

    match ctx.call(power.list_dhcp_servers()).await {
        Ok(servers) => {
            let wanted = format!("DHCPSERVER{}", infra_id);
            list.require(
                servers.iter().any(|s| s.network_name.contains(&wanted)),
                || format!("could not find a DHCP server for network {}", wanted),
            );
            list.require(servers.len() <= 1, || {
                format!("found {} DHCP servers, expected 1", servers.len())
            });
        }
        Err(e) => list.fail(format!("could not list DHCP servers: {}", e)),
    }

    match ctx.call(power.list_images()).await {
        Ok(images) => {
            let wanted = format!("rhcos-{}", infra_id);
            match images.iter().find(|i| i.name == wanted) {
                Some(image) => list.require(image.state == "active", || {
                    format!("image {} is {}, expected active", image.name, image.state)
                }),
                None => list.fail(format!("could not find image {}", wanted)),
            }
        }
        Err(e) => list.fail(format!("could not list images: {}", e)),
    }

    match ctx.call(power.list_ssh_keys()).await {
        Ok(keys) => {
            let wanted = format!("{}-sshkey", infra_id);
            list.require(keys.iter().any(|k| *k == wanted), || {
                format!("could not find SSH key {}", wanted)
            });
        }
        Err(e) => list.fail(format!("could not list SSH keys: {}", e)),
    }

    match ctx.call(power.list_pvm_instances()).await {
        Ok(instances) => {
            if let Err(e) = check_nodes(&ctx.metadata.cluster_name, &instances, list) {
                list.fail(e.to_string());
            }
        }
        Err(e) => list.fail(format!("could not list PVM instances: {}", e)),
    }
}

/// Masters `0..3` must exist exactly once each; at least one worker must exist.
/// Every node must be `ACTIVE`.
fn check_nodes(cluster: &str, instances: &[PvmInstance], list: &mut Checklist<'_>) -> Result<()> {
    let cluster = regex::escape(cluster);

    for i in 0..MASTER_COUNT {
        let pattern = node_regex(&format!("{}-.*-master-{}", cluster, i))?;
        let masters: Vec<_> = instances
            .iter()
            .filter(|p| pattern.is_match(&p.name))
            .collect();
        match masters.as_slice() {
            [master] => list.require(master.status == "ACTIVE", || {
                format!("{} is {}, expected ACTIVE", master.name, master.status)
            }),
            other => list.fail(format!(
                "found {} instances for master-{}, expected 1",
                other.len(),
                i
            )),
        }
    }

    let pattern = node_regex(&format!("{}-.*-worker-", cluster))?;
    let workers: Vec<_> = instances
        .iter()
        .filter(|p| pattern.is_match(&p.name))
        .collect();
    list.require(!workers.is_empty(), || "found no worker instances".to_string());
    for worker in workers {
        list.require(worker.status == "ACTIVE", || {
            format!("{} is {}, expected ACTIVE", worker.name, worker.status)
        });
    }
    Ok(())
}

fn node_regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| CheckError::Provider(format!("bad node pattern: {}", e)))
}

/// Sweep stray PVM instances, DHCP servers, images and networks.
pub async fn absence(
    ctx: &CloudContext,
    power: &dyn PowerApi,
    clean: bool,
    list: &mut Checklist<'_>,
) {
    // Kept to name the servers found on network ports
    let mut known: Vec<PvmInstance> = Vec::new();

    match ctx.call(power.list_pvm_instances()).await {
        Ok(instances) if !instances.is_empty() => {
            list.fail(format!("Found {} instances.", instances.len()));
            if clean {
                for instance in &instances {
                    delete(ctx, list, "instance", &instance.id, power.delete_pvm_instance(&instance.id))
                        .await;
                }
            }
            known = instances;
        }
        Ok(_) => {}
        Err(e) => list.fail(format!("returned this error searching for instances: {}", e)),
    }

    match ctx.call(power.list_dhcp_servers()).await {
        Ok(servers) if !servers.is_empty() => {
            let names: Vec<_> = servers.iter().map(|s| s.network_name.as_str()).collect();
            list.fail(format!(
                "Found {} DHCP servers ({}).",
                servers.len(),
                names.join(", ")
            ));
            if clean {
                for server in &servers {
                    delete(ctx, list, "DHCP server", &server.id, power.delete_dhcp_server(&server.id))
                        .await;
                }
            }
        }
        Ok(_) => {}
        Err(e) => list.fail(format!("returned this error searching for DHCP servers: {}", e)),
    }

    match ctx.call(power.list_images()).await {
        Ok(images) if !images.is_empty() => {
            let names: Vec<_> = images.iter().map(|i| i.name.as_str()).collect();
            list.fail(format!("Found {} images ({}).", images.len(), names.join(", ")));
            if clean {
                for image in &images {
                    delete(ctx, list, "image", &image.id, power.delete_image(&image.id)).await;
                }
            }
        }
        Ok(_) => {}
        Err(e) => list.fail(format!("returned this error searching for images: {}", e)),
    }

    let networks = match ctx.call(power.list_networks()).await {
        Ok(networks) => networks,
        Err(e) => {
            list.fail(format!("returned this error searching for networks: {}", e));
            return;
        }
    };
    if networks.is_empty() {
        return;
    }

    let names: Vec<_> = networks.iter().map(|n| n.name.as_str()).collect();
    list.fail(format!(
        "Found {} networks ({}).",
        networks.len(),
        names.join(", ")
    ));

    // Instances still attached to a network block its deletion
    for network in &networks {
        let ports = match ctx.call(power.list_network_ports(&network.id)).await {
            Ok(ports) => ports,
            Err(e) => {
                list.note(format!(
                    "returned this error listing ports of network {}: {}",
                    network.name, e
                ));
                continue;
            }
        };
        list.note(format!("Network {} has {} ports", network.name, ports.len()));
        for instance_id in ports.iter().filter_map(|p| p.pvm_instance_id.as_deref()) {
            let server = known
                .iter()
                .find(|i| i.id == instance_id)
                .map_or(instance_id, |i| i.name.as_str());
            list.note(format!("Found a server instance ({}) on the network", server));
            if clean {
                delete(ctx, list, "instance", instance_id, power.delete_pvm_instance(instance_id))
                    .await;
            }
        }
    }

    if clean {
        for network in &networks {
            delete(ctx, list, "network", &network.id, power.delete_network(&network.id)).await;
        }
    }
}

/// Best-effort delete: failures are reported, never propagated.
async fn delete<F>(ctx: &CloudContext, list: &Checklist<'_>, what: &str, id: &str, call: F)
where
    F: std::future::Future<Output = Result<()>>,
{
    match ctx.call(call).await {
        Ok(()) => debug!(what, id, "deleted"),
        Err(e) => list.note(format!(
            "returned this error deleting {} {}: {}",
            what, id, e
        )),
    }
}
