//! End-to-end discovery and evaluation against the in-memory cloud.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    ci_metadata, connection, context, create_metadata, dns_record, load_balancer, FakeCloud,
    BASE_DOMAIN, CLUSTER, INFRA_ID,
};
use pvcheck_core::checks::load_balancer::PoolHealth;
use pvcheck_core::metadata::CiMetadata;
use pvcheck_core::provider::{InstanceRecord, LoadBalancerRecord, PoolRef, TransitGatewayRecord};
use pvcheck_core::resource::MACHINE_CONFIG_POOL;
use pvcheck_core::watch::PoolProbe;
use pvcheck_core::{
    BufferSink, CheckConfig, CheckError, Checker, DiscoveryStrategy, LoadBalancerProbe,
    LoadBalancerRole, ManagedResource, MatchMode, Metadata, Registry, Report, ResourceKind,
    Verdict,
};

fn checker(cloud: FakeCloud, config: CheckConfig) -> (Checker, Arc<BufferSink>) {
    let sink = Arc::new(BufferSink::new());
    let ctx = context(Arc::new(cloud), create_metadata(), config);
    (Checker::new(ctx, sink.clone()), sink)
}

fn report(reports: &[Report], kind: ResourceKind) -> &Report {
    reports.iter().find(|r| r.kind == kind).unwrap()
}

// =============================================================================
// Readiness
// =============================================================================

#[tokio::test]
async fn test_healthy_cluster_is_ok() {
    let (checker, sink) = checker(FakeCloud::healthy(), CheckConfig::default());
    let reports = tokio_test::assert_ok!(checker.run_create().await);

    let kinds: Vec<ResourceKind> = reports.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ResourceKind::Network,
            ResourceKind::TransitGateway,
            ResourceKind::ServiceInstance,
            ResourceKind::LoadBalancer,
            ResourceKind::LoadBalancer,
            ResourceKind::LoadBalancer,
            ResourceKind::ObjectStore,
            ResourceKind::Dns,
        ]
    );
    for report in &reports {
        assert!(report.is_ok(), "{} {}: {:?}", report.kind, report.name, report.failures);
    }

    assert!(sink.contains("Querying the Virtual Private Cloud..."));
    assert!(sink.contains(&format!("Virtual Private Cloud vpc-{} is OK.", CLUSTER)));
    assert!(sink.contains(&format!(
        "Cloud Object Storage {}-cos Found master-0.ign (size 1024) in {}-bootstrap-ign",
        INFRA_ID, INFRA_ID
    )));
}

#[tokio::test]
async fn test_missing_gateway_reports_placeholder() {
    let mut cloud = FakeCloud::healthy();
    cloud.gateways.clear();
    let (checker, sink) = checker(cloud, CheckConfig::default());
    let reports = checker.run_create().await.unwrap();

    let tg = reports
        .iter()
        .find(|r| r.kind == ResourceKind::TransitGateway)
        .unwrap();
    assert_eq!(tg.verdict, Verdict::NotOk);
    assert_eq!(tg.name, format!("{}-tg", INFRA_ID));
    assert!(sink.contains(&format!(
        "Transit Gateway is NOTOK. Could not find a Transit Gateway named {}-tg",
        INFRA_ID
    )));

    // Everything else is still evaluated
    assert_eq!(reports.len(), 8);
    assert!(reports
        .iter()
        .filter(|r| r.kind != ResourceKind::TransitGateway)
        .all(|r| r.is_ok()));
}

#[tokio::test]
async fn test_every_failed_subcheck_is_reported() {
    let mut cloud = FakeCloud::healthy();
    cloud.subnets[1].status = "pending".to_string();
    cloud.subnets.pop();
    cloud.vpcs[1].health_state = "warning".to_string();
    let (checker, sink) = checker(cloud, CheckConfig::default());
    let reports = checker.run_create().await.unwrap();

    let vpc = &reports[0];
    assert_eq!(vpc.kind, ResourceKind::Network);
    assert_eq!(vpc.failures.len(), 3);
    assert!(sink.contains(&format!(
        "Virtual Private Cloud vpc-{} is NOTOK. health state is warning, expected ok",
        CLUSTER
    )));
}

#[tokio::test]
async fn test_unhealthy_pool_fails_load_balancer() {
    let mut cloud = FakeCloud::healthy();
    cloud.members.insert("p2".to_string(), Vec::new());
    let (checker, _sink) = checker(cloud, CheckConfig::default());
    let reports = checker.run_create().await.unwrap();

    let lbs: Vec<_> = reports
        .iter()
        .filter(|r| r.kind == ResourceKind::LoadBalancer)
        .collect();
    assert_eq!(lbs[0].name, format!("{}-loadbalancer-int", CLUSTER));
    assert_eq!(lbs[0].verdict, Verdict::NotOk);
    assert!(lbs[0].failures[0].contains("machine-config-server"));
    assert!(lbs[1].is_ok());
    assert!(lbs[2].is_ok());
}

#[tokio::test]
async fn test_missing_dns_record_fails_zone() {
    let mut cloud = FakeCloud::healthy();
    cloud.records.retain(|r| r.id != "r-2");
    let (checker, sink) = checker(cloud, CheckConfig::default());
    let reports = checker.run_create().await.unwrap();

    let dns = report(&reports, ResourceKind::Dns);
    assert_eq!(dns.verdict, Verdict::NotOk);
    assert_eq!(
        dns.failures,
        vec![
            format!("could not find record api.{}.{}", CLUSTER, BASE_DOMAIN),
            format!("found 2 records for {}.{}, expected 3", CLUSTER, BASE_DOMAIN),
        ]
    );
    assert!(sink.contains(&format!(
        "Domain Name Service {} is NOTOK. could not find record api.{}.{}",
        BASE_DOMAIN, CLUSTER, BASE_DOMAIN
    )));
}

#[tokio::test]
async fn test_extra_dns_record_fails_zone() {
    let mut cloud = FakeCloud::healthy();
    cloud
        .records
        .push(dns_record("r-5", &format!("old.{}.{}", CLUSTER, BASE_DOMAIN)));
    let (checker, _sink) = checker(cloud, CheckConfig::default());
    let reports = checker.run_create().await.unwrap();

    let dns = report(&reports, ResourceKind::Dns);
    assert_eq!(dns.verdict, Verdict::NotOk);
    assert_eq!(
        dns.failures,
        vec![format!("found 4 records for {}.{}, expected 3", CLUSTER, BASE_DOMAIN)]
    );
}

#[tokio::test]
async fn test_missing_bootstrap_bucket_fails_object_store() {
    let mut cloud = FakeCloud::healthy();
    cloud.buckets.clear();
    let (checker, _sink) = checker(cloud, CheckConfig::default());
    let reports = checker.run_create().await.unwrap();

    let cos = report(&reports, ResourceKind::ObjectStore);
    assert_eq!(cos.verdict, Verdict::NotOk);
    assert_eq!(
        cos.failures,
        vec![format!("could not find bucket {}-bootstrap-ign", INFRA_ID)]
    );
}

#[tokio::test]
async fn test_missing_master_ignition_fails_object_store() {
    let mut cloud = FakeCloud::healthy();
    cloud.objects.retain(|o| o.key != "master-2.ign");
    let (checker, sink) = checker(cloud, CheckConfig::default());
    let reports = checker.run_create().await.unwrap();

    let cos = report(&reports, ResourceKind::ObjectStore);
    assert_eq!(cos.verdict, Verdict::NotOk);
    assert_eq!(
        cos.failures,
        vec![format!("could not find master-2 in {}-bootstrap-ign", INFRA_ID)]
    );
    // The objects that do exist are still listed
    assert!(sink.contains("Found master-1.ign (size 1024)"));
}

#[tokio::test]
async fn test_second_vpc_connection_fails_gateway() {
    let mut cloud = FakeCloud::healthy();
    cloud.connections.push(connection("cn-3", "vpc"));
    let (checker, _sink) = checker(cloud, CheckConfig::default());
    let reports = checker.run_create().await.unwrap();

    let tg = report(&reports, ResourceKind::TransitGateway);
    assert_eq!(tg.verdict, Verdict::NotOk);
    assert_eq!(tg.failures, vec!["has 2 vpc connections, expected 1"]);
}

#[tokio::test]
async fn test_unhealthy_vm_instance_fails() {
    let mut cloud = FakeCloud::healthy();
    cloud.instances = vec![
        InstanceRecord {
            id: "i-1".to_string(),
            name: format!("{}-bastion", INFRA_ID),
            crn: String::new(),
            health_state: "ok".to_string(),
        },
        InstanceRecord {
            id: "i-2".to_string(),
            name: format!("{}-proxy", INFRA_ID),
            crn: String::new(),
            health_state: "warning".to_string(),
        },
    ];
    let (checker, sink) = checker(cloud, CheckConfig::default());
    let reports = checker.run_create().await.unwrap();

    let vms: Vec<_> = reports
        .iter()
        .filter(|r| r.kind == ResourceKind::VmInstance)
        .collect();
    assert_eq!(vms.len(), 2);
    assert!(vms[0].is_ok());
    assert_eq!(vms[1].verdict, Verdict::NotOk);
    assert!(sink.contains(&format!(
        "Cloud VM {}-proxy is NOTOK. health state is warning, expected ok",
        INFRA_ID
    )));
}

// =============================================================================
// Load balancer slots
// =============================================================================

#[tokio::test]
async fn test_name_match_classifies_cluster_load_balancers() {
    let mut cloud = FakeCloud::healthy();
    cloud.load_balancers = vec![
        load_balancer("lb-ext", &format!("{}-loadbalancer", CLUSTER), &[("p3", "pool-6443")]),
        load_balancer("lb-other", "prod-loadbalancer", &[]),
        load_balancer(
            "lb-int",
            &format!("{}-loadbalancer-int", CLUSTER),
            &[("p1", "pool-6443"), ("p2", "machine-config-server")],
        ),
        load_balancer("lb-bastion", &format!("{}-bastion", CLUSTER), &[]),
        load_balancer(
            "lb-kube",
            &format!("kube-{}", CLUSTER),
            &[("p4", "tcp-80"), ("p5", "tcp-443")],
        ),
    ];
    let ctx = context(Arc::new(cloud), create_metadata(), CheckConfig::default());
    let found = Registry::new(ctx, Arc::new(BufferSink::new()))
        .discover(ResourceKind::LoadBalancer)
        .await;

    assert_eq!(found.len(), 3);
    let slots: Vec<_> = found
        .iter()
        .map(|d| match &d.resource {
            ManagedResource::LoadBalancer(lb) => (lb.role, lb.name.clone(), d.error.is_none()),
            other => panic!("unexpected resource {:?}", other),
        })
        .collect();
    assert_eq!(
        slots,
        vec![
            (LoadBalancerRole::Internal, format!("{}-loadbalancer-int", CLUSTER), true),
            (LoadBalancerRole::External, format!("{}-loadbalancer", CLUSTER), true),
            (LoadBalancerRole::Kube, format!("kube-{}", CLUSTER), true),
        ]
    );
}

#[tokio::test]
async fn test_load_balancer_lookup_fault_is_reported() {
    let mut cloud = FakeCloud::healthy();
    cloud.failing_lookups.insert("lb-kube".to_string());
    let (checker, sink) = checker(cloud, CheckConfig::default());
    let reports = checker.run_create().await.unwrap();

    let kube = reports
        .iter()
        .find(|r| r.name == "(kube load balancer)")
        .unwrap();
    assert_eq!(kube.verdict, Verdict::NotOk);
    assert_eq!(
        kube.failures,
        vec!["Could not look up a Load Balancer named (kube load balancer): \
              discovery of Load Balancer failed: load balancer lb-kube lookup failed"]
    );
    assert!(!sink.contains("Could not find a Load Balancer"));

    let others: Vec<_> = reports
        .iter()
        .filter(|r| r.kind == ResourceKind::LoadBalancer && r.name != kube.name)
        .collect();
    assert_eq!(others.len(), 2);
    assert!(others.iter().all(|r| r.is_ok()));
}

#[tokio::test]
async fn test_extra_load_balancers_are_ignored() {
    let mut cloud = FakeCloud::healthy();
    cloud.load_balancers.push(LoadBalancerRecord {
        id: "lb-int-2".to_string(),
        name: format!("{}-old-loadbalancer-int", CLUSTER),
        crn: String::new(),
        operating_status: "offline".to_string(),
        pools: Vec::new(),
    });
    cloud.load_balancers.push(LoadBalancerRecord {
        id: "lb-bastion".to_string(),
        name: format!("{}-bastion", CLUSTER),
        crn: String::new(),
        operating_status: "online".to_string(),
        pools: Vec::new(),
    });
    let (checker, _sink) = checker(cloud, CheckConfig::default());
    let reports = checker.run_create().await.unwrap();

    let lbs: Vec<_> = reports
        .iter()
        .filter(|r| r.kind == ResourceKind::LoadBalancer)
        .collect();
    assert_eq!(lbs.len(), 3);
    assert!(lbs.iter().all(|r| r.is_ok()));
    assert!(!lbs.iter().any(|r| r.name.contains("old") || r.name.contains("bastion")));
}

#[tokio::test]
async fn test_missing_load_balancer_role_gets_placeholder() {
    let mut cloud = FakeCloud::healthy();
    cloud.load_balancers.retain(|lb| lb.id != "lb-kube");
    let (checker, sink) = checker(cloud, CheckConfig::default());
    let reports = checker.run_create().await.unwrap();

    let kube = reports
        .iter()
        .find(|r| r.name == "(kube load balancer)")
        .unwrap();
    assert_eq!(kube.verdict, Verdict::NotOk);
    assert!(sink.contains("Load Balancer is NOTOK. Could not find a Load Balancer named (kube load balancer)"));
}

// =============================================================================
// Strategies and match modes
// =============================================================================

#[tokio::test]
async fn test_tag_search_matches_name_match() {
    let (by_name, _) = checker(FakeCloud::healthy(), CheckConfig::default());
    let (by_tag, _) = checker(
        FakeCloud::healthy(),
        CheckConfig {
            strategy: DiscoveryStrategy::TagSearch,
            ..CheckConfig::default()
        },
    );

    let by_name = by_name.run_create().await.unwrap();
    let by_tag = by_tag.run_create().await.unwrap();
    assert_eq!(by_name, by_tag);
}

#[tokio::test]
async fn test_unique_mode_rejects_ambiguous_gateway() {
    let second = TransitGatewayRecord {
        id: "tg-2".to_string(),
        name: format!("{}-tg-old", INFRA_ID),
        crn: String::new(),
        status: "available".to_string(),
    };

    let mut cloud = FakeCloud::healthy();
    cloud.gateways.push(second.clone());
    let sink = Arc::new(BufferSink::new());
    let ctx = context(
        Arc::new(cloud),
        create_metadata(),
        CheckConfig {
            match_mode: MatchMode::Unique,
            ..CheckConfig::default()
        },
    );
    let found = Registry::new(ctx, sink)
        .discover(ResourceKind::TransitGateway)
        .await;
    assert_eq!(found.len(), 1);
    assert!(matches!(
        found[0].error,
        Some(CheckError::Ambiguous { count: 2, .. })
    ));

    let mut cloud = FakeCloud::healthy();
    cloud.gateways.push(second);
    let ctx = context(Arc::new(cloud), create_metadata(), CheckConfig::default());
    let found = Registry::new(ctx, Arc::new(BufferSink::new()))
        .discover(ResourceKind::TransitGateway)
        .await;
    assert!(found[0].error.is_none());
    assert_eq!(found[0].resource.external_id(), Some("tg-1"));
}

#[tokio::test]
async fn test_missing_resource_group_aborts_run() {
    let mut cloud = FakeCloud::healthy();
    cloud.resource_groups.clear();
    let (checker, _sink) = checker(cloud, CheckConfig::default());
    assert!(matches!(
        checker.run_create().await,
        Err(CheckError::Setup(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_slow_listing_hits_deadline() {
    let mut cloud = FakeCloud::healthy();
    cloud.list_delay = Some(Duration::from_secs(30));
    let ctx = context(
        Arc::new(cloud),
        create_metadata(),
        CheckConfig {
            call_timeout: Duration::from_secs(5),
            ..CheckConfig::default()
        },
    );
    let found = Registry::new(ctx, Arc::new(BufferSink::new()))
        .discover(ResourceKind::Network)
        .await;

    assert_eq!(found.len(), 1);
    assert!(!found[0].resource.is_resolved());
    assert!(matches!(
        found[0].error,
        Some(CheckError::DeadlineExceeded(d)) if d == Duration::from_secs(5)
    ));
}

#[tokio::test]
async fn test_vpc_listing_pages_are_walked() {
    let mut cloud = FakeCloud::healthy();
    let wanted = cloud.vpcs.pop().unwrap();
    for i in 0..130 {
        cloud.vpcs.push(pvcheck_core::provider::VpcRecord {
            id: format!("vpc-x{}", i),
            name: format!("unrelated-{}", i),
            crn: String::new(),
            health_state: "ok".to_string(),
        });
    }
    cloud.vpcs.push(wanted);
    let ctx = context(Arc::new(cloud), create_metadata(), CheckConfig::default());
    let found = Registry::new(ctx, Arc::new(BufferSink::new()))
        .discover(ResourceKind::Network)
        .await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].resource.external_id(), Some("vpc-1"));
}

// =============================================================================
// Pre-flight sweep
// =============================================================================

#[tokio::test]
async fn test_ci_sweep_reports_strays() {
    let cloud = Arc::new(FakeCloud::healthy().with_leftovers());
    let sink = Arc::new(BufferSink::new());
    let ctx = context(cloud.clone(), ci_metadata(), CheckConfig::default());
    let reports = Checker::new(ctx, sink.clone()).run_ci(false).await.unwrap();

    let kinds: Vec<ResourceKind> = reports.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ResourceKind::Network,
            ResourceKind::TransitGateway,
            ResourceKind::ServiceInstance
        ]
    );
    assert!(reports[0].is_ok());
    assert!(reports[1].is_ok());
    assert_eq!(reports[2].verdict, Verdict::NotOk);
    assert_eq!(reports[2].failures[0], "Found 4 instances.");
    assert!(cloud.deleted().is_empty());
    assert!(sink.contains(&format!(
        "Found a server instance ({}-master-0) on the network",
        INFRA_ID
    )));
}

#[tokio::test]
async fn test_ci_sweep_names_unknown_port_owner_by_id() {
    let mut cloud = FakeCloud::healthy().with_leftovers();
    cloud.pvm_instances.clear();
    cloud.ports.get_mut("net-1").unwrap()[0].pvm_instance_id = Some("pvm-9".to_string());
    let sink = Arc::new(BufferSink::new());
    let ctx = context(Arc::new(cloud), ci_metadata(), CheckConfig::default());
    Checker::new(ctx, sink.clone()).run_ci(false).await.unwrap();

    assert!(sink.contains("Found a server instance (pvm-9) on the network"));
}

#[tokio::test]
async fn test_blank_ci_names_skip_network_and_gateway() {
    let ci: CiMetadata = serde_json::from_value(serde_json::json!({
        "region": "dal",
        "zone": "dal10",
        "resourceGroup": "rg1",
        "serviceInstance": "si-1",
        "vpc": "",
        "transitGateway": ""
    }))
    .unwrap();
    let metadata = Metadata::from_ci(ci).unwrap();
    let ctx = context(Arc::new(FakeCloud::healthy()), metadata, CheckConfig::default());

    let registry = Registry::new(ctx.clone(), Arc::new(BufferSink::new()));
    assert!(registry.discover(ResourceKind::Network).await.is_empty());
    assert!(registry.discover(ResourceKind::TransitGateway).await.is_empty());

    let reports = Checker::new(ctx, Arc::new(BufferSink::new()))
        .run_ci(false)
        .await
        .unwrap();
    let kinds: Vec<ResourceKind> = reports.iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![ResourceKind::ServiceInstance]);
}

#[tokio::test]
async fn test_ci_clean_continues_past_failed_delete() {
    let mut cloud = FakeCloud::healthy().with_leftovers();
    cloud.failing_deletes.insert("img-1".to_string());
    let cloud = Arc::new(cloud);
    let sink = Arc::new(BufferSink::new());
    let ctx = context(cloud.clone(), ci_metadata(), CheckConfig::default());
    Checker::new(ctx, sink.clone()).run_ci(true).await.unwrap();

    let deleted = cloud.deleted();
    for id in ["pvm-0", "pvm-1", "pvm-2", "pvm-3", "dhcp-1", "net-1"] {
        assert!(deleted.iter().any(|d| d == id), "{} not deleted", id);
    }
    assert!(!deleted.iter().any(|d| d == "img-1"));
    assert!(sink.contains("returned this error deleting image img-1"));
}

#[tokio::test]
async fn test_clean_workspace_passes_sweep() {
    let mut cloud = FakeCloud::healthy();
    cloud.pvm_instances.clear();
    cloud.dhcp_servers.clear();
    cloud.images.clear();
    let ctx = context(Arc::new(cloud), ci_metadata(), CheckConfig::default());
    let reports = Checker::new(ctx, Arc::new(BufferSink::new()))
        .run_ci(true)
        .await
        .unwrap();
    assert!(reports.iter().all(|r| r.is_ok()));
}

// =============================================================================
// Pool probe
// =============================================================================

#[tokio::test]
async fn test_internal_probe_reads_machine_config_pool() {
    let mut cloud = FakeCloud::healthy();
    cloud.load_balancers[0].pools.push(PoolRef {
        id: "p9".to_string(),
        name: "unused".to_string(),
    });
    let ctx = context(Arc::new(cloud), create_metadata(), CheckConfig::default());
    let registry = Registry::new(ctx, Arc::new(BufferSink::new()));

    let probe = LoadBalancerProbe::internal(&registry).await.unwrap();
    assert_eq!(
        probe.probe(&MACHINE_CONFIG_POOL).await.unwrap(),
        PoolHealth::Healthy {
            pool: "machine-config-server".to_string(),
            healthy_members: 1,
        }
    );
}
