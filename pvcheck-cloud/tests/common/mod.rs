//! Mock IBM Cloud endpoints for pvcheck-cloud integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use pvcheck_core::metadata::CreateMetadata;
use pvcheck_core::Metadata;
use serde_json::json;
use tokio::net::TcpListener;

pub const API_KEY: &str = "good-key";
pub const TOKEN: &str = "tok-1";
pub const CIS_CRN: &str = "crn:v1:bluemix:public:internet-svcs:global:a/acct:cis-1::";

#[derive(Default)]
pub struct MockState {
    pub token_requests: AtomicUsize,
    pub vpc_requests: AtomicUsize,
}

pub struct MockServer {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl MockServer {
    pub async fn spawn() -> Self {
        let state = Arc::new(MockState::default());
        let router = Router::new()
            .route("/identity/token", post(token))
            .route("/v1/vpcs", get(list_vpcs))
            .route("/v1/vpcs/{id}", get(get_vpc))
            .route("/cos/", get(list_buckets))
            .route("/cos/{bucket}", get(list_objects))
            .route(
                "/pcloud/v1/cloud-instances/{guid}/pvm-instances",
                get(list_pvm_instances),
            )
            .route("/pcloud/v1/tenants/{tenant}/sshkeys", get(list_ssh_keys))
            .route("/cis/v1/{crn}/zones/{zone}/dns_records", get(list_records))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        Self {
            addr,
            state,
            shutdown_tx,
        }
    }

    pub fn root(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}

pub fn metadata() -> Metadata {
    let create: CreateMetadata = serde_json::from_value(json!({
        "clusterName": "c1",
        "infraID": "c1-x7k2p",
        "powervs": {
            "BaseDomain": "example.com",
            "cisInstanceCRN": CIS_CRN,
            "region": "dal",
            "zone": "dal10"
        }
    }))
    .unwrap();
    Metadata::from_create(create).unwrap()
}

fn authorized(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TOKEN))
        .unwrap_or(false)
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "missing or bad token").into_response()
}

// =============================================================================
// Handlers
// =============================================================================

async fn token(State(state): State<Arc<MockState>>, body: String) -> Response {
    state.token_requests.fetch_add(1, Ordering::SeqCst);
    if !body.contains("grant_type=urn%3Aibm%3Aparams%3Aoauth%3Agrant-type%3Aapikey")
        || !body.contains(&format!("apikey={}", API_KEY))
    {
        return (StatusCode::BAD_REQUEST, "Provided API key could not be found").into_response();
    }
    Json(json!({"access_token": TOKEN, "expires_in": 3600, "token_type": "Bearer"}))
        .into_response()
}

async fn list_vpcs(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.vpc_requests.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers, "authorization") {
        return unauthorized();
    }
    if query.get("generation").map(String::as_str) != Some("2") || !query.contains_key("version") {
        return (StatusCode::BAD_REQUEST, "missing version").into_response();
    }
    match query.get("start").map(String::as_str) {
        None => Json(json!({
            "vpcs": [{"id": "vpc-0", "name": "vpc-other", "crn": "crn:0", "health_state": "ok"}],
            "limit": 1,
            "next": {"href": "https://us-south.iaas.cloud.ibm.com/v1/vpcs?limit=1&start=page-2"}
        }))
        .into_response(),
        Some("page-2") => Json(json!({
            "vpcs": [{"id": "vpc-1", "name": "vpc-c1", "crn": "crn:1", "status": "available"}],
            "limit": 1
        }))
        .into_response(),
        Some(_) => (StatusCode::BAD_REQUEST, "bad start").into_response(),
    }
}

async fn get_vpc(headers: HeaderMap, Path(id): Path<String>) -> Response {
    if !authorized(&headers, "authorization") {
        return unauthorized();
    }
    if id == "broken" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response();
    }
    Json(json!({"id": id, "name": "vpc-c1", "crn": "crn:1", "health_state": "ok"})).into_response()
}

async fn list_buckets(headers: HeaderMap) -> Response {
    if !authorized(&headers, "authorization") {
        return unauthorized();
    }
    if headers
        .get("ibm-service-instance-id")
        .and_then(|v| v.to_str().ok())
        != Some("cos-1")
    {
        return (StatusCode::FORBIDDEN, "no instance id").into_response();
    }
    r#"<?xml version="1.0" encoding="UTF-8"?>
<ListAllMyBucketsResult><Buckets>
<Bucket><Name>c1-x7k2p-bootstrap-ign</Name></Bucket>
</Buckets></ListAllMyBucketsResult>"#
        .into_response()
}

async fn list_objects(
    headers: HeaderMap,
    Path(bucket): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers, "authorization") {
        return unauthorized();
    }
    if bucket != "c1-x7k2p-bootstrap-ign" {
        return (StatusCode::NOT_FOUND, "NoSuchBucket").into_response();
    }
    match query.get("marker").map(String::as_str) {
        None => r#"<ListBucketResult><IsTruncated>true</IsTruncated>
<Contents><Key>bootstrap.ign</Key><Size>300000</Size></Contents>
<Contents><Key>master-0.ign</Key><Size>1700</Size></Contents>
</ListBucketResult>"#
            .into_response(),
        Some("master-0.ign") => r#"<ListBucketResult><IsTruncated>false</IsTruncated>
<Contents><Key>master-1.ign</Key><Size>1701</Size></Contents>
</ListBucketResult>"#
            .into_response(),
        Some(_) => (StatusCode::BAD_REQUEST, "bad marker").into_response(),
    }
}

async fn list_pvm_instances(headers: HeaderMap, Path(guid): Path<String>) -> Response {
    if !authorized(&headers, "authorization") {
        return unauthorized();
    }
    let crn = headers.get("crn").and_then(|v| v.to_str().ok()).unwrap_or("");
    if !crn.contains(&guid) {
        return (StatusCode::BAD_REQUEST, "CRN header does not match").into_response();
    }
    Json(json!({"pvmInstances": [
        {"pvmInstanceID": "pvm-0", "serverName": "c1-x7k2p-master-0", "status": "ACTIVE"},
        {"pvmInstanceID": "pvm-1", "serverName": "c1-x7k2p-worker-a", "status": "BUILD"}
    ]}))
    .into_response()
}

async fn list_ssh_keys(headers: HeaderMap, Path(tenant): Path<String>) -> Response {
    if !authorized(&headers, "authorization") {
        return unauthorized();
    }
    if tenant != "acct" {
        return (StatusCode::NOT_FOUND, "no such tenant").into_response();
    }
    Json(json!({"sshKeys": [{"name": "c1-x7k2p-sshkey", "sshKey": "ssh-ed25519 AAAA"}]}))
        .into_response()
}

async fn list_records(
    headers: HeaderMap,
    Path((crn, zone)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers, "x-auth-user-token") {
        return unauthorized();
    }
    if crn != CIS_CRN || zone != "z-1" {
        return (StatusCode::NOT_FOUND, "no such zone").into_response();
    }
    let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let all = ["api-int.c1.example.com", "api.c1.example.com", "*.apps.c1.example.com"];
    let result: Vec<_> = all
        .iter()
        .enumerate()
        .skip((page - 1) * 2)
        .take(2)
        .map(|(i, name)| json!({"id": format!("r-{}", i), "name": name, "type": "CNAME", "content": "lb.example.com"}))
        .collect();
    Json(json!({
        "success": true,
        "result": result,
        "result_info": {"page": page, "per_page": 2, "count": 2, "total_count": all.len()}
    }))
    .into_response()
}
