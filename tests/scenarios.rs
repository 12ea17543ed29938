//! End-to-end provisioning over real HTTP: the agent is served on a local
//! port and reloads go to a stub Prometheus.

use axum::{http::StatusCode, routing::post, Router};
use std::fs;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

use ruleprov::api::{create_router, AppState};
use ruleprov::observability::MetricsRegistry;
use ruleprov::provision::{ProvisionService, ProvisionerSettings, RuleProvisioner};
use ruleprov::reload::HttpReloader;

const PAYLOAD: &str = "groups:\n- name: g\n  rules: []\n";

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn stub_prometheus() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/-/reload",
        post(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                StatusCode::OK
            }
        }),
    );

    let addr = serve(app).await;
    (format!("http://{}/-/reload", addr), hits)
}

async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/-/reload", addr)
}

async fn start_agent(dir: &TempDir, reload_url: &str) -> String {
    let settings = ProvisionerSettings {
        rule_file: Some(dir.path().join("rules.yaml")),
        rules_dir: Some(dir.path().to_path_buf()),
        prometheus_config: Some(dir.path().join("prometheus.yml")),
        ..Default::default()
    };
    let reloader = HttpReloader::new(reload_url, Duration::from_secs(2)).unwrap();
    let service = ProvisionService::new(
        RuleProvisioner::new(settings),
        Arc::new(reloader),
        Arc::new(MetricsRegistry::new()),
    );
    let state = Arc::new(AppState {
        service,
        start_time: Instant::now(),
        version: "test".to_string(),
        max_body_bytes: 1 << 20,
    });

    let addr = serve(create_router(state)).await;
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_create_then_resubmit() {
    let dir = TempDir::new().unwrap();
    let (reload_url, hits) = stub_prometheus().await;
    let agent = start_agent(&dir, &reload_url).await;
    let client = reqwest::Client::new();

    // Target absent: created, reload attempted.
    let response = client
        .put(format!("{}/api/v1/rules", agent))
        .body(PAYLOAD)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        fs::read_to_string(dir.path().join("rules.yaml")).unwrap(),
        PAYLOAD
    );
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // Same content again: no write, no reload.
    let response = client
        .put(format!("{}/api/v1/rules", agent))
        .body(PAYLOAD)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["changed"], false);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unreachable_engine_keeps_new_content() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("rules.yaml"), "groups: []\n").unwrap();
    let agent = start_agent(&dir, &unreachable_url().await).await;

    let response = reqwest::Client::new()
        .put(format!("{}/api/v1/rules", agent))
        .body(PAYLOAD)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "RELOAD_FAILED");
    assert_eq!(body["changed"], true);
    assert_eq!(
        fs::read_to_string(dir.path().join("rules.yaml")).unwrap(),
        PAYLOAD
    );
}

#[tokio::test]
async fn test_mixins_register_concurrently() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("prometheus.yml"),
        "global:\n  scrape_interval: 15s\nrule_files:\n- rules.yaml\n",
    )
    .unwrap();
    let (reload_url, hits) = stub_prometheus().await;
    let agent = start_agent(&dir, &reload_url).await;
    let client = reqwest::Client::new();

    let names = ["alpha", "bravo", "charlie", "delta", "echo", "foxtrot"];
    let mut handles = Vec::new();
    for name in names {
        let client = client.clone();
        let url = format!("{}/api/v1/rules/{}", agent, name);
        handles.push(tokio::spawn(async move {
            client.put(url).body(PAYLOAD).send().await.unwrap().status()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), reqwest::StatusCode::OK);
    }

    let config: serde_yaml::Value =
        serde_yaml::from_slice(&fs::read(dir.path().join("prometheus.yml")).unwrap()).unwrap();
    let listed: Vec<&str> = config["rule_files"]
        .as_sequence()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();

    // No registration lost to a concurrent rewrite, existing entry kept first.
    assert_eq!(listed.len(), names.len() + 1);
    assert_eq!(listed[0], "rules.yaml");
    for name in names {
        assert!(listed.contains(&format!("{}.yaml", name).as_str()));
    }
    assert_eq!(config["global"]["scrape_interval"], "15s");
    assert_eq!(hits.load(Ordering::SeqCst), names.len());
}
