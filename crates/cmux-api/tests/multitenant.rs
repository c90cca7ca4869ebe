//! # Multi-Tenant Routing Tests
//!
//! One storage root on disk, seeded with `mychart-0.1.0.tgz` and its
//! provenance file at every level of an org/team/repo tree, served by
//! depth 0 to 3 servers side by side. Every server must find the chart in
//! every repository it can address.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use cmux_api::{AppConfig, AppState};
use cmux_chart::testing::{package_chart, provenance_for};
use cmux_core::{ChartMetadata, Depth};
use cmux_storage::LocalFilesystemBackend;
use http_body_util::BodyExt;
use tower::ServiceExt;

const ORGS: [&str; 2] = ["org1", "org2"];
const TEAMS: [&str; 2] = ["team1", "team2"];
const REPOS: [&str; 2] = ["repo1", "repo2"];

fn seed(dir: &Path, archive: &[u8], prov: &[u8]) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("mychart-0.1.0.tgz"), archive).unwrap();
    std::fs::write(dir.join("mychart-0.1.0.tgz.prov"), prov).unwrap();
}

/// Seed the chart at the root and under every org, team and repo.
fn storage_root() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    let meta = ChartMetadata::new("mychart", "0.1.0");
    let archive = package_chart(&meta);
    let prov = provenance_for(&meta, &archive);

    seed(tmp.path(), &archive, &prov);
    for org in ORGS {
        seed(&tmp.path().join(org), &archive, &prov);
        for team in TEAMS {
            seed(&tmp.path().join(org).join(team), &archive, &prov);
            for repo in REPOS {
                seed(&tmp.path().join(org).join(team).join(repo), &archive, &prov);
            }
        }
    }
    tmp
}

fn server(root: &Path, depth: u8) -> axum::Router {
    let config = AppConfig {
        depth: Depth::new(depth),
        ..AppConfig::default()
    };
    let backend = Arc::new(LocalFilesystemBackend::new(root));
    cmux_api::app(AppState::new(config, backend))
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

async fn check_all_routes(app: &axum::Router, prefix: &str) {
    let cases = [
        (String::from("/"), StatusCode::OK),
        (format!("{prefix}/index.yaml"), StatusCode::OK),
        (format!("{prefix}/charts/mychart-0.1.0.tgz"), StatusCode::OK),
        (format!("{prefix}/charts/mychart-0.1.0.tgz.prov"), StatusCode::OK),
        (format!("{prefix}/charts/fakechart-0.1.0.tgz"), StatusCode::NOT_FOUND),
        (format!("{prefix}/charts/fakechart-0.1.0.tgz.prov"), StatusCode::NOT_FOUND),
        (format!("{prefix}/charts/fakechart-0.1.0.bad"), StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (uri, expected) in cases {
        let (status, _) = get(app, &uri).await;
        assert_eq!(status, expected, "GET {uri}");
    }

    let (_, yaml) = get(app, &format!("{prefix}/index.yaml")).await;
    let index: serde_yaml::Value = serde_yaml::from_slice(&yaml).unwrap();
    let entry = &index["entries"]["mychart"][0];
    assert_eq!(entry["version"].as_str(), Some("0.1.0"), "index at {prefix}");
    assert_eq!(
        entry["provenance"].as_str(),
        Some("charts/mychart-0.1.0.tgz.prov"),
        "index at {prefix}"
    );
}

#[tokio::test]
async fn depth_three_fixture_scenario() {
    let root = storage_root();
    let app = server(root.path(), 3);

    let (status, body) = get(&app, "/org1/team1/repo1/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("org1/team1/repo1"));

    check_all_routes(&app, "/org1/team1/repo1").await;
}

#[tokio::test]
async fn every_depth_serves_every_repository() {
    let root = storage_root();
    let servers: Vec<_> = (0..=3).map(|depth| server(root.path(), depth)).collect();

    check_all_routes(&servers[0], "").await;
    for org in ORGS {
        check_all_routes(&servers[1], &format!("/{org}")).await;
        for team in TEAMS {
            check_all_routes(&servers[2], &format!("/{org}/{team}")).await;
            for repo in REPOS {
                check_all_routes(&servers[3], &format!("/{org}/{team}/{repo}")).await;
            }
        }
    }
}

#[tokio::test]
async fn levels_do_not_leak_into_each_other() {
    let root = tempfile::tempdir().unwrap();
    let meta = ChartMetadata::new("teamchart", "1.0.0");
    let team_dir = root.path().join("org1").join("team1");
    std::fs::create_dir_all(&team_dir).unwrap();
    std::fs::write(team_dir.join("teamchart-1.0.0.tgz"), package_chart(&meta)).unwrap();

    let depth1 = server(root.path(), 1);
    let depth2 = server(root.path(), 2);

    let (status, _) = get(&depth2, "/org1/team1/charts/teamchart-1.0.0.tgz").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get(&depth1, "/org1/charts/teamchart-1.0.0.tgz").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, yaml) = get(&depth1, "/org1/index.yaml").await;
    let index: serde_yaml::Value = serde_yaml::from_slice(&yaml).unwrap();
    assert!(index["entries"]["teamchart"].is_null());
}

#[tokio::test]
async fn short_path_is_namespace_ambiguous() {
    let root = storage_root();
    let app = server(root.path(), 3);

    for uri in ["/org1/index.yaml", "/org1/team1", "/index.yaml"] {
        let (status, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "GET {uri}");
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"]["code"], "NAMESPACE_AMBIGUOUS");
    }
}

#[tokio::test]
async fn unknown_extension_is_500_even_when_stored() {
    let root = storage_root();
    std::fs::write(root.path().join("org1/mychart-0.1.0.bad"), b"bytes").unwrap();
    let app = server(root.path(), 1);

    let (status, body) = get(&app, "/org1/charts/mychart-0.1.0.bad").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"]["code"], "UNSUPPORTED_ARTIFACT_TYPE");
}
