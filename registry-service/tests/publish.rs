// SPDX-FileCopyrightText: 2026 The Registry Authors
// SPDX-License-Identifier: MIT

//! Publish, edit and listing behaviour of the registry service.

use pretty_assertions::assert_eq;
use registry_core::{RegistryExtensions, ServerJson, new_id};
use registry_service::config::{Config, DatabaseConfig, PublishConfig};
use registry_service::{ListOptions, RegistryService, ServiceError};
use registry_store_db::{ErrorKind, ServerFilter};
use rstest::rstest;
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

async fn open_with(dir: &TempDir, publish: PublishConfig) -> RegistryService {
    let config = Config {
        database: DatabaseConfig {
            path: dir.path().join("registry.sqlite"),
            min_connections: 1,
            max_connections: 8,
            ..Default::default()
        },
        publish,
        ..Default::default()
    };
    RegistryService::open(&config).await.unwrap()
}

async fn open(dir: &TempDir) -> RegistryService {
    open_with(dir, PublishConfig::default()).await
}

fn server(name: &str, version: &str) -> ServerJson {
    let mut server = ServerJson::new(name, version);
    server
        .extra
        .insert("description".into(), json!(format!("{name} at {version}")));
    server
        .extra
        .insert("remotes".into(), json!([{"type": "sse", "url": format!("https://{version}.example.com/sse")}]));
    server
}

async fn latest_versions(service: &RegistryService, name: &str) -> Vec<String> {
    let filter = ServerFilter {
        name: Some(name.to_owned()),
        is_latest: Some(true),
        ..Default::default()
    };
    service
        .database()
        .list(&filter, None, 100, &CancellationToken::new())
        .await
        .unwrap()
        .servers
        .into_iter()
        .map(|s| s.version)
        .collect()
}

#[rstest]
#[case::newer_semver("1.0.0", "2.0.0", "2.0.0")]
#[case::older_semver("2.0.0", "1.0.0", "2.0.0")]
#[case::non_semver_overrides("1.0.0", "v1.1", "v1.1")]
#[case::release_beats_prerelease("1.0.0-alpha", "1.0.0", "1.0.0")]
#[tokio::test]
async fn test_latest_resolution(#[case] first: &str, #[case] second: &str, #[case] latest: &str) {
    let dir = TempDir::new().unwrap();
    let service = open(&dir).await;
    let cancel = CancellationToken::new();
    let name = "io.github.example/resolve";

    let a = service.publish(server(name, first), &cancel).await.unwrap();
    let b = service.publish(server(name, second), &cancel).await.unwrap();
    assert_eq!(a.server_id(), b.server_id());

    assert_eq!(latest_versions(&service, name).await, vec![latest.to_owned()]);

    let by_id = service.get_by_id(a.server_id().unwrap(), &cancel).await.unwrap();
    assert_eq!(by_id.version, latest);
}

/// Publishing assigns fresh identifiers and replaces caller metadata.
#[test_log::test(tokio::test)]
async fn test_publish_stamps_metadata() {
    let dir = TempDir::new().unwrap();
    let service = open(&dir).await;
    let cancel = CancellationToken::new();

    let mut input = server("io.github.example/stamp", "0.1.0");
    let forged = RegistryExtensions {
        server_id: "forged".into(),
        version_id: "forged".into(),
        published_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
        is_latest: false,
    };
    input.set_official(forged);

    let stored = service.publish(input, &cancel).await.unwrap();
    let official = stored.official().unwrap();
    assert!(uuid_like(&official.server_id));
    assert!(uuid_like(&official.version_id));
    assert!(official.is_latest);
    assert_eq!(official.published_at, official.updated_at);

    let fetched = service
        .database()
        .get_by_version_id(&official.version_id, &cancel)
        .await
        .unwrap();
    assert_eq!(fetched, stored);

    let versions = service.get_versions(&official.server_id, &cancel).await.unwrap();
    assert_eq!(versions.len(), 1);
    let exact = service
        .get_by_id_and_version(&official.server_id, "0.1.0", &cancel)
        .await
        .unwrap();
    assert_eq!(exact, stored);
}

fn uuid_like(id: &str) -> bool {
    id.len() == 36 && id.chars().filter(|c| *c == '-').count() == 4
}

#[test_log::test(tokio::test)]
async fn test_publish_requires_name_and_version() {
    let dir = TempDir::new().unwrap();
    let service = open(&dir).await;
    let cancel = CancellationToken::new();

    let err = service.publish(server("", "1.0.0"), &cancel).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    let err = service
        .publish(server("io.github.example/blank", "  "), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    assert_eq!(service.count_versions(&cancel).await.unwrap(), 0);
}

/// A duplicate version string is refused and nothing changes.
#[test_log::test(tokio::test)]
async fn test_duplicate_version_rejected() {
    let dir = TempDir::new().unwrap();
    let service = open(&dir).await;
    let cancel = CancellationToken::new();
    let name = "io.github.example/dup";

    let first = service.publish(server(name, "1.0.0"), &cancel).await.unwrap();
    service.publish(server(name, "1.1.0"), &cancel).await.unwrap();

    let err = service.publish(server(name, "1.0.0"), &cancel).await.unwrap_err();
    assert!(matches!(err, ServiceError::DuplicateVersion { .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    assert_eq!(service.count_versions(&cancel).await.unwrap(), 2);
    assert_eq!(latest_versions(&service, name).await, vec!["1.1.0".to_owned()]);
    let unchanged = service
        .database()
        .get_by_version_id(first.version_id().unwrap(), &cancel)
        .await
        .unwrap();
    assert!(!unchanged.is_latest());
}

#[test_log::test(tokio::test)]
async fn test_version_limit() {
    let dir = TempDir::new().unwrap();
    let service = open_with(
        &dir,
        PublishConfig {
            max_versions_per_server: 2,
        },
    )
    .await;
    let cancel = CancellationToken::new();
    let name = "io.github.example/limited";

    service.publish(server(name, "1.0.0"), &cancel).await.unwrap();
    service.publish(server(name, "1.0.1"), &cancel).await.unwrap();
    let err = service.publish(server(name, "1.0.2"), &cancel).await.unwrap_err();
    assert!(matches!(err, ServiceError::TooManyVersions { limit: 2, .. }));
    assert_eq!(latest_versions(&service, name).await, vec!["1.0.1".to_owned()]);
}

#[test_log::test(tokio::test)]
async fn test_cancelled_publish() {
    let dir = TempDir::new().unwrap();
    let service = open(&dir).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = service
        .publish(server("io.github.example/cancel", "1.0.0"), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);

    let live = CancellationToken::new();
    assert_eq!(service.count_versions(&live).await.unwrap(), 0);
}

/// Edits keep registry metadata from storage and refuse identity changes.
#[test_log::test(tokio::test)]
async fn test_edit() {
    let dir = TempDir::new().unwrap();
    let service = open(&dir).await;
    let cancel = CancellationToken::new();
    let name = "io.github.example/edit";

    let old = service.publish(server(name, "1.0.0"), &cancel).await.unwrap();
    let current = service.publish(server(name, "2.0.0"), &cancel).await.unwrap();
    let version_id = old.version_id().unwrap().to_owned();

    let mut body = server(name, "1.0.0");
    body.extra
        .insert("description".into(), json!("rewritten description"));
    let edited = service.edit(&version_id, body, &cancel).await.unwrap();

    let before = old.official().unwrap();
    let after = edited.official().unwrap();
    assert_eq!(after.server_id, before.server_id);
    assert_eq!(after.version_id, before.version_id);
    assert_eq!(after.published_at, before.published_at);
    assert!(!after.is_latest);
    assert!(after.updated_at >= before.updated_at);

    let stored = service
        .database()
        .get_by_version_id(&version_id, &cancel)
        .await
        .unwrap();
    assert_eq!(stored.extra["description"], json!("rewritten description"));
    assert_eq!(latest_versions(&service, name).await, vec!["2.0.0".to_owned()]);

    // Body claiming another version's identity.
    let mut mismatched = server(name, "1.0.0");
    mismatched.set_official(current.official().unwrap().clone());
    let err = service.edit(&version_id, mismatched, &cancel).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = service
        .edit(&version_id, server("io.github.example/renamed", "1.0.0"), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = service
        .edit(&version_id, server(name, "1.0.5"), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let unchanged = service
        .database()
        .get_by_version_id(&version_id, &cancel)
        .await
        .unwrap();
    assert_eq!(unchanged, stored);

    let err = service
        .edit(&new_id(), server(name, "1.0.0"), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test_log::test(tokio::test)]
async fn test_list_options() {
    let dir = TempDir::new().unwrap();
    let service = open(&dir).await;
    let cancel = CancellationToken::new();

    for (name, version) in [
        ("io.github.example/alpha", "1.0.0"),
        ("io.github.example/alpha", "2.0.0"),
        ("io.github.example/beta", "1.0.0"),
        ("io.github.other/gamma", "0.3.0"),
    ] {
        service.publish(server(name, version), &cancel).await.unwrap();
    }

    let latest = service
        .list(
            ListOptions {
                version: Some("latest".into()),
                ..Default::default()
            },
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(latest.count(), 3);
    assert!(latest.servers.iter().all(ServerJson::is_latest));
    assert_eq!(latest.metadata, None);

    let exact = service
        .list(
            ListOptions {
                version: Some("1.0.0".into()),
                ..Default::default()
            },
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(exact.count(), 2);

    let search = service
        .list(
            ListOptions {
                search: Some("EXAMPLE/ALPHA".into()),
                ..Default::default()
            },
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(search.count(), 2);

    let future = service
        .list(
            ListOptions {
                updated_since: Some(chrono::Utc::now() + chrono::Duration::hours(1)),
                ..Default::default()
            },
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(future.count(), 0);

    // A zero limit is raised to the configured minimum of one.
    let mut seen = Vec::new();
    let mut cursor = Some(String::new());
    loop {
        let page = service
            .list(
                ListOptions {
                    cursor: cursor.clone(),
                    limit: Some(0),
                    ..Default::default()
                },
                &cancel,
            )
            .await
            .unwrap();
        assert!(page.count() <= 1);
        if let Some(metadata) = &page.metadata {
            assert_eq!(metadata.count, page.count());
        }
        let next = page.next_cursor().map(str::to_owned);
        seen.extend(page.servers.into_iter().map(|s| s.version_id().unwrap().to_owned()));
        match next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    assert_eq!(seen.len(), 4);
    let mut sorted = seen.clone();
    sorted.sort();
    assert_eq!(seen, sorted);

    let err = service
        .list(
            ListOptions {
                cursor: Some("not-a-cursor".into()),
                ..Default::default()
            },
            &cancel,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test_log::test(tokio::test)]
async fn test_response_serialization() {
    let dir = TempDir::new().unwrap();
    let service = open(&dir).await;
    let cancel = CancellationToken::new();
    for version in ["1.0.0", "1.1.0"] {
        service
            .publish(server("io.github.example/wire", version), &cancel)
            .await
            .unwrap();
    }

    // Last page: no metadata at all.
    let response = service.list(ListOptions::default(), &cancel).await.unwrap();
    let value = serde_json::to_value(&response).unwrap();
    assert!(value.get("metadata").is_none());
    assert_eq!(value["servers"].as_array().unwrap().len(), 2);
    assert!(
        value["servers"][0]["_meta"]["io.modelcontextprotocol.registry/official"]["isLatest"]
            .is_boolean()
    );

    let response = service
        .list(
            ListOptions {
                limit: Some(1),
                ..Default::default()
            },
            &cancel,
        )
        .await
        .unwrap();
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["metadata"]["count"], json!(1));
    assert_eq!(
        value["metadata"]["next_cursor"],
        json!(response.next_cursor().unwrap())
    );
}
