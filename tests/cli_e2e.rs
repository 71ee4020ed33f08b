//! End-to-end CLI tests for the scopus-crawler binary.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use scopus_core::Database;
use scopus_core::store::PaperStore;
mod support;
use support::socket_guard::start_mock_server_or_skip;

fn crawler_cmd() -> Command {
    let mut cmd = Command::cargo_bin("scopus-crawler").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    crawler_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Crawl Scopus"))
        .stdout(predicate::str::contains("ngrams"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    crawler_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("scopus-crawler"));
}

#[test]
fn test_binary_without_subcommand_fails() {
    crawler_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    crawler_cmd()
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_crawl_limit_zero_rejected() {
    crawler_cmd()
        .args(["crawl", "-k", "ai", "-t", "ar", "--limit", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--limit"));
}

#[test]
fn test_missing_config_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope.json");
    crawler_cmd()
        .arg("--config")
        .arg(&missing)
        .args(["crawl", "-k", "ai", "-t", "ar"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn test_unknown_config_field_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("config.json");
    fs::write(&config, r#"{"api_keyz": ["k"]}"#).unwrap();
    crawler_cmd()
        .arg("--config")
        .arg(&config)
        .args(["crawl", "-k", "ai", "-t", "ar"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config file"));
}

#[test]
fn test_crawl_without_keys_fails() {
    let temp_dir = TempDir::new().unwrap();
    crawler_cmd()
        .args(["crawl", "-k", "ai", "-t", "ar", "--db"])
        .arg(temp_dir.path().join("papers.db"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("No API keys configured"));
}

#[test]
fn test_crawl_without_keywords_fails() {
    let temp_dir = TempDir::new().unwrap();
    let keys = temp_dir.path().join("keys.json");
    fs::write(&keys, r#"{"API_Keys": ["k1"]}"#).unwrap();
    crawler_cmd()
        .arg("--keys-file")
        .arg(&keys)
        .args(["crawl", "-t", "ar"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No keywords configured"));
}

#[test]
fn test_ngrams_on_empty_database_succeeds() {
    let temp_dir = TempDir::new().unwrap();
    crawler_cmd()
        .args(["-q", "ngrams", "--db"])
        .arg(temp_dir.path().join("papers.db"))
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_crawl_against_mock_api_stores_papers() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/content/search/scopus"))
        .and(header("X-ELS-APIKey", "key-one"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "search-results": {
                "opensearch:totalResults": "2",
                "entry": [
                    {
                        "prism:doi": "10.5555/one",
                        "dc:title": "Cursor pagination at scale",
                        "prism:aggregationType": "Journal",
                        "prism:coverDate": "2019-11-05"
                    },
                    {
                        "dc:title": "A paper without a DOI",
                        "prism:aggregationType": "Conference Proceeding"
                    }
                ]
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("papers.db");
    let config_path = temp_dir.path().join("config.json");
    fs::write(
        &config_path,
        serde_json::to_string(&json!({
            "api_keys": ["key-one"],
            "keywords": ["pagination"],
            "doc_types": ["ar"],
            "base_url": mock_server.uri(),
            "rotation_pause_ms": 0,
            "database": db_path.display().to_string(),
        }))
        .unwrap(),
    )
    .unwrap();

    let outcome = tokio::task::spawn_blocking(move || {
        crawler_cmd()
            .arg("--config")
            .arg(&config_path)
            .args(["crawl", "--no-progress"])
            .assert()
    })
    .await
    .unwrap();
    outcome.success();

    let db = Database::new(&db_path).await.unwrap();
    let store = PaperStore::new(db.clone());
    assert_eq!(store.count().await.unwrap(), 2);
    let runs = store.search_runs().await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].query, "pagination AND DOCTYPE(ar)");
    assert_eq!(runs[0].stored, 2);
    db.close().await;
}
