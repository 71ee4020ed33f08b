//! Integration tests for the crawl loop against a mocked search API and a
//! file-backed paper store.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use scopus_core::crawl::{CrawlOptions, Crawler, DedupStrategy};
use scopus_core::fetch::{FetcherSettings, RateLimitedFetcher, ScopusEndpoints, ServiceThrottle};
use scopus_core::keys::KeyPool;
use scopus_core::store::{PaperStore, RecordSink};
use scopus_core::Database;
mod support;
use support::socket_guard::start_mock_server_or_skip;

fn search_page(total: u64, entries: &[Value], next: Option<&str>) -> Value {
    let mut results = json!({
        "opensearch:totalResults": total.to_string(),
        "entry": entries,
    });
    if let Some(next) = next {
        results["cursor"] = json!({"@current": "*", "@next": next});
    }
    json!({ "search-results": results })
}

fn article(doi: &str, title: &str) -> Value {
    json!({
        "prism:doi": doi,
        "dc:title": title,
        "dc:description": format!("Abstract for {title}"),
        "author": [{"authid": "57000000001"}],
        "prism:coverDate": "2021-03-01",
        "prism:publicationName": "Journal of Tests",
        "prism:aggregationType": "Journal",
        "affiliation": [{"affiliation-country": "Israel"}],
        "citedby-count": "5",
        "authkeywords": "crawling | testing"
    })
}

fn crawler_for(base: &str, store: PaperStore, options: CrawlOptions) -> Crawler {
    let pool = KeyPool::new(vec!["key-1".to_string(), "key-2".to_string()]).unwrap();
    let fetcher = RateLimitedFetcher::new(
        Arc::new(pool),
        Arc::new(ServiceThrottle::disabled()),
        FetcherSettings {
            request_timeout: Duration::from_secs(5),
            rotation_pause: Duration::ZERO,
        },
    )
    .unwrap();
    Crawler::new(
        Arc::new(fetcher),
        Arc::new(store),
        CrawlOptions {
            endpoints: ScopusEndpoints::new(base),
            ..options
        },
    )
}

#[tokio::test]
async fn test_crawl_issues_cross_product_queries_in_order() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/content/search/scopus"))
        .and(query_param("query", "ai AND DOCTYPE(ar)"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(search_page(1, &[article("10.1/ar", "AR paper")], None)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/content/search/scopus"))
        .and(query_param("query", "ai AND DOCTYPE(cp)"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(search_page(1, &[article("10.1/cp", "CP paper")], None)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let db = Database::new_in_memory().await.unwrap();
    let store = PaperStore::new(db);
    let crawler = crawler_for(&mock_server.uri(), store.clone(), CrawlOptions::default());

    let report = crawler
        .run(&["ai".to_string()], &["ar".to_string(), "cp".to_string()])
        .await
        .unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    let queries: Vec<String> = requests
        .iter()
        .filter_map(|request| {
            request
                .url
                .query_pairs()
                .find(|(name, _)| name == "query")
                .map(|(_, value)| value.into_owned())
        })
        .collect();
    assert_eq!(queries, vec!["ai AND DOCTYPE(ar)", "ai AND DOCTYPE(cp)"]);

    assert_eq!(report.queries.len(), 2);
    assert_eq!(report.stored(), 2);
    assert_eq!(store.count().await.unwrap(), 2);

    let runs = store.search_runs().await.unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].query, "ai AND DOCTYPE(ar)");
    assert_eq!(runs[1].query, "ai AND DOCTYPE(cp)");
}

#[tokio::test]
async fn test_crawl_persists_parsed_fields() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(search_page(1, &[article("10.1/x", "Stored paper")], None)),
        )
        .mount(&mock_server)
        .await;

    let temp_dir = tempfile::tempdir().unwrap();
    let db = Database::new(&temp_dir.path().join("papers.db")).await.unwrap();
    let store = PaperStore::new(db.clone());
    let crawler = crawler_for(&mock_server.uri(), store.clone(), CrawlOptions::default());

    crawler
        .run(&["testing".to_string()], &["ar".to_string()])
        .await
        .unwrap();

    let papers = store.papers().await.unwrap();
    assert_eq!(papers.len(), 1);
    let paper = &papers[0];
    assert_eq!(paper.doi.as_deref(), Some("10.1/x"));
    assert_eq!(paper.title.as_deref(), Some("Stored paper"));
    assert_eq!(paper.year.as_deref(), Some("2021"));
    assert_eq!(paper.month.as_deref(), Some("03"));
    assert_eq!(paper.journal.as_deref(), Some("Journal of Tests"));
    assert_eq!(paper.country.as_deref(), Some("Israel"));
    assert_eq!(paper.cited_by.as_deref(), Some("5"));
    assert_eq!(paper.author_ids(), vec!["57000000001"]);
    assert_eq!(paper.keyword_list(), vec!["crawling", "testing"]);
    assert_eq!(paper.search_query, "testing AND DOCTYPE(ar)");
    db.close().await;
}

#[tokio::test]
async fn test_recrawl_is_idempotent() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(query_param("cursor", "*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(
            3,
            &[article("10.1/a", "A"), article("10.1/b", "B")],
            Some("next-1"),
        )))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("cursor", "next-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(search_page(3, &[article("10.1/a", "A")], None)),
        )
        .mount(&mock_server)
        .await;

    let store = PaperStore::new(Database::new_in_memory().await.unwrap());

    for dedup in [DedupStrategy::Sink, DedupStrategy::InMemory] {
        let options = CrawlOptions {
            dedup,
            ..CrawlOptions::default()
        };
        let crawler = crawler_for(&mock_server.uri(), store.clone(), options);
        crawler
            .run(&["ai".to_string()], &["ar".to_string()])
            .await
            .unwrap();
    }

    assert_eq!(store.count().await.unwrap(), 2);
    let keys = store.known_keys().await.unwrap();
    assert_eq!(keys.len(), 2);
}

#[tokio::test]
async fn test_crawl_year_range_is_sent_in_query() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(query_param(
            "query",
            "ai AND DOCTYPE(ar) AND (PUBYEAR AFT 2017 AND PUBYEAR BEF 2021)",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(0, &[], None)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = PaperStore::new(Database::new_in_memory().await.unwrap());
    let options = CrawlOptions {
        year_range: Some((2018, 2020)),
        ..CrawlOptions::default()
    };
    let report = crawler_for(&mock_server.uri(), store, options)
        .run(&["ai".to_string()], &["ar".to_string()])
        .await
        .unwrap();

    assert_eq!(report.failed(), 0);
    assert_eq!(report.queries[0].total_results, Some(0));
}
