//! Socket availability guard for wiremock-backed integration tests.

use std::net::TcpListener;

use wiremock::MockServer;

const REQUIRE_ENV: &str = "SCOPUS_CRAWLER_REQUIRE_SOCKET_TESTS";

fn socket_tests_required() -> bool {
    std::env::var(REQUIRE_ENV)
        .ok()
        .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Returns a running mock server, or `None` when localhost sockets are
/// blocked and `SCOPUS_CRAWLER_REQUIRE_SOCKET_TESTS` is not set.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    match TcpListener::bind("127.0.0.1:0") {
        Ok(_) => Some(MockServer::start().await),
        Err(e) if socket_tests_required() => {
            panic!("cannot bind localhost socket ({e}) and {REQUIRE_ENV} is set")
        }
        Err(e) => {
            eprintln!("[socket-bound-test] cannot bind localhost socket ({e}), skipping");
            None
        }
    }
}
