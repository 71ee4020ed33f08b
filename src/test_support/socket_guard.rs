//! Skips wiremock-backed unit tests where localhost sockets are unavailable.

use std::net::TcpListener;

use wiremock::MockServer;

const REQUIRE_ENV: &str = "SCOPUS_CRAWLER_REQUIRE_SOCKET_TESTS";

fn socket_tests_required() -> bool {
    std::env::var(REQUIRE_ENV)
        .ok()
        .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Starts a mock server, or returns `None` (after a note on stderr) when the
/// sandbox forbids binding `127.0.0.1`.
///
/// With `SCOPUS_CRAWLER_REQUIRE_SOCKET_TESTS=1` a missing socket fails the test.
pub(crate) async fn start_mock_server_or_skip() -> Option<MockServer> {
    if let Err(e) = TcpListener::bind("127.0.0.1:0") {
        assert!(
            !socket_tests_required(),
            "cannot bind localhost socket ({e}); unset {REQUIRE_ENV} to allow skipping"
        );
        eprintln!("[socket-bound-test] cannot bind localhost socket ({e}), skipping");
        return None;
    }
    Some(MockServer::start().await)
}
