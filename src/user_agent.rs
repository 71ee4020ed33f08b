//! User-Agent string for Scopus API traffic.

/// Project URL advertised in the User-Agent.
const PROJECT_UA_URL: &str = "https://github.com/fierce/scopus-crawler";

/// Default User-Agent for all Scopus requests.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("scopus-crawler/{version} (research-tool; +{PROJECT_UA_URL})")
}
