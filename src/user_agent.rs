//! Shared User-Agent string for archive service and transfer requests.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/bulkpull";

/// Default User-Agent for every request made by the tool.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("bulkpull/{version} (bulk-download-client; +{PROJECT_UA_URL})")
}
