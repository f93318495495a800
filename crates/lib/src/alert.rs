//! Alert extraction: turn the free-form text of a relayed Prometheus notification
//! into a normalized alert name.
//!
//! Two shapes are recognized after the `[FIRING:<n>]` marker:
//! - `[FIRING:3](HighCPU prod-cluster-1)`: the name and cluster inside parentheses.
//! - `[FIRING:3] HighCPU prod-cluster-1 (instance=...)`: Alertmanager's default title,
//!   everything up to the last opening parenthesis on the line.
//!
//! In both cases the last whitespace-delimited token is the cluster qualifier and is dropped.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Marker, then either a parenthesized capture or everything up to the last `(` on the line.
const ALERT_PATTERN: &str = r"\[FIRING:[0-9]+\](?:\(([^)\n]*)\)|(.*)\()";

static ALERT_REGEX: OnceLock<Regex> = OnceLock::new();

fn alert_regex() -> &'static Regex {
    ALERT_REGEX.get_or_init(|| Regex::new(ALERT_PATTERN).expect("alert pattern is a valid regex"))
}

/// Alert name extracted from a firing notification, cluster qualifier removed.
///
/// May be empty when the capture held a single token; that is still a match,
/// distinct from "no alert" (`None` from [`extract_alert`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AlertIdentity(String);

impl AlertIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AlertIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for AlertIdentity {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Extract the alert identity from message text. `None` when the text carries no alert marker
/// followed by an opening parenthesis.
pub fn extract_alert(text: &str) -> Option<AlertIdentity> {
    let caps = alert_regex().captures(text)?;
    let span = caps
        .get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str())
        .unwrap_or("");
    Some(AlertIdentity(strip_cluster_qualifier(span)))
}

/// Drop the trailing whitespace-delimited token and rejoin the rest with single spaces.
fn strip_cluster_qualifier(span: &str) -> String {
    let tokens: Vec<&str> = span.split_whitespace().collect();
    match tokens.split_last() {
        Some((_cluster, name)) => name.join(" "),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parenthesized_single_word_alert() {
        let alert = extract_alert("[FIRING:3](HighCPU prod-cluster-1)").unwrap();
        assert_eq!(alert, "HighCPU");
    }

    #[test]
    fn multi_word_alert_keeps_all_but_last_token() {
        let alert = extract_alert("[FIRING:12](Disk Space Low node7)").unwrap();
        assert_eq!(alert, "Disk Space Low");
    }

    #[test]
    fn single_token_capture_is_empty_but_present() {
        let alert = extract_alert("[FIRING:1](SoloToken)").unwrap();
        assert!(alert.is_empty());
        assert_eq!(alert.as_str(), "");
    }

    #[test]
    fn alertmanager_title_form() {
        let text = "[FIRING:2] KubePodCrashLooping prod-eu (namespace=web pod=api-1)";
        assert_eq!(extract_alert(text).unwrap(), "KubePodCrashLooping");
    }

    #[test]
    fn alertmanager_title_form_collapses_inner_whitespace() {
        let text = "[FIRING:5]   Node   Not Ready    staging  (node=a)";
        assert_eq!(extract_alert(text).unwrap(), "Node Not Ready");
    }

    #[test]
    fn marker_embedded_in_longer_message() {
        let text = "heads up: [FIRING:7](Latency High eu-west) please look\n*Details:* p99 > 2s";
        assert_eq!(extract_alert(text).unwrap(), "Latency High");
    }

    #[test]
    fn no_marker_means_no_alert() {
        assert_eq!(extract_alert(""), None);
        assert_eq!(extract_alert("just chatting (nothing to see)"), None);
        assert_eq!(extract_alert("[RESOLVED](HighCPU prod)"), None);
        assert_eq!(extract_alert("[FIRING:](HighCPU prod)"), None);
        assert_eq!(extract_alert("[FIRING:x](HighCPU prod)"), None);
        assert_eq!(extract_alert("FIRING:3 HighCPU prod (x)"), None);
    }

    #[test]
    fn marker_without_parenthesis_is_no_alert() {
        assert_eq!(extract_alert("[FIRING:3] HighCPU prod"), None);
    }

    #[test]
    fn unclosed_parenthesis_yields_empty_identity() {
        let alert = extract_alert("[FIRING:4](HighCPU prod").unwrap();
        assert!(alert.is_empty());
    }

    #[test]
    fn blank_capture_yields_empty_identity() {
        assert!(extract_alert("[FIRING:1](   )").unwrap().is_empty());
    }

    #[test]
    fn extraction_is_repeatable() {
        let text = "[FIRING:12](Disk Space Low node7)";
        assert_eq!(extract_alert(text), extract_alert(text));
        assert_eq!(extract_alert("nothing"), extract_alert("nothing"));
    }
}
