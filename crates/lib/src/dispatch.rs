//! Alert dispatch: compose a reply for a matched alert and post it in the alert's thread.

use crate::alert::AlertIdentity;
use crate::catalog::AlertCatalog;
use crate::config::ReplyMode;
use crate::error::TransportError;
use crate::events::InboundEvent;
use crate::transport::{ChatTransport, PostedReply};
use serde_json::Value;

/// Builds the reply body for a matched alert.
pub trait ReplyComposer: Send + Sync {
    fn compose(
        &self,
        event: &InboundEvent,
        alert: &AlertIdentity,
        catalog: &AlertCatalog,
    ) -> String;
}

/// Posts an empty body: acknowledges in-thread without content.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyReply;

impl ReplyComposer for EmptyReply {
    fn compose(
        &self,
        _event: &InboundEvent,
        _alert: &AlertIdentity,
        _catalog: &AlertCatalog,
    ) -> String {
        String::new()
    }
}

/// Summarizes the catalog entry for the alert (summary and runbook when present).
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogReply;

const SUMMARY_KEYS: &[&str] = &["summary", "description"];
const RUNBOOK_KEYS: &[&str] = &["runbook", "runbook_url", "runbookUrl"];

fn first_str<'a>(entry: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| entry.get(*k).and_then(|v| v.as_str()))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

impl ReplyComposer for CatalogReply {
    fn compose(
        &self,
        _event: &InboundEvent,
        alert: &AlertIdentity,
        catalog: &AlertCatalog,
    ) -> String {
        if alert.is_empty() {
            return "Alert is firing but its name could not be read from the message.".to_string();
        }
        let Some(entry) = catalog.get(alert.as_str()) else {
            return format!("No catalog entry for alert `{}`.", alert);
        };
        if !entry.is_object() {
            return format!("`{}`: {}", alert, entry);
        }
        let mut lines = vec![format!("*{}*", alert)];
        if let Some(summary) = first_str(entry, SUMMARY_KEYS) {
            lines.push(summary.to_string());
        }
        if let Some(runbook) = first_str(entry, RUNBOOK_KEYS) {
            lines.push(format!("Runbook: {}", runbook));
        }
        lines.join("\n")
    }
}

/// Sends replies for matched alerts. Stateless across calls.
pub struct Dispatcher {
    composer: Box<dyn ReplyComposer>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(EmptyReply)
    }
}

impl Dispatcher {
    pub fn new(composer: impl ReplyComposer + 'static) -> Self {
        Self {
            composer: Box::new(composer),
        }
    }

    /// Dispatcher using the composer selected by `reply.mode`.
    pub fn from_mode(mode: ReplyMode) -> Self {
        match mode {
            ReplyMode::Empty => Self::new(EmptyReply),
            ReplyMode::Catalog => Self::new(CatalogReply),
        }
    }

    /// Post the composed reply into `event.channel_id`, threaded under `event.timestamp`.
    /// Transport failures are returned to the caller.
    pub async fn dispatch<T>(
        &self,
        transport: &T,
        event: &InboundEvent,
        alert: &AlertIdentity,
        catalog: &AlertCatalog,
    ) -> Result<PostedReply, TransportError>
    where
        T: ChatTransport + ?Sized,
    {
        let body = self.composer.compose(event, alert, catalog);
        log::info!(
            "alert '{}' in {} (ts {}): replying in thread",
            alert,
            event.channel_id,
            event.timestamp
        );
        transport
            .post_message(&event.channel_id, &event.timestamp, &body)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        posts: Mutex<Vec<(String, String, String)>>,
        fail_with: Option<String>,
    }

    #[async_trait]
    impl ChatTransport for RecordingTransport {
        async fn connect(&mut self) -> Result<String, TransportError> {
            Ok("UBOT".to_string())
        }

        async fn read_events(&mut self) -> Result<Vec<InboundEvent>, TransportError> {
            Ok(Vec::new())
        }

        async fn post_message(
            &self,
            channel_id: &str,
            thread_ts: &str,
            text: &str,
        ) -> Result<PostedReply, TransportError> {
            if let Some(err) = &self.fail_with {
                return Err(TransportError::from_api("chat.postMessage", err.clone()));
            }
            self.posts.lock().unwrap().push((
                channel_id.to_string(),
                thread_ts.to_string(),
                text.to_string(),
            ));
            Ok(PostedReply {
                channel_id: channel_id.to_string(),
                thread_ts: thread_ts.to_string(),
                ts: Some("9.9".to_string()),
            })
        }
    }

    fn catalog() -> AlertCatalog {
        AlertCatalog::from_json(
            r#"{
                "HighCPU": {"summary": "CPU above 90% for 5m", "runbook_url": "https://runbooks/cpu"},
                "Disk Space Low": "see #storage"
            }"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn reply_is_threaded_under_triggering_event() {
        let transport = RecordingTransport::default();
        let event = InboundEvent::message("C42", "1700000000.000200", "[FIRING:1](HighCPU prod)");
        let alert = AlertIdentity::new("HighCPU");

        let posted = Dispatcher::default()
            .dispatch(&transport, &event, &alert, &catalog())
            .await
            .unwrap();

        assert_eq!(posted.channel_id, "C42");
        assert_eq!(posted.thread_ts, "1700000000.000200");
        let posts = transport.posts.lock().unwrap();
        assert_eq!(
            posts.as_slice(),
            &[("C42".to_string(), "1700000000.000200".to_string(), String::new())]
        );
    }

    #[tokio::test]
    async fn empty_identity_is_dispatched() {
        let transport = RecordingTransport::default();
        let event = InboundEvent::message("C1", "1.5", "[FIRING:1](SoloToken)");
        let result = Dispatcher::default()
            .dispatch(&transport, &event, &AlertIdentity::default(), &AlertCatalog::default())
            .await;
        assert!(result.is_ok());
        assert_eq!(transport.posts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn send_failure_is_reported() {
        let transport = RecordingTransport {
            fail_with: Some("channel_not_found".to_string()),
            ..Default::default()
        };
        let event = InboundEvent::message("CGONE", "1.6", "[FIRING:1](HighCPU prod)");
        let err = Dispatcher::default()
            .dispatch(&transport, &event, &AlertIdentity::new("HighCPU"), &catalog())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Api { ref error, .. } if error == "channel_not_found"));
    }

    #[tokio::test]
    async fn custom_composer_body_is_sent() {
        struct Echo;
        impl ReplyComposer for Echo {
            fn compose(
                &self,
                event: &InboundEvent,
                alert: &AlertIdentity,
                _: &AlertCatalog,
            ) -> String {
                format!("ack {} from {}", alert, event.channel_id)
            }
        }
        let transport = RecordingTransport::default();
        let event = InboundEvent::message("C7", "2.0", "[FIRING:2](HighCPU prod)");
        Dispatcher::new(Echo)
            .dispatch(&transport, &event, &AlertIdentity::new("HighCPU"), &catalog())
            .await
            .unwrap();
        assert_eq!(transport.posts.lock().unwrap()[0].2, "ack HighCPU from C7");
    }

    #[test]
    fn catalog_reply_renders_summary_and_runbook() {
        let event = InboundEvent::default();
        let body = CatalogReply.compose(&event, &AlertIdentity::new("HighCPU"), &catalog());
        assert_eq!(body, "*HighCPU*\nCPU above 90% for 5m\nRunbook: https://runbooks/cpu");
    }

    #[test]
    fn catalog_reply_handles_scalar_missing_and_empty() {
        let event = InboundEvent::default();
        let c = catalog();
        assert_eq!(
            CatalogReply.compose(&event, &AlertIdentity::new("Disk Space Low"), &c),
            "`Disk Space Low`: \"see #storage\""
        );
        assert_eq!(
            CatalogReply.compose(&event, &AlertIdentity::new("Nope"), &c),
            "No catalog entry for alert `Nope`."
        );
        assert!(CatalogReply
            .compose(&event, &AlertIdentity::default(), &c)
            .contains("could not be read"));
    }

    #[test]
    fn empty_reply_is_empty() {
        let body = EmptyReply.compose(
            &InboundEvent::default(),
            &AlertIdentity::new("HighCPU"),
            &catalog(),
        );
        assert!(body.is_empty());
    }
}
