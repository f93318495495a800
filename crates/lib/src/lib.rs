//! Assist bot core library: alert extraction, event filtering, threaded dispatch,
//! the Slack transport and the session poll loop used by the CLI.

pub mod alert;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod events;
pub mod init;
pub mod slack;
pub mod transport;

pub use alert::{extract_alert, AlertIdentity};
pub use catalog::AlertCatalog;
pub use dispatch::{CatalogReply, Dispatcher, EmptyReply, ReplyComposer};
pub use driver::{CycleOutcome, PollLoop, Session, SessionState, StopHandle};
pub use error::TransportError;
pub use events::{find_alert, AlertMatch, InboundEvent};
pub use slack::SlackTransport;
pub use transport::{ChatTransport, PostedReply};
