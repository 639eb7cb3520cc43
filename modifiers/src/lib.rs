//! Single-inner-`Resolver` modifiers (§4.5): each wraps exactly one child
//! resolver and adjusts the query on the way in, the response on the way
//! back, or both.

pub mod blocklist_filter;
pub mod client_blocklist;
pub mod collapse;
pub mod drop;
pub mod ecs;
pub mod query_log;
pub mod replace;
pub mod response_blocklist;
pub mod static_responder;
pub mod syslog;
pub mod truncate;
pub mod truncate_retry;
pub mod ttl_clamp;

pub use blocklist_filter::{BlockAction, BlocklistFilter};
pub use client_blocklist::{ClientAddrSource, ClientBlocklist};
pub use collapse::Collapse;
pub use drop::DropModifier;
pub use ecs::{EcsMode, EcsModifier};
pub use query_log::{LogVerbosity, QueryLog};
pub use replace::Replace;
pub use response_blocklist::{ResponseBlockAction, ResponseBlocklist};
pub use static_responder::{StaticResponder, Template};
pub use syslog::{RecordFormat, Syslog};
pub use truncate::Truncate;
pub use truncate_retry::TruncateRetry;
pub use ttl_clamp::TtlClamp;
