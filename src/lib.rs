#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]

//! agentrelay — relays Telegram chats to a Salesforce Agentforce agent.
//!
//! One message flows inbound update → router → session store →
//! agent client → outbound reply. A background sweep evicts idle
//! sessions; a small HTTP gateway exposes health and status probes.

pub mod agentforce;
pub mod channels;
pub mod config;
pub mod gateway;
pub mod routing;
pub mod sessions;

pub use config::Config;
