//! Chat command handling
//!
//! - [`parser`]: turns chat text into validated [`Command`]s
//! - [`orchestrator`]: dispatches commands to the backend and aggregator,
//!   replies to the requester and fans out notifications

pub mod orchestrator;
pub mod parser;

pub use orchestrator::{
    promoted_capacity, ChatRequest, CommandOutcome, CommandStatus, Orchestrator, Reply,
};
pub use parser::{Command, CommandKind, CommandParser, Parsed};
