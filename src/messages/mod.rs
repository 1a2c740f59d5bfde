//! # Messages Module
//!
//! Typed units of work and their correlated outcomes.
//!
//! - [`Command`]: a verb plus origin and correlation id, pushed through a
//!   message channel to exactly one owning task
//! - [`CommandResponse`]: the single outcome every accepted command yields,
//!   matched to its submission by correlation id
//!
//! Only the command router (and the analysis worker, for internal scan
//! requests) constructs commands; consumers drain and discard them.

pub mod command;
pub mod response;

pub use command::{
    next_correlation_id, AnalysisCommand, ApConfig, ApConfigPatch, Command, CommandOrigin, ConfigOp, CorrelationId,
    Credential, RadioCommand, StationProfile,
};
pub use response::{CommandResponse, RejectReason, ResponseDetail, ResponseStatus, ResponseText, StatusReport};
