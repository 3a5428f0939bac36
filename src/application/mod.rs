//! Application layer containing the approval workflow orchestration.
//!
//! `ApprovalEngine` is the entry point. It composes the config resolver, the
//! approval ledger, the status writers and the notification dispatcher, and
//! awaits each storage step in order for a single decision.

pub mod config_resolver;
pub mod engine;
pub mod ledger;
pub mod notify;
pub mod status_writer;
