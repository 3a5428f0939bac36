//! Domain types of the approval workflow and the ports the workflow talks
//! to. Nothing in here performs I/O.

pub mod approval;
pub mod config;
pub mod identity;
pub mod notification;
pub mod payment;
pub mod ports;
