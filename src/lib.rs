//! vmkeeper
//!
//! Data-protection orchestration for virtualization first-class objects
//! (FCOs): virtual machines, improved virtual disks, virtual appliances and
//! namespaces.
//!
//! One user command ("back up everything tagged prod") resolves to a set of
//! FCOs. Each FCO gets its own result action with an independent outcome;
//! the engine fans the work out (inline for the CLI, bounded worker pools
//! for the HTTP API), tolerates per-entity failure, honors a cooperative
//! abort signal and aggregates everything into one statistic summary.
//!
//! Disk-block transport and hypervisor sessions are collaborator concerns
//! behind the traits in [`ops`]; this crate owns bookkeeping only.

pub mod abort;
pub mod auth;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod fco;
pub mod ops;
pub mod report;
pub mod runner;
pub mod runtime;
pub mod sinks;
pub mod tasks;
