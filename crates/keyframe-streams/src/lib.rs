//! Keyframe stream reconciler.
//!
//! Reconciles the stream manifest against:
//! - the relay store (frontend stream list and ingest tokens)
//! - the ingest store (streams the SRT ingest service accepts)
//! - chat rooms, XMPP accounts, credentials mail and the ingest service

pub mod cmd;
pub mod engine;
pub mod notification;
pub mod recovery;
pub mod run_lock;
pub mod storage;
pub mod tools;

pub use engine::{Reconciler, ReconcileError, RunMode, RunReport};
