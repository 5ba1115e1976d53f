//! Application-level orchestration utilities.
//!
//! This module owns run lifecycle control (the one-run-at-a-time session) and
//! post-run processing such as the history append and history refresh. UI/CLI
//! layers call into this module to keep responsibilities separated.

mod controller;
mod post_process;

pub(crate) use controller::SessionController;
pub(crate) use post_process::process_run_completion;
