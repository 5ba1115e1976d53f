//! Post-run processing utilities.
//!
//! Handles the history append and history refresh after a run completes.

use crate::model::{HistoryEntry, RunReport};
use crate::storage::Storage;

/// Result of post-run processing, ready for presentation layers.
pub(crate) struct ProcessedRun {
    pub history: Vec<HistoryEntry>,
    pub saved: bool,
}

/// Process a completed run: append it to history and reload the recent
/// entries. An append failure is reported but never fatal here; the run
/// itself already succeeded and callers decide how hard to fail.
pub(crate) fn process_run_completion(
    store: &dyn Storage,
    report: &RunReport,
    history_load: usize,
    auto_save: bool,
) -> ProcessedRun {
    let saved = if auto_save {
        match store.append_history(HistoryEntry::from_report(report)) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("could not append run to history: {err}");
                false
            }
        }
    } else {
        false
    };

    let history = store
        .load_history()
        .into_iter()
        .take(history_load)
        .collect();

    ProcessedRun { history, saved }
}
