//! File selection and save-layout policy applied before a transfer starts.

use tracing::warn;

use crate::engine::{FileManifest, FilePriority, TransferHandle};

/// Apply the caller's file subset and flatten flag to a fresh handle.
///
/// Every index in `[0, file_count)` gets an explicit priority — selected
/// (or all, when `selection` is `None`) files become `Normal`, the rest
/// `Skip`; nothing is left at an engine default. When `flatten_top_dir` is
/// set, files nested under a top directory are renamed to drop its first
/// segment; single-segment paths are left alone. Engine refusals are
/// logged per index and do not abort the remaining indices. The whole pass
/// is idempotent.
pub fn apply_selection(
    handle: &dyn TransferHandle,
    manifest: &FileManifest,
    selection: Option<&[usize]>,
    flatten_top_dir: bool,
) {
    for index in 0..manifest.file_count() {
        let wanted = selection.map_or(true, |selected| selected.contains(&index));
        let priority = if wanted {
            FilePriority::Normal
        } else {
            FilePriority::Skip
        };
        if let Err(err) = handle.set_file_priority(index, priority) {
            warn!(index, %err, "failed to set file priority");
        }
    }

    if !flatten_top_dir {
        return;
    }
    for entry in &manifest.files {
        let Some((_, remainder)) = entry.path.split_once('/') else {
            continue;
        };
        if remainder.is_empty() {
            continue;
        }
        if let Err(err) = handle.rename_file(entry.index, remainder) {
            warn!(index = entry.index, %err, "failed to rename file");
        }
    }
}
