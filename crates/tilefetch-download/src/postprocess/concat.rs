//! Multi-part model concatenation.
//!
//! Split GGUF downloads arrive as `model-00001-of-00003.gguf` style parts,
//! possibly nested in subdirectories. Sorting full paths puts them in shard
//! order; the merged file goes into the destination root.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::cancellable::{CancellableReader, DEFAULT_CHECK_INTERVAL};
use super::{GGUF_EXTENSION, PostProcessError, discard_partial, partial_path};

/// All files under `root` with the given extension (case-insensitive),
/// sorted by full path. In-progress `.partial` outputs are never matched.
pub fn find_part_files(root: &Path, extension: &str) -> Result<Vec<PathBuf>, PostProcessError> {
    let mut parts = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            let context = format!("scanning {}", root.display());
            PostProcessError::from_io(context, io::Error::other(e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if matches {
            parts.push(entry.into_path());
        }
    }
    parts.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    Ok(parts)
}

/// Merge the parts under `root` into `<root>/<output_name>.gguf`.
///
/// A single part is returned as-is. Each part is deleted once it has been
/// fully copied. `on_part(i, n)` is called before copying the i-th
/// (1-based) of n parts.
pub fn concatenate_parts(
    root: &Path,
    output_name: &str,
    cancel: &CancellationToken,
    mut on_part: impl FnMut(usize, usize),
) -> Result<PathBuf, PostProcessError> {
    let output = root.join(format!("{output_name}.{GGUF_EXTENSION}"));
    let parts: Vec<PathBuf> = find_part_files(root, GGUF_EXTENSION)?
        .into_iter()
        .filter(|part| *part != output)
        .collect();

    match parts.as_slice() {
        [] => return Err(PostProcessError::NoArtifacts(root.to_path_buf())),
        [single] => {
            debug!(path = %single.display(), "Single part, nothing to merge");
            return Ok(single.clone());
        }
        _ => {}
    }

    if cancel.is_cancelled() {
        return Err(PostProcessError::Cancelled);
    }

    let partial = partial_path(&output);
    match merge_into(&partial, &parts, cancel, &mut on_part) {
        Ok(()) => {}
        Err(e) => {
            discard_partial(&partial);
            return Err(e);
        }
    }

    if let Err(e) = fs::rename(&partial, &output) {
        discard_partial(&partial);
        return Err(PostProcessError::from_io(
            format!("renaming {}", partial.display()),
            e,
        ));
    }

    info!(path = %output.display(), parts = parts.len(), "Merged model parts");
    Ok(output)
}

fn merge_into(
    partial: &Path,
    parts: &[PathBuf],
    cancel: &CancellationToken,
    on_part: &mut impl FnMut(usize, usize),
) -> Result<(), PostProcessError> {
    let file = File::create(partial)
        .map_err(|e| PostProcessError::from_io(format!("creating {}", partial.display()), e))?;
    let mut writer = BufWriter::new(file);

    for (i, part) in parts.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(PostProcessError::Cancelled);
        }
        on_part(i + 1, parts.len());

        let source = File::open(part)
            .map_err(|e| PostProcessError::from_io(format!("opening {}", part.display()), e))?;
        let mut reader = CancellableReader::new(source, cancel, DEFAULT_CHECK_INTERVAL);
        io::copy(&mut reader, &mut writer)
            .map_err(|e| PostProcessError::from_io(format!("copying {}", part.display()), e))?;

        if let Err(e) = fs::remove_file(part) {
            warn!(path = %part.display(), error = %e, "Failed to delete merged part");
        }
    }

    let file = writer
        .into_inner()
        .map_err(|e| PostProcessError::from_io("flushing merged output", e.into_error()))?;
    file.sync_all()
        .map_err(|e| PostProcessError::from_io("syncing merged output", e))?;
    Ok(())
}
