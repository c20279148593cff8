//! Flattening `.tar.gz` archiver for directory-style models.
//!
//! Only regular, non-hidden files directly in the source root are packed,
//! each under its base name. The fetcher's `.cache` bookkeeping and any
//! nested directories stay out of the archive.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use flate2::Compression;
use flate2::write::GzEncoder;
use tar::{Builder, EntryType, Header};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::cancellable::CancellableReader;
use super::{PostProcessError, discard_partial, partial_path};

/// Regular, non-hidden files directly in `source`, sorted by name.
///
/// The token is checked before each directory entry.
pub fn collect_root_files(
    source: &Path,
    cancel: &CancellationToken,
) -> Result<Vec<PathBuf>, PostProcessError> {
    let read_dir = fs::read_dir(source)
        .map_err(|e| PostProcessError::from_io(format!("reading {}", source.display()), e))?;

    let mut files = Vec::new();
    for entry in read_dir {
        if cancel.is_cancelled() {
            return Err(PostProcessError::Cancelled);
        }
        let entry = entry
            .map_err(|e| PostProcessError::from_io(format!("reading {}", source.display()), e))?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        let path = entry.path();
        if hidden || !path.is_file() {
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

/// Write the root files of `source` to `output` as a gzip tar with fast
/// compression. Returns `output`.
pub fn write_flat_archive(
    source: &Path,
    output: &Path,
    cancel: &CancellationToken,
    check_interval: u64,
) -> Result<PathBuf, PostProcessError> {
    let files = collect_root_files(source, cancel)?;
    let partial = partial_path(output);

    if let Err(e) = build_archive(&partial, &files, cancel, check_interval) {
        discard_partial(&partial);
        return Err(if cancel.is_cancelled() {
            PostProcessError::Cancelled
        } else {
            e
        });
    }

    if let Err(e) = fs::rename(&partial, output) {
        discard_partial(&partial);
        return Err(PostProcessError::from_io(
            format!("renaming {}", partial.display()),
            e,
        ));
    }

    info!(path = %output.display(), files = files.len(), "Packaged model archive");
    Ok(output.to_path_buf())
}

fn build_archive(
    partial: &Path,
    files: &[PathBuf],
    cancel: &CancellationToken,
    check_interval: u64,
) -> Result<(), PostProcessError> {
    let io_err = |context: &str| {
        let context = context.to_string();
        move |e| PostProcessError::from_io(context, e)
    };

    let file = File::create(partial).map_err(io_err("creating archive"))?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::fast());
    let mut builder = Builder::new(encoder);

    for path in files {
        if cancel.is_cancelled() {
            return Err(PostProcessError::Cancelled);
        }
        let Some(name) = path.file_name() else {
            continue;
        };
        let context = format!("archiving {}", path.display());

        let source = File::open(path).map_err(io_err(&context))?;
        let metadata = source.metadata().map_err(io_err(&context))?;

        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(metadata.len());
        header.set_mode(file_mode(&metadata));
        header.set_mtime(
            metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map_or(0, |d| d.as_secs()),
        );

        debug!(file = %path.display(), bytes = metadata.len(), "Adding archive entry");
        let reader = CancellableReader::new(source, cancel, check_interval);
        builder
            .append_data(&mut header, name, reader)
            .map_err(io_err(&context))?;
    }

    let encoder = builder.into_inner().map_err(io_err("finishing archive"))?;
    let mut writer = encoder.finish().map_err(io_err("finishing compression"))?;
    writer.flush().map_err(io_err("flushing archive"))?;
    let file = writer
        .into_inner()
        .map_err(|e| PostProcessError::from_io("flushing archive", e.into_error()))?;
    file.sync_all().map_err(io_err("syncing archive"))?;
    Ok(())
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> u32 {
    0o644
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use tempfile::tempdir;

    fn entry_names(archive: &Path) -> Vec<String> {
        let file = File::open(archive).unwrap();
        let mut tar = tar::Archive::new(GzDecoder::new(file));
        tar.entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().display().to_string())
            .collect()
    }

    #[test]
    fn only_visible_root_files_are_archived_flat() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("model_temp");
        fs::create_dir_all(source.join(".cache").join("huggingface")).unwrap();
        fs::create_dir_all(source.join("nested")).unwrap();
        fs::write(source.join("config.json"), b"{}").unwrap();
        fs::write(source.join("model.safetensors"), b"weights").unwrap();
        fs::write(source.join(".gitattributes"), b"*").unwrap();
        fs::write(source.join("nested").join("inner.json"), b"{}").unwrap();
        fs::write(source.join(".cache").join("huggingface").join("lock"), b"").unwrap();

        let output = temp.path().join("model.tar.gz");
        let out = write_flat_archive(&source, &output, &CancellationToken::new(), 4).unwrap();

        assert_eq!(out, output);
        assert_eq!(entry_names(&output), vec!["config.json", "model.safetensors"]);
        assert!(!temp.path().join("model.tar.gz.partial").exists());
    }

    #[test]
    fn archived_content_is_preserved() {
        use std::io::Read;

        let temp = tempdir().unwrap();
        fs::write(temp.path().join("tokenizer.json"), b"{\"v\":1}").unwrap();
        let output = temp.path().join("out.tar.gz");
        write_flat_archive(temp.path(), &output, &CancellationToken::new(), 2).unwrap();

        let mut tar = tar::Archive::new(GzDecoder::new(File::open(&output).unwrap()));
        let mut entry = tar.entries().unwrap().next().unwrap().unwrap();
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "{\"v\":1}");
    }

    #[test]
    fn cancelled_archive_is_removed() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("src");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("a.json"), b"{}").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let output = temp.path().join("a.tar.gz");
        let err = write_flat_archive(&source, &output, &cancel, 1).unwrap_err();
        assert!(matches!(err, PostProcessError::Cancelled));
        assert!(!output.exists());
        assert!(!temp.path().join("a.tar.gz.partial").exists());
    }

    #[test]
    fn missing_source_is_an_io_error() {
        let temp = tempdir().unwrap();
        let err = write_flat_archive(
            &temp.path().join("absent"),
            &temp.path().join("x.tar.gz"),
            &CancellationToken::new(),
            1,
        )
        .unwrap_err();
        assert!(matches!(err, PostProcessError::Io { .. }));
    }
}
