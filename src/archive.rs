use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::domain::ArchiveFormat;
use crate::error::DatasetError;

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const BZIP2_MAGIC: [u8; 3] = [0x42, 0x5A, 0x68];
const ZIP_MAGIC: [[u8; 4]; 3] = [*b"PK\x03\x04", *b"PK\x05\x06", *b"PK\x07\x08"];
const TAR_BLOCK_LEN: usize = 512;
const TAR_CHECKSUM: std::ops::Range<usize> = 148..156;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TarCompression {
    None,
    Gzip,
    Bzip2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedArchive {
    Tar(TarCompression),
    Zip,
}

/// Extracts `file_path` into `dest_dir` if its signature matches `format`.
///
/// `None` disables extraction. `Auto` probes tar first, then zip. Returns
/// `Ok(false)` when no candidate matches, leaving the file as-is.
///
/// Members land in a staging directory inside `dest_dir` and are moved into
/// place only once every member was written. On failure the staging
/// directory is discarded and `dest_dir` is removed if this call created it.
/// Top-level members missing from `dest_dir` are moved with a single rename
/// each; members that already exist are replaced file by file, so a failed
/// rename during that merge can leave them partly updated.
pub fn extract_archive(
    file_path: &Path,
    dest_dir: &Path,
    format: Option<ArchiveFormat>,
) -> Result<bool, DatasetError> {
    let Some(format) = format else {
        return Ok(false);
    };
    let Some(detected) = detect(file_path, format)? else {
        debug!(
            path = %file_path.display(),
            %format,
            "no archive signature matched, leaving file untouched"
        );
        return Ok(false);
    };

    debug!(
        path = %file_path.display(),
        dest = %dest_dir.display(),
        ?detected,
        "extracting archive"
    );
    let created_dest = !dest_dir.exists();
    fs::create_dir_all(dest_dir).map_err(|err| {
        DatasetError::Filesystem(format!("create {}: {err}", dest_dir.display()))
    })?;

    let result = stage_and_commit(file_path, dest_dir, detected);
    if result.is_err() && created_dest {
        if let Err(err) = remove_path(dest_dir) {
            warn!(dest = %dest_dir.display(), "failed to remove partial extraction: {err}");
        }
    }
    result.map(|()| true)
}

pub fn detect(
    file_path: &Path,
    format: ArchiveFormat,
) -> Result<Option<DetectedArchive>, DatasetError> {
    match format {
        ArchiveFormat::Tar => Ok(detect_tar(file_path)?.map(DetectedArchive::Tar)),
        ArchiveFormat::Zip => Ok(is_zip(file_path)?.then_some(DetectedArchive::Zip)),
        ArchiveFormat::Auto => match detect(file_path, ArchiveFormat::Tar)? {
            Some(detected) => Ok(Some(detected)),
            None => detect(file_path, ArchiveFormat::Zip),
        },
    }
}

fn detect_tar(file_path: &Path) -> Result<Option<TarCompression>, DatasetError> {
    let head = read_prefix(file_path, BZIP2_MAGIC.len())?;
    let compression = if head.starts_with(&GZIP_MAGIC) {
        TarCompression::Gzip
    } else if head.starts_with(&BZIP2_MAGIC) {
        TarCompression::Bzip2
    } else {
        TarCompression::None
    };

    let stream = open_tar_stream(file_path, compression)?;
    let mut block = Vec::with_capacity(TAR_BLOCK_LEN);
    // A stream that fails to decompress is not a tarball we can read.
    if stream
        .take(TAR_BLOCK_LEN as u64)
        .read_to_end(&mut block)
        .is_err()
    {
        return Ok(None);
    }
    Ok(is_tar_header(&block).then_some(compression))
}

fn is_zip(file_path: &Path) -> Result<bool, DatasetError> {
    let head = read_prefix(file_path, 4)?;
    Ok(ZIP_MAGIC.iter().any(|magic| head.as_slice() == magic))
}

// Header checksum of the first block, ustar and v7 alike.
fn is_tar_header(block: &[u8]) -> bool {
    if block.len() < TAR_BLOCK_LEN || block.iter().all(|byte| *byte == 0) {
        return false;
    }
    let Some(stored) = parse_octal(&block[TAR_CHECKSUM]) else {
        return false;
    };
    let computed: u64 = block[..TAR_BLOCK_LEN]
        .iter()
        .enumerate()
        .map(|(idx, byte)| {
            if TAR_CHECKSUM.contains(&idx) {
                u64::from(b' ')
            } else {
                u64::from(*byte)
            }
        })
        .sum();
    stored == computed
}

fn parse_octal(field: &[u8]) -> Option<u64> {
    let digits: Vec<u8> = field
        .iter()
        .copied()
        .skip_while(|byte| *byte == b' ')
        .take_while(|byte| *byte != 0 && *byte != b' ')
        .collect();
    let text = std::str::from_utf8(&digits).ok()?;
    u64::from_str_radix(text, 8).ok()
}

fn read_prefix(file_path: &Path, len: usize) -> Result<Vec<u8>, DatasetError> {
    let file = File::open(file_path)
        .map_err(|err| DatasetError::Filesystem(format!("open {}: {err}", file_path.display())))?;
    let mut head = Vec::with_capacity(len);
    file.take(len as u64)
        .read_to_end(&mut head)
        .map_err(|err| DatasetError::Filesystem(format!("read {}: {err}", file_path.display())))?;
    Ok(head)
}

fn open_tar_stream(
    file_path: &Path,
    compression: TarCompression,
) -> Result<Box<dyn Read>, DatasetError> {
    let file = File::open(file_path)
        .map_err(|err| DatasetError::Filesystem(format!("open {}: {err}", file_path.display())))?;
    let reader = BufReader::new(file);
    Ok(match compression {
        TarCompression::None => Box::new(reader),
        // pigz and pbzip2 write one compressed stream per chunk.
        TarCompression::Gzip => Box::new(MultiGzDecoder::new(reader)),
        TarCompression::Bzip2 => Box::new(MultiBzDecoder::new(reader)),
    })
}

fn stage_and_commit(
    file_path: &Path,
    dest_dir: &Path,
    detected: DetectedArchive,
) -> Result<(), DatasetError> {
    let staging = tempfile::Builder::new()
        .prefix(".extract-")
        .tempdir_in(dest_dir)
        .map_err(|err| DatasetError::Filesystem(err.to_string()))?;

    let dir_modes = match detected {
        DetectedArchive::Tar(compression) => unpack_tar(file_path, compression, staging.path())?,
        DetectedArchive::Zip => {
            unpack_zip(file_path, staging.path())?;
            Vec::new()
        }
    };

    merge_into(staging.path(), dest_dir).map_err(|err| {
        DatasetError::Filesystem(format!("move members into {}: {err}", dest_dir.display()))
    })?;
    apply_dir_modes(dest_dir, dir_modes).map_err(|err| {
        DatasetError::Filesystem(format!("set permissions in {}: {err}", dest_dir.display()))
    })?;
    staging
        .close()
        .map_err(|err| DatasetError::Filesystem(err.to_string()))
}

// Directory modes are returned rather than applied so a read-only directory
// entry cannot block writes of the members that follow it.
fn unpack_tar(
    file_path: &Path,
    compression: TarCompression,
    target_dir: &Path,
) -> Result<Vec<(PathBuf, u32)>, DatasetError> {
    let archive_err =
        |err: io::Error| DatasetError::Archive(format!("{}: {err}", file_path.display()));
    let stream = open_tar_stream(file_path, compression)?;
    let mut archive = tar::Archive::new(stream);
    let mut dir_modes = Vec::new();

    for entry in archive.entries().map_err(archive_err)? {
        let mut entry = entry.map_err(archive_err)?;
        let entry_path = entry.path().map_err(archive_err)?.into_owned();
        if !is_enclosed(&entry_path) {
            return Err(DatasetError::Archive(format!(
                "tar entry path traversal detected: {}",
                entry_path.display()
            )));
        }
        entry.unpack_in(target_dir).map_err(archive_err)?;

        if entry.header().entry_type().is_dir() {
            let mode = entry.header().mode().map_err(archive_err)?;
            make_writable(&target_dir.join(&entry_path))
                .map_err(|err| DatasetError::Filesystem(err.to_string()))?;
            if has_normal_component(&entry_path) {
                dir_modes.push((entry_path, mode));
            }
        }
    }
    Ok(dir_modes)
}

fn unpack_zip(file_path: &Path, target_dir: &Path) -> Result<(), DatasetError> {
    let file = File::open(file_path)
        .map_err(|err| DatasetError::Filesystem(format!("open zip {}: {err}", file_path.display())))?;
    let mut archive = ZipArchive::new(BufReader::new(file))
        .map_err(|err| DatasetError::Archive(format!("{}: {err}", file_path.display())))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| DatasetError::Archive(err.to_string()))?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => {
                return Err(DatasetError::Archive(format!(
                    "zip entry path traversal detected: {}",
                    entry.name()
                )));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|err| DatasetError::Filesystem(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| DatasetError::Filesystem(err.to_string()))?;
        }
        let mut outfile = File::create(&entry_path)
            .map_err(|err| DatasetError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile).map_err(|err| {
            DatasetError::Archive(format!("{} in {}: {err}", entry.name(), file_path.display()))
        })?;
    }
    Ok(())
}

fn is_enclosed(path: &Path) -> bool {
    path.components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

fn has_normal_component(path: &Path) -> bool {
    path.components()
        .any(|component| matches!(component, Component::Normal(_)))
}

#[cfg(unix)]
fn make_writable(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(dir, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_writable(_dir: &Path) -> io::Result<()> {
    Ok(())
}

// Children before parents, so a mode without the search bit cannot hide
// directories that still need theirs.
#[cfg(unix)]
fn apply_dir_modes(root: &Path, mut dir_modes: Vec<(PathBuf, u32)>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    dir_modes.sort();
    for (path, mode) in dir_modes.iter().rev() {
        fs::set_permissions(root.join(path), fs::Permissions::from_mode(mode & 0o777))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_dir_modes(_root: &Path, _dir_modes: Vec<(PathBuf, u32)>) -> io::Result<()> {
    Ok(())
}

// Moves everything under `from` into `to`, replacing members that already
// exist and keeping unrelated files in `to`.
fn merge_into(from: &Path, to: &Path) -> io::Result<()> {
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let source = entry.path();
        let target = to.join(entry.file_name());
        let Ok(existing) = fs::symlink_metadata(&target) else {
            fs::rename(&source, &target)?;
            continue;
        };

        if entry.file_type()?.is_dir() && existing.is_dir() {
            merge_into(&source, &target)?;
        } else {
            remove_path(&target)?;
            fs::rename(&source, &target)?;
        }
    }
    Ok(())
}

fn remove_path(path: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}
