use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{self, Read, Seek, Write};
use std::path::Path;
use zip::ZipArchive;

const MAX_FILENAME_LENGTH: usize = 255;
const COPY_BUFFER_SIZE: usize = 64 * 1024;
const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    #[error("corrupt archive member {name}: {source}")]
    CorruptEntry {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("archive contains more than {max} files")]
    TooManyEntries { max: usize },

    #[error("archive expands to more than {max_bytes} bytes")]
    TooLarge { max_bytes: u64 },

    #[error("failed to write {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Ceilings protecting the workspace against archive bombs
#[derive(Debug, Clone, Copy)]
pub struct ExtractionLimits {
    pub max_entries: usize,
    pub max_total_bytes: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Files written to the input region
    pub written: usize,
    /// Members discarded (symlinks, names reducing to nothing)
    pub discarded: usize,
    /// Members written under a suffixed name because their basename was taken
    pub renamed: usize,
    pub total_bytes: u64,
}

/// Reduce an archive member name to a bare file name.
///
/// Directory components are dropped, which neutralizes `../` sequences,
/// absolute paths and nesting. Returns `None` when nothing usable is left.
pub fn sanitize_entry_name(raw: &str) -> Option<String> {
    // Archives written on Windows may use backslashes as separators
    let normalized = raw.replace('\\', "/");

    Path::new(&normalized)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .filter(|s| !s.contains('\0') && s.len() <= MAX_FILENAME_LENGTH)
        .map(str::to_string)
}

/// Pick a name not yet used in this extraction: `photo.jpg`, then
/// `photo_1.jpg`, `photo_2.jpg`, ... Comparison ignores case so that
/// case-insensitive filesystems cannot merge two members either.
fn unique_name(name: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(&name.to_lowercase()) {
        return name.to_string();
    }

    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let extension = path.extension().and_then(|e| e.to_str());

    let mut counter = 1usize;
    loop {
        let candidate = match extension {
            Some(ext) => format!("{}_{}.{}", stem, counter, ext),
            None => format!("{}_{}", stem, counter),
        };
        if !taken.contains(&candidate.to_lowercase()) {
            return candidate;
        }
        counter += 1;
    }
}

fn is_symlink(unix_mode: Option<u32>) -> bool {
    unix_mode.is_some_and(|mode| mode & S_IFMT == S_IFLNK)
}

/// Unpack every file member of a ZIP archive into `input_dir`.
///
/// Any failure here is fatal for the Job. Files already written are left for
/// the workspace cleanup to remove.
pub fn extract_archive<R: Read + Seek>(
    reader: R,
    input_dir: &Path,
    limits: &ExtractionLimits,
) -> Result<ExtractionReport, ExtractionError> {
    let mut archive =
        ZipArchive::new(reader).map_err(|e| ExtractionError::InvalidArchive(e.to_string()))?;

    let mut report = ExtractionReport::default();
    let mut taken: HashSet<String> = HashSet::new();
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| ExtractionError::InvalidArchive(e.to_string()))?;

        if entry.is_dir() {
            continue;
        }

        let raw_name = entry.name().to_string();
        if is_symlink(entry.unix_mode()) {
            tracing::warn!(entry = %raw_name, "Skipping symlink archive member");
            report.discarded += 1;
            continue;
        }

        let Some(name) = sanitize_entry_name(&raw_name) else {
            tracing::debug!(entry = %raw_name, "Discarding archive member with empty name");
            report.discarded += 1;
            continue;
        };

        if report.written >= limits.max_entries {
            return Err(ExtractionError::TooManyEntries {
                max: limits.max_entries,
            });
        }

        // Declared sizes can lie; the copy loop below enforces the real limit
        if report.total_bytes.saturating_add(entry.size()) > limits.max_total_bytes {
            return Err(ExtractionError::TooLarge {
                max_bytes: limits.max_total_bytes,
            });
        }

        let target_name = unique_name(&name, &taken);
        if target_name != name {
            tracing::warn!(
                entry = %raw_name,
                renamed_to = %target_name,
                "Archive member basename already extracted, keeping both"
            );
            report.renamed += 1;
        }
        taken.insert(target_name.to_lowercase());

        let target = input_dir.join(&target_name);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .map_err(|source| ExtractionError::Io {
                name: target_name.clone(),
                source,
            })?;

        loop {
            let read = entry
                .read(&mut buffer)
                .map_err(|source| ExtractionError::CorruptEntry {
                    name: raw_name.clone(),
                    source,
                })?;
            if read == 0 {
                break;
            }

            report.total_bytes += read as u64;
            if report.total_bytes > limits.max_total_bytes {
                return Err(ExtractionError::TooLarge {
                    max_bytes: limits.max_total_bytes,
                });
            }

            file.write_all(&buffer[..read])
                .map_err(|source| ExtractionError::Io {
                    name: target_name.clone(),
                    source,
                })?;
        }

        report.written += 1;
    }

    Ok(report)
}
