use super::ArchiveFormat;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("failed to list output directory {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write archive {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Archive produced for a Job, stored on disk inside its workspace
#[derive(Debug, Clone)]
pub struct AssembledArchive {
    pub path: PathBuf,
    pub format: ArchiveFormat,
    pub entries: usize,
    pub size_bytes: u64,
}

/// Regular files of `dir`, sorted by name so archive layout is stable
fn list_outputs(dir: &Path) -> Result<Vec<(String, PathBuf)>, AssemblyError> {
    let list_err = |source| AssemblyError::List {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(list_err)? {
        let entry = entry.map_err(list_err)?;
        if !entry.file_type().map_err(list_err)?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        files.push((name, entry.path()));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

fn write_zip(files: &[(String, PathBuf)], out: File) -> io::Result<()> {
    let mut zip = ZipWriter::new(BufWriter::new(out));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for (name, path) in files {
        let entry_err = |e: io::Error| io::Error::new(e.kind(), format!("{}: {}", name, e));
        zip.start_file(name.as_str(), options)
            .map_err(io::Error::from)?;
        let mut source = File::open(path).map_err(entry_err)?;
        io::copy(&mut source, &mut zip).map_err(entry_err)?;
    }

    let mut writer = zip.finish().map_err(io::Error::from)?;
    writer.flush()
}

#[cfg(feature = "archive-tar")]
fn write_tar(files: &[(String, PathBuf)], out: File) -> io::Result<()> {
    let mut tar = tar::Builder::new(BufWriter::new(out));

    for (name, path) in files {
        let source = File::open(path)?;
        let mut header = tar::Header::new_gnu();
        header.set_size(source.metadata()?.len());
        header.set_mode(0o644);
        header.set_cksum();
        tar.append_data(&mut header, name, source)?;
    }

    let mut writer = tar.into_inner()?;
    writer.flush()
}

/// Pack every file of `output_dir` into a single archive at `destination`.
///
/// Entry names are the bare output file names; the archive has no
/// directories. A partially written archive is removed on failure.
pub fn assemble_archive(
    output_dir: &Path,
    destination: &Path,
    format: ArchiveFormat,
) -> Result<AssembledArchive, AssemblyError> {
    let files = list_outputs(output_dir)?;

    let write_err = |source| AssemblyError::Write {
        path: destination.to_path_buf(),
        source,
    };

    let out = File::create(destination).map_err(write_err)?;
    let written = match format {
        ArchiveFormat::Zip => write_zip(&files, out),
        #[cfg(feature = "archive-tar")]
        ArchiveFormat::Tar => write_tar(&files, out),
    };

    if let Err(e) = written {
        let _ = std::fs::remove_file(destination);
        return Err(write_err(e));
    }

    let size_bytes = std::fs::metadata(destination)
        .map_err(write_err)?
        .len();

    tracing::debug!(
        path = %destination.display(),
        entries = files.len(),
        size_bytes,
        archive_format = format.extension(),
        "Archive assembled"
    );

    Ok(AssembledArchive {
        path: destination.to_path_buf(),
        format,
        entries: files.len(),
        size_bytes,
    })
}
