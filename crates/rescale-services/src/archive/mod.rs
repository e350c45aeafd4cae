//! Archive containers: extraction of the inbound ZIP and assembly of the
//! outbound archive.

mod assemble;
mod extract;

pub use assemble::{assemble_archive, AssembledArchive, AssemblyError};
pub use extract::{
    extract_archive, sanitize_entry_name, ExtractionError, ExtractionLimits, ExtractionReport,
};

use std::str::FromStr;

/// Output archive format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveFormat {
    #[default]
    Zip,
    #[cfg(feature = "archive-tar")]
    Tar,
}

impl ArchiveFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            #[cfg(feature = "archive-tar")]
            ArchiveFormat::Tar => "tar",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "application/zip",
            #[cfg(feature = "archive-tar")]
            ArchiveFormat::Tar => "application/x-tar",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unsupported archive format: {0}")]
pub struct UnsupportedFormat(pub String);

impl FromStr for ArchiveFormat {
    type Err = UnsupportedFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zip" => Ok(ArchiveFormat::Zip),
            #[cfg(feature = "archive-tar")]
            "tar" => Ok(ArchiveFormat::Tar),
            _ => Err(UnsupportedFormat(s.to_string())),
        }
    }
}
