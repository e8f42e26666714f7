//! In-memory reading of pacman sync database archives.
//!
//! A sync database (`<repo>.db`) is a tar archive, gzip or zstd compressed,
//! holding one `<pkgname>-<pkgver>/desc` entry per package. Nothing is
//! unpacked to disk.

use crate::error::CommonError;
use flate2::read::GzDecoder;
use lzma_rs::xz_decompress;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use tar::Archive;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const XZ_MAGIC: &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xb5, 0x2f, 0xfd];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Xz,
    Zstd,
    None,
}

/// Sniff the compression from the leading magic bytes.
pub fn detect_compression(data: &[u8]) -> Compression {
    if data.starts_with(GZIP_MAGIC) {
        Compression::Gzip
    } else if data.starts_with(XZ_MAGIC) {
        Compression::Xz
    } else if data.starts_with(ZSTD_MAGIC) {
        Compression::Zstd
    } else {
        Compression::None
    }
}

/// A regular file read out of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub contents: Vec<u8>,
}

impl ArchiveEntry {
    /// Directory component directly above the file (`linux-6.9.1-1` for `linux-6.9.1-1/desc`).
    pub fn parent_dir(&self) -> Option<&str> {
        let trimmed = self.path.trim_end_matches('/');
        let (dir, _) = trimmed.rsplit_once('/')?;
        Some(dir.rsplit('/').next().unwrap_or(dir))
    }

    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents).into_owned()
    }
}

pub fn read_archive_file(path: &Path) -> Result<Vec<ArchiveEntry>, CommonError> {
    let data = fs::read(path)?;
    read_tar_entries(&data)
}

/// Read every regular file of a (possibly compressed) tar archive.
pub fn read_tar_entries(data: &[u8]) -> Result<Vec<ArchiveEntry>, CommonError> {
    match detect_compression(data) {
        Compression::Gzip => collect_entries(Archive::new(GzDecoder::new(Cursor::new(data)))),
        Compression::Xz => {
            let mut decompressed = Vec::new();
            xz_decompress(&mut Cursor::new(data), &mut decompressed)
                .map_err(|err| CommonError::Archive(err.to_string()))?;
            collect_entries(Archive::new(Cursor::new(decompressed)))
        }
        Compression::Zstd => {
            let decoder = zstd::Decoder::new(Cursor::new(data))
                .map_err(|err| CommonError::Archive(format!("zstd: {err}")))?;
            collect_entries(Archive::new(decoder))
        }
        Compression::None => collect_entries(Archive::new(Cursor::new(data))),
    }
}

fn collect_entries<R: Read>(mut archive: Archive<R>) -> Result<Vec<ArchiveEntry>, CommonError> {
    let mut files = Vec::new();

    for entry in archive
        .entries()
        .map_err(|err| CommonError::Archive(err.to_string()))?
    {
        let mut entry = entry.map_err(|err| CommonError::Archive(err.to_string()))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry
            .path()
            .map_err(|err| CommonError::Archive(err.to_string()))?
            .to_string_lossy()
            .into_owned();
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents)?;
        files.push(ArchiveEntry { path, contents });
    }

    Ok(files)
}
