use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use flate2::Crc;
use flate2::read::DeflateDecoder;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::PluginError;
use crate::io::ReadAt;

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// Largest number of bytes a single entry may decode to (100 MiB).
pub const DEFAULT_MAX_ENTRY_SIZE: u64 = 100 * 1024 * 1024;

const DEFAULT_DIR_MODE: u32 = 0o755;
const DEFAULT_FILE_MODE: u32 = 0o644;
const COPY_BUF_SIZE: usize = 64 * 1024;

/// ZIP file extractor
///
/// Extraction follows a bounded-copy policy: the size an entry declares is
/// never trusted, each entry is decoded through a limit of
/// `max_entry_size` bytes and an entry that reaches the limit is treated
/// as a decompression bomb.
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
    max_entry_size: u64,
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: ZipParser::new(reader),
            max_entry_size: DEFAULT_MAX_ENTRY_SIZE,
        }
    }

    /// Override the per-entry decoded size limit
    pub fn with_max_entry_size(mut self, max_entry_size: u64) -> Self {
        self.max_entry_size = max_entry_size;
        self
    }

    /// List all files in the archive
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files().await
    }

    /// Extract every entry of the archive below `dest`, in archive order.
    ///
    /// The first failing entry aborts the extraction. Entries written before
    /// it are left in place; `dest` is expected to be a scratch directory
    /// that the caller discards on error.
    pub async fn extract_all(&self, dest: &Path) -> Result<()> {
        fs::create_dir_all(dest)
            .await
            .with_context(|| format!("failed to create {}", dest.display()))?;

        for entry in self.list_files().await? {
            let path = sanitize_archive_path(dest, &entry.file_name)?;

            if entry.is_directory {
                create_dir(&path, entry.unix_mode().unwrap_or(DEFAULT_DIR_MODE)).await?;
            } else {
                self.extract_to_file(&entry, &path).await?;
            }
        }

        Ok(())
    }

    /// Decode a single entry into `output_path`
    async fn extract_to_file(&self, entry: &ZipFileEntry, output_path: &Path) -> Result<()> {
        if entry.is_encrypted() {
            bail!("Encrypted entries are not supported: {}", entry.file_name);
        }

        let data = self.parser.read_entry_data(entry).await?;
        let decoder: Box<dyn Read + Send + '_> = match entry.compression_method {
            CompressionMethod::Stored => Box::new(data.as_slice()),
            CompressionMethod::Deflate => Box::new(DeflateDecoder::new(data.as_slice())),
            CompressionMethod::Unknown(method) => bail!(
                "Unsupported compression method {} for {}",
                method,
                entry.file_name
            ),
        };

        // Create parent directories if needed
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = open_output(output_path, entry.unix_mode().unwrap_or(DEFAULT_FILE_MODE))
            .await
            .with_context(|| format!("failed to create {}", output_path.display()))?;

        let mut limited = decoder.take(self.max_entry_size);
        let mut crc = Crc::new();
        let mut buf = vec![0u8; COPY_BUF_SIZE];
        let mut written = 0u64;

        loop {
            let n = limited
                .read(&mut buf)
                .with_context(|| format!("failed to decode {}", entry.file_name))?;
            if n == 0 {
                break;
            }
            crc.update(&buf[..n]);
            file.write_all(&buf[..n]).await?;
            written += n as u64;
        }
        file.flush().await?;

        if written == self.max_entry_size {
            return Err(PluginError::SizeLimitExceeded(self.max_entry_size).into());
        }

        if crc.sum() != entry.crc32 {
            bail!("CRC-32 mismatch for {}", entry.file_name);
        }

        debug!(entry = %entry.file_name, bytes = written, "extracted");

        Ok(())
    }
}

/// Resolve an archive entry name below `dest` without touching the filesystem.
///
/// `.` segments are dropped and `..` segments pop the previous segment. A
/// name that is absolute, or that climbs above `dest`, is rejected with
/// [`PluginError::TaintedPath`].
pub fn sanitize_archive_path(dest: &Path, name: &str) -> Result<PathBuf, PluginError> {
    let mut resolved = dest.to_path_buf();
    let mut depth = 0usize;

    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir if depth > 0 => {
                resolved.pop();
                depth -= 1;
            }
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(PluginError::TaintedPath(name.to_string()));
            }
        }
    }

    Ok(resolved)
}

async fn create_dir(path: &Path, mode: u32) -> Result<()> {
    fs::create_dir_all(path)
        .await
        .with_context(|| format!("failed to create {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // owner keeps rwx so later entries can be written below it
        fs::set_permissions(path, std::fs::Permissions::from_mode(mode | 0o700)).await?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}

async fn open_output(path: &Path, mode: u32) -> std::io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    options.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;

    options.open(path).await
}
