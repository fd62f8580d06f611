//! Reads the archive layout from any [`ReadAt`] source.
//!
//! The End of Central Directory is located first (searching back over a
//! possible archive comment), the ZIP64 record is followed when the EOCD is
//! saturated, and the Central Directory is then decoded in one read. Every
//! offset and length read from the archive is checked against the size of
//! the source before a buffer is allocated for it, so a hostile archive
//! cannot make the parser reserve more memory than the archive occupies.

use std::sync::Arc;

use anyhow::{Result, bail};
use byteorder::{ByteOrder, LittleEndian};

use crate::io::ReadAt;

use super::structures::*;

/// Largest archive comment the format can record
const MAX_COMMENT_SIZE: u64 = u16::MAX as u64;

/// Location of the Central Directory inside the archive
#[derive(Debug, Clone, Copy)]
struct CentralDirectory {
    offset: u64,
    size: u64,
    entries: u64,
}

/// Parser over a random-access archive source.
///
/// The installer drives it from a [`LocalFileReader`](crate::io::LocalFileReader)
/// through [`ZipExtractor`](super::ZipExtractor).
pub struct ZipParser<R: ReadAt> {
    reader: Arc<R>,
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find the End of Central Directory record and its offset.
    ///
    /// # Errors
    ///
    /// Fails with "Not a valid ZIP file" when no record with a consistent
    /// comment length exists in the trailing 64 KiB.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        let window = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(self.size);
        let window_start = self.size - window;

        let mut tail = vec![0u8; window as usize];
        self.reader.read_exact_at(window_start, &mut tail).await?;

        // The last candidate whose comment runs exactly to the end wins
        let last_start = tail.len().checked_sub(EndOfCentralDirectory::SIZE);
        for i in last_start.into_iter().flat_map(|last| (0..=last).rev()) {
            if &tail[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
                continue;
            }
            let comment_len = LittleEndian::read_u16(&tail[i + 20..]) as usize;
            if i + EndOfCentralDirectory::SIZE + comment_len == tail.len() {
                let eocd = EndOfCentralDirectory::from_bytes(&tail[i..])?;
                return Ok((eocd, window_start + i as u64));
            }
        }

        bail!("Not a valid ZIP file")
    }

    /// Follow the ZIP64 locator that sits right before the EOCD at `eocd_offset`
    pub async fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64EOCD> {
        let Some(locator_offset) = eocd_offset.checked_sub(Zip64EOCDLocator::SIZE as u64) else {
            bail!("Invalid ZIP64 locator");
        };
        let mut buf = [0u8; Zip64EOCDLocator::SIZE];
        self.reader.read_exact_at(locator_offset, &mut buf).await?;
        let locator = Zip64EOCDLocator::from_bytes(&buf)?;

        self.check_span(locator.eocd64_offset, Zip64EOCD::MIN_SIZE as u64)?;
        let mut buf = [0u8; Zip64EOCD::MIN_SIZE];
        self.reader
            .read_exact_at(locator.eocd64_offset, &mut buf)
            .await?;

        Zip64EOCD::from_bytes(&buf)
    }

    async fn central_directory(&self) -> Result<CentralDirectory> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        let cd = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset).await?;
            CentralDirectory {
                offset: eocd64.cd_offset,
                size: eocd64.cd_size,
                entries: eocd64.total_entries,
            }
        } else {
            CentralDirectory {
                offset: eocd.cd_offset as u64,
                size: eocd.cd_size as u64,
                entries: eocd.total_entries as u64,
            }
        };

        self.check_span(cd.offset, cd.size)?;
        if cd.entries > cd.size / CDFH_MIN_SIZE as u64 {
            bail!("Central Directory entry count exceeds its size");
        }

        Ok(cd)
    }

    /// List all entries of the archive in Central Directory order.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive is invalid, cannot be read, or its
    /// Central Directory claims more entries than it can hold.
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        let cd = self.central_directory().await?;

        let mut data = vec![0u8; cd.size as usize];
        self.reader.read_exact_at(cd.offset, &mut data).await?;

        let mut entries = Vec::with_capacity(cd.entries as usize);
        let mut rest = data.as_slice();
        for _ in 0..cd.entries {
            let (entry, len) = ZipFileEntry::from_central_header(rest)?;
            entries.push(entry);
            rest = &rest[len..];
        }

        Ok(entries)
    }

    /// Offset of the entry's data, past its Local File Header.
    ///
    /// The local name and extra field lengths may differ from the Central
    /// Directory copy, so the header is read to find where the data starts.
    pub async fn get_data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        self.check_span(entry.lfh_offset, LFH_SIZE as u64)?;
        let mut lfh = [0u8; LFH_SIZE];
        self.reader.read_exact_at(entry.lfh_offset, &mut lfh).await?;

        if &lfh[..4] != LFH_SIGNATURE {
            bail!("Invalid Local File Header for {}", entry.file_name);
        }

        let name_len = LittleEndian::read_u16(&lfh[26..]) as u64;
        let extra_len = LittleEndian::read_u16(&lfh[28..]) as u64;
        let data_offset = entry.lfh_offset + LFH_SIZE as u64 + name_len + extra_len;
        self.check_span(data_offset, entry.compressed_size)?;

        Ok(data_offset)
    }

    /// Read the raw, still compressed bytes of an entry
    pub async fn read_entry_data(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let offset = self.get_data_offset(entry).await?;

        let mut data = vec![0u8; entry.compressed_size as usize];
        self.reader.read_exact_at(offset, &mut data).await?;

        Ok(data)
    }

    /// Ensure `len` bytes starting at `offset` lie inside the archive.
    fn check_span(&self, offset: u64, len: u64) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.size => Ok(()),
            _ => bail!(
                "Corrupt ZIP archive: {} bytes at offset {} exceed archive size {}",
                len,
                offset,
                self.size
            ),
        }
    }
}
