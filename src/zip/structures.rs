//! On-disk ZIP records, decoded from little-endian byte slices.

use anyhow::{Result, bail};
use byteorder::{ByteOrder, LittleEndian};

/// Central Directory File Header signature and fixed part length
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header signature and fixed part length
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Host system recorded in the upper byte of "version made by"
pub const HOST_UNIX: u8 = 3;

/// Extra field tag carrying 64-bit sizes and offsets
pub const ZIP64_EXTRA_TAG: u16 = 0x0001;

const U16_SENTINEL: u16 = 0xFFFF;
const U32_SENTINEL: u32 = 0xFFFF_FFFF;

/// Compression method of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl From<u16> for CompressionMethod {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::Stored,
            8 => Self::Deflate,
            other => Self::Unknown(other),
        }
    }
}

fn expect_signature(data: &[u8], signature: &[u8], min_len: usize, what: &str) -> Result<()> {
    if data.len() < min_len || &data[..4] != signature {
        bail!("Invalid {what}");
    }
    Ok(())
}

/// End of Central Directory record, 22 bytes plus the archive comment
#[derive(Debug, Clone)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        expect_signature(data, Self::SIGNATURE, Self::SIZE, "End of Central Directory")?;

        let eocd = Self {
            disk_number: LittleEndian::read_u16(&data[4..]),
            disk_with_cd: LittleEndian::read_u16(&data[6..]),
            total_entries: LittleEndian::read_u16(&data[10..]),
            cd_size: LittleEndian::read_u32(&data[12..]),
            cd_offset: LittleEndian::read_u32(&data[16..]),
            comment_len: LittleEndian::read_u16(&data[20..]),
        };

        // 0xFFFF in the disk fields only means "see the ZIP64 record"
        if !eocd.is_zip64() && (eocd.disk_number != 0 || eocd.disk_with_cd != 0) {
            bail!("Multi-disk archives are not supported");
        }

        Ok(eocd)
    }

    /// Any saturated field defers to the ZIP64 record
    pub fn is_zip64(&self) -> bool {
        self.total_entries == U16_SENTINEL
            || self.cd_size == U32_SENTINEL
            || self.cd_offset == U32_SENTINEL
    }
}

/// ZIP64 End of Central Directory Locator, directly before the EOCD
#[derive(Debug, Clone)]
pub struct Zip64EOCDLocator {
    pub eocd64_offset: u64,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        expect_signature(data, Self::SIGNATURE, Self::SIZE, "ZIP64 locator")?;

        if LittleEndian::read_u32(&data[4..]) != 0 || LittleEndian::read_u32(&data[16..]) > 1 {
            bail!("Multi-disk archives are not supported");
        }

        Ok(Self {
            eocd64_offset: LittleEndian::read_u64(&data[8..]),
        })
    }
}

/// ZIP64 End of Central Directory record (fixed part)
#[derive(Debug, Clone)]
pub struct Zip64EOCD {
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        expect_signature(data, Self::SIGNATURE, Self::MIN_SIZE, "ZIP64 End of Central Directory")?;

        if LittleEndian::read_u32(&data[16..]) != 0 || LittleEndian::read_u32(&data[20..]) != 0 {
            bail!("Multi-disk archives are not supported");
        }

        Ok(Self {
            total_entries: LittleEndian::read_u64(&data[32..]),
            cd_size: LittleEndian::read_u64(&data[40..]),
            cd_offset: LittleEndian::read_u64(&data[48..]),
        })
    }
}

/// One archive member as described by the Central Directory
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub flags: u16,
    pub version_made_by: u16,
    pub external_attrs: u32,
    pub is_directory: bool,
}

impl ZipFileEntry {
    /// Decode the header at the start of `data`, returning the entry and the
    /// number of bytes the header occupies.
    pub fn from_central_header(data: &[u8]) -> Result<(Self, usize)> {
        expect_signature(data, CDFH_SIGNATURE, CDFH_MIN_SIZE, "Central Directory File Header")?;

        let name_len = LittleEndian::read_u16(&data[28..]) as usize;
        let extra_len = LittleEndian::read_u16(&data[30..]) as usize;
        let comment_len = LittleEndian::read_u16(&data[32..]) as usize;
        let header_len = CDFH_MIN_SIZE + name_len + extra_len + comment_len;
        if data.len() < header_len {
            bail!("Truncated Central Directory File Header");
        }

        let name_bytes = &data[CDFH_MIN_SIZE..CDFH_MIN_SIZE + name_len];
        // Lossy: a replacement character never introduces a separator
        let file_name = String::from_utf8_lossy(name_bytes).into_owned();
        if file_name.is_empty() {
            bail!("Central Directory entry without a name");
        }

        let mut entry = Self {
            is_directory: file_name.ends_with('/'),
            file_name,
            compression_method: LittleEndian::read_u16(&data[10..]).into(),
            compressed_size: LittleEndian::read_u32(&data[20..]) as u64,
            uncompressed_size: LittleEndian::read_u32(&data[24..]) as u64,
            crc32: LittleEndian::read_u32(&data[16..]),
            lfh_offset: LittleEndian::read_u32(&data[42..]) as u64,
            flags: LittleEndian::read_u16(&data[8..]),
            version_made_by: LittleEndian::read_u16(&data[4..]),
            external_attrs: LittleEndian::read_u32(&data[38..]),
        };

        let extra_start = CDFH_MIN_SIZE + name_len;
        entry.apply_zip64_extra(&data[extra_start..extra_start + extra_len])?;

        Ok((entry, header_len))
    }

    /// Replace saturated 32-bit fields with their ZIP64 extra field values.
    ///
    /// The extra field only carries the values whose header field is
    /// saturated, in the order uncompressed, compressed, offset.
    fn apply_zip64_extra(&mut self, mut extra: &[u8]) -> Result<()> {
        while extra.len() >= 4 {
            let tag = LittleEndian::read_u16(extra);
            let len = LittleEndian::read_u16(&extra[2..]) as usize;
            let Some(body) = extra.get(4..4 + len) else {
                bail!("Truncated extra field in {}", self.file_name);
            };

            if tag == ZIP64_EXTRA_TAG {
                let mut values = body.chunks_exact(8).map(LittleEndian::read_u64);
                for field in [
                    &mut self.uncompressed_size,
                    &mut self.compressed_size,
                    &mut self.lfh_offset,
                ] {
                    if *field == U32_SENTINEL as u64 {
                        match values.next() {
                            Some(value) => *field = value,
                            None => bail!("Truncated ZIP64 extra field in {}", self.file_name),
                        }
                    }
                }
            }

            extra = &extra[4 + len..];
        }

        Ok(())
    }

    /// General purpose flag bit 0: the entry data is encrypted
    pub fn is_encrypted(&self) -> bool {
        self.flags & 0x0001 != 0
    }

    /// Unix permission bits, when the archive was written on a unix host.
    ///
    /// Setuid, setgid and sticky bits are dropped.
    pub fn unix_mode(&self) -> Option<u32> {
        if (self.version_made_by >> 8) as u8 != HOST_UNIX {
            return None;
        }
        let mode = (self.external_attrs >> 16) & 0o777;
        (mode != 0).then_some(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn central_header(name: &str, extra: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; CDFH_MIN_SIZE];
        buf[..4].copy_from_slice(CDFH_SIGNATURE);
        LittleEndian::write_u16(&mut buf[4..], (HOST_UNIX as u16) << 8 | 20);
        LittleEndian::write_u16(&mut buf[10..], 8);
        LittleEndian::write_u32(&mut buf[16..], 0xDEAD_BEEF);
        LittleEndian::write_u32(&mut buf[20..], 10);
        LittleEndian::write_u32(&mut buf[24..], 20);
        LittleEndian::write_u16(&mut buf[28..], name.len() as u16);
        LittleEndian::write_u16(&mut buf[30..], extra.len() as u16);
        LittleEndian::write_u32(&mut buf[38..], (0o100755 as u32) << 16);
        LittleEndian::write_u32(&mut buf[42..], 7);
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(extra);
        buf
    }

    #[test]
    fn decodes_central_header() {
        let mut data = central_header("bin/tofu", &[]);
        data.extend_from_slice(b"trailing");

        let (entry, len) = ZipFileEntry::from_central_header(&data).unwrap();

        assert_eq!(len, CDFH_MIN_SIZE + "bin/tofu".len());
        assert_eq!(entry.file_name, "bin/tofu");
        assert_eq!(entry.compression_method, CompressionMethod::Deflate);
        assert_eq!(entry.crc32, 0xDEAD_BEEF);
        assert_eq!((entry.compressed_size, entry.uncompressed_size), (10, 20));
        assert_eq!(entry.lfh_offset, 7);
        assert_eq!(entry.unix_mode(), Some(0o755));
        assert!(!entry.is_directory);
        assert!(!entry.is_encrypted());
    }

    #[test]
    fn zip64_extra_replaces_saturated_fields() {
        let mut extra = vec![0u8; 4 + 8];
        LittleEndian::write_u16(&mut extra, ZIP64_EXTRA_TAG);
        LittleEndian::write_u16(&mut extra[2..], 8);
        LittleEndian::write_u64(&mut extra[4..], 5 << 32);

        let mut data = central_header("big", &extra);
        LittleEndian::write_u32(&mut data[24..], U32_SENTINEL);

        let (entry, _) = ZipFileEntry::from_central_header(&data).unwrap();
        assert_eq!(entry.uncompressed_size, 5 << 32);
        assert_eq!(entry.compressed_size, 10);
    }

    #[test]
    fn truncated_header_is_rejected() {
        let data = central_header("name", &[]);
        assert!(ZipFileEntry::from_central_header(&data[..data.len() - 1]).is_err());
    }

    #[test]
    fn special_mode_bits_are_dropped() {
        let mut data = central_header("tofu", &[]);
        LittleEndian::write_u32(&mut data[38..], (0o107755 as u32) << 16);

        let (entry, _) = ZipFileEntry::from_central_header(&data).unwrap();
        assert_eq!(entry.unix_mode(), Some(0o755));
    }

    #[test]
    fn non_unix_host_has_no_mode() {
        let mut data = central_header("a.txt", &[]);
        LittleEndian::write_u16(&mut data[4..], 20);

        let (entry, _) = ZipFileEntry::from_central_header(&data).unwrap();
        assert_eq!(entry.unix_mode(), None);
    }

    #[test]
    fn multi_disk_eocd_is_rejected() {
        let mut data = vec![0u8; EndOfCentralDirectory::SIZE];
        data[..4].copy_from_slice(EndOfCentralDirectory::SIGNATURE);
        LittleEndian::write_u16(&mut data[4..], 1);

        assert!(EndOfCentralDirectory::from_bytes(&data).is_err());
    }
}
