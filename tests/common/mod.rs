//! Shared helpers for the integration tests.
//!
//! Regular zip writers refuse to produce the archives these tests need
//! (`../` names, absolute names, lying size headers), so archives are
//! assembled by hand here.

#![allow(dead_code)]

use std::io::Write;
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Crc;
use flate2::Compression;
use flate2::write::DeflateEncoder;

const S_IFDIR: u32 = 0o040000;
const S_IFREG: u32 = 0o100000;
/// DOS date for 1980-01-01
const DOS_DATE: u16 = 0x21;

struct Entry {
    name: String,
    data: Vec<u8>,
    mode: u32,
    deflate: bool,
    directory: bool,
    declared_size: Option<u32>,
}

#[derive(Default)]
pub struct ZipBuilder {
    entries: Vec<Entry>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dir(mut self, name: &str, mode: u32) -> Self {
        let name = if name.ends_with('/') {
            name.to_string()
        } else {
            format!("{name}/")
        };
        self.entries.push(Entry {
            name,
            data: Vec::new(),
            mode,
            deflate: false,
            directory: true,
            declared_size: None,
        });
        self
    }

    /// A STORED file entry
    pub fn file(self, name: &str, data: &[u8], mode: u32) -> Self {
        self.push_file(name, data, mode, false, None)
    }

    /// A DEFLATE file entry
    pub fn deflated(self, name: &str, data: &[u8], mode: u32) -> Self {
        self.push_file(name, data, mode, true, None)
    }

    /// A DEFLATE entry whose headers claim `declared` uncompressed bytes
    pub fn lying(self, name: &str, data: &[u8], declared: u32) -> Self {
        self.push_file(name, data, 0o644, true, Some(declared))
    }

    fn push_file(
        mut self,
        name: &str,
        data: &[u8],
        mode: u32,
        deflate: bool,
        declared_size: Option<u32>,
    ) -> Self {
        self.entries.push(Entry {
            name: name.to_string(),
            data: data.to_vec(),
            mode,
            deflate,
            directory: false,
            declared_size,
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut central = Vec::new();

        for entry in &self.entries {
            let payload = if entry.deflate {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(&entry.data).unwrap();
                encoder.finish().unwrap()
            } else {
                entry.data.clone()
            };

            let mut crc = Crc::new();
            crc.update(&entry.data);
            let crc = crc.sum();

            let method: u16 = if entry.deflate { 8 } else { 0 };
            let compressed = payload.len() as u32;
            let uncompressed = entry.declared_size.unwrap_or(entry.data.len() as u32);
            let name = entry.name.as_bytes();
            let offset = out.len() as u32;
            let kind = if entry.directory { S_IFDIR } else { S_IFREG };

            // Local File Header
            out.write_all(b"PK\x03\x04").unwrap();
            out.write_u16::<LittleEndian>(20).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(method).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(DOS_DATE).unwrap();
            out.write_u32::<LittleEndian>(crc).unwrap();
            out.write_u32::<LittleEndian>(compressed).unwrap();
            out.write_u32::<LittleEndian>(uncompressed).unwrap();
            out.write_u16::<LittleEndian>(name.len() as u16).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_all(name).unwrap();
            out.write_all(&payload).unwrap();

            // Central Directory File Header, made on unix
            central.write_all(b"PK\x01\x02").unwrap();
            central.write_u16::<LittleEndian>((3 << 8) | 20).unwrap();
            central.write_u16::<LittleEndian>(20).unwrap();
            central.write_u16::<LittleEndian>(0).unwrap();
            central.write_u16::<LittleEndian>(method).unwrap();
            central.write_u16::<LittleEndian>(0).unwrap();
            central.write_u16::<LittleEndian>(DOS_DATE).unwrap();
            central.write_u32::<LittleEndian>(crc).unwrap();
            central.write_u32::<LittleEndian>(compressed).unwrap();
            central.write_u32::<LittleEndian>(uncompressed).unwrap();
            central.write_u16::<LittleEndian>(name.len() as u16).unwrap();
            central.write_u16::<LittleEndian>(0).unwrap();
            central.write_u16::<LittleEndian>(0).unwrap();
            central.write_u16::<LittleEndian>(0).unwrap();
            central.write_u16::<LittleEndian>(0).unwrap();
            central.write_u32::<LittleEndian>((kind | entry.mode) << 16).unwrap();
            central.write_u32::<LittleEndian>(offset).unwrap();
            central.write_all(name).unwrap();
        }

        let cd_offset = out.len() as u32;
        let count = self.entries.len() as u16;
        out.write_all(&central).unwrap();

        // End of Central Directory
        out.write_all(b"PK\x05\x06").unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(count).unwrap();
        out.write_u16::<LittleEndian>(count).unwrap();
        out.write_u32::<LittleEndian>(central.len() as u32).unwrap();
        out.write_u32::<LittleEndian>(cd_offset).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();

        out
    }

    pub fn write_to(&self, path: &Path) {
        std::fs::write(path, self.build()).unwrap();
    }
}

/// A release archive as published: the executable plus a benign file
pub fn release_archive(binary: &[u8]) -> Vec<u8> {
    ZipBuilder::new()
        .deflated("tofu", binary, 0o755)
        .file("LICENSE", b"Mozilla Public License Version 2.0\n", 0o644)
        .build()
}

/// Names of the entries directly inside `dir`, sorted
pub fn dir_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
