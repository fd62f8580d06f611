//! ZIP archive parsing and safe extraction.
//!
//! Release archives are fetched from a third-party server, so nothing in
//! them is trusted: entry names are resolved lexically and must stay inside
//! the destination root, and every entry is decoded under a byte limit.
//!
//! [`structures`] decodes the on-disk records, [`parser`] walks an archive
//! from its trailing End of Central Directory record, and [`extractor`]
//! writes a whole archive below a directory.
//!
//! Stored and deflated entries are supported, including ZIP64 sizes. Unix
//! permission bits are restored from the external attributes. Encrypted
//! entries, multi-disk archives and other compression methods are rejected.
//! Symbolic links come out as regular files holding the link target.

mod extractor;
mod parser;
mod structures;

pub use extractor::{DEFAULT_MAX_ENTRY_SIZE, ZipExtractor, sanitize_archive_path};
pub use parser::ZipParser;
pub use structures::*;
