//! Error taxonomy for the XML path editor.
//!
//! Mirrors the errno contract of the C interface this crate's FFI layer
//! exposes: `ENOENT`/`EINVAL`/`ENOMEM`/`EEXIST`/`EPERM`. Safe-Rust callers
//! match on the enum directly instead of reading an integer.

use std::fmt;

/// Errors produced by [`crate::document::XmlDocument`] operations.
#[derive(Debug, thiserror::Error)]
pub enum XmlTreeError {
    /// The key does not resolve to anything in the document. `ENOENT`.
    #[error("no such element")]
    NotFound,

    /// The key violates the canonical-key grammar (bad character, empty
    /// segment, malformed subscript). `EINVAL`.
    #[error("malformed key: {0}")]
    MalformedKey(String),

    /// The expanded canonical form of the key would exceed the maximum
    /// length. `ENOMEM` (the C interface reports this as an allocation
    /// failure for the fixed-size expansion buffer).
    #[error("key too long")]
    KeyTooLong,

    /// Append was requested for a key that already exists. `EEXIST`.
    #[error("element already exists")]
    AlreadyExists,

    /// The operation is not permitted on this key, e.g. a direct write to
    /// a `[#]` total. `EPERM`.
    #[error("operation not permitted on this key")]
    Forbidden,

    /// The write-out sink returned an error or a short write.
    #[error("write failed: {0}")]
    Writer(#[from] std::io::Error),
}

impl XmlTreeError {
    /// The POSIX errno this error maps to, for the FFI boundary.
    pub fn errno(&self) -> Errno {
        match self {
            XmlTreeError::NotFound => Errno::NoEnt,
            XmlTreeError::MalformedKey(_) => Errno::Inval,
            XmlTreeError::KeyTooLong => Errno::NoMem,
            XmlTreeError::AlreadyExists => Errno::Exist,
            XmlTreeError::Forbidden => Errno::Perm,
            XmlTreeError::Writer(_) => Errno::Io,
        }
    }
}

/// The errno constants relevant to this crate, kept independent of libc so
/// the core has no platform dependency. The FFI crate maps these onto the
/// host's actual `errno.h` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Errno {
    NoEnt,
    Inval,
    NoMem,
    Exist,
    Perm,
    Io,
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Errno::NoEnt => "ENOENT",
            Errno::Inval => "EINVAL",
            Errno::NoMem => "ENOMEM",
            Errno::Exist => "EEXIST",
            Errno::Perm => "EPERM",
            Errno::Io => "EIO",
        };
        f.write_str(s)
    }
}

pub type Result<T> = std::result::Result<T, XmlTreeError>;
