//! Zero-copy, path-addressed XML reader and editor.
//!
//! The document is never parsed into a DOM. Reads descend the source byte
//! buffer directly (see [`locator`]); mutations are recorded in an
//! insertion-ordered journal (see [`journal`]) and replayed over the source
//! on demand, both for subsequent reads (see [`document`]'s overlay logic)
//! and for serialization (see [`document::XmlDocument::write_to`]).
//!
//! Addressing uses a compact dotted path language with list subscripts --
//! see [`key`] for the grammar (`dog[1].name`, `dog[#]`, `dog[$]`, `dog[+]`,
//! `dog[*]`).

pub mod cache;
pub mod cursor;
pub mod document;
pub mod entity;
pub mod error;
pub mod journal;
pub mod key;
pub mod locator;

pub use document::XmlDocument;
pub use error::{Errno, Result, XmlTreeError};
