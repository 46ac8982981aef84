//! PDF plumbing on top of lopdf: object helpers, content interpretation,
//! font and image decoding, and output writing.

pub mod encoding;
pub mod font;
pub mod image;
pub mod interpreter;
pub mod objects;
pub mod writer;

pub use image::decode_pixel_stats;
pub use interpreter::{ContentError, ContentInterpreter};
pub use writer::{OutputDocument, PageWriter};
