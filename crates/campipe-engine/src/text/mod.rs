//! Bitmap font text.

mod font;
mod label;

pub use font::{ElementArray, FALLBACK_GLYPH, Font, Glyph, MAX_ELEMENT_VERTICES};
pub use label::{Label, MAX_LABEL_CHARS};
