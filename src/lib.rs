//! Silence detection tooling built around ffmpeg.
//!
//! Two pipelines share the same front half (run `silencedetect`, scrape the
//! diagnostic log, do interval arithmetic): one exports the silent spans as
//! timeline markers for an editor, the other cuts them out of the footage
//! and reassembles the rest.

pub mod error;
pub mod ffmpeg;
pub mod markers;
pub mod silence;
pub mod trim;

pub use error::{Error, Result};
