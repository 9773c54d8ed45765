//! Grayscale template matching on `Luma<f32>` buffers.
//!
//! CPU implementation of the normalized correlation family used for UI
//! chrome matching. Use [`find_extremes`] to locate the best score in the
//! result map.

pub mod template_matching;

pub use imageproc::template_matching::Extremes;
pub use template_matching::{find_extremes, match_template, MatchTemplateMethod};

pub mod utils;
