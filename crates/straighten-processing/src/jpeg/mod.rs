//! Lossless JPEG transforms
//!
//! JPEG data is decoded only as far as its quantized DCT coefficients,
//! rearranged, and entropy-coded again, so no generation loss occurs.
//!
//! - `reader`: marker parsing and Huffman decoding into coefficient planes
//! - `transform`: block permutation and per-block coefficient rules
//! - `writer`: sequential re-encoding with standard Huffman tables
//! - `engine`: file-level entry point backed by a temporary output file

mod bitio;
pub mod coefficients;
pub mod engine;
mod huffman;
pub mod markers;
pub mod reader;
pub mod transform;
pub mod writer;

pub use coefficients::{CoefficientImage, CoefficientPlane, ComponentInfo, FrameHeader};
pub use engine::LosslessTransformEngine;
pub use reader::JpegReader;
pub use writer::write_jpeg;
