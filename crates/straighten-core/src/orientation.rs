//! Orientation and transform vocabulary shared by the codec, the transform
//! engine and their callers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProcessingError;

/// EXIF Orientation tag (0x0112) values.
///
/// 1 = Normal
/// 2 = Flipped horizontally
/// 3 = Rotated 180°
/// 4 = Flipped vertically
/// 5 = Transposed (flip horizontal + rotate 270° CW)
/// 6 = Rotated 90° CW
/// 7 = Transverse (flip horizontal + rotate 90° CW)
/// 8 = Rotated 270° CW
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum Orientation {
    Normal = 1,
    FlipHorizontal = 2,
    Rotate180 = 3,
    FlipVertical = 4,
    Transpose = 5,
    Rotate90 = 6,
    Transverse = 7,
    Rotate270 = 8,
}

impl Orientation {
    pub const ALL: [Orientation; 8] = [
        Orientation::Normal,
        Orientation::FlipHorizontal,
        Orientation::Rotate180,
        Orientation::FlipVertical,
        Orientation::Transpose,
        Orientation::Rotate90,
        Orientation::Transverse,
        Orientation::Rotate270,
    ];

    pub fn value(self) -> u8 {
        self as u8
    }

    /// Lossless transform that brings an image stored with this orientation upright.
    pub fn transform_code(self) -> TransformCode {
        TransformCode::from(self)
    }

    /// Whether displaying the image upright swaps its width and height.
    pub fn swaps_dimensions(self) -> bool {
        self.transform_code().swaps_dimensions()
    }
}

impl TryFrom<u8> for Orientation {
    type Error = ProcessingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Orientation::Normal),
            2 => Ok(Orientation::FlipHorizontal),
            3 => Ok(Orientation::Rotate180),
            4 => Ok(Orientation::FlipVertical),
            5 => Ok(Orientation::Transpose),
            6 => Ok(Orientation::Rotate90),
            7 => Ok(Orientation::Transverse),
            8 => Ok(Orientation::Rotate270),
            other => Err(ProcessingError::format(format!(
                "Orientation value {} is outside 1..=8",
                other
            ))),
        }
    }
}

impl From<Orientation> for u8 {
    fn from(orientation: Orientation) -> Self {
        orientation as u8
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// What a call to the orientation codec should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrientationMode {
    /// Return the stored orientation.
    Read,
    /// Overwrite the stored orientation (IFD0 and the thumbnail IFD1).
    Write(Orientation),
}

/// Geometric operation applied to DCT coefficient blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformCode {
    #[default]
    None,
    /// 90° clockwise.
    Rotate90,
    Rotate180,
    /// 270° clockwise.
    Rotate270,
    FlipHorizontal,
    FlipVertical,
    /// Mirror across the top-left to bottom-right diagonal.
    Transpose,
    /// Mirror across the top-right to bottom-left diagonal.
    Transverse,
}

impl TransformCode {
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            TransformCode::Rotate90
                | TransformCode::Rotate270
                | TransformCode::Transpose
                | TransformCode::Transverse
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransformCode::None => "none",
            TransformCode::Rotate90 => "rotate90",
            TransformCode::Rotate180 => "rotate180",
            TransformCode::Rotate270 => "rotate270",
            TransformCode::FlipHorizontal => "flip-h",
            TransformCode::FlipVertical => "flip-v",
            TransformCode::Transpose => "transpose",
            TransformCode::Transverse => "transverse",
        }
    }
}

impl From<Orientation> for TransformCode {
    fn from(orientation: Orientation) -> Self {
        match orientation {
            Orientation::Normal => TransformCode::None,
            Orientation::FlipHorizontal => TransformCode::FlipHorizontal,
            Orientation::Rotate180 => TransformCode::Rotate180,
            Orientation::FlipVertical => TransformCode::FlipVertical,
            Orientation::Transpose => TransformCode::Transpose,
            Orientation::Rotate90 => TransformCode::Rotate90,
            Orientation::Transverse => TransformCode::Transverse,
            Orientation::Rotate270 => TransformCode::Rotate270,
        }
    }
}

impl FromStr for TransformCode {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(TransformCode::None),
            "rotate90" | "rot90" | "90" => Ok(TransformCode::Rotate90),
            "rotate180" | "rot180" | "180" => Ok(TransformCode::Rotate180),
            "rotate270" | "rot270" | "270" => Ok(TransformCode::Rotate270),
            "flip-h" | "fliph" | "flip-horizontal" => Ok(TransformCode::FlipHorizontal),
            "flip-v" | "flipv" | "flip-vertical" => Ok(TransformCode::FlipVertical),
            "transpose" => Ok(TransformCode::Transpose),
            "transverse" => Ok(TransformCode::Transverse),
            _ => Err(ProcessingError::format(format!(
                "Invalid transform: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for TransformCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-level edit requested from a viewer, independent of Exif data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageTransformation {
    Rotate90Cw,
    Rotate90Ccw,
    Rotate180,
    FlipHorizontal,
    FlipVertical,
}

impl From<ImageTransformation> for TransformCode {
    fn from(transformation: ImageTransformation) -> Self {
        match transformation {
            ImageTransformation::Rotate90Cw => TransformCode::Rotate90,
            ImageTransformation::Rotate90Ccw => TransformCode::Rotate270,
            ImageTransformation::Rotate180 => TransformCode::Rotate180,
            ImageTransformation::FlipHorizontal => TransformCode::FlipHorizontal,
            ImageTransformation::FlipVertical => TransformCode::FlipVertical,
        }
    }
}
