//! Fixture builders: Exif/TIFF blocks and small JPEG files.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use straighten_core::MarkerCopy;
use straighten_processing::exif::ByteOrder;
use straighten_processing::jpeg::coefficients::{
    CoefficientImage, CoefficientPlane, ComponentInfo, FrameHeader, QuantTable, SavedMarker,
};
use straighten_processing::jpeg::markers::SOF0;
use straighten_processing::jpeg::write_jpeg;

pub const ORIENTATION_TAG: u16 = 0x0112;
const MAKE_TAG: u16 = 0x010F;
const JPEG_INTERCHANGE_FORMAT_TAG: u16 = 0x0201;

/// What the thumbnail directory (IFD1) looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Thumbnail {
    Absent,
    WithOrientation(u16),
    WithoutOrientation,
}

/// Builder for a TIFF block with an IFD0 and an optional IFD1.
#[derive(Debug, Clone)]
pub struct ExifFixture {
    pub order: ByteOrder,
    pub orientation: Option<u16>,
    pub thumbnail: Thumbnail,
    pub ifd0_count: Option<u16>,
    pub ifd1_pointer: Option<u32>,
}

impl ExifFixture {
    pub fn new(order: ByteOrder, orientation: u16) -> Self {
        Self {
            order,
            orientation: Some(orientation),
            thumbnail: Thumbnail::Absent,
            ifd0_count: None,
            ifd1_pointer: None,
        }
    }

    pub fn with_thumbnail(mut self, thumbnail: Thumbnail) -> Self {
        self.thumbnail = thumbnail;
        self
    }

    pub fn without_orientation(mut self) -> Self {
        self.orientation = None;
        self
    }

    /// Overwrite IFD0's declared entry count.
    pub fn with_ifd0_count(mut self, count: u16) -> Self {
        self.ifd0_count = Some(count);
        self
    }

    /// Overwrite the IFD0 to IFD1 link.
    pub fn with_ifd1_pointer(mut self, pointer: u32) -> Self {
        self.ifd1_pointer = Some(pointer);
        self
    }

    fn entry(&self, out: &mut Vec<u8>, tag: u16, format: u16, count: u32, value: [u8; 4]) {
        out.extend_from_slice(&self.order.u16_bytes(tag));
        out.extend_from_slice(&self.order.u16_bytes(format));
        out.extend_from_slice(&self.order.u32_bytes(count));
        out.extend_from_slice(&value);
    }

    fn short_value(&self, value: u16) -> [u8; 4] {
        let bytes = self.order.u16_bytes(value);
        [bytes[0], bytes[1], 0, 0]
    }

    pub fn tiff(&self) -> Vec<u8> {
        let order = self.order;
        let mut out = Vec::new();
        out.extend_from_slice(&order.marker());
        out.extend_from_slice(&order.u16_bytes(0x002A));
        out.extend_from_slice(&order.u32_bytes(8));

        let ifd0_entries = 1 + usize::from(self.orientation.is_some());
        out.extend_from_slice(&order.u16_bytes(self.ifd0_count.unwrap_or(ifd0_entries as u16)));
        self.entry(&mut out, MAKE_TAG, 2, 4, *b"Cam\0");
        if let Some(value) = self.orientation {
            self.entry(&mut out, ORIENTATION_TAG, 3, 1, self.short_value(value));
        }

        let ifd1_offset = (out.len() + 4) as u32;
        let pointer = match self.thumbnail {
            Thumbnail::Absent => 0,
            _ => ifd1_offset,
        };
        out.extend_from_slice(&order.u32_bytes(self.ifd1_pointer.unwrap_or(pointer)));

        match self.thumbnail {
            Thumbnail::Absent => {}
            Thumbnail::WithOrientation(value) => {
                out.extend_from_slice(&order.u16_bytes(2));
                self.entry(&mut out, ORIENTATION_TAG, 3, 1, self.short_value(value));
                self.entry(&mut out, JPEG_INTERCHANGE_FORMAT_TAG, 4, 1, [0; 4]);
                out.extend_from_slice(&order.u32_bytes(0));
            }
            Thumbnail::WithoutOrientation => {
                out.extend_from_slice(&order.u16_bytes(1));
                self.entry(&mut out, JPEG_INTERCHANGE_FORMAT_TAG, 4, 1, [0; 4]);
                out.extend_from_slice(&order.u32_bytes(0));
            }
        }
        out
    }

    /// Complete APP1 segment, marker included.
    pub fn app1(&self) -> Vec<u8> {
        let tiff = self.tiff();
        let mut out = vec![0xFF, 0xE1];
        out.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
        out.extend_from_slice(b"Exif\0\0");
        out.extend_from_slice(&tiff);
        out
    }
}

fn gray_pattern(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let block = ((x / 8) * 37 + (y / 8) * 91) % 160;
        Luma([(block + (x % 8) * 6 + (y % 8) * 3) as u8])
    })
}

fn encode(image: DynamicImage) -> Vec<u8> {
    let mut out = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)
        .expect("encode JPEG fixture");
    out
}

/// Grayscale JPEG produced by an independent encoder.
pub fn gray_jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(DynamicImage::ImageLuma8(gray_pattern(width, height)))
}

/// Color JPEG produced by an independent encoder.
pub fn rgb_jpeg(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 5 % 256) as u8, (y * 7 % 256) as u8, ((x + y) * 3 % 256) as u8])
    });
    encode(DynamicImage::ImageRgb8(image))
}

/// Insert a segment after SOI, or after a leading JFIF APP0 if there is one.
pub fn insert_segment(jpeg: &[u8], segment: &[u8]) -> Vec<u8> {
    let mut at = 2;
    if jpeg.len() > 6 && jpeg[2] == 0xFF && jpeg[3] == 0xE0 {
        at = 4 + usize::from(u16::from_be_bytes([jpeg[4], jpeg[5]]));
    }
    let mut out = jpeg[..at].to_vec();
    out.extend_from_slice(segment);
    out.extend_from_slice(&jpeg[at..]);
    out
}

pub fn gray_jpeg_with_exif(width: u32, height: u32, exif: &ExifFixture) -> Vec<u8> {
    insert_segment(&gray_jpeg(width, height), &exif.app1())
}

/// Component layout for [`coefficient_jpeg`].
pub const YCBCR_420: &[(u8, u8)] = &[(2, 2), (1, 1), (1, 1)];
pub const YCBCR_422: &[(u8, u8)] = &[(2, 1), (1, 1), (1, 1)];

/// Coefficient image with every block tagged by its plane and position.
pub fn coefficient_image(width: u16, height: u16, sampling: &[(u8, u8)]) -> CoefficientImage {
    let components: Vec<ComponentInfo> = sampling
        .iter()
        .enumerate()
        .map(|(i, &(h, v))| ComponentInfo {
            id: i as u8 + 1,
            h_samp: h,
            v_samp: v,
            quant_slot: u8::from(i > 0),
        })
        .collect();

    let frame = FrameHeader {
        marker: SOF0,
        precision: 8,
        width,
        height,
        components,
    };

    let planes = frame
        .components
        .iter()
        .enumerate()
        .map(|(index, c)| {
            let (plane_w, plane_h) = frame.plane_blocks(c);
            let mut plane = CoefficientPlane::new(plane_w, plane_h);
            let width = plane.width_in_blocks();
            for (i, block) in plane.blocks_mut().iter_mut().enumerate() {
                let (bx, by) = (i % width, i / width);
                block[0] = (index * 100 + by * 10 + bx) as i16 - 50;
                block[1] = 4;
                block[8] = -3;
                block[9] = (bx as i16 % 3) - 1;
                block[17] = 2;
            }
            plane
        })
        .collect();

    let mut luma = [0u16; 64];
    for (i, q) in luma.iter_mut().enumerate() {
        *q = 2 + (i as u16 % 8) + 3 * (i as u16 / 8);
    }

    CoefficientImage {
        frame,
        quant_tables: [
            Some(QuantTable { values: luma }),
            Some(QuantTable { values: [6; 64] }),
            None,
            None,
        ],
        planes,
        markers: vec![SavedMarker {
            marker: 0xFE,
            data: b"fixture".to_vec(),
        }],
    }
}

/// Serialize a coefficient image, optionally with an Exif APP1 in front.
pub fn coefficient_jpeg(image: &CoefficientImage, exif: Option<&ExifFixture>) -> Vec<u8> {
    let mut out = Vec::new();
    write_jpeg(image, MarkerCopy::All, &mut out).expect("write coefficient fixture");
    match exif {
        Some(exif) => insert_segment(&out, &exif.app1()),
        None => out,
    }
}

fn segment(marker: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0xFF, marker];
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

fn dqt_ramp() -> Vec<u8> {
    let mut payload = vec![0x00];
    payload.extend(1..=64u8);
    segment(0xDB, &payload)
}

/// DC table: 0x00 -> 00, 0x01 -> 01, 0x02 -> 10.
fn tiny_dc_table() -> Vec<u8> {
    let mut payload = vec![0x00, 0, 3];
    payload.extend_from_slice(&[0; 14]);
    payload.extend_from_slice(&[0x00, 0x01, 0x02]);
    segment(0xC4, &payload)
}

/// AC table: 0x00 (EOB) -> 0, 0x01 -> 10.
fn tiny_ac_table() -> Vec<u8> {
    let mut payload = vec![0x10, 1, 1];
    payload.extend_from_slice(&[0; 14]);
    payload.extend_from_slice(&[0x00, 0x01]);
    segment(0xC4, &payload)
}

fn gray_sof(marker: u8, width: u16, height: u16) -> Vec<u8> {
    let mut payload = vec![8];
    payload.extend_from_slice(&height.to_be_bytes());
    payload.extend_from_slice(&width.to_be_bytes());
    payload.extend_from_slice(&[1, 1, 0x11, 0]);
    segment(marker, &payload)
}

/// Hand-coded 16x8 progressive grayscale JPEG with a restart interval of one
/// block. Decodes to DC 3 with a +1 at the first AC position in the left
/// block, and DC -1 in the right block (the predictor resets at RST0).
pub fn progressive_restart_jpeg() -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];
    out.extend(dqt_ramp());
    out.extend(gray_sof(0xC2, 16, 8));
    out.extend(tiny_dc_table());
    out.extend(tiny_ac_table());
    out.extend(segment(0xDD, &[0, 1]));

    // DC first pass: "10"+"11" (3), RST0, "01"+"0" (-1).
    out.extend(segment(0xDA, &[1, 1, 0x00, 0, 0, 0]));
    out.extend_from_slice(&[0xBF, 0xFF, 0xD0, 0x5F]);

    // AC first pass: "10"+"1" (+1 at zigzag 1) then EOB, RST0, EOB.
    out.extend(segment(0xDA, &[1, 1, 0x00, 1, 63, 0]));
    out.extend_from_slice(&[0xAF, 0xFF, 0xD0, 0x7F]);

    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

/// 8x8 progressive JPEG whose DC scan names AC table 15.
pub fn bad_table_selector_jpeg() -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];
    out.extend(dqt_ramp());
    out.extend(gray_sof(0xC2, 8, 8));
    out.extend(tiny_dc_table());
    out.extend(segment(0xDA, &[1, 1, 0x0F, 0, 0, 0]));
    out.extend_from_slice(&[0x3F, 0xFF, 0xD9]);
    out
}

/// Rewrite the SOF0 dimensions of an encoded JPEG, leaving scan data alone.
pub fn with_frame_size(jpeg: &[u8], width: u16, height: u16) -> Vec<u8> {
    let sof = jpeg
        .windows(2)
        .position(|w| w == [0xFF, SOF0])
        .expect("fixture has a SOF0 segment");
    let mut out = jpeg.to_vec();
    out[sof + 5..sof + 7].copy_from_slice(&height.to_be_bytes());
    out[sof + 7..sof + 9].copy_from_slice(&width.to_be_bytes());
    out
}
