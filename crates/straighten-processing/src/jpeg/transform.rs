//! Lossless geometric transforms in the DCT domain.
//!
//! Flips and rotations of an 8x8 spatial block map onto its coefficients as
//! a transpose plus sign changes: mirroring columns negates every term with
//! an odd horizontal frequency, mirroring rows every term with an odd
//! vertical frequency. Combined with a matching permutation of whole blocks
//! this reproduces the pixel-domain transform exactly, provided the image is
//! made of whole MCUs.

use straighten_core::TransformCode;

use super::coefficients::{Block, CoefficientImage, CoefficientPlane, QuantTable};

/// Coefficient-level part of a transform, applied after any transpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockOp {
    transpose: bool,
    negate_odd_u: bool,
    negate_odd_v: bool,
}

fn block_op(code: TransformCode) -> BlockOp {
    let (transpose, negate_odd_u, negate_odd_v) = match code {
        TransformCode::None => (false, false, false),
        TransformCode::FlipHorizontal => (false, true, false),
        TransformCode::FlipVertical => (false, false, true),
        TransformCode::Rotate180 => (false, true, true),
        TransformCode::Transpose => (true, false, false),
        TransformCode::Rotate90 => (true, true, false),
        TransformCode::Rotate270 => (true, false, true),
        TransformCode::Transverse => (true, true, true),
    };
    BlockOp {
        transpose,
        negate_odd_u,
        negate_odd_v,
    }
}

/// Source block feeding destination block `(dx, dy)`, given the source
/// plane size in blocks.
pub fn source_block(
    code: TransformCode,
    dx: usize,
    dy: usize,
    src_w: usize,
    src_h: usize,
) -> (usize, usize) {
    match code {
        TransformCode::None => (dx, dy),
        TransformCode::FlipHorizontal => (src_w - 1 - dx, dy),
        TransformCode::FlipVertical => (dx, src_h - 1 - dy),
        TransformCode::Rotate180 => (src_w - 1 - dx, src_h - 1 - dy),
        TransformCode::Transpose => (dy, dx),
        TransformCode::Rotate90 => (dy, src_h - 1 - dx),
        TransformCode::Rotate270 => (src_w - 1 - dy, dx),
        TransformCode::Transverse => (src_w - 1 - dy, src_h - 1 - dx),
    }
}

fn transform_block(src: &Block, op: BlockOp) -> Block {
    let mut out = [0i16; 64];
    for v in 0..8 {
        for u in 0..8 {
            let value = if op.transpose {
                src[u * 8 + v]
            } else {
                src[v * 8 + u]
            };
            let negate = (op.negate_odd_u && u % 2 == 1) ^ (op.negate_odd_v && v % 2 == 1);
            out[v * 8 + u] = if negate { value.wrapping_neg() } else { value };
        }
    }
    out
}

fn transpose_quant(table: &QuantTable) -> QuantTable {
    let mut values = [0u16; 64];
    for v in 0..8 {
        for u in 0..8 {
            values[v * 8 + u] = table.values[u * 8 + v];
        }
    }
    QuantTable { values }
}

/// Mirror blocks in place for the transforms that keep the plane shape.
fn transform_plane_in_place(plane: &mut CoefficientPlane, code: TransformCode) {
    let (w, h) = (plane.width_in_blocks(), plane.height_in_blocks());
    let op = block_op(code);

    if op.negate_odd_u {
        for by in 0..h {
            for bx in 0..w / 2 {
                plane.swap_blocks((bx, by), (w - 1 - bx, by));
            }
        }
    }
    if op.negate_odd_v {
        for by in 0..h / 2 {
            for bx in 0..w {
                plane.swap_blocks((bx, by), (bx, h - 1 - by));
            }
        }
    }
    for block in plane.blocks_mut() {
        *block = transform_block(block, op);
    }
}

/// Build a new plane for the transforms that exchange rows and columns.
fn transform_plane_transposed(plane: &CoefficientPlane, code: TransformCode) -> CoefficientPlane {
    let (src_w, src_h) = (plane.width_in_blocks(), plane.height_in_blocks());
    let op = block_op(code);
    let mut out = CoefficientPlane::new(src_h, src_w);

    for dy in 0..src_w {
        for dx in 0..src_h {
            let (sx, sy) = source_block(code, dx, dy, src_w, src_h);
            *out.block_mut(dx, dy) = transform_block(plane.block(sx, sy), op);
        }
    }
    out
}

/// Apply `code` to every component plane, adjusting the frame geometry,
/// sampling factors and quantization tables to match.
///
/// The caller must have checked that the image consists of whole MCUs.
pub fn apply(mut image: CoefficientImage, code: TransformCode) -> CoefficientImage {
    if code == TransformCode::None {
        return image;
    }

    if !code.swaps_dimensions() {
        for plane in &mut image.planes {
            transform_plane_in_place(plane, code);
        }
        return image;
    }

    image.planes = image
        .planes
        .iter()
        .map(|plane| transform_plane_transposed(plane, code))
        .collect();

    let frame = &mut image.frame;
    std::mem::swap(&mut frame.width, &mut frame.height);
    for component in &mut frame.components {
        std::mem::swap(&mut component.h_samp, &mut component.v_samp);
    }
    for table in image.quant_tables.iter_mut().flatten() {
        *table = transpose_quant(table);
    }
    image
}
