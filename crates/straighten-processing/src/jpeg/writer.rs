//! Sequential Huffman JPEG encoder for coefficient images.
//!
//! Output always uses the standard Annex K Huffman tables: a transpose can
//! produce run/size symbols the source's optimized tables never assigned a
//! code to.

use std::io::Write;

use straighten_core::{MarkerCopy, ProcessingError, ProcessingResult};

use super::bitio::BitWriter;
use super::coefficients::{Block, CoefficientImage, ComponentInfo, SavedMarker};
use super::huffman::{category_encode, HuffmanEncoder, HuffmanSpec};
use super::markers::{DHT, DQT, EOI, MARKER_PREFIX, SOF0, SOF1, SOI, SOS, ZIGZAG};

const MAX_BLOCKS_IN_MCU: usize = 10;
const APP14: u8 = 0xEE;
const ADOBE_HEADER: &[u8] = b"Adobe";
/// Largest magnitude category of an 8-bit DC difference and AC term.
const MAX_DC_CATEGORY: u8 = 11;
const MAX_AC_CATEGORY: u8 = 10;
const EOB: u8 = 0x00;
const ZRL: u8 = 0xF0;

struct EntropyTables {
    dc: HuffmanEncoder,
    ac: HuffmanEncoder,
}

/// Serialize `image` as a sequential JPEG.
///
/// APPn and COM markers are copied according to `marker_copy`; an Adobe
/// APP14 segment is always kept since it decides how color is decoded.
pub fn write_jpeg<W: Write>(
    image: &CoefficientImage,
    marker_copy: MarkerCopy,
    out: &mut W,
) -> ProcessingResult<()> {
    let frame = &image.frame;
    let components = &frame.components;

    let mut slots: Vec<u8> = components.iter().map(|c| c.quant_slot).collect();
    slots.sort_unstable();
    slots.dedup();

    let mut extended = false;
    for component in components {
        extended |= !image.quant_table(component)?.is_8bit();
    }

    out.write_all(&[MARKER_PREFIX, SOI])?;

    let mut copied = 0;
    for marker in &image.markers {
        if marker_copy.keeps(marker.marker) || is_adobe(marker) {
            write_segment(out, marker.marker, &marker.data)?;
            copied += 1;
        }
    }

    for &slot in &slots {
        let table = image.quant_tables[usize::from(slot)]
            .as_ref()
            .ok_or_else(|| ProcessingError::codec("Missing quantization table"))?;
        let mut payload = Vec::with_capacity(129);
        if table.is_8bit() {
            payload.push(slot);
            payload.extend(ZIGZAG.iter().map(|&i| table.values[i] as u8));
        } else {
            payload.push(0x10 | slot);
            for &i in &ZIGZAG {
                payload.extend_from_slice(&table.values[i].to_be_bytes());
            }
        }
        write_segment(out, DQT, &payload)?;
    }

    let mut sof = Vec::with_capacity(6 + 3 * components.len());
    sof.push(8);
    sof.extend_from_slice(&frame.height.to_be_bytes());
    sof.extend_from_slice(&frame.width.to_be_bytes());
    sof.push(components.len() as u8);
    for component in components {
        sof.push(component.id);
        sof.push((component.h_samp << 4) | component.v_samp);
        sof.push(component.quant_slot);
    }
    write_segment(out, if extended { SOF1 } else { SOF0 }, &sof)?;

    let mut specs = vec![
        (0x00, HuffmanSpec::dc_luminance()),
        (0x10, HuffmanSpec::ac_luminance()),
    ];
    if components.len() > 1 {
        specs.push((0x01, HuffmanSpec::dc_chrominance()));
        specs.push((0x11, HuffmanSpec::ac_chrominance()));
    }
    for (selector, spec) in &specs {
        let mut payload = vec![*selector];
        payload.extend_from_slice(&spec.bits);
        payload.extend_from_slice(&spec.values);
        write_segment(out, DHT, &payload)?;
    }

    let luma = EntropyTables {
        dc: HuffmanEncoder::new(&HuffmanSpec::dc_luminance()),
        ac: HuffmanEncoder::new(&HuffmanSpec::ac_luminance()),
    };
    let chroma = EntropyTables {
        dc: HuffmanEncoder::new(&HuffmanSpec::dc_chrominance()),
        ac: HuffmanEncoder::new(&HuffmanSpec::ac_chrominance()),
    };
    let tables_for = |index: usize| if index == 0 { &luma } else { &chroma };

    let blocks_in_mcu: usize = components
        .iter()
        .map(|c| usize::from(c.h_samp) * usize::from(c.v_samp))
        .sum();

    if components.len() == 1 || blocks_in_mcu <= MAX_BLOCKS_IN_MCU {
        let indices: Vec<usize> = (0..components.len()).collect();
        write_scan(out, image, &indices, &tables_for)?;
    } else {
        for index in 0..components.len() {
            write_scan(out, image, &[index], &tables_for)?;
        }
    }

    out.write_all(&[MARKER_PREFIX, EOI])?;

    tracing::debug!(
        width = frame.width,
        height = frame.height,
        markers = copied,
        extended,
        "Encoded JPEG coefficients"
    );
    Ok(())
}

fn is_adobe(marker: &SavedMarker) -> bool {
    marker.marker == APP14 && marker.data.starts_with(ADOBE_HEADER)
}

fn write_segment<W: Write>(out: &mut W, marker: u8, payload: &[u8]) -> ProcessingResult<()> {
    let length = u16::try_from(payload.len() + 2)
        .map_err(|_| ProcessingError::codec("JPEG segment too large"))?;
    out.write_all(&[MARKER_PREFIX, marker])?;
    out.write_all(&length.to_be_bytes())?;
    out.write_all(payload)?;
    Ok(())
}

fn table_selector(index: usize) -> u8 {
    if index == 0 {
        0x00
    } else {
        0x11
    }
}

fn write_scan<'t, W: Write>(
    out: &mut W,
    image: &CoefficientImage,
    indices: &[usize],
    tables_for: &dyn Fn(usize) -> &'t EntropyTables,
) -> ProcessingResult<()> {
    let frame = &image.frame;

    let mut header = vec![indices.len() as u8];
    for &index in indices {
        header.push(frame.components[index].id);
        header.push(table_selector(index));
    }
    header.extend_from_slice(&[0, 63, 0]);
    write_segment(out, SOS, &header)?;

    let mut bits = BitWriter::new(&mut *out);
    let mut predictors = vec![0i32; indices.len()];

    if indices.len() == 1 {
        let index = indices[0];
        let tables = tables_for(index);
        let plane = &image.planes[index];
        let (blocks_w, blocks_h) = frame.component_blocks(&frame.components[index]);
        for by in 0..blocks_h {
            for bx in 0..blocks_w {
                encode_block(&mut bits, plane.block(bx, by), &mut predictors[0], tables)?;
            }
        }
    } else {
        let (mcus_x, mcus_y) = frame.mcus();
        for my in 0..mcus_y {
            for mx in 0..mcus_x {
                for (slot, &index) in indices.iter().enumerate() {
                    let ComponentInfo { h_samp, v_samp, .. } = frame.components[index];
                    let (h, v) = (usize::from(h_samp), usize::from(v_samp));
                    let tables = tables_for(index);
                    let plane = &image.planes[index];
                    for yy in 0..v {
                        for xx in 0..h {
                            let block = plane.block(mx * h + xx, my * v + yy);
                            encode_block(&mut bits, block, &mut predictors[slot], tables)?;
                        }
                    }
                }
            }
        }
    }

    bits.finish()?;
    Ok(())
}

fn write_symbol<W: Write>(
    bits: &mut BitWriter<W>,
    encoder: &HuffmanEncoder,
    symbol: u8,
) -> ProcessingResult<()> {
    let (code, len) = encoder.code(symbol).ok_or_else(|| {
        ProcessingError::codec(format!("No Huffman code for symbol {:#04x}", symbol))
    })?;
    bits.write_bits(u32::from(code), len)?;
    Ok(())
}

fn encode_block<W: Write>(
    bits: &mut BitWriter<W>,
    block: &Block,
    predictor: &mut i32,
    tables: &EntropyTables,
) -> ProcessingResult<()> {
    let dc = i32::from(block[0]);
    let (size, extra) = category_encode(dc - *predictor);
    *predictor = dc;
    if size > MAX_DC_CATEGORY {
        return Err(ProcessingError::codec("DC coefficient out of range"));
    }
    write_symbol(bits, &tables.dc, size)?;
    bits.write_bits(u32::from(extra), size)?;

    let mut run = 0u8;
    for &natural in &ZIGZAG[1..] {
        let value = i32::from(block[natural]);
        if value == 0 {
            run += 1;
            continue;
        }
        while run > 15 {
            write_symbol(bits, &tables.ac, ZRL)?;
            run -= 16;
        }
        let (size, extra) = category_encode(value);
        if size > MAX_AC_CATEGORY {
            return Err(ProcessingError::codec("AC coefficient out of range"));
        }
        write_symbol(bits, &tables.ac, (run << 4) | size)?;
        bits.write_bits(u32::from(extra), size)?;
        run = 0;
    }
    if run > 0 {
        write_symbol(bits, &tables.ac, EOB)?;
    }
    Ok(())
}
