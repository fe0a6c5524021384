//! JPEG coefficient decoder.
//!
//! Parses the marker stream and Huffman-decodes every scan into per-component
//! coefficient planes. Baseline, extended sequential and progressive Huffman
//! streams are supported, restart intervals included. No IDCT is performed.

use straighten_core::{ProcessingError, ProcessingResult, DEFAULT_MAX_COEFFICIENT_BYTES};

use super::bitio::BitReader;
use super::coefficients::{
    Block, CoefficientImage, CoefficientPlane, ComponentInfo, FrameHeader, QuantTable,
    SavedMarker,
};
use super::huffman::{category_decode, HuffmanDecoder, HuffmanSpec};
use super::markers::{
    is_app, is_restart, is_standalone, is_unsupported_frame, COM, DHT, DQT, DRI, EOI,
    MARKER_PREFIX, SOF0, SOF1, SOF2, SOI, SOS, ZIGZAG,
};

/// Largest number of blocks an interleaved MCU may carry.
const MAX_BLOCKS_IN_MCU: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanKind {
    Sequential,
    DcFirst,
    DcRefine,
    AcFirst,
    AcRefine,
}

#[derive(Debug, Clone, Copy)]
struct ScanComponent {
    /// Index into the frame's component list.
    index: usize,
    dc_table: usize,
    ac_table: usize,
}

#[derive(Debug, Clone)]
struct ScanHeader {
    components: Vec<ScanComponent>,
    ss: usize,
    se: usize,
    al: u8,
    kind: ScanKind,
}

/// Two-phase reader: [`JpegReader::read_header`] stops at the first scan so
/// callers can check the frame geometry before paying for entropy decoding.
pub struct JpegReader<'a> {
    data: &'a [u8],
    pos: usize,
    frame: Option<FrameHeader>,
    quant_tables: [Option<QuantTable>; 4],
    latched_quant: [Option<QuantTable>; 4],
    dc_tables: [Option<HuffmanDecoder>; 4],
    ac_tables: [Option<HuffmanDecoder>; 4],
    restart_interval: u16,
    markers: Vec<SavedMarker>,
    planes: Vec<CoefficientPlane>,
    scans: usize,
    memory_limit: u64,
}

impl<'a> JpegReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            frame: None,
            quant_tables: Default::default(),
            latched_quant: Default::default(),
            dc_tables: Default::default(),
            ac_tables: Default::default(),
            restart_interval: 0,
            markers: Vec::new(),
            planes: Vec::new(),
            scans: 0,
            memory_limit: DEFAULT_MAX_COEFFICIENT_BYTES,
        }
    }

    /// Cap the coefficient storage [`read_coefficients`](Self::read_coefficients)
    /// may allocate.
    pub fn with_memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit = bytes;
        self
    }

    /// Parse tables and the frame header, stopping in front of the first SOS.
    pub fn read_header(&mut self) -> ProcessingResult<&FrameHeader> {
        if self.frame.is_none() {
            if self.data.len() < 2 || self.data[0] != MARKER_PREFIX || self.data[1] != SOI {
                return Err(ProcessingError::codec("Not a JPEG file: missing SOI marker"));
            }
            self.pos = 2;

            loop {
                let start = self.pos;
                let marker = self
                    .next_marker()?
                    .ok_or_else(|| ProcessingError::codec("JPEG data ends before any scan"))?;
                match marker {
                    SOS => {
                        if self.frame.is_none() {
                            return Err(ProcessingError::codec("Scan appears before frame header"));
                        }
                        self.pos = start;
                        break;
                    }
                    EOI => return Err(ProcessingError::codec("JPEG image contains no scans")),
                    _ => self.handle_marker(marker)?,
                }
            }
        }

        self.frame
            .as_ref()
            .ok_or_else(|| ProcessingError::codec("Missing frame header"))
    }

    /// Decode every scan and return the complete coefficient image.
    pub fn read_coefficients(mut self) -> ProcessingResult<CoefficientImage> {
        let frame = self.read_header()?.clone();
        frame.check_memory(self.memory_limit)?;
        self.planes = frame
            .components
            .iter()
            .map(|c| {
                let (width, height) = frame.plane_blocks(c);
                CoefficientPlane::new(width, height)
            })
            .collect();

        loop {
            let Some(marker) = self.next_marker()? else {
                tracing::warn!("JPEG data ends without EOI marker");
                break;
            };
            match marker {
                SOS => {
                    let payload = self.segment_payload()?;
                    let scan = self.parse_scan(payload, &frame)?;
                    self.decode_scan(&frame, &scan)?;
                    self.scans += 1;
                }
                EOI => break,
                _ => self.handle_marker(marker)?,
            }
        }

        if self.scans == 0 {
            return Err(ProcessingError::codec("JPEG image contains no scans"));
        }

        tracing::debug!(
            width = frame.width,
            height = frame.height,
            components = frame.components.len(),
            progressive = frame.progressive(),
            scans = self.scans,
            markers = self.markers.len(),
            "Decoded JPEG coefficients"
        );

        Ok(CoefficientImage {
            frame,
            quant_tables: self.latched_quant,
            planes: self.planes,
            markers: self.markers,
        })
    }

    /// Advance past the next marker code, skipping stray bytes and fill bytes.
    fn next_marker(&mut self) -> ProcessingResult<Option<u8>> {
        let start = self.pos;
        while self.pos < self.data.len() && self.data[self.pos] != MARKER_PREFIX {
            self.pos += 1;
        }
        if self.pos > start {
            tracing::warn!(
                offset = start,
                skipped = self.pos - start,
                "Skipping extraneous bytes before JPEG marker"
            );
        }
        while self.pos < self.data.len() && self.data[self.pos] == MARKER_PREFIX {
            self.pos += 1;
        }
        match self.data.get(self.pos) {
            Some(&marker) => {
                self.pos += 1;
                Ok(Some(marker))
            }
            None => Ok(None),
        }
    }

    /// Payload of a length-prefixed segment; the cursor moves past it.
    fn segment_payload(&mut self) -> ProcessingResult<&'a [u8]> {
        let data = self.data;
        let header = data
            .get(self.pos..self.pos + 2)
            .ok_or_else(|| ProcessingError::codec("Truncated JPEG segment length"))?;
        let length = usize::from(u16::from_be_bytes([header[0], header[1]]));
        if length < 2 {
            return Err(ProcessingError::codec(format!(
                "Invalid JPEG segment length {}",
                length
            )));
        }
        let payload = data
            .get(self.pos + 2..self.pos + length)
            .ok_or_else(|| ProcessingError::codec("Truncated JPEG segment"))?;
        self.pos += length;
        Ok(payload)
    }

    fn handle_marker(&mut self, marker: u8) -> ProcessingResult<()> {
        match marker {
            SOF0 | SOF1 | SOF2 => {
                if self.frame.is_some() {
                    return Err(ProcessingError::codec("Duplicate frame header"));
                }
                let payload = self.segment_payload()?;
                self.frame = Some(parse_frame(marker, payload)?);
            }
            m if is_unsupported_frame(m) => {
                return Err(ProcessingError::codec(format!(
                    "Unsupported JPEG process (SOF marker {:#04x})",
                    m
                )));
            }
            DHT => {
                let payload = self.segment_payload()?;
                self.parse_huffman_tables(payload)?;
            }
            DQT => {
                let payload = self.segment_payload()?;
                self.parse_quant_tables(payload)?;
            }
            DRI => {
                let payload = self.segment_payload()?;
                if payload.len() != 2 {
                    return Err(ProcessingError::codec("Invalid DRI segment"));
                }
                self.restart_interval = u16::from_be_bytes([payload[0], payload[1]]);
            }
            SOI => return Err(ProcessingError::codec("Unexpected SOI marker")),
            m if is_app(m) || m == COM => {
                let payload = self.segment_payload()?;
                self.markers.push(SavedMarker {
                    marker: m,
                    data: payload.to_vec(),
                });
            }
            m if is_standalone(m) => {
                tracing::warn!(marker = m, "Ignoring stray JPEG marker");
            }
            m => {
                let payload = self.segment_payload()?;
                tracing::debug!(marker = m, length = payload.len(), "Skipping JPEG segment");
            }
        }
        Ok(())
    }

    fn parse_huffman_tables(&mut self, mut payload: &[u8]) -> ProcessingResult<()> {
        while !payload.is_empty() {
            if payload.len() < 17 {
                return Err(ProcessingError::codec("Truncated DHT segment"));
            }
            let class = payload[0] >> 4;
            let slot = usize::from(payload[0] & 0x0F);
            if class > 1 || slot > 3 {
                return Err(ProcessingError::codec(format!(
                    "Invalid Huffman table selector {:#04x}",
                    payload[0]
                )));
            }
            let mut bits = [0u8; 16];
            bits.copy_from_slice(&payload[1..17]);
            let count: usize = bits.iter().map(|&n| usize::from(n)).sum();
            let values = payload
                .get(17..17 + count)
                .ok_or_else(|| ProcessingError::codec("Truncated DHT segment"))?;

            let decoder = HuffmanDecoder::new(&HuffmanSpec::new(bits, values.to_vec())?);
            if class == 0 {
                self.dc_tables[slot] = Some(decoder);
            } else {
                self.ac_tables[slot] = Some(decoder);
            }
            payload = &payload[17 + count..];
        }
        Ok(())
    }

    fn parse_quant_tables(&mut self, mut payload: &[u8]) -> ProcessingResult<()> {
        while !payload.is_empty() {
            let precision = payload[0] >> 4;
            let slot = usize::from(payload[0] & 0x0F);
            if precision > 1 || slot > 3 {
                return Err(ProcessingError::codec(format!(
                    "Invalid quantization table selector {:#04x}",
                    payload[0]
                )));
            }
            let entry_size = if precision == 0 { 1 } else { 2 };
            let body = payload
                .get(1..1 + 64 * entry_size)
                .ok_or_else(|| ProcessingError::codec("Truncated DQT segment"))?;

            let mut values = [0u16; 64];
            for (k, &natural) in ZIGZAG.iter().enumerate() {
                values[natural] = if precision == 0 {
                    u16::from(body[k])
                } else {
                    u16::from_be_bytes([body[2 * k], body[2 * k + 1]])
                };
            }
            self.quant_tables[slot] = Some(QuantTable { values });
            payload = &payload[1 + 64 * entry_size..];
        }
        Ok(())
    }

    fn parse_scan(&mut self, payload: &[u8], frame: &FrameHeader) -> ProcessingResult<ScanHeader> {
        let count = usize::from(*payload.first().unwrap_or(&0));
        if count == 0 || count > 4 || payload.len() != 4 + 2 * count {
            return Err(ProcessingError::codec("Invalid SOS segment"));
        }

        let mut components = Vec::with_capacity(count);
        for i in 0..count {
            let id = payload[1 + 2 * i];
            let tables = payload[2 + 2 * i];
            let index = frame
                .components
                .iter()
                .position(|c| c.id == id)
                .ok_or_else(|| {
                    ProcessingError::codec(format!("Scan references unknown component {}", id))
                })?;
            if components.iter().any(|c: &ScanComponent| c.index == index) {
                return Err(ProcessingError::codec("Component appears twice in one scan"));
            }
            if tables >> 4 > 3 || tables & 0x0F > 3 {
                return Err(ProcessingError::codec(format!(
                    "Invalid Huffman table selector {:#04x} for component {}",
                    tables, id
                )));
            }
            components.push(ScanComponent {
                index,
                dc_table: usize::from(tables >> 4),
                ac_table: usize::from(tables & 0x0F),
            });
        }

        let tail = &payload[1 + 2 * count..];
        let (ss, se) = (usize::from(tail[0]), usize::from(tail[1]));
        let (ah, al) = (tail[2] >> 4, tail[2] & 0x0F);

        let kind = if !frame.progressive() {
            if ss != 0 || se != 63 || ah != 0 || al != 0 {
                return Err(ProcessingError::codec("Invalid sequential scan parameters"));
            }
            ScanKind::Sequential
        } else if ss == 0 {
            if se != 0 {
                return Err(ProcessingError::codec("DC scan must not include AC terms"));
            }
            if ah == 0 {
                ScanKind::DcFirst
            } else {
                ScanKind::DcRefine
            }
        } else {
            if se < ss || se > 63 || count != 1 {
                return Err(ProcessingError::codec("Invalid progressive AC scan parameters"));
            }
            if ah == 0 {
                ScanKind::AcFirst
            } else {
                ScanKind::AcRefine
            }
        };
        if al > 13 {
            return Err(ProcessingError::codec("Invalid successive approximation shift"));
        }

        if count > 1 {
            let blocks: usize = components
                .iter()
                .map(|c| {
                    let info = &frame.components[c.index];
                    usize::from(info.h_samp) * usize::from(info.v_samp)
                })
                .sum();
            if blocks > MAX_BLOCKS_IN_MCU {
                return Err(ProcessingError::codec("Too many blocks in interleaved MCU"));
            }
        }

        for component in &components {
            let needs_dc = matches!(kind, ScanKind::Sequential | ScanKind::DcFirst);
            let needs_ac = matches!(
                kind,
                ScanKind::Sequential | ScanKind::AcFirst | ScanKind::AcRefine
            );
            if needs_dc && self.dc_tables.get(component.dc_table).and_then(Option::as_ref).is_none()
            {
                return Err(ProcessingError::codec(format!(
                    "Undefined DC Huffman table {}",
                    component.dc_table
                )));
            }
            if needs_ac && self.ac_tables.get(component.ac_table).and_then(Option::as_ref).is_none()
            {
                return Err(ProcessingError::codec(format!(
                    "Undefined AC Huffman table {}",
                    component.ac_table
                )));
            }
            self.latch_quant_table(&frame.components[component.index])?;
        }

        Ok(ScanHeader {
            components,
            ss,
            se,
            al,
            kind,
        })
    }

    fn latch_quant_table(&mut self, component: &ComponentInfo) -> ProcessingResult<()> {
        let slot = usize::from(component.quant_slot);
        if self.latched_quant[slot].is_none() {
            let table = self.quant_tables[slot].clone().ok_or_else(|| {
                ProcessingError::codec(format!(
                    "Component {} references undefined quantization table {}",
                    component.id, slot
                ))
            })?;
            self.latched_quant[slot] = Some(table);
        }
        Ok(())
    }

    fn decode_scan(&mut self, frame: &FrameHeader, scan: &ScanHeader) -> ProcessingResult<()> {
        let data = self.data;
        let start = self.pos;
        let mut reader = BitReader::new(&data[start..]);

        let interleaved = scan.components.len() > 1;
        let (mcus_x, mcus_y) = if interleaved {
            frame.mcus()
        } else {
            frame.component_blocks(&frame.components[scan.components[0].index])
        };

        let mut predictors = [0i32; 4];
        let mut eob_run = 0u32;
        let mut until_restart = self.restart_interval;

        for mcu in 0..mcus_x * mcus_y {
            if self.restart_interval > 0 {
                if until_restart == 0 {
                    reader.restart()?;
                    predictors = [0; 4];
                    eob_run = 0;
                    until_restart = self.restart_interval;
                }
                until_restart -= 1;
            }

            let (mx, my) = (mcu % mcus_x, mcu / mcus_x);
            for (slot, component) in scan.components.iter().enumerate() {
                let info = &frame.components[component.index];
                let (h, v) = if interleaved {
                    (usize::from(info.h_samp), usize::from(info.v_samp))
                } else {
                    (1, 1)
                };
                let dc = self.dc_tables.get(component.dc_table).and_then(Option::as_ref);
                let ac = self.ac_tables.get(component.ac_table).and_then(Option::as_ref);

                for yy in 0..v {
                    for xx in 0..h {
                        let block = self.planes[component.index].block_mut(mx * h + xx, my * v + yy);
                        match scan.kind {
                            ScanKind::Sequential => decode_sequential(
                                &mut reader,
                                required(dc)?,
                                required(ac)?,
                                &mut predictors[slot],
                                block,
                            )?,
                            ScanKind::DcFirst => decode_dc_first(
                                &mut reader,
                                required(dc)?,
                                &mut predictors[slot],
                                scan.al,
                                block,
                            )?,
                            ScanKind::DcRefine => {
                                if reader.read_bit() == 1 {
                                    block[0] |= 1 << scan.al;
                                }
                            }
                            ScanKind::AcFirst => decode_ac_first(
                                &mut reader,
                                required(ac)?,
                                scan,
                                &mut eob_run,
                                block,
                            )?,
                            ScanKind::AcRefine => decode_ac_refine(
                                &mut reader,
                                required(ac)?,
                                scan,
                                &mut eob_run,
                                block,
                            )?,
                        }
                    }
                }
            }
        }

        self.pos = next_marker_offset(data, start);
        if self.pos >= self.data.len() {
            tracing::warn!("JPEG data ends inside a scan");
        }
        Ok(())
    }
}

fn required(table: Option<&HuffmanDecoder>) -> ProcessingResult<&HuffmanDecoder> {
    table.ok_or_else(|| ProcessingError::codec("Scan uses an undefined Huffman table"))
}

fn parse_frame(marker: u8, payload: &[u8]) -> ProcessingResult<FrameHeader> {
    if payload.len() < 6 {
        return Err(ProcessingError::codec("Truncated SOF segment"));
    }
    let precision = payload[0];
    let height = u16::from_be_bytes([payload[1], payload[2]]);
    let width = u16::from_be_bytes([payload[3], payload[4]]);
    let count = usize::from(payload[5]);

    if precision != 8 {
        return Err(ProcessingError::codec(format!(
            "Unsupported sample precision {}",
            precision
        )));
    }
    if width == 0 || height == 0 {
        return Err(ProcessingError::codec("Image has zero width or height"));
    }
    if count == 0 || count > 4 || payload.len() != 6 + 3 * count {
        return Err(ProcessingError::codec("Invalid SOF component list"));
    }

    let mut components: Vec<ComponentInfo> = Vec::with_capacity(count);
    for chunk in payload[6..].chunks_exact(3) {
        let component = ComponentInfo {
            id: chunk[0],
            h_samp: chunk[1] >> 4,
            v_samp: chunk[1] & 0x0F,
            quant_slot: chunk[2],
        };
        if !(1..=4).contains(&component.h_samp) || !(1..=4).contains(&component.v_samp) {
            return Err(ProcessingError::codec(format!(
                "Invalid sampling factors for component {}",
                component.id
            )));
        }
        if component.quant_slot > 3 {
            return Err(ProcessingError::codec("Invalid quantization table selector"));
        }
        if components.iter().any(|c| c.id == component.id) {
            return Err(ProcessingError::codec("Duplicate component identifier"));
        }
        components.push(component);
    }

    Ok(FrameHeader {
        marker,
        precision,
        width,
        height,
        components,
    })
}

/// Offset of the first marker after entropy-coded data starting at `start`.
/// Stuffed bytes, fill bytes and restart markers do not end a scan.
fn next_marker_offset(data: &[u8], start: usize) -> usize {
    let mut pos = start;
    while pos + 1 < data.len() {
        if data[pos] == MARKER_PREFIX {
            let code = data[pos + 1];
            if code != 0x00 && code != MARKER_PREFIX && !is_restart(code) {
                return pos;
            }
        }
        pos += 1;
    }
    data.len()
}

fn to_coefficient(value: i32) -> ProcessingResult<i16> {
    i16::try_from(value).map_err(|_| ProcessingError::codec("DCT coefficient out of range"))
}

fn decode_dc_diff(reader: &mut BitReader<'_>, dc: &HuffmanDecoder) -> ProcessingResult<i32> {
    let size = dc.decode(reader)?;
    if size > 15 {
        return Err(ProcessingError::codec("Invalid DC magnitude category"));
    }
    Ok(category_decode(size, reader.read_bits(size)))
}

fn decode_sequential(
    reader: &mut BitReader<'_>,
    dc: &HuffmanDecoder,
    ac: &HuffmanDecoder,
    predictor: &mut i32,
    block: &mut Block,
) -> ProcessingResult<()> {
    *predictor += decode_dc_diff(reader, dc)?;
    block[0] = to_coefficient(*predictor)?;

    let mut k = 1;
    while k < 64 {
        let symbol = ac.decode(reader)?;
        let run = usize::from(symbol >> 4);
        let size = symbol & 0x0F;
        if size == 0 {
            if run == 15 {
                k += 16;
                continue;
            }
            break;
        }
        k += run;
        if k > 63 {
            return Err(ProcessingError::codec("AC coefficient index out of range"));
        }
        block[ZIGZAG[k]] = to_coefficient(category_decode(size, reader.read_bits(size)))?;
        k += 1;
    }
    Ok(())
}

fn decode_dc_first(
    reader: &mut BitReader<'_>,
    dc: &HuffmanDecoder,
    predictor: &mut i32,
    al: u8,
    block: &mut Block,
) -> ProcessingResult<()> {
    *predictor += decode_dc_diff(reader, dc)?;
    block[0] = to_coefficient(*predictor << al)?;
    Ok(())
}

fn decode_ac_first(
    reader: &mut BitReader<'_>,
    ac: &HuffmanDecoder,
    scan: &ScanHeader,
    eob_run: &mut u32,
    block: &mut Block,
) -> ProcessingResult<()> {
    if *eob_run > 0 {
        *eob_run -= 1;
        return Ok(());
    }

    let mut k = scan.ss;
    while k <= scan.se {
        let symbol = ac.decode(reader)?;
        let run = symbol >> 4;
        let size = symbol & 0x0F;
        if size != 0 {
            k += usize::from(run);
            if k > scan.se {
                return Err(ProcessingError::codec("AC coefficient index out of range"));
            }
            let value = category_decode(size, reader.read_bits(size));
            block[ZIGZAG[k]] = to_coefficient(value << scan.al)?;
        } else if run == 15 {
            k += 15;
        } else {
            *eob_run = 1 << run;
            if run > 0 {
                *eob_run += reader.read_bits(run);
            }
            *eob_run -= 1;
            break;
        }
        k += 1;
    }
    Ok(())
}

/// Successive approximation refinement of AC terms (T.81 G.1.2.3).
fn decode_ac_refine(
    reader: &mut BitReader<'_>,
    ac: &HuffmanDecoder,
    scan: &ScanHeader,
    eob_run: &mut u32,
    block: &mut Block,
) -> ProcessingResult<()> {
    let p1: i16 = 1 << scan.al;
    let m1: i16 = -1 << scan.al;
    let mut k = scan.ss;

    if *eob_run == 0 {
        while k <= scan.se {
            let symbol = ac.decode(reader)?;
            let mut run = i32::from(symbol >> 4);
            let size = symbol & 0x0F;
            let mut value: i16 = 0;

            if size != 0 {
                if size != 1 {
                    return Err(ProcessingError::codec("Invalid refinement magnitude"));
                }
                value = if reader.read_bit() == 1 { p1 } else { m1 };
            } else if run != 15 {
                *eob_run = 1 << run;
                if run > 0 {
                    *eob_run += reader.read_bits(run as u8);
                }
                break;
            }

            while k <= scan.se {
                let coefficient = &mut block[ZIGZAG[k]];
                if *coefficient != 0 {
                    refine(reader, coefficient, p1, m1)?;
                } else {
                    run -= 1;
                    if run < 0 {
                        break;
                    }
                }
                k += 1;
            }

            if value != 0 {
                if k > scan.se {
                    return Err(ProcessingError::codec("AC coefficient index out of range"));
                }
                block[ZIGZAG[k]] = value;
            }
            k += 1;
        }
    }

    if *eob_run > 0 {
        while k <= scan.se {
            let coefficient = &mut block[ZIGZAG[k]];
            if *coefficient != 0 {
                refine(reader, coefficient, p1, m1)?;
            }
            k += 1;
        }
        *eob_run -= 1;
    }
    Ok(())
}

fn refine(
    reader: &mut BitReader<'_>,
    coefficient: &mut i16,
    p1: i16,
    m1: i16,
) -> ProcessingResult<()> {
    if reader.read_bit() == 1 && (*coefficient & p1) == 0 {
        let step = if *coefficient >= 0 { p1 } else { m1 };
        *coefficient = coefficient
            .checked_add(step)
            .ok_or_else(|| ProcessingError::codec("DCT coefficient out of range"))?;
    }
    Ok(())
}
