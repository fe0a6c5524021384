//! Entropy-coded segment bit reader and writer.
//!
//! Both sides handle 0xFF byte stuffing. The reader stops at the first real
//! marker and feeds zero bits from then on, leaving the marker for the caller.

use std::io::{self, Write};

use straighten_core::{ProcessingError, ProcessingResult};

use super::markers::{is_restart, MARKER_PREFIX};

pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    acc: u32,
    bits: u8,
    hit_marker: bool,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            acc: 0,
            bits: 0,
            hit_marker: false,
        }
    }

    fn next_byte(&mut self) -> u8 {
        if self.hit_marker {
            return 0;
        }
        let Some(&byte) = self.data.get(self.pos) else {
            self.hit_marker = true;
            return 0;
        };
        if byte != MARKER_PREFIX {
            self.pos += 1;
            return byte;
        }
        if self.data.get(self.pos + 1) == Some(&0x00) {
            self.pos += 2;
            MARKER_PREFIX
        } else {
            self.hit_marker = true;
            0
        }
    }

    /// Read `count` bits, MSB first. `count` must be at most 16.
    pub fn read_bits(&mut self, count: u8) -> u32 {
        if count == 0 {
            return 0;
        }
        while self.bits < count {
            self.acc = (self.acc << 8) | u32::from(self.next_byte());
            self.bits += 8;
        }
        self.bits -= count;
        (self.acc >> self.bits) & ((1u32 << count) - 1)
    }

    pub fn read_bit(&mut self) -> u32 {
        self.read_bits(1)
    }

    /// Drop any buffered bits and consume the RSTn marker that must follow.
    pub fn restart(&mut self) -> ProcessingResult<()> {
        self.acc = 0;
        self.bits = 0;

        let mut pos = self.pos;
        while self.data.get(pos) == Some(&MARKER_PREFIX)
            && self.data.get(pos + 1) == Some(&MARKER_PREFIX)
        {
            pos += 1;
        }
        match (self.data.get(pos), self.data.get(pos + 1)) {
            (Some(&MARKER_PREFIX), Some(&marker)) if is_restart(marker) => {
                self.pos = pos + 2;
                self.hit_marker = false;
                Ok(())
            }
            _ => Err(ProcessingError::codec(format!(
                "Expected restart marker at offset {}",
                pos
            ))),
        }
    }
}

/// MSB-first bit sink with 0xFF stuffing.
pub struct BitWriter<W: Write> {
    inner: W,
    acc: u32,
    bits: u8,
}

impl<W: Write> BitWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            acc: 0,
            bits: 0,
        }
    }

    /// Append the low `count` bits of `value`. `count` must be at most 16.
    pub fn write_bits(&mut self, value: u32, count: u8) -> io::Result<()> {
        if count == 0 {
            return Ok(());
        }
        let mask = (1u32 << count) - 1;
        self.acc = (self.acc << count) | (value & mask);
        self.bits += count;

        while self.bits >= 8 {
            self.bits -= 8;
            let byte = (self.acc >> self.bits) as u8;
            self.emit(byte)?;
        }
        self.acc &= (1u32 << self.bits) - 1;
        Ok(())
    }

    fn emit(&mut self, byte: u8) -> io::Result<()> {
        if byte == MARKER_PREFIX {
            self.inner.write_all(&[MARKER_PREFIX, 0x00])
        } else {
            self.inner.write_all(&[byte])
        }
    }

    /// Pad the last partial byte with one bits and hand back the sink.
    pub fn finish(mut self) -> io::Result<W> {
        if self.bits > 0 {
            let pad = 8 - self.bits;
            self.write_bits((1u32 << pad) - 1, pad)?;
        }
        Ok(self.inner)
    }
}
