//! In-memory DCT coefficient model of a JPEG image.

use straighten_core::{ProcessingError, ProcessingResult};

/// One 8x8 block of quantized coefficients in natural (row-major) order:
/// index `v * 8 + u`, where `v` is the vertical frequency.
pub type Block = [i16; 64];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentInfo {
    pub id: u8,
    pub h_samp: u8,
    pub v_samp: u8,
    pub quant_slot: u8,
}

/// Quantization table in natural order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantTable {
    pub values: [u16; 64],
}

impl QuantTable {
    /// True when every entry fits the 8-bit DQT precision.
    pub fn is_8bit(&self) -> bool {
        self.values.iter().all(|&q| q <= 0xFF)
    }
}

/// Frame parameters from the SOF segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub marker: u8,
    pub precision: u8,
    pub width: u16,
    pub height: u16,
    pub components: Vec<ComponentInfo>,
}

impl FrameHeader {
    pub fn progressive(&self) -> bool {
        self.marker == super::markers::SOF2
    }

    pub fn max_h_samp(&self) -> u8 {
        self.components.iter().map(|c| c.h_samp).max().unwrap_or(1)
    }

    pub fn max_v_samp(&self) -> u8 {
        self.components.iter().map(|c| c.v_samp).max().unwrap_or(1)
    }

    /// iMCU size in pixels. A single-component frame is always coded one
    /// block at a time, whatever sampling factors it declares.
    pub fn mcu_size(&self) -> (u32, u32) {
        if self.components.len() == 1 {
            return (8, 8);
        }
        (
            u32::from(self.max_h_samp()) * 8,
            u32::from(self.max_v_samp()) * 8,
        )
    }

    /// MCU columns and rows for an interleaved scan.
    pub fn mcus(&self) -> (usize, usize) {
        let (mcu_w, mcu_h) = self.mcu_size();
        (
            div_ceil(u32::from(self.width), mcu_w) as usize,
            div_ceil(u32::from(self.height), mcu_h) as usize,
        )
    }

    /// Blocks covering the component's own sample grid, as a
    /// single-component scan walks them.
    pub fn component_blocks(&self, component: &ComponentInfo) -> (usize, usize) {
        let samples_w = div_ceil(
            u32::from(self.width) * u32::from(component.h_samp),
            u32::from(self.max_h_samp()),
        );
        let samples_h = div_ceil(
            u32::from(self.height) * u32::from(component.v_samp),
            u32::from(self.max_v_samp()),
        );
        (div_ceil(samples_w, 8) as usize, div_ceil(samples_h, 8) as usize)
    }

    /// Size of the stored plane for `component`: whole MCUs for interleaved
    /// frames, the component's own block grid otherwise.
    pub fn plane_blocks(&self, component: &ComponentInfo) -> (usize, usize) {
        if self.components.len() == 1 {
            return self.component_blocks(component);
        }
        let (mcus_x, mcus_y) = self.mcus();
        (
            mcus_x * usize::from(component.h_samp),
            mcus_y * usize::from(component.v_samp),
        )
    }

    /// Bytes of coefficient storage the decoded image will occupy.
    pub fn coefficient_bytes(&self) -> u64 {
        self.components
            .iter()
            .map(|c| {
                let (w, h) = self.plane_blocks(c);
                w as u64 * h as u64 * std::mem::size_of::<Block>() as u64
            })
            .sum()
    }

    /// Fail before allocation when the planes would exceed `limit` bytes.
    pub fn check_memory(&self, limit: u64) -> ProcessingResult<()> {
        let needed = self.coefficient_bytes();
        if needed > limit {
            return Err(ProcessingError::codec(format!(
                "{}x{} image needs {} bytes of coefficient storage, limit is {}",
                self.width, self.height, needed, limit
            )));
        }
        Ok(())
    }

    /// Fail unless both dimensions are whole multiples of the iMCU size.
    pub fn check_mcu_aligned(&self) -> ProcessingResult<()> {
        let (block_width, block_height) = self.mcu_size();
        if u32::from(self.width) % block_width != 0 || u32::from(self.height) % block_height != 0 {
            return Err(ProcessingError::Geometry {
                width: u32::from(self.width),
                height: u32::from(self.height),
                block_width,
                block_height,
            });
        }
        Ok(())
    }
}

fn div_ceil(value: u32, divisor: u32) -> u32 {
    (value + divisor - 1) / divisor
}

/// Row-major grid of blocks for one component, padded out to whole MCUs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoefficientPlane {
    width_in_blocks: usize,
    height_in_blocks: usize,
    blocks: Vec<Block>,
}

impl CoefficientPlane {
    pub fn new(width_in_blocks: usize, height_in_blocks: usize) -> Self {
        Self {
            width_in_blocks,
            height_in_blocks,
            blocks: vec![[0; 64]; width_in_blocks * height_in_blocks],
        }
    }

    pub fn width_in_blocks(&self) -> usize {
        self.width_in_blocks
    }

    pub fn height_in_blocks(&self) -> usize {
        self.height_in_blocks
    }

    pub fn block(&self, bx: usize, by: usize) -> &Block {
        &self.blocks[by * self.width_in_blocks + bx]
    }

    pub fn block_mut(&mut self, bx: usize, by: usize) -> &mut Block {
        &mut self.blocks[by * self.width_in_blocks + bx]
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.blocks
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn swap_blocks(&mut self, a: (usize, usize), b: (usize, usize)) {
        let a = a.1 * self.width_in_blocks + a.0;
        let b = b.1 * self.width_in_blocks + b.0;
        self.blocks.swap(a, b);
    }
}

/// An APPn or COM segment kept for re-emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedMarker {
    pub marker: u8,
    /// Payload without the length field.
    pub data: Vec<u8>,
}

/// Everything needed to write the image back out without touching pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoefficientImage {
    pub frame: FrameHeader,
    /// Tables indexed by slot, latched when first used by a scan.
    pub quant_tables: [Option<QuantTable>; 4],
    /// One plane per frame component, in frame order.
    pub planes: Vec<CoefficientPlane>,
    pub markers: Vec<SavedMarker>,
}

impl CoefficientImage {
    pub fn width(&self) -> u32 {
        u32::from(self.frame.width)
    }

    pub fn height(&self) -> u32 {
        u32::from(self.frame.height)
    }

    pub fn total_blocks(&self) -> usize {
        self.planes.iter().map(CoefficientPlane::block_count).sum()
    }

    pub fn quant_table(&self, component: &ComponentInfo) -> ProcessingResult<&QuantTable> {
        self.quant_tables
            .get(usize::from(component.quant_slot))
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                ProcessingError::codec(format!(
                    "Component {} references undefined quantization table {}",
                    component.id, component.quant_slot
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use straighten_core::ErrorKind;

    fn frame(width: u16, height: u16, samples: &[(u8, u8)]) -> FrameHeader {
        FrameHeader {
            marker: super::super::markers::SOF0,
            precision: 8,
            width,
            height,
            components: samples
                .iter()
                .enumerate()
                .map(|(i, &(h, v))| ComponentInfo {
                    id: i as u8 + 1,
                    h_samp: h,
                    v_samp: v,
                    quant_slot: 0,
                })
                .collect(),
        }
    }

    #[test]
    fn test_mcu_geometry_420() {
        let header = frame(33, 16, &[(2, 2), (1, 1), (1, 1)]);
        assert_eq!(header.mcu_size(), (16, 16));
        assert_eq!(header.mcus(), (3, 1));
        assert_eq!(header.component_blocks(&header.components[0]), (5, 2));
        assert_eq!(header.component_blocks(&header.components[1]), (3, 1));
    }

    #[test]
    fn test_alignment_check() {
        assert!(frame(32, 16, &[(2, 2), (1, 1), (1, 1)])
            .check_mcu_aligned()
            .is_ok());

        let err = frame(33, 16, &[(2, 2), (1, 1), (1, 1)])
            .check_mcu_aligned()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Geometry);
        assert!(err.to_string().contains("16x16"));
    }

    #[test]
    fn test_grayscale_needs_8px_alignment() {
        assert!(frame(24, 8, &[(1, 1)]).check_mcu_aligned().is_ok());
        assert!(frame(20, 8, &[(1, 1)]).check_mcu_aligned().is_err());
    }

    #[test]
    fn test_single_component_ignores_declared_sampling() {
        let header = frame(24, 8, &[(2, 2)]);
        assert_eq!(header.mcu_size(), (8, 8));
        assert!(header.check_mcu_aligned().is_ok());
        assert_eq!(header.plane_blocks(&header.components[0]), (3, 1));
    }

    #[test]
    fn test_plane_blocks_cover_whole_mcus() {
        let header = frame(33, 16, &[(2, 2), (1, 1), (1, 1)]);
        assert_eq!(header.plane_blocks(&header.components[0]), (6, 2));
        assert_eq!(header.plane_blocks(&header.components[2]), (3, 1));
        assert_eq!(header.coefficient_bytes(), (12 + 3 + 3) * 128);
    }

    #[test]
    fn test_memory_check_rejects_huge_frame() {
        let header = frame(65528, 65528, &[(1, 1), (1, 1), (1, 1)]);
        let err = header.check_memory(1024 * 1024 * 1024).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Codec);
        assert!(frame(64, 64, &[(1, 1)]).check_memory(8 * 8 * 128).is_ok());
        assert!(frame(64, 64, &[(1, 1)]).check_memory(8 * 8 * 128 - 1).is_err());
    }

    #[test]
    fn test_plane_swap() {
        let mut plane = CoefficientPlane::new(2, 1);
        plane.block_mut(0, 0)[0] = 5;
        plane.swap_blocks((0, 0), (1, 0));
        assert_eq!(plane.block(1, 0)[0], 5);
        assert_eq!(plane.block(0, 0)[0], 0);
    }
}
