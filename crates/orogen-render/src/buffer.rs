//! Materialized height tiles.
//!
//! A [`HeightBuffer`] holds the values of one slot over one rectangle of map
//! space. Buffers address cells in absolute map coordinates so a step can
//! read its inputs without knowing which tile of the map it is producing.

use orogen_foundation::{Height, Rect};

/// A row-major block of height values covering exactly `rect`.
///
/// Cell access uses absolute map coordinates; the buffer translates them to
/// its local storage. Reading a cell outside `rect` is a renderer bug and
/// panics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeightBuffer {
    rect: Rect,
    cells: Vec<Height>,
}

impl HeightBuffer {
    /// A zero-area buffer, used as the placeholder argument for steps that
    /// require no input region (e.g. a fill overwriting its whole input).
    pub fn empty() -> Self {
        Self {
            rect: Rect::EMPTY,
            cells: Vec::new(),
        }
    }

    /// Allocate a buffer covering `rect` with every cell set to `value`.
    pub fn filled(rect: Rect, value: Height) -> Self {
        Self {
            rect,
            cells: vec![value; rect.size.area() as usize],
        }
    }

    /// Allocate a zero-filled buffer covering `rect`.
    pub fn zeroed(rect: Rect) -> Self {
        Self::filled(rect, 0)
    }

    /// The region of map space this buffer covers.
    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn is_empty(&self) -> bool {
        self.rect.is_empty()
    }

    fn index_of(&self, x: i32, y: i32) -> usize {
        assert!(
            self.rect.contains(x, y),
            "cell ({x}, {y}) outside buffer region {}",
            self.rect
        );
        let local_x = (x - self.rect.origin.x) as usize;
        let local_y = (y - self.rect.origin.y) as usize;
        local_y * self.rect.size.width as usize + local_x
    }

    /// Read the cell at absolute map coordinates.
    pub fn get(&self, x: i32, y: i32) -> Height {
        self.cells[self.index_of(x, y)]
    }

    /// Write the cell at absolute map coordinates.
    pub fn set(&mut self, x: i32, y: i32, value: Height) {
        let index = self.index_of(x, y);
        self.cells[index] = value;
    }

    /// Raw row-major cell storage.
    pub fn as_slice(&self) -> &[Height] {
        &self.cells
    }

    /// Copy out the sub-region `target`, which must lie inside this buffer.
    pub fn crop(&self, target: Rect) -> HeightBuffer {
        assert!(
            self.rect.contains_rect(target),
            "crop target {target} outside buffer region {}",
            self.rect
        );
        let mut out = HeightBuffer::zeroed(target);
        out.blit(self);
        out
    }

    /// Copy every cell of `src` that falls inside this buffer's region.
    ///
    /// Used to stitch per-tile results into a whole-map assembly buffer.
    pub fn blit(&mut self, src: &HeightBuffer) {
        let overlap = self.rect.intersect(src.rect);
        if overlap.is_empty() {
            return;
        }
        for y in overlap.origin.y..overlap.bottom() as i32 {
            let src_start = src.index_of(overlap.origin.x, y);
            let dst_start = self.index_of(overlap.origin.x, y);
            let width = overlap.size.width as usize;
            self.cells[dst_start..dst_start + width]
                .copy_from_slice(&src.cells[src_start..src_start + width]);
        }
    }
}
