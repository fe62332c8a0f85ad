//! Forward graph evaluation.
//!
//! The renderer walks the step list in construction order, materializes each
//! step's propagated region, and releases argument buffers the moment their
//! last consumer has run. Tiled rendering repeats that pass per tile and
//! stitches the cropped results into whole-map assembly buffers, so peak
//! slot memory follows tile size, not map size.

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, trace};

use orogen_foundation::{Point, Rect, Size2D};

use crate::bounds::propagate_bounds;
use crate::buffer::HeightBuffer;
use crate::graph::StepGraph;

/// The host cancelled rendering between steps.
///
/// Cancellation is cooperative: the renderer polls between steps, never
/// mid-step, and the partially filled slot table is simply discarded - no
/// rollback is needed because nothing has been delivered yet.
#[derive(Debug, Error)]
#[error("rendering cancelled by host")]
pub struct Cancelled;

/// Receives progress updates as steps complete.
///
/// Invoked synchronously from inside rendering, once per (step, tile) in
/// deterministic graph order. `current` never exceeds `max` and `max` is
/// stable for the duration of one generation run.
pub trait ProgressSink {
    fn progress(&mut self, current: u32, max: u32);

    /// Polled between steps; returning `true` aborts the rendering pass.
    fn cancel_requested(&self) -> bool {
        false
    }
}

/// Progress sink that discards updates.
#[derive(Debug, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn progress(&mut self, _current: u32, _max: u32) {}
}

/// Evaluates step graphs into named height buffers.
#[derive(Debug, Default)]
pub struct Renderer;

/// Peak memory accounting for one rendering pass, in live slot cells.
#[derive(Debug, Clone, Copy, Default)]
struct RenderStats {
    live_cells: u64,
    peak_cells: u64,
    evaluated: u32,
    skipped: u32,
}

impl Renderer {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate the whole map in a single pass.
    pub fn render(
        &self,
        graph: &StepGraph,
        progress: &mut dyn ProgressSink,
    ) -> Result<IndexMap<String, HeightBuffer>, Cancelled> {
        let domain = graph.domain();
        let steps = graph.steps().len() as u32;
        let mut completed = 0;
        self.render_region(graph, domain, progress, &mut completed, steps)
    }

    /// Evaluate the map tile by tile and stitch the results.
    ///
    /// Observationally equivalent to [`Renderer::render`]: every output
    /// buffer is bit-identical. Only the peak memory of intermediate slots
    /// differs.
    pub fn render_tiled(
        &self,
        graph: &StepGraph,
        tile_size: Size2D,
        progress: &mut dyn ProgressSink,
    ) -> Result<IndexMap<String, HeightBuffer>, Cancelled> {
        assert!(
            !tile_size.is_empty(),
            "tile size must be non-empty, got {tile_size}"
        );
        let domain = graph.domain();
        let tiles = tile_rects(domain, tile_size);
        let max = graph.steps().len() as u32 * tiles.len() as u32;
        let mut completed = 0;

        let mut assembled: IndexMap<String, HeightBuffer> = graph
            .outputs()
            .keys()
            .map(|name| (name.clone(), HeightBuffer::zeroed(domain)))
            .collect();

        for tile in tiles {
            let outputs = self.render_region(graph, tile, progress, &mut completed, max)?;
            for (name, buffer) in outputs {
                assembled
                    .get_mut(&name)
                    .expect("tile produced an unknown output")
                    .blit(&buffer);
            }
        }
        Ok(assembled)
    }

    /// One bounded evaluation pass producing `region` for every output.
    fn render_region(
        &self,
        graph: &StepGraph,
        region: Rect,
        progress: &mut dyn ProgressSink,
        completed: &mut u32,
        max: u32,
    ) -> Result<IndexMap<String, HeightBuffer>, Cancelled> {
        let domain = graph.domain();
        let bounds = propagate_bounds(graph, region);

        // Remaining-consumer counts, computed once from the graph structure.
        // Only (step, argument) pairs that will actually read a region count;
        // named outputs hold their slot alive until cropped at the end.
        let mut remaining = vec![0u32; graph.slot_count()];
        for step in graph.steps() {
            let needed = bounds.get(step.ret);
            if needed.is_empty() {
                continue;
            }
            for (arg, rect) in step.args.iter().zip(step.kind.input_bounds(needed, domain)) {
                if !rect.is_empty() {
                    remaining[arg.index()] += 1;
                }
            }
        }
        for slot in graph.outputs().values() {
            remaining[slot.index()] += 1;
        }

        let mut slots: Vec<Option<HeightBuffer>> = vec![None; graph.slot_count()];
        let mut stats = RenderStats::default();
        let placeholder = HeightBuffer::empty();

        for step in graph.steps() {
            if progress.cancel_requested() {
                debug!(region = %region, completed, "rendering cancelled");
                return Err(Cancelled);
            }
            let needed = bounds.get(step.ret);
            if needed.is_empty() {
                stats.skipped += 1;
                *completed += 1;
                progress.progress(*completed, max);
                continue;
            }

            let arg_bounds = step.kind.input_bounds(needed, domain);
            let args: Vec<&HeightBuffer> = step
                .args
                .iter()
                .zip(&arg_bounds)
                .map(|(slot, rect)| {
                    if rect.is_empty() {
                        &placeholder
                    } else {
                        slots[slot.index()]
                            .as_ref()
                            .expect("argument slot not materialized before use")
                    }
                })
                .collect();

            trace!(step = step.kind.name(), region = %needed, "evaluating step");
            let buffer = step.kind.evaluate(needed, domain, &args);

            stats.live_cells += needed.size.area();
            stats.peak_cells = stats.peak_cells.max(stats.live_cells);
            stats.evaluated += 1;
            slots[step.ret.index()] = Some(buffer);

            for (slot, rect) in step.args.iter().zip(&arg_bounds) {
                if rect.is_empty() {
                    continue;
                }
                remaining[slot.index()] -= 1;
                if remaining[slot.index()] == 0 {
                    if let Some(released) = slots[slot.index()].take() {
                        stats.live_cells -= released.rect().size.area();
                    }
                }
            }

            *completed += 1;
            progress.progress(*completed, max);
        }

        let mut outputs = IndexMap::new();
        for (name, slot) in graph.outputs() {
            let buffer = slots[slot.index()]
                .as_ref()
                .expect("output slot not materialized");
            outputs.insert(name.clone(), buffer.crop(region.intersect(domain)));
        }

        debug!(
            region = %region,
            evaluated = stats.evaluated,
            skipped = stats.skipped,
            peak_cells = stats.peak_cells,
            "rendering pass complete"
        );
        Ok(outputs)
    }
}

/// Split `domain` into row-major tiles of at most `tile_size`.
fn tile_rects(domain: Rect, tile_size: Size2D) -> Vec<Rect> {
    let mut tiles = Vec::new();
    let mut y = domain.origin.y;
    while (y as i64) < domain.bottom() {
        let h = tile_size.height.min((domain.bottom() - y as i64) as u32);
        let mut x = domain.origin.x;
        while (x as i64) < domain.right() {
            let w = tile_size.width.min((domain.right() - x as i64) as u32);
            tiles.push(Rect::new(Point::new(x, y), Size2D::new(w, h)));
            x += w as i32;
        }
        y += h as i32;
    }
    tiles
}
