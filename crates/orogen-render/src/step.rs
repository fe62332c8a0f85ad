//! The closed set of rendering operations.
//!
//! Step kinds are **data, not behavior hierarchies**: one enum variant per
//! operation, dispatched by matching. Each kind answers two questions:
//!
//! 1. Given a requested output region, which region(s) of my inputs do I
//!    need? ([`StepKind::input_bounds`] - the backward contract)
//! 2. Given materialized inputs, produce the requested region.
//!    ([`StepKind::evaluate`] - the forward contract)
//!
//! The two contracts must agree: evaluating over the propagated input bounds
//! and cropping to the request has to be bit-identical to evaluating over
//! the whole map. Every kind with spatial reach therefore declares its exact
//! reach (`max_distance`, `radius`) and clips to the map domain the same way
//! in both directions.

use serde::{Deserialize, Serialize};

use orogen_foundation::{clamp_height, Direction, Height, Point, Rect};

use crate::buffer::HeightBuffer;

/// One deferred rendering operation, with its parameters.
///
/// Argument arity is fixed per variant; the graph validates it when a step
/// is appended. Parameters are frozen at graph-construction time, including
/// the noise salt, so evaluation depends only on the graph and the requested
/// region - never on tiling or scheduling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepKind {
    /// Create a map with every cell set to `height`.
    Flat {
        height: Height,
    },
    /// Overwrite every cell of the input map with `height`.
    ///
    /// Requires no input region: the output is independent of the input's
    /// values, the argument only ties the step into the graph's ordering.
    Fill {
        height: Height,
    },
    /// Create a radial ramp: `from` at `center`, `to` at `radius` and beyond.
    RadialGradient {
        center: Point,
        radius: u32,
        from: Height,
        to: Height,
    },
    /// Create a linear ramp across the whole map along `direction`.
    LinearGradient {
        direction: Direction,
        from: Height,
        to: Height,
    },
    /// Chebyshev distance to the nearest input cell with height <= 0,
    /// clamped to `max_distance`.
    DistanceMap {
        max_distance: u32,
    },
    /// Box blur with window radius `radius` and edge clamping.
    Blur {
        radius: u32,
    },
    /// Saturating per-cell sum of two maps.
    Add,
    /// Deterministic per-cell hash noise in `[-amplitude, amplitude]`.
    ///
    /// `salt` is drawn from the generator's seeded stream when the step is
    /// built; two runs with the same seed produce the same noise no matter
    /// how the map is tiled.
    Noise {
        amplitude: Height,
        salt: u64,
    },
}

impl StepKind {
    /// Step name used in diagnostics and serialized graph dumps.
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Flat { .. } => "HeightMap.Flat",
            StepKind::Fill { .. } => "HeightMap.Fill",
            StepKind::RadialGradient { .. } => "HeightMap.RadialGradient",
            StepKind::LinearGradient { .. } => "HeightMap.LinearGradient",
            StepKind::DistanceMap { .. } => "HeightMap.DistanceMap",
            StepKind::Blur { .. } => "HeightMap.Blur",
            StepKind::Add => "HeightMap.Add",
            StepKind::Noise { .. } => "HeightMap.Noise",
        }
    }

    /// Number of argument slots this kind consumes.
    pub fn arg_count(&self) -> usize {
        match self {
            StepKind::Flat { .. }
            | StepKind::RadialGradient { .. }
            | StepKind::LinearGradient { .. }
            | StepKind::Noise { .. } => 0,
            StepKind::Fill { .. } | StepKind::DistanceMap { .. } | StepKind::Blur { .. } => 1,
            StepKind::Add => 2,
        }
    }

    /// Translate "this region is needed from my output" into the region
    /// needed from each input, clipped to the map domain.
    ///
    /// The returned vector has exactly [`StepKind::arg_count`] entries. An
    /// empty rectangle means the argument's values are not needed at all.
    /// The rule is a pure function of `requested`, which makes propagation
    /// monotone and idempotent.
    pub fn input_bounds(&self, requested: Rect, domain: Rect) -> Vec<Rect> {
        match self {
            StepKind::Flat { .. }
            | StepKind::RadialGradient { .. }
            | StepKind::LinearGradient { .. }
            | StepKind::Noise { .. } => Vec::new(),
            StepKind::Fill { .. } => vec![Rect::EMPTY],
            StepKind::DistanceMap { max_distance } => {
                vec![requested.expand(*max_distance).intersect(domain)]
            }
            StepKind::Blur { radius } => vec![requested.expand(*radius).intersect(domain)],
            StepKind::Add => vec![requested, requested],
        }
    }

    /// Produce the cells of `out`.
    ///
    /// `args` must contain one buffer per argument slot, each covering at
    /// least the region reported by [`StepKind::input_bounds`] for `out`;
    /// arguments whose required region is empty may be passed as empty
    /// buffers.
    pub fn evaluate(&self, out: Rect, domain: Rect, args: &[&HeightBuffer]) -> HeightBuffer {
        assert_eq!(
            args.len(),
            self.arg_count(),
            "step {} expects {} arguments, renderer passed {}",
            self.name(),
            self.arg_count(),
            args.len()
        );
        match self {
            StepKind::Flat { height } | StepKind::Fill { height } => {
                HeightBuffer::filled(out, *height)
            }
            StepKind::RadialGradient {
                center,
                radius,
                from,
                to,
            } => radial_gradient(out, *center, *radius, *from, *to),
            StepKind::LinearGradient {
                direction,
                from,
                to,
            } => linear_gradient(out, domain, *direction, *from, *to),
            StepKind::DistanceMap { max_distance } => distance_map(out, args[0], *max_distance),
            StepKind::Blur { radius } => blur(out, domain, args[0], *radius),
            StepKind::Add => add(out, args[0], args[1]),
            StepKind::Noise { amplitude, salt } => noise(out, *amplitude, *salt),
        }
    }
}

fn radial_gradient(out: Rect, center: Point, radius: u32, from: Height, to: Height) -> HeightBuffer {
    let mut buf = HeightBuffer::zeroed(out);
    let span = to as f64 - from as f64;
    for y in out.origin.y..out.bottom() as i32 {
        for x in out.origin.x..out.right() as i32 {
            let t = (Point::new(x, y).distance_to(center) / radius as f64).min(1.0);
            buf.set(x, y, clamp_height(from as f64 + span * t));
        }
    }
    buf
}

fn linear_gradient(
    out: Rect,
    domain: Rect,
    direction: Direction,
    from: Height,
    to: Height,
) -> HeightBuffer {
    let mut buf = HeightBuffer::zeroed(out);
    let span = to as f64 - from as f64;
    // The ramp runs over the whole map domain, not the requested tile.
    let (start, extent) = match direction {
        Direction::Horizontal => (domain.origin.x, domain.size.width),
        Direction::Vertical => (domain.origin.y, domain.size.height),
    };
    let divisor = extent.saturating_sub(1).max(1) as f64;
    for y in out.origin.y..out.bottom() as i32 {
        for x in out.origin.x..out.right() as i32 {
            let along = match direction {
                Direction::Horizontal => x - start,
                Direction::Vertical => y - start,
            };
            let t = along as f64 / divisor;
            buf.set(x, y, clamp_height(from as f64 + span * t));
        }
    }
    buf
}

/// Exact Chebyshev distance transform via a two-pass chamfer sweep.
///
/// The input buffer must cover `out` expanded by `max_distance` (clipped to
/// the domain); any source outside that window is farther than
/// `max_distance` from every output cell, so the clamp makes the window
/// exactly sufficient.
fn distance_map(out: Rect, input: &HeightBuffer, max_distance: u32) -> HeightBuffer {
    let window = input.rect();
    assert!(
        window.contains_rect(out),
        "distance-map input window {window} does not cover output {out}"
    );
    let width = window.size.width as usize;
    let height = window.size.height as usize;
    let far = u32::MAX - 1;

    let mut dist = vec![far; width * height];
    for (index, cell) in input.as_slice().iter().enumerate() {
        if *cell <= 0 {
            dist[index] = 0;
        }
    }

    // Forward pass: west, north-west, north, north-east.
    for y in 0..height {
        for x in 0..width {
            let index = y * width + x;
            let mut best = dist[index];
            if x > 0 {
                best = best.min(dist[index - 1].saturating_add(1));
            }
            if y > 0 {
                let up = (y - 1) * width + x;
                best = best.min(dist[up].saturating_add(1));
                if x > 0 {
                    best = best.min(dist[up - 1].saturating_add(1));
                }
                if x + 1 < width {
                    best = best.min(dist[up + 1].saturating_add(1));
                }
            }
            dist[index] = best;
        }
    }

    // Backward pass: east, south-east, south, south-west.
    for y in (0..height).rev() {
        for x in (0..width).rev() {
            let index = y * width + x;
            let mut best = dist[index];
            if x + 1 < width {
                best = best.min(dist[index + 1].saturating_add(1));
            }
            if y + 1 < height {
                let down = (y + 1) * width + x;
                best = best.min(dist[down].saturating_add(1));
                if x + 1 < width {
                    best = best.min(dist[down + 1].saturating_add(1));
                }
                if x > 0 {
                    best = best.min(dist[down - 1].saturating_add(1));
                }
            }
            dist[index] = best;
        }
    }

    let mut buf = HeightBuffer::zeroed(out);
    for y in out.origin.y..out.bottom() as i32 {
        for x in out.origin.x..out.right() as i32 {
            let local = (y - window.origin.y) as usize * width + (x - window.origin.x) as usize;
            let clamped = dist[local].min(max_distance);
            buf.set(x, y, clamp_height(clamped as f64));
        }
    }
    buf
}

/// Separable box blur with edge clamping.
///
/// Samples outside the map domain clamp to the nearest edge cell, so the
/// average always covers `(2r + 1)^2` samples and tile evaluation over the
/// expanded-and-clipped input bound matches whole-map evaluation exactly.
fn blur(out: Rect, domain: Rect, input: &HeightBuffer, radius: u32) -> HeightBuffer {
    let r = radius as i64;
    let clamp_x = |x: i64| -> i32 {
        x.clamp(domain.origin.x as i64, domain.right() - 1) as i32
    };
    let clamp_y = |y: i64| -> i32 {
        y.clamp(domain.origin.y as i64, domain.bottom() - 1) as i32
    };

    // Horizontal pass over the rows the vertical pass will sample.
    let row_lo = clamp_y(out.origin.y as i64 - r);
    let row_hi = clamp_y(out.bottom() - 1 + r);
    let rows = (row_hi - row_lo + 1) as usize;
    let cols = out.size.width as usize;
    let mut row_sums = vec![0i64; rows * cols];
    for (row, y) in (row_lo..=row_hi).enumerate() {
        for (col, x) in (out.origin.x..out.right() as i32).enumerate() {
            let mut sum = 0i64;
            for dx in -r..=r {
                sum += input.get(clamp_x(x as i64 + dx), y) as i64;
            }
            row_sums[row * cols + col] = sum;
        }
    }

    let window = 2 * r + 1;
    let samples = (window * window) as f64;
    let mut buf = HeightBuffer::zeroed(out);
    for y in out.origin.y..out.bottom() as i32 {
        for (col, x) in (out.origin.x..out.right() as i32).enumerate() {
            let mut total = 0i64;
            for dy in -r..=r {
                let row = (clamp_y(y as i64 + dy) - row_lo) as usize;
                total += row_sums[row * cols + col];
            }
            buf.set(x, y, clamp_height(total as f64 / samples));
        }
    }
    buf
}

fn add(out: Rect, a: &HeightBuffer, b: &HeightBuffer) -> HeightBuffer {
    let mut buf = HeightBuffer::zeroed(out);
    for y in out.origin.y..out.bottom() as i32 {
        for x in out.origin.x..out.right() as i32 {
            buf.set(x, y, a.get(x, y).saturating_add(b.get(x, y)));
        }
    }
    buf
}

fn noise(out: Rect, amplitude: Height, salt: u64) -> HeightBuffer {
    let mut buf = HeightBuffer::zeroed(out);
    let span = amplitude.max(0) as u64 * 2 + 1;
    for y in out.origin.y..out.bottom() as i32 {
        for x in out.origin.x..out.right() as i32 {
            let h = cell_hash(x, y, salt);
            let value = (h % span) as i64 - amplitude.max(0) as i64;
            buf.set(x, y, value as Height);
        }
    }
    buf
}

/// Splitmix-style finalizer over the cell position and run salt.
fn cell_hash(x: i32, y: i32, salt: u64) -> u64 {
    let mut z = salt
        ^ (x as i64 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (y as i64 as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use orogen_foundation::Size2D;

    fn rect(x: i32, y: i32, w: u32, h: u32) -> Rect {
        Rect::new(Point::new(x, y), Size2D::new(w, h))
    }

    #[test]
    fn test_fill_needs_no_input_region() {
        let kind = StepKind::Fill { height: 5 };
        let needed = kind.input_bounds(rect(0, 0, 64, 64), rect(0, 0, 64, 64));
        assert_eq!(needed, vec![Rect::EMPTY]);
    }

    #[test]
    fn test_distance_map_expands_by_reach() {
        let kind = StepKind::DistanceMap { max_distance: 8 };
        let domain = rect(0, 0, 64, 64);
        let needed = kind.input_bounds(rect(16, 16, 16, 16), domain);
        assert_eq!(needed, vec![rect(8, 8, 32, 32)]);
        // Clipped at the domain edge.
        let edge = kind.input_bounds(rect(0, 0, 16, 16), domain);
        assert_eq!(edge, vec![rect(0, 0, 24, 24)]);
    }

    #[test]
    fn test_radial_gradient_reference_values() {
        let out = rect(0, 0, 64, 64);
        let kind = StepKind::RadialGradient {
            center: Point::new(32, 32),
            radius: 32,
            from: 1000,
            to: 0,
        };
        let buf = kind.evaluate(out, out, &[]);
        assert_eq!(buf.get(32, 32), 1000);
        // Monotone non-increasing along a ray from the center.
        let mut previous = buf.get(32, 32);
        for x in 33..64 {
            let value = buf.get(x, 32);
            assert!(value <= previous, "gradient increased at x={x}");
            previous = value;
        }
        // At and beyond the radius the gradient bottoms out.
        assert_eq!(buf.get(0, 32), 0);
        assert_eq!(buf.get(32, 0), 0);
    }

    #[test]
    fn test_linear_gradient_endpoints() {
        let domain = rect(0, 0, 11, 4);
        let kind = StepKind::LinearGradient {
            direction: Direction::Horizontal,
            from: -100,
            to: 100,
        };
        let buf = kind.evaluate(domain, domain, &[]);
        assert_eq!(buf.get(0, 0), -100);
        assert_eq!(buf.get(10, 3), 100);
        assert_eq!(buf.get(5, 1), 0);
    }

    #[test]
    fn test_distance_map_values() {
        let domain = rect(0, 0, 8, 1);
        // Single source at x = 0.
        let mut input = HeightBuffer::filled(domain, 10);
        input.set(0, 0, 0);
        let kind = StepKind::DistanceMap { max_distance: 4 };
        let buf = kind.evaluate(domain, domain, &[&input]);
        assert_eq!(buf.as_slice(), &[0, 1, 2, 3, 4, 4, 4, 4]);
    }

    #[test]
    fn test_distance_map_chebyshev_metric() {
        let domain = rect(0, 0, 5, 5);
        let mut input = HeightBuffer::filled(domain, 10);
        input.set(2, 2, 0);
        let kind = StepKind::DistanceMap { max_distance: 10 };
        let buf = kind.evaluate(domain, domain, &[&input]);
        // Diagonal neighbors are distance 1 under Chebyshev.
        assert_eq!(buf.get(3, 3), 1);
        assert_eq!(buf.get(0, 0), 2);
        assert_eq!(buf.get(4, 0), 2);
    }

    #[test]
    fn test_distance_map_tiled_matches_whole() {
        let domain = rect(0, 0, 16, 16);
        let mut input = HeightBuffer::filled(domain, 100);
        input.set(3, 12, -5);
        input.set(14, 2, 0);
        let kind = StepKind::DistanceMap { max_distance: 6 };
        let whole = kind.evaluate(domain, domain, &[&input]);
        let tile = rect(8, 8, 8, 8);
        let needed = kind.input_bounds(tile, domain)[0];
        let tile_input = input.crop(needed);
        let tiled = kind.evaluate(tile, domain, &[&tile_input]);
        for y in 8..16 {
            for x in 8..16 {
                assert_eq!(tiled.get(x, y), whole.get(x, y), "mismatch at ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_blur_constant_map_is_unchanged() {
        let domain = rect(0, 0, 9, 9);
        let input = HeightBuffer::filled(domain, 123);
        let kind = StepKind::Blur { radius: 2 };
        let buf = kind.evaluate(domain, domain, &[&input]);
        assert!(buf.as_slice().iter().all(|&v| v == 123));
    }

    #[test]
    fn test_blur_tiled_matches_whole() {
        let domain = rect(0, 0, 12, 12);
        let mut input = HeightBuffer::zeroed(domain);
        input.set(5, 5, 1000);
        input.set(0, 11, -800);
        let kind = StepKind::Blur { radius: 3 };
        let whole = kind.evaluate(domain, domain, &[&input]);
        for tile in [rect(0, 0, 6, 6), rect(6, 0, 6, 6), rect(0, 6, 6, 6), rect(6, 6, 6, 6)] {
            let needed = kind.input_bounds(tile, domain)[0];
            let tiled = kind.evaluate(tile, domain, &[&input.crop(needed)]);
            for y in tile.origin.y..tile.bottom() as i32 {
                for x in tile.origin.x..tile.right() as i32 {
                    assert_eq!(tiled.get(x, y), whole.get(x, y), "mismatch at ({x}, {y})");
                }
            }
        }
    }

    #[test]
    fn test_noise_is_position_stable() {
        let kind = StepKind::Noise {
            amplitude: 50,
            salt: 0xDEAD_BEEF,
        };
        let domain = rect(0, 0, 8, 8);
        let whole = kind.evaluate(domain, domain, &[]);
        let tile = kind.evaluate(rect(4, 4, 4, 4), domain, &[]);
        for y in 4..8 {
            for x in 4..8 {
                assert_eq!(tile.get(x, y), whole.get(x, y));
            }
        }
        assert!(whole.as_slice().iter().all(|&v| v.abs() <= 50));
    }

    #[test]
    fn test_add_saturates() {
        let r = rect(0, 0, 2, 1);
        let a = HeightBuffer::filled(r, Height::MAX);
        let b = HeightBuffer::filled(r, 100);
        let buf = StepKind::Add.evaluate(r, r, &[&a, &b]);
        assert_eq!(buf.get(0, 0), Height::MAX);
    }
}
