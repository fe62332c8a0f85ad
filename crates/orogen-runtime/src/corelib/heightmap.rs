//! Native functions of the `HeightMap` type.
//!
//! Static methods construct new maps; instance methods transform the
//! receiver in place by rewriting its handle to the new step's return slot,
//! so a script variable always refers to the latest state of "its" map.
//! Geometry parameters are validated here, with errors attributed to the
//! calling instruction; the emitted steps themselves can then assume valid
//! parameters.

use rand::Rng;

use orogen_foundation::{clamp_height, CodeLocation, Direction, Point};
use orogen_render::StepKind;

use crate::context::RunContext;
use crate::dispatch::{MethodKind, NativeFunctionDefinition, TypeDefinition};
use crate::error::{ScriptError, ScriptErrorKind, ScriptResult};
use crate::heap::{ObjectId, ObjectPayload};

use super::{check_arity, expect_integer, expect_map_slot, expect_number, expect_string};

/// Register the `HeightMap` method table.
pub fn install(def: &mut TypeDefinition) {
    let statics: &[(&'static str, crate::dispatch::NativeFn)] = &[
        ("Flat", flat),
        ("RadialGradient", radial_gradient),
        ("LinearGradient", linear_gradient),
        ("Noise", noise),
    ];
    for &(name, func) in statics {
        def.add_method(NativeFunctionDefinition {
            name,
            kind: MethodKind::Static,
            func,
        });
    }

    let instance: &[(&'static str, crate::dispatch::NativeFn)] = &[
        ("Fill", fill),
        ("DistanceMap", distance_map),
        ("Blur", blur),
        ("Add", add),
        ("ReturnAs", return_as),
    ];
    for &(name, func) in instance {
        def.add_method(NativeFunctionDefinition {
            name,
            kind: MethodKind::Instance,
            func,
        });
    }
}

fn invalid_geometry(message: impl Into<String>, location: CodeLocation) -> ScriptError {
    ScriptError::new(
        ScriptErrorKind::InvalidGeometry {
            message: message.into(),
        },
        location,
    )
}

/// Decode an integer argument into a coordinate.
fn expect_coord(
    ctx: &RunContext,
    id: ObjectId,
    what: &str,
    location: CodeLocation,
) -> ScriptResult<i32> {
    let value = expect_integer(ctx, id, location)?;
    i32::try_from(value).map_err(|_| invalid_geometry(format!("{what} {value} out of range"), location))
}

/// Decode an integer argument into a non-negative extent.
fn expect_extent(
    ctx: &RunContext,
    id: ObjectId,
    what: &str,
    location: CodeLocation,
) -> ScriptResult<u32> {
    let value = expect_integer(ctx, id, location)?;
    u32::try_from(value)
        .map_err(|_| invalid_geometry(format!("{what} must be non-negative, got {value}"), location))
}

/// Rewrite an instance handle to point at a new return slot.
fn rebind(ctx: &mut RunContext, receiver: ObjectId, slot: orogen_render::SlotIndex) {
    ctx.heap.get_mut(receiver).payload = ObjectPayload::HeightMap(slot);
}

/// `HeightMap.Flat(height)` - a new map filled with a constant.
fn flat(
    ctx: &mut RunContext,
    location: CodeLocation,
    _instance: Option<ObjectId>,
    args: &[ObjectId],
) -> ScriptResult<ObjectId> {
    check_arity("HeightMap.Flat", 1, args, location)?;
    let height = clamp_height(expect_number(ctx, args[0], location)?);
    let slot = ctx.add_map_step("HeightMap.Flat", StepKind::Flat { height }, vec![], location)?;
    Ok(ctx.heap.height_map(slot))
}

/// `HeightMap.RadialGradient(cx, cy, radius, from, to)` - a radial ramp.
fn radial_gradient(
    ctx: &mut RunContext,
    location: CodeLocation,
    _instance: Option<ObjectId>,
    args: &[ObjectId],
) -> ScriptResult<ObjectId> {
    check_arity("HeightMap.RadialGradient", 5, args, location)?;
    let cx = expect_coord(ctx, args[0], "center x", location)?;
    let cy = expect_coord(ctx, args[1], "center y", location)?;
    let radius = expect_extent(ctx, args[2], "radius", location)?;
    if radius == 0 {
        return Err(invalid_geometry("radius must be positive", location));
    }
    let from = clamp_height(expect_number(ctx, args[3], location)?);
    let to = clamp_height(expect_number(ctx, args[4], location)?);
    let slot = ctx.add_map_step(
        "HeightMap.RadialGradient",
        StepKind::RadialGradient {
            center: Point::new(cx, cy),
            radius,
            from,
            to,
        },
        vec![],
        location,
    )?;
    Ok(ctx.heap.height_map(slot))
}

/// `HeightMap.LinearGradient(direction, from, to)` - a linear ramp across
/// the map. `direction` is `"horizontal"` or `"vertical"`.
fn linear_gradient(
    ctx: &mut RunContext,
    location: CodeLocation,
    _instance: Option<ObjectId>,
    args: &[ObjectId],
) -> ScriptResult<ObjectId> {
    check_arity("HeightMap.LinearGradient", 3, args, location)?;
    let direction = match expect_string(ctx, args[0], location)?.as_str() {
        "horizontal" => Direction::Horizontal,
        "vertical" => Direction::Vertical,
        other => {
            return Err(invalid_geometry(
                format!("direction must be \"horizontal\" or \"vertical\", got {other:?}"),
                location,
            ))
        }
    };
    let from = clamp_height(expect_number(ctx, args[1], location)?);
    let to = clamp_height(expect_number(ctx, args[2], location)?);
    let slot = ctx.add_map_step(
        "HeightMap.LinearGradient",
        StepKind::LinearGradient {
            direction,
            from,
            to,
        },
        vec![],
        location,
    )?;
    Ok(ctx.heap.height_map(slot))
}

/// `HeightMap.Noise(amplitude)` - seeded per-cell noise.
fn noise(
    ctx: &mut RunContext,
    location: CodeLocation,
    _instance: Option<ObjectId>,
    args: &[ObjectId],
) -> ScriptResult<ObjectId> {
    check_arity("HeightMap.Noise", 1, args, location)?;
    let amplitude = expect_number(ctx, args[0], location)?;
    if amplitude < 0.0 {
        return Err(invalid_geometry(
            format!("amplitude must be non-negative, got {amplitude}"),
            location,
        ));
    }
    let amplitude = clamp_height(amplitude);
    // The salt is fixed now, from the run's seeded stream; rendering later
    // (and tiled) cannot change it.
    let salt = ctx.rng.gen();
    let slot = ctx.add_map_step(
        "HeightMap.Noise",
        StepKind::Noise { amplitude, salt },
        vec![],
        location,
    )?;
    Ok(ctx.heap.height_map(slot))
}

/// `map.Fill(height)` - overwrite the whole map with a constant.
fn fill(
    ctx: &mut RunContext,
    location: CodeLocation,
    instance: Option<ObjectId>,
    args: &[ObjectId],
) -> ScriptResult<ObjectId> {
    check_arity("HeightMap.Fill", 1, args, location)?;
    let receiver = instance.expect("instance method without receiver");
    let input = expect_map_slot(ctx, receiver, location)?;
    let height = clamp_height(expect_number(ctx, args[0], location)?);
    let slot = ctx.add_map_step(
        "HeightMap.Fill",
        StepKind::Fill { height },
        vec![input],
        location,
    )?;
    rebind(ctx, receiver, slot);
    Ok(ctx.heap.null())
}

/// `map.DistanceMap(maxDistance)` - distance to the nearest sea-level cell.
fn distance_map(
    ctx: &mut RunContext,
    location: CodeLocation,
    instance: Option<ObjectId>,
    args: &[ObjectId],
) -> ScriptResult<ObjectId> {
    check_arity("HeightMap.DistanceMap", 1, args, location)?;
    let receiver = instance.expect("instance method without receiver");
    let input = expect_map_slot(ctx, receiver, location)?;
    let max_distance = expect_extent(ctx, args[0], "max distance", location)?;
    let slot = ctx.add_map_step(
        "HeightMap.DistanceMap",
        StepKind::DistanceMap { max_distance },
        vec![input],
        location,
    )?;
    rebind(ctx, receiver, slot);
    Ok(ctx.heap.null())
}

/// `map.Blur(radius)` - box blur.
fn blur(
    ctx: &mut RunContext,
    location: CodeLocation,
    instance: Option<ObjectId>,
    args: &[ObjectId],
) -> ScriptResult<ObjectId> {
    check_arity("HeightMap.Blur", 1, args, location)?;
    let receiver = instance.expect("instance method without receiver");
    let input = expect_map_slot(ctx, receiver, location)?;
    let radius = expect_extent(ctx, args[0], "radius", location)?;
    let slot = ctx.add_map_step(
        "HeightMap.Blur",
        StepKind::Blur { radius },
        vec![input],
        location,
    )?;
    rebind(ctx, receiver, slot);
    Ok(ctx.heap.null())
}

/// `map.Add(other)` - per-cell saturating sum.
fn add(
    ctx: &mut RunContext,
    location: CodeLocation,
    instance: Option<ObjectId>,
    args: &[ObjectId],
) -> ScriptResult<ObjectId> {
    check_arity("HeightMap.Add", 1, args, location)?;
    let receiver = instance.expect("instance method without receiver");
    let lhs = expect_map_slot(ctx, receiver, location)?;
    let rhs = expect_map_slot(ctx, args[0], location)?;
    let slot = ctx.add_map_step("HeightMap.Add", StepKind::Add, vec![lhs, rhs], location)?;
    rebind(ctx, receiver, slot);
    Ok(ctx.heap.null())
}

/// `map.ReturnAs(name)` - bind the map as a named output of the run.
fn return_as(
    ctx: &mut RunContext,
    location: CodeLocation,
    instance: Option<ObjectId>,
    args: &[ObjectId],
) -> ScriptResult<ObjectId> {
    check_arity("HeightMap.ReturnAs", 1, args, location)?;
    let receiver = instance.expect("instance method without receiver");
    let slot = expect_map_slot(ctx, receiver, location)?;
    let name = expect_string(ctx, args[0], location)?;
    let graph = ctx.graph_mut("HeightMap.ReturnAs", location)?;
    if !graph.bind_output(&name, slot) {
        return Err(ScriptError::new(
            ScriptErrorKind::DuplicateOutput { name },
            location,
        ));
    }
    Ok(ctx.heap.null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corelib::test_context;
    use crate::error::ScriptErrorKind;

    #[test]
    fn test_flat_emits_step_and_returns_handle() {
        let mut ctx = test_context();
        let height = ctx.heap.number(500.0);
        let handle = flat(&mut ctx, CodeLocation::new(1, 1), None, &[height]).unwrap();
        let graph = ctx.graph().unwrap();
        assert_eq!(graph.steps().len(), 1);
        assert_eq!(
            graph.steps()[0].kind,
            StepKind::Flat { height: 500 }
        );
        assert!(matches!(
            ctx.heap.get(handle).payload,
            ObjectPayload::HeightMap(_)
        ));
    }

    #[test]
    fn test_fill_rebinds_receiver() {
        let mut ctx = test_context();
        let height = ctx.heap.number(0.0);
        let map = flat(&mut ctx, CodeLocation::UNKNOWN, None, &[height]).unwrap();
        let first = expect_map_slot(&ctx, map, CodeLocation::UNKNOWN).unwrap();
        let five = ctx.heap.number(5.0);
        fill(&mut ctx, CodeLocation::UNKNOWN, Some(map), &[five]).unwrap();
        let second = expect_map_slot(&ctx, map, CodeLocation::UNKNOWN).unwrap();
        assert_ne!(first, second);
        assert_eq!(ctx.graph().unwrap().steps().len(), 2);
    }

    #[test]
    fn test_radial_gradient_rejects_zero_radius() {
        let mut ctx = test_context();
        let args: Vec<_> = [32.0, 32.0, 0.0, 1000.0, 0.0]
            .iter()
            .map(|v| ctx.heap.number(*v))
            .collect();
        let err =
            radial_gradient(&mut ctx, CodeLocation::new(4, 9), None, &args).unwrap_err();
        assert!(matches!(err.kind, ScriptErrorKind::InvalidGeometry { .. }));
        assert_eq!(err.location, CodeLocation::new(4, 9));
    }

    #[test]
    fn test_wrong_arity_is_reported() {
        let mut ctx = test_context();
        let err = flat(&mut ctx, CodeLocation::UNKNOWN, None, &[]).unwrap_err();
        assert!(matches!(
            err.kind,
            ScriptErrorKind::WrongArgumentCount {
                expected: 1,
                found: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_non_number_height_is_type_error() {
        let mut ctx = test_context();
        let text = ctx.heap.string("high".to_string());
        let err = flat(&mut ctx, CodeLocation::UNKNOWN, None, &[text]).unwrap_err();
        assert!(matches!(err.kind, ScriptErrorKind::TypeMismatch { .. }));
    }

    #[test]
    fn test_duplicate_return_as_is_rejected() {
        let mut ctx = test_context();
        let h = ctx.heap.number(1.0);
        let map = flat(&mut ctx, CodeLocation::UNKNOWN, None, &[h]).unwrap();
        let name_a = ctx.heap.string("mask".to_string());
        let name_b = ctx.heap.string("mask".to_string());
        return_as(&mut ctx, CodeLocation::UNKNOWN, Some(map), &[name_a]).unwrap();
        let err = return_as(&mut ctx, CodeLocation::UNKNOWN, Some(map), &[name_b]).unwrap_err();
        assert!(matches!(err.kind, ScriptErrorKind::DuplicateOutput { .. }));
    }

    #[test]
    fn test_noise_salt_depends_on_seed_only() {
        use crate::context::{RunContext, RunPhase};
        use crate::dispatch::TypeRegistry;
        use orogen_foundation::Size2D;

        let mut registry = TypeRegistry::new();
        let builtins = crate::corelib::install(&mut registry);
        let mut salts = Vec::new();
        for _ in 0..2 {
            let mut ctx = RunContext::new(builtins, 7, RunPhase::MapInfo);
            ctx.begin_generating(Size2D::new(8, 8));
            let amp = ctx.heap.number(10.0);
            noise(&mut ctx, CodeLocation::UNKNOWN, None, &[amp]).unwrap();
            match ctx.graph().unwrap().steps()[0].kind {
                StepKind::Noise { salt, .. } => salts.push(salt),
                ref other => panic!("unexpected step {other:?}"),
            }
        }
        assert_eq!(salts[0], salts[1]);
    }
}
