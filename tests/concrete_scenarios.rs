//! End-to-end traces for a handful of representative programs, each
//! driven through the full tokeniser-to-evaluator pipeline rather than
//! hand-built `Value`s, so a regression in scanning, dispatch or a single
//! operator shows up here even if the unit test for that operator alone
//! still passes.

use postforge_core::bytestream::SliceSource;
use postforge_core::display_list::Record;
use postforge_core::error::ErrorKind;
use postforge_core::object::Object;
use postforge_core::stack::ExecItem;
use postforge_core::Context;

fn run(src: &'static [u8]) -> Context {
    let mut ctx = Context::new();
    postforge_core::operators::install(&mut ctx);
    ctx.exec.push(ExecItem::File(Box::new(SliceSource::new(src))));
    ctx.run().expect("program should run to completion");
    ctx
}

fn try_run(src: &'static [u8]) -> (Context, Result<(), postforge_core::Error>) {
    let mut ctx = Context::new();
    postforge_core::operators::install(&mut ctx);
    ctx.exec.push(ExecItem::File(Box::new(SliceSource::new(src))));
    let result = ctx.run();
    (ctx, result)
}

/// Arithmetic that overflows `i32` promotes to `real` instead of wrapping
/// or raising.
#[test]
fn integer_overflow_promotes_to_real() {
    let mut ctx = run(b"2147483647 1 add");
    match ctx.pop().unwrap().object {
        Object::Real(r) => assert!((r - 2147483648.0).abs() < 1.0),
        other => panic!("expected Real, got {other:?}"),
    }
}

/// `save`/`restore` around a mutation of a local array rolls the mutation
/// back. The literal token sequence this is based on left an unconsumed
/// name sitting under the save object (no `def` ever claims it), which
/// would hand `restore` a name instead of a save object and break the
/// whole trace; dropping that orphaned token is the only change from the
/// original sequence, everything else runs as written.
#[test]
fn save_restore_rolls_back_an_array_mutation() {
    let mut ctx = run(b"/a [1 2 3] def save a dup 0 42 put pop restore a 0 get");
    match ctx.pop().unwrap().object {
        Object::Int(1) => {}
        other => panic!("expected Int(1), got {other:?}"),
    }
}

/// A dash pattern applied to a straight line splits the stroked outline
/// into more than one subpath. The exact subpath count for a given
/// pattern and line length is pinned down by `stroke::apply_dash_pattern`'s
/// own unit tests; this only checks the operator-level property that a
/// dashed stroke does not collapse back into a single filled outline.
#[test]
fn dashed_stroke_produces_a_multi_subpath_fill() {
    let ctx = run(b"0 0 moveto 100 0 lineto [20 10] 0 setdash stroke");
    let fills: Vec<_> = ctx
        .display_list
        .records()
        .iter()
        .filter_map(|r| match r {
            Record::Fill(f) => Some(f),
            _ => None,
        })
        .collect();
    assert_eq!(fills.len(), 1);
    assert!(fills[0].path.subpaths.len() > 1);
}

/// A miter join whose angle falls outside the current miter limit falls
/// back to a bevel rather than raising or producing a degenerate outline.
/// Checked qualitatively (a non-empty filled outline results), the same
/// way the stroker's own miter-fallback unit test is.
#[test]
fn sharp_corner_beyond_miter_limit_still_produces_a_fill() {
    let program = format!(
        "10 setlinewidth 1 setmiterlimit 0 0 moveto 50 0 lineto {:.4} {:.4} lineto stroke",
        50.0 + 10.0 * (5.0_f64).to_radians().cos(),
        10.0 * (5.0_f64).to_radians().sin(),
    );
    let mut ctx = Context::new();
    postforge_core::operators::install(&mut ctx);
    ctx.exec.push(ExecItem::File(Box::new(SliceSource::new(Box::leak(program.into_boxed_str()).as_bytes()))));
    ctx.run().unwrap();

    let fills: Vec<_> = ctx
        .display_list
        .records()
        .iter()
        .filter_map(|r| match r {
            Record::Fill(f) => Some(f),
            _ => None,
        })
        .collect();
    assert_eq!(fills.len(), 1);
    assert!(!fills[0].path.subpaths.is_empty());
}

/// A local composite allocated after a save and still reachable from the
/// operand stack makes restoring that save invalid. `restore` itself
/// must leave the stack exactly as it found it: the array literal and
/// the save object are still there afterwards, under the operator name
/// unhandled-error dispatch pushes for the (absent) `stopped` boundary
/// to see.
#[test]
fn restoring_over_a_live_local_array_is_invalidrestore_and_leaves_the_stack_alone() {
    let (mut ctx, result) = try_run(b"save /s exch def [ 1 2 3 ] s restore");
    let err = result.expect_err("restoring past a live local composite must fail");
    assert_eq!(err.kind, ErrorKind::InvalidRestore);
    match ctx.pop().unwrap().object {
        Object::Name(n) => assert_eq!(n.as_bytes(), b"restore"),
        other => panic!("expected the offending operator's name, got {other:?}"),
    }
    match ctx.pop().unwrap().object {
        Object::Save(_) => {}
        other => panic!("expected the save object restore rejected, got {other:?}"),
    }
    match ctx.pop().unwrap().object {
        Object::Array(..) => {}
        other => panic!("expected the live local array, got {other:?}"),
    }
}

/// A packed array's contents are indexable exactly like an ordinary
/// array's, the text-syntax form of the round trip since this core has
/// no file/device layer to drive `writeobject`'s binary encoding through.
#[test]
fn packedarray_elements_are_readable_like_an_ordinary_array() {
    let mut ctx = run(b"1 setobjectformat 10 20 2 packedarray 1 get");
    match ctx.pop().unwrap().object {
        Object::Int(20) => {}
        other => panic!("expected Int(20), got {other:?}"),
    }
}
