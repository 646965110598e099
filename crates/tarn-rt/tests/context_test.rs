use std::rc::Rc;

use tarn_core::{TarnError, Value};
use tarn_rt::{Context, NativeFn};

#[test]
fn test_alloc_returns_handle() {
    let mut ctx = Context::new();
    let h = ctx.alloc(10).unwrap();
    assert!(h.is_handle());
    assert!(ctx.is_valid_handle(h));
    assert_eq!(ctx.heap_len(), 1);
}

#[test]
fn test_alloc_ids_strictly_increasing() {
    let mut ctx = Context::new();
    let mut last = 0;
    for _ in 0..100 {
        let id = ctx.alloc(0).unwrap().as_handle().unwrap();
        assert!(id > last);
        last = id;
    }
}

#[test]
fn test_alloc_ids_start_at_one() {
    let mut ctx = Context::new();
    assert_eq!(ctx.alloc(1).unwrap(), Value::Handle(1));
}

#[test]
fn test_alloc_negative_size_fails() {
    let mut ctx = Context::new();
    assert_eq!(ctx.alloc(-1), Err(TarnError::BadSize(-1)));
    assert_eq!(ctx.heap_len(), 0);
}

#[test]
fn test_new_cell_is_zero_initialized() {
    let mut ctx = Context::new();
    let h = ctx.alloc(4).unwrap();
    for i in 0..4 {
        assert_eq!(ctx.read(h, i).unwrap(), Value::Int(0));
    }
}

#[test]
fn test_write_read_round_trip() {
    let mut ctx = Context::new();
    let h = ctx.alloc(5).unwrap();
    ctx.write(h, 0, Value::Int(42)).unwrap();
    ctx.write(h, 1, Value::Int(99)).unwrap();
    assert_eq!(ctx.read(h, 0).unwrap(), Value::Int(42));
    assert_eq!(ctx.read(h, 1).unwrap(), Value::Int(99));
}

#[test]
fn test_read_out_of_bounds() {
    let mut ctx = Context::new();
    let h = ctx.alloc(2).unwrap();
    assert_eq!(
        ctx.read(h, 2),
        Err(TarnError::OutOfBounds { index: 2, len: 2 })
    );
    assert_eq!(
        ctx.read(h, -1),
        Err(TarnError::OutOfBounds { index: -1, len: 2 })
    );
}

#[test]
fn test_write_out_of_bounds_changes_nothing() {
    let mut ctx = Context::new();
    let h = ctx.alloc(1).unwrap();
    let sub = ctx.alloc(1).unwrap();
    assert!(matches!(
        ctx.write(h, 5, sub),
        Err(TarnError::OutOfBounds { index: 5, len: 1 })
    ));
    // the failed write must not have retained `sub`
    assert_eq!(ctx.ref_count(sub.as_handle().unwrap()), Some(0));
}

#[test]
fn test_invalid_handle_rejected_everywhere() {
    let mut ctx = Context::new();
    let bogus = Value::Handle(999);
    assert_eq!(ctx.read(bogus, 0), Err(TarnError::InvalidHandle));
    assert_eq!(
        ctx.write(bogus, 0, Value::Int(1)),
        Err(TarnError::InvalidHandle)
    );
    assert_eq!(ctx.push(bogus, Value::Int(1)), Err(TarnError::InvalidHandle));
    assert_eq!(ctx.pop(bogus), Err(TarnError::InvalidHandle));
    // an int is never a handle
    assert_eq!(ctx.read(Value::Int(1), 0), Err(TarnError::InvalidHandle));
}

#[test]
fn test_write_dangling_value_rejected_before_refcounts_change() {
    let mut ctx = Context::new();
    let arr = ctx.alloc(1).unwrap();
    let gone = ctx.alloc(1).unwrap();
    ctx.assign(1, gone);
    ctx.erase(1).unwrap();
    ctx.minor_gc();

    assert_eq!(ctx.write(arr, 0, gone), Err(TarnError::InvalidHandle));
    assert_eq!(ctx.push(arr, gone), Err(TarnError::InvalidHandle));
    assert_eq!(ctx.read(arr, 0).unwrap(), Value::Int(0));
}

#[test]
fn test_arithmetic_on_live_handle_fails() {
    let mut ctx = Context::new();
    let h = ctx.alloc(1).unwrap();
    let err = h.add(Value::Int(1)).unwrap_err();
    assert!(matches!(err, TarnError::TypeMismatch { .. }));
    // reinterpreting the payload makes it usable as an integer
    let as_int = h.to_integer();
    assert_eq!(as_int.add(Value::Int(1)).unwrap().payload(), h.payload() + 1);
}

#[test]
fn test_push_pop_lifo() {
    let mut ctx = Context::new();
    let h = ctx.alloc(0).unwrap();
    ctx.push(h, Value::Int(1)).unwrap();
    ctx.push(h, Value::Int(2)).unwrap();
    ctx.push(h, Value::Int(3)).unwrap();
    assert_eq!(ctx.pop(h).unwrap(), Value::Int(3));
    assert_eq!(ctx.pop(h).unwrap(), Value::Int(2));
    assert_eq!(ctx.pop(h).unwrap(), Value::Int(1));
    assert_eq!(ctx.pop(h), Err(TarnError::EmptyPop));
}

#[test]
fn test_variables() {
    let mut ctx = Context::new();
    assert!(!ctx.var_is_defined(7));
    ctx.assign(7, Value::Int(13));
    assert!(ctx.var_is_defined(7));
    assert_eq!(ctx.var(7), Some(Value::Int(13)));

    ctx.assign(7, Value::Int(14));
    assert_eq!(ctx.var(7), Some(Value::Int(14)));

    ctx.erase(7).unwrap();
    assert!(!ctx.var_is_defined(7));
    assert_eq!(ctx.erase(7), Err(TarnError::Undefined(7)));
}

#[test]
fn test_functions() {
    let mut ctx = Context::new();
    assert!(!ctx.fun_is_defined(1));
    ctx.define_function(
        1,
        Rc::new(NativeFn::simple("sum2", |args| args[0].add(args[1]))),
    );
    assert!(ctx.fun_is_defined(1));

    let f = ctx.function(1).unwrap();
    assert_eq!(f.name, "sum2");
    let out = (f.func)(&[Value::Int(2), Value::Int(3)]).unwrap();
    assert_eq!(out, Value::Int(5));

    ctx.erase_function(1).unwrap();
    assert!(!ctx.fun_is_defined(1));
    assert_eq!(ctx.erase_function(1), Err(TarnError::Undefined(1)));
}

#[test]
fn test_functions_are_not_gc_roots() {
    let mut ctx = Context::new();
    let h = ctx.alloc(1).unwrap();
    ctx.define_function(1, Rc::new(NativeFn::simple("noop", |_| Ok(Value::Int(0)))));
    // nothing roots `h`; a major collection reclaims it even though the
    // function table is non-empty
    ctx.major_gc(-1);
    assert!(!ctx.is_valid_handle(h));
    assert!(ctx.fun_is_defined(1));
}

#[test]
fn test_same_handle_overwrite_keeps_cell_alive() {
    let mut ctx = Context::new();
    let arr = ctx.alloc(1).unwrap();
    let sub = ctx.alloc(1).unwrap();
    ctx.assign(1, arr);
    ctx.write(arr, 0, sub).unwrap();

    // overwrite a slot with the handle it already holds
    ctx.write(arr, 0, sub).unwrap();
    ctx.minor_gc();
    assert!(ctx.is_valid_handle(sub));
    assert_eq!(ctx.ref_count(sub.as_handle().unwrap()), Some(1));
}

#[test]
fn test_read_and_pop_do_not_retain() {
    let mut ctx = Context::new();
    let arr = ctx.alloc(1).unwrap();
    let sub = ctx.alloc(0).unwrap();
    ctx.assign(1, arr);
    ctx.write(arr, 0, sub).unwrap();

    let seen = ctx.read(arr, 0).unwrap();
    assert_eq!(seen, sub);
    assert_eq!(ctx.ref_count(sub.as_handle().unwrap()), Some(1));

    // popping hands the value back without a retain; the cell is now
    // unreferenced and due for collection
    let popped = ctx.pop(arr).unwrap();
    assert_eq!(popped, sub);
    assert_eq!(ctx.ref_count(sub.as_handle().unwrap()), Some(0));
    ctx.minor_gc();
    assert!(!ctx.is_valid_handle(sub));
}
