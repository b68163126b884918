mod common;

use common::{Machine, Panic, Value, local, lower, lowered_text, result, run_both};
use walkassign::config::LowerConfig;
use walkassign::ir::{Callee, Expr, ExprKind, Func, ListKind, Stmt, StmtKind, Type, VarId};

fn int(n: i64) -> Expr {
    Expr::int(n, Type::Int)
}

fn pair_call(name: &str) -> Expr {
    Expr::call(Callee::Func(name.into()), Vec::new(), Type::Tuple(vec![Type::Int, Type::Int]))
}

fn run_ok(func: &Func, body: Vec<Stmt>, setup: impl Fn(&mut Machine)) -> (Machine, Machine) {
    let ((reference, expected), (machine, actual)) = run_both(func, body, &LowerConfig::default(), setup);
    assert_eq!(expected, Ok(()));
    assert_eq!(actual, Ok(()));
    (reference, machine)
}

fn assert_vars(reference: &mut Machine, machine: &mut Machine, vars: &[(VarId, Value)]) {
    for (id, want) in vars {
        assert_eq!(&reference.var(*id), want);
        assert_eq!(&machine.var(*id), want);
    }
}

#[test]
fn call_results_land_in_order() {
    let mut func = Func::new("f");
    let a = local(&mut func, "a", Type::Int);
    let b = local(&mut func, "b", Type::Int);
    let body = vec![Stmt::assign_list(ListKind::Func, vec![func.name(a), func.name(b)], vec![pair_call("two")])];

    insta::assert_snapshot!(lowered_text(&func, body.clone()), @r"
    two()
    {
        a = res0
        b = res1
    }
    ");

    let (mut reference, mut machine) = run_ok(&func, body, |m| {
        m.register("two", |_, _| Ok(Value::Tuple(vec![Value::Int(3), Value::Int(4)])));
    });
    assert_vars(&mut reference, &mut machine, &[(a, Value::Int(3)), (b, Value::Int(4))]);
}

#[test]
fn call_result_into_map_is_stored_after_reads() {
    let mut func = Func::new("f");
    let m = local(&mut func, "m", Type::Map(Box::new(Type::Int), Box::new(Type::Int)));
    let x = local(&mut func, "x", Type::Int);
    let slot = Expr::map_index(func.name(m), int(1));
    let body = vec![Stmt::assign_list(ListKind::Func, vec![slot, func.name(x)], vec![pair_call("two")])];

    let (mut reference, mut machine) = run_ok(&func, body, |mach| {
        let map = mach.new_map();
        mach.set_var(m, map);
        mach.register("two", |_, _| Ok(Value::Tuple(vec![Value::Int(5), Value::Int(6)])));
    });
    assert_vars(&mut reference, &mut machine, &[(x, Value::Int(6))]);
    let map = machine.var(m);
    assert_eq!(machine.map_get(&map, &Value::Int(1), &Type::Int), Some(Value::Int(5)));
    assert_eq!(machine.calls, vec!["two", "mapassign_fast64"]);
}

#[test]
fn intrinsic_keeps_list_form() {
    let mut func = Func::new("f");
    let hi = local(&mut func, "hi", Type::Uint);
    let lo = local(&mut func, "lo", Type::Uint);
    let x = local(&mut func, "x", Type::Uint);
    let mul = Expr::call(
        Callee::Intrinsic("bits.Mul64".into()),
        vec![func.name(x), func.name(x)],
        Type::Tuple(vec![Type::Uint, Type::Uint]),
    );
    let body = vec![Stmt::assign_list(ListKind::Func, vec![func.name(hi), func.name(lo)], vec![mul])];

    let (_, lowered) = lower(&func, body.clone());
    assert!(matches!(
        lowered.last().map(|s| &s.kind),
        Some(StmtKind::AssignList { kind: ListKind::Func, .. })
    ));

    let (mut reference, mut machine) = run_ok(&func, body, |m| {
        m.set_var(x, Value::Int(1 << 40));
        m.register("bits.Mul64", |_, args| {
            let a = args[0].as_int()? as u64 as u128;
            let b = args[1].as_int()? as u64 as u128;
            let p = a * b;
            Ok(Value::Tuple(vec![Value::Int((p >> 64) as u64 as i64), Value::Int(p as u64 as i64)]))
        });
    });
    assert_vars(&mut reference, &mut machine, &[(hi, Value::Int(1 << 16)), (lo, Value::Int(0))]);
}

#[test]
fn map_read_with_presence() {
    let mut func = Func::new("f");
    let m = local(&mut func, "m", Type::Map(Box::new(Type::String), Box::new(Type::Int)));
    let k = local(&mut func, "k", Type::String);
    let v = local(&mut func, "v", Type::Int);
    let ok = local(&mut func, "ok", Type::NamedBool("Found".into()));
    let read = Expr::map_index(func.name(m), func.name(k));
    let body = vec![Stmt::assign_list(ListKind::MapRead, vec![func.name(v), func.name(ok)], vec![read])];

    for (key, want_v, want_ok) in [("a", 1, true), ("zz", 0, false)] {
        let (mut reference, mut machine) = run_ok(&func, body.clone(), |mach| {
            let map = mach.new_map();
            mach.map_insert(&map, Value::Str("a".into()), Value::Int(1), &Type::Int);
            mach.set_var(m, map);
            mach.set_var(k, Value::Str(key.into()));
            mach.set_var(v, Value::Int(-1));
        });
        assert_vars(
            &mut reference,
            &mut machine,
            &[(v, Value::Int(want_v)), (ok, Value::Bool(want_ok))],
        );
        assert_eq!(machine.calls, vec!["mapaccess2_faststr"]);
    }
}

#[test]
fn map_read_presence_only() {
    let mut func = Func::new("f");
    let m = local(&mut func, "m", Type::Map(Box::new(Type::Int), Box::new(Type::Int)));
    let ok = local(&mut func, "ok", Type::Bool);
    let read = Expr::map_index(func.name(m), int(3));
    let body = vec![Stmt::assign_list(ListKind::MapRead, vec![Expr::blank(Type::Int), func.name(ok)], vec![read])];

    let (mut reference, mut machine) = run_ok(&func, body, |mach| {
        let map = mach.new_map();
        mach.map_insert(&map, Value::Int(3), Value::Int(30), &Type::Int);
        mach.set_var(m, map);
    });
    assert_vars(&mut reference, &mut machine, &[(ok, Value::Bool(true))]);
}

#[test]
fn map_read_of_large_element_uses_zero_buffer() {
    let mut func = Func::new("f");
    let big = Type::Array(200, Box::new(Type::Int));
    let m = local(&mut func, "m", Type::Map(Box::new(Type::Int), Box::new(big.clone())));
    let v = local(&mut func, "v", big.clone());
    let ok = local(&mut func, "ok", Type::Bool);
    let read = Expr::map_index(func.name(m), int(8));
    let body = vec![Stmt::assign_list(ListKind::MapRead, vec![func.name(v), func.name(ok)], vec![read])];

    let text = lowered_text(&func, body.clone());
    assert!(text.contains("mapaccess2_fat(type(map[int][200]int), m, &.autotmp_0, &zeroVal[1600])"), "{text}");

    let (mut reference, mut machine) = run_ok(&func, body, |mach| {
        let map = mach.new_map();
        mach.set_var(m, map);
        mach.set_var(v, Value::Agg(vec![Value::Int(7); 200]));
        mach.set_var(ok, Value::Bool(true));
    });
    assert_vars(
        &mut reference,
        &mut machine,
        &[(v, Value::Agg(vec![Value::Int(0); 200])), (ok, Value::Bool(false))],
    );
}

#[test]
fn receive_with_presence() {
    let mut func = Func::new("f");
    let c = local(&mut func, "c", Type::Chan(Box::new(Type::Int)));
    let v = local(&mut func, "v", Type::Int);
    let ok = local(&mut func, "ok", Type::Bool);
    let body = vec![
        Stmt::assign_list(ListKind::Recv, vec![func.name(v), func.name(ok)], vec![Expr::recv(func.name(c))]),
    ];

    for (items, closed, want_v, want_ok) in [(vec![Value::Int(4)], false, 4, true), (Vec::new(), true, 0, false)] {
        let (mut reference, mut machine) = run_ok(&func, body.clone(), |mach| {
            let chan = mach.new_chan(items.clone(), closed);
            mach.set_var(c, chan);
            mach.set_var(v, Value::Int(-1));
        });
        assert_vars(
            &mut reference,
            &mut machine,
            &[(v, Value::Int(want_v)), (ok, Value::Bool(want_ok))],
        );
        assert_eq!(machine.calls, vec!["chanrecv2"]);
    }
}

#[test]
fn receive_with_presence_into_map_slot() {
    let mut func = Func::new("f");
    let c = local(&mut func, "c", Type::Chan(Box::new(Type::Int)));
    let m = local(&mut func, "m", Type::Map(Box::new(Type::Int), Box::new(Type::Int)));
    let ok = local(&mut func, "ok", Type::Bool);
    let slot = Expr::map_index(func.name(m), int(2));
    let body = vec![Stmt::assign_list(ListKind::Recv, vec![slot, func.name(ok)], vec![Expr::recv(func.name(c))])];

    let (mut reference, mut machine) = run_ok(&func, body, |mach| {
        let chan = mach.new_chan(vec![Value::Int(12)], false);
        mach.set_var(c, chan);
        let map = mach.new_map();
        mach.set_var(m, map);
    });
    assert_vars(&mut reference, &mut machine, &[(ok, Value::Bool(true))]);
    let map = machine.var(m);
    assert_eq!(machine.map_get(&map, &Value::Int(2), &Type::Int), Some(Value::Int(12)));
    assert_eq!(machine.calls, vec!["chanrecv2", "mapassign_fast64"]);
}

#[test]
fn type_assertion_operands_only() {
    let mut func = Func::new("f");
    let x = local(&mut func, "x", Type::Opaque { name: "any".into(), size: 16, pointers: true, not_in_heap: false });
    let v = local(&mut func, "v", Type::Int);
    let ok = local(&mut func, "ok", Type::Bool);
    let assert = Expr::new(ExprKind::TypeAssert(Box::new(func.name(x))), Type::Int);
    let body = vec![Stmt::assign_list(ListKind::TypeAssert, vec![func.name(v), func.name(ok)], vec![assert])];

    insta::assert_snapshot!(lowered_text(&func, body), @"v, ok = x.(int)");
}

#[test]
fn named_results_swap_on_return() {
    let mut func = Func::new("f");
    let a = result(&mut func, "a", Type::Int);
    let b = result(&mut func, "b", Type::Int);
    func.named_results = true;
    let body = vec![Stmt::ret(vec![func.name(b), func.name(a)])];

    let (lowered_func, _) = lower(&func, body.clone());
    assert_eq!(lowered_func.num_returns, 1);

    let (mut reference, mut machine) = run_ok(&func, body, |m| {
        m.set_var(a, Value::Int(1));
        m.set_var(b, Value::Int(2));
    });
    assert_vars(&mut reference, &mut machine, &[(a, Value::Int(2)), (b, Value::Int(1))]);
}

#[test]
fn return_skips_statements_after_it() {
    let mut func = Func::new("f");
    let r = result(&mut func, "~r0", Type::Int);
    let body = vec![Stmt::ret(vec![int(1)]), Stmt::assign(func.name(r), int(2))];

    let (mut reference, mut machine) = run_ok(&func, body, |_| {});
    assert_vars(&mut reference, &mut machine, &[(r, Value::Int(1))]);
}

#[test]
fn heap_result_written_through_its_slot() {
    let mut func = Func::new("f");
    let r = result(&mut func, "r", Type::Int);
    let slot = local(&mut func, "&r", Type::Int.ptr_to());
    let cell = local(&mut func, "cell", Type::Int);
    func.var_mut(r).heap_addr = Some(slot);
    let body = vec![Stmt::ret(vec![int(5)])];

    insta::assert_snapshot!(lowered_text(&func, body.clone()), @r"
    {
        *&r = 5
        return
    }
    ");

    let (mut reference, mut machine) = run_ok(&func, body, |m| {
        let ptr = m.addr_of_var(cell);
        m.set_var(slot, ptr);
    });
    assert_vars(&mut reference, &mut machine, &[(cell, Value::Int(5)), (r, Value::Int(0))]);
}

#[test]
fn panicking_call_leaves_destinations_alone() {
    let mut func = Func::new("f");
    let a = local(&mut func, "a", Type::Int);
    let b = local(&mut func, "b", Type::Int);
    let body = vec![Stmt::assign_list(ListKind::Func, vec![func.name(a), func.name(b)], vec![pair_call("fail")])];

    let ((_, expected), (mut machine, actual)) = run_both(&func, body, &LowerConfig::default(), |m| {
        m.set_var(a, Value::Int(1));
        m.register("fail", |_, _| Err(Panic("fail".into())));
    });
    assert_eq!(expected, Err(Panic("fail".into())));
    assert_eq!(actual, Err(Panic("fail".into())));
    assert_eq!(machine.var(a), Value::Int(1));
}
