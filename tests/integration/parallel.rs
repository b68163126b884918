mod common;

use common::{Machine, Value, global, local, lowered_text, run_both};
use walkassign::config::LowerConfig;
use walkassign::ir::{Callee, Expr, Func, ListKind, Stmt, StructField, Type, VarId};

fn int(n: i64) -> Expr {
    Expr::int(n, Type::Int)
}

fn list(lhs: Vec<Expr>, rhs: Vec<Expr>) -> Stmt {
    Stmt::assign_list(ListKind::Plain, lhs, rhs)
}

/// Lower `body`, run it next to the unlowered body, and compare `vars`.
fn assert_same(func: &Func, body: Vec<Stmt>, vars: &[VarId], setup: impl Fn(&mut Machine)) -> Machine {
    let ((mut reference, expected), (mut machine, actual)) = run_both(func, body, &LowerConfig::default(), setup);
    assert_eq!(expected, Ok(()));
    assert_eq!(actual, Ok(()));
    for &id in vars {
        let want = reference.var(id);
        let got = machine.var(id);
        let (want, got) = match (&want, &got) {
            (Value::Slice { .. }, Value::Slice { .. }) => {
                let elem = func.var(id).ty.elem().cloned().unwrap();
                (
                    Value::Tuple(reference.slice_items(&elem, &want).unwrap()),
                    Value::Tuple(machine.slice_items(&elem, &got).unwrap()),
                )
            }
            _ => (want, got),
        };
        assert_eq!(want, got, "{} differs", func.var(id).name);
    }
    machine
}

#[test]
fn swap_two_variables() {
    let mut func = Func::new("f");
    let x = local(&mut func, "x", Type::Int);
    let y = local(&mut func, "y", Type::Int);
    let body = vec![list(vec![func.name(x), func.name(y)], vec![func.name(y), func.name(x)])];

    insta::assert_snapshot!(lowered_text(&func, body.clone()), @r"
    {
        .autotmp_0 = x
        x = y
        y = .autotmp_0
    }
    ");

    let mut machine = assert_same(&func, body, &[x, y], |m| {
        m.set_var(x, Value::Int(1));
        m.set_var(y, Value::Int(2));
    });
    assert_eq!(machine.var(x), Value::Int(2));
    assert_eq!(machine.var(y), Value::Int(1));
}

#[test]
fn swap_slice_elements() {
    let mut func = Func::new("f");
    let a = local(&mut func, "a", Type::Int.slice_of());
    let i = local(&mut func, "i", Type::Int);
    let j = local(&mut func, "j", Type::Int);
    let at = |func: &Func, v| Expr::index(func.name(a), func.name(v), Type::Int);
    let body = vec![list(vec![at(&func, i), at(&func, j)], vec![at(&func, j), at(&func, i)])];

    for (vi, vj) in [(0, 2), (1, 1), (2, 0)] {
        let mut machine = assert_same(&func, body.clone(), &[a], |m| {
            let s = m.new_slice(&Type::Int, &[Value::Int(10), Value::Int(11), Value::Int(12)], 3);
            m.set_var(a, s);
            m.set_var(i, Value::Int(vi));
            m.set_var(j, Value::Int(vj));
        });
        let s = machine.var(a);
        let items = machine.slice_items(&Type::Int, &s).unwrap();
        let mut want = vec![Value::Int(10), Value::Int(11), Value::Int(12)];
        want.swap(vi as usize, vj as usize);
        assert_eq!(items, want);
    }
}

#[test]
fn index_uses_value_before_assignment() {
    // i, a[i] = 1, 2 stores into the element the old i selected.
    let mut func = Func::new("f");
    let a = local(&mut func, "a", Type::Array(3, Box::new(Type::Int)));
    let i = local(&mut func, "i", Type::Int);
    let elem = Expr::index(func.name(a), func.name(i), Type::Int);
    let body = vec![list(vec![func.name(i), elem], vec![int(1), int(2)])];

    let mut machine = assert_same(&func, body, &[a, i], |m| m.set_var(i, Value::Int(0)));
    assert_eq!(machine.var(a), Value::Agg(vec![Value::Int(2), Value::Int(0), Value::Int(0)]));
    assert_eq!(machine.var(i), Value::Int(1));
}

#[test]
fn rotate_array_elements() {
    let mut func = Func::new("f");
    let a = local(&mut func, "a", Type::Array(3, Box::new(Type::Int)));
    let at = |func: &Func, n| Expr::index(func.name(a), int(n), Type::Int);
    let body = vec![list(
        vec![at(&func, 0), at(&func, 1), at(&func, 2)],
        vec![at(&func, 2), at(&func, 0), at(&func, 1)],
    )];

    let mut machine = assert_same(&func, body, &[a], |m| {
        m.set_var(a, Value::Agg(vec![Value::Int(1), Value::Int(2), Value::Int(3)]));
    });
    assert_eq!(machine.var(a), Value::Agg(vec![Value::Int(3), Value::Int(1), Value::Int(2)]));
}

#[test]
fn store_through_pointer_aliasing_a_variable() {
    // p points at x, so *p and x name the same memory.
    let mut func = Func::new("f");
    let x = local(&mut func, "x", Type::Int);
    func.var_mut(x).addr_taken = true;
    let p = local(&mut func, "p", Type::Int.ptr_to());
    let body = vec![
        Stmt::assign(func.name(p), Expr::addr_of(func.name(x))),
        list(vec![Expr::deref(func.name(p)), func.name(x)], vec![int(7), Expr::deref(func.name(p))]),
    ];

    let mut machine = assert_same(&func, body, &[x], |m| m.set_var(x, Value::Int(3)));
    assert_eq!(machine.var(x), Value::Int(3));
}

#[test]
fn global_read_after_store_sees_old_value() {
    let mut func = Func::new("f");
    let g = global(&mut func, "g", Type::Int);
    let y = local(&mut func, "y", Type::Int);
    let body = vec![list(vec![func.name(g), func.name(y)], vec![int(5), func.name(g)])];

    let mut machine = assert_same(&func, body, &[g, y], |m| m.set_var(g, Value::Int(1)));
    assert_eq!(machine.var(y), Value::Int(1));
    assert_eq!(machine.var(g), Value::Int(5));
}

#[test]
fn swap_struct_fields() {
    let mut func = Func::new("f");
    let pair = Type::Struct(vec![
        StructField { name: "a".into(), ty: Type::String },
        StructField { name: "b".into(), ty: Type::String },
    ]);
    let s = local(&mut func, "s", pair);
    let field = |func: &Func, i| Expr::field(func.name(s), i);
    let body = vec![list(vec![field(&func, 0), field(&func, 1)], vec![field(&func, 1), field(&func, 0)])];

    let mut machine = assert_same(&func, body, &[s], |m| {
        m.set_var(s, Value::Agg(vec![Value::Str("l".into()), Value::Str("r".into())]));
    });
    assert_eq!(machine.var(s), Value::Agg(vec![Value::Str("r".into()), Value::Str("l".into())]));
}

#[test]
fn map_destination_in_list() {
    let mut func = Func::new("f");
    let m = local(&mut func, "m", Type::Map(Box::new(Type::Int), Box::new(Type::Int)));
    let x = local(&mut func, "x", Type::Int);
    let slot = Expr::map_index(func.name(m), func.name(x));
    let body = vec![list(vec![slot, func.name(x)], vec![func.name(x), int(9)])];

    let ((mut reference, expected), (mut machine, actual)) = run_both(&func, body, &LowerConfig::default(), |mach| {
        let map = mach.new_map();
        mach.set_var(m, map);
        mach.set_var(x, Value::Int(4));
    });
    assert_eq!(expected, Ok(()));
    assert_eq!(actual, Ok(()));
    let want = reference.var(m);
    let got = machine.var(m);
    assert_eq!(reference.map_get(&want, &Value::Int(4), &Type::Int), Some(Value::Int(4)));
    assert_eq!(machine.map_get(&got, &Value::Int(4), &Type::Int), Some(Value::Int(4)));
    assert_eq!(machine.var(x), Value::Int(9));
}

#[test]
fn blank_destination_still_evaluates_source() {
    let mut func = Func::new("f");
    let x = local(&mut func, "x", Type::Int);
    let call = Expr::call(Callee::Func("tick".into()), Vec::new(), Type::Int);
    let body = vec![list(vec![Expr::blank(Type::Int), func.name(x)], vec![call, int(2)])];

    let ((reference, _), (mut machine, actual)) = run_both(&func, body, &LowerConfig::default(), |m| {
        m.register("tick", |_, _| Ok(Value::Int(0)));
    });
    assert_eq!(actual, Ok(()));
    assert_eq!(reference.calls, vec!["tick"]);
    assert_eq!(machine.calls, vec!["tick"]);
    assert_eq!(machine.var(x), Value::Int(2));
}
