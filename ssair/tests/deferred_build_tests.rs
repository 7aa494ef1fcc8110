use std::{
    cell::Cell,
    panic::{self, AssertUnwindSafe},
    rc::Rc,
};

use pretty_assertions::assert_eq;
use ssair::{
    builder::FunctionBuilder,
    constants::ConstValue,
    deferred::BuildState,
    instruction::{InstKind, Instruction, UndefinedKind},
    operand::{FunctionId, InstId},
    program::{Program, UNKNOWN_REPLACE_VALUE},
    types::{Type, function::FunctionType},
};

fn live_spins(program: &Program) -> usize {
    program
        .instructions()
        .filter(|i| matches!(i.const_value(), Some(ConstValue::Placeholder(_))))
        .count()
}

fn setup() -> (Program, FunctionId) {
    let mut program = Program::new("deferred");
    let main = program.new_function("main", None);
    (program, main)
}

fn undefined(program: &mut Program, function: FunctionId, name: &str) -> InstId {
    FunctionBuilder::new(program, function).emit_undefined(name)
}

/// Object in `function` carrying `peer = value`.
fn object_with_peer(program: &mut Program, function: FunctionId, value: InstId) -> InstId {
    let mut builder = FunctionBuilder::new(program, function);
    let obj = builder.emit_make();
    let key = builder.emit_const("peer");
    builder.assign_member(obj, key, value);
    obj
}

#[test]
fn closure_runs_exactly_once() {
    let (mut program, main) = setup();
    let target = undefined(&mut program, main, "x");
    let result = FunctionBuilder::new(&mut program, main).emit_const(1i64);

    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    program.set_ordinal_build(target, move |_| {
        counter.set(counter.get() + 1);
        Some(result)
    });

    assert_eq!(program.value(target).unwrap().deferred().state(), BuildState::NotStarted);
    assert_eq!(program.build(target), Some(result));
    assert_eq!(program.build(target), Some(result));
    assert_eq!(program.build(target), Some(result));
    assert_eq!(calls.get(), 1);
    assert_eq!(program.value(target).unwrap().deferred().state(), BuildState::Finished);
}

#[test]
fn mutual_references_resolve_to_each_other() {
    let (mut program, main) = setup();
    let a = undefined(&mut program, main, "A");
    let b = undefined(&mut program, main, "B");

    program.set_ordinal_build(a, move |p| {
        let peer = p.build(b)?;
        Some(object_with_peer(p, main, peer))
    });
    program.set_ordinal_build(b, move |p| {
        let peer = p.build(a)?;
        Some(object_with_peer(p, main, peer))
    });

    let obj_a = program.build(a).unwrap();
    let obj_b = program.build(b).unwrap();

    assert_eq!(program.get_string_member(obj_a, "peer"), Some(obj_b));
    assert_eq!(program.get_string_member(obj_b, "peer"), Some(obj_a));
    assert_eq!(live_spins(&program), 0);
    assert!(program.value(a).unwrap().deferred().spin().is_none());
    assert_eq!(program.verify(), Ok(()));
}

#[test]
fn three_way_cycle_terminates() {
    let (mut program, main) = setup();
    let nodes: Vec<InstId> = ["A", "B", "C"]
        .iter()
        .map(|name| undefined(&mut program, main, name))
        .collect();

    for (index, node) in nodes.iter().enumerate() {
        let next = nodes[(index + 1) % nodes.len()];
        program.set_ordinal_build(*node, move |p| {
            let peer = p.build(next)?;
            Some(object_with_peer(p, main, peer))
        });
    }

    let resolved: Vec<InstId> = nodes.iter().map(|n| program.build(*n).unwrap()).collect();
    for (index, obj) in resolved.iter().enumerate() {
        let next = resolved[(index + 1) % resolved.len()];
        assert_eq!(program.get_string_member(*obj, "peer"), Some(next));
    }
    assert_eq!(live_spins(&program), 0);
    assert_eq!(program.verify(), Ok(()));
}

#[test]
fn self_reference_resolves_to_the_built_object() {
    let (mut program, main) = setup();
    let class = undefined(&mut program, main, "C");

    program.set_ordinal_build(class, move |p| {
        let me = p.build(class)?;
        Some(object_with_peer(p, main, me))
    });

    let obj = program.build(class).unwrap();
    assert_eq!(program.get_string_member(obj, "peer"), Some(obj));
    assert!(program.value(obj).unwrap().users().contains(&obj));
    assert_eq!(live_spins(&program), 0);
    assert_eq!(program.verify(), Ok(()));
}

#[test]
fn receivers_bound_to_a_placeholder_follow_the_patch() {
    let (mut program, main) = setup();
    let class = undefined(&mut program, main, "C");

    let slot = Rc::new(Cell::new(InstId::NIL));
    let seen = slot.clone();
    program.set_ordinal_build(class, move |p| {
        let me = p.build(class)?;
        let method = FunctionBuilder::new(p, main).emit_make();
        p.set_type(method, FunctionType::new("m", vec![], vec![]).with_receiver(me).into());
        seen.set(method);
        Some(object_with_peer(p, main, method))
    });

    let obj = program.build(class).unwrap();
    let method = slot.get();
    let receiver = match program.type_of(method) {
        Some(Type::Function(function)) => function.this,
        _ => None,
    };
    assert_eq!(receiver, Some(obj));
    assert_eq!(program.value(method).unwrap().reference(), Some(obj));
    assert_eq!(program.value(obj).unwrap().pointer(), &[method]);
    assert_eq!(live_spins(&program), 0);
    assert_eq!(program.verify(), Ok(()));
}

#[test]
fn interrupted_builds_are_settled_without_a_result() {
    let (mut program, main) = setup();
    let target = undefined(&mut program, main, "x");

    let holder = Rc::new(Cell::new(InstId::NIL));
    let seen = holder.clone();
    program.set_ordinal_build(target, move |p| {
        let spin = p.build(target)?;
        seen.set(object_with_peer(p, main, spin));
        panic!("front-end gave up");
    });

    let result = panic::catch_unwind(AssertUnwindSafe(|| program.build(target)));
    assert!(result.is_err());
    assert!(program.value(target).unwrap().deferred().state().is_in_progress());
    assert!(program.verify().unwrap_err().is_build_in_progress());

    assert_eq!(program.settle_interrupted_builds(), 1);
    assert_eq!(program.settle_interrupted_builds(), 0);
    assert!(program.value(target).unwrap().deferred().state().is_finished());
    assert_eq!(program.build(target), None);

    let member = program.get_string_member(holder.get(), "peer").unwrap();
    assert_eq!(program.get(member).unwrap().name(), UNKNOWN_REPLACE_VALUE);
    assert_eq!(live_spins(&program), 0);
    assert_eq!(program.verify(), Ok(()));
}

#[test]
fn unresolved_builds_leave_an_explicit_gap() {
    let (mut program, main) = setup();
    let target = undefined(&mut program, main, "broken");

    let holder = Rc::new(Cell::new(InstId::NIL));
    let seen = holder.clone();
    program.set_ordinal_build(target, move |p| {
        let spin = p.build(target)?;
        seen.set(object_with_peer(p, main, spin));
        None
    });

    assert_eq!(program.build(target), None);
    let member = program.get_string_member(holder.get(), "peer").unwrap();
    let sentinel = program.get(member).unwrap();
    assert_eq!(sentinel.kind(), &InstKind::Undefined(UndefinedKind::Unresolved));
    assert_eq!(sentinel.name(), UNKNOWN_REPLACE_VALUE);
    assert_eq!(live_spins(&program), 0);
    assert_eq!(program.verify(), Ok(()));
}

#[test]
fn re_entrant_demand_reuses_one_placeholder() {
    let (mut program, main) = setup();
    let target = undefined(&mut program, main, "x");
    let result = FunctionBuilder::new(&mut program, main).emit_make();

    let spins = Rc::new(Cell::new((InstId::NIL, InstId::NIL)));
    let seen = spins.clone();
    program.set_ordinal_build(target, move |p| {
        let first = p.build(target)?;
        let second = p.build(target)?;
        seen.set((first, second));
        Some(result)
    });

    program.build(target);
    let (first, second) = spins.get();
    assert_eq!(first, second);
    assert!(!program.contains(first));
}

#[test]
fn check_and_finish_build_reports_whether_it_ran() {
    let (mut program, main) = setup();
    let target = undefined(&mut program, main, "x");
    program.set_ordinal_build(target, move |_| Some(target));

    assert!(program.check_and_finish_build(target));
    assert!(!program.check_and_finish_build(target));
    assert_eq!(program.build(target), Some(target));
}

#[test]
fn finish_forces_every_pending_build() {
    let (mut program, main) = setup();
    let first = undefined(&mut program, main, "first");
    let second = undefined(&mut program, main, "second");
    let late = undefined(&mut program, main, "late");

    program.set_ordinal_build(first, move |p| {
        // Registered while finishing; must be picked up by the same pass.
        p.set_ordinal_build(late, move |_| Some(late));
        Some(first)
    });
    program.set_ordinal_build(second, move |p| p.build(first));

    assert_eq!(program.finish(), 3);
    assert_eq!(program.finish(), 0);
    for id in [first, second, late] {
        assert!(program.value(id).unwrap().deferred().state().is_finished());
    }
    assert_eq!(program.build(second), Some(first));
    assert_eq!(program.verify(), Ok(()));
}

#[test]
fn rehydrated_values_bypass_their_closure() {
    let mut program = Program::new("db");
    let restored = InstId(40);
    assert!(program.restore_instruction(restored, Instruction::new(InstKind::Make).with_name("stored")));

    let ran = Rc::new(Cell::new(false));
    let flag = ran.clone();
    program.set_ordinal_build(restored, move |_| {
        flag.set(true);
        None
    });

    assert_eq!(program.build(restored), Some(restored));
    assert!(!ran.get());
    assert!(program.get(restored).unwrap().is_from_db());

    let next = program.insert_instruction(Instruction::new(InstKind::Make));
    assert!(next > restored);
}
