//! A function `f` instantiating class `C`, whose `make` method calls `f`
//! back. Either side may be demanded first; both orders must converge.
use pretty_assertions::assert_eq;
use ssair::{
    builder::FunctionBuilder,
    constants::ConstValue,
    instruction::{InstKind, Instruction},
    operand::{FunctionId, InstId},
    program::Program,
    types::{Type, aggregate::ClassBlueprint},
};

struct Scenario {
    program: Program,
    f_value: InstId,
    class_node: InstId,
}

fn scenario() -> Scenario {
    let mut program = Program::new("mutual");
    let main = program.new_function("main", None);
    let f = program.new_function("f", Some(main));
    let f_value = program.function(f).unwrap().value;
    let class_node = FunctionBuilder::new(&mut program, main).emit_undefined("C");

    // fn f() { return C() }
    program.set_ordinal_build(f_value, move |p| {
        let class = p.build(class_node)?;
        let mut builder = FunctionBuilder::new(p, f);
        let instance = builder.emit_call(class, vec![]);
        builder.emit_return(vec![instance]);
        Some(f_value)
    });

    // class C { make() { let this = new C; f(this); return this } }
    program.set_ordinal_build(class_node, move |p| {
        p.add_blueprint(ClassBlueprint::new("C"));
        let method = p.new_function("C.make", Some(main));
        let method_value = p.function(method)?.value;

        let this = FunctionBuilder::new(p, method).emit_make();
        p.set_type(this, Type::Blueprint("C".into()));
        let callee = p.build(f_value)?;

        let mut builder = FunctionBuilder::new(p, method);
        builder.emit_call(callee, vec![this]);
        builder.emit_return(vec![this]);

        let mut builder = FunctionBuilder::new(p, main);
        let class = builder.emit_make();
        let key = builder.emit_const("make");
        builder.assign_member(class, key, method_value);
        p.blueprint_mut("C")?.add_method("make", method_value);
        Some(class)
    });

    Scenario {
        program,
        f_value,
        class_node,
    }
}

fn calls_in(program: &Program, function: FunctionId) -> Vec<(InstId, Vec<InstId>)> {
    let function = program.function(function).unwrap();
    function
        .blocks
        .iter()
        .flat_map(|b| program.block(*b).unwrap().instructions.clone())
        .filter_map(|id| match program.get(id).unwrap().kind() {
            InstKind::Call(call) => Some((call.method, call.args.clone())),
            _ => None,
        })
        .collect()
}

/// Order-independent description of the graph.
fn shape(program: &Program) -> Vec<String> {
    let mut shape: Vec<String> = program
        .instructions()
        .map(|i| format!("{} {}", i.opcode(), i.name()))
        .collect();
    shape.sort();
    shape
}

fn check_converged(s: &Scenario) {
    let program = &s.program;
    let class = program.value(s.class_node).unwrap().deferred().resolved().unwrap();
    let f = program.function_by_name("f").unwrap().id;
    let method = program.function_by_name("C.make").unwrap();

    // f instantiates the real class object.
    assert_eq!(calls_in(program, f), vec![(class, vec![])]);

    // C.make calls the real f.
    let make_calls = calls_in(program, method.id);
    assert_eq!(make_calls.len(), 1);
    assert_eq!(make_calls[0].0, s.f_value);

    let this = make_calls[0].1[0];
    assert!(matches!(program.type_of(this), Some(Type::Object(o)) if o.blueprint.as_deref() == Some("C")));
    assert_eq!(program.blueprint("C").unwrap().instances, vec![this]);
    assert_eq!(program.blueprint("C").unwrap().methods.get(&"make".to_string()), Some(&method.value));
    assert_eq!(program.get_string_member(class, "make"), Some(method.value));

    assert!(
        program
            .instructions()
            .all(|i| !matches!(i.const_value(), Some(ConstValue::Placeholder(_))))
    );
    assert_eq!(program.verify(), Ok(()));
}

#[test]
fn building_f_first_converges() {
    let mut s = scenario();
    assert_eq!(s.program.build(s.f_value), Some(s.f_value));
    s.program.finish();
    check_converged(&s);
}

#[test]
fn building_class_first_converges() {
    let mut s = scenario();
    assert!(s.program.build(s.class_node).is_some());
    s.program.finish();
    check_converged(&s);
}

#[test]
fn both_orders_produce_the_same_graph() {
    let mut f_first = scenario();
    f_first.program.build(f_first.f_value);
    let mut c_first = scenario();
    c_first.program.build(c_first.class_node);

    assert_eq!(shape(&f_first.program), shape(&c_first.program));
    assert_eq!(
        f_first.program.instruction_count(),
        c_first.program.instruction_count()
    );
}

#[test]
fn finishing_builds_everything() {
    let mut s = scenario();
    // `f` comes first and pulls `C` in through its own closure.
    assert_eq!(s.program.finish(), 1);
    check_converged(&s);

    let orphan = s.program.insert_instruction(Instruction::new(InstKind::Make));
    assert!(!s.program.value(orphan).unwrap().deferred().has_builder());
}
