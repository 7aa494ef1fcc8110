mod common;

use pretty_assertions::assert_eq;
use ssacore::{
    CoreError,
    config::CompileConfig,
    ext::ssalog::LogSink,
    session::CompileSession,
    storage::{self, ProgramSnapshot, StoredProgram},
};
use ssair::{
    builder::FunctionBuilder,
    program::Program,
    types::{Type, aggregate::ClassBlueprint},
};

fn compiled() -> Program {
    let mut session = CompileSession::new(CompileConfig::default(), common::registry());
    session
        .compile_file("main.toy", "object o\nset o x 1\nset o y 2\nconst n 4\ninclude dep.toy\n")
        .unwrap();

    let main = session.main_function();
    let program = session.program_mut();
    program.add_blueprint(ClassBlueprint::new("Point"));
    let instance = FunctionBuilder::new(program, main).emit_make();
    program.set_type(instance, Type::Blueprint("Point".into()));
    session.into_program()
}

#[test]
fn snapshots_survive_encoding() {
    let program = compiled();
    let sink = LogSink::default();

    let bytes = storage::store(&sink, &program).unwrap();
    let restored = storage::load(&sink, &bytes).unwrap();

    assert_eq!(restored.id(), program.id());
    assert_eq!(restored.name(), program.name());
    assert_eq!(restored.instruction_count(), program.instruction_count());
    for original in program.instructions() {
        let copy = restored.get(original.id()).unwrap();
        assert_eq!(copy.name(), original.name());
        assert_eq!(copy.kind(), original.kind());
        assert_eq!(copy.block(), original.block());
        assert_eq!(copy.source_code(), original.source_code());
        assert!(copy.is_from_db());

        if let (Some(a), Some(b)) = (original.as_value(), copy.as_value()) {
            assert_eq!(b.users(), a.users());
            assert_eq!(b.members(), a.members());
            assert_eq!(b.ty(), a.ty());
            assert_eq!(
                b.all_variables().keys().collect::<Vec<_>>(),
                a.all_variables().keys().collect::<Vec<_>>()
            );
        }
    }

    assert_eq!(restored.function_by_name("main"), program.function_by_name("main"));
    assert_eq!(restored.blueprint("Point"), program.blueprint("Point"));
    assert_eq!(restored.include_files().collect::<Vec<_>>(), vec!["dep.toy"]);
    assert_eq!(
        restored.file_list().collect::<Vec<_>>(),
        program.file_list().collect::<Vec<_>>()
    );
    assert_eq!(restored.verify(), Ok(()));
}

#[test]
fn rehydrated_values_are_not_specialised_again() {
    let program = compiled();
    let mut restored = ProgramSnapshot::capture(&program).rehydrate();

    let object = restored
        .instructions()
        .find(|i| i.as_value().and_then(|v| v.variable("o")).is_some())
        .map(|i| i.id())
        .unwrap();
    restored.set_type(object, Type::Blueprint("Point".into()));

    assert_eq!(restored.type_of(object), Some(&Type::Blueprint("Point".into())));
    assert!(restored.blueprint("Point").unwrap().instances.iter().all(|i| *i != object));
    assert_eq!(restored.get_string_member(object, "y").map(|_| ()), Some(()));
}

#[test]
fn new_nodes_never_collide_with_restored_ones() {
    let program = compiled();
    let mut restored = ProgramSnapshot::capture(&program).rehydrate();
    let main = restored.function_by_name("main").unwrap().id;

    let fresh = FunctionBuilder::new(&mut restored, main).emit_make();
    assert!(program.instructions().all(|i| i.id() < fresh));
    assert!(!restored.get(fresh).unwrap().is_from_db());
}

#[test]
fn corrupted_envelopes_are_rejected() {
    let program = compiled();
    let sink = LogSink::default();
    let bytes = storage::store(&sink, &program).unwrap();

    let mut envelope: StoredProgram = serde_cbor::from_slice(&bytes).unwrap();
    envelope.magic = *b"\0NOTSSA\0";
    let bad_magic = serde_cbor::to_vec(&envelope).unwrap();
    assert!(matches!(storage::decode(&sink, &bad_magic), Err(CoreError::InvalidMagic)));

    let mut envelope: StoredProgram = serde_cbor::from_slice(&bytes).unwrap();
    envelope.version_req = semver::VersionReq::parse("=0.0.0-never").unwrap();
    let wrong_version = serde_cbor::to_vec(&envelope).unwrap();
    assert!(matches!(
        storage::decode(&sink, &wrong_version),
        Err(CoreError::VersionMismatch { .. })
    ));

    assert!(matches!(
        storage::decode(&sink, b"definitely not cbor"),
        Err(CoreError::SnapshotDecode(_))
    ));
}
