//! Program snapshots.
//!
//! A [`ProgramSnapshot`] is a plain, serializable copy of a [`Program`]: every
//! node with its id, kind, ranges and use-def state, plus functions,
//! blueprints and source files. [`encode`] wraps it in a [`StoredProgram`]
//! envelope (magic bytes and a version requirement) and writes both layers
//! with `serde_cbor`. [`ProgramSnapshot::rehydrate`] rebuilds a program whose
//! nodes keep their ids and are flagged `FROM_DB`.
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ssair::{
    function::Function,
    instruction::{InstKind, Instruction, InstructionFlags},
    operand::{FunctionId, InstId, ProgramId},
    program::Program,
    range::{SourceEditor, SourceRange},
    types::{Type, aggregate::ClassBlueprint},
    value::Variable,
};

use crate::{
    ext::ssalog::HasLogSink,
    magic::SNAPSHOT_MAGIC_BYTES,
    session::crate_version,
    ssaerror, ssatrace,
    utils::error::{CoreError, CoreResult},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeRecord {
    pub url: String,
    pub start: usize,
    pub end: usize,
}

impl RangeRecord {
    fn capture(range: &SourceRange) -> Self {
        Self {
            url: range.editor().url().to_string(),
            start: range.start(),
            end: range.end(),
        }
    }

    fn restore(&self, program: &Program) -> Option<SourceRange> {
        let editor = program.file(&self.url)?;
        Some(SourceRange::new(Arc::clone(editor), self.start, self.end))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableRecord {
    pub name: String,
    pub range: Option<RangeRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRecord {
    pub ty: Type,
    pub users: Vec<InstId>,
    pub object: Option<InstId>,
    pub key: Option<InstId>,
    pub members: Vec<(InstId, InstId)>,
    pub variables: Vec<VariableRecord>,
    pub mask: Vec<InstId>,
    pub pointer: Vec<InstId>,
    pub reference: Option<InstId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionRecord {
    pub id: InstId,
    pub name: String,
    pub verbose_name: Option<String>,
    pub kind: InstKind,
    pub flags: InstructionFlags,
    pub function: Option<FunctionId>,
    pub block: Option<InstId>,
    pub range: Option<RangeRecord>,
    pub value: Option<ValueRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub url: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramSnapshot {
    pub id: ProgramId,
    pub name: String,
    pub instructions: Vec<InstructionRecord>,
    pub functions: Vec<Function>,
    pub blueprints: Vec<ClassBlueprint>,
    pub include_files: Vec<String>,
    pub files: Vec<FileRecord>,
}

impl ProgramSnapshot {
    pub fn capture(program: &Program) -> Self {
        let instructions = program
            .instructions()
            .map(|inst| {
                let value = inst.as_value().map(|value| ValueRecord {
                    ty: value.ty().clone(),
                    users: value.users().to_vec(),
                    object: value.object(),
                    key: value.key(),
                    members: value.members().iter().map(|(k, v)| (*k, *v)).collect(),
                    variables: value
                        .all_variables()
                        .values()
                        .map(|variable| VariableRecord {
                            name: variable.name.clone(),
                            range: variable.range.as_ref().map(RangeRecord::capture),
                        })
                        .collect(),
                    mask: value.mask().collect(),
                    pointer: value.pointer().to_vec(),
                    reference: value.reference(),
                });
                let verbose_name = (inst.verbose_name() != inst.name()).then(|| inst.verbose_name().to_string());
                InstructionRecord {
                    id: inst.id(),
                    name: inst.name().to_string(),
                    verbose_name,
                    kind: inst.kind().clone(),
                    flags: inst.flags(),
                    function: inst.function(),
                    block: inst.block().map(|b| b.inst()),
                    range: inst.range().map(RangeRecord::capture),
                    value,
                }
            })
            .collect();

        let files = program
            .file_list()
            .filter_map(|(url, _)| program.file(url))
            .map(|editor| FileRecord {
                url: editor.url().to_string(),
                source: editor.source().to_string(),
            })
            .collect();

        Self {
            id: program.id(),
            name: program.name().to_string(),
            instructions,
            functions: program.functions().cloned().collect(),
            blueprints: program.blueprints().cloned().collect(),
            include_files: program.include_files().map(str::to_string).collect(),
            files,
        }
    }

    /// Rebuild the program.
    ///
    /// Nodes are restored first so that every cross reference resolves, then
    /// their back-references and use-def state are replayed. User lists are
    /// restored in their stored order before members are re-attached.
    pub fn rehydrate(&self) -> Program {
        let mut program = Program::with_id(self.id, self.name.clone());
        for file in &self.files {
            program.add_file(Arc::new(SourceEditor::new(file.source.clone()).with_url(file.url.clone())));
        }

        for record in &self.instructions {
            let mut inst = Instruction::new(record.kind.clone()).with_name(record.name.clone());
            if let Some(verbose_name) = &record.verbose_name {
                inst.set_verbose_name(verbose_name.clone());
            }
            if let Some(function) = record.function {
                inst.set_function(function);
            }
            if let Some(range) = record.range.as_ref().and_then(|r| r.restore(&program)) {
                inst.set_range(range);
            }
            inst.set_annotation(record.flags.contains(InstructionFlags::ANNOTATION));
            inst.set_extern(record.flags.contains(InstructionFlags::EXTERN));
            program.restore_instruction(record.id, inst);
        }

        for record in &self.instructions {
            let id = record.id;
            if let Some(block) = record.block.and_then(|b| program.block_id(b)) {
                program.set_block(id, block);
            }
            let Some(value) = &record.value else {
                continue;
            };

            for user in &value.users {
                program.add_user(id, *user);
            }
            if let (Some(object), Some(key)) = (value.object, value.key) {
                program.set_member_access(id, object, key);
            }
            for (key, member) in &value.members {
                program.add_member(id, *key, *member);
            }
            for variable in &value.variables {
                let mut restored = Variable::new(variable.name.clone(), id);
                restored.range = variable.range.as_ref().and_then(|r| r.restore(&program));
                if let Some(v) = program.value_mut(id) {
                    v.add_variable(restored);
                }
            }
            for masked_by in &value.mask {
                program.add_mask(id, *masked_by);
            }
            if let Some(v) = program.value_mut(id) {
                for pointer in &value.pointer {
                    v.add_pointer(*pointer);
                }
                if let Some(reference) = value.reference {
                    v.set_reference(reference);
                }
            }
            program.set_type(id, value.ty.clone());
        }

        for function in &self.functions {
            program.restore_function(function.clone());
        }
        for blueprint in &self.blueprints {
            program.add_blueprint(blueprint.clone());
        }
        for include in &self.include_files {
            program.push_include_file(include.clone());
        }
        program
    }
}

/// Envelope of every encoded snapshot.
///
/// This should be kept stable across all versions. The payload is itself a
/// CBOR-encoded [`ProgramSnapshot`], checked against `version_req` before it
/// is decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredProgram {
    pub magic: [u8; 8],
    pub version_req: semver::VersionReq,
    pub data: Vec<u8>,
}

/// Encode `snapshot` for storage.
pub fn encode(session: &impl HasLogSink, snapshot: &ProgramSnapshot) -> CoreResult<Vec<u8>> {
    let data = serde_cbor::to_vec(snapshot).map_err(|e| {
        ssaerror!(session, "Failed to serialize program snapshot: {}", e);
        CoreError::SnapshotEncode(e.to_string())
    })?;

    let version = crate_version();
    let storage = StoredProgram {
        magic: SNAPSHOT_MAGIC_BYTES,
        version_req: semver::VersionReq {
            comparators: vec![semver::Comparator {
                op: semver::Op::Exact,
                major: version.major,
                minor: Some(version.minor),
                patch: Some(version.patch),
                pre: version.pre.clone(),
            }],
        },
        data,
    };

    ssatrace!(
        session,
        "Serializing snapshot of `{}` ({} instructions) with version requirement {}",
        snapshot.name,
        snapshot.instructions.len(),
        storage.version_req
    );
    serde_cbor::to_vec(&storage).map_err(|e| {
        ssaerror!(session, "Failed to serialize program snapshot envelope: {}", e);
        CoreError::SnapshotEncode(e.to_string())
    })
}

/// Decode a snapshot written by [`encode`].
pub fn decode(session: &impl HasLogSink, data: &[u8]) -> CoreResult<ProgramSnapshot> {
    ssatrace!(session, "Deserializing program snapshot ({} bytes)", data.len());

    let storage: StoredProgram = serde_cbor::from_slice(data).map_err(|e| {
        ssaerror!(session, "Failed to deserialize program snapshot envelope: {}", e);
        CoreError::SnapshotDecode(e.to_string())
    })?;

    if storage.magic != SNAPSHOT_MAGIC_BYTES {
        ssaerror!(session, "Invalid magic bytes in program snapshot");
        return Err(CoreError::InvalidMagic);
    }

    let version = crate_version();
    if !storage.version_req.matches(&version) {
        ssaerror!(
            session,
            "Incompatible program snapshot version: required {}, found {}",
            storage.version_req,
            version
        );
        return Err(CoreError::VersionMismatch {
            required: storage.version_req,
            found: version,
        });
    }

    serde_cbor::from_slice(&storage.data).map_err(|e| {
        ssaerror!(session, "Failed to deserialize program snapshot: {}", e);
        CoreError::SnapshotDecode(e.to_string())
    })
}

/// Rehydrate a program straight from encoded bytes.
pub fn load(session: &impl HasLogSink, data: &[u8]) -> CoreResult<Program> {
    Ok(decode(session, data)?.rehydrate())
}

/// Capture and encode `program`.
pub fn store(session: &impl HasLogSink, program: &Program) -> CoreResult<Vec<u8>> {
    encode(session, &ProgramSnapshot::capture(program))
}
