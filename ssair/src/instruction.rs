//! Instruction nodes.
//!
//! An [`Instruction`] is the base node of the graph: identity, names, source
//! range, back-references to its function/program/block, flags, and an
//! [`InstKind`] payload. Value-producing kinds additionally carry a
//! [`Value`](crate::value::Value) holding the use-def state.
use bitflags::bitflags;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use strum::{Display, EnumDiscriminants, EnumIs, EnumIter, EnumString, EnumTryAs};

use crate::{
    constants::ConstValue,
    operand::{BlockId, FunctionId, InstId, ProgramId},
    range::SourceRange,
    value::Value,
};

bitflags! {
    /// Node-kind flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct InstructionFlags: u8 {
        /// The node stems from an annotation/decorator rather than regular code.
        const ANNOTATION = 1 << 0;

        /// The node stands for something defined outside the analysed sources
        /// (library function, extern value).
        const EXTERN = 1 << 1;

        /// The node was rehydrated from a stored program. Its type is final and
        /// its deferred builder, if any, already ran.
        const FROM_DB = 1 << 2;
    }
}

/// Operand inline capacity; most instructions reference at most a few values.
pub type Operands = SmallVec<[InstId; 4]>;

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BinaryOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    NotEq,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "||")]
    Or,
}

/// Why an undefined value exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumIs, Display)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UndefinedKind {
    /// A name read before any definition.
    #[default]
    Default,

    /// A member read on an object that does not carry it (yet).
    Member,

    /// The result of a deferred build that produced nothing. Stands in for
    /// the uses of the abandoned placeholder.
    Unresolved,
}

/// Body of a basic block: owned instructions and CFG edges.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BasicBlock {
    pub instructions: Vec<InstId>,
    pub preds: Vec<BlockId>,
    pub succs: Vec<BlockId>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Parameter {
    pub index: usize,

    /// Captured from an enclosing scope rather than passed by the caller.
    pub is_free_value: bool,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Call {
    pub method: InstId,
    pub args: Vec<InstId>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BinOp {
    pub op: BinaryOp,
    pub x: InstId,
    pub y: InstId,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Phi {
    pub edges: Vec<InstId>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Return {
    pub results: Vec<InstId>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Jump {
    pub to: BlockId,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct If {
    pub cond: InstId,
    pub then_block: BlockId,
    pub else_block: BlockId,
}

/// Payload of an instruction.
///
/// The generated [`Opcode`] discriminant (via `strum`) is what diagnostics and
/// the query engine match on.
#[derive(Debug, Clone, PartialEq, EnumIs, EnumTryAs, EnumDiscriminants)]
#[strum_discriminants(name(Opcode), derive(EnumIter, Hash))]
#[cfg_attr(feature = "serde", strum_discriminants(derive(Serialize, Deserialize)))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InstKind {
    Block(BasicBlock),
    Const(ConstValue),
    Undefined(UndefinedKind),
    Parameter(Parameter),

    /// The value standing for a function of the program.
    Function(FunctionId),

    /// Object construction. Its members live in the value's member table.
    Make,
    Call(Call),
    BinOp(BinOp),
    Phi(Phi),
    Return(Return),
    Jump(Jump),
    If(If),
}

impl Opcode {
    pub fn opname(&self) -> &'static str {
        match self {
            Opcode::Block => "block",
            Opcode::Const => "const",
            Opcode::Undefined => "undefined",
            Opcode::Parameter => "parameter",
            Opcode::Function => "function",
            Opcode::Make => "make",
            Opcode::Call => "call",
            Opcode::BinOp => "binop",
            Opcode::Phi => "phi",
            Opcode::Return => "return",
            Opcode::Jump => "jump",
            Opcode::If => "if",
        }
    }

    /// Whether instructions of this kind produce a value.
    pub fn is_value(&self) -> bool {
        !matches!(
            self,
            Opcode::Block | Opcode::Return | Opcode::Jump | Opcode::If
        )
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.opname())
    }
}

impl InstKind {
    pub fn opcode(&self) -> Opcode {
        self.into()
    }

    /// Values referenced by the payload itself, in order, duplicates kept.
    pub fn operands(&self) -> Operands {
        let mut operands = Operands::new();
        match self {
            InstKind::Call(call) => {
                operands.push(call.method);
                operands.extend(call.args.iter().copied());
            }
            InstKind::BinOp(binop) => {
                operands.push(binop.x);
                operands.push(binop.y);
            }
            InstKind::Phi(phi) => operands.extend(phi.edges.iter().copied()),
            InstKind::Return(ret) => operands.extend(ret.results.iter().copied()),
            InstKind::If(branch) => operands.push(branch.cond),
            InstKind::Block(_)
            | InstKind::Const(_)
            | InstKind::Undefined(_)
            | InstKind::Parameter(_)
            | InstKind::Function(_)
            | InstKind::Make
            | InstKind::Jump(_) => {}
        }
        operands
    }

    /// Mutably iterate over the value operands of the payload.
    pub fn operands_mut(&mut self) -> impl Iterator<Item = &mut InstId> {
        let operands: SmallVec<[&mut InstId; 4]> = match self {
            InstKind::Call(call) => std::iter::once(&mut call.method)
                .chain(call.args.iter_mut())
                .collect(),
            InstKind::BinOp(binop) => [&mut binop.x, &mut binop.y].into_iter().collect(),
            InstKind::Phi(phi) => phi.edges.iter_mut().collect(),
            InstKind::Return(ret) => ret.results.iter_mut().collect(),
            InstKind::If(branch) => std::iter::once(&mut branch.cond).collect(),
            _ => SmallVec::new(),
        };
        operands.into_iter()
    }

    /// Remap operands according to a mapping.
    pub fn remap_operands(&mut self, mapping: impl Fn(InstId) -> Option<InstId>) {
        for operand in self.operands_mut() {
            if let Some(new) = mapping(*operand) {
                *operand = new;
            }
        }
    }
}

/// A node of the graph.
#[derive(Debug)]
pub struct Instruction {
    pub(crate) id: InstId,
    pub(crate) name: String,
    pub(crate) verbose_name: String,
    pub(crate) range: Option<SourceRange>,
    pub(crate) function: Option<FunctionId>,
    pub(crate) program: Option<ProgramId>,
    pub(crate) block: Option<BlockId>,
    pub(crate) flags: InstructionFlags,
    pub(crate) kind: InstKind,
    pub(crate) value: Option<Value>,
}

impl Instruction {
    /// Create a detached node. Its id stays [`InstId::NIL`] until a program
    /// inserts it.
    pub fn new(kind: InstKind) -> Self {
        let value = kind.opcode().is_value().then(Value::new);
        Self {
            id: InstId::NIL,
            name: String::new(),
            verbose_name: String::new(),
            range: None,
            function: None,
            program: None,
            block: None,
            flags: InstructionFlags::empty(),
            kind,
            value,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn id(&self) -> InstId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Display name: the verbose name, else the name, else empty.
    pub fn verbose_name(&self) -> &str {
        if !self.verbose_name.is_empty() {
            &self.verbose_name
        } else {
            &self.name
        }
    }

    pub fn set_verbose_name(&mut self, verbose: impl Into<String>) {
        self.verbose_name = verbose.into();
    }

    /// The name, or `t<id>` for anonymous nodes.
    pub fn short_verbose_name(&self) -> String {
        if self.name.is_empty() {
            format!("t{}", self.id.0)
        } else {
            self.name.clone()
        }
    }

    pub fn range(&self) -> Option<&SourceRange> {
        self.range.as_ref()
    }

    /// Last write wins.
    pub fn set_range(&mut self, range: SourceRange) {
        self.range = Some(range);
    }

    /// Source text covered by the node, empty without a range.
    pub fn source_code(&self) -> &str {
        self.range.as_ref().map(|r| r.text()).unwrap_or("")
    }

    /// `n` lines of context around the node, empty without a range.
    pub fn source_code_context(&self, n: usize) -> String {
        self.range
            .as_ref()
            .map(|r| r.text_context(n))
            .unwrap_or_default()
    }

    pub fn function(&self) -> Option<FunctionId> {
        self.function
    }

    pub fn set_function(&mut self, function: FunctionId) {
        self.function = Some(function);
    }

    pub fn program(&self) -> Option<ProgramId> {
        self.program
    }

    pub fn set_program(&mut self, program: ProgramId) {
        self.program = Some(program);
    }

    /// Raw block back-reference. Use [`Program::get_block`](crate::program::Program::get_block)
    /// to resolve it.
    pub fn block(&self) -> Option<BlockId> {
        self.block
    }

    pub fn flags(&self) -> InstructionFlags {
        self.flags
    }

    pub fn is_annotation(&self) -> bool {
        self.flags.contains(InstructionFlags::ANNOTATION)
    }

    pub fn set_annotation(&mut self, b: bool) {
        self.flags.set(InstructionFlags::ANNOTATION, b);
    }

    pub fn is_extern(&self) -> bool {
        self.flags.contains(InstructionFlags::EXTERN)
    }

    pub fn set_extern(&mut self, b: bool) {
        self.flags.set(InstructionFlags::EXTERN, b);
    }

    pub fn is_from_db(&self) -> bool {
        self.flags.contains(InstructionFlags::FROM_DB)
    }

    pub fn set_from_db(&mut self, b: bool) {
        self.flags.set(InstructionFlags::FROM_DB, b);
    }

    pub fn kind(&self) -> &InstKind {
        &self.kind
    }

    pub fn opcode(&self) -> Opcode {
        self.kind.opcode()
    }

    pub fn is_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn as_value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn as_value_mut(&mut self) -> Option<&mut Value> {
        self.value.as_mut()
    }

    /// True only for basic blocks whose name starts with `prefix`.
    pub fn is_block(&self, prefix: &str) -> bool {
        self.kind.is_block() && self.name.starts_with(prefix)
    }

    /// True for undefined values (including member placeholders).
    pub fn is_undefined(&self) -> bool {
        self.kind.is_undefined()
    }

    pub fn is_parameter(&self) -> bool {
        self.kind.is_parameter()
    }

    /// The literal carried by a constant node.
    pub fn const_value(&self) -> Option<&ConstValue> {
        match &self.kind {
            InstKind::Const(value) => Some(value),
            _ => None,
        }
    }

    /// The full operand set: payload operands, then `object`/`key`, then
    /// member keys and member values. Duplicates are kept.
    pub fn operands(&self) -> Operands {
        let mut operands = self.kind.operands();
        if let Some(value) = &self.value {
            operands.extend(value.object());
            operands.extend(value.key());
            for (k, v) in value.members().iter() {
                operands.push(*k);
                operands.push(*v);
            }
        }
        operands
    }

    /// Whether `id` occurs anywhere in the operand set.
    pub fn uses(&self, id: InstId) -> bool {
        self.operands().contains(&id)
    }

    /// One-line textual form, e.g. `t4 = call t1(t2, t3)`.
    pub fn line_disasm(&self) -> String {
        let head = match &self.kind {
            InstKind::Block(_) => return format!("{}:", self.short_verbose_name()),
            InstKind::Const(value) => format!("const {}", value),
            InstKind::Undefined(kind) => format!("undefined {}", kind),
            InstKind::Parameter(param) => format!("param {}", param.index),
            InstKind::Function(function) => format!("function {}", function),
            InstKind::Make => "make".to_string(),
            InstKind::Call(call) => format!(
                "call {}({})",
                call.method,
                call.args
                    .iter()
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            InstKind::BinOp(binop) => format!("{} {} {}", binop.x, binop.op, binop.y),
            InstKind::Phi(phi) => format!(
                "phi [{}]",
                phi.edges
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            InstKind::Return(ret) => {
                return format!(
                    "return {}",
                    ret.results
                        .iter()
                        .map(|r| r.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            InstKind::Jump(jump) => return format!("jump {}", jump.to),
            InstKind::If(branch) => {
                return format!(
                    "if {} then {} else {}",
                    branch.cond, branch.then_block, branch.else_block
                );
            }
        };
        format!("{} = {}", self.id, head)
    }
}
