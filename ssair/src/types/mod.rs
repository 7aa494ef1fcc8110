//! Types module
//!
//! The type of a value is a closed [`Type`] enumeration. Three kinds get special
//! treatment when attached to a value through
//! [`Program::set_type`](crate::program::Program::set_type):
//!
//! - [`Type::Blueprint`] names a [`ClassBlueprint`](aggregate::ClassBlueprint)
//!   which is specialised against the concrete value, yielding a
//!   [`Type::Object`].
//! - [`Type::Function`] carries a [`FunctionType`](function::FunctionType)
//!   whose receiver slot and annotation hooks observe the value.
//! - everything else is assigned as-is.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIs, EnumIter, EnumString, EnumTryAs};

use crate::{
    operand::InstId,
    types::{aggregate::ObjectType, function::FunctionType},
};

pub mod aggregate;
pub mod function;

/// Non-composite types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIs, EnumIter, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BasicKind {
    /// Universal type, the default of every value.
    Any,
    Null,
    Undefined,
    Boolean,
    Number,
    String,
    Bytes,
    Error,
}

/// Any type a value can carry.
#[derive(Debug, Clone, PartialEq, EnumIs, EnumTryAs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Type {
    Basic(BasicKind),

    /// A concrete object type, usually produced by specialising a blueprint.
    Object(ObjectType),

    /// Reference (by name) to a class blueprint registered in the program.
    Blueprint(String),

    Function(FunctionType),
}

impl Type {
    pub fn any() -> Self {
        Type::Basic(BasicKind::Any)
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Type::Basic(BasicKind::Any))
    }

    /// Short kind label, useful in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Type::Basic(_) => "basic",
            Type::Object(_) => "object",
            Type::Blueprint(_) => "blueprint",
            Type::Function(_) => "function",
        }
    }

    /// Instruction ids embedded in the type: receivers and method values,
    /// including those of nested field, parameter and return types.
    pub fn ids(&self) -> Vec<InstId> {
        let mut ids = Vec::new();
        self.clone().visit_ids(&mut |id| ids.push(*id));
        ids
    }

    /// Rewrite every embedded occurrence of `old` to `new`.
    pub fn remap_ids(&mut self, old: InstId, new: InstId) {
        self.visit_ids(&mut |id| {
            if *id == old {
                *id = new;
            }
        });
    }

    fn visit_ids(&mut self, f: &mut impl FnMut(&mut InstId)) {
        match self {
            Type::Basic(_) | Type::Blueprint(_) => {}
            Type::Object(object) => {
                object.this.iter_mut().chain(object.methods.values_mut()).for_each(&mut *f);
                for field in object.fields.values_mut() {
                    field.visit_ids(f);
                }
            }
            Type::Function(function) => {
                function.this.iter_mut().for_each(&mut *f);
                for ty in function.params.iter_mut().chain(function.returns.iter_mut()) {
                    ty.visit_ids(f);
                }
            }
        }
    }
}

impl Default for Type {
    fn default() -> Self {
        Type::any()
    }
}

impl From<BasicKind> for Type {
    fn from(value: BasicKind) -> Self {
        Type::Basic(value)
    }
}

impl From<ObjectType> for Type {
    fn from(value: ObjectType) -> Self {
        Type::Object(value)
    }
}

impl From<FunctionType> for Type {
    fn from(value: FunctionType) -> Self {
        Type::Function(value)
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Basic(kind) => write!(f, "{}", kind),
            Type::Object(object) => write!(f, "{}", object),
            Type::Blueprint(name) => write!(f, "blueprint {}", name),
            Type::Function(function) => write!(f, "{}", function),
        }
    }
}
