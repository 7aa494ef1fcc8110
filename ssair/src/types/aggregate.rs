//! Aggregate types
//!
//! - [`ObjectType`]: a concrete object shape with ordered field types.
//! - [`ClassBlueprint`]: a class template. A blueprint stays generic until it is
//!   applied to a concrete instance value; applying fixes the field types from
//!   the members the instance actually carries.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIs};

use crate::{omap::OrderedMap, operand::InstId, types::Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumIs, Display)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ObjectKind {
    #[default]
    Struct,
    Class,
    Map,
    Slice,
    Tuple,
}

/// Concrete object type.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObjectType {
    pub name: String,
    pub kind: ObjectKind,
    pub fields: OrderedMap<String, Type>,
    pub methods: OrderedMap<String, InstId>,

    /// Name of the blueprint this type was specialised from.
    pub blueprint: Option<String>,

    /// Instance the type was bound to.
    pub this: Option<InstId>,
}

impl ObjectType {
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn field(&self, name: &str) -> Option<&Type> {
        self.fields.get(&name.to_string())
    }

    pub fn method(&self, name: &str) -> Option<InstId> {
        self.methods.get(&name.to_string()).copied()
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {{", self.kind, self.name)?;
        for (i, (name, ty)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " {}: {}", name, ty)?;
        }
        write!(f, " }}")
    }
}

/// Class template registered in a program under its name.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClassBlueprint {
    pub name: String,

    /// Parent blueprints, by name, nearest first.
    pub parents: Vec<String>,

    /// Declared field types.
    pub fields: OrderedMap<String, Type>,

    /// Method name to function value.
    pub methods: OrderedMap<String, InstId>,

    /// Static member name to value.
    pub static_members: OrderedMap<String, InstId>,

    pub constructor: Option<InstId>,

    /// Every value this blueprint was applied to, in application order.
    pub instances: Vec<InstId>,
}

impl ClassBlueprint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_parent(&mut self, parent: impl Into<String>) {
        let parent = parent.into();
        if !self.parents.contains(&parent) {
            self.parents.push(parent);
        }
    }

    pub fn add_field(&mut self, name: impl Into<String>, ty: Type) {
        self.fields.set(name.into(), ty);
    }

    pub fn add_method(&mut self, name: impl Into<String>, function: InstId) {
        self.methods.set(name.into(), function);
    }

    pub fn add_static_member(&mut self, name: impl Into<String>, value: InstId) {
        self.static_members.set(name.into(), value);
    }

    /// Specialise this blueprint for `this`.
    ///
    /// `ancestors` are the parent blueprints in lookup order (nearest first);
    /// their fields and methods are inherited unless overridden. For each
    /// declared field, `resolve_member` is asked for the type of the member
    /// the instance actually carries; the declared type is the fallback.
    pub fn apply(
        &self,
        this: InstId,
        ancestors: &[&ClassBlueprint],
        resolve_member: impl Fn(&str) -> Option<Type>,
    ) -> ObjectType {
        let mut object = ObjectType::new(self.name.clone(), ObjectKind::Class);
        object.blueprint = Some(self.name.clone());
        object.this = Some(this);

        for blueprint in std::iter::once(self).chain(ancestors.iter().copied()) {
            for (name, declared) in blueprint.fields.iter() {
                if object.fields.contains_key(name) {
                    continue;
                }
                let ty = resolve_member(name)
                    .filter(|ty| !ty.is_any())
                    .unwrap_or_else(|| declared.clone());
                object.fields.set(name.clone(), ty);
            }

            for (name, function) in blueprint.methods.iter() {
                if !object.methods.contains_key(name) {
                    object.methods.set(name.clone(), *function);
                }
            }
        }

        object
    }
}
