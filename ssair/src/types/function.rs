//! Function types, receiver slots and annotation hooks.
use std::{fmt, sync::Arc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{operand::InstId, program::Program, types::Type};

/// Callback run with the concrete value once a function type is attached to it.
///
/// Hooks model decorator-style annotations: they may inspect the value and
/// mutate the program further. They are compared by identity.
#[derive(Clone)]
pub struct AnnotationHook(Arc<dyn Fn(&mut Program, InstId)>);

impl AnnotationHook {
    pub fn new(f: impl Fn(&mut Program, InstId) + 'static) -> Self {
        AnnotationHook(Arc::new(f))
    }

    pub fn call(&self, program: &mut Program, this: InstId) {
        (self.0)(program, this)
    }
}

impl fmt::Debug for AnnotationHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnnotationHook({:p})", Arc::as_ptr(&self.0))
    }
}

impl PartialEq for AnnotationHook {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

/// Signature of a callable value.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FunctionType {
    pub name: String,
    pub params: Vec<Type>,
    pub returns: Vec<Type>,
    pub is_variadic: bool,

    /// Receiver slot. When set, attaching this type to a value makes the value
    /// point to the receiver.
    pub this: Option<InstId>,

    /// Hooks run, in order, every time the type is attached to a value.
    /// Not persisted: rehydrated values never re-run annotations.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub annotation_hooks: Vec<AnnotationHook>,
}

impl FunctionType {
    pub fn new(name: impl Into<String>, params: Vec<Type>, returns: Vec<Type>) -> Self {
        Self {
            name: name.into(),
            params,
            returns,
            ..Default::default()
        }
    }

    pub fn with_receiver(mut self, this: InstId) -> Self {
        self.this = Some(this);
        self
    }

    pub fn with_annotation(mut self, hook: AnnotationHook) -> Self {
        self.annotation_hooks.push(hook);
        self
    }

    /// Return type, `any` when the function returns nothing or several values.
    pub fn return_type(&self) -> Type {
        match self.returns.as_slice() {
            [single] => single.clone(),
            _ => Type::any(),
        }
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if self.is_variadic && i + 1 == self.params.len() {
                write!(f, "...")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ")")?;
        match self.returns.as_slice() {
            [] => Ok(()),
            [single] => write!(f, " -> {}", single),
            many => {
                write!(f, " -> (")?;
                for (i, ret) in many.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", ret)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BasicKind;

    #[test]
    fn hooks_compare_by_identity() {
        let a = AnnotationHook::new(|_, _| {});
        let b = AnnotationHook::new(|_, _| {});
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn display_signature() {
        let mut ty = FunctionType::new(
            "join",
            vec![BasicKind::String.into(), BasicKind::String.into()],
            vec![BasicKind::String.into()],
        );
        assert_eq!(ty.to_string(), "fn join(string, string) -> string");
        ty.is_variadic = true;
        ty.returns.push(BasicKind::Error.into());
        assert_eq!(ty.to_string(), "fn join(string, ...string) -> (string, error)");
    }
}
