//! Type binding.
//!
//! [`Program::set_type`] is the only way the type of a value changes. It
//! dispatches on the kind of the incoming type:
//!
//! - a blueprint reference is specialised against the value it is attached to;
//! - a function type is stored, its receiver slot is bound to the value and its
//!   annotation hooks are run;
//! - anything else is assigned.
//!
//! Rehydrated values already carry their final type and are assigned directly.
use std::collections::BTreeSet;

use log::{trace, warn};

use crate::{
    operand::InstId,
    program::Program,
    types::{
        Type,
        aggregate::{ClassBlueprint, ObjectType},
    },
};

impl Program {
    pub fn set_type(&mut self, id: InstId, ty: Type) {
        let Some(inst) = self.get(id) else {
            warn!("set_type: {} is not an instruction of program `{}`", id, self.name);
            return;
        };
        if !inst.is_value() {
            warn!("set_type: {} ({}) does not produce a value", id, inst.opcode());
            return;
        }

        if inst.is_from_db() {
            self.assign_type(id, ty);
            return;
        }

        match ty {
            Type::Blueprint(name) => match self.specialise(&name, id) {
                Some(object) => self.assign_type(id, Type::Object(object)),
                None => {
                    warn!("set_type: unknown blueprint `{}` for {}, assigned as-is", name, id);
                    self.assign_type(id, Type::Blueprint(name));
                }
            },
            Type::Function(function) => {
                let receiver = function.this;
                let hooks = function.annotation_hooks.clone();
                self.assign_type(id, Type::Function(function));

                if let Some(receiver) = receiver {
                    self.point(id, receiver);
                }
                for hook in hooks {
                    hook.call(self, id);
                }
            }
            ty => self.assign_type(id, ty),
        }
    }

    /// Optional form of [`set_type`](Self::set_type); `None` is a no-op.
    pub fn set_type_opt(&mut self, id: InstId, ty: Option<Type>) {
        if let Some(ty) = ty {
            self.set_type(id, ty);
        }
    }

    pub fn type_of(&self, id: InstId) -> Option<&Type> {
        self.value(id).map(|v| v.ty())
    }

    /// Parents of blueprint `name`, transitively, nearest first. Unknown
    /// parents are skipped and inheritance cycles are cut.
    pub fn blueprint_ancestors(&self, name: &str) -> Vec<&ClassBlueprint> {
        let mut visited = BTreeSet::from([name.to_string()]);
        let mut ancestors = Vec::new();
        let mut queue: Vec<&str> = self
            .blueprint(name)
            .map(|b| b.parents.iter().map(String::as_str).collect())
            .unwrap_or_default();

        let mut index = 0;
        while index < queue.len() {
            let parent = queue[index];
            index += 1;
            if !visited.insert(parent.to_string()) {
                continue;
            }
            let Some(blueprint) = self.blueprint(parent) else {
                trace!("Blueprint `{}` has unknown ancestor `{}`", name, parent);
                continue;
            };
            queue.extend(blueprint.parents.iter().map(String::as_str));
            ancestors.push(blueprint);
        }
        ancestors
    }

    fn specialise(&mut self, name: &str, this: InstId) -> Option<ObjectType> {
        let blueprint = self.blueprint(name)?;
        let ancestors = self.blueprint_ancestors(name);
        let object = blueprint.apply(this, &ancestors, |field| {
            self.get_string_member(this, field)
                .and_then(|member| self.type_of(member))
                .cloned()
        });

        if let Some(blueprint) = self.blueprint_mut(name) {
            if !blueprint.instances.contains(&this) {
                blueprint.instances.push(this);
            }
        }
        trace!("Specialised blueprint `{}` for {}", name, this);
        Some(object)
    }

    fn assign_type(&mut self, id: InstId, ty: Type) {
        if let Some(value) = self.value_mut(id) {
            value.ty = ty;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{
        constants::ConstValue,
        instruction::{InstKind, Instruction},
        types::{
            BasicKind,
            function::{AnnotationHook, FunctionType},
        },
    };

    fn make(program: &mut Program) -> InstId {
        program.insert_instruction(Instruction::new(InstKind::Make))
    }

    #[test]
    fn blueprint_is_specialised_from_members() {
        let mut program = Program::new("bp");
        let mut blueprint = ClassBlueprint::new("Point");
        blueprint.add_field("x", Type::any());
        blueprint.add_field("y", BasicKind::Number.into());
        program.add_blueprint(blueprint);

        let obj = make(&mut program);
        let key = program.insert_instruction(Instruction::new(InstKind::Const(ConstValue::from("x"))));
        let val = program.insert_instruction(Instruction::new(InstKind::Const(ConstValue::Int(1))));
        program.set_type(val, BasicKind::Number.into());
        program.add_member(obj, key, val);

        program.set_type(obj, Type::Blueprint("Point".into()));

        let Some(Type::Object(object)) = program.type_of(obj) else {
            panic!("expected an object type, got {:?}", program.type_of(obj));
        };
        assert_eq!(object.field("x"), Some(&BasicKind::Number.into()));
        assert_eq!(object.field("y"), Some(&BasicKind::Number.into()));
        assert_eq!(program.blueprint("Point").unwrap().instances, vec![obj]);
    }

    #[test]
    fn unknown_blueprint_is_assigned_raw() {
        let mut program = Program::new("raw");
        let obj = make(&mut program);
        program.set_type(obj, Type::Blueprint("Missing".into()));
        assert_eq!(program.type_of(obj), Some(&Type::Blueprint("Missing".into())));
    }

    #[test]
    fn from_db_values_skip_specialisation() {
        let mut program = Program::new("db");
        program.add_blueprint(ClassBlueprint::new("C"));
        let obj = make(&mut program);
        program.get_mut(obj).unwrap().set_from_db(true);

        program.set_type(obj, Type::Blueprint("C".into()));
        assert_eq!(program.type_of(obj), Some(&Type::Blueprint("C".into())));
        assert!(program.blueprint("C").unwrap().instances.is_empty());
    }

    #[test]
    fn function_type_binds_receiver_then_runs_hooks() {
        let mut program = Program::new("fn");
        let receiver = make(&mut program);
        let method = make(&mut program);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let hook_seen = seen.clone();
        let hook = AnnotationHook::new(move |program, this| {
            hook_seen
                .borrow_mut()
                .push((this, program.value(this).and_then(|v| v.reference())));
        });
        let ty = FunctionType::new("m", vec![], vec![])
            .with_receiver(receiver)
            .with_annotation(hook);

        program.set_type(method, ty.into());

        assert_eq!(*seen.borrow(), vec![(method, Some(receiver))]);
        assert_eq!(program.value(receiver).unwrap().pointer(), &[method]);
        assert!(program.type_of(method).unwrap().is_function());
    }

    #[test]
    fn ancestors_are_walked_once() {
        let mut program = Program::new("anc");
        let mut a = ClassBlueprint::new("A");
        a.add_parent("B");
        let mut b = ClassBlueprint::new("B");
        b.add_parent("A");
        b.add_parent("Ghost");
        program.add_blueprint(a);
        program.add_blueprint(b);

        let names: Vec<_> = program
            .blueprint_ancestors("A")
            .into_iter()
            .map(|b| b.name.clone())
            .collect();
        assert_eq!(names, vec!["B".to_string()]);
    }

    #[test]
    fn none_and_missing_nodes_are_ignored() {
        let mut program = Program::new("none");
        let obj = make(&mut program);
        program.set_type_opt(obj, None);
        assert!(program.type_of(obj).unwrap().is_any());
        program.set_type(InstId(999), BasicKind::Number.into());
    }
}
