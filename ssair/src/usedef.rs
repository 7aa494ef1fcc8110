//! Use-def maintenance.
//!
//! Every node whose operand set mentions a value is recorded in that value's
//! user list, exactly once. The helpers here are the only paths that edit user
//! lists; [`Program::replace_all_value`] is the only path that retargets
//! operands in bulk.
use log::{trace, warn};

use crate::{
    instruction::{Instruction, Operands},
    operand::InstId,
    program::Program,
};

impl Program {
    /// Record `user` as a user of `value`. Returns `false` when already
    /// recorded or when `value` is not a live value.
    pub fn add_user(&mut self, value: InstId, user: InstId) -> bool {
        match self.value_mut(value) {
            Some(v) => v.add_user(user),
            None => {
                trace!("add_user: {} is not a value, {} not recorded", value, user);
                false
            }
        }
    }

    pub fn remove_user(&mut self, value: InstId, user: InstId) -> bool {
        self.value_mut(value).is_some_and(|v| v.remove_user(user))
    }

    /// Operand set of `id`: payload operands, `object`/`key`, then member
    /// keys and values. Empty for unknown ids.
    pub fn operands(&self, id: InstId) -> Operands {
        self.get(id).map(Instruction::operands).unwrap_or_default()
    }

    /// Unregister `user` from `operand` unless `user` still mentions it.
    pub(crate) fn release_operand(&mut self, operand: InstId, user: InstId) {
        let still_used = self.get(user).is_some_and(|u| u.uses(operand));
        if !still_used {
            self.remove_user(operand, user);
        }
    }

    /// Replace every use of `old` by `new`.
    ///
    /// Each user of `old` has every occurrence of `old` in its operand set
    /// rewritten (payload, member keys and values, `object`/`key`), and moves
    /// to the user list of `new`. The names bound to `old` are rebound to
    /// `new`. `old` ends up with no users.
    pub fn replace_all_value(&mut self, old: InstId, new: InstId) {
        if old == new {
            return;
        }
        if self.value(new).is_none() {
            warn!("replace_all_value: replacement {} is not a value", new);
            return;
        }
        let Some(value) = self.value_mut(old) else {
            warn!("replace_all_value: {} is not a value", old);
            return;
        };

        let users = std::mem::take(&mut value.users);
        let variables = std::mem::take(&mut value.variables);
        trace!("Replacing {} by {} in {} users", old, new, users.len());

        for user in users {
            let Some(inst) = self.get_mut(user) else {
                warn!("replace_all_value: user {} of {} no longer exists", user, old);
                continue;
            };

            let mut before = inst.operands();
            rewrite_operands(inst, old, new);
            let after = inst.operands();

            // Merging member keys may drop an entry and its value with it.
            before.sort();
            before.dedup();
            for dropped in before.into_iter().filter(|o| *o != old && !after.contains(o)) {
                self.remove_user(dropped, user);
            }

            // `new` may itself be a user of `old` and then becomes its own user.
            self.add_user(new, user);
        }

        if let Some(value) = self.value_mut(new) {
            for (_, mut variable) in variables {
                variable.value = new;
                value.add_variable(variable);
            }
        }
    }

    /// Retarget the references to `old` that live outside operand sets:
    /// resolved deferred builds, points-to edges, masks, ids embedded in
    /// types and blueprint entries.
    pub(crate) fn retarget_references(&mut self, old: InstId, new: InstId) {
        let pointers = self
            .value_mut(old)
            .map(|v| std::mem::take(&mut v.pointer))
            .unwrap_or_default();
        if let Some(value) = self.value_mut(new) {
            for pointer in pointers {
                if !value.pointer.contains(&pointer) {
                    value.pointer.push(pointer);
                }
            }
        }

        for inst in self.instructions.values_mut() {
            let Some(value) = inst.value.as_mut() else {
                continue;
            };
            if value.deferred.resolved == Some(old) {
                value.deferred.resolved = Some(new);
            }
            value.ty.remap_ids(old, new);
            if value.reference == Some(old) {
                value.reference = Some(new);
            }
            for pointer in value.pointer.iter_mut().filter(|p| **p == old) {
                *pointer = new;
            }
            value.mask.replace_key(&old, new);
        }

        for blueprint in self.blueprints.values_mut() {
            for id in blueprint
                .methods
                .values_mut()
                .chain(blueprint.static_members.values_mut())
                .chain(blueprint.constructor.iter_mut())
                .chain(blueprint.instances.iter_mut())
            {
                if *id == old {
                    *id = new;
                }
            }
        }

        for function in self.functions.values_mut() {
            if function.value == old {
                function.value = new;
            }
        }
    }

    /// Drop the points-to edges and mask entries of other values that name
    /// `gone`.
    pub(crate) fn detach_references(&mut self, gone: InstId) {
        for value in self.instructions.values_mut().filter_map(|i| i.value.as_mut()) {
            if value.reference == Some(gone) {
                value.reference = None;
            }
            value.pointer.retain(|p| *p != gone);
            value.mask.delete(&gone);
        }
    }
}

fn rewrite_operands(inst: &mut Instruction, old: InstId, new: InstId) {
    inst.kind
        .remap_operands(|id| (id == old).then_some(new));

    let Some(value) = inst.value.as_mut() else {
        return;
    };
    if value.object == Some(old) {
        value.object = Some(new);
    }
    if value.key == Some(old) {
        value.key = Some(new);
    }
    value.members.replace_key(&old, new);
    for member in value.members.values_mut().filter(|m| **m == old) {
        *member = new;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        constants::ConstValue,
        instruction::{Call, InstKind},
    };

    fn konst(program: &mut Program, value: &str) -> InstId {
        program.insert_instruction(Instruction::new(InstKind::Const(ConstValue::from(value))))
    }

    #[test]
    fn insertion_registers_each_user_once() {
        let mut program = Program::new("users");
        let a = konst(&mut program, "a");
        let call = program.insert_instruction(Instruction::new(InstKind::Call(Call {
            method: a,
            args: vec![a, a],
        })));
        assert_eq!(program.value(a).map(|v| v.users().to_vec()), Some(vec![call]));
    }

    #[test]
    fn replacement_rewrites_members_and_payload() {
        let mut program = Program::new("replace");
        let old = konst(&mut program, "old");
        let new = konst(&mut program, "new");
        let field = konst(&mut program, "field");

        let obj = program.insert_instruction(Instruction::new(InstKind::Make));
        program.add_member(obj, field, old);
        let call = program.insert_instruction(Instruction::new(InstKind::Call(Call {
            method: old,
            args: vec![new],
        })));
        program.add_variable(old, "x");

        program.replace_all_value(old, new);

        assert!(!program.value(old).unwrap().has_users());
        assert_eq!(program.value(new).unwrap().users(), &[call, obj]);
        assert_eq!(program.value(obj).unwrap().member(field), Some(new));
        assert_eq!(program.operands(call).into_vec(), vec![new, new]);
        assert_eq!(program.value(new).unwrap().variable("x").map(|v| v.value), Some(new));
        assert!(program.value(old).unwrap().variable("x").is_none());
    }

    #[test]
    fn merged_member_keys_release_dropped_values() {
        let mut program = Program::new("merge");
        let k1 = konst(&mut program, "k1");
        let k2 = konst(&mut program, "k2");
        let v1 = konst(&mut program, "v1");
        let v2 = konst(&mut program, "v2");

        let obj = program.insert_instruction(Instruction::new(InstKind::Make));
        program.add_member(obj, k1, v1);
        program.add_member(obj, k2, v2);

        program.replace_all_value(k1, k2);

        assert_eq!(program.value(obj).unwrap().members().len(), 1);
        assert_eq!(program.value(obj).unwrap().member(k2), Some(v2));
        assert!(!program.value(v1).unwrap().has_users());
        assert_eq!(program.value(k2).unwrap().users(), &[obj]);
    }

    #[test]
    fn replacing_with_itself_is_a_no_op() {
        let mut program = Program::new("self");
        let a = konst(&mut program, "a");
        let obj = program.insert_instruction(Instruction::new(InstKind::Make));
        program.add_member(obj, a, a);
        program.replace_all_value(a, a);
        assert_eq!(program.value(a).unwrap().users(), &[obj]);
    }
}
