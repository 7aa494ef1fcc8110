//! Structural verification of a program graph.
use crate::{
    constants::ConstValue,
    program::{Program, SPIN_VALUE},
    utils::Error,
};

impl Program {
    /// Check the use-def and structural invariants of the whole graph.
    ///
    /// Meant for finished programs: construction itself never fails, so this
    /// is the single place where inconsistencies surface as errors.
    pub fn verify(&self) -> Result<(), Error> {
        for inst in self.instructions.values() {
            let id = inst.id();

            if let Some(ConstValue::Placeholder(label)) = inst.const_value() {
                if label == SPIN_VALUE {
                    return Err(Error::LiveSpinValue { spin: id });
                }
            }

            if let Some(value) = inst.as_value() {
                if value.deferred().state().is_in_progress() {
                    return Err(Error::BuildInProgress { value: id });
                }

                let targets = value.reference().into_iter().chain(value.pointer().iter().copied());
                for target in targets.chain(value.ty().ids()) {
                    if !self.contains(target) {
                        return Err(Error::DanglingReference { value: id, target });
                    }
                }

                for (index, user) in value.users().iter().enumerate() {
                    if value.users()[..index].contains(user) {
                        return Err(Error::DuplicateUser { value: id, user: *user });
                    }
                    let Some(user_inst) = self.get(*user) else {
                        return Err(Error::DanglingUser { value: id, user: *user });
                    };
                    if !user_inst.uses(id) {
                        return Err(Error::StaleUser { value: id, user: *user });
                    }
                }
            }

            for operand in inst.operands() {
                let Some(target) = self.get(operand) else {
                    return Err(Error::DanglingOperand { user: id, operand });
                };
                if let Some(value) = target.as_value() {
                    if !value.users().contains(&id) {
                        return Err(Error::UnregisteredUse { value: operand, user: id });
                    }
                }
            }

            if let Some(block) = inst.block() {
                match self.block(block) {
                    None => return Err(Error::InvalidBlockReference { inst: id, block }),
                    Some(body) if !body.instructions.contains(&id) => {
                        return Err(Error::BlockMembership { inst: id, block });
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        instruction::{InstKind, Instruction},
        operand::InstId,
    };

    #[test]
    fn detects_stale_and_unregistered_users() {
        let mut program = Program::new("verify");
        let a = program.insert_instruction(Instruction::new(InstKind::Make));
        let b = program.insert_instruction(Instruction::new(InstKind::Make));
        assert_eq!(program.verify(), Ok(()));

        program.value_mut(a).unwrap().add_user(b);
        assert_eq!(program.verify(), Err(Error::StaleUser { value: a, user: b }));

        program.value_mut(a).unwrap().remove_user(b);
        program.value_mut(b).unwrap().members.set(a, a);
        assert_eq!(program.verify(), Err(Error::UnregisteredUse { value: a, user: b }));
    }

    #[test]
    fn detects_dangling_operands() {
        let mut program = Program::new("dangling");
        let obj = program.insert_instruction(Instruction::new(InstKind::Make));
        let key = program.insert_instruction(Instruction::new(InstKind::Make));
        program.add_member(obj, key, key);
        program.delete_instruction(key);
        assert!(program.verify().unwrap_err().is_dangling_operand());
    }

    #[test]
    fn detects_dangling_type_references() {
        use crate::types::function::FunctionType;

        let mut program = Program::new("receiver");
        let method = program.insert_instruction(Instruction::new(InstKind::Make));
        program.value_mut(method).unwrap().ty = FunctionType::new("m", vec![], vec![])
            .with_receiver(InstId(77))
            .into();
        assert_eq!(
            program.verify(),
            Err(Error::DanglingReference { value: method, target: InstId(77) })
        );
    }
}
