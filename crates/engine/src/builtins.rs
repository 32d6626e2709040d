//! Built-in instructions
//!
//! Opcodes `1..=100` are reserved. The four built-ins occupy the bottom of
//! the range; user-defined opcodes must be greater than 100.
//!
//! | opcode | mnemonic | effect |
//! |--------|----------|--------|
//! | 1 | `VM_BEGINTRANS` | marker opening every commit |
//! | 2 | `VM_ENDTRANS` | marker closing every commit |
//! | 3 | `INST` | marker carrying a model's attribute snapshot |
//! | 4 | `DESTROY` | deletes every attribute path of an instance |
//!
//! `INST` is a marker because the attribute writes already happened during
//! construction, before the instruction was recorded. `DESTROY` removes
//! `<model>/O/<id>/*` (including `_id`) but never the model's `IDCOUNTER`;
//! ids are session-unique by design.

use lamina_core::{Error, Result};

use crate::instruction::{ArgKind, InstructionDef, Operand};
use crate::vm::Vm;

/// Opcode of the transaction-open marker
pub const BEGIN_TRANS_OPCODE: u32 = 1;
/// Mnemonic of the transaction-open marker
pub const BEGIN_TRANS: &str = "VM_BEGINTRANS";

/// Opcode of the transaction-close marker
pub const END_TRANS_OPCODE: u32 = 2;
/// Mnemonic of the transaction-close marker
pub const END_TRANS: &str = "VM_ENDTRANS";

/// Opcode of the instantiation record
pub const INST_OPCODE: u32 = 3;
/// Mnemonic of the instantiation record
pub const INST: &str = "INST";

/// Opcode of the destroy instruction
pub const DESTROY_OPCODE: u32 = 4;
/// Mnemonic of the destroy instruction
pub const DESTROY: &str = "DESTROY";

/// Highest reserved opcode; user opcodes start above this
pub const RESERVED_OPCODE_MAX: u32 = 100;

pub(crate) fn defs() -> Vec<InstructionDef> {
    vec![
        InstructionDef::marker(BEGIN_TRANS_OPCODE, BEGIN_TRANS, vec![]),
        InstructionDef::marker(END_TRANS_OPCODE, END_TRANS, vec![]),
        InstructionDef::marker(
            INST_OPCODE,
            INST,
            vec![ArgKind::ModelClass, ArgKind::Map],
        ),
        InstructionDef::new(
            DESTROY_OPCODE,
            DESTROY,
            vec![ArgKind::ModelClass, ArgKind::Int],
            destroy_instance,
        ),
    ]
}

/// Delete every attribute path of the target instance
fn destroy_instance(vm: &Vm, args: &[Operand]) -> Result<()> {
    let model = args[0]
        .class_name()
        .ok_or_else(|| Error::bad_call(DESTROY, "first argument must be a model class"))?;
    let id = args[1]
        .as_int()
        .ok_or_else(|| Error::bad_call(DESTROY, "second argument must be an instance id"))?;
    let schema = vm.model(model)?;
    for desc in schema.attrs() {
        desc.remove(vm.heap(), id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_opcodes() {
        let defs = defs();
        let opcodes: Vec<u32> = defs.iter().map(InstructionDef::opcode).collect();
        assert_eq!(opcodes, vec![1, 2, 3, 4]);
        assert!(opcodes.iter().all(|op| *op <= RESERVED_OPCODE_MAX));
    }

    #[test]
    fn test_mnemonics() {
        let defs = defs();
        let mnemonics: Vec<&str> = defs.iter().map(InstructionDef::mnemonic).collect();
        assert_eq!(mnemonics, vec!["VM_BEGINTRANS", "VM_ENDTRANS", "INST", "DESTROY"]);
    }

    #[test]
    fn test_marker_arities() {
        let defs = defs();
        assert_eq!(defs[0].n_args(), 0);
        assert_eq!(defs[1].n_args(), 0);
        assert_eq!(defs[2].n_args(), 2);
        assert_eq!(defs[3].n_args(), 2);
    }
}
