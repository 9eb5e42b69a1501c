//! Instruction Set Architecture (ISA) definitions.
//!
//! The [`for_each_instruction!`](crate::for_each_instruction) macro holds the
//! canonical opcode table and invokes a callback macro for code generation, so
//! the interpreter, the static analyzer, the assembler and the ISA fingerprint
//! test all read the same definitions.
//!
//! Each entry declares:
//! - the opcode byte and assembly mnemonic
//! - what the one-byte operand means ([`OperandKind`])
//! - how many stack values it consumes ([`Arity`])
//! - how many values it pushes
//!
//! # Bytecode Format
//!
//! Every instruction is exactly [`INSTRUCTION_WIDTH`] bytes: the opcode followed
//! by its operand. Instructions that ignore the operand still carry it (as 0).
//!
//! # Operand order
//!
//! Instructions consuming several values take them in push order: the value
//! pushed first is the leftmost operand and the top of the stack is the
//! rightmost. `SUB 2` over `[a, b]` computes `a - b`, `DIV 3` over `[a, b, c]`
//! computes `(a / b) / c`.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::operand::OperandKind;

/// Size in bytes of one encoded instruction (opcode + operand).
pub const INSTRUCTION_WIDTH: usize = 2;

/// Number of stack values an instruction consumes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Arity {
    /// Always consumes exactly this many values.
    Fixed(usize),
    /// Consumes as many values as its operand says (at least one).
    Operand,
}

impl Arity {
    /// Resolves the consumed value count for a concrete operand.
    pub const fn inputs(self, operand: u8) -> usize {
        match self {
            Arity::Fixed(n) => n,
            Arity::Operand => operand as usize,
        }
    }
}

/// Invokes a callback macro with the complete instruction definition list.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Literals and reads
            // =========================
            /// CONSTANT i ; push constants[i]
            Constant = 0x00, "CONSTANT" => Constant, [Fixed(0)], 1,
            /// STACK i ; push a copy of the i-th stack value, counted from the bottom
            Stack = 0x01, "STACK" => StackIndex, [Fixed(0)], 1,
            /// CONTEXT i ; push context[i]
            Context = 0x02, "CONTEXT" => ContextIndex, [Fixed(0)], 1,
            /// STORAGE slot ; push the named sale counter
            Storage = 0x03, "STORAGE" => Slot, [Fixed(0)], 1,
            /// BLOCK_TIMESTAMP ; push the evaluation timestamp
            BlockTimestamp = 0x04, "BLOCK_TIMESTAMP" => Unused, [Fixed(0)], 1,
            /// NUMBER_MINTED ; account -> units ever minted to account
            NumberMinted = 0x05, "NUMBER_MINTED" => Unused, [Fixed(1)], 1,
            // =========================
            // Arithmetic
            // =========================
            /// ADD n ; sum of n values, aborts on overflow
            Add = 0x10, "ADD" => Count, [Operand], 1,
            /// SATURATING_ADD n ; sum of n values, clamped at 2^256-1
            SaturatingAdd = 0x11, "SATURATING_ADD" => Count, [Operand], 1,
            /// SUB n ; left-to-right difference, floored at zero
            Sub = 0x12, "SUB" => Count, [Operand], 1,
            /// MUL n ; product of n values, aborts on overflow
            Mul = 0x13, "MUL" => Count, [Operand], 1,
            /// SATURATING_MUL n ; product of n values, clamped at 2^256-1
            SaturatingMul = 0x14, "SATURATING_MUL" => Count, [Operand], 1,
            /// DIV n ; left-to-right quotient, aborts on a zero divisor
            Div = 0x15, "DIV" => Count, [Operand], 1,
            /// MOD n ; left-to-right remainder, aborts on a zero divisor
            Mod = 0x16, "MOD" => Count, [Operand], 1,
            /// EXP n ; left-to-right power, aborts on overflow
            Exp = 0x17, "EXP" => Count, [Operand], 1,
            /// MIN n ; smallest of n values
            Min = 0x18, "MIN" => Count, [Operand], 1,
            /// MAX n ; largest of n values
            Max = 0x19, "MAX" => Count, [Operand], 1,
            // =========================
            // Comparison / boolean
            // =========================
            /// ISZERO ; a -> (a == 0)
            IsZero = 0x20, "ISZERO" => Unused, [Fixed(1)], 1,
            /// EQUAL_TO ; a, b -> (a == b)
            EqualTo = 0x21, "EQUAL_TO" => Unused, [Fixed(2)], 1,
            /// LESS_THAN ; a, b -> (a < b)
            LessThan = 0x22, "LESS_THAN" => Unused, [Fixed(2)], 1,
            /// GREATER_THAN ; a, b -> (a > b)
            GreaterThan = 0x23, "GREATER_THAN" => Unused, [Fixed(2)], 1,
            /// EVERY n ; 1 if all n values are nonzero
            Every = 0x24, "EVERY" => Count, [Operand], 1,
            /// ANY n ; 1 if at least one of n values is nonzero
            Any = 0x25, "ANY" => Count, [Operand], 1,
            /// EAGER_IF ; cond, then, else -> then if cond is nonzero, else otherwise
            EagerIf = 0x26, "EAGER_IF" => Unused, [Fixed(3)], 1,
            // =========================
            // Time windows
            // =========================
            /// TIME_CMP op ; timestamp -> (now <op> timestamp)
            TimeCmp = 0x30, "TIME_CMP" => Comparator, [Fixed(1)], 1,
            /// BETWEEN_TIMESTAMPS ; start, end -> (start <= now <= end)
            BetweenTimestamps = 0x31, "BETWEEN_TIMESTAMPS" => Unused, [Fixed(2)], 1,
            // =========================
            // Tiers
            // =========================
            /// TIER_LEVEL ; account, source -> tier reported by source for account
            TierLevel = 0x40, "TIER_LEVEL" => Unused, [Fixed(2)], 1,
            /// HAS_MIN_TIER t ; account, source -> (tier >= t)
            HasMinTier = 0x41, "HAS_MIN_TIER" => Tier, [Fixed(2)], 1,
        }
    };
}

#[macro_export]
macro_rules! define_instructions {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:expr, $mnemonic:literal => $operand:ident, [ $($arity:tt)+ ], $outputs:expr
        ),* $(,)?
    ) => {
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        #[repr(u8)]
        pub enum Instruction {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<u8> for Instruction {
            type Error = VMError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Instruction::$name), )*
                    _ => Err(VMError::InvalidInstruction {
                        opcode: value,
                        offset: 0,
                    }),
                }
            }
        }

        impl Instruction {
            /// Every instruction, in table order.
            pub const ALL: &'static [Instruction] = &[ $( Instruction::$name, )* ];

            /// Returns the assembly mnemonic for this instruction.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Instruction::$name => $mnemonic, )*
                }
            }

            /// Looks an instruction up by its assembly mnemonic.
            pub fn from_mnemonic(name: &str) -> Option<Instruction> {
                match name {
                    $( $mnemonic => Some(Instruction::$name), )*
                    _ => None,
                }
            }

            /// Returns how the operand byte is interpreted.
            pub const fn operand_kind(&self) -> OperandKind {
                match self {
                    $( Instruction::$name => OperandKind::$operand, )*
                }
            }

            /// Returns how many stack values this instruction consumes.
            pub const fn arity(&self) -> Arity {
                match self {
                    $( Instruction::$name => Arity::$($arity)+, )*
                }
            }

            /// Returns how many values this instruction pushes.
            pub const fn outputs(&self) -> usize {
                match self {
                    $( Instruction::$name => $outputs, )*
                }
            }
        }
    };
}

for_each_instruction!(define_instructions);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_try_from_invalid() {
        assert!(matches!(
            Instruction::try_from(0xFF),
            Err(VMError::InvalidInstruction { opcode: 0xFF, .. })
        ));
    }

    #[test]
    fn opcodes_roundtrip_through_try_from() {
        for instr in Instruction::ALL {
            assert_eq!(Instruction::try_from(*instr as u8).unwrap(), *instr);
        }
    }

    #[test]
    fn mnemonics_are_unique_and_resolvable() {
        for instr in Instruction::ALL {
            assert_eq!(Instruction::from_mnemonic(instr.mnemonic()), Some(*instr));
        }
        assert_eq!(Instruction::from_mnemonic("add"), None);
        assert_eq!(Instruction::from_mnemonic("JUMP"), None);
    }

    #[test]
    fn every_instruction_pushes_one_value() {
        assert!(Instruction::ALL.iter().all(|i| i.outputs() == 1));
    }

    #[test]
    fn arity_resolution() {
        assert_eq!(Instruction::EagerIf.arity().inputs(0), 3);
        assert_eq!(Instruction::Add.arity().inputs(5), 5);
        assert_eq!(Instruction::Constant.arity().inputs(9), 0);
        assert_eq!(Instruction::HasMinTier.arity(), Arity::Fixed(2));
        assert_eq!(Instruction::Every.arity(), Arity::Operand);
    }

    #[test]
    fn operand_kinds() {
        assert_eq!(Instruction::Storage.operand_kind(), OperandKind::Slot);
        assert_eq!(Instruction::TimeCmp.operand_kind(), OperandKind::Comparator);
        assert_eq!(Instruction::IsZero.operand_kind(), OperandKind::Unused);
    }
}
