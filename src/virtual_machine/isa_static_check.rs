#[cfg(test)]
mod tests {
    use crate::virtual_machine::isa::{Arity, Instruction};

    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    const EXPECTED_ISA_HASH: u64 = 16382374563942987173;

    fn fnv1a64(mut h: u64, bytes: &[u8]) -> u64 {
        for b in bytes {
            h ^= *b as u64;
            h = h.wrapping_mul(FNV_PRIME);
        }
        h
    }

    fn arity_bytes(arity: Arity) -> Vec<u8> {
        match arity {
            Arity::Fixed(n) => vec![0, n as u8],
            Arity::Operand => vec![1],
        }
    }

    macro_rules! hash_isa {
        (
            $( $(#[$doc:meta])* $name:ident = $opcode:expr, $mnemonic:literal => $operand:ident, [ $($arity:tt)+ ], $outputs:expr ),* $(,)?
        ) => {{
            let mut h = FNV_OFFSET;
            $(
                let instr = Instruction::$name;
                h = fnv1a64(h, stringify!($name).as_bytes());
                h = fnv1a64(h, &[instr as u8]);
                h = fnv1a64(h, $mnemonic.as_bytes());
                h = fnv1a64(h, stringify!($operand).as_bytes());
                h = fnv1a64(h, &arity_bytes(instr.arity()));
                h = fnv1a64(h, &[instr.outputs() as u8]);
            )*
            h
        }};
    }

    fn current_isa_hash() -> u64 {
        crate::for_each_instruction!(hash_isa)
    }

    #[test]
    #[ignore]
    fn print_isa_hash() {
        println!("ISA_HASH={}", current_isa_hash());
    }

    /// Encoded scripts outlive the binary that produced them; any change to
    /// the opcode table must be deliberate.
    #[test]
    fn isa_hash_unchanged() {
        assert_eq!(current_isa_hash(), EXPECTED_ISA_HASH);
    }
}
