use crate::virtual_machine::errors::VMError;
use primitive_types::U256;

/// Maximum number of values the evaluation stack may hold.
pub const MAX_STACK_DEPTH: usize = 256;

/// Bounded LIFO of 256-bit words.
///
/// Every mutating call carries the instruction mnemonic and offset so that
/// depth violations report where the script went wrong.
#[derive(Debug, Default)]
pub struct Stack {
    items: Vec<U256>,
}

impl Stack {
    pub fn new() -> Self {
        Self {
            items: Vec::with_capacity(MAX_STACK_DEPTH),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[U256] {
        &self.items
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Value at an absolute position, counted from the bottom.
    pub fn get(&self, index: usize) -> Option<U256> {
        self.items.get(index).copied()
    }

    pub fn push(&mut self, value: U256, instr: &'static str, offset: usize) -> Result<(), VMError> {
        if self.items.len() >= MAX_STACK_DEPTH {
            return Err(VMError::StackOverflow {
                instruction: instr,
                offset,
                limit: MAX_STACK_DEPTH,
            });
        }
        self.items.push(value);
        Ok(())
    }

    pub fn pop(&mut self, instr: &'static str, offset: usize) -> Result<U256, VMError> {
        let available = self.items.len();
        self.items.pop().ok_or(VMError::StackUnderflow {
            instruction: instr,
            offset,
            required: 1,
            available,
        })
    }

    /// Removes the top `n` values and returns them in push order.
    pub fn pop_n(
        &mut self,
        n: usize,
        instr: &'static str,
        offset: usize,
    ) -> Result<Vec<U256>, VMError> {
        let available = self.items.len();
        if n > available {
            return Err(VMError::StackUnderflow {
                instruction: instr,
                offset,
                required: n,
                available,
            });
        }
        Ok(self.items.split_off(available - n))
    }

    /// Consumes the stack, returning its values bottom first.
    pub fn into_vec(self) -> Vec<U256> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn pop_n_returns_values_in_push_order() {
        let mut stack = Stack::new();
        for v in 1..=4 {
            stack.push(w(v), "TEST", 0).unwrap();
        }
        assert_eq!(stack.pop_n(3, "TEST", 0).unwrap(), vec![w(2), w(3), w(4)]);
        assert_eq!(stack.as_slice(), &[w(1)]);
    }

    #[test]
    fn underflow_reports_depths() {
        let mut stack = Stack::new();
        stack.push(w(1), "TEST", 0).unwrap();
        assert_eq!(
            stack.pop_n(2, "ADD", 6),
            Err(VMError::StackUnderflow {
                instruction: "ADD",
                offset: 6,
                required: 2,
                available: 1
            })
        );
        stack.pop("TEST", 0).unwrap();
        assert!(matches!(
            stack.pop("SUB", 8),
            Err(VMError::StackUnderflow { required: 1, available: 0, .. })
        ));
    }

    #[test]
    fn overflow_at_limit() {
        let mut stack = Stack::new();
        for _ in 0..MAX_STACK_DEPTH {
            stack.push(w(0), "CONSTANT", 0).unwrap();
        }
        assert_eq!(
            stack.push(w(0), "CONSTANT", 512),
            Err(VMError::StackOverflow {
                instruction: "CONSTANT",
                offset: 512,
                limit: MAX_STACK_DEPTH
            })
        );
        assert_eq!(stack.len(), MAX_STACK_DEPTH);
    }

    #[test]
    fn get_reads_from_the_bottom() {
        let mut stack = Stack::new();
        stack.push(w(10), "TEST", 0).unwrap();
        stack.push(w(20), "TEST", 0).unwrap();
        assert_eq!(stack.get(0), Some(w(10)));
        assert_eq!(stack.get(1), Some(w(20)));
        assert_eq!(stack.get(2), None);
    }
}
