//! Operand interpretation.
//!
//! The operand byte of an instruction is an index, a count, or one of a few
//! small closed enumerations. [`OperandKind`] says which, and handles the
//! assembly text form of each.

use primitive_types::U256;

/// How an instruction interprets its operand byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperandKind {
    /// Ignored; encoded as 0.
    Unused,
    /// Index into the constant pool.
    Constant,
    /// Absolute stack position, counted from the bottom.
    StackIndex,
    /// Index into the context vector.
    ContextIndex,
    /// A [`StorageSlot`].
    Slot,
    /// Number of stack values an n-ary instruction consumes.
    Count,
    /// A [`Comparator`].
    Comparator,
    /// Minimum tier level.
    Tier,
}

impl OperandKind {
    /// Whether the operand is written in assembly.
    pub const fn is_explicit(self) -> bool {
        !matches!(self, OperandKind::Unused)
    }

    /// Parses the assembly text of an operand.
    ///
    /// Slots and comparators accept their names as well as raw numbers; raw
    /// numbers are range-checked later by script analysis.
    pub fn parse(self, token: &str) -> Result<u8, String> {
        match self {
            OperandKind::Slot => {
                if let Some(slot) = StorageSlot::from_name(token) {
                    return Ok(slot as u8);
                }
            }
            OperandKind::Comparator => {
                if let Some(cmp) = Comparator::from_name(token) {
                    return Ok(cmp as u8);
                }
            }
            _ => {}
        }

        token
            .parse::<u8>()
            .map_err(|_| format!("invalid {} operand '{token}'", self.describe()))
    }

    /// Renders an operand the way [`OperandKind::parse`] reads it back.
    pub fn render(self, operand: u8) -> String {
        match self {
            OperandKind::Slot => StorageSlot::try_from(operand)
                .map(|s| s.name().to_string())
                .unwrap_or_else(|_| operand.to_string()),
            OperandKind::Comparator => Comparator::try_from(operand)
                .map(|c| c.name().to_string())
                .unwrap_or_else(|_| operand.to_string()),
            _ => operand.to_string(),
        }
    }

    pub const fn describe(self) -> &'static str {
        match self {
            OperandKind::Unused => "unused",
            OperandKind::Constant => "constant index",
            OperandKind::StackIndex => "stack index",
            OperandKind::ContextIndex => "context index",
            OperandKind::Slot => "storage slot",
            OperandKind::Count => "value count",
            OperandKind::Comparator => "comparator",
            OperandKind::Tier => "tier",
        }
    }
}

/// Read-only sale counters a script can load with `STORAGE`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum StorageSlot {
    /// Configured maximum number of units that may ever be minted.
    SupplyLimit = 0,
    /// Units currently in circulation (minted minus burned).
    TotalSupply = 1,
    /// Units ever minted; burning never lowers it.
    TotalMinted = 2,
}

impl StorageSlot {
    pub const ALL: [StorageSlot; 3] = [
        StorageSlot::SupplyLimit,
        StorageSlot::TotalSupply,
        StorageSlot::TotalMinted,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            StorageSlot::SupplyLimit => "SUPPLY_LIMIT",
            StorageSlot::TotalSupply => "TOTAL_SUPPLY",
            StorageSlot::TotalMinted => "TOTAL_MINTED",
        }
    }

    pub fn from_name(name: &str) -> Option<StorageSlot> {
        Self::ALL.into_iter().find(|slot| slot.name() == name)
    }
}

impl TryFrom<u8> for StorageSlot {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|slot| *slot as u8 == value)
            .ok_or(value)
    }
}

/// Comparison between the evaluation timestamp and a script-supplied one.
///
/// Chosen per instruction so every script fixes its own boundary behaviour.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Comparator {
    /// now < timestamp
    Lt = 0,
    /// now <= timestamp
    Lte = 1,
    /// now > timestamp
    Gt = 2,
    /// now >= timestamp
    Gte = 3,
}

impl Comparator {
    pub const ALL: [Comparator; 4] = [
        Comparator::Lt,
        Comparator::Lte,
        Comparator::Gt,
        Comparator::Gte,
    ];

    pub fn holds(self, now: U256, timestamp: U256) -> bool {
        match self {
            Comparator::Lt => now < timestamp,
            Comparator::Lte => now <= timestamp,
            Comparator::Gt => now > timestamp,
            Comparator::Gte => now >= timestamp,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Comparator::Lt => "LT",
            Comparator::Lte => "LTE",
            Comparator::Gt => "GT",
            Comparator::Gte => "GTE",
        }
    }

    pub fn from_name(name: &str) -> Option<Comparator> {
        Self::ALL.into_iter().find(|cmp| cmp.name() == name)
    }
}

impl TryFrom<u8> for Comparator {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|cmp| *cmp as u8 == value)
            .ok_or(value)
    }
}
