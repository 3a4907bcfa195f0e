//! Grouping of declared registers into contiguous windows, each served
//! by one physical Modbus read.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::constants::read_limit;
use crate::errors::ValidationError;

use super::types::{DataType, DeviceRegister};

/// A derived read window covering one or more declared registers on the
/// same slave and function.
#[derive(Debug, Clone)]
pub struct RegisterGroup {
    pub slave_id: u8,
    pub function: u8,
    pub start_address: u16,
    pub quantity: u16,
    pub registers: Vec<DeviceRegister>,
}

impl RegisterGroup {
    fn open(register: DeviceRegister) -> Self {
        Self {
            slave_id: register.slave_id,
            function: register.function,
            start_address: register.read_address,
            quantity: register.read_quantity,
            registers: vec![register],
        }
    }

    /// First address past the window.
    pub fn end_address(&self) -> u32 {
        u32::from(self.start_address) + u32::from(self.quantity)
    }
}

impl std::fmt::Display for RegisterGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "slave {} function {:#04X} @{}+{}",
            self.slave_id, self.function, self.start_address, self.quantity
        )
    }
}

/// Buckets registers by (slave, function), sorts each bucket by address
/// and sweeps it into gap-free groups bounded by the function's quantity
/// limit. Overlapping windows merge; a register starting past the
/// current window end opens a new group. Duplicate tags are rejected and
/// virtual registers filtered out. With `dedup_addresses`, a register
/// naming an already covered (address, quantity) window is dropped from
/// the group instead of listed twice.
pub fn group_registers(
    registers: &[DeviceRegister],
    dedup_addresses: bool,
) -> Result<Vec<RegisterGroup>, ValidationError> {
    let mut tags = HashSet::new();
    let mut buckets: BTreeMap<(u8, u8), Vec<DeviceRegister>> = BTreeMap::new();

    for register in registers {
        if !tags.insert(register.tag.clone()) {
            return Err(ValidationError::DuplicateTag(register.tag.clone()));
        }
        if matches!(register.data_type, DataType::Virtual) {
            continue;
        }
        register.validate()?;
        buckets
            .entry((register.slave_id, register.function))
            .or_default()
            .push(register.clone());
    }

    if buckets.is_empty() {
        return Err(ValidationError::Empty);
    }

    let mut groups = Vec::new();
    for ((_, function), mut bucket) in buckets {
        bucket.sort_by_key(|register| register.read_address);

        let limit = u32::from(read_limit(function).unwrap_or(0));
        let mut open: Option<RegisterGroup> = None;

        for register in bucket {
            let Some(group) = open.as_mut() else {
                open = Some(RegisterGroup::open(register));
                continue;
            };

            if dedup_addresses
                && group.registers.iter().any(|member| {
                    member.read_address == register.read_address
                        && member.read_quantity == register.read_quantity
                })
            {
                continue;
            }

            let register_end =
                u32::from(register.read_address) + u32::from(register.read_quantity);
            let merged_end = group.end_address().max(register_end);
            let gap_free = u32::from(register.read_address) <= group.end_address();
            let within_limit = merged_end - u32::from(group.start_address) <= limit;

            if gap_free && within_limit {
                group.quantity = (merged_end - u32::from(group.start_address)) as u16;
                group.registers.push(register);
            } else {
                groups.push(open.take().expect("group is open"));
                open = Some(RegisterGroup::open(register));
            }
        }
        groups.extend(open);
    }

    debug!(
        "Grouped {} registers into {} reads",
        registers.len(),
        groups.len()
    );
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::function;
    use crate::register::types::{DataOrder, ScalarType};

    fn holding(tag: &str, address: u16, quantity: u16) -> DeviceRegister {
        DeviceRegister::new(
            tag,
            1,
            function::READ_HOLDING_REGISTERS,
            address,
            quantity,
            DataType::Scalar(ScalarType::Uint16),
            DataOrder::Ab,
        )
    }

    #[test]
    fn test_gap_splits_groups() {
        let registers: Vec<_> = [0u16, 1, 2, 5, 6]
            .iter()
            .map(|&address| holding(&format!("r{address}"), address, 1))
            .collect();

        let groups = group_registers(&registers, false).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!((groups[0].start_address, groups[0].quantity), (0, 3));
        assert_eq!((groups[1].start_address, groups[1].quantity), (5, 2));
    }

    #[test]
    fn test_overlapping_windows_merge() {
        let wide = DeviceRegister::new(
            "array",
            1,
            function::READ_HOLDING_REGISTERS,
            0,
            5,
            DataType::Array(ScalarType::Uint16, 5),
            DataOrder::Abcd,
        );
        let registers = [holding("a", 0, 1), holding("b", 1, 1), wide];

        let groups = group_registers(&registers, false).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].start_address, 0);
        assert_eq!(groups[0].quantity, 5);
        assert_eq!(groups[0].registers.len(), 3);
    }

    #[test]
    fn test_limit_splits_groups() {
        let registers: Vec<_> = (0..130u16)
            .map(|address| holding(&format!("r{address}"), address, 1))
            .collect();

        let groups = group_registers(&registers, false).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].quantity, 125);
        assert_eq!(groups[1].quantity, 5);
        assert!(groups.iter().all(|group| group.quantity <= 125));
    }

    #[test]
    fn test_buckets_by_slave_and_function() {
        let mut input = holding("input", 0, 1);
        input.function = function::READ_INPUT_REGISTERS;
        let mut other_slave = holding("other", 1, 1);
        other_slave.slave_id = 2;

        let groups = group_registers(&[holding("a", 0, 1), input, other_slave], false).unwrap();
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn test_duplicate_tags_rejected() {
        let result = group_registers(&[holding("t", 0, 1), holding("t", 1, 1)], false);
        assert!(matches!(result, Err(ValidationError::DuplicateTag(_))));
    }

    #[test]
    fn test_only_virtuals_is_empty() {
        let mut register = holding("virtual", 0, 1);
        register.data_type = DataType::Virtual;
        assert!(matches!(
            group_registers(&[register], false),
            Err(ValidationError::Empty)
        ));
    }

    #[test]
    fn test_dedup_same_window() {
        let registers = [holding("first", 0, 2), holding("twin", 0, 2)];

        let groups = group_registers(&registers, false).unwrap();
        assert_eq!(groups[0].registers.len(), 2);

        let groups = group_registers(&registers, true).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].registers.len(), 1);
        assert_eq!(groups[0].quantity, 2);
    }
}
