//! Request builders and response parsers for the supported function
//! codes. Builders enforce the per-function quantity bounds; parsers
//! enforce byte counts and echo fields.

use crate::constants::{
    function, MAX_FIFO_COUNT, MAX_READ_BITS, MAX_READ_REGISTERS, MAX_READ_WRITE_WRITE_REGISTERS,
    MAX_WRITE_BITS, MAX_WRITE_REGISTERS,
};
use crate::errors::{ClientError, ProtocolErrorKind, ValidationError};

pub(crate) fn build_read(
    function_code: u8,
    address: u16,
    quantity: u16,
) -> Result<Vec<u8>, ValidationError> {
    let max = match function_code {
        function::READ_COILS | function::READ_DISCRETE_INPUTS => MAX_READ_BITS,
        function::READ_HOLDING_REGISTERS | function::READ_INPUT_REGISTERS => MAX_READ_REGISTERS,
        other => return Err(ValidationError::UnsupportedFunction(other)),
    };
    check_quantity(function_code, quantity, max)?;

    let mut pdu = Vec::with_capacity(5);
    pdu.push(function_code);
    pdu.extend_from_slice(&address.to_be_bytes());
    pdu.extend_from_slice(&quantity.to_be_bytes());
    Ok(pdu)
}

pub(crate) fn build_write_single(function_code: u8, address: u16, value: u16) -> Vec<u8> {
    let mut pdu = Vec::with_capacity(5);
    pdu.push(function_code);
    pdu.extend_from_slice(&address.to_be_bytes());
    pdu.extend_from_slice(&value.to_be_bytes());
    pdu
}

pub(crate) fn build_write_multiple_coils(
    address: u16,
    values: &[bool],
) -> Result<Vec<u8>, ValidationError> {
    check_quantity(
        function::WRITE_MULTIPLE_COILS,
        values.len().min(usize::from(u16::MAX)) as u16,
        MAX_WRITE_BITS,
    )?;

    let quantity = values.len() as u16;
    let packed = pack_bits(values);

    let mut pdu = Vec::with_capacity(6 + packed.len());
    pdu.push(function::WRITE_MULTIPLE_COILS);
    pdu.extend_from_slice(&address.to_be_bytes());
    pdu.extend_from_slice(&quantity.to_be_bytes());
    pdu.push(packed.len() as u8);
    pdu.extend_from_slice(&packed);
    Ok(pdu)
}

pub(crate) fn build_write_multiple_registers(
    address: u16,
    values: &[u16],
) -> Result<Vec<u8>, ValidationError> {
    check_quantity(
        function::WRITE_MULTIPLE_REGISTERS,
        values.len().min(usize::from(u16::MAX)) as u16,
        MAX_WRITE_REGISTERS,
    )?;

    let quantity = values.len() as u16;
    let mut pdu = Vec::with_capacity(6 + values.len() * 2);
    pdu.push(function::WRITE_MULTIPLE_REGISTERS);
    pdu.extend_from_slice(&address.to_be_bytes());
    pdu.extend_from_slice(&quantity.to_be_bytes());
    pdu.push((values.len() * 2) as u8);
    for value in values {
        pdu.extend_from_slice(&value.to_be_bytes());
    }
    Ok(pdu)
}

pub(crate) fn build_mask_write(address: u16, and_mask: u16, or_mask: u16) -> Vec<u8> {
    let mut pdu = Vec::with_capacity(7);
    pdu.push(function::MASK_WRITE_REGISTER);
    pdu.extend_from_slice(&address.to_be_bytes());
    pdu.extend_from_slice(&and_mask.to_be_bytes());
    pdu.extend_from_slice(&or_mask.to_be_bytes());
    pdu
}

pub(crate) fn build_read_write_multiple(
    read_address: u16,
    read_quantity: u16,
    write_address: u16,
    values: &[u16],
) -> Result<Vec<u8>, ValidationError> {
    check_quantity(
        function::READ_WRITE_MULTIPLE_REGISTERS,
        read_quantity,
        MAX_READ_REGISTERS,
    )?;
    check_quantity(
        function::READ_WRITE_MULTIPLE_REGISTERS,
        values.len().min(usize::from(u16::MAX)) as u16,
        MAX_READ_WRITE_WRITE_REGISTERS,
    )?;

    let write_quantity = values.len() as u16;
    let mut pdu = Vec::with_capacity(10 + values.len() * 2);
    pdu.push(function::READ_WRITE_MULTIPLE_REGISTERS);
    pdu.extend_from_slice(&read_address.to_be_bytes());
    pdu.extend_from_slice(&read_quantity.to_be_bytes());
    pdu.extend_from_slice(&write_address.to_be_bytes());
    pdu.extend_from_slice(&write_quantity.to_be_bytes());
    pdu.push((values.len() * 2) as u8);
    for value in values {
        pdu.extend_from_slice(&value.to_be_bytes());
    }
    Ok(pdu)
}

pub(crate) fn build_read_fifo(address: u16) -> Vec<u8> {
    let mut pdu = Vec::with_capacity(3);
    pdu.push(function::READ_FIFO_QUEUE);
    pdu.extend_from_slice(&address.to_be_bytes());
    pdu
}

fn check_quantity(function_code: u8, quantity: u16, max: u16) -> Result<(), ValidationError> {
    if quantity == 0 || quantity > max {
        return Err(ValidationError::QuantityOutOfRange {
            function: function_code,
            quantity,
            max,
        });
    }
    Ok(())
}

/// Packs coil states LSB-first into bytes, zero-padding the last one.
pub(crate) fn pack_bits(values: &[bool]) -> Vec<u8> {
    let mut packed = vec![0u8; values.len().div_ceil(8)];
    for (i, &value) in values.iter().enumerate() {
        if value {
            packed[i / 8] |= 1 << (i % 8);
        }
    }
    packed
}

pub(crate) fn unpack_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    (0..count)
        .map(|i| bytes[i / 8] & (1 << (i % 8)) != 0)
        .collect()
}

/// `data` is the response PDU after the function code: byte count plus
/// bit-packed payload.
pub(crate) fn parse_bit_response(data: &[u8], quantity: u16) -> Result<Vec<bool>, ClientError> {
    let expected = (quantity as usize).div_ceil(8);
    if data.is_empty() || data[0] as usize != data.len() - 1 || data[0] as usize != expected {
        return Err(ClientError::protocol(
            ProtocolErrorKind::ByteCountMismatch,
            format!(
                "Expected {} data bytes for {} bits, response carries {}",
                expected,
                quantity,
                data.len().saturating_sub(1)
            ),
        ));
    }
    Ok(unpack_bits(&data[1..], quantity as usize))
}

/// `data` is the response PDU after the function code: byte count plus
/// big-endian words.
pub(crate) fn parse_word_response(data: &[u8], quantity: u16) -> Result<Vec<u16>, ClientError> {
    let expected = quantity as usize * 2;
    if data.is_empty() || data[0] as usize != data.len() - 1 || data[0] as usize != expected {
        return Err(ClientError::protocol(
            ProtocolErrorKind::ByteCountMismatch,
            format!(
                "Expected {} data bytes for {} registers, response carries {}",
                expected,
                quantity,
                data.len().saturating_sub(1)
            ),
        ));
    }
    Ok(data[1..]
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect())
}

/// FIFO response after the function code: byte count (2), FIFO count (2),
/// then FIFO count words.
pub(crate) fn parse_fifo_response(data: &[u8]) -> Result<Vec<u16>, ClientError> {
    if data.len() < 4 {
        return Err(ClientError::protocol(
            ProtocolErrorKind::InvalidPdu,
            format!("FIFO response of {} bytes", data.len()),
        ));
    }

    let byte_count = u16::from_be_bytes([data[0], data[1]]) as usize;
    let fifo_count = u16::from_be_bytes([data[2], data[3]]);

    if fifo_count > MAX_FIFO_COUNT {
        return Err(ClientError::protocol(
            ProtocolErrorKind::InvalidPdu,
            format!("FIFO count {} exceeds {}", fifo_count, MAX_FIFO_COUNT),
        ));
    }
    if byte_count != 2 + fifo_count as usize * 2 || data.len() - 2 != byte_count {
        return Err(ClientError::protocol(
            ProtocolErrorKind::ByteCountMismatch,
            format!(
                "FIFO byte count {} for {} queued words in {} bytes",
                byte_count,
                fifo_count,
                data.len()
            ),
        ));
    }

    Ok(data[4..]
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect())
}

/// Write responses echo address and value (or quantity); any drift means
/// the reply belongs to some other request.
pub(crate) fn check_write_echo(data: &[u8], address: u16, value: u16) -> Result<(), ClientError> {
    if data.len() != 4 {
        return Err(ClientError::protocol(
            ProtocolErrorKind::InvalidPdu,
            format!("Write echo of {} bytes, expected 4", data.len()),
        ));
    }
    let echo_address = u16::from_be_bytes([data[0], data[1]]);
    let echo_value = u16::from_be_bytes([data[2], data[3]]);
    if echo_address != address || echo_value != value {
        return Err(ClientError::protocol(
            ProtocolErrorKind::EchoMismatch,
            format!(
                "Echoed ({:#06X}, {:#06X}), requested ({:#06X}, {:#06X})",
                echo_address, echo_value, address, value
            ),
        ));
    }
    Ok(())
}

pub(crate) fn check_mask_echo(
    data: &[u8],
    address: u16,
    and_mask: u16,
    or_mask: u16,
) -> Result<(), ClientError> {
    if data.len() != 6 {
        return Err(ClientError::protocol(
            ProtocolErrorKind::InvalidPdu,
            format!("Mask write echo of {} bytes, expected 6", data.len()),
        ));
    }
    let echo_address = u16::from_be_bytes([data[0], data[1]]);
    let echo_and = u16::from_be_bytes([data[2], data[3]]);
    let echo_or = u16::from_be_bytes([data[4], data[5]]);
    if echo_address != address || echo_and != and_mask || echo_or != or_mask {
        return Err(ClientError::protocol(
            ProtocolErrorKind::EchoMismatch,
            format!(
                "Echoed ({:#06X}, {:#06X}, {:#06X}), requested ({:#06X}, {:#06X}, {:#06X})",
                echo_address, echo_and, echo_or, address, and_mask, or_mask
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_read_bounds() {
        assert!(build_read(function::READ_COILS, 0, 2000).is_ok());
        assert!(build_read(function::READ_COILS, 0, 2001).is_err());
        assert!(build_read(function::READ_HOLDING_REGISTERS, 0, 125).is_ok());
        assert!(build_read(function::READ_HOLDING_REGISTERS, 0, 126).is_err());
        assert!(build_read(function::READ_HOLDING_REGISTERS, 0, 0).is_err());
        assert!(build_read(function::WRITE_SINGLE_COIL, 0, 1).is_err());
    }

    #[test]
    fn test_bit_round_trip() {
        let values = [true, false, true, true, false, false, true, false, true];
        let packed = pack_bits(&values);
        assert_eq!(packed, [0b0100_1101, 0b0000_0001]);
        assert_eq!(unpack_bits(&packed, values.len()), values);
    }

    #[test]
    fn test_parse_bit_response() {
        // byte 0x05 = coils 1 and 3 set
        assert_eq!(
            parse_bit_response(&[0x01, 0x05], 3).unwrap(),
            [true, false, true]
        );
        assert_eq!(
            parse_bit_response(&[0x01, 0x05], 8).unwrap(),
            [true, false, true, false, false, false, false, false]
        );
        assert!(parse_bit_response(&[0x02, 0x05], 3).is_err());
    }

    #[test]
    fn test_parse_word_response() {
        let data = [0x04, 0xAB, 0xCD, 0x12, 0x34];
        assert_eq!(parse_word_response(&data, 2).unwrap(), [0xABCD, 0x1234]);
        assert!(parse_word_response(&data, 1).is_err());
        assert!(parse_word_response(&[0x03, 0x00, 0x00, 0x00], 2).is_err());
    }

    #[test]
    fn test_parse_fifo_response() {
        let data = [0x00, 0x06, 0x00, 0x02, 0x01, 0xB8, 0x12, 0x84];
        assert_eq!(parse_fifo_response(&data).unwrap(), [0x01B8, 0x1284]);

        // count claims more words than the payload holds
        assert!(parse_fifo_response(&[0x00, 0x06, 0x00, 0x02, 0x01, 0xB8]).is_err());
    }

    #[test]
    fn test_write_echo_mismatch() {
        assert!(check_write_echo(&[0x00, 0x0A, 0xFF, 0x00], 0x000A, 0xFF00).is_ok());
        assert!(check_write_echo(&[0x00, 0x0B, 0xFF, 0x00], 0x000A, 0xFF00).is_err());
        assert!(check_write_echo(&[0x00, 0x0A, 0x00, 0x00], 0x000A, 0xFF00).is_err());
    }

    #[test]
    fn test_multiple_writes_layout() {
        let pdu = build_write_multiple_registers(0x0010, &[0x0102, 0x0304]).unwrap();
        assert_eq!(pdu, [0x10, 0x00, 0x10, 0x00, 0x02, 0x04, 0x01, 0x02, 0x03, 0x04]);

        let pdu = build_write_multiple_coils(0x0013, &[true, false, true, true]).unwrap();
        assert_eq!(pdu, [0x0F, 0x00, 0x13, 0x00, 0x04, 0x01, 0b0000_1101]);
    }
}
