//! Decoding of raw wire data into typed values: big-endian words in,
//! byte-order permutation, numeric reinterpretation out.

use crate::errors::{ClientError, ValidationError};

use super::types::{DataOrder, DataType, ScalarType, Value};

/// Flattens big-endian words to their wire byte sequence.
pub fn words_to_bytes(words: &[u16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(words.len() * 2);
    for word in words {
        bytes.extend_from_slice(&word.to_be_bytes());
    }
    bytes
}

/// Decodes a register window read with a word-oriented function.
pub fn decode_words(
    words: &[u16],
    data_type: &DataType,
    order: DataOrder,
) -> Result<Value, ClientError> {
    let bytes = words_to_bytes(words);

    match data_type {
        DataType::Virtual => Err(ValidationError::UnknownDataType("virtual".into()).into()),
        DataType::Scalar(ScalarType::String) => decode_string(&bytes, order),
        DataType::Scalar(scalar) => {
            let needed = scalar.wire_bytes();
            if bytes.len() < needed {
                return Err(short_window(data_type, words.len()));
            }
            decode_scalar(&bytes[..needed], *scalar, order)
        }
        DataType::Array(scalar, count) => {
            let element = scalar.wire_bytes();
            if bytes.len() < element * count {
                return Err(short_window(data_type, words.len()));
            }
            let values = bytes[..element * count]
                .chunks_exact(element)
                .map(|chunk| decode_scalar(chunk, *scalar, order))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(values))
        }
    }
}

/// Decodes a window read with a bit-oriented function (coils or discrete
/// inputs). Only boolean shapes make sense here.
pub fn decode_bits(bits: &[bool], data_type: &DataType) -> Result<Value, ClientError> {
    match data_type {
        DataType::Scalar(ScalarType::Bool) => match bits.first() {
            Some(&bit) => Ok(Value::Bool(bit)),
            None => Err(short_window(data_type, 0)),
        },
        DataType::Array(ScalarType::Bool, count) => {
            if bits.len() < *count {
                return Err(short_window(data_type, bits.len()));
            }
            Ok(Value::Array(
                bits[..*count].iter().map(|&bit| Value::Bool(bit)).collect(),
            ))
        }
        other => Err(ValidationError::BitTypeMismatch(other.to_string()).into()),
    }
}

fn decode_scalar(chunk: &[u8], scalar: ScalarType, order: DataOrder) -> Result<Value, ClientError> {
    let bytes = order.permute(chunk).map_err(ClientError::from)?;

    Ok(match scalar {
        ScalarType::Bool => Value::Bool(u16::from_be_bytes([bytes[0], bytes[1]]) != 0),
        ScalarType::Int8 => Value::Int8(bytes[0] as i8),
        ScalarType::Uint8 => Value::Uint8(bytes[0]),
        ScalarType::Int16 => Value::Int16(i16::from_be_bytes([bytes[0], bytes[1]])),
        ScalarType::Uint16 => Value::Uint16(u16::from_be_bytes([bytes[0], bytes[1]])),
        ScalarType::Int32 => Value::Int32(i32::from_be_bytes(to_array(&bytes))),
        ScalarType::Uint32 => Value::Uint32(u32::from_be_bytes(to_array(&bytes))),
        ScalarType::Float32 => Value::Float32(f32::from_be_bytes(to_array(&bytes))),
        ScalarType::Int64 => Value::Int64(i64::from_be_bytes(to_array(&bytes))),
        ScalarType::Uint64 => Value::Uint64(u64::from_be_bytes(to_array(&bytes))),
        ScalarType::Float64 => Value::Float64(f64::from_be_bytes(to_array(&bytes))),
        ScalarType::String => unreachable!("strings decoded from the whole window"),
    })
}

fn decode_string(bytes: &[u8], order: DataOrder) -> Result<Value, ClientError> {
    // Orders act per word on text windows (BA swaps each character pair).
    let reordered = if order.is_identity() {
        bytes.to_vec()
    } else {
        let mut reordered = Vec::with_capacity(bytes.len());
        for chunk in bytes.chunks(order.width().max(2)) {
            if chunk.len() == order.width() {
                reordered.extend(order.permute(chunk).map_err(ClientError::from)?);
            } else {
                reordered.extend_from_slice(chunk);
            }
        }
        reordered
    };

    let trimmed = reordered
        .iter()
        .rposition(|&b| b != 0)
        .map_or(&reordered[..0], |last| &reordered[..=last]);

    Ok(Value::String(
        String::from_utf8_lossy(trimmed).into_owned(),
    ))
}

fn to_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut array = [0u8; N];
    array.copy_from_slice(&bytes[..N]);
    array
}

fn short_window(data_type: &DataType, have: usize) -> ClientError {
    ValidationError::WindowTooSmall {
        tag: String::new(),
        quantity: have as u16,
        data_type: data_type.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uint32(order: DataOrder) -> u32 {
        match decode_words(
            &[0x1234, 0x5678],
            &DataType::Scalar(ScalarType::Uint32),
            order,
        )
        .unwrap()
        {
            Value::Uint32(value) => value,
            other => panic!("expected uint32, got {other:?}"),
        }
    }

    #[test]
    fn test_uint32_orders() {
        assert_eq!(uint32(DataOrder::Abcd), 0x12345678);
        assert_eq!(uint32(DataOrder::Dcba), 0x78563412);
        assert_eq!(uint32(DataOrder::Cdab), 0x56781234);
        assert_eq!(uint32(DataOrder::Badc), 0x34127856);
    }

    #[test]
    fn test_int16_with_swap() {
        let value = decode_words(
            &[0x01FF],
            &DataType::Scalar(ScalarType::Int16),
            DataOrder::Ba,
        )
        .unwrap();
        assert_eq!(value, Value::Int16(i16::from_be_bytes([0xFF, 0x01])));
    }

    #[test]
    fn test_float32() {
        let bits = 1.5f32.to_bits();
        let words = [(bits >> 16) as u16, bits as u16];
        let value = decode_words(
            &words,
            &DataType::Scalar(ScalarType::Float32),
            DataOrder::Abcd,
        )
        .unwrap();
        assert_eq!(value, Value::Float32(1.5));
    }

    #[test]
    fn test_uint16_array() {
        let value = decode_words(
            &[0xABCD; 5],
            &DataType::Array(ScalarType::Uint16, 5),
            DataOrder::Abcd,
        )
        .unwrap();
        assert_eq!(value, Value::Array(vec![Value::Uint16(0xABCD); 5]));
    }

    #[test]
    fn test_string_trims_trailing_nuls() {
        // "MB" "us" "\0\0"
        let value = decode_words(
            &[0x4D42, 0x7573, 0x0000],
            &DataType::Scalar(ScalarType::String),
            DataOrder::Ab,
        )
        .unwrap();
        assert_eq!(value, Value::String("MBus".into()));
    }

    #[test]
    fn test_bits_decode() {
        let bits = [true, false, true];
        assert_eq!(
            decode_bits(&bits, &DataType::Scalar(ScalarType::Bool)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            decode_bits(&bits, &DataType::Array(ScalarType::Bool, 3)).unwrap(),
            Value::Array(vec![
                Value::Bool(true),
                Value::Bool(false),
                Value::Bool(true)
            ])
        );
        assert!(decode_bits(&bits, &DataType::Scalar(ScalarType::Uint16)).is_err());
    }

    #[test]
    fn test_window_too_small() {
        assert!(decode_words(
            &[0x0001],
            &DataType::Scalar(ScalarType::Uint32),
            DataOrder::Abcd
        )
        .is_err());
    }
}
