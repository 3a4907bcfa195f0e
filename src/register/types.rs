//! Declarative register model: data types, byte/word orders and the
//! decoded value sum type.

use serde::{Deserialize, Serialize};

use crate::constants::{function, read_limit};
use crate::errors::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Bool,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Int64,
    Uint64,
    Float64,
    String,
}

impl ScalarType {
    /// Wire footprint of one element in bytes. `String` consumes the
    /// whole register window and reports 0 here.
    pub fn wire_bytes(&self) -> usize {
        match self {
            Self::Int8 | Self::Uint8 => 1,
            Self::Bool | Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Int64 | Self::Uint64 | Self::Float64 => 8,
            Self::String => 0,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Uint8 => "uint8",
            Self::Int16 => "int16",
            Self::Uint16 => "uint16",
            Self::Int32 => "int32",
            Self::Uint32 => "uint32",
            Self::Float32 => "float32",
            Self::Int64 => "int64",
            Self::Uint64 => "uint64",
            Self::Float64 => "float64",
            Self::String => "string",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => Self::Bool,
            "int8" => Self::Int8,
            "uint8" => Self::Uint8,
            "int16" => Self::Int16,
            "uint16" => Self::Uint16,
            "int32" => Self::Int32,
            "uint32" => Self::Uint32,
            "float32" => Self::Float32,
            "int64" => Self::Int64,
            "uint64" => Self::Uint64,
            "float64" => Self::Float64,
            "string" => Self::String,
            _ => return None,
        })
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A register's declared type: a scalar, a fixed-size array (`uint16[5]`),
/// or a virtual point that never reaches the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataType {
    Scalar(ScalarType),
    Array(ScalarType, usize),
    Virtual,
}

impl DataType {
    /// Bytes this type needs from the register window; 0 means the whole
    /// window (strings).
    pub fn wire_bytes(&self) -> usize {
        match self {
            Self::Scalar(scalar) => scalar.wire_bytes(),
            Self::Array(scalar, count) => scalar.wire_bytes() * count,
            Self::Virtual => 0,
        }
    }
}

impl std::str::FromStr for DataType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("virtual") {
            return Ok(Self::Virtual);
        }

        let lower = s.to_ascii_lowercase();
        if let Some(open) = lower.find('[') {
            let close = lower
                .strip_suffix(']')
                .ok_or_else(|| ValidationError::UnknownDataType(s.to_string()))?;
            let scalar = ScalarType::parse(&lower[..open])
                .filter(|scalar| *scalar != ScalarType::String)
                .ok_or_else(|| ValidationError::UnknownDataType(s.to_string()))?;
            let count: usize = close[open + 1..]
                .parse()
                .ok()
                .filter(|&count| count > 0)
                .ok_or_else(|| ValidationError::UnknownDataType(s.to_string()))?;
            return Ok(Self::Array(scalar, count));
        }

        ScalarType::parse(&lower)
            .map(Self::Scalar)
            .ok_or_else(|| ValidationError::UnknownDataType(s.to_string()))
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(scalar) => write!(f, "{scalar}"),
            Self::Array(scalar, count) => write!(f, "{scalar}[{count}]"),
            Self::Virtual => write!(f, "virtual"),
        }
    }
}

impl TryFrom<String> for DataType {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DataType> for String {
    fn from(value: DataType) -> Self {
        value.to_string()
    }
}

/// Byte permutation applied to the raw big-endian bytes before numeric
/// interpretation. Identity orders (`AB`, `ABCD`, `ABCDEFGH`) apply to
/// any width; swapped orders require a chunk of their own width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DataOrder {
    #[default]
    #[serde(rename = "AB")]
    Ab,
    #[serde(rename = "BA")]
    Ba,
    #[serde(rename = "ABCD")]
    Abcd,
    #[serde(rename = "DCBA")]
    Dcba,
    #[serde(rename = "BADC")]
    Badc,
    #[serde(rename = "CDAB")]
    Cdab,
    #[serde(rename = "ABCDEFGH")]
    Abcdefgh,
    #[serde(rename = "HGFEDCBA")]
    Hgfedcba,
    #[serde(rename = "BADCFEHG")]
    Badcfehg,
    #[serde(rename = "GHEFCDAB")]
    Ghefcdab,
}

impl DataOrder {
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Ab | Self::Abcd | Self::Abcdefgh)
    }

    /// Width the permutation is defined over; identity orders are
    /// width-agnostic and report 0.
    pub fn width(&self) -> usize {
        match self {
            Self::Ab | Self::Abcd | Self::Abcdefgh => 0,
            Self::Ba => 2,
            Self::Dcba | Self::Badc | Self::Cdab => 4,
            Self::Hgfedcba | Self::Badcfehg | Self::Ghefcdab => 8,
        }
    }

    /// Reorders one element's bytes.
    pub fn permute(&self, chunk: &[u8]) -> Result<Vec<u8>, ValidationError> {
        if self.is_identity() {
            return Ok(chunk.to_vec());
        }
        if chunk.len() != self.width() {
            return Err(ValidationError::OrderWidthMismatch {
                order: self.to_string(),
                data_type: format!("{}-byte value", chunk.len()),
                expected: self.width(),
            });
        }

        let index: &[usize] = match self {
            Self::Ba => &[1, 0],
            Self::Dcba => &[3, 2, 1, 0],
            Self::Badc => &[1, 0, 3, 2],
            Self::Cdab => &[2, 3, 0, 1],
            Self::Hgfedcba => &[7, 6, 5, 4, 3, 2, 1, 0],
            Self::Badcfehg => &[1, 0, 3, 2, 5, 4, 7, 6],
            Self::Ghefcdab => &[6, 7, 4, 5, 2, 3, 0, 1],
            _ => unreachable!("identity orders returned above"),
        };

        Ok(index.iter().map(|&i| chunk[i]).collect())
    }
}

impl std::fmt::Display for DataOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Ab => "AB",
            Self::Ba => "BA",
            Self::Abcd => "ABCD",
            Self::Dcba => "DCBA",
            Self::Badc => "BADC",
            Self::Cdab => "CDAB",
            Self::Abcdefgh => "ABCDEFGH",
            Self::Hgfedcba => "HGFEDCBA",
            Self::Badcfehg => "BADCFEHG",
            Self::Ghefcdab => "GHEFCDAB",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for DataOrder {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "AB" => Self::Ab,
            "BA" => Self::Ba,
            "ABCD" => Self::Abcd,
            "DCBA" => Self::Dcba,
            "BADC" => Self::Badc,
            "CDAB" => Self::Cdab,
            "ABCDEFGH" => Self::Abcdefgh,
            "HGFEDCBA" => Self::Hgfedcba,
            "BADCFEHG" => Self::Badcfehg,
            "GHEFCDAB" => Self::Ghefcdab,
            _ => return Err(ValidationError::UnknownDataOrder(s.to_string())),
        })
    }
}

/// A decoded register value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int8(i8),
    Uint8(u8),
    Int16(i16),
    Uint16(u16),
    Int32(i32),
    Uint32(u32),
    Float32(f32),
    Int64(i64),
    Uint64(u64),
    Float64(f64),
    String(String),
    Array(Vec<Value>),
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int8(v) => write!(f, "{v}"),
            Self::Uint8(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Uint16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Uint32(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Uint64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::Array(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// One declared data point. `value` holds the raw words of the last
/// successful read; `decoded_value` the typed interpretation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRegister {
    pub tag: String,
    #[serde(default)]
    pub alias: String,
    pub slave_id: u8,
    pub function: u8,
    pub read_address: u16,
    pub read_quantity: u16,
    pub data_type: DataType,
    #[serde(default)]
    pub data_order: DataOrder,
    #[serde(default)]
    pub value: Vec<u16>,
    #[serde(skip)]
    pub decoded_value: Option<Value>,
}

impl DeviceRegister {
    pub fn new(
        tag: impl Into<String>,
        slave_id: u8,
        function: u8,
        read_address: u16,
        read_quantity: u16,
        data_type: DataType,
        data_order: DataOrder,
    ) -> Self {
        let tag = tag.into();
        Self {
            alias: tag.clone(),
            tag,
            slave_id,
            function,
            read_address,
            read_quantity,
            data_type,
            data_order,
            value: Vec::new(),
            decoded_value: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Checks the declaration against the read function and its window.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.function {
            function::READ_COILS
            | function::READ_DISCRETE_INPUTS
            | function::READ_HOLDING_REGISTERS
            | function::READ_INPUT_REGISTERS => {}
            other => return Err(ValidationError::UnsupportedFunction(other)),
        }
        let limit = read_limit(self.function).unwrap_or(0);
        if self.read_quantity == 0 || self.read_quantity > limit {
            return Err(ValidationError::QuantityOutOfRange {
                function: self.function,
                quantity: self.read_quantity,
                max: limit,
            });
        }

        let window_too_small = match self.function {
            function::READ_COILS | function::READ_DISCRETE_INPUTS => {
                // Bit-oriented windows count bits, and only boolean
                // shapes can decode them.
                let bits_needed = match &self.data_type {
                    DataType::Scalar(ScalarType::Bool) => 1,
                    DataType::Array(ScalarType::Bool, count) => *count,
                    other => {
                        return Err(ValidationError::BitTypeMismatch(other.to_string()));
                    }
                };
                bits_needed > self.read_quantity as usize
            }
            _ => self.data_type.wire_bytes() > self.read_quantity as usize * 2,
        };
        if window_too_small {
            return Err(ValidationError::WindowTooSmall {
                tag: self.tag.clone(),
                quantity: self.read_quantity,
                data_type: self.data_type.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_parsing() {
        assert_eq!(
            "uint16".parse::<DataType>().unwrap(),
            DataType::Scalar(ScalarType::Uint16)
        );
        assert_eq!(
            "uint16[5]".parse::<DataType>().unwrap(),
            DataType::Array(ScalarType::Uint16, 5)
        );
        assert_eq!("virtual".parse::<DataType>().unwrap(), DataType::Virtual);
        assert!("uint12".parse::<DataType>().is_err());
        assert!("uint16[0]".parse::<DataType>().is_err());
        assert!("string[4]".parse::<DataType>().is_err());
    }

    #[test]
    fn test_data_type_round_trip() {
        for name in ["bool", "float64", "int32[3]", "virtual"] {
            let parsed: DataType = name.parse().unwrap();
            assert_eq!(parsed.to_string(), name);
        }
    }

    #[test]
    fn test_order_permutations() {
        let chunk = [0x12, 0x34, 0x56, 0x78];
        assert_eq!(DataOrder::Abcd.permute(&chunk).unwrap(), chunk);
        assert_eq!(
            DataOrder::Dcba.permute(&chunk).unwrap(),
            [0x78, 0x56, 0x34, 0x12]
        );
        assert_eq!(
            DataOrder::Badc.permute(&chunk).unwrap(),
            [0x34, 0x12, 0x78, 0x56]
        );
        assert_eq!(
            DataOrder::Cdab.permute(&chunk).unwrap(),
            [0x56, 0x78, 0x12, 0x34]
        );
        assert_eq!(DataOrder::Ba.permute(&[0x12, 0x34]).unwrap(), [0x34, 0x12]);
    }

    #[test]
    fn test_identity_orders_are_width_agnostic() {
        assert_eq!(DataOrder::Abcd.permute(&[0xAB, 0xCD]).unwrap(), [0xAB, 0xCD]);
        assert!(DataOrder::Dcba.permute(&[0xAB, 0xCD]).is_err());
    }

    #[test]
    fn test_coil_register_accepts_bool() {
        let register = DeviceRegister::new(
            "run",
            1,
            function::READ_COILS,
            0,
            1,
            DataType::Scalar(ScalarType::Bool),
            DataOrder::Ab,
        );
        assert!(register.validate().is_ok());

        let register = DeviceRegister {
            data_type: DataType::Scalar(ScalarType::Uint16),
            ..register
        };
        assert!(register.validate().is_err());
    }

    #[test]
    fn test_register_window_validation() {
        let register = DeviceRegister::new(
            "temp",
            1,
            function::READ_HOLDING_REGISTERS,
            0,
            1,
            DataType::Scalar(ScalarType::Float32),
            DataOrder::Abcd,
        );
        assert!(register.validate().is_err());

        let register = DeviceRegister {
            read_quantity: 2,
            ..register
        };
        assert!(register.validate().is_ok());
    }
}
