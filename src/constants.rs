//! Protocol constants: function codes and the limits imposed by the
//! Modbus application protocol specification.

/// Modbus public function codes supported by the client engine.
pub mod function {
    pub const READ_COILS: u8 = 0x01;
    pub const READ_DISCRETE_INPUTS: u8 = 0x02;
    pub const READ_HOLDING_REGISTERS: u8 = 0x03;
    pub const READ_INPUT_REGISTERS: u8 = 0x04;
    pub const WRITE_SINGLE_COIL: u8 = 0x05;
    pub const WRITE_SINGLE_REGISTER: u8 = 0x06;
    pub const WRITE_MULTIPLE_COILS: u8 = 0x0F;
    pub const WRITE_MULTIPLE_REGISTERS: u8 = 0x10;
    pub const MASK_WRITE_REGISTER: u8 = 0x16;
    pub const READ_WRITE_MULTIPLE_REGISTERS: u8 = 0x17;
    pub const READ_FIFO_QUEUE: u8 = 0x18;
    pub const ENCAPSULATED_INTERFACE_TRANSPORT: u8 = 0x2B;

    /// MEI type for Read Device Identification under function 0x2B.
    pub const MEI_READ_DEVICE_ID: u8 = 0x0E;
}

/// Top bit of the response function code marks an exception PDU.
pub const EXCEPTION_BIT: u8 = 0x80;

/// Maximum PDU payload carried by any Modbus transport.
pub const MAX_PDU_LENGTH: usize = 253;

/// RTU ADU limit: slave id + PDU + CRC.
pub const MAX_RTU_FRAME_LENGTH: usize = 256;

/// Minimum RTU ADU: slave id + function code + CRC.
pub const MIN_RTU_FRAME_LENGTH: usize = 4;

/// MBAP header: transaction id (2) + protocol id (2) + length (2) + unit id (1).
pub const MBAP_HEADER_LENGTH: usize = 7;

/// Minimum MBAP ADU: header + function code.
pub const MIN_TCP_FRAME_LENGTH: usize = 8;

/// Default cap for a full MBAP ADU; configurable upwards, never below 260.
pub const DEFAULT_MAX_TCP_FRAME_LENGTH: usize = 260;

/// Broadcast slave id: writes are sent, no response is expected.
pub const BROADCAST_SLAVE_ID: u8 = 0;

/// Highest addressable slave id on an RTU bus.
pub const MAX_SLAVE_ID: u8 = 247;

/// Quantity limits per function, from the application protocol spec.
pub const MAX_READ_BITS: u16 = 2000;
pub const MAX_READ_REGISTERS: u16 = 125;
pub const MAX_WRITE_BITS: u16 = 1968;
pub const MAX_WRITE_REGISTERS: u16 = 123;
pub const MAX_READ_WRITE_WRITE_REGISTERS: u16 = 121;
pub const MAX_FIFO_COUNT: u16 = 31;

/// Coil values on the wire for function 0x05.
pub const COIL_ON: u16 = 0xFF00;
pub const COIL_OFF: u16 = 0x0000;

/// Limit on the total quantity a register group may span for a given
/// read function.
pub fn read_limit(function: u8) -> Option<u16> {
    match function {
        function::READ_COILS | function::READ_DISCRETE_INPUTS => Some(MAX_READ_BITS),
        function::READ_HOLDING_REGISTERS | function::READ_INPUT_REGISTERS => {
            Some(MAX_READ_REGISTERS)
        }
        _ => None,
    }
}
