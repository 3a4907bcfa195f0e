//! MBAP framing: `transaction_id | protocol_id | length | unit_id | PDU`.

use crate::constants::{MAX_PDU_LENGTH, MBAP_HEADER_LENGTH, MIN_TCP_FRAME_LENGTH};
use crate::errors::{ClientError, FrameErrorKind};

/// The six bytes preceding the unit id on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    pub transaction_id: u16,
    pub protocol_id: u16,
    pub length: u16,
}

impl MbapHeader {
    /// Parses the fixed-size prefix read off a TCP stream.
    pub fn parse(bytes: &[u8; 6]) -> Self {
        Self {
            transaction_id: u16::from_be_bytes([bytes[0], bytes[1]]),
            protocol_id: u16::from_be_bytes([bytes[2], bytes[3]]),
            length: u16::from_be_bytes([bytes[4], bytes[5]]),
        }
    }
}

/// Assembles an MBAP ADU around the given PDU.
pub fn pack(transaction_id: u16, unit_id: u8, pdu: &[u8]) -> Result<Vec<u8>, ClientError> {
    if pdu.is_empty() {
        return Err(ClientError::frame(
            FrameErrorKind::InvalidFormat,
            "Empty PDU",
            None,
        ));
    }
    if pdu.len() > MAX_PDU_LENGTH {
        return Err(ClientError::frame(
            FrameErrorKind::TooLong,
            format!("PDU of {} bytes exceeds {}", pdu.len(), MAX_PDU_LENGTH),
            None,
        ));
    }

    let length = (1 + pdu.len()) as u16;
    let mut frame = Vec::with_capacity(MBAP_HEADER_LENGTH + pdu.len());
    frame.extend_from_slice(&transaction_id.to_be_bytes());
    frame.extend_from_slice(&0u16.to_be_bytes());
    frame.extend_from_slice(&length.to_be_bytes());
    frame.push(unit_id);
    frame.extend_from_slice(pdu);

    Ok(frame)
}

/// Structural checks on a full MBAP ADU without copying.
pub fn validate_frame(frame: &[u8], max_frame_length: usize) -> Result<(), ClientError> {
    if frame.len() < MIN_TCP_FRAME_LENGTH {
        return Err(ClientError::frame(
            FrameErrorKind::TooShort,
            format!("MBAP frame of {} bytes, need at least 8", frame.len()),
            Some(frame.to_vec()),
        ));
    }
    if frame.len() > max_frame_length {
        return Err(ClientError::frame(
            FrameErrorKind::TooLong,
            format!(
                "MBAP frame of {} bytes exceeds limit {}",
                frame.len(),
                max_frame_length
            ),
            Some(frame.to_vec()),
        ));
    }

    let protocol_id = u16::from_be_bytes([frame[2], frame[3]]);
    if protocol_id != 0 {
        return Err(ClientError::frame(
            FrameErrorKind::InvalidHeader,
            format!("Protocol ID {:#06X}, expected 0x0000", protocol_id),
            Some(frame.to_vec()),
        ));
    }

    let length = u16::from_be_bytes([frame[4], frame[5]]) as usize;
    if length == 0 || length != frame.len() - 6 {
        return Err(ClientError::frame(
            FrameErrorKind::InvalidHeader,
            format!(
                "Length field {} does not match frame payload of {} bytes",
                length,
                frame.len() - 6
            ),
            Some(frame.to_vec()),
        ));
    }

    Ok(())
}

/// Validates and splits an MBAP ADU into transaction id, unit id and PDU.
pub fn unpack(frame: &[u8], max_frame_length: usize) -> Result<(u16, u8, &[u8]), ClientError> {
    validate_frame(frame, max_frame_length)?;

    let transaction_id = u16::from_be_bytes([frame[0], frame[1]]);
    let unit_id = frame[6];

    Ok((transaction_id, unit_id, &frame[MBAP_HEADER_LENGTH..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_MAX_TCP_FRAME_LENGTH;

    #[test]
    fn test_round_trip() {
        let pdu = [0x03, 0x00, 0x00, 0x00, 0x0A];
        let frame = pack(0x0001, 0x11, &pdu).unwrap();
        let (tid, uid, unpacked) = unpack(&frame, DEFAULT_MAX_TCP_FRAME_LENGTH).unwrap();
        assert_eq!(tid, 0x0001);
        assert_eq!(uid, 0x11);
        assert_eq!(unpacked, pdu);
    }

    #[test]
    fn test_known_read_holding_frame() {
        let frame = pack(1, 1, &[0x03, 0x00, 0x00, 0x00, 0x0A]).unwrap();
        assert_eq!(
            frame,
            [0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x0A]
        );
    }

    #[test]
    fn test_rejects_empty_and_oversized_pdu() {
        assert!(pack(1, 1, &[]).is_err());
        assert!(pack(1, 1, &vec![0u8; MAX_PDU_LENGTH + 1]).is_err());
        assert!(pack(1, 1, &vec![0x03; MAX_PDU_LENGTH]).is_ok());
    }

    #[test]
    fn test_rejects_nonzero_protocol_id() {
        let mut frame = pack(1, 1, &[0x03, 0x02, 0xAB, 0xCD]).unwrap();
        frame[2] = 0x01;
        assert!(validate_frame(&frame, DEFAULT_MAX_TCP_FRAME_LENGTH).is_err());
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let mut frame = pack(1, 1, &[0x03, 0x02, 0xAB, 0xCD]).unwrap();
        frame[5] += 1;
        assert!(validate_frame(&frame, DEFAULT_MAX_TCP_FRAME_LENGTH).is_err());

        frame[5] = 0;
        assert!(validate_frame(&frame, DEFAULT_MAX_TCP_FRAME_LENGTH).is_err());
    }

    #[test]
    fn test_header_parse() {
        let header = MbapHeader::parse(&[0x12, 0x34, 0x00, 0x00, 0x00, 0x06]);
        assert_eq!(header.transaction_id, 0x1234);
        assert_eq!(header.protocol_id, 0);
        assert_eq!(header.length, 6);
    }
}
