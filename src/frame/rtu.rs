//! RTU framing: `slave_id | PDU | CRC16_LE`.

use crate::constants::{MAX_RTU_FRAME_LENGTH, MAX_SLAVE_ID, MIN_RTU_FRAME_LENGTH};
use crate::errors::{ClientError, FrameError, FrameErrorKind};

use super::crc16;

/// Assembles an RTU ADU around the given PDU.
pub fn pack(slave_id: u8, pdu: &[u8]) -> Result<Vec<u8>, ClientError> {
    if slave_id > MAX_SLAVE_ID {
        return Err(ClientError::frame(
            FrameErrorKind::InvalidSlaveId,
            format!("Slave ID {} out of range (0..=247)", slave_id),
            None,
        ));
    }
    if pdu.is_empty() {
        return Err(ClientError::frame(
            FrameErrorKind::InvalidFormat,
            "Empty PDU",
            None,
        ));
    }
    if 1 + pdu.len() + 2 > MAX_RTU_FRAME_LENGTH {
        return Err(ClientError::frame(
            FrameErrorKind::TooLong,
            format!("PDU of {} bytes exceeds RTU frame limit", pdu.len()),
            None,
        ));
    }

    let mut frame = Vec::with_capacity(1 + pdu.len() + 2);
    frame.push(slave_id);
    frame.extend_from_slice(pdu);
    let crc = crc16(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());

    Ok(frame)
}

/// Validates the CRC and splits an RTU ADU into slave id and PDU.
pub fn unpack(frame: &[u8]) -> Result<(u8, &[u8]), ClientError> {
    if frame.len() < MIN_RTU_FRAME_LENGTH {
        return Err(ClientError::frame(
            FrameErrorKind::TooShort,
            format!("RTU frame of {} bytes, need at least 4", frame.len()),
            Some(frame.to_vec()),
        ));
    }
    if frame.len() > MAX_RTU_FRAME_LENGTH {
        return Err(ClientError::frame(
            FrameErrorKind::TooLong,
            format!("RTU frame of {} bytes exceeds 256", frame.len()),
            Some(frame.to_vec()),
        ));
    }

    let payload = &frame[..frame.len() - 2];
    let calculated = crc16(payload);
    let received = u16::from_le_bytes([frame[frame.len() - 2], frame[frame.len() - 1]]);

    if calculated != received {
        return Err(ClientError::Frame(FrameError::crc(
            calculated, received, payload,
        )));
    }

    Ok((frame[0], &frame[1..frame.len() - 2]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FrameSizeKind;

    #[test]
    fn test_round_trip() {
        for slave in [0u8, 1, 10, 247] {
            let pdu = [0x03, 0x00, 0x00, 0x00, 0x0A];
            let frame = pack(slave, &pdu).unwrap();
            let (unpacked_slave, unpacked_pdu) = unpack(&frame).unwrap();
            assert_eq!(unpacked_slave, slave);
            assert_eq!(unpacked_pdu, pdu);
        }
    }

    #[test]
    fn test_known_write_coil_frame() {
        // WriteSingleCoil(slave=1, addr=10, ON)
        let frame = pack(1, &[0x05, 0x00, 0x0A, 0xFF, 0x00]).unwrap();
        assert_eq!(frame, [0x01, 0x05, 0x00, 0x0A, 0xFF, 0x00, 0xAC, 0x38]);
    }

    #[test]
    fn test_rejects_bad_slave() {
        assert!(pack(248, &[0x03]).is_err());
    }

    #[test]
    fn test_rejects_corrupted_crc() {
        let mut frame = pack(1, &[0x03, 0x02, 0xAB, 0xCD]).unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        match unpack(&frame) {
            Err(ClientError::Frame(FrameError::Crc { .. })) => {}
            other => panic!("expected CRC error, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_short_frame() {
        match unpack(&[0x01, 0x03, 0x00]) {
            Err(ClientError::Frame(FrameError::Size {
                kind: FrameSizeKind::TooShort,
                ..
            })) => {}
            other => panic!("expected size error, got {other:?}"),
        }
    }
}
