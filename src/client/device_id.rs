//! Read Device Identification (function 0x2B, MEI type 0x0E): a
//! multi-round protocol walking up to three object tables.

use std::collections::BTreeMap;

use tracing::debug;

use crate::constants::{function, BROADCAST_SLAVE_ID};
use crate::errors::{ClientError, ProtocolErrorKind, ValidationError};

use super::Client;

/// The three object classes a server may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceIdCode {
    Basic = 0x01,
    Regular = 0x02,
    Extended = 0x03,
}

/// Accumulated identification objects keyed by object id.
#[derive(Debug, Clone, Default)]
pub struct DeviceIdentification {
    pub conformity_level: u8,
    pub objects: BTreeMap<u8, Vec<u8>>,
}

impl DeviceIdentification {
    /// Object 0x00, present on every conformant server.
    pub fn vendor_name(&self) -> Option<&[u8]> {
        self.objects.get(&0x00).map(Vec::as_slice)
    }

    pub fn product_code(&self) -> Option<&[u8]> {
        self.objects.get(&0x01).map(Vec::as_slice)
    }

    pub fn revision(&self) -> Option<&[u8]> {
        self.objects.get(&0x02).map(Vec::as_slice)
    }
}

struct DeviceIdRound {
    conformity_level: u8,
    more_follows: u8,
    next_object_id: u8,
    objects: Vec<(u8, Vec<u8>)>,
}

impl Client {
    /// Reads the identification object tables of `slave_id`.
    ///
    /// Starts with the basic table at object 0 and iterates while the
    /// server flags more objects. When the conformity level advertises
    /// the regular table it is walked next; the extended table is walked
    /// only when the caller names a starting id (`>= 0x80`) for it.
    pub async fn read_device_identification(
        &self,
        slave_id: u8,
        first_extended_id: Option<u8>,
    ) -> Result<DeviceIdentification, ClientError> {
        if slave_id == BROADCAST_SLAVE_ID {
            return Err(ValidationError::BroadcastRead.into());
        }

        let mut identification = DeviceIdentification::default();
        self.read_object_table(slave_id, DeviceIdCode::Basic, 0x00, &mut identification)
            .await?;

        if identification.objects.len() < 3 {
            return Err(ClientError::protocol(
                ProtocolErrorKind::InvalidPdu,
                format!(
                    "Server returned {} of 3 mandatory identification objects",
                    identification.objects.len()
                ),
            ));
        }

        let level = identification.conformity_level & 0x7F;
        if level & 0x02 != 0 {
            self.read_object_table(slave_id, DeviceIdCode::Regular, 0x00, &mut identification)
                .await?;
        }
        if level & 0x03 == 0x03 {
            if let Some(start) = first_extended_id.filter(|&id| id >= 0x80) {
                self.read_object_table(slave_id, DeviceIdCode::Extended, start, &mut identification)
                    .await?;
            }
        }

        Ok(identification)
    }

    async fn read_object_table(
        &self,
        slave_id: u8,
        code: DeviceIdCode,
        start: u8,
        identification: &mut DeviceIdentification,
    ) -> Result<(), ClientError> {
        let mut object_id = start;

        loop {
            let request = [
                function::ENCAPSULATED_INTERFACE_TRANSPORT,
                function::MEI_READ_DEVICE_ID,
                code as u8,
                object_id,
            ];
            let response = self.request(slave_id, &request).await?;
            let round = parse_device_id_response(&response)?;

            identification.conformity_level = round.conformity_level;
            let count = round.objects.len();
            for (id, data) in round.objects {
                identification.objects.insert(id, data);
            }
            debug!(
                "Device ID round: code {:#04X}, {} objects, more={:#04X}",
                code as u8, count, round.more_follows
            );

            if round.more_follows != 0xFF || round.next_object_id == 0x00 {
                return Ok(());
            }
            object_id = round.next_object_id;
        }
    }
}

fn parse_device_id_response(pdu: &[u8]) -> Result<DeviceIdRound, ClientError> {
    // fc, MEI type, id code, conformity, more, next, count
    if pdu.len() < 7 {
        return Err(ClientError::protocol(
            ProtocolErrorKind::InvalidPdu,
            format!("Device ID response of {} bytes", pdu.len()),
        ));
    }
    if pdu[1] != function::MEI_READ_DEVICE_ID {
        return Err(ClientError::protocol(
            ProtocolErrorKind::InvalidPdu,
            format!("MEI type {:#04X}, expected 0x0E", pdu[1]),
        ));
    }

    let conformity_level = pdu[3];
    if !matches!(conformity_level & 0x7F, 0x01..=0x03) {
        return Err(ClientError::protocol(
            ProtocolErrorKind::InvalidConformityLevel,
            format!("Conformity level {:#04X}", conformity_level),
        ));
    }

    let more_follows = pdu[4];
    let next_object_id = pdu[5];
    let object_count = pdu[6] as usize;

    let mut objects = Vec::with_capacity(object_count);
    let mut offset = 7;
    for _ in 0..object_count {
        if offset + 2 > pdu.len() {
            return Err(ClientError::protocol(
                ProtocolErrorKind::InvalidPdu,
                "Truncated identification object header",
            ));
        }
        let id = pdu[offset];
        let len = pdu[offset + 1] as usize;
        offset += 2;
        if offset + len > pdu.len() {
            return Err(ClientError::protocol(
                ProtocolErrorKind::InvalidPdu,
                format!("Identification object {:#04X} truncated", id),
            ));
        }
        objects.push((id, pdu[offset..offset + len].to_vec()));
        offset += len;
    }

    Ok(DeviceIdRound {
        conformity_level,
        more_follows,
        next_object_id,
        objects,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic_response() -> Vec<u8> {
        let mut pdu = vec![0x2B, 0x0E, 0x01, 0x01, 0x00, 0x00, 0x03];
        for (id, text) in [(0x00u8, "Acme"), (0x01, "MM-1"), (0x02, "1.0")] {
            pdu.push(id);
            pdu.push(text.len() as u8);
            pdu.extend_from_slice(text.as_bytes());
        }
        pdu
    }

    #[test]
    fn test_parse_basic_round() {
        let round = parse_device_id_response(&basic_response()).unwrap();
        assert_eq!(round.conformity_level, 0x01);
        assert_eq!(round.more_follows, 0x00);
        assert_eq!(round.objects.len(), 3);
        assert_eq!(round.objects[0], (0x00, b"Acme".to_vec()));
    }

    #[test]
    fn test_rejects_bad_conformity() {
        let mut pdu = basic_response();
        pdu[3] = 0x10;
        assert!(parse_device_id_response(&pdu).is_err());
    }

    #[test]
    fn test_rejects_truncated_object() {
        let mut pdu = basic_response();
        pdu.truncate(pdu.len() - 2);
        assert!(parse_device_id_response(&pdu).is_err());
    }
}
