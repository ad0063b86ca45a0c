// Copyright 2023 The Android Open Source Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use bytes::{BufMut, BytesMut};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use thiserror::Error;

/// Size of the message integrity check appended to encrypted payloads.
pub const MIC_SIZE: u8 = 4;

/// LLID field of the CIS Data PDU.
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
pub enum CisLlid {
    /// Unframed; end fragment of an SDU or a complete SDU.
    CompleteEnd = 0b00,
    /// Unframed; start or continuation fragment, or a null PDU.
    StartContinue = 0b01,
    /// Framed; one or more segments of an SDU.
    Framed = 0b10,
}

/// CIS Data PDU.
///
/// Over-the-air layout, cf Vol 6, Part B § 2.6:
///
/// ```text
/// byte 0: LLID[1:0] | NESN[2] | SN[3] | CIE[4] | RFU[5] | NPI[6] | RFU[7]
/// byte 1: Length
/// byte 2..: Payload
/// ```
///
/// This layout is a fixed external contract; the MIC of encrypted payloads
/// is produced and stripped by the cipher engine and never appears here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CisPdu {
    pub ll_id: CisLlid,
    pub nesn: bool,
    pub sn: bool,
    pub cie: bool,
    pub npi: bool,
    pub payload: Vec<u8>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PduError {
    #[error("PDU shorter than the 2 byte data header")]
    TooShort,
    #[error("reserved LLID value {0:#04b}")]
    InvalidLlid(u8),
    #[error("length field {0} disagrees with the {1} received payload bytes")]
    LengthMismatch(u8, usize),
}

impl CisPdu {
    /// Zero-length PDU carrying only the acknowledgment handshake.
    pub fn null(nesn: bool, sn: bool, cie: bool, npi: bool) -> CisPdu {
        CisPdu { ll_id: CisLlid::StartContinue, nesn, sn, cie, npi, payload: vec![] }
    }

    pub fn is_null(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn encode(&self) -> Vec<u8> {
        debug_assert!(
            self.payload.len() <= u8::MAX as usize,
            "payload exceeds the 1 byte length field"
        );
        let mut bytes = BytesMut::with_capacity(2 + self.payload.len());
        // RFU bits (5 and 7) transmit as zero.
        bytes.put_u8(
            self.ll_id as u8
                | (self.nesn as u8) << 2
                | (self.sn as u8) << 3
                | (self.cie as u8) << 4
                | (self.npi as u8) << 6,
        );
        bytes.put_u8(self.payload.len() as u8);
        bytes.put_slice(&self.payload);
        bytes.to_vec()
    }

    pub fn decode(bytes: &[u8]) -> Result<CisPdu, PduError> {
        if bytes.len() < 2 {
            return Err(PduError::TooShort);
        }
        let header = bytes[0];
        let ll_id =
            CisLlid::from_u8(header & 0b11).ok_or_else(|| PduError::InvalidLlid(header & 0b11))?;
        let len = bytes[1];
        if bytes.len() - 2 < len as usize {
            return Err(PduError::LengthMismatch(len, bytes.len() - 2));
        }
        Ok(CisPdu {
            ll_id,
            nesn: (header >> 2) & 1 != 0,
            sn: (header >> 3) & 1 != 0,
            cie: (header >> 4) & 1 != 0,
            npi: (header >> 6) & 1 != 0,
            payload: bytes[2..2 + len as usize].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_bits_encode_in_place() {
        let pdu = CisPdu {
            ll_id: CisLlid::StartContinue,
            nesn: true,
            sn: false,
            cie: true,
            npi: false,
            payload: vec![0xaa, 0xbb],
        };
        let bytes = pdu.encode();
        assert_eq!(bytes[0], 0b0001_0101);
        assert_eq!(bytes[1], 2);
        assert_eq!(&bytes[2..], &[0xaa, 0xbb]);
        assert_eq!(CisPdu::decode(&bytes), Ok(pdu));
    }

    #[test]
    fn null_pdu_is_two_bytes() {
        let pdu = CisPdu::null(false, false, true, true);
        let bytes = pdu.encode();
        assert_eq!(bytes.len(), 2);
        assert_eq!(bytes[0], 0b0101_0001);
        assert_eq!(bytes[1], 0);
        assert!(CisPdu::decode(&bytes).unwrap().is_null());
    }

    #[test]
    fn reserved_llid_is_rejected() {
        assert_eq!(CisPdu::decode(&[0b11, 0]), Err(PduError::InvalidLlid(0b11)));
    }

    #[test]
    #[should_panic(expected = "length field")]
    fn oversized_payload_is_rejected_at_encode() {
        CisPdu {
            ll_id: CisLlid::StartContinue,
            nesn: false,
            sn: false,
            cie: false,
            npi: false,
            payload: vec![0; 256],
        }
        .encode();
    }

    #[test]
    fn truncated_pdu_is_rejected() {
        assert_eq!(CisPdu::decode(&[0b01]), Err(PduError::TooShort));
        assert_eq!(CisPdu::decode(&[0b01, 4, 1, 2]), Err(PduError::LengthMismatch(4, 2)));
    }
}
