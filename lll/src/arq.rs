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

//! Acknowledgment and flow control over one event: sequence number
//! advancement, burst counters, and the close negotiation.

use crate::context::{Context, IsoRxRecord, IsoRxStatus, MicState};
use crate::event::Event;
use crate::pdu::{CisLlid, CisPdu};
use crate::stream::CisStream;

/// Outbound PDU resolved for one subevent.
#[derive(Clone, Debug)]
pub(crate) struct TxPdu {
    pub pdu: CisPdu,
    /// Absolute index of the carried payload; 0 for a null PDU sent with
    /// the transmit burst exhausted.
    pub payload_count: u64,
}

/// Resolve the outbound PDU for the subevent at burst position `bn_tx`.
///
/// With the transmit burst exhausted this is a null PDU with a reserved
/// sequence field, requesting close when the receive burst is also done.
/// Otherwise the queue is scanned for the payload due at
/// `event_count * bn + (bn_tx - 1)`; entries behind that index are
/// retired with an acknowledgment, and a miss falls back to a null PDU
/// that still carries the live sequence bit.
pub(crate) fn build_pdu(
    stream: &mut CisStream,
    ctx: &mut impl Context,
    bn_tx: u8,
    bn_rx: u8,
) -> TxPdu {
    if bn_tx > stream.tx.bn {
        // sn is reserved for null PDUs past the burst.
        let cie = bn_rx > stream.rx.bn;
        return TxPdu { pdu: CisPdu::null(stream.nesn_bit(), false, cie, true), payload_count: 0 };
    }

    let target = stream.event_count * stream.tx.bn as u64 + (bn_tx as u64 - 1);
    let handle = stream.handle;
    let payload = stream
        .tx_queue
        .scan(target, |node| ctx.enqueue_tx_ack(handle, node))
        .map(|node| node.payload.clone());

    match payload {
        None => TxPdu {
            pdu: CisPdu::null(stream.nesn_bit(), stream.sn_bit(), false, false),
            payload_count: target,
        },
        Some(payload) => TxPdu {
            pdu: CisPdu {
                ll_id: CisLlid::StartContinue,
                nesn: stream.nesn_bit(),
                sn: stream.sn_bit(),
                cie: false,
                npi: false,
                payload,
            },
            payload_count: target,
        },
    }
}

/// Apply one received PDU with valid checksum; returns the peer's close
/// request bit.
pub(crate) fn process_rx(
    stream: &mut CisStream,
    ctx: &mut impl Context,
    ev: &mut Event,
    pdu_rx: &CisPdu,
    timestamp_us: u32,
) -> bool {
    // Tx ACK: the peer acknowledged the last transmission.
    if pdu_rx.nesn != stream.sn_bit() {
        stream.sn += 1;

        // The acknowledged payload consumed a cipher counter value.
        if !ev.tx_pdu.pdu.payload.is_empty() && stream.acl.enc_tx {
            stream.tx.ccm.increment();
        }

        if ev.bn_tx <= stream.tx.bn {
            ev.bn_tx += 1;
        }
    }

    // Rx receive: in-sequence data PDU, and a free slot beyond the one
    // reserved for the radio.
    if !pdu_rx.npi && pdu_rx.sn == stream.nesn_bit() && ctx.rx_slots_free() >= 2 {
        stream.nesn += 1;

        let mut deliver = true;
        if !pdu_rx.payload.is_empty() && stream.acl.enc_rx {
            // Decryption was initiated with the reception; the completion
            // flag is hardware asserted by now.
            assert!(ctx.cipher_is_done());

            if ctx.cipher_mic_valid() {
                stream.rx.ccm.increment();
                // Fail is sticky for the rest of the event.
                if ev.mic_state == MicState::None {
                    ev.mic_state = MicState::Pass;
                }
            } else {
                // Latched for the event outcome; the event itself runs on.
                ev.mic_state = MicState::Fail;
                deliver = false;
            }
        }

        if deliver {
            ctx.deliver_iso_rx(IsoRxRecord {
                handle: stream.handle,
                payload_number: stream.event_count * stream.rx.bn as u64
                    + (ev.bn_rx as u64 - 1),
                timestamp_us,
                status: IsoRxStatus::Valid,
                payload: pdu_rx.payload.clone(),
            });

            if ev.bn_rx <= stream.rx.bn {
                ev.bn_rx += 1;
            }
        }
    }

    pdu_rx.cie
}

/// Close Isochronous Event condition, computed identically on both ends:
/// the receive side is settled (peer request or burst exhausted) and the
/// transmit burst is exhausted.
pub(crate) fn close_decision(stream: &CisStream, ev: &Event, peer_cie: bool) -> bool {
    (peer_cie || ev.bn_rx > stream.rx.bn) && (ev.bn_tx > stream.tx.bn)
}
