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

mod context;

pub(crate) use context::{RxSlot, TestContext};

use crate::chan::ChannelMap;
use crate::event::{Completion, Event, PrepareParam};
use crate::pdu::{CisLlid, CisPdu};
use crate::queue::IsoTxNode;
use crate::stream::{AclLink, CisStream, DirParam};

pub(crate) const ACCESS_ADDR: u32 = 0x8e89_bed6;
pub(crate) const CIS_HANDLE: u16 = 0xe00;
pub(crate) const ACL_HANDLE: u16 = 0x42;

/// Stream with symmetric burst parameters, positioned as if
/// `event_count` events already ran to completion.
pub(crate) fn test_stream(bn: u8, nse: u8, encrypted: bool, event_count: u64) -> CisStream {
    let mut stream = CisStream::new(
        CIS_HANDLE,
        ACCESS_ADDR,
        nse,
        1250,
        DirParam::new(bn, 251),
        DirParam::new(bn, 251),
        AclLink {
            handle: ACL_HANDLE,
            enc_tx: encrypted,
            enc_rx: encrypted,
            crc_init: 0x55_5555,
            channel_map: ChannelMap::all(),
        },
    );
    stream.event_count = event_count;
    stream.sn = event_count * bn as u64;
    stream.nesn = event_count * bn as u64;
    stream
}

pub(crate) fn enqueue_payloads(stream: &mut CisStream, payload_counts: &[u64]) {
    for payload_count in payload_counts {
        stream
            .tx_queue
            .enqueue(IsoTxNode { payload_count: *payload_count, payload: vec![*payload_count as u8; 4] });
    }
}

/// Peer reply acknowledging handshake position `seq` and carrying a data
/// payload in sequence.
pub(crate) fn ack_and_data(seq: u64, payload: Vec<u8>, mic_ok: bool) -> RxSlot {
    RxSlot::Pdu {
        bytes: CisPdu {
            ll_id: CisLlid::StartContinue,
            nesn: (seq + 1) & 1 != 0,
            sn: seq & 1 != 0,
            cie: false,
            npi: false,
            payload,
        }
        .encode(),
        mic_ok,
    }
}

/// Peer null PDU acknowledging handshake position `seq` without payload.
pub(crate) fn ack_only(seq: u64) -> RxSlot {
    RxSlot::Pdu {
        bytes: CisPdu::null((seq + 1) & 1 != 0, seq & 1 != 0, false, true).encode(),
        mic_ok: true,
    }
}

/// Drive a prepared event through completion interrupts until it closes,
/// then run the closer. Returns the number of subevents cycled.
pub(crate) fn run_event(stream: &mut CisStream, ctx: &mut TestContext) -> u8 {
    let mut ev = Event::prepare(stream, ctx, &PrepareParam { anchor_us: 0 })
        .expect("event unexpectedly preempted");
    loop {
        ev.tx_done(stream, ctx);
        if let Completion::Closed = ev.rx_done(stream, ctx) {
            break;
        }
    }
    let subevents = ev.se_curr();
    ev.close(stream, ctx);
    subevents
}
