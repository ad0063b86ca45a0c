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

use crate::chan::ChannelMap;
use crate::queue::IsoTxQueue;

/// Per-direction monotonic payload counter keying the cipher.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CcmCounter(u64);

impl CcmCounter {
    pub fn set(&mut self, value: u64) {
        self.0 = value;
    }

    pub fn increment(&mut self) {
        self.0 += 1;
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Negotiated per-direction CIS parameters.
#[derive(Clone, Debug)]
pub struct DirParam {
    /// Burst Number: payloads expected in this direction per event.
    pub bn: u8,
    /// Maximum PDU payload size, MIC excluded.
    pub max_pdu: u8,
    /// Cipher counter for this direction.
    pub ccm: CcmCounter,
}

impl DirParam {
    pub fn new(bn: u8, max_pdu: u8) -> DirParam {
        DirParam { bn, max_pdu, ccm: Default::default() }
    }
}

/// Data of the underlying ACL connection consumed by CIS events.
///
/// Encryption is a per-connection runtime capability: when `enc_tx` or
/// `enc_rx` is clear the cipher engine is bypassed for that direction.
#[derive(Clone, Debug)]
pub struct AclLink {
    pub handle: u16,
    pub enc_tx: bool,
    pub enc_rx: bool,
    pub crc_init: u32,
    pub channel_map: ChannelMap,
}

/// Persistent central CIS stream context.
///
/// Created at stream establishment, mutated by every event, destroyed at
/// teardown. `sn` and `nesn` are held as wide monotonic counters; only
/// their least significant bit is exchanged over the air.
pub struct CisStream {
    pub handle: u16,
    pub access_addr: u32,
    /// cisEventCounter, held at full width so payload counts derived
    /// from it stay monotonic; only the low 16 bits feed channel
    /// selection. Advanced by the enclosing scheduler between events.
    pub event_count: u64,
    /// Maximum number of subevents per event.
    pub nse: u8,
    /// Time between starts of two consecutive subevents.
    pub sub_interval_us: u32,
    pub sn: u64,
    pub nesn: u64,
    pub tx: DirParam,
    pub rx: DirParam,
    pub acl: AclLink,
    pub tx_queue: IsoTxQueue,
}

impl CisStream {
    pub fn new(
        handle: u16,
        access_addr: u32,
        nse: u8,
        sub_interval_us: u32,
        tx: DirParam,
        rx: DirParam,
        acl: AclLink,
    ) -> CisStream {
        assert!(nse >= 1 && tx.bn >= 1 && rx.bn >= 1);
        CisStream {
            handle,
            access_addr,
            event_count: 0,
            nse,
            sub_interval_us,
            sn: 0,
            nesn: 0,
            tx,
            rx,
            acl,
            tx_queue: IsoTxQueue::new(),
        }
    }

    /// Sequence number bit carried in outbound PDUs.
    pub fn sn_bit(&self) -> bool {
        self.sn & 1 != 0
    }

    /// Next expected sequence number bit carried in outbound PDUs.
    pub fn nesn_bit(&self) -> bool {
        self.nesn & 1 != 0
    }
}
