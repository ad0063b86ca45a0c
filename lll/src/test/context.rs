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

use std::collections::VecDeque;

use crate::context::{Context, Direction, EventDoneExtra, IsoRxRecord};
use crate::queue::IsoTxNode;

/// Scripted outcome of one receive completion.
#[derive(Clone, Debug)]
pub enum RxSlot {
    /// The receive deadline fired; nothing was received.
    Timeout,
    /// A packet arrived but its checksum is invalid.
    CrcFailure,
    Pdu { bytes: Vec<u8>, mic_ok: bool },
}

/// Recording double for the radio, cipher, and upward sinks.
///
/// Receptions are scripted ahead of the event; everything the state
/// machine programs or reports is recorded for assertion.
pub struct TestContext {
    pub rx_script: VecDeque<RxSlot>,
    /// Free slots in the bounded inbound pool.
    pub rx_slots: usize,
    pub preempt: bool,
    current_rx: Option<RxSlot>,

    pub tx_pdus: Vec<Vec<u8>>,
    pub channels: Vec<u8>,
    pub cipher_counters: Vec<(Direction, u64)>,
    pub rx_deadlines: Vec<u32>,
    pub delivered: Vec<IsoRxRecord>,
    pub acks: Vec<(u16, IsoTxNode)>,
    pub established: Vec<u16>,
    pub done: Vec<EventDoneExtra>,
    pub disabled: bool,
}

impl TestContext {
    pub fn new() -> TestContext {
        TestContext {
            rx_script: VecDeque::new(),
            rx_slots: 8,
            preempt: false,
            current_rx: None,
            tx_pdus: vec![],
            channels: vec![],
            cipher_counters: vec![],
            rx_deadlines: vec![],
            delivered: vec![],
            acks: vec![],
            established: vec![],
            done: vec![],
            disabled: false,
        }
    }

    pub fn script(&mut self, slots: Vec<RxSlot>) {
        self.rx_script.extend(slots);
    }
}

impl Context for TestContext {
    fn radio_set_access_address(&mut self, _access_addr: u32) {}

    fn radio_set_crc_init(&mut self, _crc_init: u32) {}

    fn radio_set_channel(&mut self, channel: u8) {
        self.channels.push(channel);
    }

    fn radio_configure(&mut self, _direction: Direction, _max_len: u8) {}

    fn radio_tx(&mut self, pdu: &[u8]) {
        self.tx_pdus.push(pdu.to_vec());
    }

    fn radio_rx(&mut self) {
        self.current_rx = Some(self.rx_script.pop_front().unwrap_or(RxSlot::Timeout));
    }

    fn radio_start_at(&mut self, start_us: u32) -> u32 {
        start_us
    }

    fn radio_set_tifs(&mut self, _tifs_us: u32) {}

    fn radio_set_rx_timeout(&mut self, deadline_us: u32) {
        self.rx_deadlines.push(deadline_us);
    }

    fn radio_end_capture(&mut self) {}

    fn radio_disable(&mut self) {
        self.disabled = true;
    }

    fn radio_tifs_base(&self) -> u32 {
        1000
    }

    fn radio_is_done(&self) -> bool {
        matches!(self.current_rx, Some(RxSlot::Pdu { .. }) | Some(RxSlot::CrcFailure))
    }

    fn radio_crc_valid(&self) -> bool {
        matches!(self.current_rx, Some(RxSlot::Pdu { .. }))
    }

    fn radio_rx_pdu(&self) -> &[u8] {
        match &self.current_rx {
            Some(RxSlot::Pdu { bytes, .. }) => bytes,
            _ => panic!("no PDU was received"),
        }
    }

    fn cipher_set_counter(&mut self, direction: Direction, counter: u64) {
        self.cipher_counters.push((direction, counter));
    }

    fn cipher_is_done(&self) -> bool {
        true
    }

    fn cipher_mic_valid(&self) -> bool {
        match &self.current_rx {
            Some(RxSlot::Pdu { mic_ok, .. }) => *mic_ok,
            _ => panic!("no PDU to authenticate"),
        }
    }

    fn rx_slots_free(&self) -> usize {
        self.rx_slots
    }

    fn deliver_iso_rx(&mut self, record: IsoRxRecord) {
        assert!(self.rx_slots > 0, "delivery without a free inbound slot");
        self.rx_slots -= 1;
        self.delivered.push(record);
    }

    fn enqueue_tx_ack(&mut self, handle: u16, node: IsoTxNode) {
        self.acks.push((handle, node));
    }

    fn cis_established(&mut self, handle: u16) {
        self.established.push(handle);
    }

    fn event_done(&mut self, done: EventDoneExtra) {
        self.done.push(done);
    }

    fn preempt_pending(&self) -> bool {
        self.preempt
    }
}
