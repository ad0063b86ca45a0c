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

use crate::queue::IsoTxNode;

/// Direction of a CIS payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    CentralToPeripheral,
    PeripheralToCentral,
}

/// Authentication result latched over one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MicState {
    /// No encrypted payload was checked.
    None,
    Pass,
    Fail,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IsoRxStatus {
    Valid,
    /// Synthetic record for a payload the peer could not deliver.
    Lost,
}

/// Inbound notification record, one per receive burst slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IsoRxRecord {
    pub handle: u16,
    /// Absolute position of the payload in the stream.
    pub payload_number: u64,
    pub timestamp_us: u32,
    pub status: IsoRxStatus,
    /// Empty for [`IsoRxStatus::Lost`] records.
    pub payload: Vec<u8>,
}

/// Aggregate outcome of one event, reported upward exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventDoneExtra {
    /// Bit per subevent in which anything was received.
    pub trx_performed_bitmask: u32,
    pub crc_valid: bool,
    pub mic_state: MicState,
}

/// External collaborators of the event state machine.
///
/// Transceiver and cipher operations are asynchronous: programming calls
/// return immediately and results come back as completion interrupts
/// ([`crate::Event::tx_done`], [`crate::Event::rx_done`]) or are polled
/// through the completion accessors right before their result is needed.
/// The implementation behind this trait is the radio/scheduler glue; a
/// recording double backs it in tests.
pub trait Context {
    // Transceiver.
    fn radio_set_access_address(&mut self, access_addr: u32);
    fn radio_set_crc_init(&mut self, crc_init: u32);
    fn radio_set_channel(&mut self, channel: u8);
    /// Program direction and maximum reception/transmission length
    /// (MIC included when the direction is encrypted).
    fn radio_configure(&mut self, direction: Direction, max_len: u8);
    /// Arm transmission of an encoded PDU.
    fn radio_tx(&mut self, pdu: &[u8]);
    /// Arm reception into the reserved inbound buffer.
    fn radio_rx(&mut self);
    /// Start the radio timer at an absolute time; returns the actual
    /// radio ready time.
    fn radio_start_at(&mut self, start_us: u32) -> u32;
    fn radio_set_tifs(&mut self, tifs_us: u32);
    /// Hard deadline for an armed reception. Firing the deadline is a
    /// valid completion, not an error.
    fn radio_set_rx_timeout(&mut self, deadline_us: u32);
    /// Capture the end-of-transmission timestamp for turnaround deadline
    /// computation.
    fn radio_end_capture(&mut self);
    fn radio_disable(&mut self);
    /// End-of-transmission reference the receive deadline is computed from.
    fn radio_tifs_base(&self) -> u32;
    /// Whether the last armed reception completed with a packet.
    fn radio_is_done(&self) -> bool;
    fn radio_crc_valid(&self) -> bool;
    fn radio_rx_pdu(&self) -> &[u8];

    // Cipher engine.
    fn cipher_set_counter(&mut self, direction: Direction, counter: u64);
    /// Completion flag, polled synchronously after the corresponding
    /// transceiver completion.
    fn cipher_is_done(&self) -> bool;
    fn cipher_mic_valid(&self) -> bool;

    // Inbound pool and upward sinks.
    /// Free slots in the bounded inbound buffer pool.
    fn rx_slots_free(&self) -> usize;
    fn deliver_iso_rx(&mut self, record: IsoRxRecord);
    /// Raise an acknowledgment for a retired outbound payload.
    fn enqueue_tx_ack(&mut self, handle: u16, node: IsoTxNode);
    /// The stream has proven at least one reception this event.
    fn cis_established(&mut self, handle: u16);
    fn event_done(&mut self, done: EventDoneExtra);

    // Enclosing scheduler.
    /// Whether the schedule has shifted since this event was committed.
    fn preempt_pending(&self) -> bool;
}
