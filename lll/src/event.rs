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

//! One CIS event: preparation, the per-subevent transmit/receive cycle,
//! and the closing reconciliation.

use thiserror::Error;

use crate::arq::{self, TxPdu};
use crate::chan::{self, ChannelState};
use crate::context::{Context, Direction, EventDoneExtra, IsoRxRecord, IsoRxStatus, MicState};
use crate::pdu::{CisPdu, MIC_SIZE};
use crate::stream::CisStream;

/// Fixed turnaround between the end of a transmission and the start of
/// the paired reception.
pub const EVENT_IFS_US: u32 = 150;
/// Startup overhead between the scheduled anchor and the first
/// transmission.
pub const EVENT_OVERHEAD_START_US: u32 = 300;

// Margins folded into the hard receive deadline.
const EVENT_CLOCK_JITTER_US: u32 = 2;
const RANGE_DELAY_US: u32 = 10;
const HCTO_START_DELAY_US: u32 = 4;

/// The enclosing schedule shifted before the first transmission was
/// armed; the event was abandoned without running.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("event preempted by the enclosing schedule")]
pub struct EventCancelled;

/// Absolute timing handed down by the scheduler for one event.
#[derive(Clone, Copy, Debug)]
pub struct PrepareParam {
    pub anchor_us: u32,
}

/// Outcome of one subevent cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// The next subevent is armed.
    Continue,
    /// The event reached its closing condition; [`Event::close`] must
    /// run next.
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    TxArmed,
    AwaitRx,
    Done,
}

/// Event-scoped state, owned by the currently running event and dropped
/// when it closes. Never shared between streams: the enclosing scheduler
/// guarantees non-overlapping invocation windows per stream, so no lock
/// discipline is needed here.
pub struct Event {
    phase: Phase,
    /// Current subevent, 1-based.
    pub(crate) se_curr: u8,
    /// Transmit burst progress, in `[1, bn + 1]`; `bn + 1` means the
    /// burst is fully consumed.
    pub(crate) bn_tx: u8,
    /// Receive burst progress, same bounds as `bn_tx`.
    pub(crate) bn_rx: u8,
    pub(crate) trx_performed_bitmask: u32,
    pub(crate) mic_state: MicState,
    chan: ChannelState,
    next_chan: u8,
    /// The PDU armed for the current subevent.
    pub(crate) tx_pdu: TxPdu,
    /// Radio ready reference; next subevent starts and inbound
    /// timestamps derive from it.
    radio_ready_us: u32,
}

impl Event {
    /// Prepare one event at the scheduled anchor time.
    ///
    /// On return the transceiver is programmed with the first outbound
    /// PDU and armed to start at `anchor + EVENT_OVERHEAD_START_US`,
    /// unless the preemption check failed, in which case the radio is
    /// disabled and the event reports cancellation.
    pub fn prepare(
        stream: &mut CisStream,
        ctx: &mut impl Context,
        param: &PrepareParam,
    ) -> Result<Event, EventCancelled> {
        // Channel selection consumes the 16 bit on-air event counter.
        let (channel, chan) = chan::select_for_event(
            stream.event_count as u16,
            stream.access_addr,
            &stream.acl.channel_map,
        );

        let tx_pdu = arq::build_pdu(stream, ctx, 1, 1);

        let mut ev = Event {
            phase: Phase::TxArmed,
            se_curr: 1,
            bn_tx: 1,
            bn_rx: 1,
            trx_performed_bitmask: 0,
            mic_state: MicState::None,
            chan,
            next_chan: channel,
            tx_pdu,
            radio_ready_us: 0,
        };

        ctx.radio_set_access_address(stream.access_addr);
        ctx.radio_set_crc_init(stream.acl.crc_init);
        ctx.radio_set_channel(channel);
        arm_tx(stream, ctx, &ev.tx_pdu);
        ctx.radio_set_tifs(EVENT_IFS_US);

        ev.radio_ready_us = ctx.radio_start_at(param.anchor_us + EVENT_OVERHEAD_START_US);

        // Capture end of the transmitted PDU, used to compute the
        // receive deadline.
        ctx.radio_end_capture();

        if ctx.preempt_pending() {
            ctx.radio_disable();
            return Err(EventCancelled);
        }

        Ok(ev)
    }

    /// Transmit-done completion: close the subevent's tx side and arm the
    /// paired reception with a hard deadline.
    pub fn tx_done(&mut self, stream: &mut CisStream, ctx: &mut impl Context) {
        assert_eq!(self.phase, Phase::TxArmed);

        // A reception buffer is reserved by the caller's contract.
        assert!(ctx.rx_slots_free() >= 1, "no inbound buffer reserved for reception");

        if stream.acl.enc_rx {
            let counter = stream.event_count * stream.rx.bn as u64 + (self.bn_rx as u64 - 1);
            stream.rx.ccm.set(counter);
            ctx.cipher_set_counter(Direction::PeripheralToCentral, counter);
            ctx.radio_configure(Direction::PeripheralToCentral, stream.rx.max_pdu + MIC_SIZE);
        } else {
            ctx.radio_configure(Direction::PeripheralToCentral, stream.rx.max_pdu);
        }
        ctx.radio_rx();

        // The deadline, not a retry, is what bounds a lost reception.
        let deadline = ctx.radio_tifs_base()
            + EVENT_IFS_US
            + (EVENT_CLOCK_JITTER_US << 1)
            + RANGE_DELAY_US
            + HCTO_START_DELAY_US;
        ctx.radio_set_rx_timeout(deadline);
        ctx.radio_end_capture();

        // Arm the anticipated next subevent while the reception runs.
        if self.se_curr < stream.nse {
            let subevent_us = self.radio_ready_us + stream.sub_interval_us * self.se_curr as u32;
            ctx.radio_start_at(subevent_us);
            self.next_chan = chan::select_for_subevent(&mut self.chan, &stream.acl.channel_map);
        }

        self.phase = Phase::AwaitRx;
    }

    /// Receive completion, fired whether or not a packet arrived (the
    /// receive deadline is a valid completion). Applies the ARQ engine
    /// and decides continue or close.
    pub fn rx_done(&mut self, stream: &mut CisStream, ctx: &mut impl Context) -> Completion {
        assert_eq!(self.phase, Phase::AwaitRx);

        let trx_done = ctx.radio_is_done();
        let crc_ok = trx_done && ctx.radio_crc_valid();

        let mut cie = false;
        if trx_done {
            ctx.cis_established(stream.handle);
            self.trx_performed_bitmask |= 1 << (self.se_curr - 1);

            if crc_ok {
                // A checksum failure is treated as nothing usable
                // received; a malformed header the same.
                match CisPdu::decode(ctx.radio_rx_pdu()) {
                    Ok(pdu_rx) => {
                        let timestamp_us = self.radio_ready_us;
                        cie = arq::process_rx(stream, ctx, self, &pdu_rx, timestamp_us);
                    }
                    Err(error) => {
                        println!("cis ({:#06x}): dropping malformed PDU: {}", stream.handle, error)
                    }
                }
            }
        }

        if arq::close_decision(stream, self, cie) || self.se_curr == stream.nse {
            self.phase = Phase::Done;
            ctx.radio_disable();
            Completion::Closed
        } else {
            self.prepare_subevent(stream, ctx);
            Completion::Continue
        }
    }

    // Re-arm the transceiver for the next subevent on the already
    // selected channel, with the next resolved PDU.
    fn prepare_subevent(&mut self, stream: &mut CisStream, ctx: &mut impl Context) {
        let tx_pdu = arq::build_pdu(stream, ctx, self.bn_tx, self.bn_rx);
        arm_tx(stream, ctx, &tx_pdu);
        self.tx_pdu = tx_pdu;

        ctx.radio_set_channel(self.next_chan);

        let subevent_us = self.radio_ready_us + stream.sub_interval_us * self.se_curr as u32;
        ctx.radio_start_at(subevent_us);
        ctx.radio_set_tifs(EVENT_IFS_US);
        ctx.radio_end_capture();

        self.se_curr += 1;
        self.phase = Phase::TxArmed;
    }

    /// Close the event: reconcile unfinished bursts, account lost
    /// receive slots, and report the outcome upward.
    ///
    /// Consumes the event; the closer runs exactly once.
    pub fn close(self, stream: &mut CisStream, ctx: &mut impl Context) {
        assert_eq!(self.phase, Phase::Done);

        // Adjust sn/nesn for slots never acknowledged or received.
        // Placeholder until Flush Timeout is implemented: abandoned
        // slots are not retried across events.
        if self.bn_tx <= stream.tx.bn {
            stream.sn += (stream.tx.bn + 1 - self.bn_tx) as u64;
        }
        if self.bn_rx <= stream.rx.bn {
            stream.nesn += (stream.rx.bn + 1 - self.bn_rx) as u64;
        }

        // Lost-payload records for the receive slots the peer could not
        // deliver; dropped silently once the inbound pool runs out.
        let mut bn = self.bn_rx;
        while bn <= stream.rx.bn {
            if ctx.rx_slots_free() < 2 {
                break;
            }

            ctx.deliver_iso_rx(IsoRxRecord {
                handle: stream.handle,
                payload_number: stream.event_count * stream.rx.bn as u64 + (bn as u64 - 1),
                timestamp_us: self.radio_ready_us,
                status: IsoRxStatus::Lost,
                payload: vec![],
            });

            bn += 1;
        }

        ctx.event_done(EventDoneExtra {
            trx_performed_bitmask: self.trx_performed_bitmask,
            crc_valid: true,
            mic_state: self.mic_state,
        });
    }

    pub fn se_curr(&self) -> u8 {
        self.se_curr
    }

    pub fn bn_tx(&self) -> u8 {
        self.bn_tx
    }

    pub fn bn_rx(&self) -> u8 {
        self.bn_rx
    }

    pub fn mic_state(&self) -> MicState {
        self.mic_state
    }

    pub fn trx_performed_bitmask(&self) -> u32 {
        self.trx_performed_bitmask
    }
}

// Program the transmit side: cipher counter and maximum length when the
// PDU carries an encrypted payload, then hand over the encoded PDU.
fn arm_tx(stream: &mut CisStream, ctx: &mut impl Context, tx_pdu: &TxPdu) {
    if !tx_pdu.pdu.payload.is_empty() && stream.acl.enc_tx {
        stream.tx.ccm.set(tx_pdu.payload_count);
        ctx.cipher_set_counter(Direction::CentralToPeripheral, tx_pdu.payload_count);
        ctx.radio_configure(Direction::CentralToPeripheral, stream.tx.max_pdu + MIC_SIZE);
    } else {
        ctx.radio_configure(Direction::CentralToPeripheral, stream.tx.max_pdu);
    }
    ctx.radio_tx(&tx_pdu.pdu.encode());
}
