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

//! Central CIS lower link layer implemented in Rust.
//!
//! One scheduled occurrence of a stream's data exchange (an event) is a
//! burst of tightly timed subevents; each subevent transmits one PDU and,
//! after the inter frame space, may receive one. The enclosing scheduler
//! calls [`Event::prepare`] once per event at the precomputed anchor time
//! and forwards every transceiver completion interrupt to
//! [`Event::tx_done`] / [`Event::rx_done`] until the event closes.

mod arq;
mod chan;
mod context;
mod event;
mod pdu;
mod queue;
mod stream;

#[cfg(test)]
mod test;

pub use chan::{ChannelMap, ChannelState, DATA_CHANNEL_COUNT};
pub use context::{Context, Direction, EventDoneExtra, IsoRxRecord, IsoRxStatus, MicState};
pub use event::{Completion, Event, EventCancelled, PrepareParam};
pub use pdu::{CisLlid, CisPdu, PduError, MIC_SIZE};
pub use queue::{IsoTxNode, IsoTxQueue};
pub use stream::{AclLink, CcmCounter, CisStream, DirParam};
