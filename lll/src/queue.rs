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

/// Outbound ISO payload queued by the upper layer.
///
/// `payload_count` is the absolute position of the payload in the stream,
/// assigned at enqueue time as `event_counter * bn + burst_index`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IsoTxNode {
    pub payload_count: u64,
    pub payload: Vec<u8>,
}

/// Outbound payload FIFO.
///
/// The producer is the upper layer, the consumer is the event state
/// machine. Enqueue order must match ascending `payload_count` order.
#[derive(Debug, Default)]
pub struct IsoTxQueue {
    nodes: VecDeque<IsoTxNode>,
}

impl IsoTxQueue {
    pub fn new() -> IsoTxQueue {
        Default::default()
    }

    pub fn enqueue(&mut self, node: IsoTxNode) {
        debug_assert!(
            self.nodes.back().map_or(true, |last| last.payload_count < node.payload_count),
            "payloads must be enqueued in ascending payload_count order"
        );
        self.nodes.push_back(node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Walk the queue for the entry due at exactly `target`.
    ///
    /// Every entry whose `payload_count` is strictly below `target` is
    /// behind the current window: it is removed and handed to `retire`
    /// so an acknowledgment can be raised for it. An entry at or beyond
    /// `target` stays queued; only an exact match is returned.
    pub fn scan(&mut self, target: u64, mut retire: impl FnMut(IsoTxNode)) -> Option<&IsoTxNode> {
        loop {
            match self.nodes.front() {
                None => return None,
                Some(node) if node.payload_count < target => {
                    let node = self.nodes.pop_front().unwrap();
                    retire(node);
                }
                Some(node) if node.payload_count == target => break,
                Some(_) => return None,
            }
        }
        self.nodes.front()
    }
}
