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

//! Channel Selection Algorithm #2 for isochronous events, cf Vol 6,
//! Part B § 4.5.8.3. Both selectors are deterministic and pure given
//! their inputs; the pseudo random generator state is carried in
//! [`ChannelState`] across subevents.

/// Number of LE data channels.
pub const DATA_CHANNEL_COUNT: u8 = 37;

/// Map of data channels usable by the connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelMap([u8; 5]);

impl ChannelMap {
    pub fn new(map: [u8; 5]) -> ChannelMap {
        // Bits 37..40 are not data channels.
        ChannelMap([map[0], map[1], map[2], map[3], map[4] & 0x1f])
    }

    /// Map with all 37 data channels marked used.
    pub fn all() -> ChannelMap {
        ChannelMap([0xff, 0xff, 0xff, 0xff, 0x1f])
    }

    pub fn is_used(&self, channel: u8) -> bool {
        channel < DATA_CHANNEL_COUNT && (self.0[channel as usize / 8] >> (channel % 8)) & 1 != 0
    }

    /// Number of used channels. At least two are required by the access
    /// layer before a connection is established.
    pub fn count(&self) -> u8 {
        self.0.iter().map(|octet| octet.count_ones() as u8).sum()
    }

    // Channel at `index` in the remapping table (used channels in
    // ascending order).
    fn remap(&self, index: u8) -> u8 {
        (0..DATA_CHANNEL_COUNT)
            .filter(|channel| self.is_used(*channel))
            .nth(index as usize)
            .unwrap_or_else(|| panic!("remapping index {} outside channel map", index))
    }

    // Position of a used channel within the remapping table.
    fn remap_index(&self, channel: u8) -> u8 {
        (0..channel).filter(|channel| self.is_used(*channel)).count() as u8
    }
}

/// Channel hopping state carried from one subevent to the next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelState {
    chan_id: u16,
    prn_s: u16,
    remap_idx: u8,
}

/// Channel identifier derived from the access address.
pub fn channel_id(access_addr: u32) -> u16 {
    ((access_addr >> 16) ^ (access_addr & 0xffff)) as u16
}

// Bit reversal of each octet.
fn perm(value: u16) -> u16 {
    let [low, high] = value.to_le_bytes();
    u16::from_le_bytes([low.reverse_bits(), high.reverse_bits()])
}

// Multiply, add, modulo 2^16.
fn mam(a: u16, b: u16) -> u16 {
    a.wrapping_mul(17).wrapping_add(b)
}

// Three rounds of the event pseudo random number generator; returns
// (prn_s, prn_e).
fn prn(counter: u16, chan_id: u16) -> (u16, u16) {
    let mut prn = counter ^ chan_id;
    for _ in 0..3 {
        prn = mam(perm(prn), chan_id);
    }
    (prn, prn ^ chan_id)
}

/// Channel for the first subevent of an event, and the hopping state for
/// the remaining subevents.
pub fn select_for_event(
    event_counter: u16,
    access_addr: u32,
    channel_map: &ChannelMap,
) -> (u8, ChannelState) {
    let chan_id = channel_id(access_addr);
    let (prn_s, prn_e) = prn(event_counter, chan_id);

    let unmapped = (prn_e % DATA_CHANNEL_COUNT as u16) as u8;
    let (channel, remap_idx) = if channel_map.is_used(unmapped) {
        (unmapped, channel_map.remap_index(unmapped))
    } else {
        let index = ((channel_map.count() as u32 * prn_e as u32) >> 16) as u8;
        (channel_map.remap(index), index)
    };

    (channel, ChannelState { chan_id, prn_s, remap_idx })
}

/// Channel for the next subevent, advancing the hopping state.
pub fn select_for_subevent(state: &mut ChannelState, channel_map: &ChannelMap) -> u8 {
    let used = channel_map.count();
    state.prn_s = mam(perm(state.prn_s), state.chan_id);
    let prn_se = state.prn_s ^ state.chan_id;

    let hop = ((used as u32 - 1) * prn_se as u32) >> 16;
    state.remap_idx = ((state.remap_idx as u32 + 1 + hop) % used as u32) as u8;
    channel_map.remap(state.remap_idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS_ADDR: u32 = 0x8e89_bed6;

    #[test]
    fn event_selection_is_deterministic() {
        let map = ChannelMap::all();
        let (channel, state) = select_for_event(0x2345, ACCESS_ADDR, &map);
        let (channel_again, state_again) = select_for_event(0x2345, ACCESS_ADDR, &map);
        assert_eq!(channel, channel_again);
        assert_eq!(state, state_again);
        assert!(map.is_used(channel));
    }

    #[test]
    fn subevent_selection_stays_within_map() {
        // Odd map with holes.
        let map = ChannelMap::new([0x0f, 0xf0, 0x55, 0x00, 0x12]);
        let (channel, mut state) = select_for_event(7, ACCESS_ADDR, &map);
        assert!(map.is_used(channel));
        for _ in 0..32 {
            let channel = select_for_subevent(&mut state, &map);
            assert!(map.is_used(channel));
        }
    }

    #[test]
    fn subevent_selection_advances_the_prn_state() {
        let map = ChannelMap::all();
        let (_, mut state) = select_for_event(1, ACCESS_ADDR, &map);
        let before = state;
        select_for_subevent(&mut state, &map);
        assert_ne!(state.prn_s, before.prn_s);
    }

    #[test]
    fn different_events_hop() {
        let map = ChannelMap::all();
        let channels: Vec<u8> =
            (0u16..16).map(|counter| select_for_event(counter, ACCESS_ADDR, &map).0).collect();
        // Not all sixteen events may share one channel.
        assert!(channels.iter().any(|channel| *channel != channels[0]));
    }
}
