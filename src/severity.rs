// src/severity.rs - Per-channel alarm severity with time-based decay
//
// Every alarm (A1..A12) and exception (E1..E12) channel carries one of four
// severity levels. An active bit forces Red; once the bit clears the level
// decays Red -> Orange -> Yellow -> Green, gated by the configured thresholds.
// Decay is evaluated lazily: a channel only moves when an update arrives.

use crate::config::DecayConfig;
use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Channels per bitmask
pub const CHANNELS_PER_MASK: u8 = 12;

// ==========================================
// SECTION 1: CHANNEL LABELS
// ==========================================

/// Which device bitmask a channel is decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChannelKind {
    /// `ALARM=` field, labels `A1..A12`
    Alarm,
    /// `EXC=` field, labels `E1..E12`
    Exception,
}

impl ChannelKind {
    fn prefix(self) -> char {
        match self {
            ChannelKind::Alarm => 'A',
            ChannelKind::Exception => 'E',
        }
    }
}

/// One of the 24 independent severity channels.
///
/// Ordering is alarm channels first, then by index, so maps keyed by
/// `Label` iterate `A1..A12, E1..E12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label {
    kind: ChannelKind,
    index: u8,
}

impl Label {
    /// Build a label; `index` is 1-based and must be within `1..=12`
    pub fn new(kind: ChannelKind, index: u8) -> Option<Self> {
        (1..=CHANNELS_PER_MASK)
            .contains(&index)
            .then_some(Self { kind, index })
    }

    pub fn alarm(index: u8) -> Option<Self> {
        Self::new(ChannelKind::Alarm, index)
    }

    pub fn exception(index: u8) -> Option<Self> {
        Self::new(ChannelKind::Exception, index)
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    /// Bit of the device mask that drives this channel
    pub fn bit(&self) -> u32 {
        1 << (self.index - 1)
    }

    /// All 24 labels in display order
    pub fn all() -> impl Iterator<Item = Label> {
        [ChannelKind::Alarm, ChannelKind::Exception]
            .into_iter()
            .flat_map(|kind| (1..=CHANNELS_PER_MASK).map(move |index| Label { kind, index }))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.index)
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let kind = match chars.next() {
            Some('A') => ChannelKind::Alarm,
            Some('E') => ChannelKind::Exception,
            _ => return Err(format!("Invalid channel label '{}'", s)),
        };
        chars
            .as_str()
            .parse::<u8>()
            .ok()
            .and_then(|index| Label::new(kind, index))
            .ok_or_else(|| format!("Invalid channel label '{}'", s))
    }
}

impl Serialize for Label {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ==========================================
// SECTION 2: SEVERITY LEVELS AND STATE
// ==========================================

/// Severity of a channel, most urgent first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeverityLevel {
    /// Bit currently active
    Red,
    /// Bit just cleared
    Orange,
    /// Cleared for at least `time2y` seconds
    Yellow,
    /// Quiescent
    Green,
}

impl SeverityLevel {
    /// One-character code used by the display (`r`, `o`, `y`, `g`)
    pub fn code(self) -> char {
        match self {
            SeverityLevel::Red => 'r',
            SeverityLevel::Orange => 'o',
            SeverityLevel::Yellow => 'y',
            SeverityLevel::Green => 'g',
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl Serialize for SeverityLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Current level of one channel and when it last changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelState {
    pub level: SeverityLevel,
    /// Absent until the first transition
    pub since: Option<DateTime<Local>>,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            level: SeverityLevel::Green,
            since: None,
        }
    }
}

/// Level of every channel after one update cycle
pub type SeverityMap = BTreeMap<Label, SeverityLevel>;

// ==========================================
// SECTION 3: MASK DECODING
// ==========================================

/// Decode a hexadecimal device mask, with or without a `0x` prefix.
///
/// Masks wider than 32 bits keep their low 32 bits. Empty or non-hex values
/// decode to 0 so a bad field never forces a channel to Red.
pub fn parse_mask(hex: &str) -> u32 {
    let hex = hex.trim();
    let digits = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .unwrap_or(hex);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return 0;
    }
    let low = &digits[digits.len().saturating_sub(8)..];
    u32::from_str_radix(low, 16).unwrap_or(0)
}

// ==========================================
// SECTION 4: STATE MACHINE
// ==========================================

/// Owner of every channel's severity state
#[derive(Debug, Clone)]
pub struct SeverityTracker {
    decay: DecayConfig,
    channels: BTreeMap<Label, ChannelState>,
}

impl SeverityTracker {
    /// All channels start Green with no transition time
    pub fn new(decay: DecayConfig) -> Self {
        Self {
            decay,
            channels: Label::all().map(|label| (label, ChannelState::default())).collect(),
        }
    }

    pub fn decay(&self) -> &DecayConfig {
        &self.decay
    }

    /// Advance one channel and return its new level
    pub fn advance(
        &mut self,
        label: Label,
        bit_active: bool,
        now: DateTime<Local>,
    ) -> SeverityLevel {
        let decay = self.decay;
        let state = self.channels.entry(label).or_default();
        let previous = state.level;

        let next = if bit_active {
            Some(SeverityLevel::Red)
        } else {
            match state.level {
                SeverityLevel::Red => Some(SeverityLevel::Orange),
                SeverityLevel::Orange if elapsed_at_least(state.since, now, decay.time2y) => {
                    Some(SeverityLevel::Yellow)
                }
                SeverityLevel::Yellow if elapsed_at_least(state.since, now, decay.time2g) => {
                    Some(SeverityLevel::Green)
                }
                _ => None,
            }
        };

        if let Some(level) = next {
            state.level = level;
            state.since = Some(now);
            if level != previous {
                debug!("Channel {} severity {:?} -> {:?}", label, previous, level);
            }
        }

        state.level
    }

    /// Decode both device masks and advance all 24 channels with the same instant
    pub fn apply_masks(
        &mut self,
        alarm_hex: &str,
        exc_hex: &str,
        now: DateTime<Local>,
    ) -> SeverityMap {
        let alarm_bits = parse_mask(alarm_hex);
        let exc_bits = parse_mask(exc_hex);

        Label::all()
            .map(|label| {
                let bits = match label.kind() {
                    ChannelKind::Alarm => alarm_bits,
                    ChannelKind::Exception => exc_bits,
                };
                let level = self.advance(label, bits & label.bit() != 0, now);
                (label, level)
            })
            .collect()
    }

    pub fn level(&self, label: Label) -> SeverityLevel {
        self.state(label).level
    }

    pub fn state(&self, label: Label) -> ChannelState {
        self.channels.get(&label).copied().unwrap_or_default()
    }

    /// Current level of every channel without advancing anything
    pub fn snapshot(&self) -> SeverityMap {
        self.channels.iter().map(|(label, state)| (*label, state.level)).collect()
    }
}

/// Elapsed time since the last transition; an absent `since` counts as zero
fn elapsed_at_least(
    since: Option<DateTime<Local>>,
    now: DateTime<Local>,
    threshold_secs: u64,
) -> bool {
    let elapsed_ms = since
        .map(|since| now.signed_duration_since(since).num_milliseconds())
        .unwrap_or(0);
    elapsed_ms >= 0 && elapsed_ms as u64 >= threshold_secs.saturating_mul(1000)
}

// ==========================================
// SECTION 5: TESTS
// ==========================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn tracker() -> SeverityTracker {
        SeverityTracker::new(DecayConfig { time2o: 10, time2y: 60, time2g: 300 })
    }

    fn a(index: u8) -> Label {
        Label::alarm(index).unwrap()
    }

    fn e(index: u8) -> Label {
        Label::exception(index).unwrap()
    }

    #[test]
    fn test_label_formatting_and_parsing() {
        assert_eq!(a(1).to_string(), "A1");
        assert_eq!(e(12).to_string(), "E12");
        assert_eq!("A7".parse::<Label>().unwrap(), a(7));
        assert_eq!("E10".parse::<Label>().unwrap(), e(10));
        assert!("A0".parse::<Label>().is_err());
        assert!("A13".parse::<Label>().is_err());
        assert!("X1".parse::<Label>().is_err());
        assert!("".parse::<Label>().is_err());
        assert!(Label::alarm(13).is_none());
    }

    #[test]
    fn test_label_order_and_count() {
        let labels: Vec<String> = Label::all().map(|l| l.to_string()).collect();
        assert_eq!(labels.len(), 24);
        assert_eq!(labels.first().unwrap(), "A1");
        assert_eq!(labels[11], "A12");
        assert_eq!(labels[12], "E1");
        assert_eq!(labels.last().unwrap(), "E12");
    }

    #[test]
    fn test_parse_mask() {
        assert_eq!(parse_mask("0F"), 0x0F);
        assert_eq!(parse_mask("000800"), 0x800);
        assert_eq!(parse_mask("ff"), 0xFF);
        assert_eq!(parse_mask("ZZ"), 0);
        assert_eq!(parse_mask(""), 0);
        assert_eq!(parse_mask("0x"), 0);
        assert_eq!(parse_mask("+1"), 0);
    }

    #[test]
    fn test_parse_mask_prefix_and_wide_values() {
        assert_eq!(parse_mask("0x01"), 1);
        assert_eq!(parse_mask("0X800"), 0x800);
        assert_eq!(parse_mask("100000001"), 1);
        assert_eq!(parse_mask("123456789ABCDEF"), 0x89AB_CDEF);
        assert_eq!(parse_mask("0x1FFFFFFFF0000000F"), 0x0000_000F);
    }

    #[test]
    fn test_wide_mask_still_raises_alarm() {
        let mut t = tracker();
        let map = t.apply_masks("100000001", "0x04", Local::now());
        assert_eq!(map[&a(1)], SeverityLevel::Red);
        assert_eq!(map[&e(3)], SeverityLevel::Red);
        assert_eq!(map[&a(2)], SeverityLevel::Green);
    }

    #[test]
    fn test_fresh_channel_is_green() {
        let mut t = tracker();
        let now = Local::now();
        assert_eq!(t.level(a(1)), SeverityLevel::Green);
        assert_eq!(t.state(a(1)).since, None);
        assert_eq!(t.advance(a(1), false, now + Duration::seconds(10_000)), SeverityLevel::Green);
        assert_eq!(t.state(a(1)).since, None);
    }

    #[test]
    fn test_active_bit_always_wins() {
        let mut t = tracker();
        let t0 = Local::now();
        for level_steps in 0..4 {
            let mut t_local = t.clone();
            let mut now = t0;
            t_local.advance(a(2), true, now);
            for _ in 0..level_steps {
                now = now + Duration::seconds(1000);
                t_local.advance(a(2), false, now);
            }
            assert_eq!(t_local.advance(a(2), true, now), SeverityLevel::Red);
            assert_eq!(t_local.state(a(2)).since, Some(now));
        }
        assert_eq!(t.advance(a(2), true, t0), SeverityLevel::Red);
    }

    #[test]
    fn test_red_to_orange_is_immediate() {
        let mut t = tracker();
        let t0 = Local::now();
        t.advance(a(1), true, t0);
        assert_eq!(t.advance(a(1), false, t0), SeverityLevel::Orange);
        assert_eq!(t.state(a(1)).since, Some(t0));
    }

    #[test]
    fn test_a3_decay_scenario() {
        let mut t = tracker();
        let t0 = Local::now();

        assert_eq!(t.advance(a(3), true, t0), SeverityLevel::Red);
        assert_eq!(t.advance(a(3), false, t0), SeverityLevel::Orange);
        assert_eq!(t.advance(a(3), false, t0 + Duration::seconds(59)), SeverityLevel::Orange);
        assert_eq!(t.state(a(3)).since, Some(t0));
        assert_eq!(t.advance(a(3), false, t0 + Duration::seconds(60)), SeverityLevel::Yellow);
    }

    #[test]
    fn test_yellow_to_green_measured_from_entering_yellow() {
        let mut t = tracker();
        let t0 = Local::now();
        t.advance(e(5), true, t0);
        t.advance(e(5), false, t0);
        let yellow_at = t0 + Duration::seconds(90);
        assert_eq!(t.advance(e(5), false, yellow_at), SeverityLevel::Yellow);

        // 300s after entering Orange, but only 210s after entering Yellow
        assert_eq!(t.advance(e(5), false, t0 + Duration::seconds(300)), SeverityLevel::Yellow);
        assert_eq!(
            t.advance(e(5), false, yellow_at + Duration::seconds(299)),
            SeverityLevel::Yellow
        );
        assert_eq!(
            t.advance(e(5), false, yellow_at + Duration::seconds(300)),
            SeverityLevel::Green
        );
        assert_eq!(
            t.advance(e(5), false, yellow_at + Duration::seconds(100_000)),
            SeverityLevel::Green
        );
    }

    #[test]
    fn test_decay_moves_one_step_per_update() {
        let mut t = tracker();
        let t0 = Local::now();
        t.advance(a(4), true, t0);
        t.advance(a(4), false, t0);
        // Long silence: only one step happens on the next update
        assert_eq!(t.advance(a(4), false, t0 + Duration::hours(5)), SeverityLevel::Yellow);
    }

    #[test]
    fn test_idempotent_without_time_passing() {
        let mut t = tracker();
        let t0 = Local::now();
        t.advance(a(6), true, t0);
        t.advance(a(6), false, t0);
        let state = t.state(a(6));
        for _ in 0..10 {
            assert_eq!(t.advance(a(6), false, t0), SeverityLevel::Orange);
        }
        assert_eq!(t.state(a(6)), state);
    }

    #[test]
    fn test_clock_stepping_backwards_holds_level() {
        let mut t = tracker();
        let t0 = Local::now();
        t.advance(a(1), true, t0);
        t.advance(a(1), false, t0);
        assert_eq!(t.advance(a(1), false, t0 - Duration::hours(1)), SeverityLevel::Orange);
    }

    #[test]
    fn test_apply_masks_maps_bits_to_labels() {
        let mut t = tracker();
        let now = Local::now();
        let map = t.apply_masks("01", "800", now);

        assert_eq!(map.len(), 24);
        assert_eq!(map[&a(1)], SeverityLevel::Red);
        assert_eq!(map[&e(12)], SeverityLevel::Red);
        for (label, level) in &map {
            if *label != a(1) && *label != e(12) {
                assert_eq!(*level, SeverityLevel::Green, "{}", label);
            }
        }
    }

    #[test]
    fn test_apply_masks_ignores_bits_above_twelve() {
        let mut t = tracker();
        let map = t.apply_masks("F000", "FFFFF000", Local::now());
        assert!(map.values().all(|level| *level == SeverityLevel::Green));
    }

    #[test]
    fn test_malformed_mask_forces_nothing() {
        let mut t = tracker();
        let map = t.apply_masks("ZZ", "", Local::now());
        assert!(map.values().all(|level| *level == SeverityLevel::Green));
    }

    #[test]
    fn test_snapshot_does_not_advance() {
        let mut t = tracker();
        let t0 = Local::now();
        t.apply_masks("02", "00", t0);
        let snap = t.snapshot();
        assert_eq!(snap[&a(2)], SeverityLevel::Red);
        assert_eq!(t.level(a(2)), SeverityLevel::Red);
    }

    #[test]
    fn test_severity_serializes_as_code() {
        let mut map = SeverityMap::new();
        map.insert(a(1), SeverityLevel::Red);
        map.insert(e(3), SeverityLevel::Yellow);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"A1":"r","E3":"y"}"#);
    }

    fn allowed(from: SeverityLevel, to: SeverityLevel) -> bool {
        use SeverityLevel::*;
        from == to
            || to == Red
            || matches!((from, to), (Red, Orange) | (Orange, Yellow) | (Yellow, Green))
    }

    proptest! {
        #[test]
        fn prop_transitions_follow_decay_rules(
            steps in prop::collection::vec((any::<bool>(), 0i64..400), 1..60)
        ) {
            let decay = DecayConfig { time2o: 10, time2y: 60, time2g: 300 };
            let mut t = SeverityTracker::new(decay);
            let label = a(1);
            let mut now = Local::now();

            for (bit, delta) in steps {
                now = now + Duration::seconds(delta);
                let before = t.state(label);
                let after = t.advance(label, bit, now);

                prop_assert!(allowed(before.level, after));
                if bit {
                    prop_assert_eq!(after, SeverityLevel::Red);
                    continue;
                }

                let elapsed = before.since.map(|s| (now - s).num_seconds()).unwrap_or(0);
                match before.level {
                    SeverityLevel::Red => prop_assert_eq!(after, SeverityLevel::Orange),
                    SeverityLevel::Orange => prop_assert_eq!(
                        after == SeverityLevel::Yellow,
                        elapsed >= decay.time2y as i64
                    ),
                    SeverityLevel::Yellow => prop_assert_eq!(
                        after == SeverityLevel::Green,
                        elapsed >= decay.time2g as i64
                    ),
                    SeverityLevel::Green => prop_assert_eq!(after, SeverityLevel::Green),
                }
            }
        }

        #[test]
        fn prop_channels_are_independent(alarm in 0u32..0x1000, exc in 0u32..0x1000) {
            let mut t = tracker();
            let map = t.apply_masks(&format!("{:X}", alarm), &format!("{:x}", exc), Local::now());
            for label in Label::all() {
                let bits = match label.kind() {
                    ChannelKind::Alarm => alarm,
                    ChannelKind::Exception => exc,
                };
                let expected = if bits & label.bit() != 0 {
                    SeverityLevel::Red
                } else {
                    SeverityLevel::Green
                };
                prop_assert_eq!(map[&label], expected);
            }
        }
    }
}
