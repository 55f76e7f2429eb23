//! Typed entity IDs and the per-kind monotonic allocator.

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identifies a channel in the channel rack.
    ChannelId
);
entity_id!(
    /// Identifies a clip placed on the arrangement.
    ClipId
);
entity_id!(
    /// Identifies a pattern.
    PatternId
);
entity_id!(
    /// Identifies a mixer track.
    MixerTrackId
);
entity_id!(
    /// Identifies an arrangement track (a playlist lane).
    TrackId
);

/// Every entity class that draws IDs from the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    Channel,
    Clip,
    Pattern,
    MixerTrack,
    Track,
}

impl IdKind {
    pub const ALL: [IdKind; 5] = [
        IdKind::Channel,
        IdKind::Clip,
        IdKind::Pattern,
        IdKind::MixerTrack,
        IdKind::Track,
    ];

    fn index(self) -> usize {
        match self {
            IdKind::Channel => 0,
            IdKind::Clip => 1,
            IdKind::Pattern => 2,
            IdKind::MixerTrack => 3,
            IdKind::Track => 4,
        }
    }
}

impl std::fmt::Display for IdKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IdKind::Channel => "channel",
            IdKind::Clip => "clip",
            IdKind::Pattern => "pattern",
            IdKind::MixerTrack => "mixer track",
            IdKind::Track => "track",
        };
        f.write_str(name)
    }
}

/// Issues strictly increasing IDs per entity kind.
///
/// The allocator only ever moves forward: [`IdAllocator::seed`] raises the
/// floor for a kind but never lowers it, so an ID handed out once is never
/// handed out again, including after a project is reloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAllocator {
    next: [u64; 5],
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: [1; 5] }
    }

    /// Allocate the next ID for `kind`.
    pub fn next_id(&mut self, kind: IdKind) -> u64 {
        let slot = &mut self.next[kind.index()];
        let id = *slot;
        *slot += 1;
        id
    }

    /// The value `next_id` would return, without allocating it.
    pub fn peek(&self, kind: IdKind) -> u64 {
        self.next[kind.index()]
    }

    /// Raise the floor for `kind` so the next allocation is at least `minimum_next`.
    pub fn seed(&mut self, kind: IdKind, minimum_next: u64) {
        let slot = &mut self.next[kind.index()];
        *slot = (*slot).max(minimum_next);
    }

    /// Raise every kind's floor to at least the counters in `other`.
    pub fn raise_to(&mut self, other: &IdAllocator) {
        for kind in IdKind::ALL {
            self.seed(kind, other.peek(kind));
        }
    }

    pub fn next_channel_id(&mut self) -> ChannelId {
        ChannelId(self.next_id(IdKind::Channel))
    }

    pub fn next_clip_id(&mut self) -> ClipId {
        ClipId(self.next_id(IdKind::Clip))
    }

    pub fn next_pattern_id(&mut self) -> PatternId {
        PatternId(self.next_id(IdKind::Pattern))
    }

    pub fn next_mixer_track_id(&mut self) -> MixerTrackId {
        MixerTrackId(self.next_id(IdKind::MixerTrack))
    }

    pub fn next_track_id(&mut self) -> TrackId {
        TrackId(self.next_id(IdKind::Track))
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.next_id(IdKind::Channel), 1);
        assert_eq!(ids.next_id(IdKind::Channel), 2);
        assert_eq!(ids.next_id(IdKind::Channel), 3);
    }

    #[test]
    fn test_kinds_are_independent() {
        let mut ids = IdAllocator::new();
        ids.next_id(IdKind::Pattern);
        ids.next_id(IdKind::Pattern);

        assert_eq!(ids.next_clip_id(), ClipId(1));
        assert_eq!(ids.next_pattern_id(), PatternId(3));
        assert_eq!(ids.peek(IdKind::MixerTrack), 1);
    }

    #[test]
    fn test_seed_raises_floor() {
        let mut ids = IdAllocator::new();
        ids.seed(IdKind::Track, 42);
        assert_eq!(ids.next_track_id(), TrackId(42));
        assert_eq!(ids.next_track_id(), TrackId(43));
    }

    #[test]
    fn test_seed_never_lowers() {
        let mut ids = IdAllocator::new();
        ids.seed(IdKind::Channel, 10);
        ids.seed(IdKind::Channel, 3);
        assert_eq!(ids.peek(IdKind::Channel), 10);
    }

    #[test]
    fn test_raise_to_takes_maximum_per_kind() {
        let mut current = IdAllocator::new();
        current.seed(IdKind::Channel, 20);

        let mut loaded = IdAllocator::new();
        loaded.seed(IdKind::Channel, 5);
        loaded.seed(IdKind::Clip, 7);

        current.raise_to(&loaded);

        assert_eq!(current.peek(IdKind::Channel), 20);
        assert_eq!(current.peek(IdKind::Clip), 7);
        assert_eq!(current.peek(IdKind::Pattern), 1);
    }

    #[test]
    fn test_id_display() {
        assert_eq!(MixerTrackId(4).to_string(), "4");
        assert_eq!(IdKind::MixerTrack.to_string(), "mixer track");
    }
}
