mod integrity;
mod load;
mod save;

#[cfg(test)]
mod test_support;

use serde::{Deserialize, Serialize};
use webdaw_graph::{
    Arrangement, AutomationPoint, ChannelId, ClipId, GlobalSettings, IdAllocator, IdKind,
    MixerEffect, MixerTrackId, PatternId, PlaybackState, ProjectMetadata, TrackId, UiState,
    UnresolvedInstrument,
};

pub use integrity::validate;
pub use load::{
    DecodedProject, ProjectSummary, check_version, decode, from_bytes, load_project,
    read_summary,
};
pub use save::{encode, save_project, to_bytes};

/// Schema generation written by this build. Any other version is rejected on load.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Window layout as stored; identical to the live form.
pub type SavedUI = UiState;

/// The storable, reference-by-ID form of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveFile {
    pub version: String,
    pub metadata: ProjectMetadata,
    pub global: GlobalSettings,
    pub playback: PlaybackState,
    pub patterns: Vec<SavedPattern>,
    pub channels: Vec<SavedChannel>,
    pub mixers: Vec<SavedMixer>,
    pub arrangement: Arrangement,
    pub ui: SavedUI,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_counters: Option<SavedIdCounters>,
}

impl SaveFile {
    /// Every ID of `kind` present in the file, in file order.
    pub fn ids_of(&self, kind: IdKind) -> Vec<u64> {
        match kind {
            IdKind::Channel => self.channels.iter().map(|c| c.id.0).collect(),
            IdKind::Clip => self.arrangement.clips.iter().map(|c| c.id.0).collect(),
            IdKind::Pattern => self.patterns.iter().map(|p| p.id.0).collect(),
            IdKind::MixerTrack => self.mixers.iter().map(|m| m.id.0).collect(),
            IdKind::Track => self.arrangement.tracks.iter().map(|t| t.id.0).collect(),
        }
    }

    /// Highest ID of `kind` present in the file.
    pub fn max_id(&self, kind: IdKind) -> Option<u64> {
        self.ids_of(kind).into_iter().max()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedPattern {
    pub id: PatternId,
    pub name: String,
    pub length: u64,
    pub notes: Vec<SavedNote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedNote {
    pub channel: ChannelId,
    pub key: u8,
    pub start: u64,
    pub length: u64,
    pub velocity: f32,
    #[serde(default)]
    pub automation: Vec<SavedAutomation>,
}

/// One automation curve of a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedAutomation {
    pub parameter_id: String,
    pub points: Vec<AutomationPoint>,
}

/// A channel with its instrument reduced to `(synth_id, synth_num)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedChannel {
    pub id: ChannelId,
    pub name: String,
    pub synth_id: String,
    pub synth_num: u32,
    pub volume: f32,
    pub pan: f32,
    pub muted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mixer_track: Option<MixerTrackId>,
}

/// A mixer track without its runtime meter levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedMixer {
    pub id: MixerTrackId,
    pub name: String,
    pub volume: f32,
    pub pan: f32,
    pub muted: bool,
    pub solo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_to: Option<MixerTrackId>,
    #[serde(default)]
    pub effects: Vec<MixerEffect>,
}

/// Next ID to allocate per entity kind. Fields are optional so older or
/// hand-edited files without them still load; the decoder falls back to
/// `max(existing) + 1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedIdCounters {
    #[serde(default)]
    pub next_channel: Option<u64>,
    #[serde(default)]
    pub next_clip: Option<u64>,
    #[serde(default)]
    pub next_pattern: Option<u64>,
    #[serde(default)]
    pub next_mixer_track: Option<u64>,
    #[serde(default)]
    pub next_track: Option<u64>,
}

impl SavedIdCounters {
    pub fn get(&self, kind: IdKind) -> Option<u64> {
        match kind {
            IdKind::Channel => self.next_channel,
            IdKind::Clip => self.next_clip,
            IdKind::Pattern => self.next_pattern,
            IdKind::MixerTrack => self.next_mixer_track,
            IdKind::Track => self.next_track,
        }
    }

    pub fn set(&mut self, kind: IdKind, next: u64) {
        let slot = match kind {
            IdKind::Channel => &mut self.next_channel,
            IdKind::Clip => &mut self.next_clip,
            IdKind::Pattern => &mut self.next_pattern,
            IdKind::MixerTrack => &mut self.next_mixer_track,
            IdKind::Track => &mut self.next_track,
        };
        *slot = Some(next);
    }
}

impl From<&IdAllocator> for SavedIdCounters {
    fn from(ids: &IdAllocator) -> Self {
        let mut counters = Self::default();
        for kind in IdKind::ALL {
            counters.set(kind, ids.peek(kind));
        }
        counters
    }
}

/// Byte encoding of stored records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// MessagePack with named fields
    #[serde(rename = "msgpack")]
    MessagePack,
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("project file has no version")]
    MissingVersion,

    #[error("invalid schema version '{version}': {source}")]
    InvalidVersion {
        version: String,
        source: semver::Error,
    },

    #[error("unsupported schema version {found} (expected {expected})")]
    UnsupportedVersion {
        found: String,
        expected: &'static str,
    },

    #[error("malformed project file: {0}")]
    Malformed(String),
}

/// A relationship or uniqueness rule broken inside a single file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: IdKind, id: u64 },

    #[error("no {kind} ids left to allocate")]
    IdSpaceExhausted { kind: IdKind },

    #[error("clip {clip} references missing track {track}")]
    MissingTrack { clip: ClipId, track: TrackId },

    #[error("clip {clip} references missing pattern {pattern}")]
    MissingPattern { clip: ClipId, pattern: PatternId },

    #[error("note {note} of pattern {pattern} references missing channel {channel}")]
    MissingChannel {
        pattern: PatternId,
        note: usize,
        channel: ChannelId,
    },

    #[error("channel {channel} is routed to missing mixer track {mixer_track}")]
    MissingMixerTrack {
        channel: ChannelId,
        mixer_track: MixerTrackId,
    },

    #[error("mixer track {mixer_track} is routed to missing mixer track {target}")]
    MissingRouteTarget {
        mixer_track: MixerTrackId,
        target: MixerTrackId,
    },

    #[error("mixer track {mixer_track} is part of a routing loop")]
    RoutingLoop { mixer_track: MixerTrackId },

    #[error("active pattern {pattern} does not exist")]
    MissingActivePattern { pattern: PatternId },

    #[error("note {note} of pattern {pattern} has more than one curve for '{parameter_id}'")]
    DuplicateAutomation {
        pattern: PatternId,
        note: usize,
        parameter_id: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("Unresolved instrument: {0}")]
    UnresolvedInstrument(#[from] UnresolvedInstrument),

    #[error("{field} is not a finite number")]
    NonFinite { field: String },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Serialization error: {0}")]
    SerializeMsgpack(#[from] rmp_serde::encode::Error),
}
