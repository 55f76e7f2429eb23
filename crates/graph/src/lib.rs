//! The live project graph edited by the UI.
//!
//! Everything here is in-memory state: channels hold their live instrument,
//! mixer tracks carry meter levels, and note automation is kept in an
//! insertion-ordered map keyed by parameter id. The persistence layer
//! projects this graph into a storable form and rebuilds it on load.

pub mod ids;
pub mod instrument;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use ids::{ChannelId, ClipId, IdAllocator, IdKind, MixerTrackId, PatternId, TrackId};
pub use instrument::{
    Instrument, STOCK_SYNTHS, StockSynth, StockSynths, SynthRegistry, UnresolvedInstrument,
};

/// Pulses Per Quarter Note - defines timing resolution
pub const PPQN: u64 = 960;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Updated on every successful save
    pub last_modified: DateTime<Utc>,
}

impl ProjectMetadata {
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            created_at: now,
            last_modified: now,
        }
    }
}

/// Which timeline the transport plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    #[default]
    Pattern,
    Arrangement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    pub tempo: f64,
    pub master_volume: f32,
    /// Grid subdivisions per beat used for snapping
    pub snap_division: u32,
    pub mode: PlaybackMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_pattern: Option<PatternId>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            tempo: 120.0,
            master_volume: 0.8,
            snap_division: 4,
            mode: PlaybackMode::Pattern,
            active_pattern: None,
        }
    }
}

/// Transport state needed to resume where the user left off. Positions are in ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub pause_position: u64,
    pub loop_start: u64,
    pub loop_end: u64,
    pub loop_enabled: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            pause_position: 0,
            loop_start: 0,
            loop_end: PPQN * 16,
            loop_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutomationPoint {
    /// Ticks from the start of the note
    pub offset: u64,
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub channel: ChannelId,
    /// MIDI key number
    pub key: u8,
    pub start: u64,
    pub length: u64,
    pub velocity: f32,
    /// Automation curves keyed by parameter id, in insertion order.
    pub automation: IndexMap<String, Vec<AutomationPoint>>,
}

impl Note {
    pub fn new(channel: ChannelId, key: u8, start: u64, length: u64) -> Self {
        Self {
            channel,
            key,
            start,
            length,
            velocity: 0.8,
            automation: IndexMap::new(),
        }
    }

    pub fn end(&self) -> u64 {
        self.start + self.length
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub id: PatternId,
    pub name: String,
    /// Length in ticks
    pub length: u64,
    pub notes: Vec<Note>,
}

impl Pattern {
    pub fn new(id: PatternId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            length: PPQN * 4,
            notes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub instrument: Arc<dyn Instrument>,
    pub volume: f32,
    pub pan: f32,
    pub muted: bool,
    pub mixer_track: Option<MixerTrackId>,
}

impl Channel {
    pub fn new(id: ChannelId, name: impl Into<String>, instrument: Arc<dyn Instrument>) -> Self {
        Self {
            id,
            name: name.into(),
            instrument,
            volume: 0.8,
            pan: 0.0,
            muted: false,
            mixer_track: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixerEffect {
    pub effect_id: String,
    pub enabled: bool,
    pub mix: f32,
}

/// Peak levels written by the audio side. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeterLevels {
    pub peak_left: f32,
    pub peak_right: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MixerTrack {
    pub id: MixerTrackId,
    pub name: String,
    pub volume: f32,
    pub pan: f32,
    pub muted: bool,
    pub solo: bool,
    /// Mixer track this one is routed into; `None` routes to master
    pub route_to: Option<MixerTrackId>,
    pub effects: Vec<MixerEffect>,
    pub meters: MeterLevels,
}

impl MixerTrack {
    pub fn new(id: MixerTrackId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            volume: 1.0,
            pan: 0.0,
            muted: false,
            solo: false,
            route_to: None,
            effects: Vec::new(),
            meters: MeterLevels::default(),
        }
    }
}

/// A pattern instance placed on an arrangement track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrangementClip {
    pub id: ClipId,
    pub track: TrackId,
    pub pattern: PatternId,
    pub start: u64,
    pub length: u64,
    /// Ticks into the pattern where playback of this clip begins
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrangementTrack {
    pub id: TrackId,
    pub name: String,
    pub muted: bool,
    pub height: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arrangement {
    pub clips: Vec<ArrangementClip>,
    pub tracks: Vec<ArrangementTrack>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowVisibility {
    pub playlist: bool,
    pub channel_rack: bool,
    pub piano_roll: bool,
    pub mixer: bool,
    pub browser: bool,
}

impl Default for WindowVisibility {
    fn default() -> Self {
        Self {
            playlist: true,
            channel_rack: true,
            piano_roll: false,
            mixer: false,
            browser: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Window layout. Purely cosmetic; never validated against the rest of the graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiState {
    pub visibility: WindowVisibility,
    pub windows: Vec<WindowGeometry>,
}

impl UiState {
    /// Insert or replace the geometry of a window.
    pub fn set_window(&mut self, geometry: WindowGeometry) {
        match self.windows.iter_mut().find(|w| w.id == geometry.id) {
            Some(existing) => *existing = geometry,
            None => self.windows.push(geometry),
        }
    }
}

/// The whole editable project.
#[derive(Debug, Clone)]
pub struct Project {
    pub metadata: ProjectMetadata,
    pub global: GlobalSettings,
    pub playback: PlaybackState,
    pub patterns: Vec<Pattern>,
    pub channels: Vec<Channel>,
    pub mixers: Vec<MixerTrack>,
    pub arrangement: Arrangement,
    pub ui: UiState,
}

impl Project {
    /// An empty project, used at first boot and when recovery fails.
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            metadata: ProjectMetadata::new(name, now),
            global: GlobalSettings::default(),
            playback: PlaybackState::default(),
            patterns: Vec::new(),
            channels: Vec::new(),
            mixers: Vec::new(),
            arrangement: Arrangement::default(),
            ui: UiState::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
            && self.channels.is_empty()
            && self.mixers.is_empty()
            && self.arrangement.clips.is_empty()
            && self.arrangement.tracks.is_empty()
    }

    pub fn pattern(&self, id: PatternId) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.id == id)
    }

    pub fn pattern_mut(&mut self, id: PatternId) -> Option<&mut Pattern> {
        self.patterns.iter_mut().find(|p| p.id == id)
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    pub fn mixer_track(&self, id: MixerTrackId) -> Option<&MixerTrack> {
        self.mixers.iter().find(|m| m.id == id)
    }

    pub fn add_pattern(&mut self, ids: &mut IdAllocator, name: impl Into<String>) -> PatternId {
        let id = ids.next_pattern_id();
        self.patterns.push(Pattern::new(id, name));
        if self.global.active_pattern.is_none() {
            self.global.active_pattern = Some(id);
        }
        id
    }

    pub fn add_channel(
        &mut self,
        ids: &mut IdAllocator,
        name: impl Into<String>,
        instrument: Arc<dyn Instrument>,
    ) -> ChannelId {
        let id = ids.next_channel_id();
        self.channels.push(Channel::new(id, name, instrument));
        id
    }

    pub fn add_mixer_track(
        &mut self,
        ids: &mut IdAllocator,
        name: impl Into<String>,
    ) -> MixerTrackId {
        let id = ids.next_mixer_track_id();
        self.mixers.push(MixerTrack::new(id, name));
        id
    }

    pub fn add_track(&mut self, ids: &mut IdAllocator, name: impl Into<String>) -> TrackId {
        let id = ids.next_track_id();
        self.arrangement.tracks.push(ArrangementTrack {
            id,
            name: name.into(),
            muted: false,
            height: 48.0,
        });
        id
    }

    /// Place a whole pattern on a track. Returns `None` if the track or pattern does not exist.
    pub fn place_clip(
        &mut self,
        ids: &mut IdAllocator,
        track: TrackId,
        pattern: PatternId,
        start: u64,
    ) -> Option<ClipId> {
        if !self.arrangement.tracks.iter().any(|t| t.id == track) {
            return None;
        }
        let length = self.pattern(pattern)?.length;
        let id = ids.next_clip_id();
        self.arrangement.clips.push(ArrangementClip {
            id,
            track,
            pattern,
            start,
            length,
            offset: 0,
        });
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_new_project_is_empty() {
        let project = Project::new("Untitled", now());
        assert!(project.is_empty());
        assert_eq!(project.name(), "Untitled");
        assert_eq!(project.metadata.created_at, project.metadata.last_modified);
        assert_eq!(project.global.mode, PlaybackMode::Pattern);
    }

    #[test]
    fn test_add_entities_uses_allocator() {
        let mut ids = IdAllocator::new();
        let mut project = Project::new("Song", now());

        let p1 = project.add_pattern(&mut ids, "Intro");
        let p2 = project.add_pattern(&mut ids, "Verse");
        let synth = StockSynths.instantiate("fm", 1).expect("synth");
        let ch = project.add_channel(&mut ids, "Lead", synth);

        assert_eq!(p1, PatternId(1));
        assert_eq!(p2, PatternId(2));
        assert_eq!(ch, ChannelId(1));
        assert_eq!(project.global.active_pattern, Some(p1));
        assert_eq!(project.channel(ch).expect("channel").name, "Lead");
    }

    #[test]
    fn test_place_clip_requires_track_and_pattern() {
        let mut ids = IdAllocator::new();
        let mut project = Project::new("Song", now());
        let pattern = project.add_pattern(&mut ids, "Beat");
        let track = project.add_track(&mut ids, "Drums");

        assert!(project.place_clip(&mut ids, TrackId(99), pattern, 0).is_none());
        assert!(project.place_clip(&mut ids, track, PatternId(99), 0).is_none());

        let clip = project
            .place_clip(&mut ids, track, pattern, PPQN * 4)
            .expect("clip");
        assert_eq!(clip, ClipId(1));
        assert_eq!(project.arrangement.clips.len(), 1);
        assert_eq!(project.arrangement.clips[0].track, track);
        assert_eq!(project.arrangement.clips[0].length, PPQN * 4);
    }

    #[test]
    fn test_automation_keeps_insertion_order() {
        let mut note = Note::new(ChannelId(1), 60, 0, PPQN);
        note.automation.insert(
            "resonance".to_string(),
            vec![AutomationPoint { offset: 0, value: 0.1 }],
        );
        note.automation.insert(
            "cutoff".to_string(),
            vec![AutomationPoint { offset: 0, value: 0.9 }],
        );

        let keys: Vec<&str> = note.automation.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["resonance", "cutoff"]);
        assert_eq!(note.end(), PPQN);
    }

    #[test]
    fn test_set_window_replaces_existing_geometry() {
        let mut ui = UiState::default();
        ui.set_window(WindowGeometry {
            id: "mixer".to_string(),
            x: 0.0,
            y: 0.0,
            width: 400.0,
            height: 300.0,
        });
        ui.set_window(WindowGeometry {
            id: "mixer".to_string(),
            x: 10.0,
            y: 20.0,
            width: 500.0,
            height: 300.0,
        });

        assert_eq!(ui.windows.len(), 1);
        assert_eq!(ui.windows[0].x, 10.0);
    }
}
