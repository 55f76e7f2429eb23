use crate::{
    Encoding, ProjectError, SCHEMA_VERSION, SaveFile, SavedAutomation, SavedChannel,
    SavedIdCounters, SavedMixer, SavedNote, SavedPattern,
};
use webdaw_graph::{IdAllocator, IdKind, Note, Project};

/// Project the live graph into its storable form.
///
/// Meter levels and instrument objects are dropped, automation maps become
/// arrays in insertion order, and the ID counters are written so that each
/// is above every ID present in the file.
pub fn encode(project: &Project, ids: &IdAllocator) -> SaveFile {
    let mut file = SaveFile {
        version: SCHEMA_VERSION.to_string(),
        metadata: project.metadata.clone(),
        global: project.global.clone(),
        playback: project.playback.clone(),
        patterns: project
            .patterns
            .iter()
            .map(|pattern| SavedPattern {
                id: pattern.id,
                name: pattern.name.clone(),
                length: pattern.length,
                notes: pattern.notes.iter().map(encode_note).collect(),
            })
            .collect(),
        channels: project
            .channels
            .iter()
            .map(|channel| SavedChannel {
                id: channel.id,
                name: channel.name.clone(),
                synth_id: channel.instrument.synth_id().to_string(),
                synth_num: channel.instrument.synth_num(),
                volume: channel.volume,
                pan: channel.pan,
                muted: channel.muted,
                mixer_track: channel.mixer_track,
            })
            .collect(),
        mixers: project
            .mixers
            .iter()
            .map(|mixer| SavedMixer {
                id: mixer.id,
                name: mixer.name.clone(),
                volume: mixer.volume,
                pan: mixer.pan,
                muted: mixer.muted,
                solo: mixer.solo,
                route_to: mixer.route_to,
                effects: mixer.effects.clone(),
            })
            .collect(),
        arrangement: project.arrangement.clone(),
        ui: project.ui.clone(),
        id_counters: None,
    };

    let mut counters = SavedIdCounters::from(ids);
    for kind in IdKind::ALL {
        // Entities built outside the allocator still must not be reissued after a load.
        if let Some(floor) = file.max_id(kind).and_then(|max| max.checked_add(1)) {
            counters.set(kind, ids.peek(kind).max(floor));
        }
    }
    file.id_counters = Some(counters);

    file
}

fn encode_note(note: &Note) -> SavedNote {
    SavedNote {
        channel: note.channel,
        key: note.key,
        start: note.start,
        length: note.length,
        velocity: note.velocity,
        automation: note
            .automation
            .iter()
            .map(|(parameter_id, points)| SavedAutomation {
                parameter_id: parameter_id.clone(),
                points: points.clone(),
            })
            .collect(),
    }
}

/// Serialize a save file to bytes.
///
/// Fails with [`ProjectError::NonFinite`] when any number in the file is NaN
/// or infinite, since JSON would store it as `null` and the record could not
/// be read back.
pub fn to_bytes(file: &SaveFile, encoding: Encoding) -> Result<Vec<u8>, ProjectError> {
    check_finite(file)?;
    let bytes = match encoding {
        Encoding::Json => serde_json::to_vec_pretty(file)?,
        Encoding::MessagePack => rmp_serde::encode::to_vec_named(file)?,
    };
    Ok(bytes)
}

fn finite(value: f64, field: impl FnOnce() -> String) -> Result<(), ProjectError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ProjectError::NonFinite { field: field() })
    }
}

fn check_finite(file: &SaveFile) -> Result<(), ProjectError> {
    finite(file.global.tempo, || "global.tempo".to_string())?;
    finite(file.global.master_volume.into(), || {
        "global.masterVolume".to_string()
    })?;
    for pattern in &file.patterns {
        for (index, note) in pattern.notes.iter().enumerate() {
            finite(note.velocity.into(), || {
                format!("pattern {} note {index} velocity", pattern.id)
            })?;
            for curve in &note.automation {
                for point in &curve.points {
                    finite(point.value.into(), || {
                        format!(
                            "pattern {} note {index} automation '{}'",
                            pattern.id, curve.parameter_id
                        )
                    })?;
                }
            }
        }
    }
    for channel in &file.channels {
        finite(channel.volume.into(), || format!("channel {} volume", channel.id))?;
        finite(channel.pan.into(), || format!("channel {} pan", channel.id))?;
    }
    for mixer in &file.mixers {
        finite(mixer.volume.into(), || format!("mixer track {} volume", mixer.id))?;
        finite(mixer.pan.into(), || format!("mixer track {} pan", mixer.id))?;
        for effect in &mixer.effects {
            finite(effect.mix.into(), || {
                format!("mixer track {} effect '{}'", mixer.id, effect.effect_id)
            })?;
        }
    }
    for track in &file.arrangement.tracks {
        finite(track.height.into(), || format!("track {} height", track.id))?;
    }
    for window in &file.ui.windows {
        for value in [window.x, window.y, window.width, window.height] {
            finite(value.into(), || format!("window '{}'", window.id))?;
        }
    }
    Ok(())
}

/// Encode the live graph straight to bytes.
pub fn save_project(
    project: &Project,
    ids: &IdAllocator,
    encoding: Encoding,
) -> Result<Vec<u8>, ProjectError> {
    to_bytes(&encode(project, ids), encoding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixed_time, sample_project};
    use webdaw_graph::{ChannelId, IdKind, Pattern, PatternId};

    #[test]
    fn test_encode_replaces_instrument_with_identity() {
        let (project, ids) = sample_project();
        let file = encode(&project, &ids);

        assert_eq!(file.channels.len(), 2);
        assert_eq!(file.channels[0].synth_id, "subtractive");
        assert_eq!(file.channels[0].synth_num, 1);
        assert_eq!(file.channels[1].synth_id, "drumkit");
    }

    #[test]
    fn test_encode_automation_in_insertion_order() {
        let (project, ids) = sample_project();
        let file = encode(&project, &ids);

        let automation = &file.patterns[0].notes[0].automation;
        assert_eq!(automation.len(), 2);
        assert_eq!(automation[0].parameter_id, "cutoff");
        assert_eq!(automation[0].points.len(), 2);
        assert_eq!(automation[1].parameter_id, "resonance");
        assert!(file.patterns[0].notes[1].automation.is_empty());
    }

    #[test]
    fn test_encode_keeps_references_as_ids() {
        let (project, ids) = sample_project();
        let file = encode(&project, &ids);

        assert_eq!(file.patterns[0].notes[1].channel, ChannelId(2));
        assert_eq!(file.mixers[1].route_to, Some(file.mixers[0].id));
        assert_eq!(file.arrangement.clips[1].pattern, PatternId(1));
        assert_eq!(file.global.active_pattern, Some(PatternId(1)));
    }

    #[test]
    fn test_encode_counters_come_from_allocator() {
        let (project, mut ids) = sample_project();
        ids.seed(IdKind::Pattern, 50);
        let file = encode(&project, &ids);

        let counters = file.id_counters.expect("counters");
        assert_eq!(counters.next_pattern, Some(50));
        assert_eq!(counters.next_channel, Some(3));
        assert_eq!(counters.next_track, Some(2));
    }

    #[test]
    fn test_encode_counters_cover_entities_built_outside_allocator() {
        let ids = IdAllocator::new();
        let mut project = Project::new("Manual", fixed_time());
        project.patterns.push(Pattern::new(PatternId(7), "Imported"));

        let file = encode(&project, &ids);
        let counters = file.id_counters.expect("counters");
        assert_eq!(counters.next_pattern, Some(8));
        assert_eq!(counters.next_clip, Some(1));
    }

    #[test]
    fn test_encode_is_deterministic() {
        let (project, ids) = sample_project();
        let first = save_project(&project, &ids, Encoding::Json).expect("save");
        let second = save_project(&project, &ids, Encoding::Json).expect("save");
        assert_eq!(first, second);
    }

    #[test]
    fn test_json_output_is_readable() {
        let (project, ids) = sample_project();
        let bytes = save_project(&project, &ids, Encoding::Json).expect("save");
        let text = String::from_utf8(bytes).expect("utf8");

        assert!(text.contains("\"version\": \"1.0.0\""));
        assert!(text.contains("\"name\": \"Test Project\""));
    }

    #[test]
    fn test_nan_tempo_is_refused() {
        let (mut project, ids) = sample_project();
        project.global.tempo = f64::NAN;

        let err = save_project(&project, &ids, Encoding::Json).expect_err("nan");
        assert!(matches!(
            err,
            ProjectError::NonFinite { ref field } if field == "global.tempo"
        ));
    }

    #[test]
    fn test_infinite_automation_value_is_refused() {
        let (mut project, ids) = sample_project();
        let note = &mut project.patterns[0].notes[0];
        note.automation["resonance"][0].value = f32::INFINITY;

        let err = save_project(&project, &ids, Encoding::MessagePack).expect_err("infinite");
        assert!(matches!(
            err,
            ProjectError::NonFinite { ref field } if field.contains("resonance")
        ));
    }

    #[test]
    fn test_msgpack_output_is_not_json() {
        let (project, ids) = sample_project();
        let bytes = save_project(&project, &ids, Encoding::MessagePack).expect("save");
        assert!(serde_json::from_slice::<serde_json::Value>(&bytes).is_err());
    }
}
