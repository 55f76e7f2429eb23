//! Referential checks over a [`SaveFile`] before anything is rebuilt from it.

use crate::{IntegrityError, SaveFile};
use std::collections::{HashMap, HashSet};
use webdaw_graph::{IdKind, MixerTrackId};

/// Check that every reference in `file` resolves inside the file and that no
/// ID or automation parameter is duplicated where it must be unique.
pub fn validate(file: &SaveFile) -> Result<(), IntegrityError> {
    let mut known: HashMap<IdKind, HashSet<u64>> = HashMap::new();
    for kind in IdKind::ALL {
        let mut seen = HashSet::new();
        for id in file.ids_of(kind) {
            if id == u64::MAX {
                return Err(IntegrityError::IdSpaceExhausted { kind });
            }
            if !seen.insert(id) {
                return Err(IntegrityError::DuplicateId { kind, id });
            }
        }
        known.insert(kind, seen);
    }
    let has = |kind: IdKind, id: u64| known.get(&kind).is_some_and(|ids| ids.contains(&id));

    for clip in &file.arrangement.clips {
        if !has(IdKind::Track, clip.track.0) {
            return Err(IntegrityError::MissingTrack {
                clip: clip.id,
                track: clip.track,
            });
        }
        if !has(IdKind::Pattern, clip.pattern.0) {
            return Err(IntegrityError::MissingPattern {
                clip: clip.id,
                pattern: clip.pattern,
            });
        }
    }

    for pattern in &file.patterns {
        for (index, note) in pattern.notes.iter().enumerate() {
            if !has(IdKind::Channel, note.channel.0) {
                return Err(IntegrityError::MissingChannel {
                    pattern: pattern.id,
                    note: index,
                    channel: note.channel,
                });
            }
            let mut parameters = HashSet::new();
            for curve in &note.automation {
                if !parameters.insert(curve.parameter_id.as_str()) {
                    return Err(IntegrityError::DuplicateAutomation {
                        pattern: pattern.id,
                        note: index,
                        parameter_id: curve.parameter_id.clone(),
                    });
                }
            }
        }
    }

    for channel in &file.channels {
        if let Some(mixer_track) = channel.mixer_track
            && !has(IdKind::MixerTrack, mixer_track.0)
        {
            return Err(IntegrityError::MissingMixerTrack {
                channel: channel.id,
                mixer_track,
            });
        }
    }

    let routes: HashMap<MixerTrackId, Option<MixerTrackId>> =
        file.mixers.iter().map(|m| (m.id, m.route_to)).collect();
    for mixer in &file.mixers {
        if let Some(target) = mixer.route_to
            && !routes.contains_key(&target)
        {
            return Err(IntegrityError::MissingRouteTarget {
                mixer_track: mixer.id,
                target,
            });
        }
    }
    for mixer in &file.mixers {
        // Any chain longer than the number of tracks must revisit one.
        let mut current = mixer.route_to;
        for _ in 0..routes.len() {
            match current {
                Some(next) if next == mixer.id => {
                    return Err(IntegrityError::RoutingLoop {
                        mixer_track: mixer.id,
                    });
                }
                Some(next) => current = routes.get(&next).copied().flatten(),
                None => break,
            }
        }
    }

    if let Some(pattern) = file.global.active_pattern
        && !has(IdKind::Pattern, pattern.0)
    {
        return Err(IntegrityError::MissingActivePattern { pattern });
    }

    Ok(())
}
