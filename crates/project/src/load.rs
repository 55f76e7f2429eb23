use crate::{
    IntegrityError, ProjectError, SCHEMA_VERSION, SaveFile, SavedNote, SchemaError, validate,
};
use indexmap::IndexMap;
use serde::Deserialize;
use webdaw_graph::{
    Channel, IdAllocator, IdKind, MeterLevels, MixerTrack, Note, Pattern, PatternId, Project,
    ProjectMetadata, SynthRegistry,
};

/// A live graph rebuilt from a save file, with an allocator seeded past every
/// ID the file contains.
#[derive(Debug)]
pub struct DecodedProject {
    pub project: Project,
    pub ids: IdAllocator,
}

/// Lightweight description of a stored project, for listings.
#[derive(Debug, Clone)]
pub struct ProjectSummary {
    pub version: String,
    pub metadata: ProjectMetadata,
    pub pattern_count: usize,
    pub channel_count: usize,
    pub clip_count: usize,
}

#[derive(Deserialize)]
struct VersionHeader {
    #[serde(default)]
    version: Option<String>,
}

#[derive(Clone, Copy)]
enum Format {
    Json,
    MessagePack,
}

/// Accept only the schema generation this build writes.
pub fn check_version(version: &str) -> Result<(), SchemaError> {
    if version.trim().is_empty() {
        return Err(SchemaError::MissingVersion);
    }
    let parsed = semver::Version::parse(version).map_err(|source| SchemaError::InvalidVersion {
        version: version.to_string(),
        source,
    })?;
    let current = semver::Version::parse(SCHEMA_VERSION).map_err(|source| {
        SchemaError::InvalidVersion {
            version: SCHEMA_VERSION.to_string(),
            source,
        }
    })?;
    if parsed != current {
        return Err(SchemaError::UnsupportedVersion {
            found: version.to_string(),
            expected: SCHEMA_VERSION,
        });
    }
    Ok(())
}

fn sniff(bytes: &[u8]) -> Result<(Format, VersionHeader), SchemaError> {
    // Try JSON first, fall back to MessagePack
    match serde_json::from_slice::<VersionHeader>(bytes) {
        Ok(header) => Ok((Format::Json, header)),
        Err(json_err) => rmp_serde::decode::from_slice::<VersionHeader>(bytes)
            .map(|header| (Format::MessagePack, header))
            .map_err(|msgpack_err| {
                SchemaError::Malformed(format!(
                    "not JSON ({json_err}) or MessagePack ({msgpack_err})"
                ))
            }),
    }
}

/// Parse stored bytes into a save file.
///
/// The version is checked before the rest of the document, so a file from
/// another schema generation is reported as such rather than as a missing field.
pub fn from_bytes(bytes: &[u8]) -> Result<SaveFile, ProjectError> {
    let (format, header) = sniff(bytes)?;
    check_version(header.version.as_deref().unwrap_or_default())?;

    let file = match format {
        Format::Json => {
            serde_json::from_slice(bytes).map_err(|e| SchemaError::Malformed(e.to_string()))?
        }
        Format::MessagePack => rmp_serde::decode::from_slice(bytes)
            .map_err(|e| SchemaError::Malformed(e.to_string()))?,
    };
    Ok(file)
}

/// Rebuild a live graph from a save file.
///
/// Nothing outside the returned value is touched, so a failure leaves the
/// caller's current graph exactly as it was.
pub fn decode(
    file: SaveFile,
    registry: &dyn SynthRegistry,
) -> Result<DecodedProject, ProjectError> {
    check_version(&file.version)?;
    validate(&file)?;
    let ids = seed_allocator(&file)?;

    let SaveFile {
        metadata,
        global,
        playback,
        patterns,
        channels,
        mixers,
        arrangement,
        ui,
        ..
    } = file;

    let channels = channels
        .into_iter()
        .map(|saved| {
            let instrument = registry.resolve_instrument(&saved.synth_id, saved.synth_num)?;
            Ok(Channel {
                id: saved.id,
                name: saved.name,
                instrument,
                volume: saved.volume,
                pan: saved.pan,
                muted: saved.muted,
                mixer_track: saved.mixer_track,
            })
        })
        .collect::<Result<Vec<_>, ProjectError>>()?;

    let patterns = patterns
        .into_iter()
        .map(|saved| {
            let notes = saved
                .notes
                .into_iter()
                .enumerate()
                .map(|(index, note)| decode_note(saved.id, index, note))
                .collect::<Result<Vec<_>, ProjectError>>()?;
            Ok(Pattern {
                id: saved.id,
                name: saved.name,
                length: saved.length,
                notes,
            })
        })
        .collect::<Result<Vec<_>, ProjectError>>()?;

    let mixers = mixers
        .into_iter()
        .map(|saved| MixerTrack {
            id: saved.id,
            name: saved.name,
            volume: saved.volume,
            pan: saved.pan,
            muted: saved.muted,
            solo: saved.solo,
            route_to: saved.route_to,
            effects: saved.effects,
            meters: MeterLevels::default(),
        })
        .collect();

    Ok(DecodedProject {
        project: Project {
            metadata,
            global,
            playback,
            patterns,
            channels,
            mixers,
            arrangement,
            ui,
        },
        ids,
    })
}

fn decode_note(
    pattern: PatternId,
    index: usize,
    note: SavedNote,
) -> Result<Note, ProjectError> {
    let mut automation = IndexMap::with_capacity(note.automation.len());
    for curve in note.automation {
        if automation.contains_key(&curve.parameter_id) {
            return Err(IntegrityError::DuplicateAutomation {
                pattern,
                note: index,
                parameter_id: curve.parameter_id,
            }
            .into());
        }
        automation.insert(curve.parameter_id, curve.points);
    }
    Ok(Note {
        channel: note.channel,
        key: note.key,
        start: note.start,
        length: note.length,
        velocity: note.velocity,
        automation,
    })
}

fn seed_allocator(file: &SaveFile) -> Result<IdAllocator, IntegrityError> {
    let mut ids = IdAllocator::new();
    for kind in IdKind::ALL {
        let floor = match file.max_id(kind) {
            Some(max) => max
                .checked_add(1)
                .ok_or(IntegrityError::IdSpaceExhausted { kind })?,
            None => 1,
        };
        let stored = file.id_counters.as_ref().and_then(|c| c.get(kind));
        let next = match stored {
            Some(next) if next >= floor => next,
            Some(next) => {
                log::warn!(
                    "stored next {kind} id {next} is not above existing ids; using {floor}"
                );
                floor
            }
            None => floor,
        };
        ids.seed(kind, next);
    }
    Ok(ids)
}

/// Parse and decode stored bytes in one step.
pub fn load_project(
    bytes: &[u8],
    registry: &dyn SynthRegistry,
) -> Result<DecodedProject, ProjectError> {
    decode(from_bytes(bytes)?, registry)
}

pub fn read_summary(bytes: &[u8]) -> Result<ProjectSummary, ProjectError> {
    let file = from_bytes(bytes)?;

    Ok(ProjectSummary {
        pattern_count: file.patterns.len(),
        channel_count: file.channels.len(),
        clip_count: file.arrangement.clips.len(),
        version: file.version,
        metadata: file.metadata,
    })
}
