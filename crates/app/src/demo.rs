//! Starter content for `webdaw new`.

use anyhow::{Context, Result};
use webdaw_graph::{AutomationPoint, IdAllocator, Note, PPQN, PlaybackMode, Project, StockSynths};

/// Fill `project` with a two-channel loop placed twice on one track.
pub fn populate(project: &mut Project, ids: &mut IdAllocator) -> Result<()> {
    let master = project.add_mixer_track(ids, "Master");
    let drums_bus = project.add_mixer_track(ids, "Drums");
    if let Some(bus) = project.mixers.iter_mut().find(|m| m.id == drums_bus) {
        bus.route_to = Some(master);
    }

    let kick = project.add_channel(
        ids,
        "Kick",
        StockSynths
            .instantiate("drumkit", 1)
            .context("drumkit synth")?,
    );
    let bass = project.add_channel(
        ids,
        "Bass",
        StockSynths
            .instantiate("subtractive", 1)
            .context("subtractive synth")?,
    );
    for channel in project.channels.iter_mut() {
        channel.mixer_track = Some(if channel.id == kick { drums_bus } else { master });
    }

    let groove = project.add_pattern(ids, "Groove");
    let pattern = project
        .pattern_mut(groove)
        .context("pattern was just added")?;
    for beat in 0..4 {
        pattern.notes.push(Note::new(kick, 36, beat * PPQN, PPQN / 4));
    }
    let mut line = Note::new(bass, 40, 0, PPQN * 2);
    line.automation.insert(
        "cutoff".to_string(),
        vec![
            AutomationPoint {
                offset: 0,
                value: 0.2,
            },
            AutomationPoint {
                offset: PPQN,
                value: 0.7,
            },
        ],
    );
    pattern.notes.push(line);
    let length = pattern.length;

    let track = project.add_track(ids, "Track 1");
    for bar in 0..2 {
        project
            .place_clip(ids, track, groove, bar * length)
            .context("track and pattern exist")?;
    }
    project.global.mode = PlaybackMode::Arrangement;
    Ok(())
}
