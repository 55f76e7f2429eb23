use chrono::{DateTime, TimeZone, Utc};
use webdaw_graph::{
    AutomationPoint, IdAllocator, MeterLevels, MixerEffect, Note, PPQN, PlaybackMode, Project,
    StockSynths, WindowGeometry,
};

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 14, 9, 30, 0).unwrap()
}

/// A small but fully cross-referenced project.
pub fn sample_project() -> (Project, IdAllocator) {
    let mut ids = IdAllocator::new();
    let mut project = Project::new("Test Project", fixed_time());
    project.global.tempo = 128.0;
    project.global.mode = PlaybackMode::Arrangement;
    project.playback.pause_position = PPQN * 3;
    project.playback.loop_enabled = true;

    let bus = project.add_mixer_track(&mut ids, "Drum Bus");
    let insert = project.add_mixer_track(&mut ids, "Lead Insert");
    project.mixers[1].route_to = Some(bus);
    project.mixers[1].effects.push(MixerEffect {
        effect_id: "reverb".to_string(),
        enabled: true,
        mix: 0.35,
    });
    project.mixers[0].meters = MeterLevels {
        peak_left: 0.7,
        peak_right: 0.65,
    };

    let lead = project.add_channel(
        &mut ids,
        "Lead",
        StockSynths.instantiate("subtractive", 1).expect("synth"),
    );
    let kick = project.add_channel(
        &mut ids,
        "Kick",
        StockSynths.instantiate("drumkit", 1).expect("synth"),
    );
    project.channels[0].mixer_track = Some(insert);
    project.channels[1].mixer_track = Some(bus);

    let pattern = project.add_pattern(&mut ids, "Hook");
    {
        let pattern = project.pattern_mut(pattern).expect("pattern");
        let mut note = Note::new(lead, 64, 0, PPQN);
        note.automation.insert(
            "cutoff".to_string(),
            vec![
                AutomationPoint {
                    offset: 0,
                    value: 0.2,
                },
                AutomationPoint {
                    offset: PPQN / 2,
                    value: 0.9,
                },
            ],
        );
        note.automation.insert(
            "resonance".to_string(),
            vec![AutomationPoint {
                offset: 0,
                value: 0.5,
            }],
        );
        pattern.notes.push(note);
        pattern.notes.push(Note::new(kick, 36, PPQN, PPQN / 4));
    }

    let track = project.add_track(&mut ids, "Main");
    project
        .place_clip(&mut ids, track, pattern, 0)
        .expect("clip");
    project
        .place_clip(&mut ids, track, pattern, PPQN * 4)
        .expect("clip");

    project.ui.visibility.mixer = true;
    project.ui.set_window(WindowGeometry {
        id: "piano-roll".to_string(),
        x: 120.0,
        y: 80.0,
        width: 640.0,
        height: 360.0,
    });

    (project, ids)
}
