// src/main.rs

use librearp::{ArpConfig, HostTransport, InputEvent, NoteEventKind, Pattern, create_bridge};
use log::{error, info};

/// ===============================
/// Main
/// ===============================

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let sample_rate = 48_000.0;
    let block_samples = 256;
    let bpm = 120.0;
    let blocks = 400;

    // --------------------------------
    // Bridge
    // --------------------------------

    let config = ArpConfig {
        sample_rate,
        ..ArpConfig::default()
    };
    let (mut editor, mut processor) = match create_bridge(Pattern::basic(), config) {
        Ok(handles) => handles,
        Err(e) => {
            error!("{}", e);
            return;
        }
    };

    // Eight sixteenths climbing through the chord, one bar long
    let edited = editor.edit(|p| {
        p.clear();
        p.resize_loop(4 * p.timebase);
        for step in 0..8 {
            p.create_note(step * p.timebase / 2, step as i32, 4);
        }
    });
    if let Err(e) = edited {
        error!("{}", e);
        return;
    }
    info!("Pattern:\n{}", editor.pattern_text());

    // --------------------------------
    // Run a few blocks
    // --------------------------------

    let chord = [
        InputEvent::NoteOn { pitch: 60, velocity: 1.0 },
        InputEvent::NoteOn { pitch: 64, velocity: 1.0 },
        InputEvent::NoteOn { pitch: 67, velocity: 1.0 },
    ];

    info!("Starting arpeggiator sanity test");

    for block in 0..blocks {
        let input: &[InputEvent] = if block == 0 { &chord } else { &[] };
        let ppq = (block * block_samples) as f64 / sample_rate * bpm / 60.0;
        let transport = HostTransport::playing(bpm, ppq);

        for event in processor.process_block(input, &transport, block_samples) {
            let kind = match event.kind {
                NoteEventKind::On => "on ",
                NoteEventKind::Off => "off",
            };
            info!(
                "block {:>3} +{:>3} {} pitch {} velocity {:.2}",
                block, event.offset, kind, event.pitch, event.velocity
            );
        }

        if block == blocks / 2 {
            editor.set_octaves(false);
            info!("Octaves off");
        }
    }

    // --------------------------------
    // Stop
    // --------------------------------

    for event in processor.process_block(&[], &HostTransport::stopped(), block_samples) {
        info!("stop +{:>3} pitch {} released", event.offset, event.pitch);
    }
    info!(
        "Sanity test completed at pulse {}, {} sequences collected",
        editor.last_position(),
        editor.collect_garbage()
    );
}
