use std::collections::HashMap;

use crate::bridge::create_bridge;
use crate::event::{InputEvent, NoteEventKind, OutputEvent};
use crate::processor::ArpConfig;
use crate::state::{Note, Pattern};
use crate::transport::HostTransport;

const BLOCK_SIZE: usize = 256;
const SAMPLE_RATE: f64 = 48000.0;
const BPM: f64 = 120.0;

fn ppq_at(sample: u64) -> f64 {
    sample as f64 / SAMPLE_RATE * BPM / 60.0
}

/// Tracks which pitches are sounding from the output stream alone.
#[derive(Default)]
struct Listener {
    sounding: HashMap<i32, bool>,
    ons: usize,
    offs: usize,
}

impl Listener {
    fn hear(&mut self, events: &[OutputEvent]) {
        for e in events {
            assert!(e.offset < BLOCK_SIZE);
            let on = self.sounding.entry(e.pitch).or_insert(false);
            match e.kind {
                NoteEventKind::On => {
                    assert!(!*on, "pitch {} started twice", e.pitch);
                    *on = true;
                    self.ons += 1;
                }
                NoteEventKind::Off => {
                    assert!(*on, "pitch {} stopped while silent", e.pitch);
                    *on = false;
                    self.offs += 1;
                }
            }
        }
    }

    fn silent(&self) -> bool {
        self.sounding.values().all(|on| !on)
    }
}

#[test]
fn end_to_end_live_editing() {
    // --------------------------------
    // Creating editor and processor (create_bridge())
    // --------------------------------
    let (mut editor, mut processor) = create_bridge(Pattern::basic(), ArpConfig::default()).unwrap();
    processor.prepare(SAMPLE_RATE);

    let mut listener = Listener::default();
    let mut sample: u64 = 0;
    let chord = [
        InputEvent::NoteOn { pitch: 60, velocity: 0.9 },
        InputEvent::NoteOn { pitch: 64, velocity: 0.9 },
        InputEvent::NoteOn { pitch: 67, velocity: 0.9 },
    ];

    // --------------------------------
    // Playing (process_block())
    // --------------------------------
    for block in 0..400 {
        let input: &[InputEvent] = if block == 0 { &chord } else { &[] };
        let transport = HostTransport::playing(BPM, ppq_at(sample));
        listener.hear(processor.process_block(input, &transport, BLOCK_SIZE));
        sample += BLOCK_SIZE as u64;

        // --------------------------------
        // Editing while playing (edit())
        // --------------------------------
        if block == 100 {
            editor
                .edit(|p| {
                    p.resize_loop(48);
                    p.create_note(24, 1, 4);
                    p.create_note(30, 2, 4);
                    p.create_note(36, 4, 4);
                })
                .unwrap();
        }
        if block == 200 {
            editor.edit(|p| p.notes.retain(|n| n.note_number != 1)).unwrap();
        }
        if block == 300 {
            editor.set_octaves(false);
        }
    }
    assert!(listener.ons > 5);

    // --------------------------------
    // Stopping
    // --------------------------------
    listener.hear(processor.process_block(&[], &HostTransport::stopped(), BLOCK_SIZE));
    assert!(listener.silent());
    assert_eq!(listener.ons, listener.offs);
    assert_eq!(editor.last_position(), 0);

    // The first retired sequence was collected by the second edit
    assert_eq!(editor.collect_garbage(), 1);
}

#[test]
fn end_to_end_text_round_trip() {
    let mut pattern = Pattern::new(24);
    pattern.loop_length = 96;
    pattern.add_note(Note::new(0, 18, 0, 1.0));
    pattern.add_note(Note::new(24, 30, 1, 0.75));
    pattern.add_note(Note::new(84, 110, 2, 0.5));

    let (mut editor, _processor) = create_bridge(pattern.clone(), ArpConfig::default()).unwrap();
    let text = editor.pattern_text().to_string();

    // A different pattern, then the saved text again
    editor.set_pattern(Pattern::basic()).unwrap();
    editor.parse_pattern(&text).unwrap();
    assert_eq!(editor.pattern(), &pattern);
}

#[test]
fn end_to_end_chord_changes() {
    let mut pattern = Pattern::new(24);
    pattern.add_note(Note::new(0, 6, 0, 1.0));
    pattern.add_note(Note::new(6, 12, 1, 1.0));
    pattern.add_note(Note::new(12, 18, 2, 1.0));
    pattern.add_note(Note::new(18, 30, 3, 1.0));
    let (_editor, mut processor) = create_bridge(pattern, ArpConfig::default()).unwrap();

    let mut listener = Listener::default();
    let mut sample: u64 = 0;
    let mut pressed = Vec::new();

    for block in 0..600 {
        // Change one key every 40 blocks
        let mut input = Vec::new();
        if block % 40 == 0 {
            let pitch = 48 + (block / 40) as i32 % 5;
            if pressed.contains(&pitch) {
                pressed.retain(|&p| p != pitch);
                input.push(InputEvent::NoteOff { pitch });
            } else {
                pressed.push(pitch);
                input.push(InputEvent::NoteOn { pitch, velocity: 1.0 });
            }
        }

        let transport = HostTransport::playing(BPM, ppq_at(sample));
        listener.hear(processor.process_block(&input, &transport, BLOCK_SIZE));
        sample += BLOCK_SIZE as u64;
    }

    listener.hear(processor.process_block(&[], &HostTransport::stopped(), BLOCK_SIZE));
    assert!(listener.silent());
    assert!(listener.ons > 0);
}
