// src/event.rs

/// MIDI channel all output events are sent on.
pub const OUTPUT_CHANNEL: u8 = 1;

/// Highest MIDI pitch an output event may carry.
pub const MAX_PITCH: i32 = 127;

/// ===============================
/// Performance input
/// ===============================

/// A note played into the arpeggiator.
///
/// These events:
/// - only change which pitches are held
/// - are applied at the start of a cycle, before scheduling
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    NoteOn { pitch: i32, velocity: f32 },

    NoteOff { pitch: i32 },
}

/// ===============================
/// Scheduled output
/// ===============================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteEventKind {
    On,
    Off,
}

/// A note event placed inside the current block.
///
/// These events:
/// - are RT-safe (plain copyable data)
/// - carry a sample offset in `[0, block_samples)`
/// - carry a pitch in `0..=MAX_PITCH`
/// - may be forwarded to the host as-is on [`OUTPUT_CHANNEL`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputEvent {
    pub offset: usize,

    pub pitch: i32,

    pub kind: NoteEventKind,

    /// Velocity (0.0 - 1.0). Always 0 for note-offs.
    pub velocity: f32,
}

impl OutputEvent {
    #[inline]
    pub fn note_on(offset: usize, pitch: i32, velocity: f32) -> Self {
        Self {
            offset,
            pitch,
            kind: NoteEventKind::On,
            velocity: velocity.clamp(0.0, 1.0),
        }
    }

    #[inline]
    pub fn note_off(offset: usize, pitch: i32) -> Self {
        Self {
            offset,
            pitch,
            kind: NoteEventKind::Off,
            velocity: 0.0,
        }
    }

    pub fn is_on(&self) -> bool {
        self.kind == NoteEventKind::On
    }

    pub fn is_off(&self) -> bool {
        self.kind == NoteEventKind::Off
    }
}
