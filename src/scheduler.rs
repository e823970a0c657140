// src/scheduler.rs

use crate::compile::CompiledEvents;
use crate::event::{MAX_PITCH, OutputEvent};
use crate::held_notes::HeldNoteSet;
use crate::transport::{
    BlockContext, HostTransport, next_absolute_time, pulse_duration_samples, pulse_in_range,
    pulse_position,
};

/// Currently sounding pitch per compiled note, indexed like
/// [`CompiledEvents::notes`]. `None` means silent.
pub type SoundingTable = Vec<Option<i32>>;

/// A silent side table for a compiled sequence.
pub fn sounding_table_for(events: &CompiledEvents) -> SoundingTable {
    vec![None; events.notes.len()]
}

/// Where playback is inside the compiled loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackCursor {
    /// Next compiled event to fire.
    pub event_index: usize,

    /// First absolute pulse not yet scanned for events.
    pub last_fired_pulse: i64,

    /// Whether the host was playing on the previous cycle.
    pub transport_active: bool,
}

/// Turns a compiled loop into sample-accurate note events, one block at a
/// time.
///
/// This struct runs on the real-time thread.
/// It must not allocate beyond the output buffer it is handed, and it never
/// blocks.
#[derive(Debug)]
pub struct Scheduler {
    cursor: PlaybackCursor,

    /// Sounding pitches, owned exclusively by the scheduler.
    sounding: SoundingTable,

    /// Realign the cursor with the host position before firing again.
    needs_resync: bool,

    /// Pulse position reached by the last cycle.
    position: i64,
}

impl Scheduler {
    pub fn new(sounding: SoundingTable) -> Self {
        Self {
            cursor: PlaybackCursor::default(),
            sounding,
            needs_resync: true,
            position: 0,
        }
    }

    // -------------------------------
    // MARK: Accessors
    // -------------------------------

    #[inline]
    pub fn cursor(&self) -> PlaybackCursor {
        self.cursor
    }

    /// Pulse position reached by the last cycle (0 while stopped).
    #[inline]
    pub fn position(&self) -> i64 {
        self.position
    }

    /// Pitch currently sounding for a compiled note.
    pub fn sounding_pitch(&self, note: usize) -> Option<i32> {
        self.sounding.get(note).copied().flatten()
    }

    /// Number of compiled notes currently sounding.
    pub fn sounding_count(&self) -> usize {
        self.sounding.iter().filter(|s| s.is_some()).count()
    }

    // -------------------------------
    // MARK: Sequence replacement
    // -------------------------------

    /// Install the side table of a newly compiled sequence.
    ///
    /// Everything sounding under the old sequence is released at offset 0,
    /// since its indices mean nothing against the new one. Returns the old
    /// table so it can be dropped off the real-time thread.
    pub fn install(&mut self, sounding: SoundingTable, out: &mut Vec<OutputEvent>) -> SoundingTable {
        self.release_all(0, out);
        self.needs_resync = true;
        std::mem::replace(&mut self.sounding, sounding)
    }

    /// Emit a note-off for every sounding note.
    pub fn release_all(&mut self, offset: usize, out: &mut Vec<OutputEvent>) {
        for slot in self.sounding.iter_mut() {
            if let Some(pitch) = slot.take() {
                out.push(OutputEvent::note_off(offset, pitch));
            }
        }
    }

    // -------------------------------
    // MARK: Per-cycle processing
    // -------------------------------

    /// Schedule one block.
    ///
    /// Called once per processing cycle, after held notes were updated.
    /// Events are appended to `out`.
    pub fn process(
        &mut self,
        events: &CompiledEvents,
        held: &HeldNoteSet,
        transport: &HostTransport,
        ctx: &BlockContext,
        out: &mut Vec<OutputEvent>,
    ) {
        if !transport.is_playing {
            self.stop(out);
            return;
        }

        let was_active = self.cursor.transport_active;
        self.cursor.transport_active = true;

        if !transport.is_valid()
            || !ctx.is_valid()
            || events.timebase <= 0
            || events.loop_length <= 0
        {
            // No way to place anything in time; stay silent until it is.
            self.release_all(0, out);
            self.needs_resync = true;
            return;
        }

        let timebase = events.timebase;
        let loop_length = events.loop_length;

        let exact_start = transport.ppq_position * timebase as f64;
        let window_start = pulse_position(transport.ppq_position, timebase);
        let block_beats = transport.samples_to_beats(ctx.block_samples, ctx.sample_rate);
        let window_end = pulse_position(transport.ppq_position + block_beats, timebase);

        if !pulse_in_range(window_start) || !pulse_in_range(window_end) {
            self.release_all(0, out);
            self.needs_resync = true;
            return;
        }

        if !was_active || self.is_discontinuous(window_start, loop_length) {
            self.needs_resync = true;
        }

        if held.is_empty() || events.is_empty() {
            self.release_all(0, out);
            self.needs_resync = true;
            self.cursor.last_fired_pulse = window_end;
            self.position = window_end;
            return;
        }

        if self.needs_resync {
            self.resync(events, window_start, out);
        }

        let pulse_samples = pulse_duration_samples(ctx.sample_rate, transport.bpm, timebase);

        loop {
            let Some(event) = events.events.get(self.cursor.event_index) else {
                break;
            };

            let time = next_absolute_time(event.time, self.cursor.last_fired_pulse, loop_length);
            if time >= window_end {
                break;
            }

            let offset = block_offset(time, exact_start, pulse_samples, ctx.block_samples);

            for &data in &event.offs {
                if let Some(pitch) = self.sounding.get_mut(data).and_then(Option::take) {
                    out.push(OutputEvent::note_off(offset, pitch));
                }
            }

            for &data in &event.ons {
                let Some(note) = events.notes.get(data) else {
                    continue;
                };
                let Some(pitch) = resolve_pitch(note.note_number, held, ctx.octaves) else {
                    continue;
                };
                let Some(slot) = self.sounding.get_mut(data) else {
                    continue;
                };

                if let Some(previous) = slot.replace(pitch) {
                    out.push(OutputEvent::note_off(offset, previous));
                }
                out.push(OutputEvent::note_on(offset, pitch, note.velocity as f32));
            }

            self.cursor.last_fired_pulse = time + 1;
            self.cursor.event_index = (self.cursor.event_index + 1) % events.len();
        }

        self.cursor.last_fired_pulse = window_end;
        self.position = window_end;
    }

    /// Host stopped: silence everything and rewind.
    fn stop(&mut self, out: &mut Vec<OutputEvent>) {
        self.release_all(0, out);
        self.cursor = PlaybackCursor::default();
        self.needs_resync = true;
        self.position = 0;
    }

    /// Whether the host jumped instead of continuing from the last cycle.
    ///
    /// One pulse of backward jitter is tolerated; forward gaps shorter than
    /// a loop are caught up by firing the skipped events.
    fn is_discontinuous(&self, window_start: i64, loop_length: i64) -> bool {
        let expected = self.cursor.last_fired_pulse;
        window_start + 1 < expected || window_start > expected.saturating_add(loop_length)
    }

    /// Realign the cursor with `pulse`, releasing whatever sounds.
    fn resync(&mut self, events: &CompiledEvents, pulse: i64, out: &mut Vec<OutputEvent>) {
        self.release_all(0, out);
        self.cursor.last_fired_pulse = pulse;
        self.cursor.event_index = events.index_at_or_after(pulse);
        self.needs_resync = false;
    }
}

/// Map a pattern note number onto a held pitch.
///
/// Note numbers past the held count reuse the held pitches cyclically; with
/// `octaves` each full wrap adds 12 semitones (negative wraps subtract).
/// Returns None when nothing is held or the result leaves `0..=MAX_PITCH`.
#[inline]
pub fn resolve_pitch(note_number: i32, held: &HeldNoteSet, octaves: bool) -> Option<i32> {
    let index = note_number as i64;
    let mut pitch = held.get(index)? as i64;
    if octaves {
        pitch += index.div_euclid(held.len() as i64) * 12;
    }
    if (0..=MAX_PITCH as i64).contains(&pitch) {
        Some(pitch as i32)
    } else {
        None
    }
}

/// Sample offset of an absolute pulse inside the current block.
///
/// Offsets that land past the block are folded back into it by modulo, so
/// every event fires even under tiny blocks or fast tempi.
#[inline]
fn block_offset(time: i64, exact_start: f64, pulse_samples: f64, block_samples: usize) -> usize {
    let base = ((time as f64 - exact_start) * pulse_samples).ceil();
    if base <= 0.0 || !base.is_finite() {
        return 0;
    }
    (base as u64 % block_samples as u64) as usize
}
