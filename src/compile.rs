// src/compile.rs
//
// Compiles a Pattern (declarative) into CompiledEvents (runtime).
//
// This is the bridge between the editor's note list and the scheduler's
// loop of on/off events. It runs on the editor side on every edit; the
// result is immutable and handed to the processor as a whole.

use std::collections::{BTreeMap, BTreeSet};

use crate::state::Pattern;

/// Error during pattern compilation.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// The timebase is zero or negative.
    InvalidTimebase { timebase: i64 },

    /// The loop length is zero or negative.
    InvalidLoopLength { loop_length: i64 },

    /// A note does not end after it starts, or its velocity is not finite.
    InvalidNote { index: usize },
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::InvalidTimebase { timebase } => {
                write!(f, "Timebase must be positive, got {}", timebase)
            }
            CompileError::InvalidLoopLength { loop_length } => {
                write!(f, "Loop length must be positive, got {}", loop_length)
            }
            CompileError::InvalidNote { index } => {
                write!(f, "Note {} has an empty span or a non-finite velocity", index)
            }
        }
    }
}

impl std::error::Error for CompileError {}

/// Result of pattern compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// The parts of a note the scheduler needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteData {
    /// Index of the note in the source pattern.
    pub note_index: usize,

    /// Index into the held notes.
    pub note_number: i32,

    /// Velocity (0.0 - 1.0).
    pub velocity: f64,
}

/// Everything that happens at one pulse of the loop.
///
/// `ons` and `offs` hold indices into [`CompiledEvents::notes`], sorted and
/// free of duplicates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledEvent {
    /// Pulse within `[0, loop_length)`.
    pub time: i64,

    pub ons: Vec<usize>,

    pub offs: Vec<usize>,
}

/// One loop cycle of on/off events, ready for playback.
///
/// Invariants:
/// - `events` strictly ascending by `time`
/// - at most one event per distinct time
/// - every note has one on, an off at its own end, and an off at pulse 0
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledEvents {
    pub timebase: i64,

    pub loop_length: i64,

    pub notes: Vec<NoteData>,

    pub events: Vec<CompiledEvent>,
}

impl CompiledEvents {
    /// A sequence that plays nothing.
    pub fn empty(timebase: i64) -> Self {
        Self {
            timebase: timebase.max(1),
            loop_length: timebase.max(1),
            notes: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Index of the first event at or after `pulse` (taken modulo the loop),
    /// wrapping to 0 past the last event.
    pub fn index_at_or_after(&self, pulse: i64) -> usize {
        let time = pulse.rem_euclid(self.loop_length);
        let index = self.events.partition_point(|e| e.time < time);
        if index >= self.events.len() { 0 } else { index }
    }
}

/// Compile a Pattern into a loop of on/off events.
///
/// This function:
/// 1. Validates timebase, loop length and note spans
/// 2. Wraps every note's start and end into the loop
/// 3. Adds the mandatory off at pulse 0 for every note
/// 4. Merges coincident entries, one event per distinct pulse
///
/// The output depends only on the pattern value.
pub fn compile(pattern: &Pattern) -> CompileResult<CompiledEvents> {
    if pattern.timebase <= 0 {
        return Err(CompileError::InvalidTimebase {
            timebase: pattern.timebase,
        });
    }

    let loop_length = pattern.loop_length;
    if loop_length <= 0 {
        return Err(CompileError::InvalidLoopLength { loop_length });
    }

    // Map from pulse -> (ons, offs)
    let mut event_map: BTreeMap<i64, (BTreeSet<usize>, BTreeSet<usize>)> = BTreeMap::new();
    let mut notes = Vec::with_capacity(pattern.notes.len());

    for (index, note) in pattern.notes.iter().enumerate() {
        if !note.is_valid() {
            return Err(CompileError::InvalidNote { index });
        }

        let data_index = notes.len();
        notes.push(NoteData {
            note_index: index,
            note_number: note.note_number,
            velocity: note.velocity,
        });

        let on_time = note.start_point.rem_euclid(loop_length);
        event_map.entry(on_time).or_default().0.insert(data_index);

        let off_time = note.end_point.rem_euclid(loop_length);
        event_map.entry(off_time).or_default().1.insert(data_index);

        // Every note is silenced once per loop, whatever its own end.
        event_map.entry(0).or_default().1.insert(data_index);
    }

    let events = event_map
        .into_iter()
        .map(|(time, (ons, offs))| CompiledEvent {
            time,
            ons: ons.into_iter().collect(),
            offs: offs.into_iter().collect(),
        })
        .collect();

    Ok(CompiledEvents {
        timebase: pattern.timebase,
        loop_length,
        notes,
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Note;

    fn pattern_with(loop_length: i64, notes: &[(i64, i64, i32)]) -> Pattern {
        let mut pattern = Pattern::new(24);
        pattern.loop_length = loop_length;
        for &(start, end, number) in notes {
            pattern.add_note(Note::new(start, end, number, 1.0));
        }
        pattern
    }

    fn ons_at(events: &CompiledEvents, data: usize) -> Vec<i64> {
        events
            .events
            .iter()
            .filter(|e| e.ons.contains(&data))
            .map(|e| e.time)
            .collect()
    }

    fn offs_at(events: &CompiledEvents, data: usize) -> Vec<i64> {
        events
            .events
            .iter()
            .filter(|e| e.offs.contains(&data))
            .map(|e| e.time)
            .collect()
    }

    #[test]
    fn test_compile_empty_pattern() {
        let result = compile(&Pattern::new(24)).unwrap();
        assert!(result.is_empty());
        assert!(result.notes.is_empty());
        assert_eq!(result.index_at_or_after(5), 0);
    }

    #[test]
    fn test_compile_is_deterministic() {
        let pattern = pattern_with(48, &[(0, 12, 0), (12, 30, 1), (40, 60, 2), (6, 12, 3)]);
        assert_eq!(compile(&pattern).unwrap(), compile(&pattern).unwrap());
    }

    #[test]
    fn test_every_note_has_on_and_offs() {
        let pattern = pattern_with(48, &[(0, 12, 0), (12, 30, 1), (40, 60, 2), (6, 12, 3)]);
        let result = compile(&pattern).unwrap();

        for (data, note) in pattern.notes.iter().enumerate() {
            assert_eq!(ons_at(&result, data), vec![note.start_point % 48]);

            let offs = offs_at(&result, data);
            assert!(offs.contains(&0));
            assert!(offs.contains(&(note.end_point % 48)));
        }
    }

    #[test]
    fn test_events_strictly_ascending() {
        let pattern = pattern_with(24, &[(18, 30, 0), (0, 6, 1), (6, 12, 2), (6, 18, 3)]);
        let result = compile(&pattern).unwrap();

        let times: Vec<i64> = result.events.iter().map(|e| e.time).collect();
        assert_eq!(times, vec![0, 6, 12, 18]);
    }

    #[test]
    fn test_coincident_entries_merge() {
        // Note 0 ends where note 1 starts; both are also silenced at 0.
        let pattern = pattern_with(24, &[(0, 12, 0), (12, 24, 1)]);
        let result = compile(&pattern).unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result.events[0].time, 0);
        assert_eq!(result.events[0].ons, vec![0]);
        assert_eq!(result.events[0].offs, vec![0, 1]);
        assert_eq!(result.events[1].time, 12);
        assert_eq!(result.events[1].ons, vec![1]);
        assert_eq!(result.events[1].offs, vec![0]);
    }

    #[test]
    fn test_wrapped_note() {
        let pattern = pattern_with(24, &[(18, 30, 0)]);
        let result = compile(&pattern).unwrap();
        assert_eq!(ons_at(&result, 0), vec![18]);
        assert_eq!(offs_at(&result, 0), vec![0, 6]);
    }

    #[test]
    fn test_negative_start_wraps_into_loop() {
        let pattern = pattern_with(24, &[(-6, 6, 0)]);
        let result = compile(&pattern).unwrap();
        assert_eq!(ons_at(&result, 0), vec![18]);
    }

    #[test]
    fn test_degenerate_patterns_rejected() {
        let mut pattern = Pattern::basic();
        pattern.loop_length = 0;
        assert_eq!(
            compile(&pattern),
            Err(CompileError::InvalidLoopLength { loop_length: 0 })
        );

        let mut pattern = Pattern::basic();
        pattern.timebase = -1;
        assert!(matches!(
            compile(&pattern),
            Err(CompileError::InvalidTimebase { .. })
        ));

        let pattern = pattern_with(24, &[(0, 6, 0), (6, 6, 0)]);
        assert_eq!(compile(&pattern), Err(CompileError::InvalidNote { index: 1 }));

        let mut pattern = pattern_with(24, &[(0, 6, 0)]);
        pattern.notes[0].velocity = f64::NAN;
        assert_eq!(compile(&pattern), Err(CompileError::InvalidNote { index: 0 }));
    }

    #[test]
    fn test_index_at_or_after() {
        let pattern = pattern_with(24, &[(6, 12, 0), (18, 20, 1)]);
        let result = compile(&pattern).unwrap();
        // Events at 0, 6, 12, 18, 20
        assert_eq!(result.index_at_or_after(0), 0);
        assert_eq!(result.index_at_or_after(7), 2);
        assert_eq!(result.index_at_or_after(21), 0);
        assert_eq!(result.index_at_or_after(24 + 18), 3);
    }
}
