// Pattern definitions.
//
// A pattern is the user-authored rhythm of the arpeggiator: a list of
// loop-relative notes whose `note_number` indexes into the currently held
// input notes rather than naming an absolute pitch.
//
// Key concepts:
// - Pulse: the smallest schedulable time unit (`timebase` pulses per beat)
// - Note: one on/off span inside the loop
// - Pattern: the loop length plus its notes, in authoring order
//
// Nothing here is normalized on mutation. Wrapping into the loop happens
// only when the pattern is compiled.

/// Pulses per quarter note used when nothing else is specified.
pub const DEFAULT_TIMEBASE: i64 = 24;

/// Velocity given to newly created notes.
pub const DEFAULT_VELOCITY: f64 = 0.8;

/// Grid subdivisions per beat used by the edit operations.
pub const DEFAULT_DIVISOR: i64 = 4;

// ═══════════════════════════════════════════════════════════════════════════
// Note
// ═══════════════════════════════════════════════════════════════════════════

/// A single note of the pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    /// Start position in pulses (relative to loop start).
    pub start_point: i64,

    /// End position in pulses. May exceed the loop length.
    pub end_point: i64,

    /// Index into the held notes (0 = first held note).
    pub note_number: i32,

    /// Velocity (0.0 - 1.0), forwarded to output events.
    pub velocity: f64,
}

impl Note {
    pub fn new(start_point: i64, end_point: i64, note_number: i32, velocity: f64) -> Self {
        Self {
            start_point,
            end_point,
            note_number,
            velocity,
        }
    }

    /// Length in pulses.
    pub fn length(&self) -> i64 {
        self.end_point - self.start_point
    }

    /// Whether the note spans at least one pulse and has a finite velocity.
    pub fn is_valid(&self) -> bool {
        self.end_point > self.start_point && self.velocity.is_finite()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Pattern
// ═══════════════════════════════════════════════════════════════════════════

/// An arpeggiator pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    /// Pulses per quarter note.
    pub timebase: i64,

    /// Pulses per loop cycle.
    pub loop_length: i64,

    /// Notes in authoring order.
    pub notes: Vec<Note>,
}

impl Pattern {
    /// Create an empty pattern one beat long.
    pub fn new(timebase: i64) -> Self {
        Self {
            timebase,
            loop_length: timebase,
            notes: Vec::new(),
        }
    }

    /// The one-note pattern loaded when nothing else is available.
    pub fn basic() -> Self {
        let mut pattern = Self::new(DEFAULT_TIMEBASE);
        pattern
            .notes
            .push(Note::new(0, DEFAULT_TIMEBASE, 0, DEFAULT_VELOCITY));
        pattern
    }

    /// Add a note, returning its index.
    pub fn add_note(&mut self, note: Note) -> usize {
        self.notes.push(note);
        self.notes.len() - 1
    }

    pub fn get_note(&self, index: usize) -> Option<&Note> {
        self.notes.get(index)
    }

    pub fn get_note_mut(&mut self, index: usize) -> Option<&mut Note> {
        self.notes.get_mut(index)
    }

    /// Remove the note at `index`.
    pub fn remove_note(&mut self, index: usize) -> Option<Note> {
        if index < self.notes.len() {
            Some(self.notes.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.notes.clear();
    }

    /// Latest end point of any note, or 0 for an empty pattern.
    pub fn last_note_end(&self) -> i64 {
        self.notes.iter().map(|n| n.end_point).max().unwrap_or(0)
    }

    // -------------------------------
    // MARK: Grid
    // -------------------------------

    /// Length of one grid cell in pulses. Never zero.
    pub fn grid_length(&self, divisor: i64) -> i64 {
        if divisor <= 0 {
            return self.timebase.max(1);
        }
        (self.timebase / divisor).max(1)
    }

    /// Snap a pulse to the grid, rounding to the nearest cell or flooring.
    pub fn snap_pulse(&self, pulse: i64, divisor: i64, floor: bool) -> i64 {
        let grid = self.grid_length(divisor);
        let cells = pulse as f64 / grid as f64;
        let rounded = if floor { cells.floor() } else { cells.round() };
        rounded as i64 * grid
    }

    // -------------------------------
    // MARK: Edit operations
    // -------------------------------

    /// Create a one-cell note at the grid cell containing `pulse`.
    pub fn create_note(&mut self, pulse: i64, note_number: i32, divisor: i64) -> usize {
        let start = self.snap_pulse(pulse, divisor, true);
        let length = self.grid_length(divisor);
        self.add_note(Note::new(start, start + length, note_number, DEFAULT_VELOCITY))
    }

    /// Move the start of a note, keeping at least one grid cell of length.
    pub fn resize_note_start(&mut self, index: usize, pulse: i64, divisor: i64) -> bool {
        let grid = self.grid_length(divisor);
        let Some(note) = self.get_note_mut(index) else {
            return false;
        };
        note.start_point = pulse.min(note.end_point - grid);
        true
    }

    /// Move the end of a note, keeping at least one grid cell of length and
    /// not going past the loop end.
    pub fn resize_note_end(&mut self, index: usize, pulse: i64, divisor: i64) -> bool {
        let grid = self.grid_length(divisor);
        let loop_length = self.loop_length;
        let Some(note) = self.get_note_mut(index) else {
            return false;
        };
        note.end_point = pulse.max(note.start_point + grid).min(loop_length);
        if note.end_point <= note.start_point {
            // Loop shorter than the note's start: fall back to one cell.
            note.end_point = note.start_point + grid;
        }
        true
    }

    /// Move a note so that it ends at `end_pulse`, keeping its length.
    ///
    /// The note is kept inside `[0, loop_length]` where it fits.
    pub fn move_note(&mut self, index: usize, end_pulse: i64, note_number: i32) -> bool {
        let loop_length = self.loop_length;
        let Some(note) = self.get_note_mut(index) else {
            return false;
        };
        let length = note.length();
        note.end_point = end_pulse.max(length).min(loop_length.max(length));
        note.start_point = note.end_point - length;
        note.note_number = note_number;
        true
    }

    /// Resize the loop, never cutting into an existing note.
    pub fn resize_loop(&mut self, pulse: i64) {
        self.loop_length = self.last_note_end().max(pulse).max(1);
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEBASE)
    }
}
