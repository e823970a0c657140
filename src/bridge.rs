//! Thread-safe bridge between the pattern editor and the real-time processor.
//!
//! This module provides the communication layer that lets the editor side
//! change the pattern while the host keeps calling the processor.
//!
//! # Architecture
//!
//! - **Editor thread** owns [`EditorHandle`] with the [`Pattern`] and its text
//! - **Audio thread** owns [`ProcessorHandle`] with the [`Arpeggiator`]
//! - Compiled sequences travel over an MPSC channel, retired ones come back
//!   the same way, and the playback position is read back through an atomic
//!
//! # Usage
//!
//! ```ignore
//! let (mut editor, mut processor) = create_bridge(Pattern::basic(), ArpConfig::default())?;
//!
//! // Editor thread: change the pattern
//! editor.edit(|p| { p.create_note(12, 1, 4); })?;
//!
//! // Audio thread: apply changes and render
//! let out = processor.process_block(&input, &transport, block_samples);
//! ```

use std::fmt;
use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
    mpsc::{self, Receiver, Sender, TryRecvError},
};

use log::{debug, error, warn};

use crate::compile::{CompileError, CompiledEvents, compile};
use crate::event::{InputEvent, OutputEvent};
use crate::processor::{ArpConfig, Arpeggiator};
use crate::scheduler::sounding_table_for;
use crate::state::{Command, CommandResult, IntegrityError, Pattern, pattern_from_text, pattern_to_text};
use crate::transport::HostTransport;

/// Why a pattern was not accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternError {
    /// The document does not describe a pattern.
    Integrity(IntegrityError),

    /// The pattern describes nothing playable.
    Compile(CompileError),
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternError::Integrity(e) => write!(f, "Pattern document rejected: {}", e),
            PatternError::Compile(e) => write!(f, "Pattern rejected: {}", e),
        }
    }
}

impl std::error::Error for PatternError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PatternError::Integrity(e) => Some(e),
            PatternError::Compile(e) => Some(e),
        }
    }
}

impl From<IntegrityError> for PatternError {
    fn from(e: IntegrityError) -> Self {
        PatternError::Integrity(e)
    }
}

impl From<CompileError> for PatternError {
    fn from(e: CompileError) -> Self {
        PatternError::Compile(e)
    }
}

/// Handle for the editor thread.
///
/// Every pattern it publishes has compiled successfully, so the processor
/// only ever sees valid sequences.
pub struct EditorHandle {
    /// The committed pattern.
    pattern: Pattern,

    /// Text form of the committed pattern, as last set or parsed.
    pattern_text: String,

    /// Octave shifting as last requested.
    octaves: bool,

    /// Channel to send commands to the processor.
    command_tx: Sender<Command>,

    /// Channel to receive retired sequences.
    result_rx: Receiver<CommandResult>,

    /// Shared readback state (written by the processor).
    readback: Arc<SharedReadback>,
}

/// Handle for the audio thread containing the processor and its channels.
pub struct ProcessorHandle {
    arp: Arpeggiator,

    /// Channel to receive commands from the editor.
    command_rx: Receiver<Command>,

    /// Channel to hand retired sequences back to the editor.
    result_tx: Sender<CommandResult>,

    readback: Arc<SharedReadback>,
}

/// Lock-free processor -> editor readback.
struct SharedReadback {
    /// Pulse position reached by the last block
    position: AtomicI64,
}

impl SharedReadback {
    fn new() -> Self {
        Self {
            position: AtomicI64::new(0),
        }
    }
}

/// Create a linked pair of handles for the editor and the processor.
///
/// Fails if the initial pattern does not compile.
pub fn create_bridge(
    pattern: Pattern,
    config: ArpConfig,
) -> Result<(EditorHandle, ProcessorHandle), CompileError> {
    let events = Arc::new(compile(&pattern)?);
    let (command_tx, command_rx) = mpsc::channel();
    let (result_tx, result_rx) = mpsc::channel();
    let readback = Arc::new(SharedReadback::new());

    let editor = EditorHandle {
        pattern_text: pattern_to_text(&pattern),
        pattern,
        octaves: config.octaves,
        command_tx,
        result_rx,
        readback: Arc::clone(&readback),
    };

    let processor = ProcessorHandle {
        arp: Arpeggiator::new(events, config),
        command_rx,
        result_tx,
        readback,
    };

    Ok((editor, processor))
}

// ═══════════════════════════════════════════════════════════════════
// EditorHandle - Editor Thread API
// ═══════════════════════════════════════════════════════════════════

impl EditorHandle {
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn pattern_text(&self) -> &str {
        &self.pattern_text
    }

    pub fn octaves(&self) -> bool {
        self.octaves
    }

    /// Edit the pattern.
    ///
    /// The closure works on a copy; the copy is committed and published
    /// only if it compiles. On error the previous pattern stays in effect.
    pub fn edit<F>(&mut self, f: F) -> Result<(), CompileError>
    where
        F: FnOnce(&mut Pattern),
    {
        let mut pattern = self.pattern.clone();
        f(&mut pattern);
        self.set_pattern(pattern)
    }

    /// Replace the pattern, regenerating its text form.
    pub fn set_pattern(&mut self, pattern: Pattern) -> Result<(), CompileError> {
        let text = pattern_to_text(&pattern);
        self.commit(pattern, text)
    }

    /// Replace the pattern from its text form.
    ///
    /// The text is kept verbatim. Nothing changes on error.
    pub fn parse_pattern(&mut self, text: &str) -> Result<(), PatternError> {
        let pattern = pattern_from_text(text).inspect_err(|e| {
            warn!("Rejected pattern document: {}", e);
        })?;
        self.commit(pattern, text.to_string())?;
        Ok(())
    }

    /// Enable or disable octave shifting.
    pub fn set_octaves(&mut self, octaves: bool) {
        self.octaves = octaves;
        self.send(Command::SetOctaves(octaves));
    }

    /// Pulse position the processor reached on its last block.
    pub fn last_position(&self) -> i64 {
        self.readback.position.load(Ordering::Relaxed)
    }

    /// Drop sequences the processor has retired.
    ///
    /// Returns how many were collected.
    pub fn collect_garbage(&self) -> usize {
        let mut collected = 0;
        loop {
            match self.result_rx.try_recv() {
                Ok(CommandResult::Retired { .. }) => collected += 1,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }
        collected
    }

    fn commit(&mut self, pattern: Pattern, text: String) -> Result<(), CompileError> {
        let events = compile(&pattern).inspect_err(|e| {
            warn!("Rejected pattern edit: {}", e);
        })?;
        debug!(
            "Compiled pattern: {} notes, {} events, loop {} pulses",
            events.notes.len(),
            events.len(),
            events.loop_length
        );

        self.publish(events);
        self.pattern = pattern;
        self.pattern_text = text;
        self.collect_garbage();
        Ok(())
    }

    fn publish(&self, events: CompiledEvents) {
        let sounding = sounding_table_for(&events);
        self.send(Command::SwapEvents {
            events: Arc::new(events),
            sounding,
        });
    }

    fn send(&self, cmd: Command) {
        if self.command_tx.send(cmd).is_err() {
            error!("Processor is gone; command dropped");
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// ProcessorHandle - Audio Thread API
// ═══════════════════════════════════════════════════════════════════

impl ProcessorHandle {
    /// Apply all pending commands from the editor.
    ///
    /// Called at the start of each block, before scheduling.
    /// Returns the number of commands applied.
    pub fn process_commands(&mut self) -> usize {
        let mut applied = 0;

        while let Ok(cmd) = self.command_rx.try_recv() {
            match cmd {
                Command::SwapEvents { events, sounding } => {
                    let (events, sounding) = self.arp.swap_events(events, sounding);
                    // If the editor is gone the retired sequence is dropped here.
                    let _ = self
                        .result_tx
                        .send(CommandResult::Retired { events, sounding });
                }
                Command::SetOctaves(octaves) => self.arp.set_octaves(octaves),
            }
            applied += 1;
        }

        applied
    }

    /// Process one block: apply commands, then schedule.
    ///
    /// Call this once per audio block from the audio callback.
    pub fn process_block(
        &mut self,
        input: &[InputEvent],
        transport: &HostTransport,
        block_samples: usize,
    ) -> &[OutputEvent] {
        self.process_commands();
        self.arp.process_block(input, transport, block_samples);
        self.readback
            .position
            .store(self.arp.position(), Ordering::Relaxed);
        self.arp.output()
    }

    /// Set the sample rate (on host prepare).
    pub fn prepare(&mut self, sample_rate: f64) {
        self.arp.prepare(sample_rate);
    }

    pub fn arpeggiator(&self) -> &Arpeggiator {
        &self.arp
    }
}
