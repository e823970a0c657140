// src/processor.rs

use std::sync::Arc;

use crate::compile::CompiledEvents;
use crate::event::{InputEvent, OutputEvent};
use crate::held_notes::HeldNoteSet;
use crate::scheduler::{Scheduler, SoundingTable, sounding_table_for};
use crate::transport::{BlockContext, DEFAULT_SAMPLE_RATE, HostTransport};

/// Output events preallocated per block.
pub const MAX_OUTPUT_EVENTS: usize = 1024;

/// Processor configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArpConfig {
    /// Sample rate (set once on prepare).
    pub sample_rate: f64,

    /// Shift wrapped note numbers by whole octaves.
    pub octaves: bool,

    /// Output capacity reserved up front.
    pub max_output_events: usize,
}

impl Default for ArpConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            octaves: true,
            max_output_events: MAX_OUTPUT_EVENTS,
        }
    }
}

/// Real-time arpeggiator.
///
/// This struct runs exclusively on the audio thread.
/// It must be deterministic, lock-free, and must not allocate while the
/// preallocated buffers suffice. Compilation happens elsewhere; new
/// sequences arrive whole through [`Arpeggiator::swap_events`].
#[derive(Debug)]
pub struct Arpeggiator {
    /// Compiled loop currently playing
    events: Arc<CompiledEvents>,

    scheduler: Scheduler,

    held: HeldNoteSet,

    sample_rate: f64,

    octaves: bool,

    /// Releases produced between cycles, emitted at the next block start
    pending: Vec<OutputEvent>,

    output: Vec<OutputEvent>,
}

impl Arpeggiator {
    pub fn new(events: Arc<CompiledEvents>, config: ArpConfig) -> Self {
        let scheduler = Scheduler::new(sounding_table_for(&events));
        Self {
            events,
            scheduler,
            held: HeldNoteSet::new(),
            sample_rate: config.sample_rate,
            octaves: config.octaves,
            pending: Vec::with_capacity(config.max_output_events),
            output: Vec::with_capacity(config.max_output_events),
        }
    }

    /// Set the sample rate (on host prepare).
    pub fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    /// Process one block.
    ///
    /// Called once per audio block from the audio callback. Input notes
    /// are applied first so the whole block sees one held-note snapshot.
    pub fn process_block(
        &mut self,
        input: &[InputEvent],
        transport: &HostTransport,
        block_samples: usize,
    ) -> &[OutputEvent] {
        self.output.clear();
        self.output.append(&mut self.pending);

        for event in input {
            match *event {
                InputEvent::NoteOn { pitch, .. } => self.held.add(pitch),
                InputEvent::NoteOff { pitch } => self.held.remove(pitch),
            }
        }

        let ctx = BlockContext::new(self.sample_rate, block_samples, self.octaves);
        self.scheduler
            .process(&self.events, &self.held, transport, &ctx, &mut self.output);

        &self.output
    }

    /// Replace the compiled sequence between blocks.
    ///
    /// Notes sounding under the old sequence are released at the start of
    /// the next block. Returns the retired sequence and side table so the
    /// caller can drop them off the audio thread.
    pub fn swap_events(
        &mut self,
        events: Arc<CompiledEvents>,
        sounding: SoundingTable,
    ) -> (Arc<CompiledEvents>, SoundingTable) {
        let old_sounding = self.scheduler.install(sounding, &mut self.pending);
        let old_events = std::mem::replace(&mut self.events, events);
        (old_events, old_sounding)
    }

    pub fn set_octaves(&mut self, octaves: bool) {
        self.octaves = octaves;
    }

    // -------------------------------
    // MARK: State access
    // -------------------------------

    #[inline]
    pub fn octaves(&self) -> bool {
        self.octaves
    }

    #[inline]
    pub fn events(&self) -> &CompiledEvents {
        &self.events
    }

    #[inline]
    pub fn held_notes(&self) -> &HeldNoteSet {
        &self.held
    }

    #[inline]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Events produced by the last block.
    #[inline]
    pub fn output(&self) -> &[OutputEvent] {
        &self.output
    }

    /// Pulse position reached by the last block.
    #[inline]
    pub fn position(&self) -> i64 {
        self.scheduler.position()
    }
}
