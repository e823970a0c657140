// Commands between the editor and the real-time processor.
//
// Commands are the ONLY way the editor side can change what the processor
// plays. They are queued and applied at the start of a processing cycle,
// never in the middle of one.

use std::sync::Arc;

use crate::compile::CompiledEvents;
use crate::scheduler::SoundingTable;

/// A command from the editor to the processor.
///
/// Commands are:
/// - Immutable once created
/// - Applied between cycles, in order
/// - Applied atomically (all-or-nothing)
#[derive(Debug)]
pub enum Command {
    /// Replace the compiled sequence.
    ///
    /// `sounding` is a fresh side table sized for `events`, built off the
    /// real-time path so the swap itself never allocates.
    SwapEvents {
        events: Arc<CompiledEvents>,
        sounding: SoundingTable,
    },

    /// Enable or disable octave shifting of wrapped note numbers.
    SetOctaves(bool),
}

/// Response from the processor after applying a command.
#[derive(Debug)]
pub enum CommandResult {
    /// A sequence was replaced. Its storage is handed back so it gets
    /// dropped on the editor side.
    Retired {
        events: Arc<CompiledEvents>,
        sounding: SoundingTable,
    },
}
