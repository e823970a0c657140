// src/lib.rs
//
// Library entry point for hosts embedding the arpeggiator.

pub mod bridge;
pub mod compile;
pub mod event;
pub mod held_notes;
pub mod processor;
pub mod scheduler;
pub mod state;
pub mod transport;

#[cfg(test)]
mod test;

// Re-export key types for Rust consumers
pub use bridge::{EditorHandle, PatternError, ProcessorHandle, create_bridge};
pub use compile::{CompileError, CompiledEvents, compile};
pub use event::{InputEvent, NoteEventKind, OutputEvent};
pub use held_notes::HeldNoteSet;
pub use processor::{ArpConfig, Arpeggiator};
pub use state::{IntegrityError, Note, Pattern, pattern_from_text, pattern_to_text};
pub use transport::HostTransport;
