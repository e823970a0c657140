// src/state/mod.rs
//
// Declarative state layer for pattern authoring.
//
// This module contains the structures the editor side works with: the
// pattern model, its durable document form, and the commands that carry
// compiled results over to the real-time side.
//
// Key principles:
// - Patterns are plain values, freely cloned and edited
// - Documents are the only durable representation
// - The real-time side never touches these structures directly

mod command;
mod document;
mod pattern;

pub use command::*;
pub use document::*;
pub use pattern::*;
