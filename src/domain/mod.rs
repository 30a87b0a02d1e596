// ============================================================
// Layer 3 - Domain Layer
// ============================================================
// Plain Rust types that describe the music the model learns from.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain structs, enums and traits
//
// The model never sees a Note or a Melody directly. Everything
// crosses into the ML layer as integer ids produced by the
// Vocabulary, which is built once and lent out by reference.

// Typed errors shared by every layer below the CLI
pub mod error;

// A single pitch+octave+duration token
pub mod note;

// An ordered list of notes, parsed from one dataset entry
pub mod melody;

// Token <-> id mapping with the reserved padding id
pub mod vocabulary;

// Core abstractions (traits) that other layers implement
pub mod traits;
