// ============================================================
// Layer 2 - Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (training + generation, or inspecting the
// vocabulary).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Train the model, then generate a melody from it
pub mod train_use_case;

// Report the vocabulary a dataset produces
pub mod vocab_use_case;
