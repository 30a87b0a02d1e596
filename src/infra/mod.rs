// ============================================================
// Layer 6 - Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong in any specific
// business layer:
//
//   metrics.rs  Training metrics logging
//               Writes per-epoch loss and batch counts to a
//               CSV file for later analysis and plotting.
//
// Model weights are never persisted, so there is no checkpoint
// store here.
//
// Reference: Rust Book §9 (Error Handling with anyhow)

/// Training metrics CSV logger
pub mod metrics;
