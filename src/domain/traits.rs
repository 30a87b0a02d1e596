// ============================================================
// Layer 3 - Core Traits (Abstractions)
// ============================================================
// The application layer programs against these traits so the
// concrete data source can change without touching the
// training workflow.

use anyhow::Result;
use crate::domain::melody::Melody;

// ─── MelodySource ─────────────────────────────────────────────────────────────
/// Any component that can produce the training melodies.
///
/// Implementations:
///   - JsonMelodyLoader → JSON array of comma-separated melodies
pub trait MelodySource {
    /// Load every melody from this source.
    /// A malformed token anywhere fails the whole load.
    fn load_all(&self) -> Result<Vec<Melody>>;
}
