// ============================================================
// Layer 4 - Data Pipeline
// ============================================================
// Everything between the dataset file and the tensor batches
// the training loop consumes:
//
//   dataset.json
//       │
//       ▼
//   JsonMelodyLoader   → parses melodies, rejects bad tokens
//       │
//       ▼
//   Vocabulary         → (domain layer) token ids, PAD = 0
//       │
//       ▼
//   MelodyPreprocessor → prefix pairs, truncation, padding
//       │
//       ▼
//   MelodyDataset      → implements Burn's Dataset trait
//       │
//       ▼
//   MelodyBatcher      → teacher-forcing split, Int tensors
//       │
//       ▼
//   DataLoader         → shuffled batches for the trainer

/// Reads melodies from a JSON dataset
pub mod loader;

/// Builds padded (input, target) pairs
pub mod preprocessor;

/// Implements Burn's Dataset trait for training pairs
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
