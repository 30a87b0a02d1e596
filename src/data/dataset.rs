use burn::data::dataset::Dataset;

/// One padded training pair. `target` is `input` shifted left by one.
#[derive(Debug, Clone, PartialEq)]
pub struct MelodySample {
    pub input:  Vec<u32>,
    pub target: Vec<u32>,
}

pub struct MelodyDataset {
    samples: Vec<MelodySample>,
}

impl MelodyDataset {
    pub fn new(samples: Vec<MelodySample>) -> Self { Self { samples } }
}

impl Dataset<MelodySample> for MelodyDataset {
    fn get(&self, index: usize) -> Option<MelodySample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
