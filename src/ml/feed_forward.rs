use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation::relu,
};

/// FFN(x) = ReLU(x W1 + b1) W2 + b2, applied to every position alike.
#[derive(Config, Debug)]
pub struct FeedForwardConfig {
    pub d_model:       usize,
    pub d_feedforward: usize,
}

impl FeedForwardConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> FeedForward<B> {
        FeedForward {
            linear1: LinearConfig::new(self.d_model, self.d_feedforward).init(device),
            linear2: LinearConfig::new(self.d_feedforward, self.d_model).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    linear1: Linear<B>,
    linear2: Linear<B>,
}

impl<B: Backend> FeedForward<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        self.linear2.forward(relu(self.linear1.forward(x)))
    }
}
