//! Signal sources used by the integration tests

use rtscope::{SignalSource, ValueKind};

/// Source whose outputs never change
///
/// Each output carries a distinct value, so a value seen in a waveform
/// identifies the channel it was sampled from.
pub struct FixedSource {
    name: String,
    outputs: Vec<f64>,
}

impl FixedSource {
    pub fn new(name: &str, outputs: &[f64]) -> Self {
        Self {
            name: name.to_string(),
            outputs: outputs.to_vec(),
        }
    }
}

impl SignalSource for FixedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn count(&self, kind: ValueKind) -> usize {
        match kind {
            ValueKind::Output => self.outputs.len(),
            _ => 0,
        }
    }

    fn value_name(&self, kind: ValueKind, index: usize) -> String {
        format!("{}{}", kind, index)
    }

    fn input(&self, _index: usize) -> f64 {
        f64::NAN
    }

    fn output(&self, index: usize) -> f64 {
        self.outputs.get(index).copied().unwrap_or(f64::NAN)
    }
}
