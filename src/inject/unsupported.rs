//! Placeholder sink for platforms without an injection backend

use super::{InjectError, KeySink, Keystroke};

pub struct UnsupportedSink;

impl UnsupportedSink {
    pub fn new() -> Result<Self, InjectError> {
        Err(InjectError::Unsupported)
    }
}

impl KeySink for UnsupportedSink {
    fn send(&mut self, _stroke: Keystroke) -> Result<(), InjectError> {
        Err(InjectError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_unavailable() {
        assert!(matches!(UnsupportedSink::new(), Err(InjectError::Unsupported)));
    }
}
