//! Buffer threshold accounting.

/// Default number of bytes buffered while scanning for a tag.
pub const DEFAULT_MAX_BUFFER: usize = 8192;

/// Tracks pending buffered bytes against a fixed threshold.
#[derive(Debug, Clone)]
pub struct FlushController {
    pending_bytes: usize,
    /// Bytes that may be held back before a forced flush.
    max_buffer: usize,
}

impl FlushController {
    /// Create a controller with the given threshold.
    pub fn new(max_buffer: usize) -> Self {
        Self {
            pending_bytes: 0,
            max_buffer,
        }
    }

    /// Record bytes added to the buffer.
    pub fn add_bytes(&mut self, count: usize) {
        self.pending_bytes = self.pending_bytes.saturating_add(count);
    }

    /// Whether the buffer has grown past the threshold.
    pub fn should_flush(&self) -> bool {
        self.pending_bytes > self.max_buffer
    }

    /// Reset pending byte count after flush.
    pub fn reset(&mut self) {
        self.pending_bytes = 0;
    }

    /// Bytes currently pending.
    pub fn pending(&self) -> usize {
        self.pending_bytes
    }

    /// Configured threshold.
    pub fn max_buffer(&self) -> usize {
        self.max_buffer
    }
}

impl Default for FlushController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUFFER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_exclusive() {
        let mut flush = FlushController::new(10);
        flush.add_bytes(10);
        assert!(!flush.should_flush());

        flush.add_bytes(1);
        assert!(flush.should_flush());

        flush.reset();
        assert_eq!(flush.pending(), 0);
        assert!(!flush.should_flush());
    }

    #[test]
    fn test_default_threshold() {
        assert_eq!(FlushController::default().max_buffer(), 8192);
    }
}
