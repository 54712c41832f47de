use core::fmt;

/// Bounded text buffer collecting program output.
pub struct OutputBuf {
    buf: String,
    capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputError {
    OutputFull,
    FormattingErr,
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputError::OutputFull => f.write_str("output buffer is full"),
            OutputError::FormattingErr => f.write_str("failed to format output"),
        }
    }
}

impl OutputBuf {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: String::new(),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push_str(&mut self, stir: &str) -> Result<(), OutputError> {
        if self.buf.len() + stir.len() > self.capacity {
            return Err(OutputError::OutputFull);
        }
        self.buf.push_str(stir);
        Ok(())
    }

    /// Pushes bytes as UTF-8. Invalid sequences become U+FFFD.
    pub fn push_bstr(&mut self, bstr: &[u8]) -> Result<(), OutputError> {
        self.push_str(&String::from_utf8_lossy(bstr))
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Takes the buffered text, leaving the buffer empty.
    pub fn take(&mut self) -> String {
        core::mem::take(&mut self.buf)
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl fmt::Write for OutputBuf {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s).map_err(|_| fmt::Error)
    }
}
