//! Output buffers with an optional byte limit

use crate::error::{LiquidError, ResourceLimit};

/// A string buffer that refuses to grow past `limit` bytes
#[derive(Debug, Default)]
pub struct OutputBuffer {
    buf: String,
    limit: Option<usize>,
}

impl OutputBuffer {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            buf: String::new(),
            limit,
        }
    }

    /// Append `s`, returning the number of bytes written
    pub fn write(&mut self, s: &str) -> Result<usize, LiquidError> {
        if let Some(limit) = self.limit {
            if self.buf.len() + s.len() > limit {
                return Err(LiquidError::limit(
                    ResourceLimit::OutputStream,
                    format!("output exceeded {} bytes", limit),
                    None,
                ));
            }
        }
        self.buf.push_str(s);
        Ok(s.len())
    }

    /// A new buffer sharing whatever is left of this buffer's budget
    pub fn capture(&self) -> OutputBuffer {
        OutputBuffer::new(self.remaining())
    }

    pub fn remaining(&self) -> Option<usize> {
        self.limit.map(|limit| limit.saturating_sub(self.buf.len()))
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}
