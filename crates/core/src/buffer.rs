//! Growable byte buffer backing serialization output
//!
//! `StringBuffer` is an append-only buffer with amortized O(1) append:
//! capacity doubles (exactly 2x per step, looped) until the requested
//! headroom fits. Reallocation failure is fatal - the global allocator
//! aborts the process, matching the SDK's fail-fast allocation policy.

/// Initial capacity of a fresh buffer, in bytes
const INITIAL_CAPACITY: usize = 16;

/// Append-only byte buffer with doubling growth
///
/// All JSON output is assembled in a `StringBuffer` before being handed
/// to a consumer sink. Callers that need a lower bound of free space
/// before a batch of writes (the string escaper does) call [`ensure`]
/// up front; plain [`put`]/[`put_char`] grow on demand.
///
/// [`ensure`]: StringBuffer::ensure
/// [`put`]: StringBuffer::put
/// [`put_char`]: StringBuffer::put_char
#[derive(Debug)]
pub struct StringBuffer {
    buf: Vec<u8>,
}

impl StringBuffer {
    /// Create an empty buffer with the minimum initial capacity
    pub fn new() -> Self {
        StringBuffer {
            buf: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Grow capacity until `extra` more bytes fit after the current content
    ///
    /// Capacity doubles per step until `len + extra` fits. Existing
    /// content is preserved. A no-op when the headroom already exists.
    pub fn ensure(&mut self, extra: usize) {
        let needed = self.buf.len() + extra;
        if self.buf.capacity() >= needed {
            return;
        }
        let mut target = self.buf.capacity().max(INITIAL_CAPACITY);
        while target < needed {
            target *= 2;
        }
        self.buf.reserve_exact(target - self.buf.len());
    }

    /// Append raw bytes
    pub fn put(&mut self, bytes: &[u8]) {
        self.ensure(bytes.len());
        self.buf.extend_from_slice(bytes);
    }

    /// Append a single byte
    pub fn put_char(&mut self, byte: u8) {
        self.ensure(1);
        self.buf.push(byte);
    }

    /// Logical length of the content written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Current content as a byte slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the buffer, yielding the backing storage
    ///
    /// The returned vector's length is the logical length; no trailing
    /// terminator is appended.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for StringBuffer {
    fn default() -> Self {
        Self::new()
    }
}
