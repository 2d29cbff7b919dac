//! Immutable byte views handed out by the cache.

use bytes::Bytes;

use super::lru::Weighted;

/// Read-only view of a cached value.
///
/// Cloning is cheap (reference counted) and never exposes mutable access to
/// the bytes held by the cache.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteView {
    data: Bytes,
}

impl ByteView {
    /// Wrap already-owned bytes without copying
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }

    /// Copy `data` into a fresh view, detaching it from the caller's buffer
    pub fn copy_from_slice(data: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
        }
    }

    /// Number of bytes in the view
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the view holds no bytes
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the bytes
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Zero-copy handle to the underlying bytes
    #[inline]
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    /// Copy the bytes out into an owned vector
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }
}

impl Weighted for ByteView {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl AsRef<[u8]> for ByteView {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl From<Bytes> for ByteView {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(data: Vec<u8>) -> Self {
        Self::new(Bytes::from(data))
    }
}

impl From<&'static str> for ByteView {
    fn from(s: &'static str) -> Self {
        Self::new(Bytes::from_static(s.as_bytes()))
    }
}

impl std::fmt::Display for ByteView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.data))
    }
}

impl std::fmt::Debug for ByteView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteView")
            .field("len", &self.len())
            .finish()
    }
}
