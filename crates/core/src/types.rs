use std::fmt;
use std::sync::Arc;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Opaque image payload flowing through the edit pipeline.
///
/// Cloning is cheap (reference counted); the bytes themselves are never
/// mutated. Each pipeline stage consumes one `WorkingImage` and produces
/// a new one.
#[derive(Clone, PartialEq, Eq)]
pub struct WorkingImage(Arc<[u8]>);

impl WorkingImage {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Arc::from(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for WorkingImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorkingImage({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for WorkingImage {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for WorkingImage {
    fn from(bytes: &[u8]) -> Self {
        Self(Arc::from(bytes))
    }
}

impl AsRef<[u8]> for WorkingImage {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
