//! The stored key/value record.

/// A key/value pair together with the sizes its producer declared.
///
/// The declared sizes are carried along for the caller's benefit; the table
/// itself compares keys by content (see [`KeyMatch`](crate::KeyMatch)).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Entry {
    pub key: Vec<u8>,
    pub key_size: usize,
    pub value: Vec<u8>,
    pub value_size: usize,
}

impl Entry {
    /// Entry whose declared sizes are the buffer lengths.
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        let key = key.into();
        let value = value.into();
        Self {
            key_size: key.len(),
            value_size: value.len(),
            key,
            value,
        }
    }

    /// Entry with explicitly declared sizes, e.g. for fixed-size request
    /// buffers whose meaningful prefix is shorter than the buffer.
    pub fn with_sizes(key: Vec<u8>, key_size: usize, value: Vec<u8>, value_size: usize) -> Self {
        Self {
            key,
            key_size,
            value,
            value_size,
        }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn into_parts(self) -> (Vec<u8>, Vec<u8>) {
        (self.key, self.value)
    }
}
