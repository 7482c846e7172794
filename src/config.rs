//! Table configuration.

use crate::hash::until_nul;

/// How a probe key is compared against stored keys.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum KeyMatch {
    /// C-string equality: both keys are cut at their first NUL byte before
    /// comparing, so `b"k\0a"` and `b"k\0b"` name the same entry.
    #[default]
    NulTerminated,
    /// Byte-for-byte equality over the full key buffers.
    Exact,
}

impl KeyMatch {
    #[inline]
    pub fn matches(self, stored: &[u8], probe: &[u8]) -> bool {
        match self {
            KeyMatch::NulTerminated => until_nul(stored) == until_nul(probe),
            KeyMatch::Exact => stored == probe,
        }
    }
}

/// Settings fixed when a table is initialized.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TableConfig {
    pub key_match: KeyMatch,
    /// Upper bound on live entries. Inserting a new key beyond it fails with
    /// `OutOfMemory`, the same as a failed node allocation. `None` means
    /// bounded only by the allocator.
    pub max_entries: Option<usize>,
}

impl TableConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_match(mut self, key_match: KeyMatch) -> Self {
        self.key_match = key_match;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }
}
