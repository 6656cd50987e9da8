//! Reserved sentinel ids at the top of the vocabulary.

use anyhow::{Result, bail};
use std::fmt;

/// The four structural tokens occupying the last ids of the vocabulary,
/// in fixed order: `EOT = V-4`, `MASK = V-3`, `CLS = V-2`, `SEP = V-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub eot: u32,
    pub mask: u32,
    pub cls: u32,
    pub sep: u32,
}

impl SpecialTokens {
    /// Derive the sentinel layout from the vocabulary size.
    pub fn from_vocab_size(vocab_size: usize) -> Result<Self> {
        if vocab_size < 5 {
            bail!(
                "vocab_size {} is too small to hold the four reserved sentinel ids",
                vocab_size
            );
        }
        let v = u32::try_from(vocab_size)?;
        Ok(Self {
            eot: v - 4,
            mask: v - 3,
            cls: v - 2,
            sep: v - 1,
        })
    }

    /// True for ordinary content ids, i.e. anything below the lowest sentinel.
    #[inline]
    pub fn is_content(&self, id: u32) -> bool {
        id < self.eot
    }
}

impl fmt::Display for SpecialTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EOT={} MASK={} CLS={} SEP={}",
            self.eot, self.mask, self.cls, self.sep
        )
    }
}
