//! Dense, growable bit vector
//!
//! Used as the state set of content-model automata during validation.
//! Reads past the logical length yield `false`; writes grow the vector.
//! Equality and hashing only look at the bits that are set, so two vectors
//! with different backing capacities but the same content compare equal.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::Result;
use crate::limits::Limits;

const WORD_BITS: usize = u64::BITS as usize;

/// Growable bit set backed by 64-bit words
#[derive(Debug, Clone, Default)]
pub struct BitVector {
    words: Vec<u64>,
    count: usize,
}

impl BitVector {
    /// Create an empty bit vector
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bit vector with `len` addressable bits, all clear
    pub fn with_len(len: usize) -> Self {
        Self {
            words: vec![0; words_for(len)],
            count: len,
        }
    }

    /// Logical length in bits
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check if the logical length is zero
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Check if any bit is set
    pub fn any(&self) -> bool {
        self.words.iter().any(|&w| w != 0)
    }

    /// Get a bit; indices past the end read as `false`
    pub fn get(&self, index: usize) -> bool {
        if index >= self.count {
            return false;
        }
        self.words[index / WORD_BITS] & mask(index) != 0
    }

    /// Set a bit, growing the vector if needed
    ///
    /// # Panics
    ///
    /// Panics if `index` is `usize::MAX`. Use [`BitVector::set_checked`] to
    /// bound growth by the configured limits instead.
    pub fn set(&mut self, index: usize) {
        self.grow_to_include(index);
        self.words[index / WORD_BITS] |= mask(index);
    }

    /// Set a bit, refusing to grow beyond the configured maximum length
    pub fn set_checked(&mut self, index: usize, limits: &Limits) -> Result<()> {
        limits.check_bit_index(index)?;
        self.set(index);
        Ok(())
    }

    /// Clear a bit, growing the vector if needed
    ///
    /// # Panics
    ///
    /// Panics if `index` is `usize::MAX`.
    pub fn clear(&mut self, index: usize) {
        self.grow_to_include(index);
        self.words[index / WORD_BITS] &= !mask(index);
    }

    /// Clear every bit, keeping length and capacity
    pub fn clear_all(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    /// Number of set bits
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Lowest set index strictly greater than `from`
    ///
    /// `None` as `from` starts the scan at index 0. Returns `None` when no
    /// further bit is set.
    pub fn next_set(&self, from: Option<usize>) -> Option<usize> {
        let start = match from {
            Some(i) => i.checked_add(1)?,
            None => 0,
        };
        if start >= self.count {
            return None;
        }

        let mut word_index = start / WORD_BITS;
        let mut word = self.words[word_index] & (!0u64 << (start % WORD_BITS));
        loop {
            if word != 0 {
                let index = word_index * WORD_BITS + word.trailing_zeros() as usize;
                return (index < self.count).then_some(index);
            }
            word_index += 1;
            if word_index >= self.words.len() {
                return None;
            }
            word = self.words[word_index];
        }
    }

    /// Iterate over the indices of set bits in ascending order
    pub fn iter_ones(&self) -> Ones<'_> {
        Ones {
            vector: self,
            last: None,
            done: false,
        }
    }

    /// In-place union; grows the receiver to the other's length if needed
    pub fn or(&mut self, other: &BitVector) {
        if other.count > self.count {
            self.ensure_len(other.count);
        }
        for (dst, src) in self.words.iter_mut().zip(&other.words) {
            *dst |= *src;
        }
    }

    /// In-place intersection; words beyond the other's storage become zero
    pub fn and(&mut self, other: &BitVector) {
        for (i, dst) in self.words.iter_mut().enumerate() {
            *dst &= other.words.get(i).copied().unwrap_or(0);
        }
    }

    fn grow_to_include(&mut self, index: usize) {
        match index.checked_add(1) {
            Some(required) => self.ensure_len(required),
            None => panic!("bit index {} is not addressable", index),
        }
    }

    fn ensure_len(&mut self, required: usize) {
        let needed = words_for(required);
        if needed > self.words.len() {
            let new_len = needed.max(self.words.len() * 2);
            self.words.resize(new_len, 0);
        }
        if required > self.count {
            self.count = required;
        }
    }

    // Words up to and including the last non-zero one.
    fn significant_words(&self) -> &[u64] {
        let end = self
            .words
            .iter()
            .rposition(|&w| w != 0)
            .map_or(0, |i| i + 1);
        &self.words[..end]
    }
}

fn words_for(bits: usize) -> usize {
    bits.div_ceil(WORD_BITS)
}

fn mask(index: usize) -> u64 {
    1u64 << (index % WORD_BITS)
}

impl PartialEq for BitVector {
    fn eq(&self, other: &Self) -> bool {
        self.significant_words() == other.significant_words()
    }
}

impl Eq for BitVector {}

impl Hash for BitVector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant_words().hash(state);
    }
}

impl FromIterator<usize> for BitVector {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut vector = BitVector::new();
        for index in iter {
            vector.set(index);
        }
        vector
    }
}

impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, index) in self.iter_ones().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", index)?;
        }
        write!(f, "}}")
    }
}

/// Iterator over set bit indices, see [`BitVector::iter_ones`]
#[derive(Debug, Clone)]
pub struct Ones<'a> {
    vector: &'a BitVector,
    last: Option<usize>,
    done: bool,
}

impl Iterator for Ones<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.done {
            return None;
        }
        match self.vector.next_set(self.last) {
            Some(index) => {
                self.last = Some(index);
                Some(index)
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}
