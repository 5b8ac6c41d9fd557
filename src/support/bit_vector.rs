//-
// Copyright (c) 2024, the mhstore authors
//
// This file is part of mhstore.
//
// mhstore is free software: you can  redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// mhstore is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// mhstore. If not, see <http://www.gnu.org/licenses/>.

use std::fmt;
use std::iter;

/// The per-message status bits of a folder.
///
/// Bits below 64 live in an inline word; anything above spills into a boxed
/// vector which is only allocated once such a bit is set. Since nearly every
/// folder has only a handful of sequences, the spill vector is almost never
/// needed and each slot costs a word plus one pointer.
///
/// Growth is monotonic. Setting a bit beyond the current capacity grows the
/// storage; clearing or testing such a bit is simply a no-op or `false`.
#[derive(Clone, Default)]
pub struct BitVector {
    near: u64,
    far: Option<Box<Vec<u64>>>,
}

impl fmt::Debug for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BitVector")?;
        f.debug_list().entries(self.iter()).finish()
    }
}

// Equality is by content; trailing zero words from past growth don't count.
impl PartialEq for BitVector {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for BitVector {}

impl BitVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bit `bit`, growing the vector if needed.
    pub fn set(&mut self, bit: usize) {
        let (word, mask) = self.addr_mut(bit);
        *word |= mask;
    }

    /// Clear bit `bit`.
    pub fn clear(&mut self, bit: usize) {
        if bit < 64 {
            self.near &= !(1 << bit);
        } else if let Some(far) = self.far.as_mut() {
            if let Some(word) = far.get_mut(bit / 64 - 1) {
                *word &= !(1 << (bit % 64));
            }
        }
    }

    /// Clear every bit without releasing any storage.
    pub fn clear_all(&mut self) {
        self.near = 0;
        if let Some(far) = self.far.as_mut() {
            for word in far.iter_mut() {
                *word = 0;
            }
        }
    }

    /// Return whether bit `bit` is set.
    pub fn at(&self, bit: usize) -> bool {
        if bit < 64 {
            0 != self.near & (1 << bit)
        } else {
            self.far
                .as_ref()
                .and_then(|far| far.get(bit / 64 - 1))
                .map_or(false, |&word| 0 != word & (1 << (bit % 64)))
        }
    }

    /// Overwrite `self` with the contents of `src`.
    ///
    /// Storage already grown in `self` is kept, so the capacity of the
    /// destination never shrinks.
    pub fn copy_from(&mut self, src: &BitVector) {
        self.clear_all();
        self.near = src.near;
        if let Some(src_far) = src.far.as_ref() {
            let far = self.far.get_or_insert_with(|| Box::new(Vec::new()));
            if far.len() < src_far.len() {
                far.resize(src_far.len(), 0);
            }
            far[..src_far.len()].copy_from_slice(src_far);
        }
    }

    /// The number of bits which can currently be addressed without growth.
    pub fn capacity(&self) -> usize {
        64 * (1 + self.far.as_ref().map_or(0, |far| far.len()))
    }

    /// Return whether no bits at all are set.
    pub fn is_empty(&self) -> bool {
        0 == self.near
            && self
                .far
                .as_ref()
                .map_or(true, |far| far.iter().all(|&w| 0 == w))
    }

    /// Iterate over the indices of all set bits, ascending.
    pub fn iter<'a>(&'a self) -> impl Iterator<Item = usize> + 'a {
        static EMPTY: Vec<u64> = Vec::new();
        iter::once(self.near)
            .chain(
                self.far
                    .as_ref()
                    .map(|v| &**v)
                    .unwrap_or(&EMPTY)
                    .iter()
                    .copied(),
            )
            .enumerate()
            .flat_map(move |(ix, word)| {
                (0..64)
                    .filter(move |&bit| 0 != (word & (1 << bit)))
                    .map(move |bit| bit + ix * 64)
            })
    }

    fn addr_mut(&mut self, bit: usize) -> (&mut u64, u64) {
        if bit < 64 {
            (&mut self.near, 1 << bit)
        } else {
            let ix = bit / 64 - 1;
            let far = self.far.get_or_insert_with(|| Box::new(Vec::new()));
            if far.len() <= ix {
                far.resize(ix + 1, 0);
            }

            (&mut far[ix], 1 << (bit % 64))
        }
    }
}
