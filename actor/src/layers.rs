/*!
Collision layers and layer masks.

A collider belongs to exactly one [`Layer`] (0..32). Masks are plain bitsets over those layers,
stored in the generic [`BitmaskFlags`] container so the same type works for any flag enum backed
by a primitive integer.
*/

use num_traits::{One, PrimInt};
use serde::{Deserialize, Serialize};

/// Trait implemented by flag types that map onto a single bit.
///
/// You choose the backing integer type via the associated `Storage`.
pub trait FlagBitmask {
    type Storage: PrimInt;

    fn bit_index(&self) -> u8;

    fn mask(&self) -> Self::Storage {
        // NOTE: `bit_index()` must be < number of bits in `Storage`.
        Self::Storage::one() << (self.bit_index() as usize)
    }
}

/// A pure bitmask container.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BitmaskFlags<T: PrimInt> {
    pub bits: T,
}

impl<T: PrimInt> BitmaskFlags<T> {
    pub const fn new(bits: T) -> Self {
        Self { bits }
    }

    /// Every bit set.
    pub fn all() -> Self {
        Self { bits: !T::zero() }
    }

    pub fn none() -> Self {
        Self { bits: T::zero() }
    }

    // --- Single Tag Operations ---
    pub fn add<U: FlagBitmask<Storage = T>>(&mut self, tag: U) {
        self.bits = self.bits | tag.mask();
    }

    pub fn remove<U: FlagBitmask<Storage = T>>(&mut self, tag: U) {
        self.bits = self.bits & !tag.mask();
    }

    pub fn has<U: FlagBitmask<Storage = T>>(&self, tag: U) -> bool {
        (self.bits & tag.mask()) != T::zero()
    }

    // --- Bulk Operations ---
    pub fn add_many<U: FlagBitmask<Storage = T> + Copy>(&mut self, tags: &[U]) {
        for &tag in tags {
            self.add(tag);
        }
    }

    pub fn has_any<U: FlagBitmask<Storage = T> + Copy>(&self, tags: &[U]) -> bool {
        if tags.is_empty() {
            return false;
        }
        let combined = tags.iter().fold(T::zero(), |acc, t| acc | t.mask());
        (self.bits & combined) != T::zero()
    }

    // --- Logic Gates ---
    pub fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    /// Bits of `self` that are not in `other`.
    pub fn without(self, other: Self) -> Self {
        Self {
            bits: self.bits & !other.bits,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bits == T::zero()
    }

    pub fn clear(&mut self) {
        self.bits = T::zero();
    }
}

/// Index of a collision layer.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Layer(pub u8);

impl Layer {
    pub const DEFAULT: Layer = Layer(0);
    /// Number of layers a [`LayerMask`] can address.
    pub const COUNT: u8 = 32;

    /// Whether a mask can address this layer. Masks fold larger indices onto the last bit.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0 < Self::COUNT
    }
}

impl FlagBitmask for Layer {
    type Storage = u32;

    fn bit_index(&self) -> u8 {
        self.0.min(Self::COUNT - 1)
    }
}

pub type LayerMask = BitmaskFlags<u32>;

impl LayerMask {
    pub fn from_layers(layers: &[Layer]) -> Self {
        let mut mask = Self::none();
        mask.add_many(layers);
        mask
    }
}

/// Which layers the character collides with and how it treats them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerSettings {
    /// Layers that block the character.
    pub collision: LayerMask,
    /// Layers the character can stand on stably.
    pub stable: LayerMask,
    /// Layers that only block the bottom of the body while descending.
    pub one_way_platforms: LayerMask,
    /// Layers whose dynamic bodies the character pushes through instead of sliding on.
    pub pushable: LayerMask,
}

impl Default for LayerSettings {
    fn default() -> Self {
        Self {
            collision: LayerMask::all(),
            stable: LayerMask::all(),
            one_way_platforms: LayerMask::none(),
            pushable: LayerMask::all(),
        }
    }
}

impl LayerSettings {
    /// Everything the solver casts against, one-way platforms included.
    #[inline]
    pub fn obstacles(&self) -> LayerMask {
        self.collision.union(self.one_way_platforms)
    }

    #[inline]
    pub fn obstacles_without_one_way_platforms(&self) -> LayerMask {
        self.collision.without(self.one_way_platforms)
    }

    #[inline]
    pub fn is_stable(&self, layer: Layer) -> bool {
        self.stable.has(layer)
    }

    #[inline]
    pub fn is_one_way_platform(&self, layer: Layer) -> bool {
        self.one_way_platforms.has(layer)
    }

    #[inline]
    pub fn is_pushable(&self, layer: Layer) -> bool {
        self.pushable.has(layer)
    }
}
