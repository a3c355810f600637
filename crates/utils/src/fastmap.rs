// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Hash map, set, and byte hashing aliases.
//!
//! Weft uses [`rapidhash::RapidHashMap`] and [`rapidhash::RapidHashSet`] as
//! stand-ins for `std::collections::HashMap` and `std::collections::HashSet`
//! (they ARE the std collections, just built with the
//! [`rapidhash::RapidBuildHasher`] hash builder).
//!
//! The runtime's maps are small and hot (name to language-element-id lookups,
//! mostly), so a fast non-cryptographic hash is the right trade. Seeds are
//! random, so the maps stay resistant to collision attacks.

use rapidhash::RapidBuildHasher;

/// A type alias for [`rapidhash::RapidHashMap`].
pub type FastMap<K, V> = rapidhash::RapidHashMap<K, V>;
/// A type alias for [`rapidhash::RapidHashSet`].
pub type FastSet<T> = rapidhash::RapidHashSet<T>;

/// Creates a new [`FastMap`] with the specified capacity.
#[inline(always)]
#[must_use]
pub fn map_with_capacity<K, V>(capacity: usize) -> FastMap<K, V>
where
    K: std::hash::Hash + Eq,
{
    FastMap::with_capacity_and_hasher(capacity, RapidBuildHasher::default())
}

/// Creates a new [`FastSet`] with the specified capacity.
#[inline(always)]
#[must_use]
pub fn set_with_capacity<T>(capacity: usize) -> FastSet<T>
where
    T: std::hash::Hash + Eq,
{
    FastSet::with_capacity_and_hasher(capacity, RapidBuildHasher::default())
}

/// Computes a stable hash for a byte slice using `rapidhash`.
#[inline(always)]
#[must_use]
pub const fn hash_bytes(bytes: &[u8]) -> u64 {
    rapidhash::rapidhash(bytes)
}
