//! Derived suppressor identifiers.
//!
//! # Id Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  bits 127..64   OWNER_PREFIX         5350574e-5741-8a11           │
//! │  bits  63..62   RFC 4122 variant     10                           │
//! │  bits  61..0    digest of zone id    low 62 bits of mix(hi, lo)   │
//! │                                                                  │
//! │  = suppressor id (v8)                5350574e-5741-8a11-[89ab]... │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every derived id carries the same 64-bit prefix, so a span written by any
//! earlier run is recognisable without a side table, whatever version the zone
//! id itself has. Ids of other writers only count as ours if they reuse the
//! full prefix. The digest is not reversible; distinct zones that happen to
//! share a digest are reported by the synchronizer instead of merged.

use std::fmt;

use uuid::{Uuid, Variant};

/// High 64 bits shared by every derived suppressor id.
pub const OWNER_PREFIX: u64 = 0x5350_574e_5741_8a11;

const VARIANT_BITS: u64 = 0x8000_0000_0000_0000;
const DIGEST_MASK: u64 = 0x3fff_ffff_ffff_ffff;

/// Identity under which a zone's spans are written to the suppression store.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SuppressorId(Uuid);

impl SuppressorId {
    /// Deterministic suppressor id for a zone.
    #[inline]
    #[must_use]
    pub const fn derive(zone_id: Uuid) -> Self {
        let low = (digest(zone_id.as_u128()) & DIGEST_MASK) | VARIANT_BITS;
        Self(Uuid::from_u128(((OWNER_PREFIX as u128) << 64) | low as u128))
    }

    /// Wrap an id written by some other party.
    #[must_use]
    pub const fn foreign(id: Uuid) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn as_uuid(self) -> Uuid {
        self.0
    }

    /// Whether this id carries the prefix [`SuppressorId::derive`] stamps on every id.
    #[must_use]
    pub fn is_derived(self) -> bool {
        (self.0.as_u128() >> 64) as u64 == OWNER_PREFIX && self.0.get_variant() == Variant::RFC4122
    }
}

impl fmt::Debug for SuppressorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SuppressorId({})", self.0)
    }
}

impl fmt::Display for SuppressorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// splitmix64 finalizer. A bijection on `u64`.
const fn fmix(mut x: u64) -> u64 {
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

/// Stable 64-bit digest of a 128-bit id. Injective in the low half for a fixed high half.
const fn digest(id: u128) -> u64 {
    let hi = (id >> 64) as u64;
    let lo = id as u64;
    fmix(fmix(hi) ^ lo)
}
