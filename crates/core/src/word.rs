//! Word-granularity memory access and sub-word masking.
//!
//! The protocols operate on aligned machine words; narrower accesses are
//! composed from a word plus a byte mask. Masks are built positionally from
//! native-endian byte layout, so the arithmetic is identical on either
//! endianness.
//!
//! The raw load/store helpers go through `AtomicUsize` views of the target
//! so concurrent access from a doomed transaction is a race on values, not
//! undefined behavior; the orec protocol makes sure doomed values are never
//! used. Orderings are relaxed - callers insert the fences their protocol
//! contract requires.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Bytes per protected word.
pub const WORD_BYTES: usize = std::mem::size_of::<usize>();

/// Mask selecting the whole word.
pub const FULL_MASK: usize = usize::MAX;

/// Align `addr` down to its containing word.
#[inline]
pub const fn word_base(addr: usize) -> usize {
    addr & !(WORD_BYTES - 1)
}

/// Byte offset of `addr` within its word.
#[inline]
pub const fn word_offset(addr: usize) -> usize {
    addr & (WORD_BYTES - 1)
}

/// Mask covering `len` bytes starting `offset` bytes into a word.
#[inline]
pub fn subword_mask(offset: usize, len: usize) -> usize {
    debug_assert!(offset + len <= WORD_BYTES);
    let mut bytes = [0u8; WORD_BYTES];
    bytes[offset..offset + len].fill(0xFF);
    usize::from_ne_bytes(bytes)
}

// Position of the low `len` bytes of a u64 within its native byte layout.
#[inline]
const fn low_lane(len: usize) -> usize {
    if cfg!(target_endian = "little") {
        0
    } else {
        8 - len
    }
}

/// Position the low `len` bytes of `value` at byte `offset` of a word,
/// matching the memory layout of a direct `len`-byte store at that offset.
#[inline]
pub fn place_subword(value: u64, offset: usize, len: usize) -> usize {
    debug_assert!(offset + len <= WORD_BYTES);
    let src = value.to_ne_bytes();
    let lo = low_lane(len);
    let mut bytes = [0u8; WORD_BYTES];
    bytes[offset..offset + len].copy_from_slice(&src[lo..lo + len]);
    usize::from_ne_bytes(bytes)
}

/// Extract the `len`-byte value stored at byte `offset` of a word.
#[inline]
pub fn extract_subword(word: usize, offset: usize, len: usize) -> u64 {
    debug_assert!(offset + len <= WORD_BYTES);
    let lo = low_lane(len);
    let mut buf = [0u8; 8];
    buf[lo..lo + len].copy_from_slice(&word.to_ne_bytes()[offset..offset + len]);
    u64::from_ne_bytes(buf)
}

/// Overlay the masked bytes of `value` onto `current`.
#[inline]
pub const fn merge(current: usize, value: usize, mask: usize) -> usize {
    (current & !mask) | (value & mask)
}

/// Load the word at `addr`.
///
/// # Safety
///
/// `addr` must be word-aligned and point to live memory valid for the
/// duration of the enclosing transaction.
#[inline]
pub unsafe fn load_word(addr: usize) -> usize {
    debug_assert_eq!(word_offset(addr), 0);
    (*(addr as *const AtomicUsize)).load(Ordering::Relaxed)
}

/// Store `value` to the word at `addr` under `mask`.
///
/// A full-mask store is a single write; a partial mask reads, merges, and
/// rewrites, which the caller must protect with the owning orec.
///
/// # Safety
///
/// As [`load_word`], plus the caller must hold whatever ownership the
/// active protocol requires for writes to `addr`.
#[inline]
pub unsafe fn store_word(addr: usize, value: usize, mask: usize) {
    debug_assert_eq!(word_offset(addr), 0);
    let slot = &*(addr as *const AtomicUsize);
    if mask == FULL_MASK {
        slot.store(value, Ordering::Relaxed);
    } else {
        let merged = merge(slot.load(Ordering::Relaxed), value, mask);
        slot.store(merged, Ordering::Relaxed);
    }
}
