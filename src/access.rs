//! The read/write width family.
//!
//! Every primitive width is lowered onto the word-granular protocol
//! operations: a narrower access reads or writes the containing word under
//! a byte mask, so sub-word updates by different transactions to the same
//! word still conflict-check through one orec and merge correctly in the
//! redo log. Naturally aligned primitives never straddle a word; the bulk
//! helpers loop bytes and accept any alignment.

use weft_core::word;
use weft_core::Result;

use crate::thread::Txn;

macro_rules! subword_accessors {
    ($read:ident, $write:ident, $ty:ty) => {
        /// Transactional load of a naturally aligned value.
        ///
        /// # Safety
        ///
        /// See [`crate::TxThread::read_word`].
        pub unsafe fn $read(&mut self, addr: *const $ty) -> Result<$ty> {
            let a = addr as usize;
            let len = std::mem::size_of::<$ty>();
            debug_assert_eq!(a % len, 0, "unaligned transactional access");
            let w = self.th.raw_read(word::word_base(a))?;
            Ok(word::extract_subword(w, word::word_offset(a), len) as $ty)
        }

        /// Transactional store of a naturally aligned value.
        ///
        /// # Safety
        ///
        /// See [`crate::TxThread::write_word_masked`].
        pub unsafe fn $write(&mut self, addr: *mut $ty, val: $ty) -> Result<()> {
            let a = addr as usize;
            let len = std::mem::size_of::<$ty>();
            debug_assert_eq!(a % len, 0, "unaligned transactional access");
            let off = word::word_offset(a);
            self.th.raw_write(
                word::word_base(a),
                word::place_subword(val as u64, off, len),
                word::subword_mask(off, len),
            )
        }
    };
}

impl Txn<'_> {
    subword_accessors!(read_u8, write_u8, u8);
    subword_accessors!(read_u16, write_u16, u16);
    subword_accessors!(read_u32, write_u32, u32);

    /// Transactional load of an aligned `u64`.
    ///
    /// # Safety
    ///
    /// See [`crate::TxThread::read_word`].
    pub unsafe fn read_u64(&mut self, addr: *const u64) -> Result<u64> {
        let a = addr as usize;
        debug_assert_eq!(a % std::mem::size_of::<u64>(), 0);
        #[cfg(target_pointer_width = "64")]
        {
            Ok(self.th.raw_read(a)? as u64)
        }
        #[cfg(target_pointer_width = "32")]
        {
            // An aligned u64 spans exactly two full words.
            let lo = self.th.raw_read(a)?;
            let hi = self.th.raw_read(a + word::WORD_BYTES)?;
            let mut buf = [0u8; 8];
            buf[..4].copy_from_slice(&lo.to_ne_bytes());
            buf[4..].copy_from_slice(&hi.to_ne_bytes());
            Ok(u64::from_ne_bytes(buf))
        }
    }

    /// Transactional store of an aligned `u64`.
    ///
    /// # Safety
    ///
    /// See [`crate::TxThread::write_word_masked`].
    pub unsafe fn write_u64(&mut self, addr: *mut u64, val: u64) -> Result<()> {
        let a = addr as usize;
        debug_assert_eq!(a % std::mem::size_of::<u64>(), 0);
        #[cfg(target_pointer_width = "64")]
        {
            self.th.raw_write(a, val as usize, word::FULL_MASK)
        }
        #[cfg(target_pointer_width = "32")]
        {
            let bytes = val.to_ne_bytes();
            let mut lo = [0u8; 4];
            let mut hi = [0u8; 4];
            lo.copy_from_slice(&bytes[..4]);
            hi.copy_from_slice(&bytes[4..]);
            self.th
                .raw_write(a, usize::from_ne_bytes(lo), word::FULL_MASK)?;
            self.th
                .raw_write(a + word::WORD_BYTES, usize::from_ne_bytes(hi), word::FULL_MASK)
        }
    }

    /// Transactional load of an aligned pointer-sized value.
    ///
    /// # Safety
    ///
    /// See [`crate::TxThread::read_word`].
    pub unsafe fn read_usize(&mut self, addr: *const usize) -> Result<usize> {
        self.read_word(addr)
    }

    /// Transactional store of an aligned pointer-sized value.
    ///
    /// # Safety
    ///
    /// See [`crate::TxThread::write_word_masked`].
    pub unsafe fn write_usize(&mut self, addr: *mut usize, val: usize) -> Result<()> {
        self.write_word(addr, val)
    }

    /// Transactional `memcpy` over non-overlapping byte ranges.
    ///
    /// # Safety
    ///
    /// Both ranges must stay valid for the transaction; see
    /// [`crate::TxThread::read_word`].
    pub unsafe fn memcpy(&mut self, dest: *mut u8, src: *const u8, n: usize) -> Result<()> {
        for i in 0..n {
            let byte = self.read_u8(src.add(i))?;
            self.write_u8(dest.add(i), byte)?;
        }
        Ok(())
    }

    /// Transactional `memmove`: like [`Txn::memcpy`] but overlap-safe.
    ///
    /// # Safety
    ///
    /// See [`Txn::memcpy`].
    pub unsafe fn memmove(&mut self, dest: *mut u8, src: *const u8, n: usize) -> Result<()> {
        let d = dest as usize;
        let s = src as usize;
        if d > s && d < s + n {
            // Forward overlap: copy backwards so sources are read before
            // they are clobbered.
            for i in (0..n).rev() {
                let byte = self.read_u8(src.add(i))?;
                self.write_u8(dest.add(i), byte)?;
            }
            return Ok(());
        }
        self.memcpy(dest, src, n)
    }

    /// Transactional `memset`.
    ///
    /// # Safety
    ///
    /// See [`Txn::memcpy`].
    pub unsafe fn memset(&mut self, dest: *mut u8, byte: u8, n: usize) -> Result<()> {
        for i in 0..n {
            self.write_u8(dest.add(i), byte)?;
        }
        Ok(())
    }
}
