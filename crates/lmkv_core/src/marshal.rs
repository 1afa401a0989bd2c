//! Conversion between typed values and LMDB byte views.
//!
//! Every key and value crosses the LMDB boundary as a [`ByteView`], a
//! borrowed `{pointer, length}` pair. A type takes part through one of three
//! conversion strategies, fixed per type and reported by its [`Kind`]:
//!
//! - **Record**: a fixed-layout value copied as its raw in-memory bytes.
//!   Opt in with `unsafe impl Record for T {}`.
//! - **Text**: `str` and `String`, as UTF-8 bytes.
//! - **Bytes**: `[u8]`, `Vec<u8>` and [`bytes::Bytes`].
//!
//! Encoding never copies. Decoding into a borrowed type (`&str`, `&[u8]`)
//! does not copy either; the result borrows memory owned by LMDB.

use crate::error::{CoreResult, Status};
use bytes::Bytes;
use lmdb_master_sys as ffi;
use std::marker::PhantomData;
use std::mem;
use std::ptr;
use std::slice;
use tracing::trace;

/// Conversion strategy of a marshaled type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Fixed-layout value stored as its raw bytes.
    Record,
    /// UTF-8 text.
    Text,
    /// Raw byte buffer.
    Bytes,
}

/// Non-owning view of bytes handed to or received from LMDB.
///
/// An empty view carries a null data pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteView<'a> {
    data: *const u8,
    len: usize,
    _marker: PhantomData<&'a [u8]>,
}

impl<'a> ByteView<'a> {
    /// Creates a view over a byte slice.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        if bytes.is_empty() {
            Self::empty()
        } else {
            Self {
                data: bytes.as_ptr(),
                len: bytes.len(),
                _marker: PhantomData,
            }
        }
    }

    /// Creates an empty view with a null data pointer.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            data: ptr::null(),
            len: 0,
            _marker: PhantomData,
        }
    }

    /// Returns the viewed bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        if self.data.is_null() {
            &[]
        } else {
            // SAFETY: a non-null view was built from a live slice of `len`
            // bytes borrowed for 'a.
            unsafe { slice::from_raw_parts(self.data, self.len) }
        }
    }

    /// Returns the data pointer; null for an empty view.
    #[must_use]
    pub const fn as_ptr(&self) -> *const u8 {
        self.data
    }

    /// Returns the number of bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the view is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn to_raw(self) -> ffi::MDB_val {
        ffi::MDB_val {
            mv_size: self.len,
            mv_data: self.data.cast_mut().cast(),
        }
    }

    /// Builds a view over memory described by an `MDB_val`.
    ///
    /// # Safety
    ///
    /// `val` must describe `mv_size` readable bytes that stay valid and
    /// unmodified for `'a`.
    pub(crate) unsafe fn from_raw(val: &ffi::MDB_val) -> Self {
        if val.mv_data.is_null() || val.mv_size == 0 {
            Self::empty()
        } else {
            Self {
                data: val.mv_data.cast::<u8>().cast_const(),
                len: val.mv_size,
                _marker: PhantomData,
            }
        }
    }
}

impl<'a> From<&'a [u8]> for ByteView<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::new(bytes)
    }
}

impl AsRef<[u8]> for ByteView<'_> {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Marker for fixed-layout types stored as their raw bytes.
///
/// # Safety
///
/// Implementors must have no padding bytes, no pointers or references, and
/// every bit pattern of `size_of::<Self>()` bytes must be a valid value.
pub unsafe trait Record: Copy + 'static {}

macro_rules! impl_record {
    ($($ty:ty),* $(,)?) => {
        $(unsafe impl Record for $ty {})*
    };
}

impl_record!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64);

unsafe impl<T: Record, const N: usize> Record for [T; N] {}

mod private {
    pub trait Sealed {}
}

impl<T: Record> private::Sealed for T {}
impl private::Sealed for str {}
impl private::Sealed for String {}
impl private::Sealed for [u8] {}
impl private::Sealed for Vec<u8> {}
impl private::Sealed for Bytes {}
impl private::Sealed for &str {}
impl private::Sealed for &[u8] {}

/// Types that can be written to LMDB as a key or value.
pub trait Encode: private::Sealed {
    /// Conversion strategy of this type.
    const KIND: Kind;

    /// Returns a view of the encoded bytes.
    fn encode(&self) -> ByteView<'_>;
}

/// Types that can be read back from an LMDB byte view.
///
/// `'a` is the lifetime of the memory behind the view, which lets `&str` and
/// `&[u8]` borrow it without copying.
pub trait Decode<'a>: private::Sealed + Sized {
    /// Conversion strategy of this type.
    const KIND: Kind;

    /// Decodes a value from a view.
    fn decode(view: ByteView<'a>) -> CoreResult<Self>;
}

impl<T: Record> Encode for T {
    const KIND: Kind = Kind::Record;

    fn encode(&self) -> ByteView<'_> {
        // SAFETY: `Record` types have no padding, so all
        // size_of::<T>() bytes behind `self` are initialized.
        let bytes =
            unsafe { slice::from_raw_parts((self as *const T).cast::<u8>(), mem::size_of::<T>()) };
        ByteView::new(bytes)
    }
}

impl<'a, T: Record> Decode<'a> for T {
    const KIND: Kind = Kind::Record;

    fn decode(view: ByteView<'a>) -> CoreResult<Self> {
        let bytes = view.as_bytes();
        if bytes.len() != mem::size_of::<T>() {
            trace!(
                expected = mem::size_of::<T>(),
                actual = bytes.len(),
                "record size mismatch"
            );
            return Err(Status::TYPE_MISMATCH);
        }
        // SAFETY: the length matches and `Record` accepts any bit pattern.
        Ok(unsafe { ptr::read_unaligned(bytes.as_ptr().cast::<T>()) })
    }
}

impl Encode for str {
    const KIND: Kind = Kind::Text;

    fn encode(&self) -> ByteView<'_> {
        ByteView::new(self.as_bytes())
    }
}

impl Encode for String {
    const KIND: Kind = Kind::Text;

    fn encode(&self) -> ByteView<'_> {
        ByteView::new(self.as_bytes())
    }
}

impl Encode for [u8] {
    const KIND: Kind = Kind::Bytes;

    fn encode(&self) -> ByteView<'_> {
        ByteView::new(self)
    }
}

impl Encode for Vec<u8> {
    const KIND: Kind = Kind::Bytes;

    fn encode(&self) -> ByteView<'_> {
        ByteView::new(self)
    }
}

impl Encode for Bytes {
    const KIND: Kind = Kind::Bytes;

    fn encode(&self) -> ByteView<'_> {
        ByteView::new(self)
    }
}

impl<'a> Decode<'a> for &'a str {
    const KIND: Kind = Kind::Text;

    fn decode(view: ByteView<'a>) -> CoreResult<Self> {
        std::str::from_utf8(view.as_bytes()).map_err(|_| Status::TYPE_MISMATCH)
    }
}

impl Decode<'_> for String {
    const KIND: Kind = Kind::Text;

    fn decode(view: ByteView<'_>) -> CoreResult<Self> {
        <&str>::decode(view).map(str::to_owned)
    }
}

impl<'a> Decode<'a> for &'a [u8] {
    const KIND: Kind = Kind::Bytes;

    fn decode(view: ByteView<'a>) -> CoreResult<Self> {
        Ok(view.as_bytes())
    }
}

impl Decode<'_> for Vec<u8> {
    const KIND: Kind = Kind::Bytes;

    fn decode(view: ByteView<'_>) -> CoreResult<Self> {
        Ok(view.as_bytes().to_vec())
    }
}

impl Decode<'_> for Bytes {
    const KIND: Kind = Kind::Bytes;

    fn decode(view: ByteView<'_>) -> CoreResult<Self> {
        Ok(Bytes::copy_from_slice(view.as_bytes()))
    }
}

/// Returns the conversion strategy of an encodable type.
#[must_use]
pub const fn kind_of<T: Encode + ?Sized>() -> Kind {
    T::KIND
}
