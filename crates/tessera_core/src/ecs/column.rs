//! # Component Columns
//!
//! Typed views over one component array inside a chunk.
//!
//! A column is the byte range `[offset, offset + size * len)` of a chunk,
//! read with a stride of `size`. Arrays are packed without padding, so an
//! element may sit at an address that is not aligned for its type; elements
//! are therefore read and written by value. [`Column::as_slice`] hands out a
//! borrowed `&[T]` only when the array happens to be aligned.

use std::marker::PhantomData;

use super::component::Component;

/// Read-only view over one component array.
///
/// # Example
///
/// ```rust,ignore
/// let column = chunk.column::<Position>().unwrap();
/// let sum: f32 = column.iter().map(|p| p.x).sum();
/// ```
#[derive(Clone, Copy)]
pub struct Column<'a, C: Component> {
    /// Bytes of the occupied rows.
    bytes: &'a [u8],
    /// Number of rows.
    len: usize,
    _phantom: PhantomData<C>,
}

impl<'a, C: Component> Column<'a, C> {
    pub(crate) fn new(bytes: &'a [u8], len: usize) -> Self {
        debug_assert_eq!(bytes.len(), len * std::mem::size_of::<C>());
        Self {
            bytes,
            len,
            _phantom: PhantomData,
        }
    }

    /// Returns the number of rows in the view.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Checks if the view is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads the component at `index`.
    ///
    /// # Returns
    ///
    /// The value, or None if index is out of bounds.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<C> {
        element::<C>(&*self.bytes, self.len, index).map(bytemuck::pod_read_unaligned::<C>)
    }

    /// Iterates over all values in row order.
    pub fn iter(&self) -> impl Iterator<Item = C> + 'a {
        let bytes = self.bytes;
        let len = self.len;
        (0..len).filter_map(move |i| element::<C>(bytes, len, i).map(bytemuck::pod_read_unaligned::<C>))
    }

    /// Borrows the array as a typed slice if its start is suitably aligned.
    #[must_use]
    pub fn as_slice(&self) -> Option<&'a [C]> {
        bytemuck::try_cast_slice(self.bytes).ok()
    }

    /// Returns the raw bytes of the array.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

/// Mutable view over one component array.
pub struct ColumnMut<'a, C: Component> {
    /// Bytes of the occupied rows.
    bytes: &'a mut [u8],
    /// Number of rows.
    len: usize,
    _phantom: PhantomData<C>,
}

impl<'a, C: Component> ColumnMut<'a, C> {
    pub(crate) fn new(bytes: &'a mut [u8], len: usize) -> Self {
        debug_assert_eq!(bytes.len(), len * std::mem::size_of::<C>());
        Self {
            bytes,
            len,
            _phantom: PhantomData,
        }
    }

    /// Returns the number of rows in the view.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Checks if the view is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads the component at `index`.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<C> {
        element::<C>(&*self.bytes, self.len, index).map(bytemuck::pod_read_unaligned::<C>)
    }

    /// Overwrites the component at `index`.
    ///
    /// # Returns
    ///
    /// `true` if the component was set, `false` if index was out of bounds.
    #[inline]
    pub fn set(&mut self, index: usize, value: C) -> bool {
        let size = std::mem::size_of::<C>();
        if index >= self.len {
            return false;
        }
        let start = index * size;
        self.bytes[start..start + size].copy_from_slice(bytemuck::bytes_of(&value));
        true
    }

    /// Applies `f` to every value in row order, writing the result back.
    pub fn update(&mut self, mut f: impl FnMut(&mut C)) {
        for index in 0..self.len {
            if let Some(mut value) = self.get(index) {
                f(&mut value);
                self.set(index, value);
            }
        }
    }

    /// Borrows the array as a mutable typed slice if its start is suitably aligned.
    pub fn as_mut_slice(&mut self) -> Option<&mut [C]> {
        bytemuck::try_cast_slice_mut(&mut *self.bytes).ok()
    }

    /// Downgrades to a read-only view.
    #[must_use]
    pub fn as_column(&self) -> Column<'_, C> {
        Column::new(&*self.bytes, self.len)
    }
}

/// Bytes of element `index`, stride `size_of::<C>()`.
#[inline]
fn element<C: Component>(bytes: &[u8], len: usize, index: usize) -> Option<&[u8]> {
    if index >= len {
        return None;
    }
    let size = std::mem::size_of::<C>();
    let start = index * size;
    bytes.get(start..start + size)
}
