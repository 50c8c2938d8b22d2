use crate::{
    npy::header::Header, ReadNpyError, ReadNpyExt, ReadableElement, WritableElement,
    WriteNpyError, WriteNpyExt,
};
use num_traits::Zero;
use std::{
    io, mem,
    ops::{Index, IndexMut},
};
use thiserror::Error;

/// The buffer length does not match the number of elements of the shape.
#[derive(Debug, Error)]
#[error("shape {shape:?} holds {expected} elements, got {actual}")]
pub struct ShapeError {
    /// The requested shape.
    pub shape: Vec<usize>,
    /// Product of the axis lengths, `usize::MAX` on overflow.
    pub expected: usize,
    /// Length of the supplied buffer.
    pub actual: usize,
}

/// An owned, row-major array of one element type.
///
/// The buffer always holds exactly the product of the axis lengths (1 for a
/// scalar).
#[derive(Clone, Debug, PartialEq)]
pub struct NpyArray<A> {
    data: Vec<A>,
    shape: Vec<usize>,
}

impl<A> NpyArray<A> {
    /// Creates a zero-filled array.
    ///
    /// # Panics
    ///
    /// Panics if the number of elements overflows `usize`.
    pub fn zeros(shape: Vec<usize>) -> Self
    where
        A: Zero + Clone,
    {
        let len = shape.iter().try_fold(1usize, |acc, &len| acc.checked_mul(len));
        let len = len.expect("overflow computing number of elements");
        Self { data: vec![A::zero(); len], shape }
    }

    /// Wraps `data` as an array of the given shape.
    pub fn from_shape_vec(shape: Vec<usize>, data: Vec<A>) -> Result<Self, ShapeError> {
        match shape.iter().try_fold(1usize, |acc, &len| acc.checked_mul(len)) {
            Some(expected) if expected == data.len() => Ok(Self { data, shape }),
            expected => Err(ShapeError {
                expected: expected.unwrap_or(usize::MAX),
                actual: data.len(),
                shape,
            }),
        }
    }

    /// Axis lengths.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat buffer in row-major order.
    pub fn as_slice(&self) -> &[A] {
        &self.data
    }

    /// Mutable flat buffer in row-major order.
    pub fn as_mut_slice(&mut self) -> &mut [A] {
        &mut self.data
    }

    /// Returns the flat buffer and the shape.
    pub fn into_raw_parts(self) -> (Vec<A>, Vec<usize>) {
        (self.data, self.shape)
    }
}

impl<A> Index<usize> for NpyArray<A> {
    type Output = A;

    fn index(&self, index: usize) -> &A {
        &self.data[index]
    }
}

impl<A> IndexMut<usize> for NpyArray<A> {
    fn index_mut(&mut self, index: usize) -> &mut A {
        &mut self.data[index]
    }
}

impl<A> WriteNpyExt for NpyArray<A>
where
    A: WritableElement,
{
    fn write_npy<W: io::Write>(&self, mut writer: W) -> Result<(), WriteNpyError> {
        Header {
            dtype: A::TYPE_DESCRIPTOR.to_owned(),
            fortran_order: false,
            shape: self.shape.clone(),
        }
        .write(&mut writer)?;
        log::trace!("writing {} bytes of array data", self.data.len() * mem::size_of::<A>());
        A::write_slice(&self.data, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

impl<A> ReadNpyExt for NpyArray<A>
where
    A: ReadableElement,
{
    fn read_npy<R: io::Read>(mut reader: R) -> Result<Self, ReadNpyError> {
        let header = Header::from_reader(&mut reader)?;
        let len = shape_length_checked::<A>(&header).ok_or(ReadNpyError::LengthOverflow)?;
        log::trace!("reading {} bytes of array data", len * mem::size_of::<A>());
        let data = A::read_exact_vec(&mut reader, &header.dtype, len)?;
        Ok(Self { data, shape: header.shape })
    }
}

/// Computes the length associated with the shape (i.e. the product of the axis
/// lengths), where the element type is `A`.
///
/// Returns `None` if the number of elements or the length in bytes would
/// overflow `isize`.
fn shape_length_checked<A>(header: &Header) -> Option<usize> {
    const MAX: usize = isize::MAX as usize;
    let len = header.num_elements()?;
    (len.checked_mul(mem::size_of::<A>())? < MAX).then_some(len)
}
