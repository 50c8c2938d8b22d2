mod elements;
pub mod header;

pub use self::header::{create_header, parse_header, Header, ParseHeaderError};
use self::header::{FormatHeaderError, ReadHeaderError, WriteHeaderError};
use std::{
    fs,
    io::{self, Read as _},
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Read an `.npy` file located at the specified path.
///
/// This is a convience function for using `File::open` followed by
/// [`ReadNpyExt::read_npy`].
///
/// # Example
///
/// ```no_run
/// use npyio::{read_npy, NpyArray};
/// # use npyio::ReadNpyError;
///
/// let arr: NpyArray<f32> = read_npy("activations.npy")?;
/// println!("shape = {:?}", arr.shape());
/// # Ok::<_, ReadNpyError>(())
/// ```
pub fn read_npy<P, T>(path: P) -> Result<T, ReadNpyError>
where
    P: AsRef<Path>,
    T: ReadNpyExt,
{
    let path = path.as_ref();
    let file = fs::File::open(path)
        .map_err(|source| ReadNpyError::Open { path: path.to_owned(), source })?;
    T::read_npy(io::BufReader::new(file))
}

/// Writes an array to an `.npy` file at the specified path.
///
/// This function will create the file if it does not exist, or overwrite it if
/// it does. A failed write may leave a truncated file behind.
///
/// This is a convenience function for `BufWriter::new(File::create(path)?)`
/// followed by [`WriteNpyExt::write_npy`].
///
/// # Example
///
/// ```no_run
/// use npyio::{write_npy, NpyArray};
/// # use npyio::WriteNpyError;
///
/// let arr = NpyArray::from_shape_vec(vec![2, 3], vec![1i64, 2, 3, 4, 5, 6]).unwrap();
/// write_npy("array.npy", &arr)?;
/// # Ok::<_, WriteNpyError>(())
/// ```
pub fn write_npy<P, T>(path: P, array: &T) -> Result<(), WriteNpyError>
where
    P: AsRef<Path>,
    T: WriteNpyExt + ?Sized,
{
    let path = path.as_ref();
    let file = fs::File::create(path)
        .map_err(|source| WriteNpyError::Create { path: path.to_owned(), source })?;
    array.write_npy(io::BufWriter::new(file))
}

/// Upper bound on the buffer reserved before any data has arrived.
const INITIAL_CAPACITY: usize = 64 * 1024;

/// Reads exactly `len` bytes, growing the buffer only as data arrives so a
/// header declaring a huge length cannot force a huge allocation.
///
/// Fails with `UnexpectedEof` if the reader ends early.
pub(crate) fn read_to_vec_exact<R: io::Read>(reader: R, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(len.min(INITIAL_CAPACITY));
    reader
        .take(u64::try_from(len).unwrap_or(u64::MAX))
        .read_to_end(&mut buf)?;
    if buf.len() < len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {len} bytes, got {}", buf.len()),
        ));
    }
    Ok(buf)
}

/// Returns the `descr` tag written for element type `A`.
pub fn dtype_of<A: WritableElement>() -> &'static str {
    A::TYPE_DESCRIPTOR
}

/// An array element type that can be written to an `.npy` file.
///
/// Implemented for `f32`, `f64`, `i32`, `u32`, `i64`, `u64` and
/// [`half::f16`]. Data is always stored little-endian.
pub trait WritableElement: Sized {
    /// Descriptor of the type used in the header, e.g. `<f4`.
    const TYPE_DESCRIPTOR: &'static str;

    /// Writes a slice of `Self` to the writer.
    fn write_slice<W: io::Write>(slice: &[Self], writer: W) -> Result<(), WriteDataError>;
}

/// Extension trait for writing an array to `.npy` files.
///
/// This method calls [`io::Write::flush()`] on the writer before returning.
pub trait WriteNpyExt {
    /// Writes the array to `writer` in [`.npy`
    /// format](https://numpy.org/doc/stable/reference/generated/numpy.lib.format.html).
    fn write_npy<W: io::Write>(&self, writer: W) -> Result<(), WriteNpyError>;
}

/// An error writing array data.
#[derive(Debug, Error)]
pub enum WriteDataError {
    /// An error caused by I/O.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// An error writing a `.npy` file.
#[derive(Debug, Error)]
pub enum WriteNpyError {
    /// The output file could not be created.
    #[error("cannot create {}: {source}", .path.display())]
    Create {
        /// Path passed to [`write_npy`].
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// An error caused by I/O.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// An error formatting the header.
    #[error("error formatting header: {0}")]
    FormatHeader(#[from] FormatHeaderError),
}

impl From<WriteHeaderError> for WriteNpyError {
    fn from(err: WriteHeaderError) -> Self {
        match err {
            WriteHeaderError::Io(err) => Self::Io(err),
            WriteHeaderError::Format(err) => Self::FormatHeader(err),
        }
    }
}

impl From<WriteDataError> for WriteNpyError {
    fn from(err: WriteDataError) -> Self {
        match err {
            WriteDataError::Io(err) => Self::Io(err),
        }
    }
}

/// An array element type that can be read from an `.npy` file.
pub trait ReadableElement: WritableElement {
    /// Reads exactly `len` elements from `reader`.
    ///
    /// Returns `Err(_)` if `type_desc` is non-empty and differs from
    /// [`WritableElement::TYPE_DESCRIPTOR`], or if the `reader` has fewer
    /// elements than `len`. Bytes after the last element are left unread.
    fn read_exact_vec<R: io::Read>(
        reader: R,
        type_desc: &str,
        len: usize,
    ) -> Result<Vec<Self>, ReadDataError>;
}

/// Extension trait for reading an array from `.npy` files.
///
/// # Example
///
/// ```no_run
/// use npyio::{NpyArray, ReadNpyExt};
/// use std::fs::File;
/// # use npyio::ReadNpyError;
///
/// let reader = File::open("array.npy")?;
/// let arr = NpyArray::<i32>::read_npy(reader)?;
/// # Ok::<_, ReadNpyError>(())
/// ```
pub trait ReadNpyExt: Sized {
    /// Reads the array from `reader` in [`.npy`
    /// format](https://numpy.org/doc/stable/reference/generated/numpy.lib.format.html).
    fn read_npy<R: io::Read>(reader: R) -> Result<Self, ReadNpyError>;
}

/// An error reading array data.
#[derive(Debug, Error)]
pub enum ReadDataError {
    /// An error caused by I/O.
    #[error("I/O error: {0}")]
    Io(io::Error),
    /// The type descriptor does not match the element type.
    #[error("incorrect descriptor {found:?} for this type, expected {expected:?}")]
    WrongDescriptor {
        /// Descriptor of the requested element type.
        expected: &'static str,
        /// Descriptor found in the header.
        found: String,
    },
    /// The file does not contain all the data described in the header.
    #[error("reached EOF before reading all data")]
    MissingData,
}

impl From<io::Error> for ReadDataError {
    /// Performs the conversion.
    ///
    /// If the error kind is `UnexpectedEof`, the `MissingData` variant is
    /// returned. Otherwise, the `Io` variant is returned.
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Self::MissingData,
            _ => Self::Io(err),
        }
    }
}

/// An error reading a `.npy` file.
#[derive(Debug, Error)]
pub enum ReadNpyError {
    /// The input file could not be opened.
    #[error("cannot open {}: {source}", .path.display())]
    Open {
        /// Path passed to [`read_npy`].
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// An error caused by I/O.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// An error parsing the file header.
    #[error("error parsing header: {0}")]
    ParseHeader(#[from] ParseHeaderError),
    /// Overflow while computing the length of the array (in units of bytes or
    /// the number of elements) from the shape described in the file header.
    #[error("overflow computing length from shape")]
    LengthOverflow,
    /// The type descriptor does not match the element type.
    #[error("incorrect descriptor {found:?} for this type, expected {expected:?}")]
    WrongDescriptor {
        /// Descriptor of the requested element type.
        expected: &'static str,
        /// Descriptor found in the header.
        found: String,
    },
    /// The file does not contain all the data described in the header.
    #[error("reached EOF before reading all data")]
    MissingData,
}

impl From<ReadHeaderError> for ReadNpyError {
    fn from(err: ReadHeaderError) -> Self {
        match err {
            ReadHeaderError::Io(err) => Self::Io(err),
            ReadHeaderError::Parse(err) => Self::ParseHeader(err),
        }
    }
}

impl From<ReadDataError> for ReadNpyError {
    fn from(err: ReadDataError) -> Self {
        match err {
            ReadDataError::Io(err) => Self::Io(err),
            ReadDataError::WrongDescriptor { expected, found } => {
                Self::WrongDescriptor { expected, found }
            }
            ReadDataError::MissingData => Self::MissingData,
        }
    }
}
