//! `.npy` preamble: magic string, version, `HEADER_LEN` and the array format
//! dictionary.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{error::Error, fmt, io, str::FromStr};

/// Magic string to indicate npy format.
pub const MAGIC_STRING: &[u8] = b"\x93NUMPY";

/// The total header length (including magic string, version number, header
/// length value, array format description, padding, and final newline) must be
/// evenly divisible by this value.
pub const HEADER_DIVISOR: usize = 16;

#[allow(clippy::unwrap_used)]
static DESCR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"'descr':\s*'([^']+)'").unwrap());
#[allow(clippy::unwrap_used)]
static FORTRAN_ORDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"'fortran_order':\s*(True|False)").unwrap());
#[allow(clippy::unwrap_used)]
static SHAPE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"'shape':\s*\(([^)]*)\)").unwrap());

/// An error parsing the header of a `.npy` file.
#[derive(Debug)]
pub enum ParseHeaderError {
    /// The start of the file does not match the magic string.
    MagicString,
    /// Indicates that the `HEADER_LEN` doesn't fit in `usize`.
    HeaderLengthOverflow(u32),
    /// A dimension of the `shape` tuple is not a non-negative decimal integer.
    IllegalShape(String),
}

impl Error for ParseHeaderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MagicString => None,
            Self::HeaderLengthOverflow(_) => None,
            Self::IllegalShape(_) => None,
        }
    }
}

impl fmt::Display for ParseHeaderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MagicString => write!(f, "start does not match magic string"),
            Self::HeaderLengthOverflow(len) => write!(f, "HEADER_LEN {len} does not fit in `usize`"),
            Self::IllegalShape(token) => write!(f, "illegal dimension in shape: {token:?}"),
        }
    }
}

/// An error reading the preamble of a `.npy` file.
#[derive(Debug)]
pub enum ReadHeaderError {
    /// An error caused by I/O.
    Io(io::Error),
    /// An error parsing the header.
    Parse(ParseHeaderError),
}

impl Error for ReadHeaderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
        }
    }
}

impl fmt::Display for ReadHeaderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {}", err),
            Self::Parse(err) => write!(f, "error parsing header: {}", err),
        }
    }
}

impl From<io::Error> for ReadHeaderError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ParseHeaderError> for ReadHeaderError {
    fn from(err: ParseHeaderError) -> Self {
        Self::Parse(err)
    }
}

/// Width of the `HEADER_LEN` field.
///
/// Major version 1 stores it in two bytes, every later version in four.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Version {
    V1_0,
    V2_0,
}

impl Version {
    /// Number of bytes taken up by version number (1 byte for major version, 1
    /// byte for minor version).
    const VERSION_NUM_BYTES: usize = 2;

    fn from_major(major: u8) -> Self {
        if major == 1 {
            Version::V1_0
        } else {
            Version::V2_0
        }
    }

    /// Major version number.
    const fn major_version(self) -> u8 {
        match self {
            Version::V1_0 => 1,
            Version::V2_0 => 2,
        }
    }

    /// Number of bytes in representation of header length.
    const fn header_len_num_bytes(self) -> usize {
        match self {
            Version::V1_0 => 2,
            Version::V2_0 => 4,
        }
    }

    /// Read header length.
    fn read_header_len<R: io::Read>(self, mut reader: R) -> Result<usize, ReadHeaderError> {
        match self {
            Version::V1_0 => Ok(usize::from(reader.read_u16::<LittleEndian>()?)),
            Version::V2_0 => {
                let header_len: u32 = reader.read_u32::<LittleEndian>()?;
                Ok(usize::try_from(header_len)
                    .map_err(|_| ParseHeaderError::HeaderLengthOverflow(header_len))?)
            }
        }
    }

    /// Format header length as bytes for writing to file.
    ///
    /// Returns `None` if the value of `header_len` is too large for this .npy
    /// version.
    fn format_header_len(self, header_len: usize) -> Option<Vec<u8>> {
        let mut out = vec![0; self.header_len_num_bytes()];
        match self {
            Version::V1_0 => LittleEndian::write_u16(&mut out, u16::try_from(header_len).ok()?),
            Version::V2_0 => LittleEndian::write_u32(&mut out, u32::try_from(header_len).ok()?),
        }
        Some(out)
    }

    /// Computes the padded `HEADER_LEN` value and its formatted bytes for
    /// this version.
    ///
    /// Returns `None` if the value of `HEADER_LEN` is too large for this .npy
    /// version.
    fn compute_lengths(self, unpadded_arr_format: &[u8]) -> Option<HeaderLengthInfo> {
        let prefix_len =
            MAGIC_STRING.len() + Version::VERSION_NUM_BYTES + self.header_len_num_bytes();
        let padding_len = padding_len(prefix_len, unpadded_arr_format.len());
        let header_len = unpadded_arr_format
            .len()
            .checked_add(padding_len)?
            .checked_add(NEWLINE_LEN)?;
        let formatted_header_len = self.format_header_len(header_len)?;
        Some(HeaderLengthInfo { prefix_len, header_len, formatted_header_len })
    }
}

/// Length of a '\n' char in bytes.
const NEWLINE_LEN: usize = b"\n".len();

/// Number of spaces inserted between the array format string and the final
/// newline so that the whole preamble is a multiple of [`HEADER_DIVISOR`].
pub(crate) fn padding_len(prefix_len: usize, arr_format_len: usize) -> usize {
    let unpadded = (prefix_len + arr_format_len + NEWLINE_LEN) % HEADER_DIVISOR;
    (HEADER_DIVISOR - unpadded) % HEADER_DIVISOR
}

struct HeaderLengthInfo {
    /// Magic string, version number and `HEADER_LEN` field.
    prefix_len: usize,
    /// Array format description, padding, and final newline.
    header_len: usize,
    /// Formatted `HEADER_LEN` value.
    formatted_header_len: Vec<u8>,
}

/// An error formatting the preamble of a `.npy` file.
#[derive(Debug)]
pub enum FormatHeaderError {
    /// `HEADER_LEN` exceeds the maximum encodable value.
    HeaderTooLong,
}

impl Error for FormatHeaderError {}

impl fmt::Display for FormatHeaderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::HeaderTooLong => write!(f, "the header is too long"),
        }
    }
}

/// An error writing the preamble of a `.npy` file.
#[derive(Debug)]
pub enum WriteHeaderError {
    /// An error caused by I/O.
    Io(io::Error),
    /// An error formatting the header.
    Format(FormatHeaderError),
}

impl Error for WriteHeaderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Format(err) => Some(err),
        }
    }
}

impl fmt::Display for WriteHeaderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Format(err) => write!(f, "error formatting header: {err}"),
        }
    }
}

impl From<io::Error> for WriteHeaderError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<FormatHeaderError> for WriteHeaderError {
    fn from(err: FormatHeaderError) -> Self {
        Self::Format(err)
    }
}

/// The metadata dictionary stored in front of the array data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    /// Type descriptor, e.g. `<f4`. Empty if the dictionary has no `descr`.
    pub dtype: String,
    /// Stored and round-tripped only; data is never transposed.
    pub fortran_order: bool,
    /// Axis lengths. Empty for a scalar.
    pub shape: Vec<usize>,
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{'descr': '{}', 'fortran_order': ", self.dtype)?;
        f.write_str(if self.fortran_order { "True" } else { "False" })?;
        f.write_str(", 'shape': (")?;
        for (i, len) in self.shape.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{len}")?;
        }
        if self.shape.len() == 1 {
            f.write_str(",")?;
        }
        f.write_str("), }")
    }
}

impl FromStr for Header {
    type Err = ParseHeaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_header(s)
    }
}

/// Parses the array format string of a `.npy` header.
///
/// Each of `descr`, `fortran_order` and `shape` is looked up on its own. A
/// missing key leaves the [`Default`] value in place; only a malformed
/// `shape` dimension is an error.
pub fn parse_header(text: &str) -> Result<Header, ParseHeaderError> {
    let mut header = Header::default();
    if let Some(dtype) = parse_descr(text) {
        header.dtype = dtype.to_owned();
    }
    if let Some(fortran_order) = parse_fortran_order(text) {
        header.fortran_order = fortran_order;
    }
    if let Some(shape) = parse_shape(text)? {
        header.shape = shape;
    }
    Ok(header)
}

/// Formats the array format string of a `.npy` header, without padding or
/// the final newline.
///
/// A single dimension keeps the trailing comma of a Python one-tuple, so
/// `[7]` becomes `(7,)`.
pub fn create_header(dtype: &str, shape: &[usize], fortran_order: bool) -> String {
    Header { dtype: dtype.to_owned(), fortran_order, shape: shape.to_vec() }.to_string()
}

fn parse_descr(text: &str) -> Option<&str> {
    Some(DESCR_RE.captures(text)?.get(1)?.as_str())
}

fn parse_fortran_order(text: &str) -> Option<bool> {
    Some(FORTRAN_ORDER_RE.captures(text)?.get(1)?.as_str() == "True")
}

fn parse_shape(text: &str) -> Result<Option<Vec<usize>>, ParseHeaderError> {
    let Some(inner) = SHAPE_RE.captures(text).and_then(|caps| caps.get(1)) else {
        return Ok(None);
    };
    inner
        .as_str()
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            if !token.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ParseHeaderError::IllegalShape(token.to_owned()));
            }
            token.parse::<usize>().map_err(|_| ParseHeaderError::IllegalShape(token.to_owned()))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

impl Header {
    /// Number of elements described by the shape, or `None` on overflow.
    pub fn num_elements(&self) -> Option<usize> {
        self.shape.iter().try_fold(1usize, |acc, &len| acc.checked_mul(len))
    }

    pub(crate) fn from_reader<R: io::Read>(mut reader: R) -> Result<Self, ReadHeaderError> {
        // Check for magic string
        {
            let mut buf = [0; MAGIC_STRING.len()];
            reader.read_exact(&mut buf)?;
            if buf != MAGIC_STRING {
                return Err(ParseHeaderError::MagicString.into());
            }
        }

        // Get version number; only the major number selects the layout
        let mut buf = [0; Version::VERSION_NUM_BYTES];
        reader.read_exact(&mut buf)?;
        let [major, minor] = buf;
        let version = Version::from_major(major);

        // Get `HEADER_LEN`
        let header_len = version.read_header_len(&mut reader)?;

        // Only the three keys are matched, so stray non-UTF-8 bytes elsewhere
        // are replaced rather than rejected.
        let buf = super::read_to_vec_exact(&mut reader, header_len)?;
        let header = parse_header(&String::from_utf8_lossy(&buf))?;
        log::debug!("read .npy header v{major}.{minor} ({header_len} bytes): {header}");
        Ok(header)
    }

    fn to_bytes(&self) -> Result<Vec<u8>, FormatHeaderError> {
        let arr_format = self.to_string().into_bytes();

        // Version 1.0 unless `HEADER_LEN` does not fit in two bytes
        let (version, length_info) = [Version::V1_0, Version::V2_0]
            .iter()
            .find_map(|&version| Some((version, version.compute_lengths(&arr_format)?)))
            .ok_or(FormatHeaderError::HeaderTooLong)?;
        let total_len = length_info.prefix_len + length_info.header_len;

        let mut out = Vec::with_capacity(total_len);
        out.extend_from_slice(MAGIC_STRING);
        out.push(version.major_version());
        out.push(0);
        out.extend_from_slice(&length_info.formatted_header_len);
        out.extend_from_slice(&arr_format);
        out.resize(total_len - NEWLINE_LEN, b' ');
        out.push(b'\n');

        debug_assert_eq!(out.len() % HEADER_DIVISOR, 0);
        Ok(out)
    }

    pub(crate) fn write<W: io::Write>(&self, mut writer: W) -> Result<(), WriteHeaderError> {
        let bytes = self.to_bytes()?;
        log::debug!("writing .npy header ({} bytes): {}", bytes.len(), self);
        writer.write_all(&bytes)?;
        Ok(())
    }
}
