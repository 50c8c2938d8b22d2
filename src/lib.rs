#![doc = include_str!("../README.md")]
//! ## Operate .npy Files
//!
//! - Reading
//!   - [`ReadNpyExt`] extension trait
//!   - [`read_npy`] convenience function
//! - Writing
//!   - [`WriteNpyExt`] extension trait
//!   - [`write_npy`] convenience function
//! - Header text
//!   - [`parse_header`] and [`create_header`]
//!
//! ## Limitations
//!
//! - Only the `descr`, `fortran_order` and `shape` keys of the [header
//!   dictionary] are looked at. Each is matched on its own; a missing key
//!   falls back to its default, a malformed `shape` is an error.
//!
//! - `fortran_order` is stored and read back, but data is never transposed.
//!   Files are always written in C order.
//!
//! - The element traits ([`WritableElement`] and [`ReadableElement`]) are
//!   implemented for `f32`, `f64`, `i32`, `u32`, `i64`, `u64` and
//!   [`half::f16`], all little-endian.
//!
//! [header dictionary]: https://numpy.org/doc/stable/reference/generated/numpy.lib.format.html#format-version-1-0
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(missing_docs)]

mod array;
mod npy;

pub use crate::{
    array::{NpyArray, ShapeError},
    npy::{
        create_header, dtype_of, header, parse_header, read_npy, write_npy, Header,
        ParseHeaderError, ReadDataError, ReadNpyError, ReadNpyExt, ReadableElement,
        WritableElement, WriteDataError, WriteNpyError, WriteNpyExt,
    },
};
