use super::{read_to_vec_exact, ReadDataError, ReadableElement, WritableElement, WriteDataError};
use byteorder::{ByteOrder, LittleEndian};
use half::f16;
use std::{io, mem};

/// Number of elements encoded per `write_all` call.
const CHUNK_LEN: usize = 1024;

/// Fails unless `type_desc` is empty (no `descr` in the header) or names `A`.
fn check_descriptor<A: WritableElement>(type_desc: &str) -> Result<(), ReadDataError> {
    if type_desc.is_empty() || type_desc == A::TYPE_DESCRIPTOR {
        Ok(())
    } else {
        Err(ReadDataError::WrongDescriptor {
            expected: A::TYPE_DESCRIPTOR,
            found: type_desc.to_owned(),
        })
    }
}

/// Reads the raw bytes of `len` elements of `A`.
fn read_elem_bytes<A, R: io::Read>(reader: R, len: usize) -> Result<Vec<u8>, ReadDataError> {
    let nbytes = len.checked_mul(mem::size_of::<A>()).ok_or(ReadDataError::MissingData)?;
    Ok(read_to_vec_exact(reader, nbytes)?)
}

macro_rules! impl_primitive {
    ($elem:ty, $desc:literal, $read_into:ident, $write_into:ident) => {
        impl WritableElement for $elem {
            const TYPE_DESCRIPTOR: &'static str = $desc;

            fn write_slice<W: io::Write>(slice: &[Self], mut writer: W) -> Result<(), WriteDataError> {
                let mut buf = [0; CHUNK_LEN * mem::size_of::<$elem>()];
                for chunk in slice.chunks(CHUNK_LEN) {
                    let bytes = &mut buf[..chunk.len() * mem::size_of::<$elem>()];
                    LittleEndian::$write_into(chunk, bytes);
                    writer.write_all(bytes)?;
                }
                Ok(())
            }
        }

        impl ReadableElement for $elem {
            fn read_exact_vec<R: io::Read>(
                reader: R,
                type_desc: &str,
                len: usize,
            ) -> Result<Vec<Self>, ReadDataError> {
                check_descriptor::<Self>(type_desc)?;
                let bytes = read_elem_bytes::<Self, _>(reader, len)?;
                let mut out = vec![<$elem>::default(); len];
                LittleEndian::$read_into(&bytes, &mut out);
                Ok(out)
            }
        }
    };
}

impl_primitive!(f32, "<f4", read_f32_into, write_f32_into);
impl_primitive!(f64, "<f8", read_f64_into, write_f64_into);
impl_primitive!(i32, "<i4", read_i32_into, write_i32_into);
impl_primitive!(u32, "<u4", read_u32_into, write_u32_into);
impl_primitive!(i64, "<i8", read_i64_into, write_i64_into);
impl_primitive!(u64, "<u8", read_u64_into, write_u64_into);

// Half floats travel as their raw `u16` bits.
impl WritableElement for f16 {
    const TYPE_DESCRIPTOR: &'static str = "<f2";

    fn write_slice<W: io::Write>(slice: &[Self], mut writer: W) -> Result<(), WriteDataError> {
        let mut bits = [0u16; CHUNK_LEN];
        let mut buf = [0; CHUNK_LEN * mem::size_of::<u16>()];
        for chunk in slice.chunks(CHUNK_LEN) {
            let bits = &mut bits[..chunk.len()];
            for (dst, src) in bits.iter_mut().zip(chunk) {
                *dst = src.to_bits();
            }
            let bytes = &mut buf[..chunk.len() * mem::size_of::<u16>()];
            LittleEndian::write_u16_into(bits, bytes);
            writer.write_all(bytes)?;
        }
        Ok(())
    }
}

impl ReadableElement for f16 {
    fn read_exact_vec<R: io::Read>(
        reader: R,
        type_desc: &str,
        len: usize,
    ) -> Result<Vec<Self>, ReadDataError> {
        check_descriptor::<Self>(type_desc)?;
        let bytes = read_elem_bytes::<Self, _>(reader, len)?;
        let mut bits = vec![0u16; len];
        LittleEndian::read_u16_into(&bytes, &mut bits);
        Ok(bits.into_iter().map(f16::from_bits).collect())
    }
}
