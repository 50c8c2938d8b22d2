//! Round trips through files on disk.

use half::f16;
use npyio::{
    create_header, dtype_of, header::MAGIC_STRING, read_npy, write_npy, NpyArray,
    ParseHeaderError, ReadNpyError, ReadNpyExt, WriteNpyError, WriteNpyExt,
};
use std::{fs, io::Cursor};

fn header_len(bytes: &[u8]) -> usize {
    usize::from(u16::from_le_bytes([bytes[8], bytes[9]]))
}

#[test]
fn write_read_f32() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("f32.npy");
    let arr = NpyArray::from_shape_vec(vec![2, 3], vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    write_npy(&path, &arr).unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[..6], MAGIC_STRING);
    assert_eq!(&bytes[6..8], &[1, 0]);
    let hl = header_len(&bytes);
    assert_eq!((2 + hl + 8) % 16, 0);
    assert_eq!(bytes[10 + hl - 1], b'\n');
    assert_eq!(bytes.len(), 10 + hl + 6 * 4);

    let back: NpyArray<f32> = read_npy(&path).unwrap();
    assert_eq!(back.shape(), &[2, 3]);
    assert_eq!(back.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
}

#[test]
fn write_read_every_element_type() {
    fn round_trip<A>(data: Vec<A>)
    where
        A: npyio::ReadableElement + Clone + PartialEq + std::fmt::Debug,
    {
        let shape = vec![data.len()];
        let arr = NpyArray::from_shape_vec(shape, data).unwrap();
        let mut buf = Vec::new();
        arr.write_npy(&mut buf).unwrap();
        let text = std::str::from_utf8(&buf[10..10 + header_len(&buf)]).unwrap();
        assert!(text.contains(dtype_of::<A>()));
        let back = NpyArray::<A>::read_npy(Cursor::new(buf)).unwrap();
        assert_eq!(back, arr);
    }

    round_trip(vec![0.5f64, -1.25, f64::MAX]);
    round_trip(vec![i32::MIN, -1, 0, i32::MAX]);
    round_trip(vec![u32::MAX, 7]);
    round_trip(vec![i64::MIN, 42]);
    round_trip(vec![u64::MAX, 0, 1]);
    round_trip(vec![f16::from_f32(1.5), f16::from_f32(-2.0), f16::ZERO]);
}

#[test]
fn scalar_and_empty_arrays() {
    let mut buf = Vec::new();
    let mut scalar = NpyArray::<i64>::zeros(vec![]);
    scalar[0] = -9;
    scalar.write_npy(&mut buf).unwrap();
    let back = NpyArray::<i64>::read_npy(&buf[..]).unwrap();
    assert_eq!(back.ndim(), 0);
    assert_eq!(back[0], -9);

    let mut buf = Vec::new();
    let empty = NpyArray::<f32>::zeros(vec![3, 0]);
    empty.write_npy(&mut buf).unwrap();
    assert_eq!(buf.len() % 16, 0);
    let back = NpyArray::<f32>::read_npy(&buf[..]).unwrap();
    assert_eq!(back.shape(), &[3, 0]);
    assert!(back.is_empty());
}

#[test]
fn header_on_alignment_boundary() {
    let shape = vec![0, 1_000_000, 10];
    let text = create_header("<f4", &shape, false);
    assert_eq!((10 + text.len() + 1) % 16, 0);

    let mut buf = Vec::new();
    NpyArray::<f32>::zeros(shape.clone()).write_npy(&mut buf).unwrap();
    assert_eq!(header_len(&buf), text.len() + 1);
    let back = NpyArray::<f32>::read_npy(&buf[..]).unwrap();
    assert_eq!(back.shape(), &shape[..]);
}

#[test]
fn bad_magic_is_rejected() {
    let mut buf = Vec::new();
    NpyArray::<f32>::zeros(vec![2]).write_npy(&mut buf).unwrap();
    buf[1] = b'X';
    assert!(matches!(
        NpyArray::<f32>::read_npy(&buf[..]),
        Err(ReadNpyError::ParseHeader(ParseHeaderError::MagicString))
    ));
}

#[test]
fn malformed_shape_is_rejected() {
    let text = "{'descr': '<f4', 'fortran_order': False, 'shape': (3, x, 2,), }\n";
    let mut buf = MAGIC_STRING.to_vec();
    buf.extend_from_slice(&[1, 0]);
    buf.extend_from_slice(&(text.len() as u16).to_le_bytes());
    buf.extend_from_slice(text.as_bytes());
    assert!(matches!(
        NpyArray::<f32>::read_npy(&buf[..]),
        Err(ReadNpyError::ParseHeader(ParseHeaderError::IllegalShape(_)))
    ));
}

#[test]
fn header_without_descr_is_read() {
    let text = "{'shape': (2,), }\n";
    let mut buf = MAGIC_STRING.to_vec();
    buf.extend_from_slice(&[1, 0]);
    buf.extend_from_slice(&(text.len() as u16).to_le_bytes());
    buf.extend_from_slice(text.as_bytes());
    buf.extend_from_slice(&3i32.to_le_bytes());
    buf.extend_from_slice(&4i32.to_le_bytes());
    let back = NpyArray::<i32>::read_npy(&buf[..]).unwrap();
    assert_eq!(back.as_slice(), &[3, 4]);
}

#[test]
fn huge_shape_with_short_payload_is_missing_data() {
    let text = "{'descr': '<f4', 'fortran_order': False, 'shape': (1099511627776,), }\n";
    let mut buf = MAGIC_STRING.to_vec();
    buf.extend_from_slice(&[1, 0]);
    buf.extend_from_slice(&(text.len() as u16).to_le_bytes());
    buf.extend_from_slice(text.as_bytes());
    buf.extend_from_slice(&[0; 16]);
    assert!(matches!(NpyArray::<f32>::read_npy(&buf[..]), Err(ReadNpyError::MissingData)));
}

#[test]
fn wrong_element_type_is_rejected() {
    let mut buf = Vec::new();
    NpyArray::<f64>::zeros(vec![4]).write_npy(&mut buf).unwrap();
    match NpyArray::<u64>::read_npy(&buf[..]) {
        Err(ReadNpyError::WrongDescriptor { expected, found }) => {
            assert_eq!(expected, "<u8");
            assert_eq!(found, "<f8");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn truncated_payload_is_missing_data() {
    let mut buf = Vec::new();
    NpyArray::<u32>::zeros(vec![8]).write_npy(&mut buf).unwrap();
    buf.truncate(buf.len() - 3);
    assert!(matches!(NpyArray::<u32>::read_npy(&buf[..]), Err(ReadNpyError::MissingData)));
}

#[test]
fn missing_file_is_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.npy");
    match read_npy::<_, NpyArray<f32>>(&path) {
        Err(ReadNpyError::Open { path: p, .. }) => assert_eq!(p, path),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn missing_directory_is_create_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no/such/dir/out.npy");
    let arr = NpyArray::<f32>::zeros(vec![1]);
    assert!(matches!(write_npy(&path, &arr), Err(WriteNpyError::Create { .. })));
}

#[test]
fn overwrites_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.npy");
    write_npy(&path, &NpyArray::<i64>::zeros(vec![100])).unwrap();
    let small = NpyArray::from_shape_vec(vec![1], vec![5i64]).unwrap();
    write_npy(&path, &small).unwrap();
    let back: NpyArray<i64> = read_npy(&path).unwrap();
    assert_eq!(back, small);
}
