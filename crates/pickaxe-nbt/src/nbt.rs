use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

/// NBT tag type IDs.
pub const TAG_END: u8 = 0;
pub const TAG_BYTE: u8 = 1;
pub const TAG_SHORT: u8 = 2;
pub const TAG_INT: u8 = 3;
pub const TAG_LONG: u8 = 4;
pub const TAG_FLOAT: u8 = 5;
pub const TAG_DOUBLE: u8 = 6;
pub const TAG_BYTE_ARRAY: u8 = 7;
pub const TAG_STRING: u8 = 8;
pub const TAG_LIST: u8 = 9;
pub const TAG_COMPOUND: u8 = 10;
pub const TAG_INT_ARRAY: u8 = 11;
pub const TAG_LONG_ARRAY: u8 = 12;

#[derive(Debug, Error)]
pub enum NbtError {
    #[error("not enough data")]
    NotEnoughData,
    #[error("unknown tag id {0}")]
    UnknownTag(u8),
    #[error("negative array length {0}")]
    NegativeLength(i32),
}

pub type NbtResult<T> = Result<T, NbtError>;

/// An NBT value.
#[derive(Debug, Clone, PartialEq)]
pub enum NbtValue {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<i8>),
    String(String),
    List(Vec<NbtValue>),
    Compound(Vec<(String, NbtValue)>),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl NbtValue {
    pub fn tag_id(&self) -> u8 {
        match self {
            NbtValue::Byte(_) => TAG_BYTE,
            NbtValue::Short(_) => TAG_SHORT,
            NbtValue::Int(_) => TAG_INT,
            NbtValue::Long(_) => TAG_LONG,
            NbtValue::Float(_) => TAG_FLOAT,
            NbtValue::Double(_) => TAG_DOUBLE,
            NbtValue::ByteArray(_) => TAG_BYTE_ARRAY,
            NbtValue::String(_) => TAG_STRING,
            NbtValue::List(_) => TAG_LIST,
            NbtValue::Compound(_) => TAG_COMPOUND,
            NbtValue::IntArray(_) => TAG_INT_ARRAY,
            NbtValue::LongArray(_) => TAG_LONG_ARRAY,
        }
    }

    /// Write this value as a root compound tag (with empty name), the form
    /// used for in-packet NBT (e.g. the Chunk Data heightmaps compound).
    pub fn write_root_network(&self, buf: &mut BytesMut) {
        buf.put_u8(self.tag_id());
        write_nbt_string("", buf);
        self.write_payload(buf);
    }

    /// Write this value as a full named root tag (for files).
    pub fn write_root_named(&self, name: &str, buf: &mut BytesMut) {
        buf.put_u8(self.tag_id());
        write_nbt_string(name, buf);
        self.write_payload(buf);
    }

    /// Write just the payload (no tag type or name).
    pub fn write_payload(&self, buf: &mut BytesMut) {
        match self {
            NbtValue::Byte(v) => buf.put_i8(*v),
            NbtValue::Short(v) => buf.put_i16(*v),
            NbtValue::Int(v) => buf.put_i32(*v),
            NbtValue::Long(v) => buf.put_i64(*v),
            NbtValue::Float(v) => buf.put_f32(*v),
            NbtValue::Double(v) => buf.put_f64(*v),
            NbtValue::ByteArray(v) => {
                buf.put_i32(v.len() as i32);
                for b in v {
                    buf.put_i8(*b);
                }
            }
            NbtValue::String(v) => write_nbt_string(v, buf),
            NbtValue::List(v) => {
                if v.is_empty() {
                    buf.put_u8(TAG_END);
                    buf.put_i32(0);
                } else {
                    buf.put_u8(v[0].tag_id());
                    buf.put_i32(v.len() as i32);
                    for item in v {
                        item.write_payload(buf);
                    }
                }
            }
            NbtValue::Compound(entries) => {
                for (name, value) in entries {
                    buf.put_u8(value.tag_id());
                    write_nbt_string(name, buf);
                    value.write_payload(buf);
                }
                buf.put_u8(TAG_END);
            }
            NbtValue::IntArray(v) => {
                buf.put_i32(v.len() as i32);
                for i in v {
                    buf.put_i32(*i);
                }
            }
            NbtValue::LongArray(v) => {
                buf.put_i32(v.len() as i32);
                for l in v {
                    buf.put_i64(*l);
                }
            }
        }
    }

    /// Read a full root tag (type byte + name + payload). Returns the tag's
    /// name alongside the value.
    pub fn read_root(buf: &mut BytesMut) -> NbtResult<(String, NbtValue)> {
        let tag_id = read_u8(buf)?;
        if tag_id == TAG_END {
            return Ok((String::new(), NbtValue::Compound(Vec::new())));
        }
        let name = read_nbt_string(buf)?;
        let value = NbtValue::read_payload(tag_id, buf)?;
        Ok((name, value))
    }

    /// Read just a payload of the given known tag type.
    pub fn read_payload(tag_id: u8, buf: &mut BytesMut) -> NbtResult<NbtValue> {
        Ok(match tag_id {
            TAG_BYTE => NbtValue::Byte(read_u8(buf)? as i8),
            TAG_SHORT => NbtValue::Short(read_i16(buf)?),
            TAG_INT => NbtValue::Int(read_i32(buf)?),
            TAG_LONG => NbtValue::Long(read_i64(buf)?),
            TAG_FLOAT => NbtValue::Float(f32::from_bits(read_i32(buf)? as u32)),
            TAG_DOUBLE => NbtValue::Double(f64::from_bits(read_i64(buf)? as u64)),
            TAG_BYTE_ARRAY => {
                let len = read_array_len(buf)?;
                let mut v = Vec::with_capacity(len);
                for _ in 0..len {
                    v.push(read_u8(buf)? as i8);
                }
                NbtValue::ByteArray(v)
            }
            TAG_STRING => NbtValue::String(read_nbt_string(buf)?),
            TAG_LIST => {
                let elem_tag = read_u8(buf)?;
                let len = read_array_len(buf)?;
                let mut v = Vec::with_capacity(len);
                for _ in 0..len {
                    v.push(NbtValue::read_payload(elem_tag, buf)?);
                }
                NbtValue::List(v)
            }
            TAG_COMPOUND => {
                let mut entries = Vec::new();
                loop {
                    let child_tag = read_u8(buf)?;
                    if child_tag == TAG_END {
                        break;
                    }
                    let name = read_nbt_string(buf)?;
                    let value = NbtValue::read_payload(child_tag, buf)?;
                    entries.push((name, value));
                }
                NbtValue::Compound(entries)
            }
            TAG_INT_ARRAY => {
                let len = read_array_len(buf)?;
                let mut v = Vec::with_capacity(len);
                for _ in 0..len {
                    v.push(read_i32(buf)?);
                }
                NbtValue::IntArray(v)
            }
            TAG_LONG_ARRAY => {
                let len = read_array_len(buf)?;
                let mut v = Vec::with_capacity(len);
                for _ in 0..len {
                    v.push(read_i64(buf)?);
                }
                NbtValue::LongArray(v)
            }
            other => return Err(NbtError::UnknownTag(other)),
        })
    }

    pub fn get(&self, key: &str) -> Option<&NbtValue> {
        match self {
            NbtValue::Compound(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            NbtValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            NbtValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

fn write_nbt_string(s: &str, buf: &mut BytesMut) {
    let bytes = s.as_bytes();
    buf.put_u16(bytes.len() as u16);
    buf.put_slice(bytes);
}

fn read_nbt_string(buf: &mut BytesMut) -> NbtResult<String> {
    if buf.remaining() < 2 {
        return Err(NbtError::NotEnoughData);
    }
    let len = buf.get_u16() as usize;
    if buf.remaining() < len {
        return Err(NbtError::NotEnoughData);
    }
    let bytes = buf.split_to(len);
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn read_array_len(buf: &mut BytesMut) -> NbtResult<usize> {
    let len = read_i32(buf)?;
    if len < 0 {
        return Err(NbtError::NegativeLength(len));
    }
    Ok(len as usize)
}

fn read_u8(buf: &mut BytesMut) -> NbtResult<u8> {
    if !buf.has_remaining() {
        return Err(NbtError::NotEnoughData);
    }
    Ok(buf.get_u8())
}

fn read_i16(buf: &mut BytesMut) -> NbtResult<i16> {
    if buf.remaining() < 2 {
        return Err(NbtError::NotEnoughData);
    }
    Ok(buf.get_i16())
}

fn read_i32(buf: &mut BytesMut) -> NbtResult<i32> {
    if buf.remaining() < 4 {
        return Err(NbtError::NotEnoughData);
    }
    Ok(buf.get_i32())
}

fn read_i64(buf: &mut BytesMut) -> NbtResult<i64> {
    if buf.remaining() < 8 {
        return Err(NbtError::NotEnoughData);
    }
    Ok(buf.get_i64())
}

/// Helper macro for building compound tags.
#[macro_export]
macro_rules! nbt_compound {
    ($($key:expr => $val:expr),* $(,)?) => {
        $crate::NbtValue::Compound(vec![
            $(($key.into(), $val)),*
        ])
    };
}

/// Helper macro for building list tags.
#[macro_export]
macro_rules! nbt_list {
    ($($val:expr),* $(,)?) => {
        $crate::NbtValue::List(vec![$($val),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_simple_compound() {
        let nbt = NbtValue::Compound(vec![
            ("name".into(), NbtValue::String("test".into())),
            ("value".into(), NbtValue::Int(42)),
        ]);
        let mut buf = BytesMut::new();
        nbt.write_root_network(&mut buf);
        assert_eq!(buf[0], TAG_COMPOUND);
    }

    #[test]
    fn test_long_array() {
        let nbt = NbtValue::LongArray(vec![1, 2, 3]);
        let mut buf = BytesMut::new();
        nbt.write_payload(&mut buf);
        assert_eq!(buf.len(), 28);
    }

    #[test]
    fn roundtrip_named_compound() {
        let nbt = nbt_compound! {
            "str" => NbtValue::String("hello".into()),
            "n" => NbtValue::Int(-7),
            "list" => nbt_list![NbtValue::Long(1), NbtValue::Long(2)],
            "nested" => nbt_compound! { "f" => NbtValue::Float(1.5) },
            "bytes" => NbtValue::ByteArray(vec![1, -2, 3]),
            "ints" => NbtValue::IntArray(vec![10, 20]),
        };
        let mut buf = BytesMut::new();
        nbt.write_root_named("root", &mut buf);
        let (name, decoded) = NbtValue::read_root(&mut buf).unwrap();
        assert_eq!(name, "root");
        assert_eq!(decoded, nbt);
    }

    #[test]
    fn roundtrip_empty_compound() {
        let nbt = NbtValue::Compound(Vec::new());
        let mut buf = BytesMut::new();
        nbt.write_root_network(&mut buf);
        let (name, decoded) = NbtValue::read_root(&mut buf).unwrap();
        assert_eq!(name, "");
        assert_eq!(decoded, nbt);
    }

    #[test]
    fn roundtrip_empty_list() {
        let nbt = nbt_compound! { "l" => NbtValue::List(Vec::new()) };
        let mut buf = BytesMut::new();
        nbt.write_root_named("", &mut buf);
        let (_, decoded) = NbtValue::read_root(&mut buf).unwrap();
        assert_eq!(decoded, nbt);
    }

    #[test]
    fn negative_array_length_errors() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&(-1i32).to_be_bytes());
        let err = NbtValue::read_payload(TAG_INT_ARRAY, &mut buf).unwrap_err();
        assert!(matches!(err, NbtError::NegativeLength(-1)));
    }
}
