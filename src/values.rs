use std::fmt::Display;

use chrono::NaiveDateTime;
use nom::number::Endianness;
#[cfg(feature = "json_dump")]
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::{endian::FromEndianBytes, ExifTag};

/// # TIFF field types
///
/// ```txt
/// | Value           |             1 |             2 |              3 |               4 |                 5 |            6 |
/// |-----------------+---------------+---------------+----------------+-----------------+-------------------+--------------|
/// | Format          | unsigned byte | ascii strings | unsigned short |   unsigned long | unsigned rational |  signed byte |
/// | Bytes/component |             1 |             1 |              2 |               4 |                 8 |            1 |
///
/// | Value           |             7 |             8 |              9 |              10 |                11 |           12 |
/// |-----------------+---------------+---------------+----------------+-----------------+-------------------+--------------|
/// | Format          |     undefined |  signed short |    signed long | signed rational |      single float | double float |
/// | Bytes/component |             1 |             2 |              4 |               8 |                 4 |            8 |
/// ```
///
/// Any other code is kept as [`FieldType::Unknown`] with a width of zero, so
/// its value decodes to an empty byte string instead of failing the walk.
#[cfg_attr(feature = "json_dump", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    Byte,
    Ascii,
    Short,
    Long,
    Rational,
    SByte,
    Undefined,
    SShort,
    SLong,
    SRational,
    Float,
    Double,
    Unknown(u16),
}

/// Indexed by type code; index 0 and codes past the end are unknown.
const BYTES_PER_TYPE: [u32; 13] = [0, 1, 1, 2, 4, 8, 1, 1, 2, 4, 8, 4, 8];

impl FieldType {
    pub fn code(self) -> u16 {
        match self {
            FieldType::Byte => 1,
            FieldType::Ascii => 2,
            FieldType::Short => 3,
            FieldType::Long => 4,
            FieldType::Rational => 5,
            FieldType::SByte => 6,
            FieldType::Undefined => 7,
            FieldType::SShort => 8,
            FieldType::SLong => 9,
            FieldType::SRational => 10,
            FieldType::Float => 11,
            FieldType::Double => 12,
            FieldType::Unknown(c) => c,
        }
    }

    pub fn bytes_per_type(self) -> u32 {
        match self {
            FieldType::Unknown(_) => 0,
            t => BYTES_PER_TYPE
                .get(t.code() as usize)
                .copied()
                .unwrap_or_default(),
        }
    }

    /// Width of the unit that must be byte-swapped on its own. Rationals are
    /// two independent 4-byte integers.
    pub(crate) fn element_width(self) -> usize {
        match self {
            FieldType::Short | FieldType::SShort => 2,
            FieldType::Long
            | FieldType::SLong
            | FieldType::Rational
            | FieldType::SRational
            | FieldType::Float => 4,
            FieldType::Double => 8,
            _ => 1,
        }
    }
}

impl From<u16> for FieldType {
    fn from(v: u16) -> Self {
        match v {
            1 => FieldType::Byte,
            2 => FieldType::Ascii,
            3 => FieldType::Short,
            4 => FieldType::Long,
            5 => FieldType::Rational,
            6 => FieldType::SByte,
            7 => FieldType::Undefined,
            8 => FieldType::SShort,
            9 => FieldType::SLong,
            10 => FieldType::SRational,
            11 => FieldType::Float,
            12 => FieldType::Double,
            other => FieldType::Unknown(other),
        }
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Byte => f.write_str("BYTE"),
            FieldType::Ascii => f.write_str("ASCII"),
            FieldType::Short => f.write_str("SHORT"),
            FieldType::Long => f.write_str("LONG"),
            FieldType::Rational => f.write_str("RATIONAL"),
            FieldType::SByte => f.write_str("SBYTE"),
            FieldType::Undefined => f.write_str("UNDEFINED"),
            FieldType::SShort => f.write_str("SSHORT"),
            FieldType::SLong => f.write_str("SLONG"),
            FieldType::SRational => f.write_str("SRATIONAL"),
            FieldType::Float => f.write_str("FLOAT"),
            FieldType::Double => f.write_str("DOUBLE"),
            FieldType::Unknown(c) => write!(f, "Unknown({c})"),
        }
    }
}

/// Represent a decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryValue {
    Text(String),
    Time(NaiveDateTime),

    U8(u8),
    U16(u16),
    U32(u32),
    I8(i8),
    I16(i16),
    I32(i32),
    F32(f32),
    F64(f64),

    URational(URational),
    IRational(IRational),

    Undefined(Vec<u8>),

    U8Array(Vec<u8>),
    U16Array(Vec<u16>),
    U32Array(Vec<u32>),
    URationalArray(Vec<URational>),
    IRationalArray(Vec<IRational>),
}

#[derive(Debug, Clone, Error)]
pub enum ParseEntryError {
    #[error("data is invalid: {0}")]
    InvalidData(String),

    #[error("data format is unsupported: {0}")]
    Unsupported(String),
}

use ParseEntryError as Error;

impl EntryValue {
    /// Decodes a field value whose multi-byte elements are already in host
    /// order, as delivered by the TIFF walker.
    pub(crate) fn parse(
        tag: u16,
        field_type: FieldType,
        count: u32,
        data: &[u8],
    ) -> Result<EntryValue, Error> {
        if let FieldType::Unknown(c) = field_type {
            return Err(Error::Unsupported(format!("field type {c}")));
        }
        if data.is_empty() || count == 0 {
            return Ok(EntryValue::variant_default(field_type));
        }

        let expected = field_type.bytes_per_type() as usize * count as usize;
        if data.len() < expected {
            return Err(Error::InvalidData(format!(
                "expected {expected} bytes, got {}",
                data.len()
            )));
        }

        let is_time_tag = matches!(
            ExifTag::try_from(tag),
            Ok(ExifTag::ModifyDate | ExifTag::DateTimeOriginal | ExifTag::CreateDate)
        );

        let value = match field_type {
            FieldType::Ascii => {
                let s = get_cstr(data)?;
                if is_time_tag {
                    match NaiveDateTime::parse_from_str(&s, "%Y:%m:%d %H:%M:%S") {
                        Ok(t) => EntryValue::Time(t),
                        Err(e) => {
                            tracing::debug!(?e, %s, "time value kept as text");
                            EntryValue::Text(s)
                        }
                    }
                } else {
                    EntryValue::Text(s)
                }
            }
            FieldType::Byte => match count {
                1 => EntryValue::U8(data[0]),
                _ => EntryValue::U8Array(data[..expected].to_vec()),
            },
            FieldType::Undefined => EntryValue::Undefined(data[..expected].to_vec()),
            FieldType::SByte => match count {
                1 => EntryValue::I8(data[0] as i8),
                x => return Err(Error::Unsupported(format!("signed byte with {x} components"))),
            },
            FieldType::Short => {
                let mut values = decode_all::<u16>(data, count)?;
                if values.len() == 1 {
                    EntryValue::U16(values.remove(0))
                } else {
                    EntryValue::U16Array(values)
                }
            }
            FieldType::Long => {
                let mut values = decode_all::<u32>(data, count)?;
                if values.len() == 1 {
                    EntryValue::U32(values.remove(0))
                } else {
                    EntryValue::U32Array(values)
                }
            }
            FieldType::SShort => match count {
                1 => EntryValue::I16(decode_one(data)?),
                x => return Err(Error::Unsupported(format!("signed short with {x} components"))),
            },
            FieldType::SLong => match count {
                1 => EntryValue::I32(decode_one(data)?),
                x => return Err(Error::Unsupported(format!("signed long with {x} components"))),
            },
            FieldType::Float => match count {
                1 => EntryValue::F32(decode_one(data)?),
                x => return Err(Error::Unsupported(format!("float with {x} components"))),
            },
            FieldType::Double => match count {
                1 => EntryValue::F64(decode_one(data)?),
                x => return Err(Error::Unsupported(format!("double with {x} components"))),
            },
            FieldType::Rational => {
                let mut rationals = decode_rationals::<u32>(data, count)?;
                if rationals.len() == 1 {
                    EntryValue::URational(rationals.remove(0))
                } else {
                    EntryValue::URationalArray(rationals)
                }
            }
            FieldType::SRational => {
                let mut rationals = decode_rationals::<i32>(data, count)?;
                if rationals.len() == 1 {
                    EntryValue::IRational(rationals.remove(0))
                } else {
                    EntryValue::IRationalArray(rationals)
                }
            }
            FieldType::Unknown(c) => return Err(Error::Unsupported(format!("field type {c}"))),
        };
        Ok(value)
    }

    fn variant_default(field_type: FieldType) -> EntryValue {
        match field_type {
            FieldType::Byte => Self::U8(0),
            FieldType::Ascii => Self::Text(String::default()),
            FieldType::Short => Self::U16(0),
            FieldType::Long => Self::U32(0),
            FieldType::Rational => Self::URational(URational::default()),
            FieldType::SByte => Self::I8(0),
            FieldType::SShort => Self::I16(0),
            FieldType::SLong => Self::I32(0),
            FieldType::SRational => Self::IRational(IRational::default()),
            FieldType::Float => Self::F32(0.0),
            FieldType::Double => Self::F64(0.0),
            FieldType::Undefined | FieldType::Unknown(_) => Self::Undefined(Vec::default()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EntryValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveDateTime> {
        match self {
            EntryValue::Time(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self {
            EntryValue::U16(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            EntryValue::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_urational(&self) -> Option<URational> {
        if let EntryValue::URational(v) = self {
            Some(*v)
        } else {
            None
        }
    }

    pub fn as_urational_array(&self) -> Option<&[URational]> {
        if let EntryValue::URationalArray(v) = self {
            Some(v)
        } else {
            None
        }
    }
}

fn decode_one<T: FromEndianBytes>(data: &[u8]) -> Result<T, Error> {
    T::from_endian_bytes(data, Endianness::Native).ok_or_else(|| {
        Error::InvalidData(format!(
            "data is too small to convert to {}",
            std::any::type_name::<T>(),
        ))
    })
}

fn decode_all<T: FromEndianBytes>(data: &[u8], count: u32) -> Result<Vec<T>, Error> {
    data.chunks_exact(T::SIZE)
        .take(count as usize)
        .map(decode_one)
        .collect()
}

// Ensure that the returned Vec is not empty.
fn decode_rationals<T: FromEndianBytes>(data: &[u8], count: u32) -> Result<Vec<Rational<T>>, Error> {
    if count == 0 {
        return Err(Error::InvalidData("components is 0".to_string()));
    }
    data.chunks_exact(8)
        .take(count as usize)
        .map(|x| Ok(Rational(decode_one(x)?, decode_one(&x[4..])?)))
        .collect()
}

fn get_cstr(data: &[u8]) -> Result<String, Error> {
    let bytes = data.iter().take_while(|b| **b != 0).cloned().collect::<Vec<u8>>();
    String::from_utf8(bytes).map_err(|e| Error::InvalidData(e.to_string()))
}

#[cfg(feature = "json_dump")]
impl Serialize for EntryValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl Display for EntryValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryValue::Text(v) => f.write_str(v),
            EntryValue::Time(v) => Display::fmt(&v.format("%Y-%m-%dT%H:%M:%S"), f),
            EntryValue::URational(v) => {
                write!(f, "{}/{} ({:.04})", v.0, v.1, v.0 as f64 / v.1 as f64)
            }
            EntryValue::IRational(v) => {
                write!(f, "{}/{} ({:.04})", v.0, v.1, v.0 as f64 / v.1 as f64)
            }
            EntryValue::U8(v) => Display::fmt(&v, f),
            EntryValue::U16(v) => Display::fmt(&v, f),
            EntryValue::U32(v) => Display::fmt(&v, f),
            EntryValue::I8(v) => Display::fmt(&v, f),
            EntryValue::I16(v) => Display::fmt(&v, f),
            EntryValue::I32(v) => Display::fmt(&v, f),
            EntryValue::F32(v) => Display::fmt(&v, f),
            EntryValue::F64(v) => Display::fmt(&v, f),
            EntryValue::Undefined(v) | EntryValue::U8Array(v) => {
                // Display up to MAX_DISPLAY_NUM components, and replace the rest with ellipsis
                const MAX_DISPLAY_NUM: usize = 8;
                let s = v
                    .iter()
                    .map(|x| format!("0x{x:02x}"))
                    .take(MAX_DISPLAY_NUM + 1)
                    .enumerate()
                    .map(|(i, x)| if i >= MAX_DISPLAY_NUM { "...".to_owned() } else { x })
                    .collect::<Vec<String>>()
                    .join(", ");
                write!(f, "[{}]", s)
            }
            EntryValue::U16Array(v) => write!(f, "{v:?}"),
            EntryValue::U32Array(v) => write!(f, "{v:?}"),
            EntryValue::URationalArray(v) => {
                write!(f, "URationalArray[{}]", rationals_to_string::<u32>(v))
            }
            EntryValue::IRationalArray(v) => {
                write!(f, "IRationalArray[{}]", rationals_to_string::<i32>(v))
            }
        }
    }
}

fn rationals_to_string<T>(rationals: &[Rational<T>]) -> String
where
    T: Display + Into<f64> + Copy,
{
    // Display up to MAX_DISPLAY_NUM components, and replace the rest with ellipsis
    const MAX_DISPLAY_NUM: usize = 3;
    rationals
        .iter()
        .map(|x| format!("{}/{} ({:.04})", x.0, x.1, x.as_float()))
        .take(MAX_DISPLAY_NUM + 1)
        .enumerate()
        .map(|(i, x)| if i >= MAX_DISPLAY_NUM { "...".to_owned() } else { x })
        .collect::<Vec<String>>()
        .join(", ")
}

pub type URational = Rational<u32>;
pub type IRational = Rational<i32>;

#[cfg_attr(feature = "json_dump", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Rational<T>(pub T, pub T);

impl<T> Rational<T>
where
    T: Copy + Into<f64>,
{
    pub fn as_float(&self) -> f64 {
        std::convert::Into::<f64>::into(self.0) / std::convert::Into::<f64>::into(self.1)
    }
}

impl<T> From<(T, T)> for Rational<T>
where
    T: Copy,
{
    fn from(value: (T, T)) -> Self {
        Self(value.0, value.1)
    }
}
