//! raw 体数据的元素类型描述与解码.

use std::fmt;
use std::str::FromStr;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::Scalar;
use crate::ExportError;

/// 字节序.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Endian {
    /// 小端 (`<`).
    #[default]
    Little,

    /// 大端 (`>`).
    Big,
}

/// raw 数据的存储布局.
///
/// 坐标始终以 `(x, y, z)` 访问, 布局只决定文件中哪一维变化最快.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Layout {
    /// 行优先, z 变化最快. 对应 `numpy.reshape(buf, (dimx, dimy, dimz))`.
    #[default]
    C,

    /// 列优先, x 变化最快.
    Fortran,
}

/// raw 体数据的元素类型, 由字节宽度、有无符号/浮点以及字节序组成.
///
/// 可以从 numpy 风格的 dtype 字符串解析, 如 `u1`, `<u2`, `>i2`, `<f4`.
/// 单字节类型忽略字节序.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String"))]
pub enum ElemType {
    /// `u1`.
    U8,
    /// `i1`.
    I8,
    /// `u2`.
    U16(Endian),
    /// `i2`.
    I16(Endian),
    /// `u4`.
    U32(Endian),
    /// `i4`.
    I32(Endian),
    /// `u8`.
    U64(Endian),
    /// `i8`.
    I64(Endian),
    /// `f4`.
    F32(Endian),
    /// `f8`.
    F64(Endian),
}

impl ElemType {
    /// 单个元素的字节宽度.
    pub fn width(&self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16(_) | Self::I16(_) => 2,
            Self::U32(_) | Self::I32(_) | Self::F32(_) => 4,
            Self::U64(_) | Self::I64(_) | Self::F64(_) => 8,
        }
    }

    /// 字节序. 单字节类型返回 `None`.
    pub fn endian(&self) -> Option<Endian> {
        match *self {
            Self::U8 | Self::I8 => None,
            Self::U16(e)
            | Self::I16(e)
            | Self::U32(e)
            | Self::I32(e)
            | Self::U64(e)
            | Self::I64(e)
            | Self::F32(e)
            | Self::F64(e) => Some(e),
        }
    }
}

impl FromStr for ElemType {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unsupported = || ExportError::UnsupportedElementType(s.to_string());

        // `=` 为本机字节序, `|` 表示字节序无关.
        let (endian, body) = match s.as_bytes().first() {
            Some(b'<') => (Some(Endian::Little), &s[1..]),
            Some(b'>') => (Some(Endian::Big), &s[1..]),
            Some(b'=') => (Some(native_endian()), &s[1..]),
            Some(b'|') => (None, &s[1..]),
            _ => (None, s),
        };
        let e = endian.unwrap_or_else(native_endian);

        let t = match body {
            "u1" | "B" => Self::U8,
            "i1" | "b" => Self::I8,
            "u2" => Self::U16(e),
            "i2" => Self::I16(e),
            "u4" => Self::U32(e),
            "i4" => Self::I32(e),
            "u8" => Self::U64(e),
            "i8" => Self::I64(e),
            "f4" => Self::F32(e),
            "f8" => Self::F64(e),
            _ => return Err(unsupported()),
        };
        Ok(t)
    }
}

impl TryFrom<String> for ElemType {
    type Error = ExportError;

    #[inline]
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for ElemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match self {
            Self::U8 => return write!(f, "u1"),
            Self::I8 => return write!(f, "i1"),
            Self::U16(_) => "u2",
            Self::I16(_) => "i2",
            Self::U32(_) => "u4",
            Self::I32(_) => "i4",
            Self::U64(_) => "u8",
            Self::I64(_) => "i8",
            Self::F32(_) => "f4",
            Self::F64(_) => "f8",
        };
        let order = match self.endian() {
            Some(Endian::Big) => '>',
            _ => '<',
        };
        write!(f, "{order}{body}")
    }
}

#[cfg(target_endian = "little")]
#[inline]
fn native_endian() -> Endian {
    Endian::Little
}

#[cfg(target_endian = "big")]
#[inline]
fn native_endian() -> Endian {
    Endian::Big
}

/// 可以从 raw 字节流解码的体素元素.
pub trait RawElement: Copy + Default + fmt::Debug {
    /// 字节宽度.
    const WIDTH: usize;

    /// 以字节序 `B` 解码 `buf` 的前 `WIDTH` 个字节.
    fn read<B: ByteOrder>(buf: &[u8]) -> Self;

    /// 转换为标量.
    fn to_scalar(self) -> Scalar;
}

macro_rules! impl_raw_int {
    ($($t: ty, $w: expr, $read: expr);+ $(;)?) => {
        $(
            impl RawElement for $t {
                const WIDTH: usize = $w;

                #[inline]
                fn read<B: ByteOrder>(buf: &[u8]) -> Self {
                    #[allow(clippy::redundant_closure_call)]
                    ($read)(buf)
                }

                #[inline]
                fn to_scalar(self) -> Scalar {
                    match num::ToPrimitive::to_i64(&self) {
                        Some(v) => Scalar::Int(v),
                        // 只有 u64 会走到这里.
                        None => Scalar::UInt(self as u64),
                    }
                }
            }
        )+
    };
}

impl_raw_int! {
    u8, 1, |b: &[u8]| b[0];
    i8, 1, |b: &[u8]| b[0] as i8;
    u16, 2, B::read_u16;
    i16, 2, B::read_i16;
    u32, 4, B::read_u32;
    i32, 4, B::read_i32;
    u64, 8, B::read_u64;
    i64, 8, B::read_i64;
}

impl RawElement for f32 {
    const WIDTH: usize = 4;

    #[inline]
    fn read<B: ByteOrder>(buf: &[u8]) -> Self {
        B::read_f32(buf)
    }

    #[inline]
    fn to_scalar(self) -> Scalar {
        Scalar::Float32(self)
    }
}

impl RawElement for f64 {
    const WIDTH: usize = 8;

    #[inline]
    fn read<B: ByteOrder>(buf: &[u8]) -> Self {
        B::read_f64(buf)
    }

    #[inline]
    fn to_scalar(self) -> Scalar {
        Scalar::Float(self)
    }
}

/// 按 `endian` 将 `bytes` 解码为元素序列. `bytes.len()` 必须是 `T::WIDTH` 的整数倍.
pub(crate) fn decode_all<T: RawElement>(bytes: &[u8], endian: Endian) -> Vec<T> {
    debug_assert_eq!(bytes.len() % T::WIDTH, 0);
    let chunks = bytes.chunks_exact(T::WIDTH);
    match endian {
        Endian::Little => chunks.map(T::read::<LittleEndian>).collect(),
        Endian::Big => chunks.map(T::read::<BigEndian>).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dtype() {
        assert_eq!("u1".parse::<ElemType>().unwrap(), ElemType::U8);
        assert_eq!("|u1".parse::<ElemType>().unwrap(), ElemType::U8);
        assert_eq!("i1".parse::<ElemType>().unwrap(), ElemType::I8);
        assert_eq!(
            ">u2".parse::<ElemType>().unwrap(),
            ElemType::U16(Endian::Big)
        );
        assert_eq!(
            "<u2".parse::<ElemType>().unwrap(),
            ElemType::U16(Endian::Little)
        );
        assert_eq!(
            ">i2".parse::<ElemType>().unwrap(),
            ElemType::I16(Endian::Big)
        );
        assert_eq!(
            "<f4".parse::<ElemType>().unwrap(),
            ElemType::F32(Endian::Little)
        );
    }

    #[test]
    fn test_parse_dtype_rejects_unknown() {
        for bad in ["", "u3", "<c8", "uint16", ">"] {
            assert!(matches!(
                bad.parse::<ElemType>(),
                Err(ExportError::UnsupportedElementType(_))
            ));
        }
    }

    #[test]
    fn test_width_and_display() {
        assert_eq!(ElemType::U8.width(), 1);
        assert_eq!(ElemType::I16(Endian::Big).width(), 2);
        assert_eq!(ElemType::F64(Endian::Little).width(), 8);

        for s in ["u1", "i1", ">u2", "<i2", "<u4", ">f8"] {
            assert_eq!(s.parse::<ElemType>().unwrap().to_string(), s);
        }
    }

    #[test]
    fn test_decode_both_orders() {
        let bytes = [0x01, 0x02, 0xff, 0xfe];
        assert_eq!(
            decode_all::<u16>(&bytes, Endian::Little),
            vec![0x0201, 0xfeff]
        );
        assert_eq!(decode_all::<u16>(&bytes, Endian::Big), vec![0x0102, 0xfffe]);
        assert_eq!(decode_all::<i16>(&bytes, Endian::Big), vec![0x0102, -2]);
        assert_eq!(decode_all::<i8>(&bytes, Endian::Big), vec![1, 2, -1, -2]);
    }

    #[test]
    fn test_to_scalar_keeps_width() {
        assert_eq!(u64::MAX.to_scalar(), Scalar::UInt(u64::MAX));
        assert_eq!((i64::MAX as u64).to_scalar(), Scalar::Int(i64::MAX));
        assert_eq!(i64::MIN.to_scalar(), Scalar::Int(i64::MIN));
        assert_eq!(1.1f32.to_scalar(), Scalar::Float32(1.1));
        assert_eq!(1.1f32.to_scalar().to_string(), "1.1");
        assert_eq!(5.0f64.to_scalar().to_string(), "5.0");
    }
}
