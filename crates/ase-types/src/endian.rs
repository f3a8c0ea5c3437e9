//! Byte order of integer payload fields.
//!
//! Packet headers are always big-endian. Integers inside package payloads
//! use the byte order negotiated at login, which defaults to little-endian.

/// Byte order for payload integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endian {
    /// Least significant byte first.
    #[default]
    Little,
    /// Most significant byte first.
    Big,
}

macro_rules! endian_int {
    ($read:ident, $write:ident, $ty:ty, $n:literal) => {
        /// Decode from exactly
        #[doc = concat!(stringify!($n), " bytes.")]
        #[must_use]
        pub fn $read(self, bytes: [u8; $n]) -> $ty {
            match self {
                Self::Little => <$ty>::from_le_bytes(bytes),
                Self::Big => <$ty>::from_be_bytes(bytes),
            }
        }

        /// Encode into
        #[doc = concat!(stringify!($n), " bytes.")]
        #[must_use]
        pub fn $write(self, value: $ty) -> [u8; $n] {
            match self {
                Self::Little => value.to_le_bytes(),
                Self::Big => value.to_be_bytes(),
            }
        }
    };
}

impl Endian {
    endian_int!(read_u16, write_u16, u16, 2);
    endian_int!(read_i16, write_i16, i16, 2);
    endian_int!(read_u32, write_u32, u32, 4);
    endian_int!(read_i32, write_i32, i32, 4);
    endian_int!(read_u64, write_u64, u64, 8);
    endian_int!(read_i64, write_i64, i64, 8);
    endian_int!(read_f32, write_f32, f32, 4);
    endian_int!(read_f64, write_f64, f64, 8);
}
