//! Decoding of field payload bytes into SQL values.
//!
//! The caller has already stripped the length prefix and data status, so
//! `bytes` is exactly the value. An empty slice is NULL for every nullable
//! type.

use bytes::Bytes;

use crate::data_type::DataType;
use crate::decimal::{
    self, DEFAULT_SCALE, Decimal, MAX_PRECISION, MONEY_PRECISION, MONEY_SCALE,
};
use crate::endian::Endian;
use crate::error::TypeError;
use crate::time;
use crate::value::SqlValue;

/// Decode the payload of a field of type `data_type`.
pub fn decode_value(
    data_type: DataType,
    endian: Endian,
    bytes: &[u8],
) -> Result<SqlValue, TypeError> {
    if let Some(size) = data_type.byte_size() {
        if bytes.len() != size {
            return Err(invalid_length(data_type, "the fixed type size", bytes.len()));
        }
    }

    match data_type {
        DataType::Int1 => Ok(SqlValue::TinyInt(bytes[0])),
        DataType::Sint1 => Ok(SqlValue::SignedTinyInt(i8::from_ne_bytes([bytes[0]]))),
        DataType::Int2 => Ok(SqlValue::SmallInt(endian.read_i16(array(data_type, bytes)?))),
        DataType::Int4 => Ok(SqlValue::Int(endian.read_i32(array(data_type, bytes)?))),
        DataType::Int8 => Ok(SqlValue::BigInt(endian.read_i64(array(data_type, bytes)?))),
        DataType::Uint2 => Ok(SqlValue::UnsignedSmallInt(
            endian.read_u16(array(data_type, bytes)?),
        )),
        DataType::Uint4 => Ok(SqlValue::UnsignedInt(endian.read_u32(array(data_type, bytes)?))),
        DataType::Uint8 => Ok(SqlValue::UnsignedBigInt(
            endian.read_u64(array(data_type, bytes)?),
        )),
        DataType::IntN => match bytes.len() {
            0 => Ok(SqlValue::Null),
            1 => decode_value(DataType::Int1, endian, bytes),
            2 => decode_value(DataType::Int2, endian, bytes),
            4 => decode_value(DataType::Int4, endian, bytes),
            8 => decode_value(DataType::Int8, endian, bytes),
            n => Err(invalid_length(data_type, "0, 1, 2, 4 or 8", n)),
        },
        DataType::UintN => match bytes.len() {
            0 => Ok(SqlValue::Null),
            1 => decode_value(DataType::Int1, endian, bytes),
            2 => decode_value(DataType::Uint2, endian, bytes),
            4 => decode_value(DataType::Uint4, endian, bytes),
            8 => decode_value(DataType::Uint8, endian, bytes),
            n => Err(invalid_length(data_type, "0, 1, 2, 4 or 8", n)),
        },
        DataType::Flt4 => Ok(SqlValue::Float(endian.read_f32(array(data_type, bytes)?))),
        DataType::Flt8 => Ok(SqlValue::Double(endian.read_f64(array(data_type, bytes)?))),
        DataType::FltN => match bytes.len() {
            0 => Ok(SqlValue::Null),
            4 => decode_value(DataType::Flt4, endian, bytes),
            8 => decode_value(DataType::Flt8, endian, bytes),
            n => Err(invalid_length(data_type, "0, 4 or 8", n)),
        },
        DataType::Bit => Ok(SqlValue::Bool(bytes[0] == 1)),

        DataType::Binary
        | DataType::VarBinary
        | DataType::LongBinary
        | DataType::Image
        | DataType::Blob
        | DataType::Boundary
        | DataType::Sensitivity => {
            if bytes.is_empty() {
                Ok(SqlValue::Null)
            } else {
                Ok(SqlValue::Binary(Bytes::copy_from_slice(bytes)))
            }
        }
        DataType::Char | DataType::VarChar | DataType::LongChar | DataType::Text | DataType::Xml => {
            if bytes.is_empty() {
                return Ok(SqlValue::Null);
            }
            let s = std::str::from_utf8(bytes)
                .map_err(|e| TypeError::InvalidEncoding(e.to_string()))?;
            Ok(SqlValue::String(s.to_owned()))
        }
        DataType::UniText => decode_utf16(bytes, endian).map(SqlValue::String),

        DataType::ShortMoney | DataType::Money | DataType::MoneyN => decode_money(data_type, endian, bytes),
        DataType::DecN | DataType::NumN => {
            let Some((sign, magnitude)) = bytes.split_first() else {
                return Ok(SqlValue::Null);
            };
            Decimal::from_magnitude(*sign == 1, magnitude, MAX_PRECISION, DEFAULT_SCALE)
                .map(SqlValue::Decimal)
        }

        DataType::Date | DataType::DateN => {
            if bytes.is_empty() {
                return Ok(SqlValue::Null);
            }
            let days = endian.read_i32(array(data_type, bytes)?);
            time::date_from_days(time::epoch_1900(), i64::from(days)).map(SqlValue::Date)
        }
        DataType::Time | DataType::TimeN | DataType::BigTimeN => match bytes.len() {
            0 => Ok(SqlValue::Null),
            4 => {
                let ticks = endian.read_i32(array(data_type, bytes)?);
                time::time_from_ticks(i64::from(ticks)).map(SqlValue::Time)
            }
            8 => {
                let micros = endian.read_u64(array(data_type, bytes)?);
                let micros = i64::try_from(micros).map_err(|_| TypeError::OutOfRange {
                    target_type: "BIGTIMEN",
                })?;
                time::time_from_micros(micros.rem_euclid(time::MICROS_PER_DAY)).map(SqlValue::Time)
            }
            n => Err(invalid_length(data_type, "0, 4 or 8", n)),
        },
        DataType::ShortDate | DataType::DateTime | DataType::DateTimeN => match bytes.len() {
            0 => Ok(SqlValue::Null),
            4 => {
                let days = endian.read_u16([bytes[0], bytes[1]]);
                let minutes = endian.read_u16([bytes[2], bytes[3]]);
                let date = time::date_from_days(time::epoch_1900(), i64::from(days))?;
                let micros = i64::from(minutes) * 60 * 1_000_000;
                Ok(SqlValue::DateTime(date.and_time(time::time_from_micros(micros)?)))
            }
            8 => {
                let days = endian.read_i32([bytes[0], bytes[1], bytes[2], bytes[3]]);
                let ticks = endian.read_u32([bytes[4], bytes[5], bytes[6], bytes[7]]);
                let date = time::date_from_days(time::epoch_1900(), i64::from(days))?;
                Ok(SqlValue::DateTime(
                    date.and_time(time::time_from_ticks(i64::from(ticks))?),
                ))
            }
            n => Err(invalid_length(data_type, "0, 4 or 8", n)),
        },
        DataType::BigDateTimeN => {
            if bytes.is_empty() {
                return Ok(SqlValue::Null);
            }
            let micros = endian.read_u64(array(data_type, bytes)?);
            let micros = i64::try_from(micros).map_err(|_| TypeError::OutOfRange {
                target_type: "BIGDATETIMEN",
            })?;
            time::datetime_from_micros(time::epoch_year_zero(), micros).map(SqlValue::DateTime)
        }

        DataType::Interval => Err(TypeError::Unsupported(data_type)),
    }
}

fn decode_money(data_type: DataType, endian: Endian, bytes: &[u8]) -> Result<SqlValue, TypeError> {
    match bytes.len() {
        0 => Ok(SqlValue::Null),
        4 => {
            let value = endian.read_i32(array(data_type, bytes)?);
            Decimal::from_mantissa(
                i128::from(value),
                decimal::SHORT_MONEY_PRECISION,
                decimal::SHORT_MONEY_SCALE,
            )
            .map(SqlValue::Decimal)
        }
        8 => {
            let high = endian.read_u32([bytes[0], bytes[1], bytes[2], bytes[3]]);
            let low = endian.read_u32([bytes[4], bytes[5], bytes[6], bytes[7]]);
            let value = ((u64::from(high) << 32) | u64::from(low)) as i64;
            Decimal::from_mantissa(i128::from(value), MONEY_PRECISION, MONEY_SCALE)
                .map(SqlValue::Decimal)
        }
        n => Err(invalid_length(data_type, "0, 4 or 8", n)),
    }
}

/// Decode UTF-16 text, dropping the NUL padding the server appends.
pub fn decode_utf16(bytes: &[u8], endian: Endian) -> Result<String, TypeError> {
    if bytes.len() % 2 != 0 {
        return Err(invalid_length(DataType::UniText, "an even number", bytes.len()));
    }

    let units = bytes
        .chunks_exact(2)
        .map(|pair| endian.read_u16([pair[0], pair[1]]));
    let s: String = char::decode_utf16(units)
        .collect::<Result<_, _>>()
        .map_err(|e| TypeError::InvalidEncoding(e.to_string()))?;
    Ok(s.trim_end_matches('\0').to_owned())
}

fn array<const N: usize>(data_type: DataType, bytes: &[u8]) -> Result<[u8; N], TypeError> {
    bytes
        .try_into()
        .map_err(|_| invalid_length(data_type, "the fixed type size", bytes.len()))
}

fn invalid_length(data_type: DataType, expected: &'static str, actual: usize) -> TypeError {
    TypeError::InvalidLength {
        data_type,
        expected,
        actual,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn test_decode_integers() {
        let le = Endian::Little;
        assert_eq!(decode_value(DataType::Int1, le, &[0xFF]).unwrap(), SqlValue::TinyInt(255));
        assert_eq!(
            decode_value(DataType::Int4, le, &[0xFE, 0xFF, 0xFF, 0xFF]).unwrap(),
            SqlValue::Int(-2)
        );
        assert_eq!(
            decode_value(DataType::Int4, Endian::Big, &[0, 0, 1, 0]).unwrap(),
            SqlValue::Int(256)
        );
        assert_eq!(decode_value(DataType::IntN, le, &[]).unwrap(), SqlValue::Null);
        assert_eq!(
            decode_value(DataType::IntN, le, &[1, 0]).unwrap(),
            SqlValue::SmallInt(1)
        );
        assert!(decode_value(DataType::IntN, le, &[1, 0, 0]).is_err());
        assert!(decode_value(DataType::Int4, le, &[1, 0]).is_err());
    }

    #[test]
    fn test_decode_strings() {
        let le = Endian::Little;
        assert_eq!(decode_value(DataType::VarChar, le, &[]).unwrap(), SqlValue::Null);
        assert_eq!(
            decode_value(DataType::VarChar, le, b"abc").unwrap(),
            SqlValue::String("abc".into())
        );
        assert_eq!(
            decode_value(DataType::UniText, le, &[b'h', 0, b'i', 0, 0, 0]).unwrap(),
            SqlValue::String("hi".into())
        );
    }

    #[test]
    fn test_decode_money() {
        let le = Endian::Little;
        let value = decode_value(DataType::MoneyN, le, &[0x10, 0x27, 0, 0]).unwrap();
        assert_eq!(value.as_decimal().unwrap().to_string(), "1.0");

        let value = decode_value(DataType::Money, le, &[0, 0, 0, 0, 0x10, 0x27, 0, 0]).unwrap();
        assert_eq!(value.as_decimal().unwrap().mantissa(), 10_000);
    }

    #[test]
    fn test_decode_decimal() {
        let value = decode_value(DataType::DecN, Endian::Little, &[1, 0x01, 0x00]).unwrap();
        let dec = value.as_decimal().unwrap();
        assert_eq!(dec.mantissa(), -256);
        assert_eq!(dec.precision(), MAX_PRECISION);
        assert_eq!(decode_value(DataType::NumN, Endian::Little, &[]).unwrap(), SqlValue::Null);
    }

    #[test]
    fn test_decode_dates() {
        let le = Endian::Little;
        assert_eq!(
            decode_value(DataType::Date, le, &[1, 0, 0, 0]).unwrap(),
            SqlValue::Date(NaiveDate::from_ymd_opt(1900, 1, 2).unwrap())
        );
        assert_eq!(
            decode_value(DataType::Time, le, &[0x2C, 0x01, 0, 0]).unwrap(),
            SqlValue::Time(NaiveTime::from_hms_opt(0, 0, 1).unwrap())
        );
        let expected = NaiveDate::from_ymd_opt(1900, 1, 2)
            .unwrap()
            .and_hms_opt(0, 2, 0)
            .unwrap();
        assert_eq!(
            decode_value(DataType::ShortDate, le, &[1, 0, 2, 0]).unwrap(),
            SqlValue::DateTime(expected)
        );
    }
}
