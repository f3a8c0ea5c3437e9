//! Encoding of SQL values into field payload bytes.
//!
//! The result carries no length prefix or data status; the field layer
//! adds those. NULL always encodes to an empty payload.

use crate::data_type::DataType;
use crate::decimal::{self, Decimal, MONEY_SCALE};
use crate::endian::Endian;
use crate::error::TypeError;
use crate::time;
use crate::value::SqlValue;

/// Encode `value` as the payload of a field of type `data_type`.
///
/// `length` is the maximum length announced by the field format. It picks
/// the width of the nullable numeric and date types and defaults to their
/// widest form when absent.
pub fn encode_value(
    data_type: DataType,
    endian: Endian,
    value: &SqlValue,
    length: Option<usize>,
) -> Result<Vec<u8>, TypeError> {
    if value.is_null() {
        return Ok(Vec::new());
    }

    let bytes = match data_type {
        DataType::Int1 => vec![int_in_range::<u8>(data_type, value)?],
        DataType::Sint1 => int_in_range::<i8>(data_type, value)?.to_ne_bytes().to_vec(),
        DataType::Int2 => endian.write_i16(int_in_range(data_type, value)?).to_vec(),
        DataType::Int4 => endian.write_i32(int_in_range(data_type, value)?).to_vec(),
        DataType::Int8 => endian.write_i64(int_in_range(data_type, value)?).to_vec(),
        DataType::Uint2 => endian.write_u16(int_in_range(data_type, value)?).to_vec(),
        DataType::Uint4 => endian.write_u32(int_in_range(data_type, value)?).to_vec(),
        DataType::Uint8 => endian.write_u64(int_in_range(data_type, value)?).to_vec(),
        DataType::IntN => {
            let inner = match length.unwrap_or_else(|| natural_int_width(value)) {
                1 => DataType::Int1,
                2 => DataType::Int2,
                4 => DataType::Int4,
                _ => DataType::Int8,
            };
            encode_value(inner, endian, value, None)?
        }
        DataType::UintN => {
            let inner = match length.unwrap_or_else(|| natural_int_width(value)) {
                1 => DataType::Int1,
                2 => DataType::Uint2,
                4 => DataType::Uint4,
                _ => DataType::Uint8,
            };
            encode_value(inner, endian, value, None)?
        }

        DataType::Flt4 => endian.write_f32(float_value(data_type, value)? as f32).to_vec(),
        DataType::Flt8 => endian.write_f64(float_value(data_type, value)?).to_vec(),
        DataType::FltN => match length {
            Some(4) => encode_value(DataType::Flt4, endian, value, None)?,
            _ => encode_value(DataType::Flt8, endian, value, None)?,
        },
        DataType::Bit => match value {
            SqlValue::Bool(b) => vec![u8::from(*b)],
            other => vec![u8::from(int_in_range::<u8>(data_type, other)? != 0)],
        },

        DataType::Binary
        | DataType::VarBinary
        | DataType::LongBinary
        | DataType::Image
        | DataType::Blob
        | DataType::Boundary
        | DataType::Sensitivity => match value {
            SqlValue::Binary(b) => b.to_vec(),
            SqlValue::String(s) => s.as_bytes().to_vec(),
            other => return Err(mismatch(data_type, other)),
        },
        DataType::Char | DataType::VarChar | DataType::LongChar | DataType::Text | DataType::Xml => {
            match value {
                SqlValue::String(s) => s.as_bytes().to_vec(),
                SqlValue::Binary(b) => b.to_vec(),
                other => return Err(mismatch(data_type, other)),
            }
        }
        DataType::UniText => match value {
            SqlValue::String(s) => encode_utf16(s, endian),
            other => return Err(mismatch(data_type, other)),
        },

        DataType::ShortMoney => encode_money(data_type, endian, value, 4)?,
        DataType::Money => encode_money(data_type, endian, value, 8)?,
        DataType::MoneyN => encode_money(data_type, endian, value, length.unwrap_or(8))?,
        DataType::DecN | DataType::NumN => {
            let dec = decimal_value(data_type, value)?;
            let magnitude = dec.magnitude_bytes();
            let mut bytes = Vec::with_capacity(magnitude.len() + 1);
            bytes.push(u8::from(dec.is_negative()));
            bytes.extend_from_slice(&magnitude);
            bytes
        }

        DataType::Date | DataType::DateN => {
            let SqlValue::Date(date) = value else {
                return Err(mismatch(data_type, value));
            };
            let days = time::days_since(time::epoch_1900(), *date);
            endian.write_i32(narrow(days, "DATE")?).to_vec()
        }
        DataType::Time | DataType::TimeN => {
            let SqlValue::Time(t) = value else {
                return Err(mismatch(data_type, value));
            };
            endian.write_i32(narrow(time::ticks_from_time(*t), "TIME")?).to_vec()
        }
        DataType::BigTimeN => {
            let SqlValue::Time(t) = value else {
                return Err(mismatch(data_type, value));
            };
            endian.write_i64(time::micros_from_time(*t)).to_vec()
        }
        DataType::ShortDate => encode_datetime(data_type, endian, value, 4)?,
        DataType::DateTime => encode_datetime(data_type, endian, value, 8)?,
        DataType::DateTimeN => encode_datetime(data_type, endian, value, length.unwrap_or(8))?,
        DataType::BigDateTimeN => {
            let SqlValue::DateTime(dt) = value else {
                return Err(mismatch(data_type, value));
            };
            endian
                .write_i64(time::micros_since(time::epoch_year_zero(), *dt))
                .to_vec()
        }

        DataType::Interval => return Err(TypeError::Unsupported(data_type)),
    };

    Ok(bytes)
}

fn encode_money(
    data_type: DataType,
    endian: Endian,
    value: &SqlValue,
    width: usize,
) -> Result<Vec<u8>, TypeError> {
    let mantissa = match value {
        SqlValue::Decimal(dec) => dec.rescaled_mantissa(MONEY_SCALE)?,
        other => int_value(other)
            .ok_or_else(|| mismatch(data_type, other))?
            .checked_mul(10_000)
            .ok_or(TypeError::OutOfRange {
                target_type: "MONEY",
            })?,
    };

    if width == 4 {
        let value: i32 = narrow(mantissa, "SHORTMONEY")?;
        return Ok(endian.write_i32(value).to_vec());
    }

    let value: i64 = narrow(mantissa, "MONEY")?;
    let mut bytes = Vec::with_capacity(8);
    bytes.extend_from_slice(&endian.write_u32((value >> 32) as u32));
    bytes.extend_from_slice(&endian.write_u32(value as u32));
    Ok(bytes)
}

fn encode_datetime(
    data_type: DataType,
    endian: Endian,
    value: &SqlValue,
    width: usize,
) -> Result<Vec<u8>, TypeError> {
    let dt = match value {
        SqlValue::DateTime(dt) => *dt,
        SqlValue::Date(date) => date.and_time(time::time_from_micros(0)?),
        other => return Err(mismatch(data_type, other)),
    };
    let days = time::days_since(time::epoch_1900(), dt.date());
    let mut bytes = Vec::with_capacity(width);

    if width == 4 {
        let minutes = time::micros_from_time(dt.time()) / 60_000_000;
        bytes.extend_from_slice(&endian.write_u16(narrow(days, "SHORTDATE")?));
        bytes.extend_from_slice(&endian.write_u16(narrow(minutes, "SHORTDATE")?));
    } else {
        let ticks = time::ticks_from_time(dt.time());
        bytes.extend_from_slice(&endian.write_i32(narrow(days, "DATETIME")?));
        bytes.extend_from_slice(&endian.write_u32(narrow(ticks, "DATETIME")?));
    }
    Ok(bytes)
}

/// Encode text as UTF-16 code units.
#[must_use]
pub fn encode_utf16(s: &str, endian: Endian) -> Vec<u8> {
    s.encode_utf16().flat_map(|unit| endian.write_u16(unit)).collect()
}

fn int_value(value: &SqlValue) -> Option<i128> {
    match value {
        SqlValue::Bool(v) => Some(i128::from(*v)),
        SqlValue::TinyInt(v) => Some(i128::from(*v)),
        SqlValue::SignedTinyInt(v) => Some(i128::from(*v)),
        SqlValue::SmallInt(v) => Some(i128::from(*v)),
        SqlValue::UnsignedSmallInt(v) => Some(i128::from(*v)),
        SqlValue::Int(v) => Some(i128::from(*v)),
        SqlValue::UnsignedInt(v) => Some(i128::from(*v)),
        SqlValue::BigInt(v) => Some(i128::from(*v)),
        SqlValue::UnsignedBigInt(v) => Some(i128::from(*v)),
        _ => None,
    }
}

fn int_in_range<T: TryFrom<i128>>(data_type: DataType, value: &SqlValue) -> Result<T, TypeError> {
    let v = int_value(value).ok_or_else(|| mismatch(data_type, value))?;
    T::try_from(v).map_err(|_| TypeError::OutOfRange {
        target_type: data_type.name(),
    })
}

fn natural_int_width(value: &SqlValue) -> usize {
    match value {
        SqlValue::TinyInt(_) => 1,
        SqlValue::SmallInt(_) | SqlValue::UnsignedSmallInt(_) => 2,
        SqlValue::Int(_) | SqlValue::UnsignedInt(_) => 4,
        _ => 8,
    }
}

fn float_value(data_type: DataType, value: &SqlValue) -> Result<f64, TypeError> {
    match value {
        SqlValue::Float(v) => Ok(f64::from(*v)),
        SqlValue::Double(v) => Ok(*v),
        other => int_value(other)
            .map(|v| v as f64)
            .ok_or_else(|| mismatch(data_type, other)),
    }
}

fn decimal_value(data_type: DataType, value: &SqlValue) -> Result<Decimal, TypeError> {
    match value {
        SqlValue::Decimal(dec) => Ok(*dec),
        other => {
            let v = int_value(other).ok_or_else(|| mismatch(data_type, other))?;
            Decimal::from_mantissa(v, decimal::MAX_PRECISION, 0)
        }
    }
}

fn narrow<S, T>(value: S, target_type: &'static str) -> Result<T, TypeError>
where
    T: TryFrom<S>,
{
    T::try_from(value).map_err(|_| TypeError::OutOfRange { target_type })
}

fn mismatch(data_type: DataType, value: &SqlValue) -> TypeError {
    TypeError::TypeMismatch {
        data_type,
        actual: value.kind(),
    }
}
