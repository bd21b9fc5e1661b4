//! Row normalization.
//!
//! Every read path ends here: a driver row becomes a [`Record`], an ordered
//! map from column name to JSON value.
//!
//! # Architecture
//!
//! PostgreSQL rows are decoded in two phases:
//! 1. `TypeCategory` classifies the column type name
//! 2. a category-specific decoder extracts the value
//!
//! SQL Server rows already carry a typed `ColumnData` per value, so they are
//! converted directly.

use serde_json::Value as JsonValue;

/// A normalized row: column name to value, in column order.
pub type Record = serde_json::Map<String, JsonValue>;

/// Trait for converting result-set rows into [`Record`]s.
pub trait RowToRecord {
    fn to_record(&self) -> Record;
}

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Money,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Timestamp,
    TimestampTz,
    Date,
    Time,
    Interval,
    /// Array of any element type (`_int4`, `text[]`, ...)
    Array,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Array type names carry the element name (`_int4`, `INT4[]`)
    if lower.starts_with('_') || lower.ends_with("[]") {
        return TypeCategory::Array;
    }

    if lower.contains("decimal") || lower.contains("numeric") {
        return TypeCategory::Decimal;
    }

    match lower.as_str() {
        "int2" | "int4" | "int8" | "smallint" | "integer" | "bigint" | "serial" | "bigserial"
        | "smallserial" | "serial2" | "serial4" | "serial8" => return TypeCategory::Integer,
        "money" => return TypeCategory::Money,
        "interval" => return TypeCategory::Interval,
        _ => {}
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    if lower == "uuid" {
        return TypeCategory::Uuid;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    match lower.as_str() {
        "timestamptz" | "timestamp with time zone" => TypeCategory::TimestampTz,
        "timestamp" | "timestamp without time zone" => TypeCategory::Timestamp,
        "date" => TypeCategory::Date,
        "time" | "time without time zone" => TypeCategory::Time,
        "text" | "varchar" | "char" | "bpchar" | "name" | "citext" => TypeCategory::Text,
        _ => TypeCategory::Unknown,
    }
}

/// Encode binary data as a base64 JSON string.
pub fn encode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    JsonValue::String(STANDARD.encode(bytes))
}

/// Convert a float to JSON, keeping non-finite values as strings.
pub fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

/// Build a record by zipping column names with positional values.
pub fn zip_record<I>(columns: &[String], values: I) -> Record
where
    I: IntoIterator<Item = JsonValue>,
{
    columns.iter().cloned().zip(values).collect()
}

// =============================================================================
// PostgreSQL
// =============================================================================

#[cfg(feature = "postgres")]
mod postgres {
    use super::*;
    use sqlx::postgres::types::{PgInterval, PgMoney};
    use sqlx::postgres::{PgRow, PgTypeInfo, PgValueFormat, PgValueRef};
    use sqlx::{Column, Decode, Row, Type, TypeInfo};

    /// Wrapper type for raw NUMERIC values as strings.
    /// This preserves the exact database representation.
    #[derive(Debug)]
    pub struct RawDecimal(pub String);

    impl Type<sqlx::Postgres> for RawDecimal {
        fn type_info() -> PgTypeInfo {
            <String as Type<sqlx::Postgres>>::type_info()
        }

        fn compatible(ty: &PgTypeInfo) -> bool {
            let name = ty.name().to_lowercase();
            name.contains("numeric") || name.contains("decimal")
        }
    }

    impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
        fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
            match value.format() {
                PgValueFormat::Text => {
                    let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
                    Ok(RawDecimal(s.to_string()))
                }
                PgValueFormat::Binary => Ok(RawDecimal(numeric_binary_to_string(value.as_bytes()?)?)),
            }
        }
    }

    /// Any value in the text wire format, as PostgreSQL rendered it.
    ///
    /// Simple (unparameterised) queries return every column as text, so this
    /// covers types without a dedicated decoder there.
    #[derive(Debug)]
    pub struct RawText(pub String);

    impl Type<sqlx::Postgres> for RawText {
        fn type_info() -> PgTypeInfo {
            <String as Type<sqlx::Postgres>>::type_info()
        }

        fn compatible(_ty: &PgTypeInfo) -> bool {
            true
        }
    }

    impl<'r> Decode<'r, sqlx::Postgres> for RawText {
        fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
            match value.format() {
                PgValueFormat::Text => Ok(RawText(value.as_str()?.to_string())),
                PgValueFormat::Binary => Err("binary value has no text rendering".into()),
            }
        }
    }

    /// Render MONEY cents with two fractional digits.
    pub(super) fn money_to_string(cents: i64) -> String {
        let sign = if cents < 0 { "-" } else { "" };
        let abs = cents.unsigned_abs();
        format!("{}{}.{:02}", sign, abs / 100, abs % 100)
    }

    /// Render an interval as an ISO 8601 duration (`P1Y2M3DT4H5M6.5S`).
    pub(super) fn interval_to_string(interval: &PgInterval) -> String {
        let mut out = String::from("P");
        let (years, months) = (interval.months / 12, interval.months % 12);
        if years != 0 {
            out.push_str(&format!("{}Y", years));
        }
        if months != 0 {
            out.push_str(&format!("{}M", months));
        }
        if interval.days != 0 {
            out.push_str(&format!("{}D", interval.days));
        }

        let micros = interval.microseconds;
        if micros != 0 {
            let sign = if micros < 0 { "-" } else { "" };
            let micros = micros.unsigned_abs();
            let hours = micros / 3_600_000_000;
            let minutes = micros / 60_000_000 % 60;
            let seconds = micros / 1_000_000 % 60;
            let fraction = micros % 1_000_000;

            out.push('T');
            if hours != 0 {
                out.push_str(&format!("{}{}H", sign, hours));
            }
            if minutes != 0 {
                out.push_str(&format!("{}{}M", sign, minutes));
            }
            if seconds != 0 || fraction != 0 {
                out.push_str(&format!("{}{}", sign, seconds));
                if fraction != 0 {
                    let digits = format!("{:06}", fraction);
                    out.push('.');
                    out.push_str(digits.trim_end_matches('0'));
                }
                out.push('S');
            }
        }

        if out == "P" {
            out.push_str("T0S");
        }
        out
    }

    /// Render the binary NUMERIC wire format (base-10000 digits) as text.
    pub(super) fn numeric_binary_to_string(buf: &[u8]) -> Result<String, sqlx::error::BoxDynError> {
        const SIGN_NEG: u16 = 0x4000;
        const SIGN_NAN: u16 = 0xC000;

        if buf.len() < 8 {
            return Err("NUMERIC value too short".into());
        }
        let read_u16 = |at: usize| u16::from_be_bytes([buf[at], buf[at + 1]]);
        let ndigits = read_u16(0) as usize;
        let weight = read_u16(2) as i16 as i32;
        let sign = read_u16(4);
        let dscale = read_u16(6) as usize;

        if sign == SIGN_NAN {
            return Ok("NaN".to_string());
        }
        if buf.len() < 8 + ndigits * 2 {
            return Err("NUMERIC digit buffer truncated".into());
        }
        let digits: Vec<u16> = (0..ndigits).map(|i| read_u16(8 + i * 2)).collect();

        let mut out = String::new();
        if sign == SIGN_NEG {
            out.push('-');
        }

        // Integer part: groups 0..=weight
        if weight < 0 {
            out.push('0');
        } else {
            for i in 0..=weight as usize {
                let group = digits.get(i).copied().unwrap_or(0);
                if i == 0 {
                    out.push_str(&group.to_string());
                } else {
                    out.push_str(&format!("{:04}", group));
                }
            }
        }

        if dscale > 0 {
            let mut frac = String::new();
            let mut idx = weight + 1;
            while frac.len() < dscale {
                let group = if idx < 0 {
                    0
                } else {
                    digits.get(idx as usize).copied().unwrap_or(0)
                };
                frac.push_str(&format!("{:04}", group));
                idx += 1;
            }
            frac.truncate(dscale);
            out.push('.');
            out.push_str(&frac);
        }
        Ok(out)
    }

    impl RowToRecord for PgRow {
        fn to_record(&self) -> Record {
            self.columns()
                .iter()
                .enumerate()
                .map(|(idx, col)| {
                    let category = categorize_type(col.type_info().name());
                    (col.name().to_string(), decode_column(self, idx, category))
                })
                .collect()
        }

    }

    fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> JsonValue {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Money => get::<PgMoney>(row, idx)
                .map(|v| JsonValue::String(money_to_string(v.0)))
                .unwrap_or_else(|| decode_text(row, idx)),
            TypeCategory::Interval => get::<PgInterval>(row, idx)
                .map(|v| JsonValue::String(interval_to_string(&v)))
                .unwrap_or_else(|| decode_text(row, idx)),
            TypeCategory::Array => decode_array(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => get::<bool>(row, idx).map_or(JsonValue::Null, JsonValue::Bool),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => {
                get::<Vec<u8>>(row, idx).map_or(JsonValue::Null, |v| encode_binary_value(&v))
            }
            TypeCategory::Json => get::<JsonValue>(row, idx).unwrap_or(JsonValue::Null),
            TypeCategory::Uuid => get::<uuid::Uuid>(row, idx)
                .map_or(JsonValue::Null, |v| JsonValue::String(v.to_string())),
            TypeCategory::Timestamp => get::<chrono::NaiveDateTime>(row, idx)
                .map_or(JsonValue::Null, |v| JsonValue::String(v.to_string())),
            TypeCategory::TimestampTz => get::<chrono::DateTime<chrono::Utc>>(row, idx)
                .map_or(JsonValue::Null, |v| JsonValue::String(v.to_rfc3339())),
            TypeCategory::Date => get::<chrono::NaiveDate>(row, idx)
                .map_or(JsonValue::Null, |v| JsonValue::String(v.to_string())),
            TypeCategory::Time => get::<chrono::NaiveTime>(row, idx)
                .map_or(JsonValue::Null, |v| JsonValue::String(v.to_string())),
            TypeCategory::Text => {
                get::<String>(row, idx).map_or(JsonValue::Null, JsonValue::String)
            }
            TypeCategory::Unknown => decode_text(row, idx),
        }
    }

    fn decode_text(row: &PgRow, idx: usize) -> JsonValue {
        if let Some(v) = get::<String>(row, idx) {
            return JsonValue::String(v);
        }
        get::<RawText>(row, idx).map_or(JsonValue::Null, |v| JsonValue::String(v.0))
    }

    fn decode_array(row: &PgRow, idx: usize) -> JsonValue {
        array_of::<i16>(row, idx, |v| JsonValue::Number(v.into()))
            .or_else(|| array_of::<i32>(row, idx, |v| JsonValue::Number(v.into())))
            .or_else(|| array_of::<i64>(row, idx, |v| JsonValue::Number(v.into())))
            .or_else(|| array_of::<bool>(row, idx, JsonValue::Bool))
            .or_else(|| array_of::<f64>(row, idx, float_value))
            .or_else(|| array_of::<f32>(row, idx, |v| float_value(v as f64)))
            .or_else(|| array_of::<String>(row, idx, JsonValue::String))
            .or_else(|| array_of::<uuid::Uuid>(row, idx, |v| JsonValue::String(v.to_string())))
            .or_else(|| array_of::<JsonValue>(row, idx, |v| v))
            .unwrap_or_else(|| decode_text(row, idx))
    }

    fn array_of<T>(row: &PgRow, idx: usize, convert: impl Fn(T) -> JsonValue) -> Option<JsonValue>
    where
        Vec<Option<T>>: for<'r> Decode<'r, sqlx::Postgres> + Type<sqlx::Postgres>,
    {
        get::<Vec<Option<T>>>(row, idx).map(|items| {
            JsonValue::Array(
                items
                    .into_iter()
                    .map(|item| item.map_or(JsonValue::Null, &convert))
                    .collect(),
            )
        })
    }

    /// Decode a nullable column, treating decode failures as NULL.
    fn get<T>(row: &PgRow, idx: usize) -> Option<T>
    where
        T: for<'r> Decode<'r, sqlx::Postgres> + Type<sqlx::Postgres>,
    {
        row.try_get::<Option<T>, _>(idx).ok().flatten()
    }

    fn decode_decimal(row: &PgRow, idx: usize) -> JsonValue {
        match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(Some(v)) => JsonValue::String(v.0),
            Ok(None) => JsonValue::Null,
            Err(e) => {
                tracing::error!("Failed to decode NUMERIC: {:?}", e);
                JsonValue::Null
            }
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> JsonValue {
        if let Some(v) = get::<i16>(row, idx) {
            return JsonValue::Number(v.into());
        }
        if let Some(v) = get::<i32>(row, idx) {
            return JsonValue::Number(v.into());
        }
        get::<i64>(row, idx).map_or(JsonValue::Null, |v| JsonValue::Number(v.into()))
    }

    fn decode_float(row: &PgRow, idx: usize) -> JsonValue {
        if let Some(v) = get::<f64>(row, idx) {
            return float_value(v);
        }
        get::<f32>(row, idx).map_or(JsonValue::Null, |v| float_value(v as f64))
    }

}

// =============================================================================
// SQL Server
// =============================================================================

#[cfg(feature = "mssql")]
mod mssql {
    use super::*;
    use tiberius::{ColumnData, FromSql, Row};

    /// Convert a row by zipping its column names with its positional values.
    pub fn row_into_record(row: Row) -> Record {
        let columns: Vec<String> = row
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect();
        zip_record(&columns, row.into_iter().map(column_data_to_json))
    }

    /// Convert a single SQL Server value to JSON.
    pub fn column_data_to_json(data: ColumnData<'static>) -> JsonValue {
        match data {
            ColumnData::U8(v) => v.map_or(JsonValue::Null, |v| JsonValue::Number(v.into())),
            ColumnData::I16(v) => v.map_or(JsonValue::Null, |v| JsonValue::Number(v.into())),
            ColumnData::I32(v) => v.map_or(JsonValue::Null, |v| JsonValue::Number(v.into())),
            ColumnData::I64(v) => v.map_or(JsonValue::Null, |v| JsonValue::Number(v.into())),
            ColumnData::F32(v) => v.map_or(JsonValue::Null, |v| float_value(v as f64)),
            ColumnData::F64(v) => v.map_or(JsonValue::Null, float_value),
            ColumnData::Bit(v) => v.map_or(JsonValue::Null, JsonValue::Bool),
            ColumnData::String(v) => {
                v.map_or(JsonValue::Null, |s| JsonValue::String(s.into_owned()))
            }
            ColumnData::Guid(v) => v.map_or(JsonValue::Null, |g| JsonValue::String(g.to_string())),
            ColumnData::Binary(v) => v.map_or(JsonValue::Null, |b| encode_binary_value(&b)),
            ColumnData::Numeric(v) => {
                v.map_or(JsonValue::Null, |n| JsonValue::String(n.to_string()))
            }
            ColumnData::Xml(v) => v.map_or(JsonValue::Null, |x| {
                JsonValue::String(x.into_owned().into_string())
            }),
            other => decode_temporal(&other),
        }
    }

    /// Date and time values go through chrono.
    fn decode_temporal(data: &ColumnData<'static>) -> JsonValue {
        if let Ok(Some(v)) = chrono::DateTime::<chrono::FixedOffset>::from_sql(data) {
            return JsonValue::String(v.to_rfc3339());
        }
        if let Ok(Some(v)) = chrono::NaiveDateTime::from_sql(data) {
            return JsonValue::String(v.to_string());
        }
        if let Ok(Some(v)) = chrono::NaiveDate::from_sql(data) {
            return JsonValue::String(v.to_string());
        }
        if let Ok(Some(v)) = chrono::NaiveTime::from_sql(data) {
            return JsonValue::String(v.to_string());
        }
        JsonValue::Null
    }

}

#[cfg(feature = "mssql")]
pub use mssql::{column_data_to_json, row_into_record};
