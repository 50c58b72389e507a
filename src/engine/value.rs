use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// In-memory value the host engine asks a rule set to render as SQL text.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Exact numeric, already in canonical text form
    Decimal(String),
    String(String),
    Bytes(Vec<u8>),
    Date {
        y: i32,
        m: u32,
        d: u32,
    },
    Time {
        neg: bool,
        h: u32,
        m: u32,
        s: u32,
        us: u32,
    },
    Timestamp {
        y: i32,
        m: u32,
        d: u32,
        hh: u32,
        mm: u32,
        ss: u32,
        us: u32,
    },
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::String(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::String(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Bytes(value)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(date: NaiveDate) -> Self {
        SqlValue::Date {
            y: date.year(),
            m: date.month(),
            d: date.day(),
        }
    }
}

impl From<NaiveTime> for SqlValue {
    fn from(time: NaiveTime) -> Self {
        SqlValue::Time {
            neg: false,
            h: time.hour(),
            m: time.minute(),
            s: time.second(),
            us: time.nanosecond() / 1_000,
        }
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(dt: NaiveDateTime) -> Self {
        SqlValue::Timestamp {
            y: dt.year(),
            m: dt.month(),
            d: dt.day(),
            hh: dt.hour(),
            mm: dt.minute(),
            ss: dt.second(),
            us: dt.nanosecond() / 1_000,
        }
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}
