use crate::engine::value::SqlValue;
use crate::error::{Error, Result};

/// Rendering rules for one database product.
///
/// Every method except [`RuleSet::name`] and [`RuleSet::quote_identifier`]
/// has an ANSI default, so an implementation only overrides what its
/// product does differently.
pub trait RuleSet: Send + Sync {
    /// Rule set display name (used in logs).
    fn name(&self) -> &str;

    /// Quote an identifier (table/column name).
    fn quote_identifier(&self, name: &str) -> String;

    /// Whether `_charset'...'` and `u&'...'` literals may be generated.
    fn supports_charset(&self) -> bool {
        true
    }

    /// Quote a string literal, optionally tagged with a charset.
    fn quote_string_literal(&self, value: &str, charset: Option<&str>) -> String {
        ansi_string_literal(value, charset)
    }

    fn null_literal(&self) -> &str {
        "NULL"
    }

    fn boolean_literal(&self, value: bool) -> &str {
        if value {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    fn binary_literal(&self, bytes: &[u8]) -> String {
        format!("X'{}'", hex::encode_upper(bytes))
    }

    /// Digits kept after the seconds separator in time literals.
    fn fractional_second_digits(&self) -> u32 {
        6
    }

    /// Largest fraction (in rendered digits) the server stores without
    /// rounding into the next second; larger fractions are clamped to it.
    fn fraction_ceiling(&self) -> Option<u32> {
        None
    }

    fn supports_negative_time(&self) -> bool {
        true
    }

    /// Convert a neutral `SqlValue` into a literal for this rule set.
    ///
    /// Negative times are rendered with a leading `-` even where the
    /// product cannot store them; [`RuleSet::try_to_literal`] refuses them.
    fn to_literal(&self, value: &SqlValue) -> String {
        match value {
            SqlValue::Null => self.null_literal().to_string(),
            SqlValue::Bool(v) => self.boolean_literal(*v).to_string(),
            SqlValue::Int(v) => v.to_string(),
            SqlValue::Float(v) => format_f64(*v),
            SqlValue::Decimal(v) => v.clone(),
            SqlValue::String(v) => self.quote_string_literal(v, None),
            SqlValue::Bytes(bytes) => self.binary_literal(bytes),
            SqlValue::Date { y, m, d } => format!("'{:04}-{:02}-{:02}'", y, m, d),
            SqlValue::Time { neg, h, m, s, us } => {
                let sign = if *neg { "-" } else { "" };
                format!(
                    "'{}{:02}:{:02}:{:02}{}'",
                    sign,
                    h,
                    m,
                    s,
                    fraction(*us, self.fractional_second_digits(), self.fraction_ceiling())
                )
            }
            SqlValue::Timestamp {
                y,
                m,
                d,
                hh,
                mm,
                ss,
                us,
            } => format!(
                "'{:04}-{:02}-{:02} {:02}:{:02}:{:02}{}'",
                y,
                m,
                d,
                hh,
                mm,
                ss,
                fraction(*us, self.fractional_second_digits(), self.fraction_ceiling())
            ),
        }
    }

    /// [`RuleSet::to_literal`] for values the product can actually store.
    fn try_to_literal(&self, value: &SqlValue) -> Result<String> {
        if matches!(value, SqlValue::Time { neg: true, .. }) && !self.supports_negative_time() {
            return Err(Error::unsupported_literal(format!(
                "{} has no negative time values",
                self.name()
            )));
        }
        Ok(self.to_literal(value))
    }

    /// Format a potentially schema-qualified table name.
    fn quote_qualified(&self, name: &str) -> String {
        let (schema, table) = split_table_name(name);
        match schema {
            Some(schema_name) => format!(
                "{}.{}",
                self.quote_identifier(schema_name),
                self.quote_identifier(table)
            ),
            None => self.quote_identifier(table),
        }
    }
}

/// Split a qualified table name into (schema, table) components.
pub fn split_table_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once('.') {
        Some((schema, table)) if !schema.is_empty() => (Some(schema), table),
        _ => (None, name),
    }
}

/// ANSI string literal: `_charset'...'` when a charset is named, `u&'...'`
/// with escapes for non-ASCII text, plain `'...'` otherwise.
pub fn ansi_string_literal(value: &str, charset: Option<&str>) -> String {
    let mut buf = String::with_capacity(value.len() + 8);
    if let Some(charset) = charset {
        buf.push('_');
        buf.push_str(charset);
        push_doubled(&mut buf, value);
    } else if value.is_ascii() {
        push_doubled(&mut buf, value);
    } else {
        buf.push_str("u&'");
        for ch in value.chars() {
            match ch {
                '\'' => buf.push_str("''"),
                '\\' => buf.push_str("\\\\"),
                c if c.is_ascii() => buf.push(c),
                c if (c as u32) <= 0xFFFF => buf.push_str(&format!("\\{:04X}", c as u32)),
                c => buf.push_str(&format!("\\+{:06X}", c as u32)),
            }
        }
        buf.push('\'');
    }
    buf
}

fn push_doubled(buf: &mut String, value: &str) {
    buf.push('\'');
    buf.push_str(&value.replace('\'', "''"));
    buf.push('\'');
}

/// `.ffffff` truncated to `digits` and clamped to `ceiling`, empty for
/// whole seconds
fn fraction(us: u32, digits: u32, ceiling: Option<u32>) -> String {
    if us == 0 || digits == 0 {
        return String::new();
    }
    let digits = digits.min(6);
    let mut scaled = us / 10u32.pow(6 - digits);
    if let Some(ceiling) = ceiling {
        scaled = scaled.min(ceiling);
    }
    format!(".{:0width$}", scaled, width = digits as usize)
}

fn format_f64(value: f64) -> String {
    if value.is_nan() {
        "'NaN'".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "'Infinity'".to_string()
        } else {
            "'-Infinity'".to_string()
        }
    } else {
        value.to_string()
    }
}
