//! Declarative base rule sets and their process-wide cache.

use crate::engine::dialect::RuleSet;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// An embedded rule document plus the identity it is cached under.
#[derive(Debug, Clone, Copy)]
pub struct RuleDefinition {
    pub name: &'static str,
    pub source: &'static str,
}

/// Base rules for legacy SQL Server.
pub const MSSQL_LEGACY_RULES: RuleDefinition = RuleDefinition {
    name: "mssql-legacy",
    source: include_str!("../../../rules/mssql-legacy.toml"),
};

static CACHE: OnceLock<Mutex<HashMap<&'static str, Arc<BaseRules>>>> = OnceLock::new();

/// Load `definition`, parsing it only on the first request.
pub fn load(definition: &RuleDefinition) -> Result<Arc<BaseRules>> {
    let mut cache = CACHE.get_or_init(Default::default).lock();
    if let Some(rules) = cache.get(definition.name) {
        return Ok(Arc::clone(rules));
    }

    let rules = Arc::new(BaseRules::parse(definition)?);
    debug!(rules = definition.name, product = %rules.product, "loaded dialect rules");
    cache.insert(definition.name, Arc::clone(&rules));
    Ok(rules)
}

#[derive(Debug, Deserialize)]
struct IdentifierRules {
    open_quote: String,
    close_quote: String,
}

#[derive(Debug, Deserialize)]
struct LiteralRules {
    supports_charset: bool,
    null: String,
    #[serde(rename = "true")]
    true_literal: String,
    #[serde(rename = "false")]
    false_literal: String,
    binary_prefix: String,
    fractional_second_digits: u32,
    #[serde(default)]
    fraction_ceiling: Option<u32>,
    #[serde(default = "default_negative_time")]
    negative_time: bool,
}

fn default_negative_time() -> bool {
    true
}

/// Rule set read from a [`RuleDefinition`]; immutable once parsed.
#[derive(Debug, Deserialize)]
pub struct BaseRules {
    name: String,
    product: String,
    identifiers: IdentifierRules,
    literals: LiteralRules,
}

impl BaseRules {
    /// Parse without touching the cache
    pub fn parse(definition: &RuleDefinition) -> Result<Self> {
        let invalid = |message: String| Error::RuleDefinition {
            name: definition.name.to_string(),
            message,
        };

        let rules: BaseRules = toml::from_str(definition.source).map_err(|e| invalid(e.to_string()))?;

        if rules.identifiers.open_quote.is_empty() || rules.identifiers.close_quote.is_empty() {
            return Err(invalid("identifier quotes must not be empty".into()));
        }
        if rules.literals.fractional_second_digits > 6 {
            return Err(invalid(format!(
                "fractional_second_digits {} exceeds 6",
                rules.literals.fractional_second_digits
            )));
        }
        if let Some(ceiling) = rules.literals.fraction_ceiling {
            if ceiling >= 10u32.pow(rules.literals.fractional_second_digits) {
                return Err(invalid(format!(
                    "fraction_ceiling {} does not fit in {} digits",
                    ceiling, rules.literals.fractional_second_digits
                )));
            }
        }
        Ok(rules)
    }

    pub fn product(&self) -> &str {
        &self.product
    }
}

impl RuleSet for BaseRules {
    fn name(&self) -> &str {
        &self.name
    }

    fn quote_identifier(&self, name: &str) -> String {
        let close = &self.identifiers.close_quote;
        format!(
            "{}{}{}",
            self.identifiers.open_quote,
            name.replace(close.as_str(), &close.repeat(2)),
            close
        )
    }

    fn supports_charset(&self) -> bool {
        self.literals.supports_charset
    }

    fn null_literal(&self) -> &str {
        &self.literals.null
    }

    fn boolean_literal(&self, value: bool) -> &str {
        if value {
            &self.literals.true_literal
        } else {
            &self.literals.false_literal
        }
    }

    fn binary_literal(&self, bytes: &[u8]) -> String {
        if bytes.is_empty() {
            // 0x alone is not a valid binary literal on old servers
            return format!("{}0", self.literals.binary_prefix);
        }
        format!("{}{}", self.literals.binary_prefix, hex::encode_upper(bytes))
    }

    fn fractional_second_digits(&self) -> u32 {
        self.literals.fractional_second_digits
    }

    fn fraction_ceiling(&self) -> Option<u32> {
        self.literals.fraction_ceiling
    }

    fn supports_negative_time(&self) -> bool {
        self.literals.negative_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::value::SqlValue;

    #[test]
    fn embedded_definition_parses() {
        let rules = BaseRules::parse(&MSSQL_LEGACY_RULES).unwrap();
        assert_eq!(rules.name(), "mssql-legacy");
        assert!(rules.supports_charset());
        assert_eq!(rules.quote_identifier("order"), "[order]");
        assert_eq!(rules.quote_identifier("a]b"), "[a]]b]");
        assert_eq!(rules.quote_qualified("dbo.Orders"), "[dbo].[Orders]");
    }

    #[test]
    fn base_literals_follow_definition() {
        let rules = BaseRules::parse(&MSSQL_LEGACY_RULES).unwrap();
        assert_eq!(rules.to_literal(&SqlValue::Bool(true)), "1");
        assert_eq!(rules.to_literal(&SqlValue::Bool(false)), "0");
        assert_eq!(rules.to_literal(&SqlValue::Bytes(vec![0xde, 0xad])), "0xDEAD");
        assert_eq!(rules.to_literal(&SqlValue::Bytes(vec![])), "0x0");
        assert_eq!(
            rules.to_literal(&SqlValue::Time {
                neg: false,
                h: 8,
                m: 30,
                s: 0,
                us: 987_654,
            }),
            "'08:30:00.987'"
        );
        assert_eq!(
            rules.to_literal(&SqlValue::Time {
                neg: false,
                h: 23,
                m: 59,
                s: 59,
                us: 999_500,
            }),
            "'23:59:59.997'"
        );
        // base rules still speak ANSI for strings
        assert_eq!(rules.quote_string_literal("é", None), "u&'\\00E9'");
    }

    #[test]
    fn cache_returns_same_instance() {
        let first = load(&MSSQL_LEGACY_RULES).unwrap();
        let second = load(&MSSQL_LEGACY_RULES).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn concurrent_loads_share_one_instance() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| load(&MSSQL_LEGACY_RULES).unwrap()))
            .collect();
        let loaded: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(loaded.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn rejects_broken_definitions() {
        let broken = RuleDefinition {
            name: "broken",
            source: "name = \"x\"",
        };
        assert!(matches!(
            BaseRules::parse(&broken),
            Err(Error::RuleDefinition { .. })
        ));

        let bad_digits = RuleDefinition {
            name: "bad-digits",
            source: r#"
name = "x"
product = "y"
[identifiers]
open_quote = "["
close_quote = "]"
[literals]
supports_charset = true
null = "NULL"
true = "1"
false = "0"
binary_prefix = "0x"
fractional_second_digits = 9
"#,
        };
        assert!(load(&bad_digits).is_err());

        let bad_ceiling = RuleDefinition {
            name: "bad-ceiling",
            source: r#"
name = "x"
product = "y"
[identifiers]
open_quote = "["
close_quote = "]"
[literals]
supports_charset = true
null = "NULL"
true = "1"
false = "0"
binary_prefix = "0x"
fractional_second_digits = 3
fraction_ceiling = 1000
"#,
        };
        assert!(matches!(
            BaseRules::parse(&bad_ceiling),
            Err(Error::RuleDefinition { .. })
        ));
    }

    #[test]
    fn negative_time_is_refused() {
        let rules = BaseRules::parse(&MSSQL_LEGACY_RULES).unwrap();
        assert!(!rules.supports_negative_time());
        let err = rules
            .try_to_literal(&SqlValue::Time {
                neg: true,
                h: 8,
                m: 30,
                s: 0,
                us: 0,
            })
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedLiteral { .. }));
        assert_eq!(rules.try_to_literal(&SqlValue::Int(7)).unwrap(), "7");
    }
}
