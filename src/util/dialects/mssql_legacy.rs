use crate::engine::dialect::RuleSet;
use crate::error::Result;
use crate::util::dialects::rules::{self, BaseRules, MSSQL_LEGACY_RULES};
use crate::util::sql_escape;
use std::sync::{Arc, OnceLock};

static SHARED: OnceLock<Arc<DialectAdapter>> = OnceLock::new();

/// Legacy SQL Server dialect.
///
/// Everything is taken from the base rule set except charset-literal
/// support, which is switched off, and string quoting, which uses the
/// `N'...'` form.
#[derive(Debug)]
pub struct DialectAdapter {
    base: Arc<BaseRules>,
}

impl DialectAdapter {
    pub fn new(base: Arc<BaseRules>) -> Self {
        Self { base }
    }

    /// Process-wide instance built from the cached legacy rules.
    pub fn shared() -> Result<Arc<Self>> {
        if let Some(adapter) = SHARED.get() {
            return Ok(Arc::clone(adapter));
        }
        let adapter = Arc::new(Self::new(rules::load(&MSSQL_LEGACY_RULES)?));
        // a racing initializer may have won; both built the same value
        Ok(Arc::clone(SHARED.get_or_init(|| adapter)))
    }

    pub fn base(&self) -> &BaseRules {
        &self.base
    }
}

impl RuleSet for DialectAdapter {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn quote_identifier(&self, name: &str) -> String {
        self.base.quote_identifier(name)
    }

    fn supports_charset(&self) -> bool {
        sql_escape::SUPPORTS_CHARSET_LITERALS
    }

    fn quote_string_literal(&self, value: &str, charset: Option<&str>) -> String {
        sql_escape::quote(value, charset)
    }

    fn null_literal(&self) -> &str {
        self.base.null_literal()
    }

    fn boolean_literal(&self, value: bool) -> &str {
        self.base.boolean_literal(value)
    }

    fn binary_literal(&self, bytes: &[u8]) -> String {
        self.base.binary_literal(bytes)
    }

    fn fractional_second_digits(&self) -> u32 {
        self.base.fractional_second_digits()
    }

    fn fraction_ceiling(&self) -> Option<u32> {
        self.base.fraction_ceiling()
    }

    fn supports_negative_time(&self) -> bool {
        self.base.supports_negative_time()
    }
}
