//! String literal quoting for legacy SQL Server.
//!
//! Old servers have no ANSI charset literals (`_charset'...'`, `u&'...'`);
//! Unicode text is written as `N'...'` instead. Single quotes are the only
//! escaped character, every other byte reaches the server as-is.

/// Legacy servers do not accept generic charset-literal syntax.
pub const SUPPORTS_CHARSET_LITERALS: bool = false;

/// Quote `value` as a string literal.
///
/// The `N` prefix is used when a charset is requested or the value holds
/// any character outside 7-bit ASCII.
pub fn quote(value: &str, charset: Option<&str>) -> String {
    let mut buf = String::with_capacity(value.len() + 3);
    write_quoted(&mut buf, value, charset);
    buf
}

/// Append the quoted form of `value` to `buf`
pub fn write_quoted(buf: &mut String, value: &str, charset: Option<&str>) {
    if needs_unicode_prefix(value, charset) {
        buf.push('N');
    }
    buf.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            buf.push('\'');
        }
        buf.push(ch);
    }
    buf.push('\'');
}

/// True when [`quote`] would emit the `N` prefix
pub fn needs_unicode_prefix(value: &str, charset: Option<&str>) -> bool {
    charset.is_some() || !value.is_ascii()
}
