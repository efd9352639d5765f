//! SQL identifier checks and quoting.
//!
//! DDL statements cannot bind identifiers as parameters, so names are
//! spliced into the statement text. Only a conservative character set is
//! accepted and the result is always quoted.

use crate::error::{OpsError, Result};

/// PostgreSQL truncates identifiers beyond NAMEDATALEN - 1 bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Check that `ident` is safe to splice into a statement.
pub fn check(ident: &str) -> Result<&str> {
    if ident.is_empty() {
        return Err(OpsError::InvalidIdentifier(ident.to_string(), "empty"));
    }
    if ident.len() > MAX_IDENTIFIER_LEN {
        return Err(OpsError::InvalidIdentifier(
            ident.to_string(),
            "longer than 63 bytes",
        ));
    }
    if !ident
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err(OpsError::InvalidIdentifier(
            ident.to_string(),
            "only ASCII letters, digits, '_' and '-' are allowed",
        ));
    }
    Ok(ident)
}

/// `"ident"` for PostgreSQL.
pub fn pg_quote(ident: &str) -> Result<String> {
    Ok(format!("\"{}\"", check(ident)?))
}

/// `` `ident` `` for MySQL schema names.
pub fn mysql_quote(ident: &str) -> Result<String> {
    Ok(format!("`{}`", check(ident)?))
}

/// Host part of accounts created by the operator.
pub const MYSQL_ANY_HOST: &str = "%";

/// Check a MySQL account host such as `%`, `localhost`, `10.0.%` or `::1`.
pub fn check_host(host: &str) -> Result<&str> {
    if host.is_empty() {
        return Err(OpsError::InvalidIdentifier(host.to_string(), "empty"));
    }
    if host.len() > 255 {
        return Err(OpsError::InvalidIdentifier(
            host.to_string(),
            "longer than 255 bytes",
        ));
    }
    if !host
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_' | b'%' | b':'))
    {
        return Err(OpsError::InvalidIdentifier(
            host.to_string(),
            "not a valid account host",
        ));
    }
    Ok(host)
}

/// `'user'@'%'` for MySQL accounts.
pub fn mysql_account(user: &str) -> Result<String> {
    mysql_host_account(user, MYSQL_ANY_HOST)
}

/// `'user'@'host'` for an existing MySQL account.
pub fn mysql_host_account(user: &str, host: &str) -> Result<String> {
    Ok(format!("'{}'@'{}'", check(user)?, check_host(host)?))
}
