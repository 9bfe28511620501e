//! Allow-list validation and quoting for tokens interpolated into shell commands.
//!
//! Every user-supplied value that ends up on a remote command line passes
//! through one of the validators here, and every interpolated token goes
//! through [`quote`]. Validation rejects anything outside the allow-list;
//! quoting guarantees the remote shell sees exactly one word.

use nucleus_shared::{NucleusError, NucleusResult};

/// Maximum length of a single DNS label (RFC 1123).
const MAX_HOSTNAME_LEN: usize = 63;

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '/' | '=' | ',' | '@' | '+' | '%')
}

/// Quote a token for a POSIX shell.
///
/// Tokens made only of shell-safe characters are returned unchanged so the
/// rendered command stays readable. Anything else is wrapped in single quotes
/// with embedded quotes escaped as `'\''`.
pub fn quote(token: &str) -> String {
    if !token.is_empty() && token.chars().all(is_shell_safe) {
        return token.to_string();
    }
    format!("'{}'", token.replace('\'', r"'\''"))
}

/// Validate a logical server name for use as a container hostname.
pub fn validate_hostname(name: &str) -> NucleusResult<()> {
    if name.is_empty() {
        return Err(NucleusError::Validation("server name is empty".into()));
    }
    if name.len() > MAX_HOSTNAME_LEN {
        return Err(NucleusError::Validation(format!(
            "server name '{}' exceeds {} characters",
            name, MAX_HOSTNAME_LEN
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(NucleusError::Validation(format!(
            "server name '{}' may only contain letters, digits and '-'",
            name
        )));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(NucleusError::Validation(format!(
            "server name '{}' must not start or end with '-'",
            name
        )));
    }
    Ok(())
}

/// Validate a Debian package name (optionally with an `:arch` qualifier).
pub fn validate_package_name(name: &str) -> NucleusResult<()> {
    let valid = name.len() >= 2
        && name.starts_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | ':'));
    if !valid {
        return Err(NucleusError::Validation(format!(
            "invalid package name '{}'",
            name
        )));
    }
    Ok(())
}

/// Validate a package version pin.
///
/// The `latest` sentinel is accepted; otherwise the Debian version charset.
pub fn validate_package_version(version: &str) -> NucleusResult<()> {
    let valid = !version.is_empty()
        && version.starts_with(|c: char| c.is_ascii_alphanumeric())
        && version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '~' | ':' | '-'));
    if !valid {
        return Err(NucleusError::Validation(format!(
            "invalid package version '{}'",
            version
        )));
    }
    Ok(())
}

/// Validate a configuration token (template reference, bridge, storage).
///
/// These come from operator configuration rather than end users, but still
/// end up on the command line.
pub fn validate_config_token(what: &str, value: &str) -> NucleusResult<()> {
    if value.is_empty() || !value.chars().all(is_shell_safe) {
        return Err(NucleusError::Config(format!(
            "{} '{}' contains characters that are not allowed",
            what, value
        )));
    }
    Ok(())
}
