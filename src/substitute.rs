//! Recursive `$TOKEN` substitution over loosely-typed configuration values.
//!
//! Package descriptions and script/config-file templates may reference
//! package-scoped variables (`$PACKAGE_INSTALL_DIR` and friends) and process
//! environment variables. Substitution is literal substring replacement of
//! `$NAME` — no braces, no escaping, and substituted text is never expanded
//! again. Values form a closed tree ([`Value`]); anything outside that set is
//! rejected when the tree is built, not when it is walked.

use crate::error::{InstallError, Result};
use std::collections::BTreeMap;

/// A loosely-typed configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A string leaf; the only shape substitution rewrites.
    Str(String),
    /// An integer leaf, passed through untouched.
    Int(i64),
    /// A boolean leaf, passed through untouched.
    Bool(bool),
    /// An ordered list of values.
    List(Vec<Value>),
    /// A string-keyed map of values.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Converts a TOML value into the closed [`Value`] set.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::UnsupportedValue`] for floats, datetimes, or
    /// any other tag outside string/integer/boolean/array/table.
    pub fn from_toml(value: toml::Value) -> Result<Self> {
        match value {
            toml::Value::String(s) => Ok(Self::Str(s)),
            toml::Value::Integer(i) => Ok(Self::Int(i)),
            toml::Value::Boolean(b) => Ok(Self::Bool(b)),
            toml::Value::Array(items) => Ok(Self::List(
                items
                    .into_iter()
                    .map(Self::from_toml)
                    .collect::<Result<Vec<_>>>()?,
            )),
            toml::Value::Table(table) => Ok(Self::Map(
                table
                    .into_iter()
                    .map(|(key, value)| Ok((key, Self::from_toml(value)?)))
                    .collect::<Result<BTreeMap<_, _>>>()?,
            )),
            toml::Value::Float(_) => Err(InstallError::UnsupportedValue { kind: "float" }),
            toml::Value::Datetime(_) => Err(InstallError::UnsupportedValue { kind: "datetime" }),
        }
    }
}

/// A named set of `$TOKEN` bindings applied in order.
pub type Bindings = Vec<(String, String)>;

/// Snapshot of the process environment as substitution bindings.
#[must_use]
pub fn env_bindings() -> Bindings {
    std::env::vars().collect()
}

/// Replaces every `$NAME` occurrence in `text` for each binding in order.
///
/// # Examples
///
/// ```
/// use pkgforge::substitute::substitute_text;
///
/// let bindings = vec![("PACKAGE_INSTALL_DIR".to_owned(), "/opt/zlib".to_owned())];
/// assert_eq!(
///     substitute_text("--with-lib=$PACKAGE_INSTALL_DIR/lib", &bindings),
///     "--with-lib=/opt/zlib/lib"
/// );
/// ```
#[must_use]
pub fn substitute_text(text: &str, bindings: &Bindings) -> String {
    let mut result = text.to_owned();
    for (name, value) in bindings {
        let token = format!("${name}");
        result = result.replace(&token, value);
    }
    result
}

/// Rewrites every string leaf of `value`, preserving the tree shape.
#[must_use]
pub fn substitute_value(value: Value, bindings: &Bindings) -> Value {
    match value {
        Value::Str(s) => Value::Str(substitute_text(&s, bindings)),
        Value::Int(_) | Value::Bool(_) => value,
        Value::List(items) => Value::List(
            items
                .into_iter()
                .map(|item| substitute_value(item, bindings))
                .collect(),
        ),
        Value::Map(entries) => Value::Map(
            entries
                .into_iter()
                .map(|(key, entry)| (key, substitute_value(entry, bindings)))
                .collect(),
        ),
    }
}

/// Applies the two standard passes — package variables, then the process
/// environment — to a single string.
#[must_use]
pub fn resolve_text(text: &str, package_vars: &Bindings) -> String {
    let once = substitute_text(text, package_vars);
    substitute_text(&once, &env_bindings())
}

/// Applies both passes to every string in a list.
#[must_use]
pub fn resolve_strings(items: Vec<String>, package_vars: &Bindings) -> Vec<String> {
    let env = env_bindings();
    items
        .into_iter()
        .map(|item| {
            let once = substitute_text(&item, package_vars);
            substitute_text(&once, &env)
        })
        .collect()
}

/// Applies both passes to every string in a list of pairs.
#[must_use]
pub fn resolve_pairs(
    items: Vec<(String, String)>,
    package_vars: &Bindings,
) -> Vec<(String, String)> {
    items
        .into_iter()
        .map(|(first, second)| {
            (
                resolve_text(&first, package_vars),
                resolve_text(&second, package_vars),
            )
        })
        .collect()
}
