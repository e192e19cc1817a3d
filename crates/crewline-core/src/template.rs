//! Placeholder substitution for prompt templates.
//!
//! Placeholders are written as `{identifier}`. Known identifiers are
//! replaced, unknown ones are left exactly as written.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::{BuildHasher, Hash};
use std::sync::LazyLock;

use regex::{Captures, Regex};

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("placeholder pattern is valid"));

/// Fill `{key}` placeholders in `template` from `values`.
///
/// ```
/// use std::collections::HashMap;
/// use crewline_core::template::format_template;
///
/// let values = HashMap::from([("role", "A"), ("goal", "B")]);
/// assert_eq!(
///     format_template("Role: {role}, Goal: {goal}, Tone: {tone}", &values),
///     "Role: A, Goal: B, Tone: {tone}"
/// );
/// ```
pub fn format_template<K, V, S>(template: &str, values: &HashMap<K, V, S>) -> String
where
    K: Borrow<str> + Hash + Eq,
    V: Display,
    S: BuildHasher,
{
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| match values.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Identifiers referenced by `template`, in order of first appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let name = &caps[1];
        if !seen.iter().any(|s| s == name) {
            seen.push(name.to_string());
        }
    }
    seen
}
