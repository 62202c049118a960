//! Attribute extraction from LDAP search results.
//!
//! Each configured field names an attribute and may narrow its values with a
//! regex (keeping capture group 1 when the pattern has one) and rewrite them
//! with a list of search/replace pairs.

use std::collections::{BTreeMap, HashMap};

use regex::Regex;
use tracing::debug;

use crate::config::{FieldConfig, ReplaceRule};
use crate::error::Result;
use crate::models::LdapUser;

/// A field rule with its regexes compiled.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub attribute: String,
    pattern: Option<Regex>,
    replace: Vec<(Regex, String)>,
}

impl FieldRule {
    /// Compile the regexes of a configured field.
    pub fn compile(field: &FieldConfig) -> Result<Self> {
        let pattern = field.pattern.as_deref().map(Regex::new).transpose()?;
        let replace = field
            .replace
            .iter()
            .map(|ReplaceRule(search, repl)| Ok((Regex::new(search)?, repl.clone())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            attribute: field.attribute.clone(),
            pattern,
            replace,
        })
    }

    /// Compile every field of a search.
    pub fn compile_all(fields: &[FieldConfig]) -> Result<Vec<Self>> {
        fields.iter().map(Self::compile).collect()
    }

    /// Apply this rule's match and replace steps to raw attribute values.
    pub fn apply(&self, values: &[String]) -> Vec<String> {
        filter_values(values, self.pattern.as_ref(), &self.replace)
    }
}

/// Filter and rewrite values.
///
/// With `pattern`, only values matching at their start are kept, reduced to
/// capture group 1 if the pattern has groups and to the whole match otherwise.
/// Every `replace` pair is then applied to all occurrences in each value.
pub fn filter_values(
    values: &[String],
    pattern: Option<&Regex>,
    replace: &[(Regex, String)],
) -> Vec<String> {
    let matched: Vec<String> = match pattern {
        Some(re) => values
            .iter()
            .filter_map(|value| leading_match(re, value))
            .collect(),
        None => values.to_vec(),
    };

    matched
        .into_iter()
        .map(|value| {
            replace.iter().fold(value, |acc, (search, repl)| {
                search.replace_all(&acc, repl.as_str()).into_owned()
            })
        })
        .collect()
}

/// Match anchored at the start of `value`.
fn leading_match(re: &Regex, value: &str) -> Option<String> {
    let caps = re.captures(value)?;
    let whole = caps.get(0)?;
    if whole.start() != 0 {
        return None;
    }
    if re.captures_len() > 1 {
        caps.get(1).map(|m| m.as_str().to_string())
    } else {
        Some(whole.as_str().to_string())
    }
}

/// Build an [`LdapUser`] from a search entry's raw attributes.
///
/// Missing attributes yield an empty list; duplicate values are dropped while
/// keeping the order in which they were first seen.
pub fn extract_record(
    dn: &str,
    attrs: &HashMap<String, Vec<String>>,
    rules: &[FieldRule],
) -> LdapUser {
    let mut attributes = BTreeMap::new();
    for rule in rules {
        let raw = lookup_attribute(attrs, &rule.attribute);
        let mut values: Vec<String> = Vec::new();
        for value in rule.apply(raw) {
            if !values.contains(&value) {
                values.push(value);
            }
        }
        if raw.is_empty() {
            debug!(dn = %dn, attribute = %rule.attribute, "attribute missing from entry");
        }
        attributes.insert(rule.attribute.clone(), values);
    }
    LdapUser {
        dn: dn.to_string(),
        attributes,
    }
}

/// LDAP attribute names are case-insensitive; servers may echo a different case.
fn lookup_attribute<'a>(attrs: &'a HashMap<String, Vec<String>>, name: &str) -> &'a [String] {
    if let Some(values) = attrs.get(name) {
        return values;
    }
    attrs
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, values)| values.as_slice())
        .unwrap_or_default()
}
