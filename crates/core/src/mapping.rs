//! Conversion of LDAP users into StoredSafe terms and matching against vault users.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info};

use crate::config::{FieldPair, MatchRule};
use crate::models::{ConvertedUser, LdapUser, VaultUser};

/// Full conversion list: the configured `convert` pairs plus inline match pairs.
///
/// Inline pairs are not kept apart from `convert`. An inline pair whose
/// StoredSafe field is also a `convert` target shares that field's candidate
/// list, so its rule matches on values from either LDAP attribute.
pub fn conversion_pairs(convert: &[FieldPair], rules: &[MatchRule]) -> Vec<FieldPair> {
    let mut pairs = convert.to_vec();
    for rule in rules {
        if let MatchRule::Pair(pair) = rule {
            if !pairs.contains(pair) {
                pairs.push(pair.clone());
            }
        }
    }
    pairs
}

/// Re-key each LDAP user by StoredSafe field names.
///
/// Attributes without any extracted value are left out of the converted record.
/// Two pairs targeting the same StoredSafe field contribute to one candidate list.
pub fn ldap_to_storedsafe(users: &[LdapUser], pairs: &[FieldPair]) -> Vec<ConvertedUser> {
    users
        .iter()
        .map(|user| {
            let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for pair in pairs {
                let values = user.values(&pair.ldap);
                if values.is_empty() {
                    continue;
                }
                let entry = fields.entry(pair.storedsafe.clone()).or_default();
                for value in values {
                    if !entry.contains(value) {
                        entry.push(value.clone());
                    }
                }
            }
            ConvertedUser {
                dn: user.dn.clone(),
                fields,
            }
        })
        .collect()
}

/// Vault users matched by at least one converted LDAP user.
///
/// A vault user matches when every rule's StoredSafe field equals one of the
/// converted user's candidate values for that field. Converted users missing
/// a value for any rule are skipped. The result keeps vault order and lists
/// each vault user once.
pub fn get_matched_users(
    converted: &[ConvertedUser],
    vault_users: &[VaultUser],
    rules: &[MatchRule],
) -> Vec<VaultUser> {
    let keys: Vec<&str> = rules.iter().map(MatchRule::storedsafe_field).collect();
    if keys.is_empty() {
        return Vec::new();
    }

    let candidates: Vec<&ConvertedUser> = converted
        .iter()
        .filter(|user| {
            let complete = keys.iter().all(|key| !user.values(key).is_empty());
            if !complete {
                debug!(dn = %user.dn, "skipping LDAP user without values for every match field");
            }
            complete
        })
        .collect();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut matched = Vec::new();
    for vault_user in vault_users {
        let is_match = candidates
            .iter()
            .any(|ldap_user| user_matches(ldap_user, vault_user, &keys));
        if is_match && seen.insert(vault_user.id.as_str()) {
            debug!(user = %vault_user.username, id = %vault_user.id, "matched StoredSafe user");
            matched.push(vault_user.clone());
        }
    }

    info!(matched = matched.len(), "matched StoredSafe users");
    matched
}

fn user_matches(ldap_user: &ConvertedUser, vault_user: &VaultUser, keys: &[&str]) -> bool {
    keys.iter().all(|key| match vault_user.field(key) {
        Some(value) => ldap_user.values(key).contains(&value),
        None => false,
    })
}
