//! Name validation
//!
//! Names are written in a base-40 alphabet: digits, lowercase letters and
//! `-`, `_`, `.`, `+`. A fully-qualified name is `name.namespace`; `.` only
//! ever appears as the namespace separator and `+` is reserved for
//! disambiguation suffixes, so neither may appear inside a name part. The
//! remaining 38 characters form the base-38 charset names are built from.

use serde::{Serialize, Deserialize};

/// The base-40 alphabet
pub const B40_CHARS: &str = "0123456789abcdefghijklmnopqrstuvwxyz-_.+";

/// Namespace separator
pub const NAMESPACE_SEPARATOR: char = '.';

/// Disambiguation character
pub const DISAMBIGUATION_CHAR: char = '+';

/// Maximum length of `name.namespace` in bytes
pub const MAX_NAME_LENGTH: usize = 37;

/// Maximum length of a namespace identifier in bytes
pub const MAX_NAMESPACE_LENGTH: usize = 19;

/// Length limits for names, injected into each operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRules {
    /// Maximum length of a fully-qualified name
    pub max_name_length: usize,

    /// Maximum length of a namespace identifier
    pub max_namespace_length: usize,
}

impl Default for NameRules {
    fn default() -> Self {
        NameRules {
            max_name_length: MAX_NAME_LENGTH,
            max_namespace_length: MAX_NAMESPACE_LENGTH,
        }
    }
}

impl NameRules {
    /// Check that a namespace identifier is well-formed
    pub fn is_namespace_valid(&self, namespace_id: &str) -> bool {
        !namespace_id.is_empty()
            && namespace_id.len() <= self.max_namespace_length
            && is_b40(namespace_id)
            && !namespace_id.contains(DISAMBIGUATION_CHAR)
            && !namespace_id.contains(NAMESPACE_SEPARATOR)
    }

    /// Check that a fully-qualified name is well-formed
    pub fn is_name_valid(&self, fqn: &str) -> bool {
        if fqn.len() > self.max_name_length || !is_b40(fqn) {
            return false;
        }

        let Some((name_part, namespace_id)) = fqn.split_once(NAMESPACE_SEPARATOR) else {
            return false;
        };

        !name_part.is_empty()
            && !name_part.contains(DISAMBIGUATION_CHAR)
            && self.is_namespace_valid(namespace_id)
    }
}

/// Check that every character is in the base-40 alphabet
pub fn is_b40(s: &str) -> bool {
    s.chars().all(|c| B40_CHARS.contains(c))
}

/// Check a fully-qualified name against the default rules
pub fn is_name_valid(fqn: &str) -> bool {
    NameRules::default().is_name_valid(fqn)
}

/// Check a namespace identifier against the default rules
pub fn is_namespace_valid(namespace_id: &str) -> bool {
    NameRules::default().is_namespace_valid(namespace_id)
}

/// Stricter structural check used by state transitions
///
/// Rejects disambiguated names and names with more than one separator.
/// Length is left to the codec, which already refused anything too long.
pub fn is_plain_b38_name(name: &str) -> bool {
    is_b40(name)
        && !name.contains(DISAMBIGUATION_CHAR)
        && name.matches(NAMESPACE_SEPARATOR).count() <= 1
}

/// Split off the namespace identifier of a fully-qualified name
pub fn get_namespace_from_name(fqn: &str) -> Option<&str> {
    fqn.rsplit_once(NAMESPACE_SEPARATOR).map(|(_, namespace_id)| namespace_id)
}
