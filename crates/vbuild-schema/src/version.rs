//! Semantic ordering of definition identifiers.
//!
//! Identifiers are not strict semver (`1.21rc2`, `1.9.2-p0`, `1.20`), so they
//! are ordered by a component key instead:
//!
//! 1. split on `.`, `-` and `+`, then at every digit/letter boundary;
//! 2. numeric runs compare as integers;
//! 3. letter runs are pre-release markers (`rc`, `beta`, ...) and sort below
//!    the end of the version, except `p` which marks a patch release and
//!    sorts above any number;
//! 4. every key ends with an implicit release marker.
//!
//! Which gives `1.21rc1 < 1.21rc2 < 1.21 < 1.21.0 < 1.21.1` and
//! `1.9.2 < 1.9.2-p0`.

use std::cmp::Ordering;

/// One component of a [`VersionKey`].
///
/// Variant order is the sort order, so the derived `Ord` does the work.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Component {
    /// A pre-release marker such as `rc` or `beta`
    Pre(String),
    /// End of the identifier
    Release,
    /// A numeric segment
    Number(u64),
    /// A patch-level marker (`p`)
    Patch,
}

/// Sortable key derived from a definition identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct VersionKey(Vec<Component>);

impl VersionKey {
    /// Build the key for an identifier.
    pub fn new(identifier: &str) -> Self {
        let mut components = Vec::new();

        for segment in identifier.split(['.', '-', '+']) {
            let mut rest = segment;
            while let Some(first) = rest.chars().next() {
                let is_digit = first.is_ascii_digit();
                let end = rest
                    .find(|c: char| c.is_ascii_digit() != is_digit)
                    .unwrap_or(rest.len());
                let (token, tail) = rest.split_at(end);
                rest = tail;

                components.push(if is_digit {
                    Component::Number(token.parse().unwrap_or(u64::MAX))
                } else if token.eq_ignore_ascii_case("p") {
                    Component::Patch
                } else {
                    Component::Pre(token.to_lowercase())
                });
            }
        }

        components.push(Component::Release);
        Self(components)
    }

    /// Returns `true` if the identifier carries a pre-release marker.
    pub fn is_prerelease(&self) -> bool {
        self.0.iter().any(|c| matches!(c, Component::Pre(_)))
    }

    /// The components, terminator included.
    pub fn components(&self) -> &[Component] {
        &self.0
    }
}

/// Compare two identifiers semantically, falling back to a plain string
/// comparison so the order stays total when two keys coincide
/// (`1.21+1` and `1.21.1`).
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    VersionKey::new(a)
        .cmp(&VersionKey::new(b))
        .then_with(|| a.cmp(b))
}

/// Sort identifiers in place, lowest first.
pub fn sort_versions(identifiers: &mut [String]) {
    identifiers.sort_by_cached_key(|id| (VersionKey::new(id), id.clone()));
}
