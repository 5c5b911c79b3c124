//! Namespaced type identifiers.
//!
//! Type identifiers are paths whose segments are separated by `\` or `::`, so Rust type
//! paths (`bank::errors::Overdraft`) and foreign-style identifiers (`Acme\Overdraft`)
//! are handled the same way. A leading separator (`\Acme\Overdraft`, `::bank::Overdraft`)
//! carries no meaning and is ignored.

/// Strips every leading namespace separator.
#[must_use]
pub fn trim_leading_separators(id: &str) -> &str {
    let mut rest = id.trim();
    loop {
        if let Some(r) = rest.strip_prefix('\\') {
            rest = r;
        } else if let Some(r) = rest.strip_prefix("::") {
            rest = r;
        } else {
            return rest;
        }
    }
}

/// Splits an identifier into its non-empty namespace segments.
#[must_use]
pub fn segments(id: &str) -> Vec<&str> {
    trim_leading_separators(id)
        .split('\\')
        .flat_map(|part| part.split("::"))
        .filter(|s| !s.is_empty())
        .collect()
}

/// The unqualified name of a type: its last segment.
#[must_use]
pub fn short_name(id: &str) -> &str {
    segments(id).last().copied().unwrap_or(id)
}

/// Identity comparison that ignores leading separators and the separator style.
#[must_use]
pub fn same_type(a: &str, b: &str) -> bool {
    segments(a) == segments(b)
}

/// Whether `prefix` names `id` itself or one of its enclosing namespaces.
#[must_use]
pub fn has_namespace_prefix(id: &str, prefix: &str) -> bool {
    let id = segments(id);
    let prefix = segments(prefix);
    !prefix.is_empty() && id.starts_with(&prefix)
}

/// Canonical key used by registries so that `\Acme\Account` and `Acme\Account`
/// address the same entry.
#[must_use]
pub fn registry_key(id: &str) -> String {
    trim_leading_separators(id).to_owned()
}
