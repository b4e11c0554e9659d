//! Module descriptors and identifiers.
//!
//! A module id is the `name-version` string form (`mod-users-1.2.0`).
//! [`ModuleId`] splits that form into a version-agnostic product and an
//! ordered version, which is what upgrade resolution and the "one module
//! per product" invariant operate on.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Parsed module identifier.
///
/// The version is the suffix starting at the first `-`-separated token that
/// begins with a digit; everything before it is the product. Ids without a
/// version (`mod-users`) are partial and must be resolved against a
/// candidate set before use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleId {
    id: String,
    product: String,
    version: Option<ModuleVersion>,
}

impl ModuleId {
    pub fn new(id: &str) -> Self {
        let mut product_end = id.len();
        let bytes = id.as_bytes();
        for (pos, b) in bytes.iter().enumerate() {
            if *b == b'-' && bytes.get(pos + 1).is_some_and(|c| c.is_ascii_digit()) {
                product_end = pos;
                break;
            }
        }
        let version = if product_end < id.len() {
            Some(ModuleVersion::parse(&id[product_end + 1..]))
        } else {
            None
        };
        Self {
            id: id.to_string(),
            product: id[..product_end].to_string(),
            version,
        }
    }

    /// The full `name-version` form this id was parsed from.
    pub fn as_str(&self) -> &str {
        &self.id
    }

    /// Version-agnostic module name.
    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn has_sem_ver(&self) -> bool {
        self.version.is_some()
    }

    pub fn version(&self) -> Option<&ModuleVersion> {
        self.version.as_ref()
    }

    /// Pick the highest-versioned candidate sharing this product.
    ///
    /// Falls back to the original id when no candidate matches, so callers
    /// can probe the result against the candidate set and report the id the
    /// user actually asked for.
    pub fn latest_of<'a, I>(&self, candidates: I) -> String
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut best: Option<ModuleId> = None;
        for cand in candidates {
            let mid = ModuleId::new(cand);
            if mid.product != self.product {
                continue;
            }
            match &best {
                Some(b) if mid.version <= b.version => {}
                _ => best = Some(mid),
            }
        }
        best.map(|b| b.id).unwrap_or_else(|| self.id.clone())
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Ordered module version: dot-separated numeric components with an
/// optional pre-release suffix (`1.2.0-alpha.1`). A pre-release sorts
/// below the release it precedes; missing components count as zero, so
/// `1.2` and `1.2.0` are equal.
#[derive(Debug, Clone)]
pub struct ModuleVersion {
    components: Vec<u64>,
    pre_release: Option<String>,
}

impl PartialEq for ModuleVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ModuleVersion {}

impl ModuleVersion {
    pub fn parse(s: &str) -> Self {
        let (numeric, pre_release) = match s.split_once('-') {
            Some((n, p)) => (n, Some(p.to_string())),
            None => (s, None),
        };
        let components = numeric
            .split('.')
            .map(|c| c.parse::<u64>().unwrap_or(0))
            .collect();
        Self {
            components,
            pre_release,
        }
    }

    pub fn is_pre_release(&self) -> bool {
        self.pre_release.is_some()
    }
}

impl Ord for ModuleVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        for i in 0..len {
            let a = self.components.get(i).copied().unwrap_or(0);
            let b = other.components.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        match (&self.pre_release, &other.pre_release) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => cmp_pre_release(a, b),
        }
    }
}

impl PartialOrd for ModuleVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Dot-token comparison, numeric tokens ordered numerically and below
/// alphanumeric ones.
fn cmp_pre_release(a: &str, b: &str) -> Ordering {
    let mut at = a.split('.');
    let mut bt = b.split('.');
    loop {
        match (at.next(), bt.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(xn), Ok(yn)) => xn.cmp(&yn),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// A single routing entry of a provided interface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoutingEntry {
    pub methods: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_pattern: Option<String>,
}

impl RoutingEntry {
    /// True when `method` is listed (or the entry accepts `*`) and, when a
    /// probe path is given, it falls under `path`/`path_pattern`.
    pub fn matches(&self, path: Option<&str>, method: &str) -> bool {
        let method_ok = self
            .methods
            .iter()
            .any(|m| m == method || m == "*");
        if !method_ok {
            return false;
        }
        match path {
            None => true,
            Some(p) => {
                if let Some(own) = &self.path {
                    p.starts_with(own.as_str())
                } else if let Some(pattern) = &self.path_pattern {
                    pattern_matches(pattern, p)
                } else {
                    false
                }
            }
        }
    }
}

/// Minimal pattern match: `{x}` segments match one path segment, `*`
/// matches any tail.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let mut pat = pattern.split('/').peekable();
    let mut seg = path.split('/').peekable();
    loop {
        match (pat.next(), seg.next()) {
            (None, None) => return true,
            (Some("*"), _) => return true,
            (Some(p), Some(s)) => {
                if p.starts_with('{') && p.ends_with('}') {
                    continue;
                }
                if p != s {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

/// A provided interface. The legacy "old-fashioned" shape carries no
/// routing entries and no interface type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterfaceDescriptor {
    pub id: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub handlers: Vec<RoutingEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub routing_entries: Vec<RoutingEntry>,
}

impl InterfaceDescriptor {
    pub fn new(id: &str, version: &str) -> Self {
        Self {
            id: id.to_string(),
            version: version.to_string(),
            ..Default::default()
        }
    }

    pub fn is_system(&self) -> bool {
        self.interface_type.as_deref() == Some("system")
    }

    pub fn is_type(&self, interface_type: &str) -> bool {
        self.interface_type.as_deref() == Some(interface_type)
    }

    /// Handlers and routing entries combined, handlers first.
    pub fn all_routing_entries(&self) -> impl Iterator<Item = &RoutingEntry> {
        self.handlers.iter().chain(self.routing_entries.iter())
    }
}

/// Reference to a required interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceReference {
    pub id: String,
    pub version: String,
}

/// One named permission a module defines.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Permission {
    pub permission_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_permissions: Vec<String>,
}

/// Descriptor of one module version as published in the catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModuleDescriptor {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub provides: Vec<InterfaceDescriptor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<InterfaceReference>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub permission_sets: Vec<Permission>,
}

impl ModuleDescriptor {
    pub fn module_id(&self) -> ModuleId {
        ModuleId::new(&self.id)
    }

    /// The provided system interface with the given id, if any.
    pub fn system_interface(&self, name: &str) -> Option<&InterfaceDescriptor> {
        self.provides
            .iter()
            .find(|p| p.id == name && p.is_system())
    }
}
