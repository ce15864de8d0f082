//! Data types shared by both faces of the world model protocol
//!
//! A world model object is a URI (dot-separated, UTF-16 on the wire) with a
//! set of named, time-stamped attributes. Attribute names and origin names
//! repeat constantly, so data messages replace them with `u32` aliases that
//! each side announces before first use. Alias tables live for exactly one
//! connection and only ever grow.

use crate::types::GrailTime;
use std::collections::HashMap;

/// Hierarchical object name. `.` separates levels; other punctuation is
/// reserved. URIs inside requests may be regular expressions.
pub type Uri = String;

/// One attribute of a world model object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attribute {
    /// Attribute name; the name indicates the data type.
    pub name: String,
    pub creation_date: GrailTime,
    /// Expiration time, or 0 while the attribute is current.
    pub expiration_date: GrailTime,
    /// Name of the producer that wrote this value.
    pub origin: String,
    pub data: Vec<u8>,
}

/// An attribute with its name and origin replaced by connection aliases.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AliasedAttribute {
    pub name_alias: u32,
    pub creation_date: GrailTime,
    pub expiration_date: GrailTime,
    pub origin_alias: u32,
    pub data: Vec<u8>,
}

/// One object and its attributes, fully named.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorldData {
    pub object_uri: Uri,
    pub attributes: Vec<Attribute>,
}

/// One object and its attributes in aliased form, as data messages carry it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AliasedWorldData {
    pub object_uri: Uri,
    pub attributes: Vec<AliasedAttribute>,
}

/// One alias announcement: the number that will stand in for the string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasDef {
    pub alias: u32,
    pub name: String,
}

/// Connection-scoped alias table, one direction, one kind of name.
///
/// A connection keeps two of these (attribute names and origins). Aliases
/// are immutable once assigned: a redefinition with a different string is
/// rejected so a corrupt or misbehaving peer cannot silently remap data
/// that was already decoded.
#[derive(Debug, Default)]
pub struct AliasTable {
    entries: HashMap<u32, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one alias. Returns false if the alias was already bound to a
    /// different string; re-announcing an identical binding is fine.
    pub fn define(&mut self, alias: u32, name: &str) -> bool {
        match self.entries.get(&alias) {
            Some(existing) => existing == name,
            None => {
                self.entries.insert(alias, name.to_string());
                true
            }
        }
    }

    /// Record every alias in an announcement message. Returns false if any
    /// entry conflicts with an existing binding.
    pub fn absorb(&mut self, defs: &[AliasDef]) -> bool {
        let mut ok = true;
        for def in defs {
            ok &= self.define(def.alias, &def.name);
        }
        ok
    }

    pub fn resolve(&self, alias: u32) -> Option<&str> {
        self.entries.get(&alias).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Replace aliases in a data message with their announced strings.
///
/// Returns `None` if any alias was never announced on this connection,
/// which callers should treat like any other malformed message.
pub fn resolve_world_data(
    aliased: &AliasedWorldData,
    names: &AliasTable,
    origins: &AliasTable,
) -> Option<WorldData> {
    let mut attributes = Vec::with_capacity(aliased.attributes.len());
    for attr in &aliased.attributes {
        attributes.push(Attribute {
            name: names.resolve(attr.name_alias)?.to_string(),
            creation_date: attr.creation_date,
            expiration_date: attr.expiration_date,
            origin: origins.resolve(attr.origin_alias)?.to_string(),
            data: attr.data.clone(),
        });
    }
    Some(WorldData {
        object_uri: aliased.object_uri.clone(),
        attributes,
    })
}

/// A client's per-origin weights for snapshot and stream results.
///
/// When an attribute is available from several origins, only values from
/// the highest-weighted origins present are kept. Unmentioned origins
/// weigh 1; an origin weighted below zero is never returned. Range queries
/// ignore preferences entirely, so this filter is applied by the snapshot
/// and stream paths only.
#[derive(Debug, Clone, Default)]
pub struct OriginPreferences {
    weights: HashMap<String, i32>,
}

impl OriginPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_weights(weights: &[(String, i32)]) -> Self {
        Self {
            weights: weights.iter().cloned().collect(),
        }
    }

    pub fn set(&mut self, origin: &str, weight: i32) {
        self.weights.insert(origin.to_string(), weight);
    }

    /// Weight assigned to an origin, defaulting to 1.
    pub fn weight_for(&self, origin: &str) -> i32 {
        self.weights.get(origin).copied().unwrap_or(1)
    }

    /// The weight pairs in announcement form.
    pub fn to_weights(&self) -> Vec<(String, i32)> {
        self.weights
            .iter()
            .map(|(origin, &weight)| (origin.clone(), weight))
            .collect()
    }

    /// Keep, per attribute name, only the values whose origin carries the
    /// highest weight present for that name. Negative-weight origins are
    /// dropped before the comparison.
    pub fn select_preferred<'a>(&self, attributes: &'a [Attribute]) -> Vec<&'a Attribute> {
        let mut best: HashMap<&str, i32> = HashMap::new();
        for attr in attributes {
            let weight = self.weight_for(&attr.origin);
            if weight < 0 {
                continue;
            }
            best.entry(&attr.name)
                .and_modify(|b| *b = (*b).max(weight))
                .or_insert(weight);
        }
        attributes
            .iter()
            .filter(|attr| {
                let weight = self.weight_for(&attr.origin);
                weight >= 0 && best.get(attr.name.as_str()) == Some(&weight)
            })
            .collect()
    }
}
