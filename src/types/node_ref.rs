use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DeskError;

/// Repository node reference, `<protocol>://<store>/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub protocol: String,
    pub store: String,
    pub id: String,
}

impl NodeRef {
    pub const DEFAULT_PROTOCOL: &'static str = "workspace";
    pub const DEFAULT_STORE: &'static str = "SpacesStore";

    pub fn workspace(id: impl Into<String>) -> Self {
        Self {
            protocol: Self::DEFAULT_PROTOCOL.to_string(),
            store: Self::DEFAULT_STORE.to_string(),
            id: id.into(),
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.protocol, self.store, self.id)
    }
}

impl FromStr for NodeRef {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DeskError::validation(format!("invalid node reference: {s}"));
        let (protocol, rest) = s.trim().split_once("://").ok_or_else(invalid)?;
        let (store, id) = rest.split_once('/').ok_or_else(invalid)?;
        if protocol.is_empty() || store.is_empty() || id.is_empty() || id.contains('/') {
            return Err(invalid());
        }
        Ok(Self {
            protocol: protocol.to_string(),
            store: store.to_string(),
            id: id.to_string(),
        })
    }
}

impl Serialize for NodeRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Accept either a bare node id, an alias such as `-root-`, or a full
/// NodeRef, and return the id the REST API expects.
pub fn node_id(input: &str) -> Result<String, DeskError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(DeskError::validation("nodeId must not be empty"));
    }
    if input.contains("://") {
        return Ok(input.parse::<NodeRef>()?.id);
    }
    if input.contains('/') {
        return Err(DeskError::validation(format!("invalid node id: {input}")));
    }
    Ok(input.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats_workspace_refs() {
        let r: NodeRef = "workspace://SpacesStore/0f1c7a6e-1234".parse().unwrap();
        assert_eq!(r, NodeRef::workspace("0f1c7a6e-1234"));
        assert_eq!(r.to_string(), "workspace://SpacesStore/0f1c7a6e-1234");

        let archived: NodeRef = "archive://SpacesStore/abc".parse().unwrap();
        assert_eq!(archived.protocol, "archive");
    }

    #[test]
    fn rejects_malformed_refs() {
        for bad in ["", "workspace://", "workspace://SpacesStore", "SpacesStore/abc", "a://b/c/d"] {
            assert!(bad.parse::<NodeRef>().is_err(), "{bad}");
        }
    }

    #[test]
    fn node_id_accepts_bare_ids_aliases_and_refs() {
        assert_eq!(node_id("-root-").unwrap(), "-root-");
        assert_eq!(node_id(" abc ").unwrap(), "abc");
        assert_eq!(node_id("workspace://SpacesStore/abc").unwrap(), "abc");
        assert!(node_id("../etc").is_err());
        assert!(node_id("").is_err());
    }
}
