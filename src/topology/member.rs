//! Cluster member rows and their typed form.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::placement::PlacementDescriptor;

/// One row of the servers metadata query, keyed by column name.
///
/// Empty values read as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRow {
    columns: HashMap<String, String>,
}

impl ServerRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column setter.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.columns.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// A member as reported by one topology snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterMember {
    /// Private address.
    pub host: Option<String>,
    pub public_ip: Option<String>,
    pub port: Option<u16>,
    pub placement: PlacementDescriptor,
}

impl ClusterMember {
    pub fn from_row(row: &ServerRow) -> Self {
        Self {
            host: row.get("host").map(str::to_string),
            public_ip: row.get("public_ip").map(str::to_string),
            port: row.get("port").and_then(|p| p.parse().ok()),
            placement: PlacementDescriptor::new(
                row.get("cloud").unwrap_or_default(),
                row.get("region").unwrap_or_default(),
                row.get("zone").unwrap_or_default(),
            ),
        }
    }

    /// Address for the given family, if the member reports one.
    pub fn address(&self, public: bool) -> Option<&str> {
        if public {
            self.public_ip.as_deref()
        } else {
            self.host.as_deref()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_columns_are_absent() {
        let row = ServerRow::new()
            .with("host", "10.0.0.1")
            .with("public_ip", "")
            .with("port", "5433")
            .with("cloud", "aws")
            .with("region", "us-west")
            .with("zone", "us-west-2a");

        let member = ClusterMember::from_row(&row);
        assert_eq!(member.host.as_deref(), Some("10.0.0.1"));
        assert_eq!(member.public_ip, None);
        assert_eq!(member.port, Some(5433));
        assert_eq!(member.address(true), None);
        assert_eq!(
            member.placement,
            PlacementDescriptor::new("aws", "us-west", "us-west-2a")
        );
    }

    #[test]
    fn test_non_numeric_port_ignored() {
        let row = ServerRow::new().with("host", "h1").with("port", "abc");
        assert_eq!(ClusterMember::from_row(&row).port, None);
    }
}
