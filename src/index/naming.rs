//! Collection naming for tenant indexes.
//!
//! Every tenant owns one primary collection plus a security-group companion
//! used for permission filtering. Two naming schemes exist: the standard one
//! derives the collection from the tenant id, the legacy one reproduces the
//! store-addressed names of older deployments so their collections keep
//! working without a reindex.

/// Derives collection names from tenant ids.
#[derive(Debug, Clone, Default)]
pub struct CollectionNaming {
    /// Optional deployment prefix put in front of every standard name.
    pub prefix: Option<String>,
    /// Use the store-addressed names of older deployments.
    pub legacy: bool,
}

impl CollectionNaming {
    /// Standard naming without a prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard naming with a deployment prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            legacy: false,
        }
    }

    /// Legacy store-addressed naming.
    pub fn legacy() -> Self {
        Self {
            prefix: None,
            legacy: true,
        }
    }

    /// Primary collection for a tenant.
    ///
    /// Standard names replace the `::` of hierarchical tenant ids because the
    /// index rejects colons in collection names; everything is lowercased
    /// since the index treats collection names case-insensitively.
    pub fn collection_for(&self, tenant: &str) -> String {
        if self.legacy {
            return format!("primary_workspace_{tenant}-SpacesStore").to_lowercase();
        }
        let name = match &self.prefix {
            Some(prefix) => format!("{prefix}-{}", tenant.replace("::", "_")),
            None => tenant.replace("::", "_"),
        };
        name.to_lowercase()
    }

    /// Security-group companion collection for a tenant.
    pub fn security_collection_for(&self, tenant: &str) -> String {
        format!("{}-sg", self.collection_for(tenant))
    }
}
