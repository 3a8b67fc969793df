//! Invalidation Coordinator
//!
//! Declarative table of which resource classes each mutation makes stale,
//! and the helpers that clear them once a write has succeeded.

use std::future::Future;

use tracing::{debug, warn};

use crate::cache::keys::{tenant_prefix, ResourceClass, TenantScope, SEPARATOR};
use crate::cache::SharedCache;

// == Mutation Kind ==
/// Every write the admin service performs against the data service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    UpdateUserStatus,
    DeleteUser,
    GenerateLicenses,
    DeleteLicense,
    RedeemLicense,
}

impl MutationKind {
    pub const ALL: [MutationKind; 5] = [
        MutationKind::UpdateUserStatus,
        MutationKind::DeleteUser,
        MutationKind::GenerateLicenses,
        MutationKind::DeleteLicense,
        MutationKind::RedeemLicense,
    ];

    /// Resource classes whose cached views this mutation can make stale.
    pub fn affected_resources(self) -> &'static [ResourceClass] {
        use ResourceClass::*;
        match self {
            MutationKind::UpdateUserStatus | MutationKind::DeleteUser => &[Users, UserStats],
            MutationKind::GenerateLicenses | MutationKind::DeleteLicense => {
                &[Licenses, LicenseStats]
            }
            MutationKind::RedeemLicense => &[Licenses, LicenseStats, Users, UserStats],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MutationKind::UpdateUserStatus => "update_user_status",
            MutationKind::DeleteUser => "delete_user",
            MutationKind::GenerateLicenses => "generate_licenses",
            MutationKind::DeleteLicense => "delete_license",
            MutationKind::RedeemLicense => "redeem_license",
        }
    }
}

// == Invalidation Prefixes ==
/// Prefixes to clear after `kind` succeeded for `tenant`.
///
/// Each affected class is cleared for the tenant itself and for the
/// unscoped `all` views, which aggregate every tenant. Other tenants keep
/// their entries.
pub fn invalidation_prefixes(kind: MutationKind, tenant: &TenantScope) -> Vec<String> {
    let mut scopes = vec![TenantScope::All];
    if tenant != &TenantScope::All {
        scopes.push(tenant.clone());
    }

    kind.affected_resources()
        .iter()
        .flat_map(|resource| scopes.iter().map(move |scope| tenant_prefix(*resource, scope)))
        .collect()
}

impl SharedCache {
    // == Invalidate ==
    /// Drops every entry made stale by `kind` for `tenant`.
    ///
    /// Works from the declared table only, so it is correct on an empty
    /// cache. Returns the total number of removed entries.
    pub async fn invalidate(&self, kind: MutationKind, tenant: &TenantScope) -> usize {
        let mut removed = 0;
        for prefix in invalidation_prefixes(kind, tenant) {
            // Unpaged reads are stored at the bare scope key
            let bare = prefix.strip_suffix(SEPARATOR).unwrap_or(prefix.as_str());
            removed += self.invalidate_scope(bare, &prefix).await;
        }

        debug!(
            mutation = kind.as_str(),
            tenant = %tenant.key_segment(),
            removed,
            "cache invalidated"
        );
        removed
    }

    // == Mutate Then Invalidate ==
    /// Runs `write` and, only if it succeeds, invalidates for `kind`.
    ///
    /// A failed write is returned unchanged and the cache is not touched.
    pub async fn mutate_then_invalidate<T, E, F, Fut>(
        &self,
        kind: MutationKind,
        tenant: &TenantScope,
        write: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match write().await {
            Ok(result) => {
                self.invalidate(kind, tenant).await;
                Ok(result)
            }
            Err(err) => {
                warn!(
                    mutation = kind.as_str(),
                    tenant = %tenant.key_segment(),
                    "write failed, cache left untouched"
                );
                Err(err)
            }
        }
    }
}
