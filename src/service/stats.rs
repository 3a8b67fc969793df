//! Stats Aggregator
//!
//! Count-based statistics composed from two independently cached counts.
//! The two counts may come from different moments, so derived figures
//! saturate at zero instead of underflowing.

use tracing::debug;

use super::AdminService;
use crate::backend::{Query, LICENSES_TABLE, USERS_TABLE};
use crate::cache::{KeyBuilder, ResourceClass, TenantScope};
use crate::error::{AdminError, Result};
use crate::models::{AppUsage, LicenseStats, UserStats};

/// `inactive` is everything not active, suspended users included.
pub fn derive_user_stats(total: u64, active: u64) -> UserStats {
    UserStats {
        total,
        active,
        inactive: total.saturating_sub(active),
    }
}

pub fn derive_license_stats(total: u64, used: u64) -> LicenseStats {
    LicenseStats {
        total,
        used,
        available: total.saturating_sub(used),
    }
}

impl AdminService {
    // == User Stats ==
    pub async fn user_stats(&self, app: Option<&str>) -> Result<UserStats> {
        let tenant = TenantScope::from_option(app);
        let all = Query::table(USERS_TABLE).eq_opt("app_name", tenant.app_name());

        let total = self
            .cached_count(ResourceClass::UserStats, &tenant, "total", all.clone())
            .await?;
        let active = self
            .cached_count(
                ResourceClass::UserStats,
                &tenant,
                "active",
                all.eq("status", "active"),
            )
            .await?;

        Ok(derive_user_stats(total, active))
    }

    // == License Stats ==
    pub async fn license_stats(&self, app: Option<&str>) -> Result<LicenseStats> {
        let tenant = TenantScope::from_option(app);
        let all = Query::table(LICENSES_TABLE).eq_opt("app_name", tenant.app_name());

        let total = self
            .cached_count(ResourceClass::LicenseStats, &tenant, "total", all.clone())
            .await?;
        let used = self
            .cached_count(
                ResourceClass::LicenseStats,
                &tenant,
                "used",
                all.eq("is_used", true),
            )
            .await?;

        Ok(derive_license_stats(total, used))
    }

    // == Usage ==
    /// User and license stats for every active application.
    pub async fn app_usage(&self) -> Result<Vec<AppUsage>> {
        let apps = self.applications().await?;
        let mut usage = Vec::with_capacity(apps.len());
        for app in apps {
            let users = self.user_stats(Some(&app.name)).await?;
            let licenses = self.license_stats(Some(&app.name)).await?;
            usage.push(AppUsage {
                app_name: app.name,
                display_name: app.display_name,
                users,
                licenses,
            });
        }
        Ok(usage)
    }

    /// One count, cached under `{class}:{tenant}:{label}`.
    async fn cached_count(
        &self,
        resource: ResourceClass,
        tenant: &TenantScope,
        label: &str,
        query: Query,
    ) -> Result<u64> {
        let key = KeyBuilder::new(resource, tenant).segment(label).build();
        self.cache
            .read_through(&key, resource.ttl(), || self.count(query))
            .await
    }

    async fn count(&self, query: Query) -> Result<u64> {
        let count = self.data.count(&query).await.map_err(AdminError::fetch)?;
        debug!(table = %query.table, count, "counted rows");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::demo_service;
    use super::*;
    use crate::models::UserStatus;

    #[test]
    fn test_derive_user_stats() {
        assert_eq!(
            derive_user_stats(10, 4),
            UserStats {
                total: 10,
                active: 4,
                inactive: 6
            }
        );
    }

    #[test]
    fn test_derived_counts_saturate() {
        // Filtered count read after a burst of inserts the total missed
        let stats = derive_license_stats(3, 5);
        assert_eq!(stats.available, 0);
        assert_eq!(stats.used, 5);
        assert_eq!(derive_user_stats(0, 0).inactive, 0);
    }

    #[tokio::test]
    async fn test_user_stats_uses_two_cached_counts() {
        let (service, data) = demo_service().await;

        let stats = service.user_stats(Some("productivity")).await.unwrap();
        assert_eq!(
            stats,
            UserStats {
                total: 2,
                active: 1,
                inactive: 1
            }
        );
        assert_eq!(data.count_calls(), 2);

        service.user_stats(Some("productivity")).await.unwrap();
        assert_eq!(data.count_calls(), 2);

        let everyone = service.user_stats(None).await.unwrap();
        assert_eq!(everyone.total, 3);
        assert_eq!(data.count_calls(), 4);
    }

    #[tokio::test]
    async fn test_status_change_refreshes_user_stats() {
        let (service, _data) = demo_service().await;
        let page = service.page(None, None).unwrap();

        let before = service.user_stats(Some("productivity")).await.unwrap();
        let everyone_before = service.user_stats(None).await.unwrap();
        let users = service.list_users(Some("productivity"), page, None).await.unwrap();
        let inactive = users
            .items
            .iter()
            .find(|u| u.status == UserStatus::Inactive)
            .unwrap();

        service
            .update_user_status(&inactive.id, UserStatus::Active)
            .await
            .unwrap();

        let after = service.user_stats(Some("productivity")).await.unwrap();
        assert_eq!(after.active, before.active + 1);
        assert_eq!(after.inactive, before.inactive - 1);

        // The unscoped figures covered this tenant too
        let everyone_after = service.user_stats(None).await.unwrap();
        assert_eq!(everyone_after.active, everyone_before.active + 1);
    }

    #[tokio::test]
    async fn test_app_usage_lists_active_applications() {
        let (service, _data) = demo_service().await;

        let usage = service.app_usage().await.unwrap();
        assert_eq!(usage.len(), 2);

        let cashflow = usage.iter().find(|u| u.app_name == "cashflow").unwrap();
        assert_eq!(cashflow.display_name, "Cashflow Manager");
        assert_eq!(cashflow.users.total, 1);
        assert_eq!(cashflow.licenses.available, 1);
    }

    #[tokio::test]
    async fn test_count_failure_surfaces() {
        let (service, data) = demo_service().await;
        data.set_fail_reads(true);
        assert!(matches!(
            service.license_stats(Some("cashflow")).await,
            Err(AdminError::Fetch(_))
        ));
    }
}
