//! User listing and user mutations.

use chrono::Utc;
use serde_json::json;
use tracing::info;

use super::{decode_row, decode_rows, first_row, id_value, AdminService};
use crate::backend::{Filter, Mutation, Query, USERS_TABLE};
use crate::cache::{KeyBuilder, MutationKind, Pagination, ResourceClass, TenantScope};
use crate::error::{AdminError, Result};
use crate::models::{AppUser, Page, UserStatus};

impl AdminService {
    // == List Users ==
    /// Users of one application (or all), newest first, optionally narrowed
    /// by a case-insensitive match on email or name.
    pub async fn list_users(
        &self,
        app: Option<&str>,
        page: Pagination,
        search: Option<&str>,
    ) -> Result<Page<AppUser>> {
        let tenant = TenantScope::from_option(app);
        let search = search.map(str::trim).filter(|s| !s.is_empty());

        let mut key = KeyBuilder::new(ResourceClass::Users, &tenant).page(page);
        if let Some(search) = search {
            key = key.param("q", search);
        }
        let key = key.build();

        self.cache
            .read_through(&key, ResourceClass::Users.ttl(), || {
                self.fetch_users(&tenant, page, search)
            })
            .await
    }

    async fn fetch_users(
        &self,
        tenant: &TenantScope,
        page: Pagination,
        search: Option<&str>,
    ) -> Result<Page<AppUser>> {
        let mut query = Query::table(USERS_TABLE)
            .eq_opt("app_name", tenant.app_name())
            .order_by("created_at", false)
            .range(page);
        if let Some(search) = search {
            let pattern = format!("%{}%", search);
            query = query.any_of(vec![
                Filter::ilike("email", pattern.as_str()),
                Filter::ilike("name", pattern.as_str()),
            ]);
        }

        let rows = self.data.fetch(&query).await.map_err(AdminError::fetch)?;
        Ok(Page {
            items: decode_rows(rows)?,
            limit: page.limit,
            offset: page.offset,
        })
    }

    /// Uncached lookup by id, used to learn a user's application before a
    /// write.
    pub async fn find_user(&self, id: &str) -> Result<AppUser> {
        let query = Query::table(USERS_TABLE).eq("id", id_value(id));
        let rows = self.data.fetch(&query).await.map_err(AdminError::fetch)?;
        match rows.into_iter().next() {
            Some(row) => decode_row(row),
            None => Err(AdminError::NotFound(format!("user {}", id))),
        }
    }

    // == Update User Status ==
    pub async fn update_user_status(&self, id: &str, status: UserStatus) -> Result<AppUser> {
        let user = self.find_user(id).await?;
        let tenant = TenantScope::from_name(&user.app_name);

        let mutation = Mutation::Update {
            table: USERS_TABLE.to_string(),
            filters: vec![Filter::eq("id", id_value(id))],
            patch: json!({
                "status": status.as_str(),
                "updated_at": Utc::now().to_rfc3339(),
            }),
        };
        let rows = self
            .cache
            .mutate_then_invalidate(MutationKind::UpdateUserStatus, &tenant, || {
                self.write(mutation)
            })
            .await?;

        info!(user = id, app = %user.app_name, %status, "user status updated");
        first_row(rows, "user", id)
    }

    // == Delete User ==
    /// Deletes a user and returns the removed record.
    pub async fn delete_user(&self, id: &str) -> Result<AppUser> {
        let user = self.find_user(id).await?;
        let tenant = TenantScope::from_name(&user.app_name);

        let mutation = Mutation::Delete {
            table: USERS_TABLE.to_string(),
            filters: vec![Filter::eq("id", id_value(id))],
        };
        let rows = self
            .cache
            .mutate_then_invalidate(MutationKind::DeleteUser, &tenant, || self.write(mutation))
            .await?;

        info!(user = id, app = %user.app_name, "user deleted");
        first_row(rows, "user", id)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::demo_service;
    use super::*;
    use crate::cache::build_key;

    #[tokio::test]
    async fn test_list_users_cached_per_tenant_and_page() {
        let (service, data) = demo_service().await;
        let page = Pagination::new(20, 0);

        let first = service.list_users(Some("productivity"), page, None).await.unwrap();
        let second = service.list_users(Some("productivity"), page, None).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.items.len(), 2);
        assert_eq!(data.fetch_calls(), 1);

        // Other tenant and other window are separate entries
        service.list_users(Some("cashflow"), page, None).await.unwrap();
        service
            .list_users(Some("productivity"), Pagination::new(20, 20), None)
            .await
            .unwrap();
        assert_eq!(data.fetch_calls(), 3);
    }

    #[tokio::test]
    async fn test_blank_tenant_shares_unscoped_entry() {
        let (service, data) = demo_service().await;
        let page = Pagination::new(20, 0);

        let all = service.list_users(None, page, None).await.unwrap();
        let blank = service.list_users(Some("  "), page, None).await.unwrap();
        assert_eq!(all.items.len(), 3);
        assert_eq!(all, blank);
        assert_eq!(data.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_search_matches_email_or_name() {
        let (service, _data) = demo_service().await;
        let page = Pagination::new(20, 0);

        let by_name = service.list_users(None, page, Some("BUDI")).await.unwrap();
        assert_eq!(by_name.items.len(), 1);
        assert_eq!(by_name.items[0].email, "budi@example.com");

        let by_domain = service
            .list_users(Some("productivity"), page, Some("example.com"))
            .await
            .unwrap();
        assert_eq!(by_domain.items.len(), 2);
    }

    #[tokio::test]
    async fn test_update_status_invalidates_own_tenant_only() {
        let (service, data) = demo_service().await;
        let page = Pagination::new(20, 0);

        let users = service.list_users(Some("productivity"), page, None).await.unwrap();
        service.list_users(Some("cashflow"), page, None).await.unwrap();
        let target = users.items.iter().find(|u| u.name.as_deref() == Some("Budi")).unwrap();

        let updated = service
            .update_user_status(&target.id, UserStatus::Suspended)
            .await
            .unwrap();
        assert_eq!(updated.status, UserStatus::Suspended);

        let cache = service.cache();
        let tenant = TenantScope::from("productivity");
        let other = TenantScope::from("cashflow");
        assert!(!cache.contains_key(&build_key(ResourceClass::Users, &tenant, Some(page))).await);
        assert!(cache.contains_key(&build_key(ResourceClass::Users, &other, Some(page))).await);

        let calls = data.fetch_calls();
        let refreshed = service.list_users(Some("productivity"), page, None).await.unwrap();
        assert_eq!(data.fetch_calls(), calls + 1);
        assert!(refreshed
            .items
            .iter()
            .any(|u| u.id == target.id && u.status == UserStatus::Suspended));
    }

    #[tokio::test]
    async fn test_update_unknown_user_is_not_found() {
        let (service, _data) = demo_service().await;
        let result = service.update_user_status("9999", UserStatus::Active).await;
        assert!(matches!(result, Err(AdminError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_cache() {
        let (service, data) = demo_service().await;
        let page = Pagination::new(20, 0);
        let users = service.list_users(Some("cashflow"), page, None).await.unwrap();

        data.set_fail_writes(true);
        let result = service.delete_user(&users.items[0].id).await;
        assert!(matches!(result, Err(AdminError::Mutation(_))));

        let key = build_key(ResourceClass::Users, &TenantScope::from("cashflow"), Some(page));
        assert!(service.cache().contains_key(&key).await);
    }

    #[tokio::test]
    async fn test_delete_user_returns_removed_record() {
        let (service, _data) = demo_service().await;
        let page = Pagination::new(20, 0);
        let users = service.list_users(Some("cashflow"), page, None).await.unwrap();

        let removed = service.delete_user(&users.items[0].id).await.unwrap();
        assert_eq!(removed.email, "citra@example.com");

        let after = service.list_users(Some("cashflow"), page, None).await.unwrap();
        assert!(after.items.is_empty());
    }
}
