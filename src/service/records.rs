//! Read-only drill-downs into the rows an application keeps per user.

use serde_json::Value;

use super::AdminService;
use crate::backend::{
    Filter, Query, CASHFLOW_BUDGETS_TABLE, CASHFLOW_CATEGORIES_TABLE, CASHFLOW_GOALS_TABLE,
    CASHFLOW_TRANSACTIONS_TABLE, PRODUCTIVITY_TASKS_TABLE,
};
use crate::cache::{KeyBuilder, Pagination, ResourceClass, TenantScope};
use crate::error::{AdminError, Result};
use crate::models::{Page, RecordKind};

/// Inclusive date bounds on a record's date column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange<'a> {
    pub from: Option<&'a str>,
    pub to: Option<&'a str>,
}

impl<'a> DateRange<'a> {
    pub fn new(from: Option<&'a str>, to: Option<&'a str>) -> Self {
        let clean = |v: Option<&'a str>| v.map(str::trim).filter(|v| !v.is_empty());
        Self {
            from: clean(from),
            to: clean(to),
        }
    }

    fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

/// Where one kind of record lives and how it is listed.
struct RecordSource {
    app: &'static str,
    table: &'static str,
    order_column: &'static str,
    ascending: bool,
    date_column: Option<&'static str>,
    active_only: bool,
}

fn source(kind: RecordKind) -> RecordSource {
    let cashflow = |table: &'static str, order_column: &'static str, ascending: bool| RecordSource {
        app: "cashflow",
        table,
        order_column,
        ascending,
        date_column: None,
        active_only: false,
    };
    match kind {
        RecordKind::Transactions => RecordSource {
            date_column: Some("transaction_date"),
            ..cashflow(CASHFLOW_TRANSACTIONS_TABLE, "transaction_date", false)
        },
        RecordKind::Budgets => cashflow(CASHFLOW_BUDGETS_TABLE, "created_at", false),
        RecordKind::Goals => cashflow(CASHFLOW_GOALS_TABLE, "created_at", false),
        RecordKind::Categories => RecordSource {
            active_only: true,
            ..cashflow(CASHFLOW_CATEGORIES_TABLE, "name", true)
        },
        RecordKind::Tasks => RecordSource {
            app: "productivity",
            table: PRODUCTIVITY_TASKS_TABLE,
            order_column: "created_at",
            ascending: false,
            date_column: Some("task_date"),
            active_only: false,
        },
    }
}

impl AdminService {
    // == User Records ==
    /// One page of `kind` rows for a user of `app`, optionally bounded by
    /// date. Cached under the application's tenant scope.
    pub async fn user_records(
        &self,
        app: &str,
        user_id: &str,
        kind: RecordKind,
        page: Pagination,
        range: DateRange<'_>,
    ) -> Result<Page<Value>> {
        let tenant = TenantScope::from_name(app);
        let source = source(kind);
        if tenant.app_name() != Some(source.app) {
            return Err(AdminError::InvalidRequest(format!(
                "{} are only kept by {}",
                kind, source.app
            )));
        }
        if source.date_column.is_none() && !range.is_empty() {
            return Err(AdminError::InvalidRequest(format!(
                "{} cannot be filtered by date",
                kind
            )));
        }
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(AdminError::InvalidRequest("user id cannot be empty".to_string()));
        }

        let mut key = KeyBuilder::new(ResourceClass::UserRecords, &tenant)
            .segment(user_id)
            .segment(kind.as_str())
            .page(page);
        if let Some(from) = range.from {
            key = key.param("from", from);
        }
        if let Some(to) = range.to {
            key = key.param("to", to);
        }
        let key = key.build();

        self.cache
            .read_through(&key, ResourceClass::UserRecords.ttl(), || {
                self.fetch_user_records(&source, user_id, page, range)
            })
            .await
    }

    async fn fetch_user_records(
        &self,
        source: &RecordSource,
        user_id: &str,
        page: Pagination,
        range: DateRange<'_>,
    ) -> Result<Page<Value>> {
        let mut query = Query::table(source.table)
            .eq("user_id", user_id)
            .order_by(source.order_column, source.ascending)
            .range(page);
        if source.active_only {
            query = query.eq("is_active", true);
        }
        if let Some(column) = source.date_column {
            if let Some(from) = range.from {
                query = query.filter(Filter::gte(column, from));
            }
            if let Some(to) = range.to {
                query = query.filter(Filter::lte(column, to));
            }
        }

        let items = self.data.fetch(&query).await.map_err(AdminError::fetch)?;
        Ok(Page {
            items,
            limit: page.limit,
            offset: page.offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::demo_service;
    use super::*;
    use crate::cache::MutationKind;

    const PAGE: Pagination = Pagination {
        limit: 20,
        offset: 0,
    };

    #[tokio::test]
    async fn test_transactions_newest_first_and_cached() {
        let (service, data) = demo_service().await;

        let first = service
            .user_records("cashflow", "u-citra", RecordKind::Transactions, PAGE, DateRange::default())
            .await
            .unwrap();
        let dates: Vec<&str> = first
            .items
            .iter()
            .map(|r| r["transaction_date"].as_str().unwrap())
            .collect();
        assert_eq!(dates, vec!["2024-03-28", "2024-03-15", "2024-02-20"]);

        let calls = data.fetch_calls();
        let second = service
            .user_records("cashflow", "u-citra", RecordKind::Transactions, PAGE, DateRange::default())
            .await
            .unwrap();
        assert_eq!(second, first);
        assert_eq!(data.fetch_calls(), calls);
    }

    #[tokio::test]
    async fn test_transactions_date_range_is_part_of_the_key() {
        let (service, _data) = demo_service().await;
        let march = DateRange::new(Some("2024-03-01"), Some(" 2024-03-31 "));

        let page = service
            .user_records("cashflow", "u-citra", RecordKind::Transactions, PAGE, march)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);

        let all = service
            .user_records("cashflow", "u-citra", RecordKind::Transactions, PAGE, DateRange::default())
            .await
            .unwrap();
        assert_eq!(all.items.len(), 3);
    }

    #[tokio::test]
    async fn test_categories_skip_inactive_and_sort_by_name() {
        let (service, _data) = demo_service().await;

        let page = service
            .user_records("cashflow", "u-citra", RecordKind::Categories, PAGE, DateRange::default())
            .await
            .unwrap();
        let names: Vec<&str> = page.items.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["Food", "Salary"]);
    }

    #[tokio::test]
    async fn test_tasks_for_one_day() {
        let (service, _data) = demo_service().await;
        let day = DateRange::new(Some("2024-03-02"), Some("2024-03-02"));

        let page = service
            .user_records("productivity", "u-ana", RecordKind::Tasks, PAGE, day)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0]["title"], "Review notes");
    }

    #[tokio::test]
    async fn test_kind_must_belong_to_the_application() {
        let (service, data) = demo_service().await;

        let wrong_app = service
            .user_records("productivity", "u-ana", RecordKind::Budgets, PAGE, DateRange::default())
            .await;
        assert!(matches!(wrong_app, Err(AdminError::InvalidRequest(_))));

        let unscoped = service
            .user_records("all", "u-ana", RecordKind::Tasks, PAGE, DateRange::default())
            .await;
        assert!(matches!(unscoped, Err(AdminError::InvalidRequest(_))));

        let undated = service
            .user_records(
                "cashflow",
                "u-citra",
                RecordKind::Goals,
                PAGE,
                DateRange::new(Some("2024-01-01"), None),
            )
            .await;
        assert!(matches!(undated, Err(AdminError::InvalidRequest(_))));
        assert_eq!(data.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let (service, data) = demo_service().await;
        data.set_fail_reads(true);

        let failed = service
            .user_records("cashflow", "u-citra", RecordKind::Goals, PAGE, DateRange::default())
            .await;
        assert!(matches!(failed, Err(AdminError::Fetch(_))));

        data.set_fail_reads(false);
        let page = service
            .user_records("cashflow", "u-citra", RecordKind::Goals, PAGE, DateRange::default())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn test_records_survive_other_tenant_mutations() {
        let (service, data) = demo_service().await;
        service
            .user_records("cashflow", "u-citra", RecordKind::Budgets, PAGE, DateRange::default())
            .await
            .unwrap();
        let calls = data.fetch_calls();

        for kind in MutationKind::ALL {
            service
                .cache()
                .invalidate(kind, &TenantScope::from("productivity"))
                .await;
        }

        service
            .user_records("cashflow", "u-citra", RecordKind::Budgets, PAGE, DateRange::default())
            .await
            .unwrap();
        assert_eq!(data.fetch_calls(), calls);
    }
}
