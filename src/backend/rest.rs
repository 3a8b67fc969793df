//! HTTP data service client.
//!
//! Speaks the PostgREST dialect: tables under `/rest/v1/{table}`, stored
//! procedures under `/rest/v1/rpc/{name}`, filters as `column=op.value`
//! query parameters and exact counts through the `Content-Range` header.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;
use tracing::debug;

use super::{DataService, Filter, FilterOp, Mutation, Query};
use crate::error::DataError;

#[derive(Debug, Clone)]
pub struct RestDataService {
    client: reqwest::Client,
    base_url: String,
}

impl RestDataService {
    pub fn new(base_url: &str, api_key: Option<&str>, timeout: Duration) -> Result<Self, DataError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let apikey = HeaderValue::from_str(key)
                .map_err(|e| DataError::Decode(format!("invalid api key: {}", e)))?;
            let bearer = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| DataError::Decode(format!("invalid api key: {}", e)))?;
            headers.insert("apikey", apikey);
            headers.insert(AUTHORIZATION, bearer);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn rpc_url(&self, procedure: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, procedure)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client.request(method, self.table_url(table))
    }
}

#[async_trait]
impl DataService for RestDataService {
    async fn fetch(&self, query: &Query) -> Result<Vec<Value>, DataError> {
        debug!(table = %query.table, "rest fetch");
        let response = self
            .request(Method::GET, &query.table)
            .query(&[("select", "*")])
            .query(&query_params(query))
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json::<Vec<Value>>().await?)
    }

    async fn count(&self, query: &Query) -> Result<u64, DataError> {
        let mut params = filter_params(&query.filters);
        params.extend(or_param(&query.any_of));

        let response = self
            .request(Method::HEAD, &query.table)
            .query(&[("select", "*")])
            .query(&params)
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let response = check_status(response).await?;

        let range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| DataError::Decode("missing Content-Range header".to_string()))?;
        parse_content_range_total(range)
    }

    async fn mutate(&self, mutation: Mutation) -> Result<Vec<Value>, DataError> {
        debug!(table = mutation.table(), "rest mutate");
        let builder = match &mutation {
            Mutation::Insert { table, rows } => self.request(Method::POST, table).json(rows),
            Mutation::Update {
                table,
                filters,
                patch,
            } => self
                .request(Method::PATCH, table)
                .query(&filter_params(filters))
                .json(patch),
            Mutation::Delete { table, filters } => self
                .request(Method::DELETE, table)
                .query(&filter_params(filters)),
        };

        let response = builder
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json::<Vec<Value>>().await?)
    }

    async fn call(&self, procedure: &str, params: Value) -> Result<Value, DataError> {
        debug!(procedure, "rest rpc");
        let response = self
            .client
            .post(self.rpc_url(procedure))
            .json(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let message = error_message(response).await;
            return Err(DataError::Rpc {
                procedure: procedure.to_string(),
                message,
            });
        }
        Ok(response.json::<Value>().await?)
    }
}

// == Query Encoding ==
/// Filters, OR group, ordering and range as query parameters.
pub(crate) fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params = filter_params(&query.filters);
    params.extend(or_param(&query.any_of));

    if let Some(order) = &query.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
    }
    if let Some(page) = query.range {
        params.push(("limit".to_string(), page.limit.to_string()));
        params.push(("offset".to_string(), page.offset.to_string()));
    }
    params
}

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| (f.column.clone(), encode_condition(f, false)))
        .collect()
}

fn or_param(filters: &[Filter]) -> Option<(String, String)> {
    if filters.is_empty() {
        return None;
    }
    let conditions: Vec<String> = filters
        .iter()
        .map(|f| format!("{}.{}", f.column, encode_condition(f, true)))
        .collect();
    Some(("or".to_string(), format!("({})", conditions.join(","))))
}

/// `op.value` for one filter. Values inside an `or=(...)` group are quoted.
fn encode_condition(filter: &Filter, in_group: bool) -> String {
    let (op, value) = match filter.op {
        FilterOp::Eq => ("eq", render_value(&filter.value)),
        FilterOp::ILike => ("ilike", render_value(&filter.value).replace('%', "*")),
        FilterOp::Gte => ("gte", render_value(&filter.value)),
        FilterOp::Lte => ("lte", render_value(&filter.value)),
    };
    if in_group {
        format!("{}.\"{}\"", op, value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        format!("{}.{}", op, value)
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Total from `Content-Range: 0-24/3573` or `*/0`.
pub(crate) fn parse_content_range_total(range: &str) -> Result<u64, DataError> {
    range
        .rsplit('/')
        .next()
        .and_then(|total| total.trim().parse::<u64>().ok())
        .ok_or_else(|| DataError::Decode(format!("unparseable Content-Range: {}", range)))
}

async fn check_status(response: Response) -> Result<Response, DataError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = error_message(response).await;
    Err(DataError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Builds `CODE: message` from a PostgREST error body, falling back to the
/// raw body text.
async fn error_message(response: Response) -> String {
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<Value>(&text) {
        Ok(body) => {
            let message = body["message"].as_str().unwrap_or(&text);
            match body["code"].as_str() {
                Some(code) => format!("{}: {}", code, message),
                None => message.to_string(),
            }
        }
        Err(_) => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Pagination;

    #[test]
    fn test_query_params_encoding() {
        let query = Query::table("admin_app_users")
            .eq("app_name", "cashflow")
            .eq("is_used", true)
            .order_by("created_at", false)
            .range(Pagination::new(20, 40));

        let params = query_params(&query);
        assert_eq!(
            params,
            vec![
                ("app_name".to_string(), "eq.cashflow".to_string()),
                ("is_used".to_string(), "eq.true".to_string()),
                ("order".to_string(), "created_at.desc".to_string()),
                ("limit".to_string(), "20".to_string()),
                ("offset".to_string(), "40".to_string()),
            ]
        );
    }

    #[test]
    fn test_or_group_quotes_values() {
        let query = Query::table("admin_app_users").any_of(vec![
            Filter::ilike("email", "%a,b%"),
            Filter::ilike("name", "%a,b%"),
        ]);

        let params = query_params(&query);
        assert_eq!(
            params,
            vec![(
                "or".to_string(),
                r#"(email.ilike."*a,b*",name.ilike."*a,b*")"#.to_string()
            )]
        );
    }

    #[test]
    fn test_range_filters_repeat_the_column() {
        let query = Query::table("cashflow_transactions")
            .filter(Filter::gte("transaction_date", "2024-03-01"))
            .filter(Filter::lte("transaction_date", "2024-03-31"));

        assert_eq!(
            query_params(&query),
            vec![
                ("transaction_date".to_string(), "gte.2024-03-01".to_string()),
                ("transaction_date".to_string(), "lte.2024-03-31".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_content_range_total() {
        assert_eq!(parse_content_range_total("0-24/3573").unwrap(), 3573);
        assert_eq!(parse_content_range_total("*/0").unwrap(), 0);
        assert!(parse_content_range_total("0-24/*").is_err());
    }

    #[test]
    fn test_client_builds_with_api_key() {
        let service =
            RestDataService::new("http://localhost:54321/", Some("anon-key"), Duration::from_secs(5))
                .unwrap();
        assert_eq!(
            service.table_url("applications"),
            "http://localhost:54321/rest/v1/applications"
        );
        assert_eq!(
            service.rpc_url("redeem_license"),
            "http://localhost:54321/rest/v1/rpc/redeem_license"
        );
    }
}
