//! Client for the hosted backend: a PostgREST table API under `/rest/v1`,
//! GoTrue-style auth under `/auth/v1` and public object storage under
//! `/storage/v1/object/public`.
//!
//! The storefront server is a trusted caller, so table requests use the
//! service key when one is configured and fall back to the anon key.

use anyhow::{bail, Result};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

mod auth;
mod books;
mod community;
mod reader;

const COVERS_BUCKET: &str = "covers";

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub anon_key: String,
    pub service_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct RemoteStore {
    client: Client,
    config: RemoteConfig,
}

impl RemoteStore {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            bail!("hosted backend URL is not configured");
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn table_key(&self) -> &str {
        self.config
            .service_key
            .as_deref()
            .unwrap_or(&self.config.anon_key)
    }

    pub(crate) fn public_bucket_url(&self) -> String {
        format!("{}/storage/v1/object/public/{COVERS_BUCKET}", self.base())
    }

    fn table_request(&self, method: Method, query: &Query) -> RequestBuilder {
        let key = self.table_key();
        self.client
            .request(method, format!("{}/rest/v1/{}", self.base(), query.table))
            .header("apikey", key)
            .bearer_auth(key)
            .query(&query.params)
    }

    pub(crate) async fn select<T: DeserializeOwned>(&self, query: Query) -> Result<Vec<T>> {
        let response = self.table_request(Method::GET, &query).send().await?;
        let response = check(response, query.table).await?;
        Ok(response.json().await?)
    }

    pub(crate) async fn select_one<T: DeserializeOwned>(&self, query: Query) -> Result<Option<T>> {
        let mut rows = self.select(query.limit(1)).await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    pub(crate) async fn insert<T, B>(
        &self,
        table: &'static str,
        body: &B,
        conflict: Conflict,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut query = Query::table(table);
        let mut prefer = "return=representation".to_string();
        match conflict {
            Conflict::Fail => {}
            Conflict::Merge(columns) => {
                query = query.on_conflict(columns);
                prefer.push_str(",resolution=merge-duplicates");
            }
            Conflict::Ignore(columns) => {
                query = query.on_conflict(columns);
                prefer.push_str(",resolution=ignore-duplicates");
            }
        }

        let response = self
            .table_request(Method::POST, &query)
            .header("Prefer", prefer)
            .json(body)
            .send()
            .await?;
        let response = check(response, table).await?;
        Ok(response.json().await?)
    }

    pub(crate) async fn update<T, B>(&self, query: Query, body: &B) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self
            .table_request(Method::PATCH, &query)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        let response = check(response, query.table).await?;
        Ok(response.json().await?)
    }

    pub(crate) async fn delete(&self, query: Query) -> Result<()> {
        let response = self.table_request(Method::DELETE, &query).send().await?;
        check(response, query.table).await?;
        Ok(())
    }
}

async fn check(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    bail!("{what}: backend answered {status}: {body}")
}

pub(crate) enum Conflict {
    Fail,
    Merge(&'static str),
    Ignore(&'static str),
}

/// A PostgREST query string for one table.
#[derive(Debug, Clone)]
pub struct Query {
    table: &'static str,
    params: Vec<(String, String)>,
}

impl Query {
    pub fn table(table: &'static str) -> Self {
        Self {
            table,
            params: Vec::new(),
        }
    }

    pub fn select(self, columns: &str) -> Self {
        self.param("select", columns.to_string())
    }

    pub fn eq(self, column: &str, value: impl ToString) -> Self {
        self.param(column, format!("eq.{}", value.to_string()))
    }

    pub fn neq(self, column: &str, value: impl ToString) -> Self {
        self.param(column, format!("neq.{}", value.to_string()))
    }

    pub fn is_in(self, column: &str, values: &[String]) -> Self {
        let list = values
            .iter()
            .map(|v| quote(v))
            .collect::<Vec<_>>()
            .join(",");
        self.param(column, format!("in.({list})"))
    }

    /// `filters` are already in `column.op.value` form.
    pub fn or(self, filters: &[String]) -> Self {
        self.param("or", format!("({})", filters.join(",")))
    }

    /// `ordering` like `created_at.desc` or `last_read.desc.nullslast`.
    pub fn order(self, ordering: &str) -> Self {
        self.param("order", ordering.to_string())
    }

    pub fn limit(self, limit: usize) -> Self {
        self.param("limit", limit.to_string())
    }

    fn on_conflict(self, columns: &str) -> Self {
        self.param("on_conflict", columns.to_string())
    }

    fn param(mut self, key: &str, value: String) -> Self {
        self.params.push((key.to_string(), value));
        self
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

/// Values inside `or=(...)` and `in.(...)` need quoting when they carry
/// PostgREST's reserved characters.
pub fn quote(value: &str) -> String {
    if value
        .chars()
        .any(|c| matches!(c, ',' | '.' | ':' | '(' | ')' | '"' | '\\' | ' '))
    {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}
