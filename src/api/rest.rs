//! Minimal PostgREST client
//!
//! Mirrors the query-builder shape of the hosted backend's JS client:
//! `rest.from("glazes").select("*").eq("id", id).single().await`.

use crate::error::AppError;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

const OBJECT_MEDIA_TYPE: &str = "application/vnd.pgrst.object+json";

#[derive(Debug, Clone)]
pub struct RestClient {
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
    http: reqwest::Client,
}

impl RestClient {
    pub fn new(base_url: &str, anon_key: &str, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            access_token: None,
            http,
        }
    }

    /// Session token for row-level security; `None` sends the public key
    pub fn set_access_token(&mut self, token: Option<String>) {
        self.access_token = token;
    }

    pub fn from(&self, table: &str) -> Query<'_> {
        Query {
            client: self,
            table: table.to_string(),
            params: Vec::new(),
        }
    }
}

/// A request against one table, built up filter by filter
pub struct Query<'a> {
    client: &'a RestClient,
    table: String,
    params: Vec<(String, String)>,
}

impl<'a> Query<'a> {
    pub fn select(mut self, columns: &str) -> Self {
        self.params.retain(|(k, _)| k != "select");
        self.params.push(("select".to_string(), compact(columns)));
        self
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.params
            .push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    /// Raw disjunction such as `user_id.eq.42,is_public.eq.true`
    pub fn or(mut self, filters: &str) -> Self {
        self.params.push(("or".to_string(), format!("({})", filters)));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.params
            .push(("order".to_string(), format!("{}.{}", column, direction)));
        self
    }

    /// Conflict target for upserts, e.g. `project_id,stage`
    pub fn on_conflict(mut self, columns: &str) -> Self {
        self.params
            .push(("on_conflict".to_string(), columns.to_string()));
        self
    }

    pub fn url(&self) -> Result<Url, AppError> {
        let base = format!("{}/rest/v1/{}", self.client.base_url, self.table);
        let url = if self.params.is_empty() {
            Url::parse(&base)
        } else {
            Url::parse_with_params(&base, &self.params)
        };
        url.map_err(|e| AppError::Config(format!("Invalid backend URL: {}", e)))
    }

    fn request(&self, method: Method) -> Result<reqwest::RequestBuilder, AppError> {
        let client = self.client;
        let token = client.access_token.as_deref().unwrap_or(&client.anon_key);
        Ok(client
            .http
            .request(method, self.url()?)
            .header("apikey", &client.anon_key)
            .bearer_auth(token))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, AppError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        log::debug!("{} answered {}: {}", self.table, status, body);
        match status.as_u16() {
            401 => Err(AppError::AuthRequired),
            // Object media type with zero (or several) matching rows
            406 => Err(AppError::NotFound(self.table.clone())),
            code => Err(AppError::Remote {
                status: code,
                message: error_message(&body)
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string()),
            }),
        }
    }

    /// All matching rows
    pub async fn fetch<T: DeserializeOwned>(self) -> Result<Vec<T>, AppError> {
        let body = self.send(self.request(Method::GET)?).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Exactly one row; none is `NotFound`
    pub async fn single<T: DeserializeOwned>(self) -> Result<T, AppError> {
        let request = self
            .request(Method::GET)?
            .header("Accept", OBJECT_MEDIA_TYPE);
        let body = self.send(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// First row, if any
    pub async fn maybe_single<T: DeserializeOwned>(self) -> Result<Option<T>, AppError> {
        let rows: Vec<T> = self.fetch().await?;
        Ok(rows.into_iter().next())
    }

    async fn write<B, T>(self, method: Method, body: &B, prefer: &str) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .request(method)?
            .header("Accept", OBJECT_MEDIA_TYPE)
            .header("Prefer", prefer)
            .json(body);
        let body = self.send(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Inserts one row and returns it as stored
    pub async fn insert<B, T>(self, body: &B) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.write(Method::POST, body, "return=representation").await
    }

    /// Insert or merge on the `on_conflict` target
    pub async fn upsert<B, T>(self, body: &B) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.write(
            Method::POST,
            body,
            "resolution=merge-duplicates,return=representation",
        )
        .await
    }

    /// Patches the single row matched by the filters
    pub async fn update<B, T>(self, body: &B) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.write(Method::PATCH, body, "return=representation").await
    }

    pub async fn delete(self) -> Result<(), AppError> {
        self.send(self.request(Method::DELETE)?).await?;
        Ok(())
    }
}

/// Embedded selects are written multi-line for readability; the wire form has
/// no whitespace
fn compact(columns: &str) -> String {
    columns.chars().filter(|c| !c.is_whitespace()).collect()
}

fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error_description", "error", "hint"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
}
