//! Request parameters and response DTOs for the records API.
//!
//! Response types default every field so that older and newer server
//! versions, which add or drop fields, still decode.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form record, used when no typed shape is available.
pub type RecordMap = Map<String, Value>;

/// Query options for listing records. Zero and empty values are omitted
/// from the request, leaving the server default in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub page: u32,
    pub per_page: u32,
    pub filter: String,
    pub sort: String,
    pub fields: String,
    pub expand: String,
}

impl ListParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = sort.into();
        self
    }

    pub fn fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = fields.into();
        self
    }

    pub fn expand(mut self, expand: impl Into<String>) -> Self {
        self.expand = expand.into();
        self
    }

    /// Query pairs for a list request.
    pub(crate) fn list_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if self.page > 0 {
            query.push(("page".to_string(), self.page.to_string()));
        }
        if self.per_page > 0 {
            query.push(("perPage".to_string(), self.per_page.to_string()));
        }
        push_non_empty(&mut query, "filter", &self.filter);
        push_non_empty(&mut query, "sort", &self.sort);
        push_non_empty(&mut query, "expand", &self.expand);
        push_non_empty(&mut query, "fields", &self.fields);
        query
    }

    /// Query pairs for a single-record fetch: only `fields` and `expand`.
    pub(crate) fn view_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        push_non_empty(&mut query, "fields", &self.fields);
        push_non_empty(&mut query, "expand", &self.expand);
        query
    }
}

fn push_non_empty(query: &mut Vec<(String, String)>, key: &str, value: &str) {
    if !value.is_empty() {
        query.push((key.to_string(), value.to_string()));
    }
}

/// One page of records, in server order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub total_items: u64,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

impl<T> Default for ListResponse<T> {
    fn default() -> Self {
        Self {
            page: 0,
            per_page: 0,
            total_items: 0,
            total_pages: 0,
            items: Vec::new(),
        }
    }
}

/// Server echo of a freshly created record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResponse {
    pub id: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
    #[serde(default)]
    pub collection_id: String,
    #[serde(default)]
    pub collection_name: String,
    /// Every other field the server echoed back.
    #[serde(flatten)]
    pub fields: RecordMap,
}

/// Standard fields of an auth-collection record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthRecord {
    pub id: String,
    pub collection_id: String,
    pub collection_name: String,
    pub created: String,
    pub updated: String,
    pub email: String,
    pub email_visibility: bool,
    pub verified: bool,
    pub username: String,
    pub name: String,
    pub avatar: String,
}

/// `{record, token}` returned by password authentication and refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub record: AuthRecord,
    pub token: String,
}

/// Result of an OAuth2 code exchange.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2Response {
    pub token: String,
    #[serde(default)]
    pub record: Option<AuthRecord>,
    /// Provider account data (name, email, avatar, ...).
    #[serde(default)]
    pub meta: Option<Value>,
}

/// Capabilities of an auth collection, from `/auth-methods`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthMethods {
    pub password: PasswordMethod,
    #[serde(rename = "oauth2")]
    pub oauth2: OAuth2Method,
    pub mfa: TimedMethod,
    pub otp: TimedMethod,

    // Fields reported by pre-0.23 servers.
    pub auth_providers: Vec<ProviderInfo>,
    pub username_password: bool,
    pub email_password: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PasswordMethod {
    pub enabled: bool,
    pub identity_fields: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuth2Method {
    pub enabled: bool,
    pub providers: Vec<ProviderInfo>,
}

/// MFA and OTP settings. `duration` is in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimedMethod {
    pub enabled: bool,
    pub duration: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderInfo {
    pub name: String,
    pub display_name: String,
    pub state: String,
    #[serde(rename = "authURL")]
    pub auth_url: String,
    /// Same value as `auth_url`, under the pre-0.23 key.
    #[serde(rename = "authUrl")]
    pub legacy_auth_url: String,
    pub code_verifier: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
}
