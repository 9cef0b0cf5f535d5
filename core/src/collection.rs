//! Typed CRUD and listing over one collection.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::client::Client;
use crate::error::{ApiError, FullListError};
use crate::executor::encode;
use crate::http::{HttpMethod, HttpRequest};
use crate::types::{CreateResponse, ListParams, ListResponse};

/// Page size used by [`Collection::full_list`] for every page of a sweep.
pub const FULL_LIST_PAGE_SIZE: u32 = 500;

/// A view of one collection whose records decode into `T`.
///
/// Borrows the [`Client`]; cheap to create and drop.
pub struct Collection<'c, T> {
    pub(crate) client: &'c Client,
    name: String,
    base_path: String,
    _record: PhantomData<fn() -> T>,
}

impl<'c, T> Collection<'c, T> {
    pub(crate) fn new(client: &'c Client, name: &str) -> Self {
        Self {
            client,
            name: name.to_string(),
            base_path: client.url(&format!("/api/collections/{}", urlencoding::encode(name))),
            _record: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute URL of the collection, e.g. `http://host/api/collections/posts`.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    fn records_url(&self) -> String {
        format!("{}/records", self.base_path)
    }

    fn record_url(&self, id: &str) -> String {
        format!("{}/records/{}", self.base_path, urlencoding::encode(id))
    }

    pub fn delete(&self, id: &str) -> Result<(), ApiError> {
        let request = HttpRequest::new(HttpMethod::Delete, self.record_url(id));
        self.client.send_empty("delete", request)
    }

    /// Fetch one record into any shape, e.g. a partial struct.
    pub fn one_to<R: DeserializeOwned>(&self, id: &str) -> Result<R, ApiError> {
        let request = HttpRequest::new(HttpMethod::Get, self.record_url(id));
        self.client.send("oneTo", request)
    }
}

impl<T: Serialize> Collection<'_, T> {
    pub fn create(&self, body: &T) -> Result<CreateResponse, ApiError> {
        let body = encode("create", body)?;
        let request = HttpRequest::new(HttpMethod::Post, self.records_url()).with_body(body);
        self.client.send("create", request)
    }

    /// Patch a record. The response body is not decoded.
    pub fn update(&self, id: &str, body: &T) -> Result<(), ApiError> {
        let body = encode("update", body)?;
        let request = HttpRequest::new(HttpMethod::Patch, self.record_url(id)).with_body(body);
        self.client.send_empty("update", request)
    }
}

impl<T: DeserializeOwned> Collection<'_, T> {
    pub fn one(&self, id: &str) -> Result<T, ApiError> {
        let request = HttpRequest::new(HttpMethod::Get, self.record_url(id));
        self.client.send("one", request)
    }

    /// Like [`Collection::one`], forwarding `fields` and `expand` from
    /// `params`. Paging, filter and sort do not apply to a single record and
    /// are ignored.
    pub fn one_with_params(&self, id: &str, params: &ListParams) -> Result<T, ApiError> {
        let mut request = HttpRequest::new(HttpMethod::Get, self.record_url(id));
        request.query = params.view_query();
        self.client.send("one", request)
    }

    /// Fetch a single page.
    pub fn list(&self, params: &ListParams) -> Result<ListResponse<T>, ApiError> {
        let mut request = HttpRequest::new(HttpMethod::Get, self.records_url());
        request.query = params.list_query();
        self.client.send("list", request)
    }

    /// Fetch every page and concatenate the items in page order.
    ///
    /// The page size is forced to [`FULL_LIST_PAGE_SIZE`] and the number of
    /// pages is taken from the first response only, so records written
    /// during the sweep may be missed or seen twice. On failure the error
    /// carries everything collected so far.
    pub fn full_list(&self, params: &ListParams) -> Result<ListResponse<T>, FullListError<T>> {
        let mut params = params.clone();
        params.page = 1;
        params.per_page = FULL_LIST_PAGE_SIZE;

        let mut all = self.list(&params).map_err(|source| FullListError {
            partial: ListResponse::default(),
            source,
        })?;
        let total_pages = all.total_pages;
        debug!(collection = %self.name, total_pages, total_items = all.total_items, "full list started");

        for page in 2..=total_pages {
            params.page = page;
            match self.list(&params) {
                Ok(next) => all.items.extend(next.items),
                Err(source) => {
                    debug!(collection = %self.name, page, error = %source, "full list stopped");
                    return Err(FullListError {
                        partial: all,
                        source,
                    });
                }
            }
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::error::TransportError;
    use crate::executor::testing::FakeTransport;

    const BASE: &str = "http://127.0.0.1:8090";

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Post {
        #[serde(default, skip_serializing_if = "String::is_empty")]
        id: String,
        field: String,
    }

    fn setup() -> (Arc<FakeTransport>, Client) {
        let transport = Arc::new(FakeTransport::new());
        let client = Client::builder(BASE).transport(transport.clone()).build();
        (transport, client)
    }

    fn page(page: u32, total_pages: u32, ids: &[&str]) -> String {
        let items: Vec<_> = ids.iter().map(|id| json!({"id": id, "field": "x"})).collect();
        json!({
            "page": page,
            "perPage": 500,
            "totalItems": 1001,
            "totalPages": total_pages,
            "items": items,
        })
        .to_string()
    }

    #[test]
    fn create_posts_json_to_records_endpoint() {
        let (transport, client) = setup();
        transport.respond(
            200,
            r#"{"id":"abc","created":"2024-01-01 00:00:00.000Z","updated":"2024-01-01 00:00:00.000Z","collectionId":"c1","collectionName":"posts","field":"x"}"#,
        );
        let posts = client.collection::<Post>("posts");
        let created = posts
            .create(&Post {
                id: String::new(),
                field: "x".to_string(),
            })
            .unwrap();
        assert_eq!(created.id, "abc");
        assert_eq!(created.collection_name, "posts");

        let req = &transport.requests()[0];
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://127.0.0.1:8090/api/collections/posts/records");
        assert_eq!(req.header("content-type"), Some("application/json"));
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"field": "x"}));
    }

    #[test]
    fn update_patches_record_and_ignores_body() {
        let (transport, client) = setup();
        transport.respond(200, "this is not decoded");
        client
            .collection::<Post>("posts")
            .update(
                "abc",
                &Post {
                    id: String::new(),
                    field: "y".to_string(),
                },
            )
            .unwrap();
        let req = &transport.requests()[0];
        assert_eq!(req.method, HttpMethod::Patch);
        assert_eq!(req.url, "http://127.0.0.1:8090/api/collections/posts/records/abc");
    }

    #[test]
    fn delete_then_one_reports_not_found() {
        let (transport, client) = setup();
        transport
            .respond(204, "")
            .respond(404, r#"{"code":404,"message":"The requested resource wasn't found."}"#);
        let posts = client.collection::<Post>("posts");
        posts.delete("abc").unwrap();
        let err = posts.one("abc").unwrap_err();
        assert!(err.is_not_found());
        assert!(err.body().unwrap().contains("wasn't found"));
        assert_eq!(transport.requests()[0].method, HttpMethod::Delete);
    }

    #[test]
    fn one_to_decodes_partial_shape() {
        #[derive(Deserialize)]
        struct IdOnly {
            id: String,
        }
        let (transport, client) = setup();
        transport.respond(200, r#"{"id":"abc","field":"x","extra":1}"#);
        let partial: IdOnly = client.collection::<Post>("posts").one_to("abc").unwrap();
        assert_eq!(partial.id, "abc");
    }

    #[test]
    fn one_with_unexpected_shape_is_decode_error() {
        let (transport, client) = setup();
        transport.respond(200, r#"{"id":"abc"}"#);
        let err = client.collection::<Post>("posts").one("abc").unwrap_err();
        assert!(matches!(err, ApiError::Decode { op: "one", .. }));
    }

    #[test]
    fn one_with_params_forwards_only_fields_and_expand() {
        let (transport, client) = setup();
        transport.respond(200, r#"{"id":"abc","field":"x"}"#);
        let params = ListParams::new().page(2).filter("a = 1").fields("id,field").expand("author");
        client.collection::<Post>("posts").one_with_params("abc", &params).unwrap();
        let req = &transport.requests()[0];
        assert_eq!(
            req.query,
            vec![
                ("fields".to_string(), "id,field".to_string()),
                ("expand".to_string(), "author".to_string()),
            ]
        );
    }

    #[test]
    fn list_with_defaults_sends_no_query() {
        let (transport, client) = setup();
        transport.respond(200, &page(1, 1, &["a"]));
        let result = client.records("posts").list(&ListParams::default()).unwrap();
        assert_eq!(result.items.len(), 1);
        assert!(transport.requests()[0].query.is_empty());
    }

    #[test]
    fn list_returns_page_verbatim() {
        let (transport, client) = setup();
        transport.respond(200, &page(2, 3, &["c", "b"]));
        let params = ListParams::new().page(2).per_page(2).sort("-created");
        let result = client.collection::<Post>("posts").list(&params).unwrap();
        assert_eq!(result.page, 2);
        assert_eq!(result.total_pages, 3);
        let ids: Vec<_> = result.items.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);

        let req = &transport.requests()[0];
        assert_eq!(req.query_param("page"), Some("2"));
        assert_eq!(req.query_param("perPage"), Some("2"));
        assert_eq!(req.query_param("sort"), Some("-created"));
        assert_eq!(req.query_param("filter"), None);
    }

    #[test]
    fn full_list_forces_page_size_and_appends_in_order() {
        let (transport, client) = setup();
        transport
            .respond(200, &page(1, 3, &["a", "b"]))
            .respond(200, &page(2, 3, &["c"]))
            .respond(200, &page(3, 3, &["d"]));
        let params = ListParams::new().page(7).per_page(10).filter("field = 'x'");
        let all = client.collection::<Post>("posts").full_list(&params).unwrap();

        let ids: Vec<_> = all.items.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert_eq!(all.page, 1);
        assert_eq!(all.total_pages, 3);

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        for (i, req) in requests.iter().enumerate() {
            assert_eq!(req.query_param("page"), Some((i + 1).to_string().as_str()));
            assert_eq!(req.query_param("perPage"), Some("500"));
            assert_eq!(req.query_param("filter"), Some("field = 'x'"));
        }
    }

    #[test]
    fn full_list_uses_first_page_count_only() {
        let (transport, client) = setup();
        transport
            .respond(200, &page(1, 2, &["a"]))
            .respond(200, &page(2, 5, &["b"]));
        let all = client.records("posts").full_list(&ListParams::default()).unwrap();
        assert_eq!(all.items.len(), 2);
        assert_eq!(transport.request_count(), 2);
    }

    #[test]
    fn full_list_returns_partial_items_on_failure() {
        let (transport, client) = setup();
        transport
            .respond(200, &page(1, 3, &["a", "b"]))
            .fail(TransportError::Timeout);
        let err = client
            .collection::<Post>("posts")
            .full_list(&ListParams::default())
            .unwrap_err();
        assert_eq!(err.partial.items.len(), 2);
        assert!(matches!(err.source, ApiError::Transport { op: "list", .. }));
        assert_eq!(transport.request_count(), 2);
    }

    #[test]
    fn full_list_first_page_failure_has_empty_partial() {
        let (transport, client) = setup();
        transport.respond(400, r#"{"message":"Invalid filter."}"#);
        let err = client
            .collection::<Post>("posts")
            .full_list(&ListParams::new().filter("???"))
            .unwrap_err();
        assert!(err.partial.items.is_empty());
        assert_eq!(err.source.status(), Some(400));
    }

    #[test]
    fn names_and_ids_are_escaped() {
        let (transport, client) = setup();
        transport.respond(204, "");
        let col = client.records("my posts");
        assert_eq!(col.base_path(), "http://127.0.0.1:8090/api/collections/my%20posts");
        col.delete("a/b").unwrap();
        assert_eq!(
            transport.requests()[0].url,
            "http://127.0.0.1:8090/api/collections/my%20posts/records/a%2Fb"
        );
    }
}
