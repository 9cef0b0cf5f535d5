//! Response classification shared by every operation.

use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse, Transport};

/// Send `request` and map the outcome: no response is `Transport`, a
/// non-2xx status is `Server` with the body kept verbatim.
pub(crate) fn execute(
    transport: &dyn Transport,
    op: &'static str,
    request: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let response = transport
        .send(request)
        .map_err(|source| ApiError::Transport { op, source })?;
    if !response.is_success() {
        return Err(ApiError::Server {
            op,
            status: response.status,
            body: response.body,
        });
    }
    Ok(response)
}

pub(crate) fn decode<R: DeserializeOwned>(op: &'static str, response: &HttpResponse) -> Result<R, ApiError> {
    serde_json::from_str(&response.body).map_err(|source| ApiError::Decode { op, source })
}

pub(crate) fn encode<B: serde::Serialize + ?Sized>(op: &'static str, body: &B) -> Result<String, ApiError> {
    serde_json::to_string(body).map_err(|source| ApiError::Encode { op, source })
}


#[cfg(test)]
mod tests {
    use super::testing::FakeTransport;
    use super::*;
    use crate::error::TransportError;
    use crate::http::HttpMethod;

    fn request() -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, "http://localhost:8090/api/collections/posts/records")
    }

    #[test]
    fn error_status_keeps_body_verbatim() {
        let transport = FakeTransport::new();
        transport.respond(400, r#"{"code":400,"message":"Invalid filter."}"#);
        let err = execute(&transport, "list", request()).unwrap_err();
        match err {
            ApiError::Server { op, status, body } => {
                assert_eq!(op, "list");
                assert_eq!(status, 400);
                assert_eq!(body, r#"{"code":400,"message":"Invalid filter."}"#);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn transport_failure_is_not_a_server_error() {
        let transport = FakeTransport::new();
        transport.fail(TransportError::Timeout);
        let err = execute(&transport, "list", request()).unwrap_err();
        assert!(matches!(
            err,
            ApiError::Transport {
                source: TransportError::Timeout,
                ..
            }
        ));
    }

    #[test]
    fn bad_json_is_a_decode_error() {
        let transport = FakeTransport::new();
        transport.respond(200, "not json");
        let response = execute(&transport, "one", request()).unwrap();
        let err = decode::<serde_json::Value>("one", &response).unwrap_err();
        assert!(matches!(err, ApiError::Decode { op: "one", .. }));
    }
}
