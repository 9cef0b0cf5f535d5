//! multipart/form-data bodies for the auth-record endpoints.

use uuid::Uuid;

/// A multipart body with text fields only.
#[derive(Debug, Clone)]
pub(crate) struct MultipartForm {
    boundary: String,
    fields: Vec<(&'static str, String)>,
}

impl MultipartForm {
    pub(crate) fn new() -> Self {
        Self {
            boundary: format!("pocketbase-{}", Uuid::new_v4().simple()),
            fields: Vec::new(),
        }
    }

    pub(crate) fn text(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.fields.push((name, value.into()));
        self
    }

    pub(crate) fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub(crate) fn encode(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.fields {
            out.push_str("--");
            out.push_str(&self.boundary);
            out.push_str("\r\n");
            out.push_str(&format!(
                "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
            ));
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str("--");
        out.push_str(&self.boundary);
        out.push_str("--\r\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_fields_in_order_with_closing_boundary() {
        let form = MultipartForm::new()
            .text("identity", "user@example.com")
            .text("password", "secret");
        let boundary = form.boundary.clone();
        let body = form.encode();

        let expected = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"identity\"\r\n\r\nuser@example.com\r\n\
             --{boundary}\r\nContent-Disposition: form-data; name=\"password\"\r\n\r\nsecret\r\n\
             --{boundary}--\r\n"
        );
        assert_eq!(body, expected);
        assert_eq!(
            form.content_type(),
            format!("multipart/form-data; boundary={boundary}")
        );
    }

    #[test]
    fn boundaries_are_unique() {
        assert_ne!(MultipartForm::new().boundary, MultipartForm::new().boundary);
    }
}
