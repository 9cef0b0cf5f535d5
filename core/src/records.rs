//! Auth-record flows on an auth collection.
//!
//! These endpoints take multipart form bodies. Password, OAuth2 and refresh
//! flows replace the client's session token on success; the email change
//! flow sends that session token instead of the strategy token.

use tracing::debug;

use crate::collection::Collection;
use crate::error::ApiError;
use crate::form::MultipartForm;
use crate::http::{HttpMethod, HttpRequest};
use crate::types::{AuthMethods, AuthResponse, OAuth2Response};

impl<T> Collection<'_, T> {
    /// Auth methods enabled on this collection.
    pub fn list_auth_methods(&self) -> Result<AuthMethods, ApiError> {
        let request = HttpRequest::new(HttpMethod::Get, self.action_url("auth-methods"));
        self.client.send("auth-methods", request)
    }

    /// Authenticate a record by identity (email or username) and password.
    pub fn auth_with_password(&self, identity: &str, password: &str) -> Result<AuthResponse, ApiError> {
        const OP: &str = "auth-with-password";
        let form = MultipartForm::new()
            .text("identity", identity)
            .text("password", password);
        let auth: AuthResponse = self
            .client
            .send(OP, self.form_request("auth-with-password", &form))
            .map_err(|e| e.into_auth_if_rejected(OP, "record authentication failed"))?;
        debug!(collection = %self.name(), record = %auth.record.id, "record authenticated with password");
        self.client.set_session_token(auth.token.clone());
        Ok(auth)
    }

    /// Authenticate a record with an OAuth2 authorization code.
    pub fn auth_with_oauth2_code(
        &self,
        provider: &str,
        code: &str,
        code_verifier: &str,
        redirect_url: &str,
    ) -> Result<OAuth2Response, ApiError> {
        const OP: &str = "auth-with-oauth2";
        let form = MultipartForm::new()
            .text("provider", provider)
            .text("code", code)
            .text("codeVerifier", code_verifier)
            .text("redirectUrl", redirect_url);
        let auth: OAuth2Response = self
            .client
            .send(OP, self.form_request("auth-with-oauth2", &form))
            .map_err(|e| e.into_auth_if_rejected(OP, "oauth2 authentication failed"))?;
        debug!(collection = %self.name(), provider, "record authenticated with oauth2");
        self.client.set_session_token(auth.token.clone());
        Ok(auth)
    }

    /// Exchange the current session token for a fresh one.
    pub fn auth_refresh(&self) -> Result<AuthResponse, ApiError> {
        const OP: &str = "auth-refresh";
        let token = self.require_session(OP)?;
        let request = HttpRequest::new(HttpMethod::Post, self.action_url("auth-refresh")).with_bearer(&token);
        let auth: AuthResponse = self
            .client
            .send(OP, request)
            .map_err(|e| e.into_auth_if_rejected(OP, "no valid record authorization"))?;
        self.client.set_session_token(auth.token.clone());
        Ok(auth)
    }

    /// Send a verification email to `email`.
    pub fn request_verification(&self, email: &str) -> Result<(), ApiError> {
        let form = MultipartForm::new().text("email", email);
        self.client
            .send_empty("request-verification", self.form_request("request-verification", &form))
    }

    /// Confirm a verification token received by email.
    pub fn confirm_verification(&self, token: &str) -> Result<(), ApiError> {
        let form = MultipartForm::new().text("token", token);
        self.client
            .send_empty("confirm-verification", self.form_request("confirm-verification", &form))
    }

    pub fn request_password_reset(&self, email: &str) -> Result<(), ApiError> {
        let form = MultipartForm::new().text("email", email);
        self.client
            .send_empty("request-password-reset", self.form_request("request-password-reset", &form))
    }

    /// Set a new password with a reset token. A mismatching confirmation is
    /// rejected by the server.
    pub fn confirm_password_reset(&self, token: &str, password: &str, password_confirm: &str) -> Result<(), ApiError> {
        let form = MultipartForm::new()
            .text("token", token)
            .text("password", password)
            .text("passwordConfirm", password_confirm);
        self.client
            .send_empty("confirm-password-reset", self.form_request("confirm-password-reset", &form))
    }

    /// Ask to move the authenticated record to `new_email`.
    pub fn request_email_change(&self, new_email: &str) -> Result<(), ApiError> {
        const OP: &str = "request-email-change";
        let token = self.require_session(OP)?;
        let form = MultipartForm::new().text("newEmail", new_email);
        let request = self.form_request("request-email-change", &form).with_bearer(&token);
        self.client.send_empty(OP, request)
    }

    pub fn confirm_email_change(&self, token: &str, password: &str) -> Result<(), ApiError> {
        const OP: &str = "confirm-email-change";
        let session = self.require_session(OP)?;
        let form = MultipartForm::new()
            .text("token", token)
            .text("password", password);
        let request = self.form_request("confirm-email-change", &form).with_bearer(&session);
        self.client.send_empty(OP, request)
    }

    fn action_url(&self, action: &str) -> String {
        format!("{}/{action}", self.base_path())
    }

    fn form_request(&self, action: &str, form: &MultipartForm) -> HttpRequest {
        HttpRequest::new(HttpMethod::Post, self.action_url(action))
            .with_header("content-type", form.content_type())
            .with_body(form.encode())
    }

    fn require_session(&self, op: &'static str) -> Result<String, ApiError> {
        let token = self.client.session_token();
        if token.is_empty() {
            return Err(ApiError::auth(op, "no valid record authorization"));
        }
        Ok(token)
    }
}
