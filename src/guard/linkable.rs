use crate::content::LinkableResolver;
use crate::guard::{Guard, GuardError, GuardResult};
use crate::services::{Authenticator, Principal};
use async_trait::async_trait;
use axum::{body::Body, http::Request};
use std::sync::Arc;

/// Requires the request path to resolve to a page the visitor may see.
///
/// The resolved [`Linkable`](crate::content::Linkable) is added to the request
/// extensions for the handler.
pub struct EnsureLinkable {
    resolver: Arc<LinkableResolver>,
    authenticator: Arc<Authenticator>,
}

impl EnsureLinkable {
    pub fn new(resolver: Arc<LinkableResolver>, authenticator: Arc<Authenticator>) -> Self {
        Self {
            resolver,
            authenticator,
        }
    }
}

#[async_trait]
impl Guard for EnsureLinkable {
    async fn can_activate(&self, request: &mut Request<Body>) -> GuardResult {
        let path = request.uri().path().to_string();
        let page = self
            .resolver
            .resolve(&path)
            .await
            .ok_or_else(|| GuardError::NotFound(path.clone()))?;

        let logged_in = request.extensions().get::<Principal>().is_some();
        if page.requires_authentication
            && self.authenticator.site_authentication_enabled()
            && !logged_in
        {
            return Err(GuardError::Unauthorized(path));
        }

        request.extensions_mut().insert(page);
        Ok(())
    }
}
