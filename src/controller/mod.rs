//! The default page controller
//!
//! Every page route lands here. `index` renders the resolved page, `index_post`
//! hands a posted form to the [`FormService`] and answers with the page picked
//! for the outcome.

use crate::content::{Linkable, LinkableResolver, ResultLink};
use crate::di::{Inject, InjectTrait};
use crate::error::Result;
use crate::services::{Antiforgery, FormCollection, FormPostResult, FormService};
use crate::view::{ViewContext, ViewEngine, ViewScope};
use crate::DeriveInjectable as Injectable;
use axum::{
    Extension,
    extract::FromRequestParts,
    http::{HeaderValue, header, request::Parts},
    response::{Html, IntoResponse, Redirect, Response},
};
use std::convert::Infallible;
use std::sync::Arc;

#[derive(Injectable)]
pub struct EasywebController {
    views: Arc<ViewEngine>,
    content: Arc<LinkableResolver>,
    antiforgery: Arc<Antiforgery>,
}

impl EasywebController {
    pub fn new(
        views: Arc<ViewEngine>,
        content: Arc<LinkableResolver>,
        antiforgery: Arc<Antiforgery>,
    ) -> Self {
        Self {
            views,
            content,
            antiforgery,
        }
    }

    /// Render the page's default view
    pub fn index(&self, page: &Linkable, scope: &ViewScope) -> Result<Response> {
        let context = self
            .views
            .context(scope)
            .with_page(page.clone())
            .partial(scope.background);
        self.render(page, context, scope)
    }

    /// Process a posted form and answer with the page for its outcome
    pub async fn index_post(
        &self,
        page: &Linkable,
        form: &FormCollection,
        forms: &dyn FormService,
        scope: &ViewScope,
    ) -> Result<Response> {
        let result = forms.handle_form(form, page).await?;
        let link = if result.successful {
            ResultLink::GoodPostPage
        } else {
            ResultLink::BadPostPage
        };
        tracing::info!(
            page = %page.path,
            successful = result.successful,
            "Form posted, answering with {}",
            link
        );
        self.form_post_result(link, page, result, scope).await
    }

    /// Background requests get the result page rendered in place, page
    /// navigations are redirected to it. Without a configured result page the
    /// current page is rendered with the outcome.
    pub async fn form_post_result(
        &self,
        link: ResultLink,
        current: &Linkable,
        result: FormPostResult,
        scope: &ViewScope,
    ) -> Result<Response> {
        let target = match self.content.content().find_result_link(link).await {
            Some(target) => Some(self.content.resolve(&target.path).await.unwrap_or(target)),
            None => None,
        };

        if scope.background {
            let page = target.unwrap_or_else(|| current.clone());
            let context = self
                .views
                .context(scope)
                .with_page(page.clone())
                .with_form_result(result)
                .partial(true);
            return self.render(&page, context, scope);
        }

        match target {
            Some(target) => Ok(Redirect::to(&target.path).into_response()),
            None => {
                let context = self
                    .views
                    .context(scope)
                    .with_page(current.clone())
                    .with_form_result(result);
                self.render(current, context, scope)
            }
        }
    }

    fn render(&self, page: &Linkable, mut context: ViewContext, scope: &ViewScope) -> Result<Response> {
        let issued = match &scope.antiforgery_token {
            Some(_) => None,
            None => Some(self.antiforgery.issue()),
        };
        if let Some(token) = &issued {
            context.antiforgery_token = Some(token.clone());
        }

        let view = self
            .views
            .render_view(page.view_name(), page.module.as_deref(), &context)?;
        let mut response = Html(view.html).into_response();
        if view.per_visitor {
            response.headers_mut().insert(
                header::CACHE_CONTROL,
                HeaderValue::from_static("private, no-store"),
            );
        }
        if let Some(token) = issued {
            self.antiforgery.append_cookie(response.headers_mut(), &token);
        }
        Ok(response)
    }
}

/// The url-encoded form buffered by the route's guard layer, empty if none was posted
pub struct PostedForm(pub FormCollection);

impl<S: Send + Sync> FromRequestParts<S> for PostedForm {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .extensions
                .get::<FormCollection>()
                .cloned()
                .unwrap_or_default(),
        ))
    }
}

/// `GET` on a page route
pub async fn index(
    Inject(controller): Inject<EasywebController>,
    Extension(page): Extension<Linkable>,
    scope: ViewScope,
) -> Result<Response> {
    controller.index(&page, &scope)
}

/// `POST` on a page route
pub async fn index_post(
    Inject(controller): Inject<EasywebController>,
    InjectTrait(forms): InjectTrait<dyn FormService>,
    Extension(page): Extension<Linkable>,
    scope: ViewScope,
    PostedForm(form): PostedForm,
) -> Result<Response> {
    controller
        .index_post(&page, &form, forms.as_ref(), &scope)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormOptions;
    use crate::content::{ContentStore, JsonContentStore};
    use crate::error::SiteError;
    use crate::services::{CaptchaStore, Localizer};
    use async_trait::async_trait;
    use axum::body::to_bytes;
    use axum::http::{StatusCode, header};
    use std::collections::HashMap;
    use std::path::Path;
    use uuid::Uuid;

    struct Outcome(Option<bool>);

    #[async_trait]
    impl FormService for Outcome {
        async fn handle_form(&self, _form: &FormCollection, _page: &Linkable) -> Result<FormPostResult> {
            match self.0 {
                Some(true) => Ok(FormPostResult::succeeded(Uuid::new_v4())),
                Some(false) => Ok(FormPostResult::failed(vec!["name is required".to_string()])),
                None => Err(SiteError::FormProcessing("mail server down".to_string())),
            }
        }
    }

    fn controller(root: &Path, with_result_pages: bool) -> EasywebController {
        std::fs::write(
            root.join("Index.html"),
            "{{ page.title }}{% if form_result %}|{{ form_result.successful }}{% endif %}{% if partial %}|partial{% endif %}",
        )
        .unwrap();

        let mut pages = vec![Linkable::new("1", "/contact", "Contact")];
        if with_result_pages {
            pages.push(Linkable::new("2", "/thanks", "Thanks").with_result_link(ResultLink::GoodPostPage));
            pages.push(Linkable::new("3", "/sorry", "Sorry").with_result_link(ResultLink::BadPostPage));
        }
        let store: Arc<dyn ContentStore> = Arc::new(JsonContentStore::from_pages(pages));
        let views = ViewEngine::new(
            root,
            "Site",
            Arc::new(Localizer::from_tables(Vec::new(), HashMap::new())),
            Arc::new(CaptchaStore::new(&FormOptions::default())),
            false,
        );
        EasywebController::new(
            Arc::new(views),
            Arc::new(LinkableResolver::new(store, Vec::new())),
            Arc::new(Antiforgery::new()),
        )
    }

    fn contact() -> Linkable {
        Linkable::new("1", "/contact", "Contact")
    }

    async fn body(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_index_renders_and_issues_antiforgery_cookie() {
        let dir = tempfile::tempdir().unwrap();
        let response = controller(dir.path(), false)
            .index(&contact(), &ViewScope::default())
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(cookie.starts_with("ew-xsrf="));
        assert_eq!(body(response).await, "Contact");
    }

    #[tokio::test]
    async fn test_post_redirects_to_result_pages() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(dir.path(), true);
        let form = FormCollection::default();
        let scope = ViewScope::default();

        let response = controller
            .index_post(&contact(), &form, &Outcome(Some(true)), &scope)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/thanks");

        let response = controller
            .index_post(&contact(), &form, &Outcome(Some(false)), &scope)
            .await
            .unwrap();
        assert_eq!(response.headers()[header::LOCATION], "/sorry");
    }

    #[tokio::test]
    async fn test_background_post_renders_result_page_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let scope = ViewScope {
            background: true,
            ..ViewScope::default()
        };
        let response = controller(dir.path(), true)
            .index_post(&contact(), &FormCollection::default(), &Outcome(Some(true)), &scope)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await, "Thanks|true|partial");
    }

    #[tokio::test]
    async fn test_without_result_pages_current_page_shows_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let response = controller(dir.path(), false)
            .index_post(
                &contact(),
                &FormCollection::default(),
                &Outcome(Some(false)),
                &ViewScope::default(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await, "Contact|false");
    }

    #[tokio::test]
    async fn test_form_service_failures_propagate() {
        let dir = tempfile::tempdir().unwrap();
        let err = controller(dir.path(), true)
            .index_post(&contact(), &FormCollection::default(), &Outcome(None), &ViewScope::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SiteError::FormProcessing(_)));
    }
}
