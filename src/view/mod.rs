//! View engine: locates templates under `Views/` and renders them with minijinja.

use crate::content::Linkable;
use crate::interceptor::PostNotification;
use crate::services::{
    Antiforgery, CaptchaStore, FormCollection, FormPostResult, Localizer, Principal,
    RequestCulture,
};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap};
use minijinja::{Environment, Value, context, default_auto_escape_callback, path_loader};
use serde::Serialize;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

pub mod locations;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("View '{view}' not found, searched: {}", .searched.join(", "))]
    NotFound { view: String, searched: Vec<String> },

    #[error(transparent)]
    Render(#[from] minijinja::Error),
}

/// What a request contributes to every rendered view
#[derive(Debug, Clone, Default)]
pub struct ViewScope {
    pub culture: Option<String>,
    pub is_post: bool,
    pub posted_form: Option<String>,
    pub principal: Option<Principal>,
    pub background: bool,
    pub antiforgery_token: Option<String>,
}

impl ViewScope {
    pub fn from_request_head(headers: &HeaderMap, extensions: &Extensions) -> Self {
        let posted = extensions.get::<PostNotification>();
        Self {
            culture: extensions.get::<RequestCulture>().map(|c| c.0.clone()),
            is_post: posted.is_some(),
            posted_form: extensions
                .get::<FormCollection>()
                .filter(|_| posted.is_some())
                .and_then(|form| form.form_id())
                .map(str::to_string),
            principal: extensions.get::<Principal>().cloned(),
            background: crate::request::is_background_request(headers),
            antiforgery_token: Antiforgery::new().cookie_token(headers),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ViewScope {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_request_head(&parts.headers, &parts.extensions))
    }
}

/// The model handed to templates
#[derive(Debug, Clone, Default, Serialize)]
pub struct ViewContext {
    pub site_name: String,
    pub culture: String,
    pub page: Option<Linkable>,
    pub is_post: bool,
    pub posted_form: Option<String>,
    pub form_result: Option<FormPostResult>,
    /// Rendered for a background request, layouts should be skipped
    pub partial: bool,
    pub is_admin: bool,
    pub antiforgery_token: Option<String>,
    pub status_code: Option<u16>,
}

impl ViewContext {
    pub fn with_page(mut self, page: Linkable) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_form_result(mut self, result: FormPostResult) -> Self {
        self.form_result = Some(result);
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }
}

/// Rendered HTML and whether it embeds tokens issued to this visitor
#[derive(Debug, Clone)]
pub struct RenderedView {
    pub html: String,
    pub per_visitor: bool,
}

/// Template lookup and rendering for the site's views
pub struct ViewEngine {
    root: PathBuf,
    site_name: String,
    localizer: Arc<Localizer>,
    captcha: Arc<CaptchaStore>,
    runtime_compilation: bool,
    env: Environment<'static>,
}

impl ViewEngine {
    pub fn new(
        root: impl Into<PathBuf>,
        site_name: impl Into<String>,
        localizer: Arc<Localizer>,
        captcha: Arc<CaptchaStore>,
        runtime_compilation: bool,
    ) -> Self {
        let root = root.into();
        let env = build_environment(&root, &localizer);
        Self {
            root,
            site_name: site_name.into(),
            localizer,
            captcha,
            runtime_compilation,
            env,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn runtime_compilation(&self) -> bool {
        self.runtime_compilation
    }

    /// Start a context for the current request
    pub fn context(&self, scope: &ViewScope) -> ViewContext {
        ViewContext {
            site_name: self.site_name.clone(),
            culture: scope
                .culture
                .clone()
                .unwrap_or_else(|| self.localizer.default_culture().to_string()),
            is_post: scope.is_post,
            posted_form: scope.posted_form.clone(),
            is_admin: scope.principal.as_ref().is_some_and(Principal::is_admin),
            antiforgery_token: scope.antiforgery_token.clone(),
            ..ViewContext::default()
        }
    }

    /// Find the template path for `name`, trying each expanded location in order
    pub fn find_view(
        &self,
        name: &str,
        module: Option<&str>,
        culture: Option<&str>,
    ) -> Result<String, ViewError> {
        let searched = locations::expand(name, module, culture);
        match searched.iter().find(|candidate| self.root.join(candidate).is_file()) {
            Some(found) => Ok(found.clone()),
            None => Err(ViewError::NotFound {
                view: name.to_string(),
                searched,
            }),
        }
    }

    pub fn render(
        &self,
        name: &str,
        module: Option<&str>,
        context: &ViewContext,
    ) -> Result<String, ViewError> {
        self.render_view(name, module, context).map(|view| view.html)
    }

    /// Render `name`, noting whether the output holds a CAPTCHA token issued
    /// during the render or the visitor's antiforgery token
    pub fn render_view(
        &self,
        name: &str,
        module: Option<&str>,
        context: &ViewContext,
    ) -> Result<RenderedView, ViewError> {
        let template = self.find_view(name, module, Some(&context.culture))?;
        tracing::debug!("Rendering view {} as {}", name, template);

        let issued = Arc::new(AtomicBool::new(false));
        let captcha_token = {
            let issued = Arc::clone(&issued);
            let tokens = Arc::clone(&self.captcha);
            Value::from_function(move || -> String {
                issued.store(true, Ordering::Relaxed);
                tokens.issue()
            })
        };
        let model = context! { captcha_token => captcha_token, ..Value::from_serialize(context) };

        let html = if self.runtime_compilation {
            let env = build_environment(&self.root, &self.localizer);
            env.get_template(&template)?.render(model)?
        } else {
            self.env.get_template(&template)?.render(model)?
        };

        let per_visitor = issued.load(Ordering::Relaxed)
            || context
                .antiforgery_token
                .as_deref()
                .is_some_and(|token| html.contains(token));
        Ok(RenderedView { html, per_visitor })
    }
}

fn build_environment(root: &Path, localizer: &Arc<Localizer>) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_auto_escape_callback(default_auto_escape_callback);
    env.set_loader(path_loader(root.to_path_buf()));

    let strings = Arc::clone(localizer);
    env.add_function("t", move |key: String, culture: Option<String>| -> String {
        let culture = culture.unwrap_or_else(|| strings.default_culture().to_string());
        strings.translate(&culture, &key)
    });

    env
}
