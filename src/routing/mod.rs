//! Endpoint registration
//!
//! [`RouteTable`] records the routes it registers in order: custom routes,
//! home, media assets, module routes and finally the catch-all page route.
//! Matching itself is axum's; the table only fixes what gets registered.

use crate::config::{DataOptions, FormOptions, HostEnvironment, SiteOptions};
use crate::content::{LinkableResolver, normalize_path};
use crate::controller;
use crate::di::{Container, InjectTrait};
use crate::error::Result;
use crate::guard::{AntiforgeryPolicy, EnsureLinkable, RouteFilters, ValidateFormCaptcha};
use crate::services::thumbnail::media_path;
use crate::services::{Authenticator, CaptchaValidator, ThumbnailGenerator, ThumbnailRequest};
use crate::startup::SiteState;
use axum::{
    Router,
    extract::{Path, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{MethodRouter, get, post},
};
use std::path::PathBuf;
use std::sync::Arc;
use strum_macros::Display;
use tower_http::services::ServeDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RouteKind {
    Custom,
    Home,
    Asset,
    Module,
    CatchAll,
}

/// One registered route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub name: String,
    pub path: String,
    pub kind: RouteKind,
}

/// Routes in registration order
pub struct RouteTable {
    entries: Vec<RouteEntry>,
    router: Router<SiteState>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            router: Router::new(),
        }
    }

    /// Add a site specific route. These come before the platform routes.
    pub fn route(
        mut self,
        name: impl Into<String>,
        path: &str,
        method_router: MethodRouter<SiteState>,
    ) -> Self {
        self.push(name, path, RouteKind::Custom);
        self.router = self.router.route(path, method_router);
        self
    }

    /// Register home, asset, module and catch-all routes
    pub fn add_easyweb_routes(mut self, container: &Container) -> Result<Self> {
        let env = container.resolve::<HostEnvironment>()?;
        let site = container.resolve::<SiteOptions>()?;
        let data = container.resolve::<DataOptions>()?;
        let forms = container.resolve::<FormOptions>()?;

        let pages = page_routes(container, forms.max_body_bytes)?;

        self.push("home", "/", RouteKind::Home);
        self.router = self.router.route("/", pages.clone());

        let media = env.content_path(&data.media_path);
        let images = media.join("images");
        self.push("images", "/images/{*path}", RouteKind::Asset);
        self.router = self.router.route(
            "/images/{*path}",
            get(
                move |Path(path): Path<String>,
                      Query(request): Query<ThumbnailRequest>,
                      InjectTrait(generator): InjectTrait<dyn ThumbnailGenerator>| {
                    thumbnail(images.clone(), path, request, generator)
                },
            ),
        );

        self.push("documents", "/documents/{*path}", RouteKind::Asset);
        self.router = self
            .router
            .route_service("/documents/{*path}", ServeDir::new(media));

        for module in &site.modules {
            let route = normalize_path(&module.route);
            if route == "/" {
                tracing::warn!("Module {} has no route of its own, skipping", module.name);
                continue;
            }
            let rest = format!("{}/{{*path}}", route);
            self.push(module.name.clone(), &route, RouteKind::Module);
            self.push(module.name.clone(), &rest, RouteKind::Module);
            self.router = self
                .router
                .route(&route, pages.clone())
                .route(&rest, pages.clone());
        }

        self.push("page", "/{*path}", RouteKind::CatchAll);
        self.router = self.router.route("/{*path}", pages);
        Ok(self)
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn into_router(self) -> Router<SiteState> {
        self.router
    }

    fn push(&mut self, name: impl Into<String>, path: &str, kind: RouteKind) {
        let entry = RouteEntry {
            name: name.into(),
            path: path.to_string(),
            kind,
        };
        tracing::debug!("Route {} {} ({})", entry.kind, entry.path, entry.name);
        self.entries.push(entry);
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

/// `GET index` behind `[EnsureLinkable]`, `POST index_post` behind
/// `[EnsureLinkable, ValidateFormCaptcha]` without antiforgery validation
fn page_routes(container: &Container, max_body_bytes: usize) -> Result<MethodRouter<SiteState>> {
    let resolver = container.resolve::<LinkableResolver>()?;
    let authenticator = container.resolve::<Authenticator>()?;
    let captcha = container.resolve_trait::<dyn CaptchaValidator>()?;

    let linkable = || EnsureLinkable::new(Arc::clone(&resolver), Arc::clone(&authenticator));

    let get_filters = RouteFilters::new().guard(linkable());
    let post_filters = RouteFilters::new()
        .guard(linkable())
        .guard(ValidateFormCaptcha::new(captcha))
        .antiforgery(AntiforgeryPolicy::Ignore);

    Ok(get(controller::index)
        .route_layer(get_filters.into_layer(max_body_bytes))
        .merge(post(controller::index_post).route_layer(post_filters.into_layer(max_body_bytes))))
}

async fn thumbnail(
    root: PathBuf,
    path: String,
    request: ThumbnailRequest,
    generator: Arc<dyn ThumbnailGenerator>,
) -> Result<Response> {
    let Some(source) = media_path(&root, &path) else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    let thumbnail = generator.generate(&source, request).await?;
    Ok((
        [
            (header::CONTENT_TYPE, thumbnail.content_type),
            (header::CACHE_CONTROL, "public, max-age=604800"),
        ],
        thumbnail.bytes,
    )
        .into_response())
}
