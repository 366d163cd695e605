//! The startup sequencer
//!
//! [`Startup::configure_services`] fills the container in a fixed order and
//! [`Startup::configure`] assembles the request pipeline around the routes.
//! Outermost first, a request passes:
//!
//! 1. request tracing and logging
//! 2. exception handling (diagnostic page in development, custom page otherwise)
//! 3. HSTS (outside development)
//! 4. static `/js` and `/css` files
//! 5. platform defaults (web root files, compression, request culture)
//! 6. routing and authentication
//! 7. global handlers (redirects, status pages, output cache)
//! 8. MVC filters, then the endpoint

use crate::config::{AppSettings, Configuration, HostEnvironment};
use crate::di::{Container, HasContainer};
use crate::error::Result;
use crate::exception::{
    DeveloperExceptionFilter, ExceptionFilter, ExceptionInterceptor, SiteExceptionFilter,
    panic_response,
};
use crate::interceptor::{
    AuthenticationInterceptor, Interceptor, InterceptorLayer, LoggingInterceptor,
    OutputCacheInterceptor, RedirectInterceptor, SiteDefaultsInterceptor, StatusPageInterceptor,
    WebRootInterceptor,
};
use crate::module::{Module, MvcFilters, RegistrationContext, ThumbnailModule, platform_modules};
use crate::routing::{RouteEntry, RouteTable};
use crate::services::{Authenticator, Localizer, OutputCache, ThumbnailGenerator};
use crate::view::ViewEngine;
use axum::{
    Router,
    http::{HeaderValue, header},
    routing::MethodRouter,
};
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer, compression::CompressionLayer, services::ServeDir,
    set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

/// Router state: the container every handler resolves its services from
#[derive(Clone)]
pub struct SiteState {
    container: Arc<Container>,
}

impl SiteState {
    pub fn new(container: Arc<Container>) -> Self {
        Self { container }
    }
}

impl HasContainer for SiteState {
    fn get_container(&self) -> &Container {
        &self.container
    }
}

struct CustomRoute {
    name: String,
    path: String,
    method_router: MethodRouter<SiteState>,
}

pub struct Startup {
    configuration: Configuration,
    env: HostEnvironment,
    thumbnails: Option<ThumbnailModule>,
    modules: Vec<Box<dyn Module>>,
    routes: Vec<CustomRoute>,
    route_entries: Vec<RouteEntry>,
}

impl Startup {
    pub fn new(configuration: Configuration, env: HostEnvironment) -> Self {
        Self {
            configuration,
            env,
            thumbnails: None,
            modules: Vec::new(),
            routes: Vec::new(),
            route_entries: Vec::new(),
        }
    }

    /// Replace the default thumbnail generator
    pub fn with_thumbnail_generator<G: ThumbnailGenerator>(mut self, generator: G) -> Self {
        self.thumbnails = Some(ThumbnailModule::new(generator));
        self
    }

    /// Add a site module, registered after the platform modules
    pub fn with_module(mut self, module: impl Module + 'static) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    /// Add a route matched ahead of the platform routes
    pub fn with_route(
        mut self,
        name: impl Into<String>,
        path: impl Into<String>,
        method_router: MethodRouter<SiteState>,
    ) -> Self {
        self.routes.push(CustomRoute {
            name: name.into(),
            path: path.into(),
            method_router,
        });
        self
    }

    pub fn env(&self) -> &HostEnvironment {
        &self.env
    }

    /// Routes registered by the last call to [`configure`](Self::configure)
    pub fn route_entries(&self) -> &[RouteEntry] {
        &self.route_entries
    }

    /// Register options, platform defaults, data services, the thumbnail
    /// generator, output caching and MVC, then any site modules.
    pub fn configure_services(&mut self, container: &mut Container) -> Result<()> {
        let ctx = RegistrationContext {
            settings: Arc::new(self.configuration.bind()?),
            configuration: self.configuration.clone(),
            env: self.env.clone(),
        };

        let platform = platform_modules(self.thumbnails.take().unwrap_or_default());
        for module in platform.iter().chain(self.modules.iter()) {
            tracing::debug!("Registering {} services", module.name());
            module.register(container, &ctx)?;
        }
        tracing::info!("Registered {} services", container.len());
        Ok(())
    }

    /// Build the request pipeline
    pub fn configure(&mut self, container: Arc<Container>) -> Result<Router> {
        let settings = container.resolve::<AppSettings>()?;
        let views = container.resolve::<ViewEngine>()?;

        let mut table = RouteTable::new();
        for route in std::mem::take(&mut self.routes) {
            table = table.route(route.name, &route.path, route.method_router);
        }
        let table = table.add_easyweb_routes(&container)?;
        self.route_entries = table.entries().to_vec();

        let mvc = container.resolve::<MvcFilters>()?;

        let mut global: Vec<Arc<dyn Interceptor>> = vec![
            Arc::new(RedirectInterceptor::new(
                &settings.site_options.redirects,
                settings.site_options.lowercase_urls,
            )),
            Arc::new(StatusPageInterceptor::new(Arc::clone(&views))),
        ];
        if let Ok(cache) = container.resolve::<OutputCache>() {
            global.push(Arc::new(OutputCacheInterceptor::new(cache)));
        }

        let mut defaults: Vec<Arc<dyn Interceptor>> = Vec::new();
        let web_root = self.env.web_root();
        if self.env.is_development() && !web_root.exists() {
            std::fs::create_dir_all(&web_root)?;
            tracing::info!("Created web root {}", web_root.display());
        }
        if web_root.is_dir() {
            defaults.push(Arc::new(WebRootInterceptor::new(web_root)));
        }
        defaults.push(Arc::new(SiteDefaultsInterceptor::new(
            container.resolve::<Localizer>()?,
        )));

        let pages = table
            .into_router()
            .layer(InterceptorLayer::new(mvc.interceptors()))
            .layer(InterceptorLayer::new(global))
            .layer(InterceptorLayer::single(AuthenticationInterceptor::new(
                container.resolve::<Authenticator>()?,
            )))
            .layer(InterceptorLayer::new(defaults))
            .layer(CompressionLayer::new())
            .with_state(SiteState::new(Arc::clone(&container)));

        let app = Router::new()
            .nest_service("/js", ServeDir::new(self.env.content_path("js")))
            .nest_service("/css", ServeDir::new(self.env.content_path("css")))
            .merge(pages);

        let filter: Arc<dyn ExceptionFilter> = if self.env.is_development() {
            Arc::new(DeveloperExceptionFilter::new())
        } else {
            let static_error = self
                .env
                .content_path(&settings.mvc_options.resources_path)
                .join("StaticError.html");
            Arc::new(SiteExceptionFilter::new(Arc::clone(&views), static_error))
        };

        tracing::info!(
            "Pipeline ready for {} in {}",
            settings.site_options.site_name,
            self.env.name()
        );
        let mut app = app
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(InterceptorLayer::single(ExceptionInterceptor::new(filter)));

        // Covers error pages as well.
        if !self.env.is_development() {
            let max_age = settings.site_options.hsts_max_age_seconds;
            let value = HeaderValue::from_str(&format!("max-age={}", max_age))
                .unwrap_or_else(|_| HeaderValue::from_static("max-age=2592000"));
            app = app.layer(SetResponseHeaderLayer::if_not_present(
                header::STRICT_TRANSPORT_SECURITY,
                value,
            ));
        }

        Ok(app
            .layer(InterceptorLayer::single(LoggingInterceptor))
            .layer(TraceLayer::new_for_http()))
    }

    /// Register services and build the pipeline in one go
    pub fn build(mut self) -> Result<Router> {
        let mut container = Container::new();
        self.configure_services(&mut container)?;
        self.configure(Arc::new(container))
    }
}
