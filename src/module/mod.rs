//! Service registration units run by the startup sequencer.
//!
//! Each [`Module`] adds one group of services to the container. Registering a
//! service or trait binding again replaces the earlier one, so a later module
//! can swap out a platform default.

use crate::config::{AppSettings, Configuration, HostEnvironment};
use crate::content::{ContentStore, JsonContentStore, LinkableResolver};
use crate::controller::EasywebController;
use crate::di::{Container, Injectable};
use crate::error::Result;
use crate::interceptor::{Interceptor, PostNotificationInterceptor};
use crate::services::{
    Antiforgery, Authenticator, CaptchaStore, CaptchaValidator, DefaultFormService, FormService,
    FormSubmissionStore, Localizer, OutputCache, PassthroughThumbnailGenerator, ThumbnailGenerator,
    TokenCaptchaValidator,
};
use crate::view::ViewEngine;
use std::sync::Arc;
use std::time::Duration;

/// What every module may read while registering
pub struct RegistrationContext {
    pub settings: Arc<AppSettings>,
    pub configuration: Configuration,
    pub env: HostEnvironment,
}

/// A group of services registered together
pub trait Module: Send + Sync {
    fn name(&self) -> &'static str;

    /// Register this module's services
    fn register(&self, container: &mut Container, ctx: &RegistrationContext) -> Result<()>;
}

/// Options bound from configuration, plus the host environment
pub struct OptionsModule;

impl Module for OptionsModule {
    fn name(&self) -> &'static str {
        "options"
    }

    fn register(&self, container: &mut Container, ctx: &RegistrationContext) -> Result<()> {
        let settings = &ctx.settings;
        container
            .register_arc(Arc::clone(settings))
            .register(settings.hosting.clone())
            .register(settings.site_options.clone())
            .register(settings.data_options.clone())
            .register(settings.security_options.clone())
            .register(settings.form_options.clone())
            .register(settings.mvc_options.clone())
            .register(ctx.configuration.clone())
            .register(ctx.env.clone());
        Ok(())
    }
}

/// Platform defaults: localization, login, antiforgery, CAPTCHA and form handling
pub struct DefaultsModule;

impl Module for DefaultsModule {
    fn name(&self) -> &'static str {
        "defaults"
    }

    fn register(&self, container: &mut Container, ctx: &RegistrationContext) -> Result<()> {
        let settings = &ctx.settings;

        let resources = ctx.env.content_path(&settings.mvc_options.resources_path);
        let localizer = Localizer::load(&resources, &settings.site_options.cultures)?;
        container.register(localizer);

        let captcha = Arc::new(CaptchaStore::new(&settings.form_options));
        container.register_arc(Arc::clone(&captcha));
        container.register_as::<dyn CaptchaValidator, _, _>(
            TokenCaptchaValidator::new(captcha, &settings.form_options),
            |v| v as Arc<dyn CaptchaValidator>,
        );

        container.register(Antiforgery::new());
        // Admin login is always available, member login only when enabled.
        container.register(Authenticator::new(&settings.security_options));

        let submissions = Arc::new(FormSubmissionStore::new(
            settings.form_options.max_stored_submissions,
        ));
        container.register_arc(Arc::clone(&submissions));
        container.register_as::<dyn FormService, _, _>(
            DefaultFormService::new(submissions, settings.form_options.clone()),
            |s| s as Arc<dyn FormService>,
        );
        Ok(())
    }
}

/// Content store and the resolver mapping request paths onto it
pub struct DataModule;

impl Module for DataModule {
    fn name(&self) -> &'static str {
        "data"
    }

    fn register(&self, container: &mut Container, ctx: &RegistrationContext) -> Result<()> {
        let source = ctx.env.content_path(&ctx.settings.data_options.content_path);
        container.register_as::<dyn ContentStore, _, _>(JsonContentStore::open(source)?, |s| {
            s as Arc<dyn ContentStore>
        });

        let content = container.resolve_trait::<dyn ContentStore>()?;
        container.register(LinkableResolver::new(
            content,
            ctx.settings.site_options.modules.clone(),
        ));
        Ok(())
    }
}

type BindFn = Box<dyn Fn(&mut Container) + Send + Sync>;

/// Binds the [`ThumbnailGenerator`] used by the image route
pub struct ThumbnailModule {
    bind: BindFn,
}

impl ThumbnailModule {
    pub fn new<G: ThumbnailGenerator>(generator: G) -> Self {
        let generator = Arc::new(generator);
        Self {
            bind: Box::new(move |container: &mut Container| {
                container
                    .register_arc(Arc::clone(&generator))
                    .register_trait::<dyn ThumbnailGenerator, G, _>(|g| {
                        g as Arc<dyn ThumbnailGenerator>
                    });
            }),
        }
    }
}

impl Default for ThumbnailModule {
    fn default() -> Self {
        Self::new(PassthroughThumbnailGenerator)
    }
}

impl Module for ThumbnailModule {
    fn name(&self) -> &'static str {
        "thumbnails"
    }

    fn register(&self, container: &mut Container, _ctx: &RegistrationContext) -> Result<()> {
        (self.bind)(container);
        Ok(())
    }
}

/// Whole-page output cache, when enabled
pub struct OutputCacheModule;

impl Module for OutputCacheModule {
    fn name(&self) -> &'static str {
        "output-cache"
    }

    fn register(&self, container: &mut Container, ctx: &RegistrationContext) -> Result<()> {
        let options = &ctx.settings.site_options.output_cache;
        if options.enabled {
            container.register(OutputCache::new(
                Duration::from_secs(options.duration_seconds),
                options.max_entries,
            ));
        }
        Ok(())
    }
}

/// Interceptors that run around every controller action
pub struct MvcFilters {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl MvcFilters {
    pub fn interceptors(&self) -> Vec<Arc<dyn Interceptor>> {
        self.interceptors.clone()
    }
}

/// View engine, global MVC filters and the default controller
pub struct MvcModule;

impl Module for MvcModule {
    fn name(&self) -> &'static str {
        "mvc"
    }

    fn register(&self, container: &mut Container, ctx: &RegistrationContext) -> Result<()> {
        let settings = &ctx.settings;
        let runtime_compilation =
            settings.mvc_options.runtime_compilation || ctx.env.is_development();

        let views = ViewEngine::new(
            ctx.env.content_path(&settings.mvc_options.views_path),
            settings.site_options.site_name.clone(),
            container.resolve::<Localizer>()?,
            container.resolve::<CaptchaStore>()?,
            runtime_compilation,
        );
        if runtime_compilation {
            tracing::debug!("Views are recompiled on every render");
        }
        container.register(views);

        container.register(MvcFilters {
            interceptors: vec![Arc::new(PostNotificationInterceptor)],
        });

        let controller = EasywebController::inject(container)?;
        container.register(controller);
        Ok(())
    }
}

/// The platform modules in registration order
pub fn platform_modules(thumbnails: ThumbnailModule) -> Vec<Box<dyn Module>> {
    vec![
        Box::new(OptionsModule),
        Box::new(DefaultsModule),
        Box::new(DataModule),
        Box::new(thumbnails),
        Box::new(OutputCacheModule),
        Box::new(MvcModule),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvironmentName;
    use crate::services::{Thumbnail, ThumbnailRequest};
    use async_trait::async_trait;
    use std::path::Path;

    fn context(root: &Path, env: EnvironmentName) -> RegistrationContext {
        let configuration = Configuration::default();
        RegistrationContext {
            settings: Arc::new(configuration.bind().unwrap()),
            configuration,
            env: HostEnvironment::new(env, root),
        }
    }

    fn register_all(modules: Vec<Box<dyn Module>>, ctx: &RegistrationContext) -> Container {
        let mut container = Container::new();
        for module in modules {
            module.register(&mut container, ctx).unwrap();
        }
        container
    }

    #[test]
    fn test_platform_services_are_registered() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), EnvironmentName::Production);
        let container = register_all(platform_modules(ThumbnailModule::default()), &ctx);

        assert!(container.contains::<AppSettings>());
        assert!(container.contains::<dyn FormService>());
        assert!(container.contains::<dyn CaptchaValidator>());
        assert!(container.contains::<dyn ContentStore>());
        assert!(container.contains::<dyn ThumbnailGenerator>());
        assert!(container.contains::<EasywebController>());
        assert!(!container.contains::<OutputCache>());
        assert!(!container.resolve::<ViewEngine>().unwrap().runtime_compilation());
    }

    #[test]
    fn test_development_recompiles_views() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), EnvironmentName::Development);
        let container = register_all(platform_modules(ThumbnailModule::default()), &ctx);
        assert!(container.resolve::<ViewEngine>().unwrap().runtime_compilation());
    }

    struct FixedThumbnails;

    #[async_trait]
    impl ThumbnailGenerator for FixedThumbnails {
        async fn generate(&self, _source: &Path, _request: ThumbnailRequest) -> Result<Thumbnail> {
            Ok(Thumbnail {
                bytes: b"fixed".to_vec(),
                content_type: "image/png",
            })
        }
    }

    #[tokio::test]
    async fn test_thumbnail_generator_can_be_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), EnvironmentName::Production);
        let container = register_all(platform_modules(ThumbnailModule::new(FixedThumbnails)), &ctx);

        let generator = container.resolve_trait::<dyn ThumbnailGenerator>().unwrap();
        let thumbnail = generator
            .generate(Path::new("missing.png"), ThumbnailRequest::default())
            .await
            .unwrap();
        assert_eq!(thumbnail.bytes, b"fixed");
    }
}
