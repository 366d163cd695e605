//! # Easyweb
//!
//! Site host for Easyweb CMS sites.
//!
//! The crate is a thin composition layer: a default controller that renders
//! CMS pages and processes form posts, and a startup sequencer that registers
//! the platform services in a dependency injection container and assembles the
//! request pipeline around them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use easyweb::{Configuration, HostEnvironment, Startup};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let env = HostEnvironment::from_env();
//!     let configuration = Configuration::load(&env)?;
//!     let app = Startup::new(configuration, env).build()?;
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Replacing platform services
//!
//! Every capability the controller consumes is resolved from the container,
//! so a site binds its own implementation in a [`Module`] registered after the
//! platform modules:
//!
//! ```rust,ignore
//! struct MailForms;
//!
//! impl Module for MailForms {
//!     fn name(&self) -> &'static str { "mail-forms" }
//!
//!     fn register(&self, container: &mut Container, _ctx: &RegistrationContext) -> Result<()> {
//!         container.register_as::<dyn FormService, _, _>(MailFormService::new(), |s| s as Arc<dyn FormService>);
//!         Ok(())
//!     }
//! }
//!
//! let app = Startup::new(configuration, env).with_module(MailForms).build()?;
//! ```

// Lets `#[derive(Injectable)]` expand to `::easyweb::…` inside this crate too.
extern crate self as easyweb;

pub mod config;
pub mod content;
pub mod controller;
pub mod di;
pub mod error;
pub mod exception;
pub mod guard;
pub mod interceptor;
pub mod lifecycle;
pub mod module;
pub mod request;
pub mod routing;
pub mod services;
pub mod startup;
pub mod view;

// Re-export core types
pub use config::{AppSettings, Configuration, EnvironmentName, HostEnvironment};
pub use controller::EasywebController;
pub use di::{Container, HasContainer, Inject, InjectTrait, Injectable};
pub use error::{Result, SiteError};
pub use module::{Module, RegistrationContext};
pub use startup::{SiteState, Startup};

// Re-export macros
pub use easyweb_macro::Injectable as DeriveInjectable;

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use axum;

/// Prelude module for convenient imports
///
/// ```
/// use easyweb::prelude::*;
/// ```
pub mod prelude {
    pub use crate::DeriveInjectable as Injectable;
    pub use crate::config::{AppSettings, Configuration, EnvironmentName, HostEnvironment};
    pub use crate::content::{ContentStore, Linkable, LinkableResolver, ResultLink};
    pub use crate::di::{Container, HasContainer, Inject, InjectTrait};
    pub use crate::error::{Result, SiteError};
    pub use crate::exception::{ErrorReport, ExceptionFilter};
    pub use crate::guard::{AntiforgeryPolicy, Guard, GuardError, GuardResult, RouteFilters};
    pub use crate::interceptor::{Interceptor, InterceptorResult, Next};
    pub use crate::lifecycle::shutdown_signal;
    pub use crate::module::{Module, RegistrationContext};
    pub use crate::services::{
        CaptchaValidator, FormCollection, FormPostResult, FormService, ThumbnailGenerator,
    };
    pub use crate::startup::{SiteState, Startup};
    pub use async_trait::async_trait;
    pub use axum::{
        Router,
        extract::{Path, Query, State},
        http::StatusCode,
        response::{IntoResponse, Response},
    };
    pub use std::sync::Arc;
}
