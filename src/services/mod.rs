//! Default platform services registered by the startup sequencer.
//!
//! Every capability the controller and filters consume is a trait here, with
//! a default implementation a site can replace through the container.

pub mod antiforgery;
pub mod auth;
pub mod captcha;
pub mod form;
pub mod localization;
pub mod output_cache;
pub mod thumbnail;

pub use antiforgery::Antiforgery;
pub use auth::{Authenticator, Principal, Role};
pub use captcha::{CaptchaRejection, CaptchaStore, CaptchaValidator, TokenCaptchaValidator};
pub use form::{
    DefaultFormService, FormCollection, FormPostResult, FormService, FormSubmission,
    FormSubmissionStore,
};
pub use localization::{Localizer, RequestCulture};
pub use output_cache::{CachedResponse, OutputCache};
pub use thumbnail::{PassthroughThumbnailGenerator, Thumbnail, ThumbnailGenerator, ThumbnailRequest};
