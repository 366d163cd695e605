use crate::di::Container;
use crate::error::Result;

/// Trait for types that can be built from the DI container
///
/// Usually implemented through `#[derive(Injectable)]`.
///
/// # Example
/// ```ignore
/// use easyweb::prelude::*;
///
/// #[derive(Injectable)]
/// pub struct EasywebController {
///     // Resolved through the trait binding registered by the data services
///     content: Arc<dyn ContentStore>,
/// }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Create an instance by resolving dependencies from the container
    ///
    /// # Errors
    /// Returns an error if any required dependency is not registered.
    fn inject(container: &Container) -> Result<Self>;
}
