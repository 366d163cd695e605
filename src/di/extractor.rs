use crate::di::Container;
use axum::{
    extract::FromRequestParts,
    http::{StatusCode as HttpStatusCode, request::Parts},
};
use std::sync::Arc;

/// Axum extractor for dependency injection
///
/// Resolves a concrete service registered in the container, the way an action
/// parameter marked as coming from services would.
///
/// # Example
/// ```ignore
/// async fn submissions(Inject(store): Inject<FormSubmissionStore>) -> String {
///     store.len().to_string()
/// }
/// ```
pub struct Inject<T>(pub Arc<T>);

/// Axum extractor resolving a trait binding, e.g. `InjectTrait<dyn FormService>`
pub struct InjectTrait<T: ?Sized>(pub Arc<T>);

/// Trait that the router state implements to provide the DI container
pub trait HasContainer {
    fn get_container(&self) -> &Container;
}

impl<S, T> FromRequestParts<S> for Inject<T>
where
    S: Send + Sync + HasContainer,
    T: 'static + Send + Sync,
{
    type Rejection = (HttpStatusCode, String);

    async fn from_request_parts(_parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let container = state.get_container();

        container.resolve::<T>().map(Inject).map_err(|e| {
            (
                HttpStatusCode::INTERNAL_SERVER_ERROR,
                format!("Dependency injection failed: {}", e),
            )
        })
    }
}

impl<S, T> FromRequestParts<S> for InjectTrait<T>
where
    S: Send + Sync + HasContainer,
    T: ?Sized + 'static + Send + Sync,
{
    type Rejection = (HttpStatusCode, String);

    async fn from_request_parts(_parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let container = state.get_container();

        container.resolve_trait::<T>().map(InjectTrait).map_err(|e| {
            (
                HttpStatusCode::INTERNAL_SERVER_ERROR,
                format!("Dependency injection failed: {}", e),
            )
        })
    }
}

impl<T> std::ops::Deref for Inject<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: ?Sized> std::ops::Deref for InjectTrait<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> Clone for Inject<T> {
    fn clone(&self) -> Self {
        Inject(Arc::clone(&self.0))
    }
}

impl<T: ?Sized> Clone for InjectTrait<T> {
    fn clone(&self) -> Self {
        InjectTrait(Arc::clone(&self.0))
    }
}
