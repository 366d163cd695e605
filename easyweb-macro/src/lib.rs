use proc_macro::TokenStream;

mod injectable;

/// Derive macro for making a struct injectable from the DI container
///
/// Fields of type `Arc<T>` are resolved with `Container::resolve`, fields of
/// type `Arc<dyn Trait>` with `Container::resolve_trait`. Wrapping either in
/// `Option` makes the dependency optional.
///
/// # Example
/// ```ignore
/// use easyweb::prelude::*;
///
/// #[derive(Injectable)]
/// pub struct EasywebController {
///     views: Arc<ViewEngine>,
///     content: Arc<dyn ContentStore>,
///     output_cache: Option<Arc<OutputCache>>,
/// }
/// ```
#[proc_macro_derive(Injectable)]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    injectable::derive_injectable(input)
}
