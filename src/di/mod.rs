mod container;
mod extractor;
mod injectable;

pub use container::Container;
pub use extractor::{HasContainer, Inject, InjectTrait};
pub use injectable::Injectable;
