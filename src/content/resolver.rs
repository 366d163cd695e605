use super::{ContentStore, Linkable, normalize_path};
use crate::config::ModuleRoute;
use std::sync::Arc;

/// Maps request paths to linkable pages
///
/// Pages below a module's route template are attributed to that module so the
/// module's own views are found first.
pub struct LinkableResolver {
    content: Arc<dyn ContentStore>,
    modules: Vec<ModuleRoute>,
}

impl LinkableResolver {
    pub fn new(content: Arc<dyn ContentStore>, modules: Vec<ModuleRoute>) -> Self {
        Self { content, modules }
    }

    pub async fn resolve(&self, path: &str) -> Option<Linkable> {
        let path = normalize_path(path);
        let mut page = self.content.find_by_path(&path).await?;
        if page.module.is_none() {
            page.module = self.module_for(&path).map(|m| m.name.clone());
        }
        Some(page)
    }

    /// The module whose route template `path` falls under
    pub fn module_for(&self, path: &str) -> Option<&ModuleRoute> {
        let path = normalize_path(path);
        self.modules.iter().find(|module| {
            let route = normalize_path(&module.route);
            route != "/"
                && (path == route
                    || path
                        .strip_prefix(&route)
                        .is_some_and(|rest| rest.starts_with('/')))
        })
    }

    pub fn content(&self) -> &Arc<dyn ContentStore> {
        &self.content
    }
}
