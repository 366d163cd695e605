/// Shared folders searched after the module and culture specific ones
pub const SHARED_FOLDERS: [&str; 3] = ["_Layout", "_Default", "_Templates"];

pub const VIEW_EXTENSION: &str = "html";

/// Candidate template paths for a view, most specific first
///
/// For `Index` in module `News` with culture `sv-SE`:
/// `News/sv-SE/Index.html`, `News/Index.html`, `sv-SE/Index.html`,
/// `Index.html`, `_Layout/Index.html`, `_Default/Index.html`,
/// `_Templates/Index.html`.
pub fn expand(name: &str, module: Option<&str>, culture: Option<&str>) -> Vec<String> {
    let file = format!("{}.{}", name, VIEW_EXTENSION);
    let mut locations = Vec::with_capacity(7);

    if let Some(module) = module {
        if let Some(culture) = culture {
            locations.push(format!("{}/{}/{}", module, culture, file));
        }
        locations.push(format!("{}/{}", module, file));
    }
    if let Some(culture) = culture {
        locations.push(format!("{}/{}", culture, file));
    }
    locations.push(file.clone());
    for folder in SHARED_FOLDERS {
        locations.push(format!("{}/{}", folder, file));
    }
    locations
}
