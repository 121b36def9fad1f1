//! Shared HTML helpers: selector compilation, link resolution, text cleanup.

use std::path::Path;

use scraper::{ElementRef, Selector};
use url::Url;

use ladle_shared::{LadleError, Result};

/// Compile a CSS selector, mapping syntax errors to a config error.
pub(crate) fn compile_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| LadleError::config(format!("invalid CSS selector '{selector}': {e}")))
}

/// Base URL used to resolve relative links found in content from `location`.
///
/// Plain filesystem paths become `file://` URLs so relative links keep
/// pointing next to the document.
pub(crate) fn base_url(location: &str) -> Option<Url> {
    if let Ok(url) = Url::parse(location) {
        if url.scheme().len() > 1 {
            return Some(url);
        }
    }
    let path = Path::new(location);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    Url::from_file_path(absolute).ok()
}

/// Resolve `href` against `base`, dropping fragments.
///
/// Returns `None` for in-page anchors, `javascript:` and `mailto:` links.
pub(crate) fn resolve_href(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
    {
        return None;
    }

    match base {
        Some(base) => {
            let mut resolved = base.join(href).ok()?;
            resolved.set_fragment(None);
            Some(resolved.to_string())
        }
        None => Some(href.split('#').next().unwrap_or(href).to_string()),
    }
}

/// Element text with whitespace runs collapsed to single spaces.
pub(crate) fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
