use std::{
    cell::{Cell, RefCell},
    rc::Rc,
    sync::RwLock,
};

use lol_html::{RewriteStrSettings, element, html_content::ContentType, rewrite_str};
use tracing::warn;

use crate::{
    application::render::{DIAGRAM_ERROR_ATTR, DIAGRAM_PROCESSED_ATTR, DIAGRAM_SOURCE_ATTR},
    util::lock::{rw_read, rw_write},
};

/// Unhydrated placeholders: diagram elements without the processed marker.
const PENDING_SELECTOR: &str = ".mermaid:not([data-processed])";

/// Placeholder discovered when a hydration pass starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPlaceholder {
    /// Raw `data-mermaid-code` value; `None` when the attribute is missing.
    pub encoded_source: Option<String>,
}

/// Mutation applied to a re-located placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderUpdate {
    pub id: Option<String>,
    pub class: String,
    pub inner_html: String,
    pub error: bool,
}

/// Live output surface the hydrator walks. Implementations must answer from
/// the current state on every call; the caller may repopulate the container
/// between calls.
pub trait DiagramContainer: Send + Sync {
    /// Snapshot of all unprocessed placeholders, in document order.
    fn pending_placeholders(&self) -> Vec<PendingPlaceholder>;

    /// Re-locate the first unprocessed placeholder whose encoded source equals
    /// `encoded_source`, apply `update` and mark it processed. Returns `false`
    /// when no such placeholder exists any more.
    fn update_placeholder(&self, encoded_source: &str, update: &PlaceholderUpdate) -> bool;
}

/// In-memory HTML document acting as a preview container.
#[derive(Debug, Default)]
pub struct HtmlContainer {
    html: RwLock<String>,
}

impl HtmlContainer {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: RwLock::new(html.into()),
        }
    }

    /// Swap in freshly rendered markup, as a caller does after each render cycle.
    pub fn replace(&self, html: impl Into<String>) {
        *rw_write(&self.html, "application::diagram::container", "replace") = html.into();
    }

    pub fn html(&self) -> String {
        rw_read(&self.html, "application::diagram::container", "html").clone()
    }
}

impl DiagramContainer for HtmlContainer {
    fn pending_placeholders(&self) -> Vec<PendingPlaceholder> {
        let html = rw_read(&self.html, "application::diagram::container", "snapshot");
        let found = Rc::new(RefCell::new(Vec::new()));

        let result = rewrite_str(
            &html,
            RewriteStrSettings {
                element_content_handlers: vec![element!(PENDING_SELECTOR, {
                    let found = Rc::clone(&found);
                    move |el| {
                        found.borrow_mut().push(PendingPlaceholder {
                            encoded_source: el.get_attribute(DIAGRAM_SOURCE_ATTR),
                        });
                        Ok(())
                    }
                })],
                ..RewriteStrSettings::default()
            },
        );

        if let Err(err) = result {
            warn!(
                target = "application::diagram::container",
                op = "container::snapshot",
                result = "error",
                error = %err,
                "Failed to scan container for diagram placeholders"
            );
            return Vec::new();
        }

        found.take()
    }

    fn update_placeholder(&self, encoded_source: &str, update: &PlaceholderUpdate) -> bool {
        let mut html = rw_write(&self.html, "application::diagram::container", "update");
        let applied = Rc::new(Cell::new(false));

        let result = rewrite_str(
            &html,
            RewriteStrSettings {
                element_content_handlers: vec![element!(PENDING_SELECTOR, {
                    let applied = Rc::clone(&applied);
                    move |el| {
                        if applied.get()
                            || el.get_attribute(DIAGRAM_SOURCE_ATTR).as_deref()
                                != Some(encoded_source)
                        {
                            return Ok(());
                        }

                        if let Some(id) = update.id.as_deref() {
                            el.set_attribute("id", id)?;
                        }
                        el.set_attribute("class", &update.class)?;
                        el.set_inner_content(&update.inner_html, ContentType::Html);
                        el.set_attribute(DIAGRAM_PROCESSED_ATTR, "true")?;
                        if update.error {
                            el.set_attribute(DIAGRAM_ERROR_ATTR, "true")?;
                        }
                        applied.set(true);
                        Ok(())
                    }
                })],
                ..RewriteStrSettings::default()
            },
        );

        match result {
            Ok(rewritten) if applied.get() => {
                *html = rewritten;
                true
            }
            Ok(_) => false,
            Err(err) => {
                warn!(
                    target = "application::diagram::container",
                    op = "container::update",
                    result = "error",
                    error = %err,
                    "Failed to update diagram placeholder"
                );
                false
            }
        }
    }
}
