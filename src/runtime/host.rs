//! Capabilities the resolver needs from its document environment

use std::future::Future;

use thiserror::Error;

/// Computed style of one element.
pub trait StyleLookup {
    /// Value of a custom property by its unescaped name, e.g.
    /// `--makeup-button.color`.
    fn property_value(&self, name: &str) -> Option<String>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct LoadFailure {
    pub message: String,
}

impl LoadFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A document that can attach stylesheets and compute styles.
///
/// Loading is split in three steps so the resolver decides when a stylesheet
/// is torn down: the previous theme stays attached until its replacement has
/// loaded, and a stylesheet that failed to load is removed again.
pub trait StyleHost {
    /// Handle of an attached stylesheet
    type Stylesheet;
    type Style: StyleLookup;

    /// Attaches a stylesheet referencing `url` and starts loading it.
    fn insert_stylesheet(&mut self, url: &str) -> Self::Stylesheet;

    /// Resolves once the stylesheet has loaded or failed to load.
    fn wait_for_load(
        &mut self,
        stylesheet: &Self::Stylesheet,
    ) -> impl Future<Output = Result<(), LoadFailure>>;

    fn remove_stylesheet(&mut self, stylesheet: Self::Stylesheet);

    /// Computed style of the document root.
    fn root_style(&self) -> Self::Style;

    /// Computed style of a detached probe element carrying `class_name`.
    fn probe_style(&self, class_name: &str) -> Self::Style;
}
