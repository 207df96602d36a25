//! Headless style host serving stylesheets from memory

use std::collections::{BTreeMap, HashMap};
use std::future::{ready, Future};

use super::host::{LoadFailure, StyleHost, StyleLookup};
use super::reader::{read_custom_properties, CustomProperties};

/// Handle of a stylesheet attached to a [`MemoryStyleHost`].
#[derive(Debug, PartialEq, Eq)]
pub struct MemoryStylesheet {
    id: usize,
    url: String,
}

impl MemoryStylesheet {
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputedStyle {
    properties: BTreeMap<String, String>,
}

impl StyleLookup for ComputedStyle {
    fn property_value(&self, name: &str) -> Option<String> {
        self.properties.get(name).cloned()
    }
}

#[derive(Debug, Clone)]
enum Source {
    Css(String),
    Failing(String),
}

#[derive(Debug)]
struct Attached {
    id: usize,
    url: String,
    /// `None` until the stylesheet has loaded
    properties: Option<CustomProperties>,
}

/// Serves registered CSS by URL. Loaded stylesheets apply in attachment
/// order: `:root` declarations reach every element, class declarations
/// reach the probe element when it carries that class.
#[derive(Debug, Default)]
pub struct MemoryStyleHost {
    sources: HashMap<String, Source>,
    attached: Vec<Attached>,
    next_id: usize,
}

impl MemoryStyleHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stylesheet(mut self, url: impl Into<String>, css: impl Into<String>) -> Self {
        self.add_stylesheet(url, css);
        self
    }

    pub fn add_stylesheet(&mut self, url: impl Into<String>, css: impl Into<String>) {
        self.sources.insert(url.into(), Source::Css(css.into()));
    }

    /// Makes every load of `url` fail with `message`.
    pub fn fail_stylesheet(&mut self, url: impl Into<String>, message: impl Into<String>) {
        self.sources.insert(url.into(), Source::Failing(message.into()));
    }

    /// URLs of attached stylesheets in document order.
    pub fn attached_urls(&self) -> Vec<&str> {
        self.attached.iter().map(|sheet| sheet.url.as_str()).collect()
    }

    fn load(&mut self, stylesheet: &MemoryStylesheet) -> Result<(), LoadFailure> {
        let properties = match self.sources.get(&stylesheet.url) {
            Some(Source::Css(css)) => read_custom_properties(css, &stylesheet.url)
                .map_err(|err| LoadFailure::new(err.to_string()))?,
            Some(Source::Failing(message)) => return Err(LoadFailure::new(message.clone())),
            None => return Err(LoadFailure::new(format!("'{}' not found", stylesheet.url))),
        };

        match self.attached.iter_mut().find(|sheet| sheet.id == stylesheet.id) {
            Some(attached) => {
                attached.properties = Some(properties);
                Ok(())
            }
            None => Err(LoadFailure::new("stylesheet is not attached")),
        }
    }

    fn cascade(&self, class_name: Option<&str>) -> ComputedStyle {
        let mut style = ComputedStyle::default();
        let loaded = self.attached.iter().filter_map(|sheet| sheet.properties.as_ref());
        for properties in loaded.clone() {
            style.properties.extend(properties.root.clone());
        }
        if let Some(class_name) = class_name {
            for properties in loaded {
                if let Some(declared) = properties.classes.get(class_name) {
                    style.properties.extend(declared.clone());
                }
            }
        }
        style
    }
}

impl StyleHost for MemoryStyleHost {
    type Stylesheet = MemoryStylesheet;
    type Style = ComputedStyle;

    fn insert_stylesheet(&mut self, url: &str) -> MemoryStylesheet {
        let id = self.next_id;
        self.next_id += 1;
        self.attached.push(Attached {
            id,
            url: url.to_string(),
            properties: None,
        });
        MemoryStylesheet {
            id,
            url: url.to_string(),
        }
    }

    fn wait_for_load(
        &mut self,
        stylesheet: &MemoryStylesheet,
    ) -> impl Future<Output = Result<(), LoadFailure>> {
        ready(self.load(stylesheet))
    }

    fn remove_stylesheet(&mut self, stylesheet: MemoryStylesheet) {
        self.attached.retain(|sheet| sheet.id != stylesheet.id);
    }

    fn root_style(&self) -> ComputedStyle {
        self.cascade(None)
    }

    fn probe_style(&self, class_name: &str) -> ComputedStyle {
        self.cascade(Some(class_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THEME: &str = r":root {
  --makeup-gap: 4px;
  --makeup-button\.context: dark;
}

.makeup\/context\/dark {
  --makeup-gap: 8px;
}
";

    #[test]
    fn test_cascade() {
        let mut host = MemoryStyleHost::new().with_stylesheet("light.css", THEME);
        let sheet = host.insert_stylesheet("light.css");
        assert_eq!(host.root_style().property_value("--makeup-gap"), None);

        pollster::block_on(host.wait_for_load(&sheet)).unwrap();
        let root = host.root_style();
        assert_eq!(root.property_value("--makeup-gap").as_deref(), Some("4px"));
        assert_eq!(
            root.property_value("--makeup-button.context").as_deref(),
            Some("dark")
        );

        let probe = host.probe_style("makeup/context/dark");
        assert_eq!(probe.property_value("--makeup-gap").as_deref(), Some("8px"));
        assert_eq!(
            probe.property_value("--makeup-button.context").as_deref(),
            Some("dark")
        );
    }

    #[test]
    fn test_failed_loads() {
        let mut host = MemoryStyleHost::new();
        host.fail_stylesheet("broken.css", "network error");

        let broken = host.insert_stylesheet("broken.css");
        let err = pollster::block_on(host.wait_for_load(&broken)).unwrap_err();
        assert_eq!(err.message, "network error");

        let missing = host.insert_stylesheet("missing.css");
        assert!(pollster::block_on(host.wait_for_load(&missing)).is_err());

        assert_eq!(host.attached_urls(), vec!["broken.css", "missing.css"]);
        host.remove_stylesheet(broken);
        host.remove_stylesheet(missing);
        assert!(host.attached_urls().is_empty());
    }
}
