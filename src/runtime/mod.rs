//! Runtime theme resolver
//!
//! [`ThemeResolver`] owns the active theme stylesheet and answers lookups of
//! config keys against the computed custom properties of that stylesheet.
//! It has two states: it starts out [`Readiness::NotReady`] and becomes
//! [`Readiness::Ready`] once a theme stylesheet has loaded. While not ready,
//! every lookup is indeterminate (`Ok(None)`).
//!
//! Computed styles are cached per context and the cache is cleared whenever
//! a theme swap begins. Subscribers are told about a swap only after the new
//! stylesheet is active, so lookups made from a notification always see the
//! new theme.

pub mod events;
pub mod host;
pub mod memory;
pub mod reader;

use std::cell::RefCell;
use std::collections::HashMap;

use crate::config_key::context_class_name;
use crate::error::RuntimeError;
use crate::CompilerOptions;

pub use events::{Listeners, SubscriptionId};
pub use host::{LoadFailure, StyleHost, StyleLookup};
pub use memory::{ComputedStyle, MemoryStyleHost, MemoryStylesheet};
pub use reader::{read_custom_properties, read_theme_stylesheet, CustomProperties, ThemeTables};

/// Prefixes shared between compiled CSS and the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    pub custom_property_prefix: String,
    pub context_class_name_prefix: String,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self::from(&CompilerOptions::default())
    }
}

impl From<&CompilerOptions> for ResolverOptions {
    fn from(options: &CompilerOptions) -> Self {
        Self {
            custom_property_prefix: options.custom_property_prefix.clone(),
            context_class_name_prefix: options.context_class_name_prefix.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    pub name: String,
    pub stylesheet_url: String,
}

impl Theme {
    pub fn new(name: impl Into<String>, stylesheet_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stylesheet_url: stylesheet_url.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    NotReady,
    Ready,
}

/// Payload of the theme change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeChange {
    pub theme: String,
    pub previous: Option<String>,
}

struct ActiveTheme<S> {
    name: String,
    stylesheet: S,
}

/// Mutable state of a resolver. Only [`ThemeResolver::set_theme`] changes
/// the active stylesheet and readiness; lookups only fill the cache.
pub struct ResolverState<H: StyleHost> {
    active: Option<ActiveTheme<H::Stylesheet>>,
    /// Computed styles keyed by context, `None` being the document root
    cache: RefCell<HashMap<Option<String>, H::Style>>,
    readiness: Readiness,
}

impl<H: StyleHost> ResolverState<H> {
    fn new() -> Self {
        Self {
            active: None,
            cache: RefCell::new(HashMap::new()),
            readiness: Readiness::NotReady,
        }
    }
}

/// A stylesheet inserted by [`ThemeResolver::set_theme`] that has not been
/// committed yet. Dropping it detaches the stylesheet and restores the
/// readiness the resolver had before the swap began.
struct PendingStylesheet<'a, H: StyleHost> {
    host: &'a mut H,
    readiness: &'a mut Readiness,
    fallback: Readiness,
    stylesheet: Option<H::Stylesheet>,
}

impl<'a, H: StyleHost> PendingStylesheet<'a, H> {
    async fn load(&mut self) -> Result<(), LoadFailure> {
        match &self.stylesheet {
            Some(stylesheet) => self.host.wait_for_load(stylesheet).await,
            None => Err(LoadFailure::new("stylesheet was released before loading")),
        }
    }

    fn commit(mut self) -> Result<H::Stylesheet, LoadFailure> {
        self.stylesheet
            .take()
            .ok_or_else(|| LoadFailure::new("stylesheet was released before loading"))
    }
}

impl<'a, H: StyleHost> Drop for PendingStylesheet<'a, H> {
    fn drop(&mut self) {
        if let Some(stylesheet) = self.stylesheet.take() {
            self.host.remove_stylesheet(stylesheet);
            *self.readiness = self.fallback;
        }
    }
}

pub struct ThemeResolver<H: StyleHost> {
    host: H,
    options: ResolverOptions,
    themes: Vec<Theme>,
    state: ResolverState<H>,
    listeners: Listeners<ThemeChange>,
}

impl<H: StyleHost> ThemeResolver<H> {
    pub fn new(host: H, themes: Vec<Theme>, options: ResolverOptions) -> Self {
        Self {
            host,
            options,
            themes,
            state: ResolverState::new(),
            listeners: Listeners::new(),
        }
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn themes(&self) -> &[Theme] {
        &self.themes
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn readiness(&self) -> Readiness {
        self.state.readiness
    }

    pub fn is_ready(&self) -> bool {
        self.state.readiness == Readiness::Ready
    }

    /// Name of the theme whose stylesheet is active.
    pub fn current_theme(&self) -> Option<&str> {
        self.state.active.as_ref().map(|active| active.name.as_str())
    }

    /// Swaps the active theme.
    ///
    /// The previous stylesheet is removed only after the new one has loaded.
    /// If loading fails, the new stylesheet is removed again and the previous
    /// theme stays active; the resolver is ready again if there was one.
    ///
    /// Calls are serialized by the exclusive borrow, so of two calls made in
    /// sequence the last one wins. Dropping the returned future before it
    /// completes is treated like a failed load.
    pub async fn set_theme(&mut self, name: &str) -> Result<(), RuntimeError> {
        let theme = self
            .themes
            .iter()
            .find(|theme| theme.name == name)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownTheme {
                name: name.to_string(),
                known: self.themes.iter().map(|theme| theme.name.clone()).collect(),
            })?;

        log::debug!("Switching to theme '{}' ({})", theme.name, theme.stylesheet_url);
        let fallback = if self.state.active.is_some() {
            Readiness::Ready
        } else {
            Readiness::NotReady
        };
        self.state.readiness = Readiness::NotReady;
        self.state.cache.borrow_mut().clear();

        let stylesheet = self.host.insert_stylesheet(&theme.stylesheet_url);
        let mut pending = PendingStylesheet {
            host: &mut self.host,
            readiness: &mut self.state.readiness,
            fallback,
            stylesheet: Some(stylesheet),
        };
        let loaded = pending.load().await;
        let committed = match loaded {
            Ok(()) => pending.commit(),
            Err(failure) => {
                drop(pending);
                Err(failure)
            }
        };

        let stylesheet = match committed {
            Ok(stylesheet) => stylesheet,
            Err(failure) => {
                log::warn!(
                    "Failed to load theme '{}', keeping '{}': {}",
                    theme.name,
                    self.current_theme().unwrap_or("none"),
                    failure
                );
                return Err(RuntimeError::StylesheetLoad {
                    theme: theme.name,
                    url: theme.stylesheet_url,
                    message: failure.message,
                });
            }
        };

        let previous = self.state.active.replace(ActiveTheme {
            name: theme.name.clone(),
            stylesheet,
        });
        let previous = previous.map(|previous| {
            self.host.remove_stylesheet(previous.stylesheet);
            previous.name
        });
        self.state.cache.borrow_mut().clear();
        self.state.readiness = Readiness::Ready;
        log::debug!("Theme '{}' is ready", theme.name);

        self.listeners.emit(&ThemeChange {
            theme: theme.name,
            previous,
        });
        Ok(())
    }

    /// Raw value of `key` on the root, or on the marker class of `context`.
    pub fn resolve_property(&self, key: &str, context: Option<&str>) -> Result<Option<String>, RuntimeError> {
        if !self.is_ready() {
            return Ok(None);
        }

        let name = format!("--{}{}", self.options.custom_property_prefix, key);
        let mut cache = self.state.cache.borrow_mut();
        let style = cache.entry(context.map(str::to_string)).or_insert_with(|| match context {
            Some(context) => self
                .host
                .probe_style(&context_class_name(&self.options.context_class_name_prefix, context)),
            None => self.host.root_style(),
        });

        match style.property_value(&name).map(|value| value.trim().to_string()) {
            Some(value) if !value.is_empty() => Ok(Some(value)),
            _ => Err(RuntimeError::Unresolvable {
                key: key.to_string(),
                context: context.map(str::to_string),
            }),
        }
    }

    /// Resolves a context key to the marker class name of the context it
    /// names, e.g. `button.context` -> `makeup/context/dark`.
    pub fn resolve_context(&self, key: &str) -> Result<Option<String>, RuntimeError> {
        self.resolve_context_in(key, None)
    }

    pub fn resolve_context_in(&self, key: &str, context: Option<&str>) -> Result<Option<String>, RuntimeError> {
        Ok(self
            .resolve_property(key, context)?
            .map(|value| context_class_name(&self.options.context_class_name_prefix, &value)))
    }

    /// Rewrites a space separated class list, resolving every class that
    /// carries the context class name prefix. Other classes pass through.
    pub fn class_names(&self, classes: &str) -> Result<Option<String>, RuntimeError> {
        let prefix = &self.options.context_class_name_prefix;
        if !self.has_contexts(classes) {
            return Ok(Some(classes.to_string()));
        }

        let mut resolved = Vec::new();
        for class_name in classes.split(' ') {
            match class_name.strip_prefix(prefix.as_str()) {
                Some(key) => match self.resolve_context(key)? {
                    Some(context_class) => resolved.push(context_class),
                    None => return Ok(None),
                },
                None => resolved.push(class_name.to_string()),
            }
        }
        Ok(Some(resolved.join(" ")))
    }

    /// True if `classes` needs resolving, and so changes with the theme.
    pub fn has_contexts(&self, classes: &str) -> bool {
        classes.contains(self.options.context_class_name_prefix.as_str())
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&ThemeChange) + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    const LIGHT: &str = r":root {
  --makeup-button\.context: light;
  --makeup-gap: 4px;
}

.makeup\/context\/light {
  --makeup-button\.color: white;
}

.makeup\/context\/dark {
  --makeup-button\.color: black;
}
";

    const DARK: &str = r":root {
  --makeup-button\.context: dark;
  --makeup-gap: 8px;
}
";

    fn resolver() -> ThemeResolver<MemoryStyleHost> {
        let host = MemoryStyleHost::new()
            .with_stylesheet("/themes/light.css", LIGHT)
            .with_stylesheet("/themes/dark.css", DARK);
        ThemeResolver::new(
            host,
            vec![
                Theme::new("light", "/themes/light.css"),
                Theme::new("dark", "/themes/dark.css"),
            ],
            ResolverOptions::default(),
        )
    }

    #[test]
    fn test_not_ready_until_first_theme() {
        let mut resolver = resolver();
        assert_eq!(resolver.readiness(), Readiness::NotReady);
        assert_eq!(resolver.resolve_context("button.context").unwrap(), None);

        pollster::block_on(resolver.set_theme("light")).unwrap();
        assert!(resolver.is_ready());
        assert_eq!(resolver.current_theme(), Some("light"));
        assert_eq!(
            resolver.resolve_context("button.context").unwrap().as_deref(),
            Some("makeup/context/light")
        );
        assert_eq!(
            resolver.resolve_property("gap", None).unwrap().as_deref(),
            Some("4px")
        );
    }

    #[test]
    fn test_context_lookups_use_marker_classes() {
        let mut resolver = resolver();
        pollster::block_on(resolver.set_theme("light")).unwrap();

        assert_eq!(
            resolver.resolve_property("button.color", Some("dark")).unwrap().as_deref(),
            Some("black")
        );
        assert_eq!(
            resolver.resolve_property("gap", Some("dark")).unwrap().as_deref(),
            Some("4px")
        );
        assert!(matches!(
            resolver.resolve_property("button.color", None),
            Err(RuntimeError::Unresolvable { .. })
        ));
    }

    #[test]
    fn test_swap_clears_cache_and_notifies() {
        let mut resolver = resolver();
        let changes = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&changes);
        let id = resolver.subscribe(move |change| seen.borrow_mut().push(change.clone()));

        pollster::block_on(resolver.set_theme("light")).unwrap();
        assert_eq!(resolver.resolve_property("gap", None).unwrap().as_deref(), Some("4px"));

        pollster::block_on(resolver.set_theme("dark")).unwrap();
        assert_eq!(resolver.resolve_property("gap", None).unwrap().as_deref(), Some("8px"));
        assert_eq!(resolver.host().attached_urls(), vec!["/themes/dark.css"]);

        assert_eq!(
            *changes.borrow(),
            vec![
                ThemeChange {
                    theme: "light".to_string(),
                    previous: None
                },
                ThemeChange {
                    theme: "dark".to_string(),
                    previous: Some("light".to_string())
                },
            ]
        );

        assert!(resolver.unsubscribe(id));
        pollster::block_on(resolver.set_theme("light")).unwrap();
        assert_eq!(changes.borrow().len(), 2);
    }

    #[test]
    fn test_unknown_theme_lists_known_names() {
        let mut resolver = resolver();
        match pollster::block_on(resolver.set_theme("sepia")) {
            Err(RuntimeError::UnknownTheme { name, known }) => {
                assert_eq!(name, "sepia");
                assert_eq!(known, vec!["light", "dark"]);
            }
            other => panic!("Expected unknown theme, got {:?}", other),
        }
        assert_eq!(resolver.readiness(), Readiness::NotReady);
    }

    #[test]
    fn test_failed_load_keeps_previous_theme() {
        let mut resolver = resolver();
        pollster::block_on(resolver.set_theme("light")).unwrap();
        assert_eq!(resolver.resolve_property("gap", None).unwrap().as_deref(), Some("4px"));

        resolver.host_mut().fail_stylesheet("/themes/dark.css", "404");
        let err = pollster::block_on(resolver.set_theme("dark")).unwrap_err();
        assert!(matches!(err, RuntimeError::StylesheetLoad { ref theme, .. } if theme == "dark"));

        assert!(resolver.is_ready());
        assert_eq!(resolver.current_theme(), Some("light"));
        assert_eq!(resolver.host().attached_urls(), vec!["/themes/light.css"]);
        assert_eq!(resolver.resolve_property("gap", None).unwrap().as_deref(), Some("4px"));
    }

    #[test]
    fn test_failed_first_load_stays_not_ready() {
        let mut resolver = resolver();
        resolver.host_mut().fail_stylesheet("/themes/light.css", "offline");
        assert!(pollster::block_on(resolver.set_theme("light")).is_err());
        assert_eq!(resolver.readiness(), Readiness::NotReady);
        assert!(resolver.host().attached_urls().is_empty());
        assert_eq!(resolver.resolve_context("button.context").unwrap(), None);
    }

    #[test]
    fn test_class_names() {
        let mut resolver = resolver();
        let classes = "button makeup/context/button.context active";
        assert!(resolver.has_contexts(classes));
        assert_eq!(resolver.class_names(classes).unwrap(), None);
        assert_eq!(
            resolver.class_names("plain classes").unwrap().as_deref(),
            Some("plain classes")
        );

        pollster::block_on(resolver.set_theme("dark")).unwrap();
        assert_eq!(
            resolver.class_names(classes).unwrap().as_deref(),
            Some("button makeup/context/dark active")
        );
    }

    /// Host sharing its document with the test, recording which stylesheets
    /// are attached whenever a load is awaited. With `hold` set, loads never
    /// complete.
    struct SharedHost {
        document: Rc<RefCell<MemoryStyleHost>>,
        loads: Rc<RefCell<Vec<Vec<String>>>>,
        hold: bool,
    }

    struct PendingLoad {
        result: Option<Result<(), LoadFailure>>,
        hold: bool,
    }

    impl std::future::Future for PendingLoad {
        type Output = Result<(), LoadFailure>;

        fn poll(mut self: std::pin::Pin<&mut Self>, _: &mut std::task::Context<'_>) -> std::task::Poll<Self::Output> {
            if self.hold {
                return std::task::Poll::Pending;
            }
            let result = self.result.take().unwrap_or_else(|| Err(LoadFailure::new("polled twice")));
            std::task::Poll::Ready(result)
        }
    }

    impl StyleHost for SharedHost {
        type Stylesheet = MemoryStylesheet;
        type Style = ComputedStyle;

        fn insert_stylesheet(&mut self, url: &str) -> MemoryStylesheet {
            self.document.borrow_mut().insert_stylesheet(url)
        }

        fn wait_for_load(
            &mut self,
            stylesheet: &MemoryStylesheet,
        ) -> impl std::future::Future<Output = Result<(), LoadFailure>> {
            let attached = self.document.borrow().attached_urls().into_iter().map(String::from).collect();
            self.loads.borrow_mut().push(attached);
            let result = pollster::block_on(self.document.borrow_mut().wait_for_load(stylesheet));
            PendingLoad {
                result: Some(result),
                hold: self.hold,
            }
        }

        fn remove_stylesheet(&mut self, stylesheet: MemoryStylesheet) {
            self.document.borrow_mut().remove_stylesheet(stylesheet);
        }

        fn root_style(&self) -> ComputedStyle {
            self.document.borrow().root_style()
        }

        fn probe_style(&self, class_name: &str) -> ComputedStyle {
            self.document.borrow().probe_style(class_name)
        }
    }

    type Loads = Rc<RefCell<Vec<Vec<String>>>>;

    fn shared_resolver() -> (ThemeResolver<SharedHost>, Rc<RefCell<MemoryStyleHost>>, Loads) {
        let document = Rc::new(RefCell::new(
            MemoryStyleHost::new()
                .with_stylesheet("/themes/light.css", LIGHT)
                .with_stylesheet("/themes/dark.css", DARK),
        ));
        let loads = Rc::new(RefCell::new(Vec::new()));
        let host = SharedHost {
            document: Rc::clone(&document),
            loads: Rc::clone(&loads),
            hold: false,
        };
        let resolver = ThemeResolver::new(
            host,
            vec![
                Theme::new("light", "/themes/light.css"),
                Theme::new("dark", "/themes/dark.css"),
            ],
            ResolverOptions::default(),
        );
        (resolver, document, loads)
    }

    #[test]
    fn test_previous_stylesheet_stays_attached_while_loading() {
        let (mut resolver, document, loads) = shared_resolver();
        pollster::block_on(resolver.set_theme("light")).unwrap();
        pollster::block_on(resolver.set_theme("dark")).unwrap();

        assert_eq!(
            *loads.borrow(),
            vec![
                vec!["/themes/light.css".to_string()],
                vec!["/themes/light.css".to_string(), "/themes/dark.css".to_string()],
            ]
        );
        assert_eq!(document.borrow().attached_urls(), vec!["/themes/dark.css"]);
    }

    #[test]
    fn test_listeners_see_the_new_theme_active() {
        let (mut resolver, document, _) = shared_resolver();
        pollster::block_on(resolver.set_theme("light")).unwrap();

        let observed = Rc::new(RefCell::new(Vec::new()));
        let record = Rc::clone(&observed);
        let observed_document = Rc::clone(&document);
        resolver.subscribe(move |change: &ThemeChange| {
            let document = observed_document.borrow();
            let attached: Vec<String> = document.attached_urls().into_iter().map(String::from).collect();
            let gap = document.root_style().property_value("--makeup-gap");
            record.borrow_mut().push((change.theme.clone(), gap, attached));
        });

        pollster::block_on(resolver.set_theme("dark")).unwrap();
        assert_eq!(
            *observed.borrow(),
            vec![(
                "dark".to_string(),
                Some("8px".to_string()),
                vec!["/themes/dark.css".to_string()]
            )]
        );
        assert!(resolver.is_ready());
        assert_eq!(resolver.resolve_property("gap", None).unwrap().as_deref(), Some("8px"));
    }

    struct NoopWake;

    impl std::task::Wake for NoopWake {
        fn wake(self: std::sync::Arc<Self>) {}
    }

    #[test]
    fn test_abandoned_swap_detaches_new_stylesheet() {
        use std::future::Future;

        let (mut resolver, document, _) = shared_resolver();
        pollster::block_on(resolver.set_theme("light")).unwrap();
        resolver.host_mut().hold = true;

        let waker = std::task::Waker::from(std::sync::Arc::new(NoopWake));
        let mut cx = std::task::Context::from_waker(&waker);
        let mut swap = Box::pin(resolver.set_theme("dark"));
        assert!(swap.as_mut().poll(&mut cx).is_pending());
        assert_eq!(
            document.borrow().attached_urls(),
            vec!["/themes/light.css", "/themes/dark.css"]
        );
        drop(swap);

        assert_eq!(document.borrow().attached_urls(), vec!["/themes/light.css"]);
        assert!(resolver.is_ready());
        assert_eq!(resolver.current_theme(), Some("light"));
        assert_eq!(resolver.resolve_property("gap", None).unwrap().as_deref(), Some("4px"));

        resolver.host_mut().hold = false;
        pollster::block_on(resolver.set_theme("dark")).unwrap();
        assert_eq!(document.borrow().attached_urls(), vec!["/themes/dark.css"]);
    }

    #[test]
    fn test_abandoned_first_swap_stays_not_ready() {
        use std::future::Future;

        let (mut resolver, document, _) = shared_resolver();
        resolver.host_mut().hold = true;

        let waker = std::task::Waker::from(std::sync::Arc::new(NoopWake));
        let mut cx = std::task::Context::from_waker(&waker);
        let mut swap = Box::pin(resolver.set_theme("light"));
        assert!(swap.as_mut().poll(&mut cx).is_pending());
        drop(swap);

        assert!(document.borrow().attached_urls().is_empty());
        assert_eq!(resolver.readiness(), Readiness::NotReady);
        assert_eq!(resolver.current_theme(), None);
    }
}
