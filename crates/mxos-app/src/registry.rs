//! Static name → constructor registry.
//!
//! Built once at startup. The kernel resolves an application kind to its
//! manifest and constructor here; a process worker rebuilds the same
//! registry and constructs its application from the kind name it was given
//! on the command line.

use crate::{App, AppContext, AppError, Manifest};
use std::collections::BTreeMap;

/// Constructs a fresh application instance.
pub type AppFactory = fn(&AppContext) -> Box<dyn App>;

/// A resolved application kind: what the sandbox needs to run it.
#[derive(Debug, Clone)]
pub struct AppImpl {
    /// Registry key, also passed to process workers.
    pub kind: String,
    pub factory: AppFactory,
}

impl AppImpl {
    #[must_use]
    pub fn new(kind: impl Into<String>, factory: AppFactory) -> Self {
        Self {
            kind: kind.into(),
            factory,
        }
    }

    /// Builds an instance.
    #[must_use]
    pub fn create(&self, ctx: &AppContext) -> Box<dyn App> {
        (self.factory)(ctx)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    manifest: Manifest,
    factory: AppFactory,
}

/// Registry of known application kinds.
///
/// # Example
///
/// ```
/// use mxos_app::{App, AppContext, AppError, AppRegistry, Manifest};
/// use mxos_types::Frame;
///
/// struct Blank(Manifest);
///
/// impl App for Blank {
///     fn manifest(&self) -> &Manifest { &self.0 }
///     fn update(&mut self) -> Result<(), AppError> { Ok(()) }
///     fn render(&mut self, _: &mut Frame) -> Result<(), AppError> { Ok(()) }
/// }
///
/// fn blank(_: &AppContext) -> Box<dyn App> {
///     Box::new(Blank(Manifest::new("blank")))
/// }
///
/// let mut registry = AppRegistry::new();
/// registry.register("blank", Manifest::new("blank"), blank).unwrap();
/// assert!(registry.contains("blank"));
/// assert!(registry.register("blank", Manifest::new("blank"), blank).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct AppRegistry {
    entries: BTreeMap<String, Entry>,
}

impl AppRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an application kind.
    ///
    /// # Errors
    ///
    /// - [`AppError::InvalidManifest`] if the manifest fails validation
    /// - [`AppError::DuplicateApp`] if the kind is already present
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        manifest: Manifest,
        factory: AppFactory,
    ) -> Result<(), AppError> {
        let kind = kind.into();
        manifest.validate()?;
        if self.entries.contains_key(&kind) {
            return Err(AppError::DuplicateApp(kind));
        }
        self.entries.insert(kind, Entry { manifest, factory });
        Ok(())
    }

    /// Resolves a kind to its manifest and implementation.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::UnknownApp`] for unregistered kinds.
    pub fn resolve(&self, kind: &str) -> Result<(AppImpl, Manifest), AppError> {
        let entry = self
            .entries
            .get(kind)
            .ok_or_else(|| AppError::UnknownApp(kind.to_string()))?;
        Ok((AppImpl::new(kind, entry.factory), entry.manifest.clone()))
    }

    /// Builds an instance of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::UnknownApp`] for unregistered kinds.
    pub fn create(&self, kind: &str, ctx: &AppContext) -> Result<Box<dyn App>, AppError> {
        let (app, _) = self.resolve(kind)?;
        Ok(app.create(ctx))
    }

    #[must_use]
    pub fn manifest(&self, kind: &str) -> Option<&Manifest> {
        self.entries.get(kind).map(|e| &e.manifest)
    }

    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.entries.contains_key(kind)
    }

    /// Registered kinds in sorted order.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Capability;
    use mxos_types::{Dimensions, Frame, RegistrationId};

    struct Counter {
        manifest: Manifest,
    }

    impl App for Counter {
        fn manifest(&self) -> &Manifest {
            &self.manifest
        }

        fn update(&mut self) -> Result<(), AppError> {
            Ok(())
        }

        fn render(&mut self, _canvas: &mut Frame) -> Result<(), AppError> {
            Ok(())
        }
    }

    fn counter_manifest() -> Manifest {
        Manifest::new("counter").with_capabilities(Capability::SYSTEM_INFO)
    }

    fn counter(_ctx: &AppContext) -> Box<dyn App> {
        Box::new(Counter {
            manifest: counter_manifest(),
        })
    }

    fn ctx() -> AppContext {
        AppContext::new(Dimensions::new(16, 8), RegistrationId::new(1))
    }

    #[test]
    fn resolve_returns_manifest_and_factory() {
        let mut registry = AppRegistry::new();
        registry
            .register("counter", counter_manifest(), counter)
            .expect("register counter");

        let (app, manifest) = registry.resolve("counter").expect("resolve counter");
        assert_eq!(app.kind, "counter");
        assert_eq!(manifest.capabilities, Capability::SYSTEM_INFO);
        assert_eq!(app.create(&ctx()).manifest().name, "counter");
    }

    #[test]
    fn factory_sees_context() {
        fn probe(ctx: &AppContext) -> Box<dyn App> {
            assert_eq!(ctx.dimensions.width, 16);
            counter(ctx)
        }
        let mut registry = AppRegistry::new();
        registry
            .register("probe", counter_manifest(), probe)
            .expect("register probe");
        assert!(registry.create("probe", &ctx()).is_ok());
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let registry = AppRegistry::new();
        assert_eq!(
            registry.resolve("nope").map(|_| ()),
            Err(AppError::UnknownApp("nope".into()))
        );
        assert!(registry.create("nope", &ctx()).is_err());
    }

    #[test]
    fn invalid_manifest_is_refused() {
        let mut registry = AppRegistry::new();
        let err = registry
            .register("bad", Manifest::new("bad").with_frame_rate(0), counter)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidManifest(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn kinds_are_sorted() {
        let mut registry = AppRegistry::new();
        for kind in ["zeta", "alpha", "mid"] {
            registry
                .register(kind, counter_manifest(), counter)
                .expect("register");
        }
        assert_eq!(registry.kinds().collect::<Vec<_>>(), vec!["alpha", "mid", "zeta"]);
        assert_eq!(registry.len(), 3);
    }
}
