//! Request resolution
//!
//! Maps a request path to the app that owns it, the path prefix that app is
//! authoritative for, and the partition its responses live in.
//!
//! Resolution chain:
//! 1. Global resources (exact path match) → the shared global partition
//! 2. Configured app whose scope prefixes the path (longest scope wins)
//! 3. App identity from the configured path segment, or the default app
//! 4. Partition name from the deployment's naming scheme; the manifest
//!    scheme additionally requires the identity to be a registered app
//!
//! Resolution is pure: no I/O, only the scheme, the configuration table and
//! the registry snapshot the resolver was built with.

use crate::apps::{AppEntry, AppTable};
use crate::config::{Config, SchemeKind};
use crate::manifest::Registry;
use std::collections::HashSet;
use std::fmt;

/// Partition naming and staleness scheme of a deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scheme {
    /// `{app}-cache-{version}`
    Versioned { version: String },
    /// `{prefix}{short_name}`
    Manifest { prefix: String },
}

impl Scheme {
    /// Build the scheme a configuration declares
    pub fn from_config(config: &Config) -> Self {
        match config.cache.scheme {
            SchemeKind::Versioned => Self::Versioned {
                version: config.cache.version.clone(),
            },
            SchemeKind::Manifest => Self::Manifest {
                prefix: config.manifest.prefix.clone(),
            },
        }
    }

    /// Partition name for an app identity
    pub fn partition_name(&self, identity: &str) -> String {
        match self {
            Self::Versioned { version } => format!("{}-cache-{}", identity, version),
            Self::Manifest { prefix } => format!("{}{}", prefix, identity),
        }
    }

    /// Suffix every current versioned partition ends with
    pub fn version_suffix(&self) -> Option<String> {
        match self {
            Self::Versioned { version } => Some(format!("-cache-{}", version)),
            Self::Manifest { .. } => None,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Versioned { version } => write!(f, "versioned ({})", version),
            Self::Manifest { prefix } => write!(f, "manifest ({}*)", prefix),
        }
    }
}

/// Result of resolving a request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Owning application identity
    pub app: String,
    /// Path prefix the partition is authoritative for
    pub scope: String,
    /// Partition holding this app's responses
    pub partition: String,
}

impl Resolution {
    /// Whether a path falls inside this resolution's scope
    pub fn in_scope(&self, path: &str) -> bool {
        path.starts_with(&self.scope)
    }
}

/// Resolves request paths against one scheme
#[derive(Debug, Clone)]
pub struct Resolver {
    scheme: Scheme,
    default_app: String,
    app_segment: usize,
    global_identity: String,
    global_paths: HashSet<String>,
    /// (scope, app) pairs, longest scope first
    app_scopes: Vec<(String, String)>,
    registry: Registry,
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

impl Resolver {
    pub fn new(scheme: Scheme, default_app: impl Into<String>, app_segment: usize) -> Self {
        Self {
            scheme,
            default_app: default_app.into(),
            app_segment,
            global_identity: "global".to_string(),
            global_paths: HashSet::new(),
            app_scopes: Vec::new(),
            registry: Registry::default(),
        }
    }

    /// Build a resolver from configuration and a registry snapshot
    pub fn from_config(config: &Config, registry: Registry) -> Self {
        Self::new(
            Scheme::from_config(config),
            config.cache.default_app.clone(),
            config.cache.app_segment,
        )
        .with_global(
            config.cache.global_partition.clone(),
            &config.cache.global_resources,
        )
        .with_apps(AppTable::from_config(config).apps())
        .with_registry(registry)
    }

    /// Route paths under each configured app's scope to that app
    pub fn with_apps(mut self, apps: &[AppEntry]) -> Self {
        self.app_scopes = apps
            .iter()
            .map(|app| (app.scope.clone(), app.name.clone()))
            .collect();
        self.app_scopes.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));
        self
    }

    /// Route the given paths to the shared partition named by `identity`
    pub fn with_global(mut self, identity: impl Into<String>, paths: &[String]) -> Self {
        self.global_identity = identity.into();
        self.global_paths = paths.iter().map(|p| normalize_path(p)).collect();
        self
    }

    /// Replace the registry snapshot
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Name of the shared global partition
    pub fn global_partition(&self) -> String {
        self.scheme.partition_name(&self.global_identity)
    }

    /// Resolve a global resource, if `path` is one
    pub fn resolve_global(&self, path: &str) -> Option<Resolution> {
        if !self.global_paths.contains(path) {
            return None;
        }
        Some(Resolution {
            app: self.global_identity.clone(),
            scope: "/".to_string(),
            partition: self.global_partition(),
        })
    }

    /// App identity and scope prefix for a path
    ///
    /// A configured app scope takes precedence over the segment convention.
    pub fn identify(&self, path: &str) -> (String, String) {
        if let Some((scope, app)) = self
            .app_scopes
            .iter()
            .find(|(scope, _)| path.starts_with(scope.as_str()))
        {
            return (app.clone(), scope.clone());
        }

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.get(self.app_segment) {
            Some(app) => {
                let scope = format!("/{}/", segments[..=self.app_segment].join("/"));
                (app.to_string(), scope)
            }
            None => (
                self.default_app.clone(),
                format!("/{}/", self.default_app),
            ),
        }
    }

    /// Resolve the app-owned partition for a path
    ///
    /// Returns `None` only under the manifest scheme, when the identity is
    /// not a registered app.
    pub fn resolve(&self, path: &str) -> Option<Resolution> {
        let (app, scope) = self.identify(path);

        if let Scheme::Manifest { .. } = self.scheme {
            self.registry.find(&app)?;
        }

        Some(Resolution {
            partition: self.scheme.partition_name(&app),
            app,
            scope,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::manifest::{ManifestDescriptor, Registry};
    use url::Url;

    fn versioned() -> Resolver {
        Resolver::new(
            Scheme::Versioned {
                version: "v2".to_string(),
            },
            "default-app",
            0,
        )
        .with_global("global", &["/IndexedDBManager.js".to_string(), "icons/a.png".to_string()])
    }

    #[test]
    fn versioned_names() {
        let resolution = versioned().resolve("/User-Manager/index.html").unwrap();
        assert_eq!(resolution.app, "User-Manager");
        assert_eq!(resolution.scope, "/User-Manager/");
        assert_eq!(resolution.partition, "User-Manager-cache-v2");
        assert!(resolution.in_scope("/User-Manager/index.html"));
        assert!(!resolution.in_scope("/Other/index.html"));
    }

    #[test]
    fn missing_segment_uses_default_app() {
        let resolution = versioned().resolve("/").unwrap();
        assert_eq!(resolution.app, "default-app");
        assert_eq!(resolution.scope, "/default-app/");
        assert_eq!(resolution.partition, "default-app-cache-v2");
        assert!(!resolution.in_scope("/"));
    }

    #[test]
    fn bare_segment_is_out_of_its_own_scope() {
        let resolution = versioned().resolve("/favicon.ico").unwrap();
        assert_eq!(resolution.scope, "/favicon.ico/");
        assert!(!resolution.in_scope("/favicon.ico"));
    }

    #[test]
    fn second_segment_scope_includes_base() {
        let resolver = Resolver::new(
            Scheme::Versioned {
                version: "v2".to_string(),
            },
            "default-app",
            1,
        );
        let resolution = resolver.resolve("/apps/User-Manager/app.js").unwrap();
        assert_eq!(resolution.app, "User-Manager");
        assert_eq!(resolution.scope, "/apps/User-Manager/");
        assert!(resolution.in_scope("/apps/User-Manager/app.js"));

        let fallback = resolver.resolve("/apps").unwrap();
        assert_eq!(fallback.app, "default-app");
    }

    #[test]
    fn configured_scope_wins_over_segment_rule() {
        let mut config = Config::default();
        config.cache.apps = vec![
            AppConfig {
                name: "Reports".to_string(),
                scope: Some("/suite/Reports".to_string()),
                resources: vec![],
            },
            AppConfig {
                name: "Suite".to_string(),
                scope: Some("/suite".to_string()),
                resources: vec![],
            },
        ];
        let resolver = Resolver::from_config(&config, Registry::default());

        let reports = resolver.resolve("/suite/Reports/index.html").unwrap();
        assert_eq!(reports.app, "Reports");
        assert_eq!(reports.scope, "/suite/Reports/");
        assert_eq!(reports.partition, "Reports-cache-v2");
        assert!(reports.in_scope("/suite/Reports/index.html"));

        let suite = resolver.resolve("/suite/home.html").unwrap();
        assert_eq!(suite.partition, "Suite-cache-v2");

        // Unconfigured paths still follow the segment convention
        let other = resolver.resolve("/Other/index.html").unwrap();
        assert_eq!(other.partition, "Other-cache-v2");
    }

    #[test]
    fn global_resources_route_to_global_partition() {
        let resolver = versioned();
        let global = resolver.resolve_global("/IndexedDBManager.js").unwrap();
        assert_eq!(global.partition, "global-cache-v2");
        assert_eq!(global.scope, "/");

        // Relative entries are normalized with a leading slash
        assert!(resolver.resolve_global("/icons/a.png").is_some());
        assert!(resolver.resolve_global("/User-Manager/index.html").is_none());
    }

    #[test]
    fn manifest_scheme_requires_registered_app() {
        let foo = ManifestDescriptor {
            short_name: "Foo".to_string(),
            start_url: "index.html".to_string(),
            name: None,
            icons: vec![],
        };
        let registry = Registry::from_manifests(vec![(
            Url::parse("http://h/Foo/manifest.json").unwrap(),
            foo,
        )]);
        let resolver = Resolver::new(
            Scheme::Manifest {
                prefix: "pwa-cache-".to_string(),
            },
            "default-app",
            0,
        )
        .with_registry(registry);

        let resolution = resolver.resolve("/Foo/index.html").unwrap();
        assert_eq!(resolution.partition, "pwa-cache-Foo");
        assert_eq!(resolution.scope, "/Foo/");
        assert!(resolver.resolve("/Bar/index.html").is_none());
        assert_eq!(resolver.global_partition(), "pwa-cache-global");
    }

    #[test]
    fn scheme_from_config_is_explicit() {
        let mut config = Config::default();
        assert_eq!(
            Scheme::from_config(&config).version_suffix().as_deref(),
            Some("-cache-v2")
        );

        config.cache.scheme = SchemeKind::Manifest;
        let scheme = Scheme::from_config(&config);
        assert_eq!(scheme.partition_name("Foo"), "pwa-cache-Foo");
        assert!(scheme.version_suffix().is_none());
    }
}
