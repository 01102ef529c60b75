//! Per-deployment application table
//!
//! Built once from configuration and never mutated afterwards. Install
//! iterates it to plan preloads; nothing registers apps lazily at request
//! time.

use crate::config::Config;
use crate::resolve::Scheme;

/// One configured application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppEntry {
    pub name: String,
    /// Path prefix the app is served under, with trailing slash
    pub scope: String,
    /// Partition this app's responses live in
    pub partition: String,
    /// Resources to precache, relative to `scope` unless origin-absolute
    pub resources: Vec<String>,
}

/// Application table keyed by identity, in configuration order
#[derive(Debug, Clone)]
pub struct AppTable {
    scheme: Scheme,
    apps: Vec<AppEntry>,
    global_partition: String,
    global_resources: Vec<String>,
}

impl AppTable {
    pub fn from_config(config: &Config) -> Self {
        let scheme = Scheme::from_config(config);

        let apps = config
            .cache
            .apps
            .iter()
            .map(|app| {
                let mut resources = config.cache.precache.clone();
                for extra in &app.resources {
                    if !resources.contains(extra) {
                        resources.push(extra.clone());
                    }
                }
                AppEntry {
                    name: app.name.clone(),
                    scope: app.scope(),
                    partition: scheme.partition_name(&app.name),
                    resources,
                }
            })
            .collect();

        Self {
            global_partition: scheme.partition_name(&config.cache.global_partition),
            global_resources: config.cache.global_resources.clone(),
            scheme,
            apps,
        }
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    pub fn get(&self, name: &str) -> Option<&AppEntry> {
        self.apps.iter().find(|app| app.name == name)
    }

    pub fn apps(&self) -> &[AppEntry] {
        &self.apps
    }

    pub fn global_partition(&self) -> &str {
        &self.global_partition
    }

    pub fn global_resources(&self) -> &[String] {
        &self.global_resources
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}
