//! Named backend factories
//!
//! The composition root builds one `ComponentRegistry`, lets each backend
//! crate register its factories into it, then asks it for exactly one
//! provider, one updater and at most one notifier.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use uddns_core::ComponentRegistry;
//!
//! let mut registry = ComponentRegistry::new();
//! uddns_ip_service::register(&mut registry);
//! uddns_updater_cloudflare::register(&mut registry);
//!
//! let provider = registry.create_provider(&config.provider)?;
//! let updater = registry.create_updater(&config.updater)?;
//! let notifier = registry.create_notifier(config.notifier.as_ref())?;
//! ```
//!
//! ## Selection
//!
//! A config's `type` tag (or `factory` for custom entries) names the
//! factory. There is no fallback to "whichever constructor works": an
//! unknown name is a configuration error listing what is registered.

use crate::config::{NotifierConfig, ProviderConfig, UpdaterConfig};
use crate::error::{Error, Result};
use crate::traits::{AddressProvider, AddressProviderFactory};
use crate::traits::{NoopNotifier, Notifier, NotifierFactory};
use crate::traits::{RecordUpdater, RecordUpdaterFactory};

/// Ordered name → factory table
///
/// Lookup is linear; there are a handful of entries at most.
struct Table<F: ?Sized> {
    entries: Vec<(String, Box<F>)>,
}

impl<F: ?Sized> Default for Table<F> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<F: ?Sized> Table<F> {
    /// Insert, replacing an existing entry of the same name in place
    fn insert(&mut self, name: String, factory: Box<F>) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = factory,
            None => self.entries.push((name, factory)),
        }
    }

    fn get(&self, name: &str) -> Option<&F> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f.as_ref())
    }

    fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn lookup(&self, category: &str, name: &str) -> Result<&F> {
        self.get(name).ok_or_else(|| {
            Error::config(format!(
                "Unknown {} type: {} (registered: {})",
                category,
                name,
                if self.entries.is_empty() {
                    "none".to_string()
                } else {
                    self.names().join(", ")
                }
            ))
        })
    }
}

/// Registry of address provider, record updater and notifier factories
#[derive(Default)]
pub struct ComponentRegistry {
    providers: Table<dyn AddressProviderFactory>,
    updaters: Table<dyn RecordUpdaterFactory>,
    notifiers: Table<dyn NotifierFactory>,
}

impl ComponentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an address provider factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider type name (e.g., "ip_service", "netif")
    /// - `factory`: Factory object for creating provider instances
    pub fn register_provider(
        &mut self,
        name: impl Into<String>,
        factory: Box<dyn AddressProviderFactory>,
    ) {
        self.providers.insert(name.into(), factory);
    }

    /// Register a record updater factory
    ///
    /// # Parameters
    ///
    /// - `name`: Updater type name (e.g., "cloudflare", "duckdns")
    /// - `factory`: Factory object for creating updater instances
    pub fn register_updater(
        &mut self,
        name: impl Into<String>,
        factory: Box<dyn RecordUpdaterFactory>,
    ) {
        self.updaters.insert(name.into(), factory);
    }

    /// Register a notifier factory
    pub fn register_notifier(&mut self, name: impl Into<String>, factory: Box<dyn NotifierFactory>) {
        self.notifiers.insert(name.into(), factory);
    }

    /// Create an address provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn AddressProvider>)`: Created provider instance
    /// - `Err(Error::Config)`: If the type is not registered or creation fails
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn AddressProvider>> {
        self.providers
            .lookup("provider", config.type_name())?
            .create(config)
    }

    /// Create a record updater from configuration
    pub fn create_updater(&self, config: &UpdaterConfig) -> Result<Box<dyn RecordUpdater>> {
        self.updaters
            .lookup("updater", config.type_name())?
            .create(config)
    }

    /// Create a notifier from configuration
    ///
    /// No configuration yields a [`NoopNotifier`].
    pub fn create_notifier(&self, config: Option<&NotifierConfig>) -> Result<Box<dyn Notifier>> {
        match config {
            Some(config) => self
                .notifiers
                .lookup("notifier", config.type_name())?
                .create(config),
            None => Ok(Box::new(NoopNotifier)),
        }
    }

    /// Registered provider names, in registration order
    pub fn list_providers(&self) -> Vec<String> {
        self.providers.names()
    }

    /// Registered updater names, in registration order
    pub fn list_updaters(&self) -> Vec<String> {
        self.updaters.names()
    }

    /// Registered notifier names, in registration order
    pub fn list_notifiers(&self) -> Vec<String> {
        self.notifiers.names()
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.contains(name)
    }

    /// Check if an updater type is registered
    pub fn has_updater(&self, name: &str) -> bool {
        self.updaters.contains(name)
    }

    /// Check if a notifier type is registered
    pub fn has_notifier(&self, name: &str) -> bool {
        self.notifiers.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::AddressSnapshot;
    use async_trait::async_trait;

    struct FixedProvider(&'static str);

    #[async_trait]
    impl AddressProvider for FixedProvider {
        async fn get_ips(&self) -> Result<AddressSnapshot> {
            Ok(AddressSnapshot::v4(self.0))
        }

        fn provider_name(&self) -> &'static str {
            "fixed"
        }
    }

    struct FixedFactory(&'static str);

    impl AddressProviderFactory for FixedFactory {
        fn create(&self, _config: &ProviderConfig) -> Result<Box<dyn AddressProvider>> {
            Ok(Box::new(FixedProvider(self.0)))
        }
    }

    fn netif_config() -> ProviderConfig {
        ProviderConfig::Netif {
            name: "eth0".to_string(),
        }
    }

    #[test]
    fn test_registry_registration() {
        let mut registry = ComponentRegistry::new();
        assert!(!registry.has_provider("netif"));

        registry.register_provider("netif", Box::new(FixedFactory("10.0.0.1")));

        assert!(registry.has_provider("netif"));
        assert_eq!(registry.list_providers(), vec!["netif".to_string()]);
        assert!(registry.list_updaters().is_empty());
    }

    #[tokio::test]
    async fn selection_follows_the_type_tag() {
        let mut registry = ComponentRegistry::new();
        registry.register_provider("ip_service", Box::new(FixedFactory("1.1.1.1")));
        registry.register_provider("netif", Box::new(FixedFactory("10.0.0.1")));

        let provider = registry.create_provider(&netif_config()).unwrap();
        let snapshot = provider.get_ips().await.unwrap();
        assert_eq!(snapshot.ipv4(), Some("10.0.0.1"));
    }

    #[tokio::test]
    async fn re_registering_replaces_in_place() {
        let mut registry = ComponentRegistry::new();
        registry.register_provider("netif", Box::new(FixedFactory("10.0.0.1")));
        registry.register_provider("routeros", Box::new(FixedFactory("10.0.0.2")));
        registry.register_provider("netif", Box::new(FixedFactory("10.0.0.3")));

        assert_eq!(
            registry.list_providers(),
            vec!["netif".to_string(), "routeros".to_string()]
        );
        let provider = registry.create_provider(&netif_config()).unwrap();
        assert_eq!(provider.get_ips().await.unwrap().ipv4(), Some("10.0.0.3"));
    }

    #[test]
    fn unknown_type_lists_registered_names() {
        let mut registry = ComponentRegistry::new();
        registry.register_provider("ip_service", Box::new(FixedFactory("1.1.1.1")));

        let err = registry.create_provider(&netif_config()).err().unwrap();
        let message = err.to_string();
        assert!(message.contains("Unknown provider type: netif"));
        assert!(message.contains("ip_service"));
    }

    #[tokio::test]
    async fn missing_notifier_config_is_noop() {
        let registry = ComponentRegistry::new();
        let notifier = registry.create_notifier(None).unwrap();
        assert_eq!(notifier.notifier_name(), "noop");
    }
}
