/// Offline cache coordinator
///
/// Sits between the gallery and the network. Every outbound resource
/// request goes through `handle`, which picks a strategy by resource class:
///
/// - Images: cache-first, refilled from the network on a miss
/// - Everything else (the entry document, shell resources): network-first,
///   falling back to the last good copy
///
/// Both partitions carry the cache version in their name. `install`
/// pre-populates the shell partition; `activate` deletes partitions left
/// behind by older versions. Until activation has run, an offline miss in
/// the current generation is answered from an older one still on disk.

use std::sync::Arc;

use super::network::Network;
use super::placeholder;
use super::store::CacheStore;
use super::{CacheError, CacheRecord, Response, ResponseOrigin};

/// Status used for synthetic responses
const UNAVAILABLE_STATUS: u16 = 503;

/// Naming and classification rules for the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Prefix shared by every partition this app owns (e.g., "design-gallery")
    pub family: String,
    /// Generation tag of the current partitions (e.g., "v1")
    pub version: String,
    /// Resources stored in the shell partition on install
    pub manifest: Vec<String>,
    /// Lowercase file extensions that mark a request as an image
    pub image_extensions: Vec<String>,
}

impl CacheSettings {
    pub fn new(family: &str, version: &str, manifest: Vec<String>) -> Self {
        Self {
            family: family.to_string(),
            version: version.to_string(),
            manifest,
            image_extensions: ["jpg", "jpeg", "png", "gif", "webp"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }

    /// Name of the partition holding shell resources for this version
    pub fn shell_partition(&self) -> String {
        format!("{}-shell-{}", self.family, self.version)
    }

    /// Name of the partition holding images for this version
    pub fn image_partition(&self) -> String {
        format!("{}-images-{}", self.family, self.version)
    }

    /// Check whether a partition name belongs to this app's partition family
    fn owns(&self, partition: &str) -> bool {
        partition
            .strip_prefix(self.family.as_str())
            .is_some_and(|rest| rest.starts_with('-'))
    }

    /// Same kind of partition as `current`, left by another generation
    fn is_older_sibling(&self, current: &str, partition: &str) -> bool {
        match current.strip_suffix(self.version.as_str()) {
            Some(prefix) => partition != current && partition.starts_with(prefix),
            None => false,
        }
    }

    /// Image requests are recognised by the extension of the URL path.
    /// Query strings and fragments are ignored; the match is case-insensitive.
    pub fn is_image_resource(&self, url: &str) -> bool {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let last_segment = path.rsplit('/').next().unwrap_or(path);
        match last_segment.rsplit_once('.') {
            Some((_, ext)) => {
                let ext = ext.to_lowercase();
                self.image_extensions.iter().any(|known| *known == ext)
            }
            None => false,
        }
    }
}

/// Applies the caching strategies on top of a store and a network
pub struct CacheCoordinator<N> {
    store: Arc<dyn CacheStore>,
    network: N,
    settings: CacheSettings,
}

impl<N: Network> CacheCoordinator<N> {
    pub fn new(store: Arc<dyn CacheStore>, network: N, settings: CacheSettings) -> Self {
        Self {
            store,
            network,
            settings,
        }
    }

    #[cfg(test)]
    pub(crate) fn network(&self) -> &N {
        &self.network
    }

    /// Install hook: fetch the whole manifest and store it in the shell partition.
    ///
    /// All-or-nothing: if any manifest resource can't be fetched (transport
    /// failure or non-success status), nothing is stored.
    pub async fn install(&self) -> Result<usize, CacheError> {
        let shell = self.settings.shell_partition();
        let mut fetched = Vec::with_capacity(self.settings.manifest.len());
        let mut failed = Vec::new();

        for url in &self.settings.manifest {
            match self.network.fetch(url).await {
                Ok(response) if response.is_success() => fetched.push((url, response)),
                Ok(response) => {
                    log::warn!("Install: {} answered {}", url, response.status);
                    failed.push(url.clone());
                }
                Err(e) => {
                    log::warn!("Install: {} failed: {}", url, e);
                    failed.push(url.clone());
                }
            }
        }

        if !failed.is_empty() {
            return Err(CacheError::Install { failed });
        }

        self.store.open_partition(&shell)?;
        self.store.open_partition(&self.settings.image_partition())?;
        for (url, response) in &fetched {
            self.store.put(&shell, &self.record(url, response))?;
        }

        log::info!("📦 Installed {} shell resources into {}", fetched.len(), shell);
        Ok(fetched.len())
    }

    /// Activate hook: delete every partition of this family that doesn't
    /// carry the current generation tag. Returns the deleted names.
    pub fn activate(&self) -> Result<Vec<String>, CacheError> {
        let shell = self.settings.shell_partition();
        let images = self.settings.image_partition();

        let mut evicted = Vec::new();
        for name in self.store.partition_names()? {
            if !self.settings.owns(&name) || name == shell || name == images {
                continue;
            }
            if self.store.delete_partition(&name)? {
                log::info!("🗑️  Evicted stale cache partition {}", name);
                evicted.push(name);
            }
        }
        Ok(evicted)
    }

    /// Answer a resource request. Never fails: total failure yields a
    /// synthetic 503 response.
    pub async fn handle(&self, url: &str) -> Response {
        if self.settings.is_image_resource(url) {
            self.cache_first(url).await
        } else {
            self.network_first(url).await
        }
    }

    async fn cache_first(&self, url: &str) -> Response {
        let images = self.settings.image_partition();
        if let Some(cached) = self.lookup(&images, url) {
            return cached;
        }

        match self.network.fetch(url).await {
            Ok(response) => {
                if response.is_success() {
                    self.store_copy(&images, url, &response);
                }
                response
            }
            Err(e) => {
                log::debug!("Image {} unavailable: {}", url, e);
                if let Some(previous) = self.lookup_previous(&images, url) {
                    return previous;
                }
                Response {
                    status: UNAVAILABLE_STATUS,
                    content_type: Some("image/png".to_string()),
                    body: placeholder::unavailable_png(),
                    origin: ResponseOrigin::Synthetic,
                }
            }
        }
    }

    async fn network_first(&self, url: &str) -> Response {
        let shell = self.settings.shell_partition();
        match self.network.fetch(url).await {
            Ok(response) => {
                if response.is_success() {
                    self.store_copy(&shell, url, &response);
                }
                response
            }
            Err(e) => {
                log::warn!("Network failed for {}, trying offline copy: {}", url, e);
                self.lookup(&shell, url)
                    .or_else(|| self.lookup_previous(&shell, url))
                    .unwrap_or_else(|| Response {
                        status: UNAVAILABLE_STATUS,
                        content_type: Some("text/plain".to_string()),
                        body: b"not available offline".to_vec(),
                        origin: ResponseOrigin::Synthetic,
                    })
            }
        }
    }

    /// Read failures count as a miss
    fn lookup(&self, partition: &str, url: &str) -> Option<Response> {
        self.lookup_record(partition, url)
            .map(|record| Response::from_cached(record.response))
    }

    fn lookup_record(&self, partition: &str, url: &str) -> Option<CacheRecord> {
        match self.store.lookup(partition, url) {
            Ok(found) => found,
            Err(e) => {
                log::warn!("Cache read failed for {} in {}: {}", url, partition, e);
                None
            }
        }
    }

    /// Newest copy of `url` in an older generation of `current`'s kind.
    /// Those partitions only survive until `activate` runs.
    fn lookup_previous(&self, current: &str, url: &str) -> Option<Response> {
        let names = match self.store.partition_names() {
            Ok(names) => names,
            Err(e) => {
                log::warn!("Cache partitions unreadable: {}", e);
                return None;
            }
        };

        let record = names
            .iter()
            .filter(|name| self.settings.is_older_sibling(current, name))
            .filter_map(|name| self.lookup_record(name, url))
            .max_by_key(|record| record.stored_at)?;

        log::info!("Serving {} from cache generation {}", url, record.generation);
        Some(Response::from_cached(record.response))
    }

    /// Best-effort write; failures are logged and dropped
    fn store_copy(&self, partition: &str, url: &str, response: &Response) {
        if let Err(e) = self.store.put(partition, &self.record(url, response)) {
            log::warn!("Cache write failed for {} in {}: {}", url, partition, e);
        }
    }

    fn record(&self, url: &str, response: &Response) -> CacheRecord {
        CacheRecord {
            resource_key: url.to_string(),
            generation: self.settings.version.clone(),
            response: response.to_cached(),
            stored_at: chrono::Utc::now().timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::network::fake::FakeNetwork;
    use crate::cache::{MemoryCacheStore, SqliteCacheStore};

    const DATA: &str = "https://gallery.test/data/designs.json";
    const IMAGE: &str = "https://cdn.test/shots/1.PNG?w=400";

    fn coordinator(version: &str, store: Arc<dyn CacheStore>) -> CacheCoordinator<FakeNetwork> {
        CacheCoordinator::new(
            store,
            FakeNetwork::new(),
            CacheSettings::new("design-gallery", version, vec![DATA.to_string()]),
        )
    }

    /// A store whose every operation fails
    struct BrokenStore;

    impl CacheStore for BrokenStore {
        fn open_partition(&self, _: &str) -> Result<(), CacheError> {
            Err(CacheError::Poisoned)
        }

        fn lookup(&self, _: &str, _: &str) -> Result<Option<CacheRecord>, CacheError> {
            Err(CacheError::Poisoned)
        }

        fn put(&self, _: &str, _: &CacheRecord) -> Result<(), CacheError> {
            Err(CacheError::Poisoned)
        }

        fn partition_names(&self) -> Result<Vec<String>, CacheError> {
            Err(CacheError::Poisoned)
        }

        fn delete_partition(&self, _: &str) -> Result<bool, CacheError> {
            Err(CacheError::Poisoned)
        }
    }

    #[test]
    fn test_partition_names_carry_generation() {
        let settings = CacheSettings::new("design-gallery", "v3", Vec::new());
        assert_eq!(settings.shell_partition(), "design-gallery-shell-v3");
        assert_eq!(settings.image_partition(), "design-gallery-images-v3");
    }

    #[test]
    fn test_image_classification() {
        let settings = CacheSettings::new("design-gallery", "v1", Vec::new());
        assert!(settings.is_image_resource("https://cdn.test/a.jpg"));
        assert!(settings.is_image_resource("https://cdn.test/a.JPEG"));
        assert!(settings.is_image_resource("/shots/b.webp?size=large"));
        assert!(settings.is_image_resource("c.gif#frame"));
        assert!(!settings.is_image_resource("/data/designs.json"));
        assert!(!settings.is_image_resource("https://cdn.png.test/index.html"));
        assert!(!settings.is_image_resource("https://cdn.test/"));
    }

    #[tokio::test]
    async fn test_image_cache_first_then_offline() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
        let coord = coordinator("v1", store.clone());
        coord.network.respond(IMAGE, 200, b"pixels");

        let first = coord.handle(IMAGE).await;
        assert_eq!(first.origin, ResponseOrigin::Network);
        assert_eq!(first.body, b"pixels");

        // Second request never touches the network
        coord.network.go_offline(IMAGE);
        let second = coord.handle(IMAGE).await;
        assert_eq!(second.origin, ResponseOrigin::Cache);
        assert_eq!(second.body, b"pixels");
        assert_eq!(coord.network.requests().len(), 1);

        let stored = store.lookup("design-gallery-images-v1", IMAGE).unwrap().unwrap();
        assert_eq!(stored.generation, "v1");
    }

    #[tokio::test]
    async fn test_image_failure_yields_placeholder() {
        let coord = coordinator("v1", Arc::new(MemoryCacheStore::new()));

        let response = coord.handle("https://cdn.test/missing.jpg").await;
        assert_eq!(response.origin, ResponseOrigin::Synthetic);
        assert_eq!(response.status, 503);
        assert!(!response.body.is_empty());
    }

    #[tokio::test]
    async fn test_image_error_status_is_not_cached() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
        let coord = coordinator("v1", store.clone());
        coord.network.respond(IMAGE, 404, b"nope");

        assert_eq!(coord.handle(IMAGE).await.status, 404);
        assert!(store.lookup("design-gallery-images-v1", IMAGE).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_network_first_falls_back_to_shell_copy() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
        let coord = coordinator("v1", store);
        coord.network.respond(DATA, 200, b"[1]");

        let online = coord.handle(DATA).await;
        assert_eq!(online.origin, ResponseOrigin::Network);

        // Fresh network data replaces the stored copy
        coord.network.respond(DATA, 200, b"[1,2]");
        assert_eq!(coord.handle(DATA).await.body, b"[1,2]");

        coord.network.go_offline(DATA);
        let offline = coord.handle(DATA).await;
        assert_eq!(offline.origin, ResponseOrigin::Cache);
        assert_eq!(offline.body, b"[1,2]");
    }

    #[tokio::test]
    async fn test_network_first_without_copy_is_synthetic() {
        let coord = coordinator("v1", Arc::new(MemoryCacheStore::new()));
        let response = coord.handle("https://gallery.test/index.html").await;
        assert_eq!(response.origin, ResponseOrigin::Synthetic);
        assert_eq!(response.status, 503);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_install_populates_shell_partition() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
        let coord = coordinator("v1", store.clone());
        coord.network.respond(DATA, 200, b"[]");

        assert_eq!(coord.install().await.unwrap(), 1);
        assert!(store.lookup("design-gallery-shell-v1", DATA).unwrap().is_some());
        assert_eq!(
            store.partition_names().unwrap(),
            vec![
                "design-gallery-images-v1".to_string(),
                "design-gallery-shell-v1".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
        let coord = CacheCoordinator::new(
            store.clone(),
            FakeNetwork::new(),
            CacheSettings::new(
                "design-gallery",
                "v1",
                vec![DATA.to_string(), "https://gallery.test/index.html".to_string()],
            ),
        );
        coord.network.respond(DATA, 200, b"[]");

        match coord.install().await {
            Err(CacheError::Install { failed }) => {
                assert_eq!(failed, vec!["https://gallery.test/index.html".to_string()]);
            }
            other => panic!("expected install failure, got {:?}", other),
        }
        assert!(store.partition_names().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_activate_evicts_previous_generation() {
        let store: Arc<dyn CacheStore> = Arc::new(SqliteCacheStore::open_in_memory().unwrap());

        let old = coordinator("v1", store.clone());
        old.network.respond(DATA, 200, b"[]");
        old.network.respond(IMAGE, 200, b"pixels");
        old.install().await.unwrap();
        old.handle(IMAGE).await;
        store.open_partition("someone-elses-cache").unwrap();
        store.open_partition("design-gallery-legacy").unwrap();

        let new = coordinator("v2", store.clone());
        new.network.respond(DATA, 200, b"[]");
        new.install().await.unwrap();
        let evicted = new.activate().unwrap();

        assert_eq!(
            evicted,
            vec![
                "design-gallery-images-v1".to_string(),
                "design-gallery-legacy".to_string(),
                "design-gallery-shell-v1".to_string(),
            ]
        );
        let remaining = store.partition_names().unwrap();
        assert!(remaining.iter().all(|name| !name.ends_with("-v1")));
        assert!(remaining.contains(&"someone-elses-cache".to_string()));
        assert!(remaining.contains(&"design-gallery-shell-v2".to_string()));

        // Previously cached image is gone: the new generation refetches it
        new.network.respond(IMAGE, 200, b"fresh");
        assert_eq!(new.handle(IMAGE).await.origin, ResponseOrigin::Network);

        // Activation is idempotent
        assert!(new.activate().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failures_never_reach_the_caller() {
        let coord = coordinator("v1", Arc::new(BrokenStore));
        coord.network.respond(IMAGE, 200, b"pixels");
        coord.network.respond(DATA, 200, b"[1]");

        // A failed read is a miss: the image comes from the network
        let image = coord.handle(IMAGE).await;
        assert_eq!(image.origin, ResponseOrigin::Network);
        assert_eq!(image.body, b"pixels");

        // A failed write still returns the fresh response
        let data = coord.handle(DATA).await;
        assert_eq!(data.origin, ResponseOrigin::Network);
        assert_eq!(data.body, b"[1]");
        assert_eq!(coord.network.requests(), vec![IMAGE.to_string(), DATA.to_string()]);

        // Offline, the unreadable store degrades to synthetic answers
        coord.network.go_offline(IMAGE);
        coord.network.go_offline(DATA);
        assert_eq!(coord.handle(IMAGE).await.origin, ResponseOrigin::Synthetic);
        assert_eq!(coord.handle(DATA).await.origin, ResponseOrigin::Synthetic);

        assert!(coord.install().await.is_err());
        assert!(coord.activate().is_err());
    }

    #[tokio::test]
    async fn test_offline_version_bump_serves_previous_generation() {
        let store: Arc<dyn CacheStore> = Arc::new(SqliteCacheStore::open_in_memory().unwrap());

        let old = coordinator("v1", store.clone());
        old.network.respond(DATA, 200, b"[1,2,3]");
        old.network.respond(IMAGE, 200, b"pixels");
        old.install().await.unwrap();
        old.activate().unwrap();
        old.handle(IMAGE).await;

        // New version starts with the network down: install fails, nothing is evicted
        let new = coordinator("v2", store.clone());
        assert!(new.install().await.is_err());
        assert_eq!(
            store.partition_names().unwrap(),
            vec![
                "design-gallery-images-v1".to_string(),
                "design-gallery-shell-v1".to_string()
            ]
        );

        let data = new.handle(DATA).await;
        assert_eq!(data.origin, ResponseOrigin::Cache);
        assert_eq!(data.body, b"[1,2,3]");

        let image = new.handle(IMAGE).await;
        assert_eq!(image.origin, ResponseOrigin::Cache);
        assert_eq!(image.body, b"pixels");

        // Only the same kind of partition is consulted
        assert_eq!(
            new.handle("https://gallery.test/other.json").await.origin,
            ResponseOrigin::Synthetic
        );

        // Back online the new generation takes over and the old one goes away
        new.network.respond(DATA, 200, b"[4]");
        assert_eq!(new.install().await.unwrap(), 1);
        new.activate().unwrap();
        new.network.go_offline(DATA);
        assert_eq!(new.handle(DATA).await.body, b"[4]");
        assert_eq!(
            new.handle(IMAGE).await.origin,
            ResponseOrigin::Synthetic
        );
    }
}
