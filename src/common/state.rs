use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::backend::models::Device;
use crate::backend::{BackendClient, DeviceDirectory};
use crate::config::Config;
use crate::dashboard::DisplayFormat;
use crate::error::{AppError, AppResult};

const DIRECTORY_KEY: &str = "devices";

/// Short-lived copy of the device directory. Registration and threshold
/// writes invalidate it.
pub type DirectoryCache = Cache<&'static str, Arc<Vec<Device>>>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Arc<BackendClient>,
    pub display_format: Arc<DisplayFormat>,
    pub directory_cache: DirectoryCache,
    /// Bumped on every invalidation, so a fetch that overlapped a write can
    /// tell its result may be stale.
    directory_generation: Arc<AtomicU64>,
    /// Caps concurrent dashboard builds, each of which fans out one backend
    /// request per sensor.
    pub dashboard_permits: Arc<Semaphore>,
}

impl AppState {
    /// # Errors
    ///
    /// Returns `AppError::Config` if the display settings are unusable.
    pub fn new(config: Config, backend: BackendClient) -> AppResult<Self> {
        let display_format = config.display_format()?;
        let dashboard_limit = config.dashboard_concurrent_limit.max(1);

        let directory_cache: DirectoryCache = Cache::builder()
            .max_capacity(1)
            .time_to_live(Duration::from_secs(config.directory_cache_ttl_seconds))
            .build();

        Ok(Self {
            config: Arc::new(config),
            backend: Arc::new(backend),
            display_format: Arc::new(display_format),
            directory_cache,
            directory_generation: Arc::new(AtomicU64::new(0)),
            dashboard_permits: Arc::new(Semaphore::new(dashboard_limit)),
        })
    }

    /// All devices with their sensors, served from cache when fresh.
    ///
    /// # Errors
    ///
    /// Propagates the backend error when the directory has to be refetched.
    pub async fn devices(&self) -> AppResult<Arc<Vec<Device>>> {
        if let Some(cached) = self.directory_cache.get(DIRECTORY_KEY).await {
            tracing::debug!("directory_cache_hit");
            return Ok(cached);
        }

        let generation = self.directory_generation.load(Ordering::SeqCst);
        let devices = Arc::new(self.backend.list_devices().await?);
        self.directory_cache
            .insert(DIRECTORY_KEY, devices.clone())
            .await;

        // A write invalidated the directory while we were fetching
        if self.directory_generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("directory_cache_insert_discarded");
            self.directory_cache.invalidate(DIRECTORY_KEY).await;
        }

        Ok(devices)
    }

    /// # Errors
    ///
    /// Returns `AppError::ServiceUnavailable` when every dashboard slot is taken.
    pub fn try_dashboard_permit(&self) -> AppResult<OwnedSemaphorePermit> {
        self.dashboard_permits.clone().try_acquire_owned().map_err(|_| {
            tracing::warn!(
                limit = self.config.dashboard_concurrent_limit,
                "dashboard_request_rejected"
            );
            AppError::ServiceUnavailable(
                "Too many concurrent dashboard requests. Please try again later.".to_string(),
            )
        })
    }

    pub async fn invalidate_directory(&self) {
        tracing::debug!("directory_cache_invalidated");
        self.directory_generation.fetch_add(1, Ordering::SeqCst);
        self.directory_cache.invalidate(DIRECTORY_KEY).await;
    }
}
