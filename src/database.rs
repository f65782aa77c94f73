use std::{
    mem,
    sync::{Arc, Once, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use log::info;

use crate::{
    buffer_pool::BufferPool, catalog::Catalog, config::Config, disk_manager::DiskManager,
    transaction::{LockManager, RecoveryManager}, transaction::log_manager::LogManager,
    types::Pod, utils::HandyRwLock,
};

/// Holds every process-wide subsystem handle. Each field is its own
/// `Pod` (an `Arc<RwLock<_>>`) so callers can take a read or write lock
/// on exactly the subsystem they need without contending on the
/// others. See `global()` for how instances are constructed and
/// reached from anywhere in the engine.
pub struct Database {
    config: Config,
    buffer_pool: Pod<BufferPool>,
    catalog: Pod<Catalog>,
    lock_manager: Pod<LockManager>,
    log_manager: Pod<LogManager>,
}

static mut SINGLETON: *mut Database = 0 as *mut Database;

impl Database {
    fn new(config: Config) -> Self {
        std::fs::create_dir_all(&config.data_dir).expect("failed to create data directory");

        let disk = DiskManager::new(config.data_dir.clone(), config.page_size);
        let buffer_pool = Arc::new(RwLock::new(BufferPool::new(disk, config.buffer_pool_frames)));
        let catalog = Arc::new(RwLock::new(Catalog::new(&config)));
        let lock_manager = Arc::new(RwLock::new(LockManager::new(config.lock_wait_timeout_ms)));
        let log_manager = Arc::new(RwLock::new(LogManager::new(config.log_path(), config.log_buffer_size)));

        Self { config, buffer_pool, catalog, lock_manager, log_manager }
    }

    /// Rebuilds a fresh instance for `config`, running the three-pass
    /// recovery protocol against whatever WAL was already on disk
    /// before handing the instance back to callers. Used both at
    /// normal startup and by tests that want a clean, crash-recovered
    /// view of an existing data directory.
    fn boot(config: Config) -> Self {
        let instance = Self::new(config);
        let mut log_manager = instance.log_manager.wl();
        let mut buffer_pool = instance.buffer_pool.wl();
        let catalog = instance.catalog.rl();
        RecoveryManager::recover(&mut log_manager, &mut buffer_pool, &catalog).expect("recovery failed");
        drop(catalog);
        drop(buffer_pool);
        drop(log_manager);
        instance
    }

    /// Re-initializes the global instance against `config`, discarding
    /// any previous one. Used by tests that need an isolated data
    /// directory; production code should just call `global()`.
    pub fn init(config: Config) {
        let singleton = Self::boot(config);
        unsafe {
            if !SINGLETON.is_null() {
                mem::drop(Box::from_raw(SINGLETON));
            }
            SINGLETON = mem::transmute(Box::new(singleton));
        }
        info!("database initialized at {:?}", Self::global().config.data_dir);
    }

    pub fn global() -> &'static Self {
        static ONCE: Once = Once::new();

        ONCE.call_once(|| {
            let singleton = Self::boot(Config::default());
            unsafe {
                SINGLETON = mem::transmute(Box::new(singleton));
            }
        });

        unsafe { SINGLETON.as_ref().unwrap() }
    }

    pub fn config() -> &'static Config {
        &Self::global().config
    }

    pub fn buffer_pool() -> RwLockReadGuard<'static, BufferPool> {
        Self::global().buffer_pool.rl()
    }

    pub fn mut_buffer_pool() -> RwLockWriteGuard<'static, BufferPool> {
        Self::global().buffer_pool.wl()
    }

    pub fn catalog() -> RwLockReadGuard<'static, Catalog> {
        Self::global().catalog.rl()
    }

    pub fn mut_catalog() -> RwLockWriteGuard<'static, Catalog> {
        Self::global().catalog.wl()
    }

    pub fn lock_manager() -> RwLockReadGuard<'static, LockManager> {
        Self::global().lock_manager.rl()
    }

    pub fn mut_lock_manager() -> RwLockWriteGuard<'static, LockManager> {
        Self::global().lock_manager.wl()
    }

    pub fn log_manager() -> RwLockReadGuard<'static, LogManager> {
        Self::global().log_manager.rl()
    }

    pub fn mut_log_manager() -> RwLockWriteGuard<'static, LogManager> {
        Self::global().log_manager.wl()
    }
}
