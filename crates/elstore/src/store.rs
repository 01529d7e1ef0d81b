//! File-backed element store.
//!
//! Every element lives in its own file:
//!
//! ```text
//! <root>/
//!   <first 1-2 chars of id>/
//!     <id>            # id in base-36, content = the element's stored bytes
//! ```
//!
//! Three pieces of state decide what the store contains:
//!
//! - the *inventory*: ids whose files are known to be complete on disk,
//! - the *write buffer*: elements handed to `put` whose background write has
//!   not finished yet, plus the sticky error of the last failed write,
//! - the optional *cache*.
//!
//! Readers always look at the write buffer before the inventory. A finishing
//! write publishes its id to the inventory before leaving the buffer, so an
//! element is never observed as missing while it moves between the two.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::{self, DirBuilder, File, OpenOptions};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::thread;

use elstore_cache::{ElementCache, LruCache};
use elstore_types::{Element, ElementId};
use tracing::{debug, error, warn};
use walkdir::WalkDir;

use crate::config::{CacheMode, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::pending::PendingWrites;

struct CacheSlot<E> {
    cache: Arc<dyn ElementCache<E>>,
    mode: CacheMode,
}

/// In-flight elements and the sticky error share one lock so that the
/// duplicate check, the error check and the registration in `put` are a
/// single critical section.
struct WriteBuffer<E> {
    elements: HashMap<ElementId, Arc<E>>,
    failure: Option<(ElementId, Arc<StoreError>)>,
}

struct StoreInner<E> {
    root: PathBuf,
    dir_mode: u32,
    file_mode: u32,
    sync_files: bool,
    cache: RwLock<Option<CacheSlot<E>>>,
    // Lock order: `buffer` before `inventory`.
    buffer: RwLock<WriteBuffer<E>>,
    inventory: RwLock<HashSet<ElementId>>,
    pending: PendingWrites,
}

/// Concurrency-safe, file-backed store of elements of type `E`.
///
/// `put` returns as soon as the element is registered; the file is written
/// by a background thread. A failed background write is reported by the
/// next `put` and by every `put` after it.
///
/// Each accepted `put` spawns one writer thread. There is no upper bound on
/// concurrent writers: callers producing elements faster than the disk can
/// absorb them must throttle themselves.
pub struct FileStore<E> {
    inner: Arc<StoreInner<E>>,
}

impl<E: Element> FileStore<E> {
    /// Open a store rooted at `root` with default settings and no cache.
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        Self::open(StoreConfig::new(root))
    }

    /// Open a store from a full configuration.
    ///
    /// Creates the root directory if needed, then scans it once to rebuild
    /// the inventory. Only file names are checked; element contents are
    /// not read until they are requested.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        let root = config.root;
        create_dirs(&root, config.dir_mode)?;
        let inventory = scan_inventory(&root)?;
        debug!(root = %root.display(), elements = inventory.len(), "opened element store");

        let store = Self {
            inner: Arc::new(StoreInner {
                root,
                dir_mode: config.dir_mode,
                file_mode: config.file_mode,
                sync_files: config.sync_files,
                cache: RwLock::new(None),
                buffer: RwLock::new(WriteBuffer {
                    elements: HashMap::new(),
                    failure: None,
                }),
                inventory: RwLock::new(inventory),
                pending: PendingWrites::default(),
            }),
        };

        if config.cache_capacity > 0 {
            let cache: Arc<dyn ElementCache<E>> =
                Arc::new(LruCache::<E>::new(config.cache_capacity));
            store.set_cache(Some(cache), config.cache_mode);
        }
        Ok(store)
    }

    /// Install (or with `None`, uninstall) the cache and choose when
    /// elements are pushed into it.
    ///
    /// Intended for setup time. Writes already in flight may or may not see
    /// the new cache.
    pub fn set_cache(&self, cache: Option<Arc<dyn ElementCache<E>>>, mode: CacheMode) {
        *self.inner.cache.write().expect("lock poisoned") =
            cache.map(|cache| CacheSlot { cache, mode });
    }

    /// Returns `true` if `id` is stored or currently being written.
    pub fn has(&self, id: ElementId) -> bool {
        if self.inner.buffer.read().expect("lock poisoned").elements.contains_key(&id) {
            return true;
        }
        self.inner.inventory.read().expect("lock poisoned").contains(&id)
    }

    /// Retrieve the element whose id `skeleton` carries.
    ///
    /// Resolution order is cache, write buffer, then disk. Cached and
    /// in-flight elements are returned as the shared instances the store
    /// already holds and `skeleton` is dropped. Otherwise `skeleton` is
    /// loaded from its file and returned.
    ///
    /// A cache hit does not refresh the element's recency. The LRU order
    /// only moves when the store inserts into the cache, so elements that
    /// are read often but written once still age out in insertion order.
    /// That keeps the read path to a single lookup under the cache lock.
    pub fn get(&self, skeleton: E) -> StoreResult<Arc<E>> {
        let id = skeleton.id();

        if let Some(cache) = self.inner.cache_for(CacheMode::empty()) {
            if let Some(element) = cache.get(id) {
                return Ok(element);
            }
        }

        let in_flight = self
            .inner
            .buffer
            .read()
            .expect("lock poisoned")
            .elements
            .get(&id)
            .cloned();
        if let Some(element) = in_flight {
            return Ok(element);
        }

        // Checked last: an id only reaches the inventory once its write has
        // completed.
        if !self.inner.inventory.read().expect("lock poisoned").contains(&id) {
            return Err(StoreError::NotFound(id));
        }

        let mut element = skeleton;
        self.inner.read_element(&mut element)?;
        let element = Arc::new(element);

        if let Some(cache) = self.inner.cache_for(CacheMode::ON_GET) {
            cache.cache(Arc::clone(&element));
        }
        Ok(element)
    }

    /// Store `element`. See [`FileStore::put_arc`].
    pub fn put(&self, element: E) -> StoreResult<()> {
        self.put_arc(Arc::new(element))
    }

    /// Register `element` and write it to disk in the background.
    ///
    /// Fails immediately with [`StoreError::BackgroundWrite`] if an earlier
    /// write failed, or with [`StoreError::AlreadyExists`] if the id is
    /// stored or in flight. Of several concurrent puts with the same id,
    /// exactly one succeeds.
    pub fn put_arc(&self, element: Arc<E>) -> StoreResult<()> {
        let id = element.id();
        {
            let mut buffer = self.inner.buffer.write().expect("lock poisoned");
            if let Some((failed, source)) = &buffer.failure {
                return Err(StoreError::BackgroundWrite {
                    id: *failed,
                    source: Arc::clone(source),
                });
            }
            if buffer.elements.contains_key(&id)
                || self.inner.inventory.read().expect("lock poisoned").contains(&id)
            {
                return Err(StoreError::AlreadyExists(id));
            }
            buffer.elements.insert(id, Arc::clone(&element));
            self.inner.pending.begin();
        }

        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name(format!("elstore-write-{id}"))
            .spawn(move || inner.write_in_background(element));

        if let Err(e) = spawned {
            self.inner
                .buffer
                .write()
                .expect("lock poisoned")
                .elements
                .remove(&id);
            self.inner.pending.finish();
            return Err(e.into());
        }
        debug!(%id, "dispatched background write");
        Ok(())
    }

    /// Block until every write dispatched so far has finished.
    ///
    /// Puts issued while waiting may extend the wait. The sticky error is
    /// neither inspected nor cleared.
    pub fn sync(&self) {
        self.inner.pending.wait();
    }

    /// Wait for outstanding writes, then delete the root directory and
    /// everything in it.
    pub fn remove(self) -> StoreResult<()> {
        self.sync();
        fs::remove_dir_all(&self.inner.root)?;
        debug!(root = %self.inner.root.display(), "removed element store");
        Ok(())
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// File that holds (or will hold) the element with `id`.
    pub fn element_path(&self, id: ElementId) -> PathBuf {
        self.inner.element_path(id)
    }

    /// Number of background writes that have not finished yet.
    pub fn pending_writes(&self) -> usize {
        self.inner.pending.current()
    }

    /// Number of elements confirmed on disk.
    pub fn len(&self) -> usize {
        self.inner.inventory.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: Element> StoreInner<E> {
    /// The installed cache, if its mode includes `mode`.
    fn cache_for(&self, mode: CacheMode) -> Option<Arc<dyn ElementCache<E>>> {
        let slot = self.cache.read().expect("lock poisoned");
        slot.as_ref()
            .filter(|slot| slot.mode.contains(mode))
            .map(|slot| Arc::clone(&slot.cache))
    }

    fn element_path(&self, id: ElementId) -> PathBuf {
        self.root.join(id.shard()).join(id.to_base36())
    }

    fn read_element(&self, element: &mut E) -> StoreResult<()> {
        let file = File::open(self.element_path(element.id()))?;
        element.load(&mut BufReader::new(file))?;
        Ok(())
    }

    fn write_element(&self, element: &E) -> StoreResult<()> {
        let id = element.id();
        let path = self.element_path(id);
        if let Some(dir) = path.parent() {
            create_dirs(dir, self.dir_mode)?;
        }

        let file = create_new_file(&path, self.file_mode)?;
        let partial = PartialFile { id, path: &path };
        self.fill_file(file, element)?;
        partial.keep();
        Ok(())
    }

    fn fill_file(&self, file: File, element: &E) -> StoreResult<()> {
        let mut writer = BufWriter::new(file);
        element.store(&mut writer)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        if self.sync_files {
            file.sync_all()?;
        }
        Ok(())
    }

    fn write_in_background(&self, element: Arc<E>) {
        let id = element.id();
        let mut completion = Completion {
            inner: self,
            id,
            failure: None,
        };

        match self.write_element(&element) {
            Ok(()) => {
                self.inventory.write().expect("lock poisoned").insert(id);
                if let Some(cache) = self.cache_for(CacheMode::ON_PUT) {
                    cache.cache(element);
                }
                debug!(%id, "element persisted");
            }
            Err(err) => {
                warn!(%id, error = %err, "background write failed; further puts will be rejected");
                completion.failure = Some(err);
            }
        }
    }
}

/// Final step of every background write, run on drop so that it also
/// happens if the element's encoder panics: record any failure, leave the
/// write buffer, and release `sync`.
struct Completion<'a, E> {
    inner: &'a StoreInner<E>,
    id: ElementId,
    failure: Option<StoreError>,
}

impl<E> Drop for Completion<'_, E> {
    fn drop(&mut self) {
        let failure = self.failure.take().or_else(|| {
            thread::panicking().then(|| StoreError::Io(io::Error::other("element writer panicked")))
        });
        if let Ok(mut buffer) = self.inner.buffer.write() {
            if let Some(err) = failure {
                buffer.failure = Some((self.id, Arc::new(err)));
            }
            buffer.elements.remove(&self.id);
        }
        self.inner.pending.finish();
    }
}

/// Removes a freshly created element file on drop unless `keep` is
/// called. Covers both error returns and an encoder that panics, so a
/// truncated file never outlives its failed write.
struct PartialFile<'a> {
    id: ElementId,
    path: &'a Path,
}

impl PartialFile<'_> {
    fn keep(self) {
        std::mem::forget(self);
    }
}

impl Drop for PartialFile<'_> {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(self.path) {
            error!(
                id = %self.id,
                path = %self.path.display(),
                error = %e,
                "failed to remove partial element file"
            );
        }
    }
}

impl<E> fmt::Debug for FileStore<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStore")
            .field("root", &self.inner.root)
            .field("pending_writes", &self.inner.pending.current())
            .finish()
    }
}

fn create_dirs(path: &Path, mode: u32) -> io::Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(path)
}

/// Open `path` for writing, failing if it already exists.
fn create_new_file(path: &Path, mode: u32) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    options.open(path)
}

/// Collect the ids of all regular files under `root` whose names parse as
/// element ids.
fn scan_inventory(root: &Path) -> StoreResult<HashSet<ElementId>> {
    let mut inventory = HashSet::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        match entry.file_name().to_str().map(str::parse::<ElementId>) {
            Some(Ok(id)) => {
                inventory.insert(id);
            }
            _ => debug!(path = %entry.path().display(), "skipping non-element file"),
        }
    }
    Ok(inventory)
}
