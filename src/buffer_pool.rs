//! The buffer pool: on-demand page fetch, LRU eviction at
//! physical-page granularity, pin counts, dirty tracking, and a
//! path-keyed cache, as described in §4.3.
//!
//! Grounded on the teacher's `BufferPool` (`HashMap<PageId, ...>`
//! cache keyed by page identity, one entry per physical page) plus the
//! frame/pin/LRU-replacer pattern used by embeddable-storage-engine
//! buffer pool managers in the wider example pack, since the teacher
//! itself never implements eviction.

use std::collections::{HashMap, VecDeque};
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use memmap2::MmapMut;

use crate::consts::PAGE_SIZE;
use crate::error::{StorageError, StorageResult};
use crate::page::PhysicalPage;

/// Uniquely identifies one physical page: table, page-range, page
/// number within the range, and column index (0-indexed across
/// metadata columns then user columns).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PagePath {
    pub table: String,
    pub page_range: usize,
    pub page: usize,
    pub col: usize,
}

impl PagePath {
    pub fn new(table: &str, page_range: usize, page: usize, col: usize) -> Self {
        PagePath {
            table: table.to_string(),
            page_range,
            page,
            col,
        }
    }

    fn relative_path(&self) -> PathBuf {
        PathBuf::from(&self.table)
            .join(format!("page_range{}", self.page_range))
            .join(format!("page{}", self.page))
            .join(format!("col{}", self.col))
    }
}

struct BufferPoolInner {
    pages: HashMap<PagePath, Arc<Mutex<PhysicalPage>>>,
    /// Front = least recently used, back = most recently used.
    lru: VecDeque<PagePath>,
}

pub struct BufferPool {
    root: PathBuf,
    capacity: usize,
    inner: Mutex<BufferPoolInner>,
}

impl BufferPool {
    pub fn new(root: impl Into<PathBuf>, capacity: usize) -> Self {
        BufferPool {
            root: root.into(),
            capacity,
            inner: Mutex::new(BufferPoolInner {
                pages: HashMap::new(),
                lru: VecDeque::new(),
            }),
        }
    }

    fn disk_path(&self, path: &PagePath) -> PathBuf {
        self.root.join(path.relative_path())
    }

    fn load_from_disk(&self, path: &PagePath) -> StorageResult<PhysicalPage> {
        let disk_path = self.disk_path(path);
        let bytes = fs::read(&disk_path)?;
        if bytes.len() != PAGE_SIZE {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("page {:?} has unexpected length {}", path, bytes.len()),
            )));
        }
        Ok(PhysicalPage::from_bytes(bytes))
    }

    /// Create a brand-new, empty physical page on disk at `path` and
    /// admit it to the pool. Used when a table allocates a new base or
    /// tail page.
    pub fn create_physical_page(&self, path: &PagePath) -> StorageResult<Arc<Mutex<PhysicalPage>>> {
        let disk_path = self.disk_path(path);
        if let Some(parent) = disk_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let page = PhysicalPage::empty();
        self.write_page_to_disk(&disk_path, &page)?;

        let mut inner = self.inner.lock().unwrap();
        self.admit(&mut inner, path.clone(), page)
    }

    /// Fetch a physical page, loading it from disk on a cache miss and
    /// evicting one victim if the pool is at capacity. On return the
    /// page is resident and at the back (most-recent end) of the LRU
    /// queue.
    pub fn get_physical_page(&self, path: &PagePath) -> StorageResult<Arc<Mutex<PhysicalPage>>> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(page) = inner.pages.get(path).cloned() {
            inner.lru.retain(|p| p != path);
            inner.lru.push_back(path.clone());
            return Ok(page);
        }

        let page = self.load_from_disk(path)?;
        self.admit(&mut inner, path.clone(), page)
    }

    /// Fetch a page straight from disk without admitting it to the
    /// pool. Used by the merge engine so it never pollutes the cache
    /// with pages it reads only to rebuild.
    pub fn get_physical_page_no_add(&self, path: &PagePath) -> StorageResult<PhysicalPage> {
        self.load_from_disk(path)
    }

    fn admit(
        &self,
        inner: &mut BufferPoolInner,
        path: PagePath,
        page: PhysicalPage,
    ) -> StorageResult<Arc<Mutex<PhysicalPage>>> {
        if inner.pages.len() >= self.capacity && !self.evict_one(inner) {
            // Every resident page is pinned: favor progress over strict
            // residency and hand back an uncached page instead of
            // growing the pool past capacity.
            return Ok(Arc::new(Mutex::new(page)));
        }

        let handle = Arc::new(Mutex::new(page));
        inner.pages.insert(path.clone(), handle.clone());
        inner.lru.push_back(path);
        Ok(handle)
    }

    /// First-fit eviction: scan the LRU queue front-to-back for a page
    /// with `pin_count == 0`. Returns whether a victim was evicted; if
    /// all resident pages are pinned, the attempt fails silently and
    /// the caller proceeds without admitting a fresh slot (favor
    /// progress over strict residency).
    fn evict_one(&self, inner: &mut BufferPoolInner) -> bool {
        let victim_index = inner.lru.iter().position(|path| {
            inner
                .pages
                .get(path)
                .map(|p| p.lock().unwrap().pin_count == 0)
                .unwrap_or(true)
        });

        let Some(index) = victim_index else {
            warn!("buffer pool at capacity, but every resident page is pinned");
            return false;
        };

        let victim_path = inner.lru.remove(index).unwrap();
        if let Some(page_handle) = inner.pages.remove(&victim_path) {
            let page = page_handle.lock().unwrap();
            if page.is_dirty {
                let disk_path = self.disk_path(&victim_path);
                if let Err(e) = self.write_page_to_disk(&disk_path, &page) {
                    warn!("failed to flush evicted page {:?}: {}", victim_path, e);
                }
            }
            debug!("evicted page {:?}", victim_path);
        }
        true
    }

    fn write_page_to_disk(&self, disk_path: &Path, page: &PhysicalPage) -> StorageResult<()> {
        if !disk_path.exists() {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .open(disk_path)?;
            file.write_all(page.as_bytes())?;
            return Ok(());
        }

        let file = OpenOptions::new().read(true).write(true).open(disk_path)?;
        file.set_len(PAGE_SIZE as u64)?;
        let mut mmap = unsafe { MmapMut::map_mut(&file)? };
        mmap.copy_from_slice(page.as_bytes());
        mmap.flush()?;
        Ok(())
    }

    /// Fetch all `num_cols` physical pages (metadata + user columns)
    /// that make up one logical page.
    pub fn get_logical_page(
        &self,
        table: &str,
        page_range: usize,
        page: usize,
        num_cols: usize,
    ) -> StorageResult<Vec<Arc<Mutex<PhysicalPage>>>> {
        (0..num_cols)
            .map(|col| self.get_physical_page(&PagePath::new(table, page_range, page, col)))
            .collect()
    }

    pub fn pin_page(&self, table: &str, page_range: usize, page: usize, num_cols: usize) {
        for col in 0..num_cols {
            if let Ok(p) = self.get_physical_page(&PagePath::new(table, page_range, page, col)) {
                p.lock().unwrap().pin_count += 1;
            }
        }
    }

    pub fn unpin_page(&self, table: &str, page_range: usize, page: usize, num_cols: usize) {
        for col in 0..num_cols {
            if let Ok(p) = self.get_physical_page(&PagePath::new(table, page_range, page, col)) {
                let mut p = p.lock().unwrap();
                if p.pin_count > 0 {
                    p.pin_count -= 1;
                }
            }
        }
    }

    /// Atomically replace the on-disk contents of `path` with `page`,
    /// via write-to-temp-then-rename, and drop any cached entry so the
    /// next fetch re-reads the new bytes. Used by the merge engine:
    /// readers holding an already-opened mmap over the old file keep
    /// seeing the old bytes until they re-fetch, so merge never
    /// corrupts an in-flight read.
    pub fn replace_page_atomically(&self, path: &PagePath, page: &PhysicalPage) -> StorageResult<()> {
        let disk_path = self.disk_path(path);
        if let Some(parent) = disk_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = disk_path.with_extension("tmp");
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            file.write_all(page.as_bytes())?;
        }
        fs::rename(&tmp_path, &disk_path)?;

        let mut inner = self.inner.lock().unwrap();
        inner.pages.remove(path);
        inner.lru.retain(|p| p != path);
        Ok(())
    }

    /// Write every dirty page back to disk and empty the pool.
    pub fn flush(&self) -> StorageResult<()> {
        let mut inner = self.inner.lock().unwrap();
        for (path, page_handle) in inner.pages.iter() {
            let page = page_handle.lock().unwrap();
            if page.is_dirty {
                let disk_path = self.disk_path(path);
                self.write_page_to_disk(&disk_path, &page)?;
            }
        }
        inner.pages.clear();
        inner.lru.clear();
        Ok(())
    }

    pub fn resident_count(&self) -> usize {
        self.inner.lock().unwrap().pages.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn pool(cap: usize) -> (tempfile::TempDir, BufferPool) {
        let dir = tempdir().unwrap();
        let pool = BufferPool::new(dir.path(), cap);
        (dir, pool)
    }

    #[test]
    fn create_then_fetch_round_trips_values() {
        let (_dir, pool) = pool(8);
        let path = PagePath::new("t", 0, 0, 0);
        let page = pool.create_physical_page(&path).unwrap();
        page.lock().unwrap().write(7, 2);
        pool.flush().unwrap();

        let refetched = pool.get_physical_page(&path).unwrap();
        assert_eq!(refetched.lock().unwrap().read(2), 7);
    }

    #[test]
    fn eviction_only_picks_unpinned_pages() {
        let (_dir, pool) = pool(1);
        let p0 = PagePath::new("t", 0, 0, 0);
        let p1 = PagePath::new("t", 0, 0, 1);

        let h0 = pool.create_physical_page(&p0).unwrap();
        h0.lock().unwrap().pin_count = 1;

        // Pool capacity is 1 and p0 is pinned; admitting p1 must not
        // evict it, and p1 proceeds uncached rather than growing the
        // pool past capacity.
        let h1 = pool.create_physical_page(&p1).unwrap();
        assert_eq!(h1.lock().unwrap().num_records(), 0);
        assert_eq!(pool.resident_count(), 1);
        assert_eq!(h0.lock().unwrap().pin_count, 1);
    }

    #[test]
    fn pin_unpin_round_trips_to_original_count() {
        let (_dir, pool) = pool(8);
        let num_cols = 2;
        pool.create_physical_page(&PagePath::new("t", 0, 0, 0)).unwrap();
        pool.create_physical_page(&PagePath::new("t", 0, 0, 1)).unwrap();

        pool.pin_page("t", 0, 0, num_cols);
        pool.pin_page("t", 0, 0, num_cols);
        pool.unpin_page("t", 0, 0, num_cols);
        pool.unpin_page("t", 0, 0, num_cols);

        let p = pool.get_physical_page(&PagePath::new("t", 0, 0, 0)).unwrap();
        assert_eq!(p.lock().unwrap().pin_count, 0);
    }
}
