//! Process-wide pager registry
//!
//! Connections opened on the same file inside one process share a single
//! pager, so they see each other's commits and contend for one write slot.
//! The registry is created on first use and holds only weak references; a
//! pager goes away with its last connection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use super::error::{EngineError, EngineResult};
use super::pager::{Pager, PagerOptions};

static PAGERS: OnceLock<Mutex<HashMap<PathBuf, Weak<Pager>>>> = OnceLock::new();

fn pagers() -> &'static Mutex<HashMap<PathBuf, Weak<Pager>>> {
    PAGERS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Open (or join) the pager for `path`; `None` gives a private in-memory pager
pub fn open_pager(path: Option<&Path>, options: PagerOptions) -> EngineResult<Arc<Pager>> {
    let path = match path {
        Some(path) => path,
        None => return Ok(Arc::new(Pager::open(None, options)?)),
    };
    let key = canonical_path(path)?;

    let mut pagers = pagers().lock();
    pagers.retain(|_, pager| pager.strong_count() > 0);

    if let Some(existing) = pagers.get(&key).and_then(Weak::upgrade) {
        if !options.read_only && !existing.is_writable() {
            return Err(EngineError::Busy(format!(
                "{} is already open read-only in this process",
                key.display()
            )));
        }
        return Ok(existing);
    }

    let pager = Arc::new(Pager::open(Some(&key), options)?);
    pagers.insert(key, Arc::downgrade(&pager));
    Ok(pager)
}

/// Number of files with a live pager
pub fn open_pager_count() -> usize {
    pagers().lock().values().filter(|p| p.strong_count() > 0).count()
}

/// Absolute path, resolved through the parent directory when the file does
/// not exist yet
fn canonical_path(path: &Path) -> EngineResult<PathBuf> {
    if let Ok(resolved) = path.canonicalize() {
        return Ok(resolved);
    }
    let name = path
        .file_name()
        .ok_or_else(|| EngineError::Misuse(format!("{} is not a file path", path.display())))?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.canonicalize()?,
        _ => std::env::current_dir()?,
    };
    Ok(parent.join(name))
}
