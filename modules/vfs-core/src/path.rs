use alloc::{
    string::{String, ToString},
    sync::Arc,
};

use config::fs::NAME_MAX;
use systype::{SysError, SysResult};

use crate::{OpenFlags, Vnode};

/// A pathname to resolve, together with the vnodes resolution starts from.
///
/// Resolution holds exactly one reference to the directory it is currently
/// standing in; that reference moves forward with each resolved component
/// and is transferred to the caller on success or dropped on any error.
pub struct Path {
    /// Filesystem root, where absolute paths start.
    root: Arc<dyn Vnode>,
    /// Directory relative paths start from.
    start: Arc<dyn Vnode>,
    /// The path to resolve.
    path: String,
}

impl Path {
    pub fn new(root: Arc<dyn Vnode>, start: Arc<dyn Vnode>, path: &str) -> Self {
        Self {
            root,
            start,
            path: path.to_string(),
        }
    }

    /// Resolve every component but the last.
    ///
    /// Returns the parent directory vnode and the basename. The basename is
    /// empty when the path refers to a directory itself: `"/"`, or any path
    /// with a trailing slash. The basename is not looked up here; the
    /// caller decides whether it must exist.
    pub fn walk_parent(&self) -> SysResult<(Arc<dyn Vnode>, &str)> {
        if self.path.is_empty() {
            return Err(SysError::ENOENT);
        }
        let mut current = if is_absolute_path(&self.path) {
            self.root.clone()
        } else {
            self.start.clone()
        };
        let mut rest = self.path.trim_start_matches('/');
        loop {
            match rest.find('/') {
                None => {
                    // `rest` is the basename
                    if rest.len() > NAME_MAX {
                        return Err(SysError::ENAMETOOLONG);
                    }
                    return Ok((current, rest));
                }
                Some(i) => {
                    let name = &rest[..i];
                    let tail = rest[i + 1..].trim_start_matches('/');
                    current = match current.lookup(name) {
                        Ok(next) => next,
                        Err(e) => {
                            log::warn!(
                                "[Path::walk_parent] {e:?} when walking in path {}",
                                self.path
                            );
                            return Err(e);
                        }
                    };
                    if tail.is_empty() {
                        // trailing slash: the path names this directory
                        return Ok((current, ""));
                    }
                    rest = tail;
                }
            }
        }
    }

    /// Resolve the whole path to a vnode.
    ///
    /// With `O_CREAT`, a missing final component is created as a regular
    /// file in its parent; with `O_CREAT | O_EXCL`, an existing final
    /// component is an error.
    pub fn walk_open(&self, flags: OpenFlags) -> SysResult<Arc<dyn Vnode>> {
        let (parent, name) = self.walk_parent()?;
        match parent.lookup(name) {
            Ok(vnode) => {
                if flags.contains(OpenFlags::O_CREAT) && flags.contains(OpenFlags::O_EXCL) {
                    return Err(SysError::EEXIST);
                }
                Ok(vnode)
            }
            Err(SysError::ENOENT) if flags.contains(OpenFlags::O_CREAT) => parent.create(name),
            Err(e) => Err(e),
        }
    }
}

pub fn is_absolute_path(path: &str) -> bool {
    path.starts_with('/')
}
