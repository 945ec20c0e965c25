use alloc::sync::Arc;

use spin::Mutex;
use vfs::fd_table::FdTable;
use vfs_core::Vnode;

/// The process context every VFS entry point runs under. Owns one
/// reference to its namespace root, one to its working directory, and the
/// descriptor table.
pub struct Task {
    pid: usize,
    /// Filesystem root this task resolves absolute paths against.
    root: Arc<dyn Vnode>,
    /// Current working directory; the base for relative paths.
    cwd: Mutex<Arc<dyn Vnode>>,
    fd_table: Mutex<FdTable>,
}

impl Task {
    pub fn new(pid: usize, root: Arc<dyn Vnode>, cwd: Arc<dyn Vnode>) -> Arc<Self> {
        Arc::new(Self {
            pid,
            root,
            cwd: Mutex::new(cwd),
            fd_table: Mutex::new(FdTable::new()),
        })
    }

    pub fn pid(&self) -> usize {
        self.pid
    }

    pub fn root(&self) -> Arc<dyn Vnode> {
        self.root.clone()
    }

    pub fn cwd(&self) -> Arc<dyn Vnode> {
        self.cwd.lock().clone()
    }

    /// Replace the working directory. The old reference is released in the
    /// same step the new one is installed.
    pub fn set_cwd(&self, dir: Arc<dyn Vnode>) {
        *self.cwd.lock() = dir;
    }

    pub fn with_fd_table<T>(&self, f: impl FnOnce(&FdTable) -> T) -> T {
        f(&self.fd_table.lock())
    }

    pub fn with_mut_fd_table<T>(&self, f: impl FnOnce(&mut FdTable) -> T) -> T {
        f(&mut self.fd_table.lock())
    }
}
