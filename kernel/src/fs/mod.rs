use alloc::sync::Arc;

use systype::SysResult;
use vfs::fd_table::{FdFlags, FdInfo};
use vfs_core::{File, OpenFlags, Vnode};

use crate::task::Task;

/// Mount the root filesystem and build the init task on top of it.
pub fn init() -> SysResult<Arc<Task>> {
    let root = vfs::init_filesystem()?;
    log::info!("[fs] root filesystem mounted");
    Ok(Task::new(1, root.clone(), root))
}

/// Seed descriptors 0..=2 of `task` with the console vnode: stdin opened
/// for reading, stdout and stderr for writing.
pub fn install_stdio(task: &Task, console: Arc<dyn Vnode>) -> SysResult<()> {
    let stdin = File::open(console.clone(), OpenFlags::O_RDONLY)?;
    let stdout = File::open(console.clone(), OpenFlags::O_WRONLY)?;
    let stderr = File::open(console, OpenFlags::O_WRONLY)?;
    task.with_mut_fd_table(|table| {
        table.put(0, FdInfo::new(stdin, FdFlags::empty()))?;
        table.put(1, FdInfo::new(stdout, FdFlags::empty()))?;
        table.put(2, FdInfo::new(stderr, FdFlags::empty()))
    })
}
