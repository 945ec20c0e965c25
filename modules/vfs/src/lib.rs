#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod fd_table;
pub mod ramfs;

use alloc::{collections::BTreeMap, string::String, sync::Arc};

use spin::{Mutex, Once};
use systype::SysResult;
use vfs_core::{FileSystemType, MountFlags, Vnode};

use crate::ramfs::RamFsType;

/// Registered filesystem types, keyed by name.
pub static FS_TYPES: Mutex<BTreeMap<String, Arc<dyn FileSystemType>>> = Mutex::new(BTreeMap::new());

static ROOT_VNODE: Once<Arc<dyn Vnode>> = Once::new();

fn register_all_fs() {
    let ramfs: Arc<dyn FileSystemType> = RamFsType::new();
    FS_TYPES.lock().insert(ramfs.name_string(), ramfs);

    log::info!("[vfs] register fs success");
}

/// Mount the root filesystem and publish its root vnode. Idempotent; later
/// calls return the root mounted by the first.
pub fn init_filesystem() -> SysResult<Arc<dyn Vnode>> {
    if let Some(root) = ROOT_VNODE.get() {
        return Ok(root.clone());
    }
    register_all_fs();
    let ramfs = FS_TYPES.lock().get("ramfs").unwrap().clone();
    let root = ramfs.mount("/", MountFlags::empty(), None)?;
    ROOT_VNODE.call_once(|| root.clone());
    Ok(root)
}

/// Root vnode of the mounted filesystem tree.
pub fn sys_root_vnode() -> Arc<dyn Vnode> {
    ROOT_VNODE.get().unwrap().clone()
}
