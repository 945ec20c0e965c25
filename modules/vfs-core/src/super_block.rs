use alloc::sync::{Arc, Weak};
use core::sync::atomic::{AtomicU64, Ordering};

use config::fs::BLOCK_SIZE;
use device_core::BlockDevice;
use spin::Once;
use systype::SysResult;

use crate::{FileSystemType, Vnode};

static SUPER_BLOCK_ID: AtomicU64 = AtomicU64::new(1);

pub struct SuperBlockMeta {
    /// Filesystem instance id, reported as `st_dev`.
    pub dev: u64,
    /// Block device that holds this filesystem, if it has one.
    pub device: Option<Arc<dyn BlockDevice>>,
    /// Size of a filesystem block in bytes.
    pub block_size: usize,
    /// File system type.
    pub fs_type: Weak<dyn FileSystemType>,
    /// Root vnode, set once when the filesystem is mounted.
    pub root: Once<Arc<dyn Vnode>>,
}

impl SuperBlockMeta {
    pub fn new(device: Option<Arc<dyn BlockDevice>>, fs_type: Arc<dyn FileSystemType>) -> Self {
        let block_size = device.as_ref().map_or(BLOCK_SIZE, |dev| dev.block_size());
        Self {
            dev: SUPER_BLOCK_ID.fetch_add(1, Ordering::Relaxed),
            device,
            block_size,
            fs_type: Arc::downgrade(&fs_type),
            root: Once::new(),
        }
    }
}

pub trait SuperBlock: Send + Sync {
    /// Get metadata of this super block.
    fn meta(&self) -> &SuperBlockMeta;

    /// Called when the VFS is writing out all dirty data associated with a
    /// superblock.
    fn sync_fs(&self) -> SysResult<()> {
        Ok(())
    }

    fn set_root_vnode(&self, root: Arc<dyn Vnode>) {
        self.meta().root.call_once(|| root);
    }
}

impl dyn SuperBlock {
    /// Get the file system type of this super block.
    pub fn fs_type(&self) -> Arc<dyn FileSystemType> {
        self.meta().fs_type.upgrade().unwrap()
    }

    /// Get the root vnode.
    pub fn root_vnode(&self) -> Arc<dyn Vnode> {
        self.meta().root.get().unwrap().clone()
    }

    pub fn dev(&self) -> u64 {
        self.meta().dev
    }
}
