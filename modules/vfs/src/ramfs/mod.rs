use alloc::sync::Arc;

use device_core::BlockDevice;
use systype::SysResult;
use vfs_core::{
    FileSystemType, FileSystemTypeMeta, MountFlags, SuperBlock, SuperBlockMeta, Vnode,
};

mod vnode;

pub use self::vnode::{RamDevVnode, RamDirVnode, RamFileVnode};

/// An entirely in-memory filesystem. Backs the root mount at boot and the
/// test suites; nothing survives power-off.
pub struct RamFsType {
    meta: FileSystemTypeMeta,
}

impl RamFsType {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            meta: FileSystemTypeMeta::new("ramfs"),
        })
    }
}

impl FileSystemType for RamFsType {
    fn meta(&self) -> &FileSystemTypeMeta {
        &self.meta
    }

    fn base_mount(
        self: Arc<Self>,
        abs_mount_path: &str,
        _flags: MountFlags,
        dev: Option<Arc<dyn BlockDevice>>,
    ) -> SysResult<Arc<dyn Vnode>> {
        let sb = Arc::new(RamSuperBlock {
            meta: SuperBlockMeta::new(dev, self.clone()),
        });
        let root = RamDirVnode::new_root(sb.clone());
        sb.set_root_vnode(root.clone());
        self.insert_sb(abs_mount_path, sb);
        log::debug!("[ramfs] mounted at {abs_mount_path}");
        Ok(root)
    }

    fn kill_sb(&self, sb: Arc<dyn SuperBlock>) -> SysResult<()> {
        self.meta
            .supers
            .lock()
            .retain(|_, entry| !Arc::ptr_eq(entry, &sb));
        Ok(())
    }
}

pub struct RamSuperBlock {
    meta: SuperBlockMeta,
}

impl SuperBlock for RamSuperBlock {
    fn meta(&self) -> &SuperBlockMeta {
        &self.meta
    }
}
