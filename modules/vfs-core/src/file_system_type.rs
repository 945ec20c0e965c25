use alloc::{
    collections::BTreeMap,
    string::{String, ToString},
    sync::Arc,
};

use device_core::BlockDevice;
use systype::{SysError, SysResult};

use crate::{MountFlags, Mutex, SuperBlock, Vnode};

pub struct FileSystemTypeMeta {
    /// Name of this file system type.
    name: String,
    /// Mounted instances, keyed by mount path.
    pub supers: Mutex<BTreeMap<String, Arc<dyn SuperBlock>>>,
}

impl FileSystemTypeMeta {
    pub fn new(name: &str) -> FileSystemTypeMeta {
        Self {
            name: name.to_string(),
            supers: Mutex::new(BTreeMap::new()),
        }
    }
}

pub trait FileSystemType: Send + Sync {
    fn meta(&self) -> &FileSystemTypeMeta;

    /// Called when a new instance of this filesystem should be mounted.
    /// Returns the root vnode of the new instance.
    // NOTE: `self` cannot be `&Arc<Self>` for object safety
    fn base_mount(
        self: Arc<Self>,
        abs_mount_path: &str,
        flags: MountFlags,
        dev: Option<Arc<dyn BlockDevice>>,
    ) -> SysResult<Arc<dyn Vnode>>;

    /// Called when an instance of this filesystem should be shut down.
    fn kill_sb(&self, sb: Arc<dyn SuperBlock>) -> SysResult<()>;

    fn insert_sb(&self, abs_mount_path: &str, super_block: Arc<dyn SuperBlock>) {
        self.meta()
            .supers
            .lock()
            .insert(abs_mount_path.to_string(), super_block);
    }

    fn name(&self) -> &str {
        &self.meta().name
    }

    fn name_string(&self) -> String {
        self.meta().name.to_string()
    }
}

impl dyn FileSystemType {
    pub fn mount(
        self: &Arc<Self>,
        abs_mount_path: &str,
        flags: MountFlags,
        dev: Option<Arc<dyn BlockDevice>>,
    ) -> SysResult<Arc<dyn Vnode>> {
        self.clone().base_mount(abs_mount_path, flags, dev)
    }

    pub fn get_sb(&self, abs_mount_path: &str) -> SysResult<Arc<dyn SuperBlock>> {
        self.meta()
            .supers
            .lock()
            .get(abs_mount_path)
            .cloned()
            .ok_or(SysError::ENOENT)
    }
}
