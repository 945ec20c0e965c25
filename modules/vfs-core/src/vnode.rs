use alloc::sync::{Arc, Weak};

use config::fs::NAME_MAX;
use device_core::DevId;
use downcast_rs::{impl_downcast, DowncastSync};
use systype::{SysError, SysResult};

use crate::{alloc_ino, DirEntry, Mutex, Stat, SuperBlock, TimeSpec};

pub struct VnodeMeta {
    /// Inode number.
    pub ino: usize,
    /// Mode of the underlying inode. Fixed for the lifetime of the vnode.
    pub mode: InodeMode,
    /// Device identity, for character- and block-special vnodes.
    pub dev_id: Option<DevId>,
    pub super_block: Weak<dyn SuperBlock>,

    pub inner: Mutex<VnodeMetaInner>,
}

pub struct VnodeMetaInner {
    /// Size of the file in bytes.
    pub size: usize,
    /// Number of hard links.
    pub nlink: usize,
    /// Last access time.
    pub atime: TimeSpec,
    /// Last modification time.
    pub mtime: TimeSpec,
    /// Last status change time.
    pub ctime: TimeSpec,
}

impl VnodeMeta {
    pub fn new(mode: InodeMode, super_block: Arc<dyn SuperBlock>, size: usize) -> Self {
        Self {
            ino: alloc_ino(),
            mode,
            dev_id: None,
            super_block: Arc::downgrade(&super_block),
            inner: Mutex::new(VnodeMetaInner {
                size,
                nlink: 1,
                atime: TimeSpec::default(),
                mtime: TimeSpec::default(),
                ctime: TimeSpec::default(),
            }),
        }
    }

    pub fn with_dev_id(mut self, dev_id: DevId) -> Self {
        self.dev_id = Some(dev_id);
        self
    }
}

/// In-memory handle for one inode, and the dispatch point for every
/// filesystem operation.
///
/// Operations a vnode kind does not support keep the default body, which
/// reports the error an absent operation must raise: directory ops fail
/// `ENOTDIR`, data ops fail `EISDIR`. The checked wrappers on `dyn Vnode`
/// are the only call sites the upper layers use.
pub trait Vnode: Send + Sync + DowncastSync {
    fn meta(&self) -> &VnodeMeta;

    /// Fill a stat record for this inode.
    fn get_attr(&self) -> SysResult<Stat>;

    /// Find the child named `name` in this directory.
    fn base_lookup(self: Arc<Self>, _name: &str) -> SysResult<Arc<dyn Vnode>> {
        Err(SysError::ENOTDIR)
    }

    /// Create a regular file named `name` in this directory.
    fn base_create(self: Arc<Self>, _name: &str) -> SysResult<Arc<dyn Vnode>> {
        Err(SysError::ENOTDIR)
    }

    /// Create a device-special file named `name` in this directory.
    fn base_mknod(
        self: Arc<Self>,
        _name: &str,
        _mode: InodeMode,
        _dev_id: DevId,
    ) -> SysResult<Arc<dyn Vnode>> {
        Err(SysError::ENOTDIR)
    }

    /// Create a subdirectory named `name` in this directory.
    fn base_mkdir(self: Arc<Self>, _name: &str) -> SysResult<Arc<dyn Vnode>> {
        Err(SysError::ENOTDIR)
    }

    /// Remove the empty subdirectory named `name`.
    fn base_rmdir(&self, _name: &str) -> SysResult<()> {
        Err(SysError::ENOTDIR)
    }

    /// Remove the non-directory entry named `name`.
    fn base_unlink(&self, _name: &str) -> SysResult<()> {
        Err(SysError::ENOTDIR)
    }

    /// Link `src` into this directory under `name`.
    fn base_link(&self, _name: &str, _src: Arc<dyn Vnode>) -> SysResult<()> {
        Err(SysError::ENOTDIR)
    }

    fn base_read(&self, _offset: usize, _buf: &mut [u8]) -> SysResult<usize> {
        Err(SysError::EISDIR)
    }

    fn base_write(&self, _offset: usize, _buf: &[u8]) -> SysResult<usize> {
        Err(SysError::EISDIR)
    }

    /// Read the directory entry at position `pos`; `None` at end.
    fn base_read_dir(&self, _pos: usize) -> SysResult<Option<DirEntry>> {
        Err(SysError::ENOTDIR)
    }

    fn base_truncate(&self, _len: usize) -> SysResult<()> {
        Err(SysError::EINVAL)
    }
}

impl_downcast!(sync Vnode);

impl core::fmt::Debug for dyn Vnode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Vnode")
            .field("ino", &self.meta().ino)
            .field("mode", &self.meta().mode)
            .finish()
    }
}

impl dyn Vnode {
    pub fn ino(&self) -> usize {
        self.meta().ino
    }

    pub fn itype(&self) -> InodeType {
        self.meta().mode.to_type()
    }

    pub fn dev_id(&self) -> Option<DevId> {
        self.meta().dev_id
    }

    pub fn size(&self) -> usize {
        self.meta().inner.lock().size
    }

    pub fn set_size(&self, size: usize) {
        self.meta().inner.lock().size = size;
    }

    pub fn nlink(&self) -> usize {
        self.meta().inner.lock().nlink
    }

    pub fn inc_nlink(&self) {
        self.meta().inner.lock().nlink += 1;
    }

    pub fn dec_nlink(&self) {
        let mut inner = self.meta().inner.lock();
        inner.nlink = inner.nlink.saturating_sub(1);
    }

    pub fn super_block(&self) -> Arc<dyn SuperBlock> {
        self.meta().super_block.upgrade().unwrap()
    }

    /// Checked lookup. Enforces that `self` is a directory and that `name`
    /// is within bounds; an empty name refers to the directory itself.
    pub fn lookup(self: &Arc<Self>, name: &str) -> SysResult<Arc<dyn Vnode>> {
        self.dir_op_check(name)?;
        if name.is_empty() {
            return Ok(self.clone());
        }
        self.clone().base_lookup(name)
    }

    /// Checked create. Called only after a lookup of `name` reported
    /// `ENOENT`.
    pub fn create(self: &Arc<Self>, name: &str) -> SysResult<Arc<dyn Vnode>> {
        self.dir_op_check(name)?;
        self.clone().base_create(name)
    }

    pub fn mknod(
        self: &Arc<Self>,
        name: &str,
        mode: InodeMode,
        dev_id: DevId,
    ) -> SysResult<Arc<dyn Vnode>> {
        self.dir_op_check(name)?;
        self.clone().base_mknod(name, mode, dev_id)
    }

    pub fn mkdir(self: &Arc<Self>, name: &str) -> SysResult<Arc<dyn Vnode>> {
        self.dir_op_check(name)?;
        self.clone().base_mkdir(name)
    }

    pub fn rmdir(self: &Arc<Self>, name: &str) -> SysResult<()> {
        self.dir_op_check(name)?;
        self.base_rmdir(name)
    }

    pub fn unlink(self: &Arc<Self>, name: &str) -> SysResult<()> {
        self.dir_op_check(name)?;
        self.base_unlink(name)
    }

    pub fn link(self: &Arc<Self>, name: &str, src: Arc<dyn Vnode>) -> SysResult<()> {
        self.dir_op_check(name)?;
        self.base_link(name, src)
    }

    pub fn truncate(&self, len: usize) -> SysResult<()> {
        self.base_truncate(len)
    }

    fn dir_op_check(&self, name: &str) -> SysResult<()> {
        if !self.itype().is_dir() {
            return Err(SysError::ENOTDIR);
        }
        if name.len() > NAME_MAX {
            return Err(SysError::ENAMETOOLONG);
        }
        Ok(())
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, Eq, PartialEq)]
    pub struct InodeMode: u32 {
        /// Type.
        const TYPE_MASK = 0o170000;
        /// Character device.
        const CHAR  = 0o020000;
        /// Directory.
        const DIR   = 0o040000;
        /// Block device.
        const BLOCK = 0o060000;
        /// Regular file.
        const FILE  = 0o100000;

        /// Read, write, execute/search by owner.
        const OWNER_MASK = 0o700;
        /// Read permission, owner.
        const OWNER_READ = 0o400;
        /// Write permission, owner.
        const OWNER_WRITE = 0o200;
        /// Execute/search permission, owner.
        const OWNER_EXEC = 0o100;

        /// Read, write, execute/search by group.
        const GROUP_MASK = 0o70;
        /// Read permission, group.
        const GROUP_READ = 0o40;
        /// Write permission, group.
        const GROUP_WRITE = 0o20;
        /// Execute/search permission, group.
        const GROUP_EXEC = 0o10;

        /// Read, write, execute/search by others.
        const OTHER_MASK = 0o7;
        /// Read permission, others.
        const OTHER_READ = 0o4;
        /// Write permission, others.
        const OTHER_WRITE = 0o2;
        /// Execute/search permission, others.
        const OTHER_EXEC = 0o1;
    }
}

impl InodeMode {
    pub fn to_type(&self) -> InodeType {
        (*self).into()
    }

    pub fn from_type(itype: InodeType) -> Self {
        let perm_mode = InodeMode::OWNER_READ | InodeMode::OWNER_WRITE | InodeMode::OTHER_EXEC;
        let file_mode = match itype {
            InodeType::Dir => InodeMode::DIR,
            InodeType::File => InodeMode::FILE,
            InodeType::CharDevice => InodeMode::CHAR,
            InodeType::BlockDevice => InodeMode::BLOCK,
            InodeType::Unknown => InodeMode::TYPE_MASK,
        };
        file_mode | perm_mode
    }
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
#[repr(u8)]
pub enum InodeType {
    #[default]
    Unknown = 0,
    CharDevice = 0o2,
    Dir = 0o4,
    BlockDevice = 0o6,
    File = 0o10,
}

impl From<InodeMode> for InodeType {
    fn from(mode: InodeMode) -> Self {
        match mode.intersection(InodeMode::TYPE_MASK) {
            InodeMode::DIR => InodeType::Dir,
            InodeMode::FILE => InodeType::File,
            InodeMode::CHAR => InodeType::CharDevice,
            InodeMode::BLOCK => InodeType::BlockDevice,
            _ => InodeType::Unknown,
        }
    }
}

impl InodeType {
    /// Tests whether this node type represents a regular file.
    pub const fn is_file(self) -> bool {
        matches!(self, Self::File)
    }

    /// Tests whether this node type represents a directory.
    pub const fn is_dir(self) -> bool {
        matches!(self, Self::Dir)
    }

    /// Returns `true` if this node type is a block device.
    pub const fn is_block_device(self) -> bool {
        matches!(self, Self::BlockDevice)
    }

    /// Returns `true` if this node type is a char device.
    pub const fn is_char_device(self) -> bool {
        matches!(self, Self::CharDevice)
    }

    /// Returns `true` if this node type is either kind of device-special
    /// file.
    pub const fn is_device(self) -> bool {
        self.is_char_device() || self.is_block_device()
    }
}
