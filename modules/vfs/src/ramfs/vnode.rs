use alloc::{
    collections::BTreeMap,
    string::{String, ToString},
    sync::{Arc, Weak},
    vec::Vec,
};

use device_core::DevId;
use spin::Mutex;
use systype::{SysError, SysResult};
use vfs_core::{DirEntry, InodeMode, InodeType, Stat, SuperBlock, Vnode, VnodeMeta};

fn ram_stat(meta: &VnodeMeta) -> Stat {
    let (dev, blksize) = meta
        .super_block
        .upgrade()
        .map_or((0, 512), |sb| (sb.dev(), sb.meta().block_size));
    let inner = meta.inner.lock();
    Stat {
        st_dev: dev,
        st_ino: meta.ino as u64,
        st_mode: meta.mode.bits(),
        st_nlink: inner.nlink as u32,
        st_uid: 0,
        st_gid: 0,
        st_rdev: meta.dev_id.map_or(0, u64::from),
        __pad: 0,
        st_size: inner.size as u64,
        st_blksize: blksize as u32,
        __pad2: 0,
        st_blocks: (inner.size / blksize) as u64,
        st_atime: inner.atime,
        st_mtime: inner.mtime,
        st_ctime: inner.ctime,
        unused: 0,
    }
}

/// Directory vnode. Children live in a sorted map, so readdir order is
/// stable across repeated walks.
pub struct RamDirVnode {
    meta: VnodeMeta,
    /// `..`; the root directory points at itself.
    parent: Weak<RamDirVnode>,
    children: Mutex<BTreeMap<String, Arc<dyn Vnode>>>,
}

impl RamDirVnode {
    pub fn new_root(super_block: Arc<dyn SuperBlock>) -> Arc<Self> {
        let root = Arc::new_cyclic(|weak: &Weak<RamDirVnode>| Self {
            meta: VnodeMeta::new(InodeMode::from_type(InodeType::Dir), super_block, 0),
            parent: weak.clone(),
            children: Mutex::new(BTreeMap::new()),
        });
        // `.` and the self link
        root.meta.inner.lock().nlink = 2;
        root
    }

    fn new(super_block: Arc<dyn SuperBlock>, parent: &Arc<RamDirVnode>) -> Arc<Self> {
        let dir = Arc::new(Self {
            meta: VnodeMeta::new(InodeMode::from_type(InodeType::Dir), super_block, 0),
            parent: Arc::downgrade(parent),
            children: Mutex::new(BTreeMap::new()),
        });
        dir.meta.inner.lock().nlink = 2;
        dir
    }

    fn sb(&self) -> Arc<dyn SuperBlock> {
        self.meta.super_block.upgrade().unwrap()
    }
}

impl Vnode for RamDirVnode {
    fn meta(&self) -> &VnodeMeta {
        &self.meta
    }

    fn get_attr(&self) -> SysResult<Stat> {
        Ok(ram_stat(&self.meta))
    }

    fn base_lookup(self: Arc<Self>, name: &str) -> SysResult<Arc<dyn Vnode>> {
        match name {
            "." => Ok(self),
            ".." => Ok(self.parent.upgrade().unwrap()),
            _ => self
                .children
                .lock()
                .get(name)
                .cloned()
                .ok_or(SysError::ENOENT),
        }
    }

    fn base_create(self: Arc<Self>, name: &str) -> SysResult<Arc<dyn Vnode>> {
        let mut children = self.children.lock();
        if children.contains_key(name) {
            return Err(SysError::EEXIST);
        }
        let file = RamFileVnode::new(self.sb());
        children.insert(name.to_string(), file.clone() as Arc<dyn Vnode>);
        Ok(file)
    }

    fn base_mknod(
        self: Arc<Self>,
        name: &str,
        mode: InodeMode,
        dev_id: DevId,
    ) -> SysResult<Arc<dyn Vnode>> {
        if !mode.to_type().is_device() {
            return Err(SysError::EINVAL);
        }
        let mut children = self.children.lock();
        if children.contains_key(name) {
            return Err(SysError::EEXIST);
        }
        let node = RamDevVnode::new(self.sb(), mode, dev_id);
        children.insert(name.to_string(), node.clone() as Arc<dyn Vnode>);
        Ok(node)
    }

    fn base_mkdir(self: Arc<Self>, name: &str) -> SysResult<Arc<dyn Vnode>> {
        let mut children = self.children.lock();
        if children.contains_key(name) {
            return Err(SysError::EEXIST);
        }
        let dir = RamDirVnode::new(self.sb(), &self);
        children.insert(name.to_string(), dir.clone() as Arc<dyn Vnode>);
        drop(children);
        // the child's `..`
        self.meta.inner.lock().nlink += 1;
        Ok(dir)
    }

    fn base_rmdir(&self, name: &str) -> SysResult<()> {
        let mut children = self.children.lock();
        let child = children.get(name).ok_or(SysError::ENOENT)?;
        let dir = child
            .clone()
            .downcast_arc::<RamDirVnode>()
            .map_err(|_| SysError::ENOTDIR)?;
        if !dir.children.lock().is_empty() {
            return Err(SysError::ENOTEMPTY);
        }
        children.remove(name);
        drop(children);
        dir.meta.inner.lock().nlink = 0;
        let mut inner = self.meta.inner.lock();
        inner.nlink = inner.nlink.saturating_sub(1);
        Ok(())
    }

    fn base_unlink(&self, name: &str) -> SysResult<()> {
        let mut children = self.children.lock();
        let child = children.get(name).ok_or(SysError::ENOENT)?;
        if child.itype().is_dir() {
            return Err(SysError::EISDIR);
        }
        let child = children.remove(name).unwrap();
        drop(children);
        child.dec_nlink();
        Ok(())
    }

    fn base_link(&self, name: &str, src: Arc<dyn Vnode>) -> SysResult<()> {
        if src.itype().is_dir() {
            return Err(SysError::EPERM);
        }
        let mut children = self.children.lock();
        if children.contains_key(name) {
            return Err(SysError::EEXIST);
        }
        src.inc_nlink();
        children.insert(name.to_string(), src);
        Ok(())
    }

    fn base_read_dir(&self, pos: usize) -> SysResult<Option<DirEntry>> {
        let entry = match pos {
            0 => Some(DirEntry {
                ino: self.meta.ino as u64,
                off: 1,
                itype: InodeType::Dir,
                name: ".".to_string(),
            }),
            1 => Some(DirEntry {
                ino: self.parent.upgrade().unwrap().meta.ino as u64,
                off: 2,
                itype: InodeType::Dir,
                name: "..".to_string(),
            }),
            _ => self.children.lock().iter().nth(pos - 2).map(|(name, child)| DirEntry {
                ino: child.ino() as u64,
                off: pos as u64 + 1,
                itype: child.itype(),
                name: name.clone(),
            }),
        };
        Ok(entry)
    }
}

/// Regular file vnode; contents live in one contiguous buffer.
pub struct RamFileVnode {
    meta: VnodeMeta,
    data: Mutex<Vec<u8>>,
}

impl RamFileVnode {
    fn new(super_block: Arc<dyn SuperBlock>) -> Arc<Self> {
        Arc::new(Self {
            meta: VnodeMeta::new(InodeMode::from_type(InodeType::File), super_block, 0),
            data: Mutex::new(Vec::new()),
        })
    }
}

impl Vnode for RamFileVnode {
    fn meta(&self) -> &VnodeMeta {
        &self.meta
    }

    fn get_attr(&self) -> SysResult<Stat> {
        Ok(ram_stat(&self.meta))
    }

    fn base_read(&self, offset: usize, buf: &mut [u8]) -> SysResult<usize> {
        let data = self.data.lock();
        if offset >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - offset);
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        Ok(n)
    }

    fn base_write(&self, offset: usize, buf: &[u8]) -> SysResult<usize> {
        let mut data = self.data.lock();
        let end = offset + buf.len();
        if end > data.len() {
            data.resize(end, 0);
        }
        data[offset..end].copy_from_slice(buf);
        self.meta.inner.lock().size = data.len();
        Ok(buf.len())
    }

    fn base_truncate(&self, len: usize) -> SysResult<()> {
        let mut data = self.data.lock();
        data.resize(len, 0);
        self.meta.inner.lock().size = len;
        Ok(())
    }
}

/// Device-special vnode: a name and a device id, no storage of its own.
/// Reads and writes on an open special file go through the device
/// registries, not through this vnode.
pub struct RamDevVnode {
    meta: VnodeMeta,
}

impl RamDevVnode {
    fn new(super_block: Arc<dyn SuperBlock>, mode: InodeMode, dev_id: DevId) -> Arc<Self> {
        Arc::new(Self {
            meta: VnodeMeta::new(mode, super_block, 0).with_dev_id(dev_id),
        })
    }
}

impl Vnode for RamDevVnode {
    fn meta(&self) -> &VnodeMeta {
        &self.meta
    }

    fn get_attr(&self) -> SysResult<Stat> {
        Ok(ram_stat(&self.meta))
    }
}
