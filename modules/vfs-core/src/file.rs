use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering};

use device_core::{BlockDevice, CharDevice};
use systype::{SysError, SysResult};

use crate::{DirEntry, InodeType, OpenFlags, SeekFrom, Vnode};

/// Device a special file was bound to when it was opened.
#[derive(Debug)]
pub enum FileDevice {
    Char(Arc<dyn CharDevice>),
    Block(Arc<dyn BlockDevice>),
}

#[derive(Debug)]
pub struct FileMeta {
    /// Vnode this file refers to. Exactly one reference is held.
    pub vnode: Arc<dyn Vnode>,
    /// Access mode and status flags, fixed at open.
    pub flags: OpenFlags,
    /// Cursor position of this file.
    /// WARN: may cause trouble if this is not updated in one step.
    pub pos: AtomicUsize,
    /// Resolved device, for character- and block-special files.
    pub dev: Option<FileDevice>,
}

/// Kernel-side open-file state. Shared as `Arc<File>` by every descriptor
/// that was dup'ed from the same open, so the cursor is shared too; the
/// object dies when the last descriptor drops it.
#[derive(Debug)]
pub struct File {
    meta: FileMeta,
}

impl File {
    /// Open `vnode` with `flags`.
    ///
    /// A directory may not be opened for writing. A device-special vnode is
    /// bound to its driver here; a dangling device id fails `ENXIO`.
    pub fn open(vnode: Arc<dyn Vnode>, flags: OpenFlags) -> SysResult<Arc<File>> {
        if vnode.itype().is_dir() && flags.writable() {
            return Err(SysError::EISDIR);
        }
        let dev = match vnode.itype() {
            InodeType::CharDevice => {
                let dev_id = vnode.dev_id().ok_or(SysError::ENXIO)?;
                let dev = device_core::char_device(dev_id).ok_or(SysError::ENXIO)?;
                Some(FileDevice::Char(dev))
            }
            InodeType::BlockDevice => {
                let dev_id = vnode.dev_id().ok_or(SysError::ENXIO)?;
                let dev = device_core::block_device(dev_id).ok_or(SysError::ENXIO)?;
                Some(FileDevice::Block(dev))
            }
            _ => None,
        };
        Ok(Arc::new(File {
            meta: FileMeta {
                vnode,
                flags,
                pos: AtomicUsize::new(0),
                dev,
            },
        }))
    }

    pub fn meta(&self) -> &FileMeta {
        &self.meta
    }

    pub fn vnode(&self) -> Arc<dyn Vnode> {
        self.meta.vnode.clone()
    }

    pub fn itype(&self) -> InodeType {
        self.meta.vnode.itype()
    }

    pub fn flags(&self) -> OpenFlags {
        self.meta.flags
    }

    pub fn pos(&self) -> usize {
        self.meta.pos.load(Ordering::Relaxed)
    }

    pub fn readable(&self) -> bool {
        self.meta.flags.readable()
    }

    pub fn writable(&self) -> bool {
        self.meta.flags.writable()
    }

    /// Read from the cursor, advancing it by the number of bytes returned.
    pub fn read(&self, buf: &mut [u8]) -> SysResult<usize> {
        if !self.readable() {
            return Err(SysError::EBADF);
        }
        match &self.meta.dev {
            Some(FileDevice::Char(dev)) => dev.read(buf),
            Some(FileDevice::Block(dev)) => {
                let pos = self.pos();
                let n = dev.read_at(pos, buf)?;
                self.meta.pos.store(pos + n, Ordering::Relaxed);
                Ok(n)
            }
            None => {
                if self.itype().is_dir() {
                    return Err(SysError::EISDIR);
                }
                let pos = self.pos();
                let n = self.meta.vnode.base_read(pos, buf)?;
                self.meta.pos.store(pos + n, Ordering::Relaxed);
                Ok(n)
            }
        }
    }

    /// Write at the cursor, advancing it by the number of bytes returned.
    ///
    /// In append mode the write lands at end of file and the cursor moves
    /// to the new end, so concurrent appenders never clobber each other's
    /// cursor.
    pub fn write(&self, buf: &[u8]) -> SysResult<usize> {
        if !self.writable() && !self.meta.flags.append() {
            return Err(SysError::EBADF);
        }
        match &self.meta.dev {
            Some(FileDevice::Char(dev)) => dev.write(buf),
            Some(FileDevice::Block(dev)) => {
                let pos = self.pos();
                let n = dev.write_at(pos, buf)?;
                self.meta.pos.store(pos + n, Ordering::Relaxed);
                Ok(n)
            }
            None => {
                if self.itype().is_dir() {
                    return Err(SysError::EISDIR);
                }
                if self.meta.flags.append() {
                    let end = self.meta.vnode.size();
                    let n = self.meta.vnode.base_write(end, buf)?;
                    self.meta
                        .pos
                        .store(self.meta.vnode.size(), Ordering::Relaxed);
                    Ok(n)
                } else {
                    let pos = self.pos();
                    let n = self.meta.vnode.base_write(pos, buf)?;
                    self.meta.pos.store(pos + n, Ordering::Relaxed);
                    Ok(n)
                }
            }
        }
    }

    /// Move the cursor. The resulting offset must not be negative; seeking
    /// past end of file is allowed.
    pub fn seek(&self, pos: SeekFrom) -> SysResult<usize> {
        let res_pos = match pos {
            SeekFrom::Start(off) => i64::try_from(off).map_err(|_| SysError::EINVAL)?,
            SeekFrom::Current(off) => (self.pos() as i64)
                .checked_add(off)
                .ok_or(SysError::EINVAL)?,
            SeekFrom::End(off) => (self.meta.vnode.size() as i64)
                .checked_add(off)
                .ok_or(SysError::EINVAL)?,
        };
        if res_pos < 0 {
            return Err(SysError::EINVAL);
        }
        self.meta.pos.store(res_pos as usize, Ordering::Relaxed);
        Ok(res_pos as usize)
    }

    /// Read the next directory entry, advancing the cursor by one entry.
    pub fn read_dir(&self) -> SysResult<Option<DirEntry>> {
        if !self.itype().is_dir() {
            return Err(SysError::ENOTDIR);
        }
        let pos = self.pos();
        if let Some(entry) = self.meta.vnode.base_read_dir(pos)? {
            self.meta.pos.store(pos + 1, Ordering::Relaxed);
            Ok(Some(entry))
        } else {
            Ok(None)
        }
    }
}
