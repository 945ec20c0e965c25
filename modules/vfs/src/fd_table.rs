use alloc::{sync::Arc, vec::Vec};

use config::fs::MAX_FDS;
use systype::{SysError, SysResult};
use vfs_core::{File, OpenFlags};

pub type Fd = usize;

bitflags::bitflags! {
    // Defined in <bits/fcntl-linux.h>.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FdFlags: u8 {
        const CLOEXEC = 1;
    }
}

impl From<OpenFlags> for FdFlags {
    fn from(value: OpenFlags) -> Self {
        if value.contains(OpenFlags::O_CLOEXEC) {
            FdFlags::CLOEXEC
        } else {
            FdFlags::empty()
        }
    }
}

#[derive(Clone, Debug)]
pub struct FdInfo {
    /// File descriptor flags; only CLOEXEC is defined.
    flags: FdFlags,
    file: Arc<File>,
}

impl FdInfo {
    pub fn new(file: Arc<File>, flags: FdFlags) -> Self {
        Self { flags, file }
    }

    pub fn file(&self) -> Arc<File> {
        self.file.clone()
    }

    pub fn flags(&self) -> FdFlags {
        self.flags
    }

    pub fn set_close_on_exec(&mut self) {
        self.flags = FdFlags::CLOEXEC;
    }
}

/// Per-task descriptor table: a dense array of optional slots, bounded by
/// `MAX_FDS`. Distinct occupied slots may share one file object (dup).
#[derive(Clone)]
pub struct FdTable {
    table: Vec<Option<FdInfo>>,
}

impl FdTable {
    pub fn new() -> Self {
        Self { table: Vec::new() }
    }

    /// Lowest free descriptor, without occupying it.
    pub fn get_empty_fd(&self) -> SysResult<Fd> {
        if let Some(fd) = self.table.iter().position(|e| e.is_none()) {
            return Ok(fd);
        }
        if self.table.len() < MAX_FDS {
            Ok(self.table.len())
        } else {
            Err(SysError::EMFILE)
        }
    }

    /// Install `file` at the lowest free descriptor.
    pub fn alloc(&mut self, file: Arc<File>, flags: OpenFlags) -> SysResult<Fd> {
        let fd = self.get_empty_fd()?;
        self.put(fd, FdInfo::new(file, flags.into()))?;
        Ok(fd)
    }

    pub fn get(&self, fd: Fd) -> SysResult<&FdInfo> {
        self.table
            .get(fd)
            .and_then(|e| e.as_ref())
            .ok_or(SysError::EBADF)
    }

    pub fn get_mut(&mut self, fd: Fd) -> SysResult<&mut FdInfo> {
        self.table
            .get_mut(fd)
            .and_then(|e| e.as_mut())
            .ok_or(SysError::EBADF)
    }

    pub fn get_file(&self, fd: Fd) -> SysResult<Arc<File>> {
        Ok(self.get(fd)?.file())
    }

    /// Install `fd_info` at `fd`, growing the table as needed. An occupied
    /// slot is replaced, which releases the previous file reference.
    pub fn put(&mut self, fd: Fd, fd_info: FdInfo) -> SysResult<()> {
        if fd >= MAX_FDS {
            return Err(SysError::EBADF);
        }
        if fd >= self.table.len() {
            self.table.resize_with(fd + 1, || None);
        }
        self.table[fd] = Some(fd_info);
        Ok(())
    }

    /// Vacate `fd`, releasing the slot's file reference.
    pub fn remove(&mut self, fd: Fd) -> SysResult<FdInfo> {
        self.table
            .get_mut(fd)
            .and_then(|e| e.take())
            .ok_or(SysError::EBADF)
    }

    /// Duplicate `old_fd` onto the lowest free descriptor. The new slot
    /// shares the file object, so cursor and mode are shared too.
    pub fn dup(&mut self, old_fd: Fd) -> SysResult<Fd> {
        let file = self.get_file(old_fd)?;
        self.alloc(file, OpenFlags::empty())
    }

    /// Duplicate `old_fd` onto `new_fd`, closing `new_fd` first if it is
    /// open, unless the two already alias.
    pub fn dup2(&mut self, old_fd: Fd, new_fd: Fd) -> SysResult<Fd> {
        let file = self.get_file(old_fd)?;
        if new_fd >= MAX_FDS {
            return Err(SysError::EBADF);
        }
        if old_fd == new_fd {
            return Ok(new_fd);
        }
        self.put(new_fd, FdInfo::new(file, FdFlags::empty()))?;
        Ok(new_fd)
    }

    /// Close every descriptor carrying the CLOEXEC flag.
    pub fn do_close_on_exec(&mut self) {
        for slot in self.table.iter_mut() {
            if let Some(fd_info) = slot {
                if fd_info.flags().contains(FdFlags::CLOEXEC) {
                    *slot = None;
                }
            }
        }
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}
