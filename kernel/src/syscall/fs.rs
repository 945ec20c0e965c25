use alloc::sync::Arc;
use core::mem::size_of;

use device_core::DevId;
use systype::{SysError, SyscallResult};
use vfs_core::{
    DirEntry, File, InodeMode, OpenFlags, Path, SeekFrom, Stat, SEEK_CUR, SEEK_END, SEEK_SET,
};

use crate::task::Task;

fn resolve(task: &Task, path: &str) -> Path {
    Path::new(task.root(), task.cwd(), path)
}

/// Open the file named by `pathname` and return the lowest free file
/// descriptor referring to it.
///
/// `flags` must carry a valid access mode; with `O_CREAT` a missing target
/// is created as a regular file. Opening a directory for writing fails
/// `EISDIR`, and a device-special file whose device is not registered fails
/// `ENXIO`. On any failure no descriptor is consumed.
pub fn sys_open(task: &Task, pathname: &str, flags: i32) -> SyscallResult {
    let flags = OpenFlags::from_bits(flags).ok_or(SysError::EINVAL)?;
    if flags.contains(OpenFlags::O_ACCMODE) {
        return Err(SysError::EINVAL);
    }
    log::debug!("[sys_open] {pathname} {flags:?}");
    // a descriptor must be available before we touch the namespace
    task.with_fd_table(|table| table.get_empty_fd())?;
    let vnode = resolve(task, pathname).walk_open(flags)?;
    let file = File::open(vnode, flags)?;
    if flags.contains(OpenFlags::O_TRUNC) && flags.writable() && file.itype().is_file() {
        file.vnode().truncate(0)?;
    }
    task.with_mut_fd_table(|table| table.alloc(file, flags))
}

/// Close a file descriptor. The slot is vacated and the file object loses
/// one reference; the object itself dies with its last descriptor.
pub fn sys_close(task: &Task, fd: usize) -> SyscallResult {
    task.with_mut_fd_table(|table| table.remove(fd))?;
    Ok(0)
}

/// Read up to `buf.len()` bytes from the file referred to by `fd` into
/// `buf`, advancing the file position by the number of bytes read. Zero
/// means end of file.
pub fn sys_read(task: &Task, fd: usize, buf: &mut [u8]) -> SyscallResult {
    let file = task.with_fd_table(|table| table.get_file(fd))?;
    if file.itype().is_dir() {
        return Err(SysError::EISDIR);
    }
    file.read(buf)
}

/// Write `buf` to the file referred to by `fd` at the file position,
/// advancing it by the number of bytes written. In append mode the write
/// lands at end of file regardless of the position.
pub fn sys_write(task: &Task, fd: usize, buf: &[u8]) -> SyscallResult {
    let file = task.with_fd_table(|table| table.get_file(fd))?;
    file.write(buf)
}

/// Allocate a new descriptor referring to the same open file as `fd`. The
/// two share the file object, hence offset and status flags.
pub fn sys_dup(task: &Task, fd: usize) -> SyscallResult {
    task.with_mut_fd_table(|table| table.dup(fd))
}

/// Like [`sys_dup`], but the new descriptor is `new_fd`, which is silently
/// closed first if open. If `old_fd` equals `new_fd` nothing happens.
pub fn sys_dup2(task: &Task, old_fd: usize, new_fd: usize) -> SyscallResult {
    task.with_mut_fd_table(|table| table.dup2(old_fd, new_fd))
}

/// Move the file position of `fd` according to `offset` and `whence`
/// (SEEK_SET, SEEK_CUR or SEEK_END) and return the new position. The
/// result may point past end of file but never before byte 0.
pub fn sys_lseek(task: &Task, fd: usize, offset: isize, whence: usize) -> SyscallResult {
    let file = task.with_fd_table(|table| table.get_file(fd))?;
    let pos = match whence {
        SEEK_SET => SeekFrom::Start(u64::try_from(offset).map_err(|_| SysError::EINVAL)?),
        SEEK_CUR => SeekFrom::Current(offset as i64),
        SEEK_END => SeekFrom::End(offset as i64),
        _ => return Err(SysError::EINVAL),
    };
    file.seek(pos)
}

/// Create a device-special file of the kind given by `mode` (character or
/// block, anything else is `EINVAL`) naming the device `dev_id`.
pub fn sys_mknod(task: &Task, pathname: &str, mode: InodeMode, dev_id: DevId) -> SyscallResult {
    if !mode.to_type().is_device() {
        return Err(SysError::EINVAL);
    }
    let path = resolve(task, pathname);
    let (parent, name) = path.walk_parent()?;
    match parent.lookup(name) {
        Ok(_) => Err(SysError::EEXIST),
        Err(SysError::ENOENT) => {
            parent.mknod(name, mode, dev_id)?;
            Ok(0)
        }
        Err(e) => Err(e),
    }
}

/// Create the directory named by `pathname`; fails `EEXIST` if the name is
/// already taken.
pub fn sys_mkdir(task: &Task, pathname: &str) -> SyscallResult {
    let path = resolve(task, pathname);
    let (parent, name) = path.walk_parent()?;
    match parent.lookup(name) {
        Ok(_) => Err(SysError::EEXIST),
        Err(SysError::ENOENT) => {
            parent.mkdir(name)?;
            Ok(0)
        }
        Err(e) => Err(e),
    }
}

/// Remove the empty directory named by `pathname`. A path ending in `"."`
/// is `EINVAL`, one ending in `".."` is `ENOTEMPTY`.
pub fn sys_rmdir(task: &Task, pathname: &str) -> SyscallResult {
    let path = resolve(task, pathname);
    let (parent, name) = path.walk_parent()?;
    if name.is_empty() || name == "." {
        return Err(SysError::EINVAL);
    }
    if name == ".." {
        return Err(SysError::ENOTEMPTY);
    }
    parent.rmdir(name)?;
    Ok(0)
}

/// Remove the non-directory entry named by `pathname`; the inode lives on
/// while other links or open files refer to it.
pub fn sys_unlink(task: &Task, pathname: &str) -> SyscallResult {
    let path = resolve(task, pathname);
    let (parent, name) = path.walk_parent()?;
    let target = parent.lookup(name)?;
    if target.itype().is_dir() {
        return Err(SysError::EISDIR);
    }
    parent.unlink(name)?;
    Ok(0)
}

/// Make a new hard link `to` referring to the inode of `from`. Both names
/// must live on the same filesystem.
pub fn sys_link(task: &Task, from: &str, to: &str) -> SyscallResult {
    let src = resolve(task, from).walk_open(OpenFlags::empty())?;
    let path = resolve(task, to);
    let (parent, name) = path.walk_parent()?;
    if !Arc::ptr_eq(&src.super_block(), &parent.super_block()) {
        return Err(SysError::EXDEV);
    }
    match parent.lookup(name) {
        Ok(_) => Err(SysError::EEXIST),
        Err(SysError::ENOENT) => {
            parent.link(name, src)?;
            Ok(0)
        }
        Err(e) => Err(e),
    }
}

/// Rename by linking `new` to the inode of `old` and unlinking `old`. Not
/// atomic: if the unlink fails both names refer to the file.
pub fn sys_rename(task: &Task, old: &str, new: &str) -> SyscallResult {
    sys_link(task, old, new)?;
    sys_unlink(task, old)
}

/// Make the directory named by `pathname` the working directory of `task`,
/// releasing the reference to the old one.
pub fn sys_chdir(task: &Task, pathname: &str) -> SyscallResult {
    let vnode = resolve(task, pathname).walk_open(OpenFlags::empty())?;
    if !vnode.itype().is_dir() {
        return Err(SysError::ENOTDIR);
    }
    task.set_cwd(vnode);
    Ok(0)
}

/// Read the next entry of the directory referred to by `fd` into `dirent`,
/// advancing the directory position. Returns the entry size on progress
/// and 0 at end of directory.
pub fn sys_getdent(task: &Task, fd: usize, dirent: &mut DirEntry) -> SyscallResult {
    let file = task.with_fd_table(|table| table.get_file(fd))?;
    match file.read_dir()? {
        Some(entry) => {
            *dirent = entry;
            Ok(size_of::<DirEntry>())
        }
        None => Ok(0),
    }
}

/// Resolve `pathname` and fill `stat` from its inode.
pub fn sys_stat(task: &Task, pathname: &str, stat: &mut Stat) -> SyscallResult {
    let path = resolve(task, pathname);
    let (parent, name) = path.walk_parent()?;
    let vnode = parent.lookup(name)?;
    *stat = vnode.get_attr()?;
    Ok(0)
}
