use alloc::string::String;

use crate::InodeType;

bitflags::bitflags! {
    // Defined in <bits/fcntl-linux.h>.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: i32 {
        // reserve 3 bits for the access mode
        // NOTE: bitflags do not encourage zero bit flag, we should not directly check `O_RDONLY`
        const O_RDONLY      = 0;
        const O_WRONLY      = 1;
        const O_RDWR        = 2;
        const O_ACCMODE     = 3;
        /// If pathname does not exist, create it as a regular file.
        const O_CREAT       = 0o100;
        /// With `O_CREAT`, fail if the target already exists.
        const O_EXCL        = 0o200;
        /// Truncate a regular file to length 0 on open for writing.
        const O_TRUNC       = 0o1000;
        /// Writes land at end of file and move the cursor there.
        const O_APPEND      = 0o2000;
        /// Close this descriptor across exec.
        const O_CLOEXEC     = 0o2000000;
    }
}

impl OpenFlags {
    pub fn readable(&self) -> bool {
        !self.contains(OpenFlags::O_WRONLY) || self.contains(OpenFlags::O_RDWR)
    }

    pub fn writable(&self) -> bool {
        self.contains(OpenFlags::O_WRONLY) || self.contains(OpenFlags::O_RDWR)
    }

    pub fn append(&self) -> bool {
        self.contains(OpenFlags::O_APPEND)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy)]
    pub struct MountFlags: u32 {
        /// This filesystem is mounted read-only.
        const MS_RDONLY = 1;
        /// Disallow access to device special files on this filesystem.
        const MS_NODEV = 1 << 2;
        /// Writes are synched to the filesystem immediately.
        const MS_SYNCHRONOUS = 1 << 4;
        /// Do not update access times.
        const MS_NOATIME = 1 << 10;
    }
}

/// Enumeration of possible methods to seek within an I/O object.
#[derive(Copy, PartialEq, Eq, Clone, Debug)]
pub enum SeekFrom {
    /// Sets the offset to the provided number of bytes.
    Start(u64),

    /// Sets the offset to the size of this object plus the specified number of
    /// bytes. It is possible to seek beyond the end of an object, but it's an
    /// error to seek before byte 0.
    End(i64),

    /// Sets the offset to the current position plus the specified number of
    /// bytes.
    Current(i64),
}

pub const SEEK_SET: usize = 0;
pub const SEEK_CUR: usize = 1;
pub const SEEK_END: usize = 2;

#[derive(Default, Clone, Copy, Debug, Eq, PartialEq)]
#[repr(C)]
pub struct TimeSpec {
    pub sec: u64,
    pub nsec: u64,
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
#[repr(C)]
pub struct Stat {
    pub st_dev: u64,
    pub st_ino: u64,
    pub st_mode: u32,
    pub st_nlink: u32,
    pub st_uid: u32,
    pub st_gid: u32,
    pub st_rdev: u64,
    pub __pad: u64,
    pub st_size: u64,
    pub st_blksize: u32,
    pub __pad2: u32,
    pub st_blocks: u64,
    pub st_atime: TimeSpec,
    pub st_mtime: TimeSpec,
    pub st_ctime: TimeSpec,
    pub unused: u64,
}

/// Directory entry, one per readdir step.
#[derive(Debug, Clone, Default)]
pub struct DirEntry {
    pub ino: u64,
    /// Cursor position of the entry following this one.
    pub off: u64,
    pub itype: InodeType,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_mode_predicates() {
        assert!(OpenFlags::O_RDONLY.readable());
        assert!(!OpenFlags::O_RDONLY.writable());
        assert!(!OpenFlags::O_WRONLY.readable());
        assert!(OpenFlags::O_WRONLY.writable());
        assert!(OpenFlags::O_RDWR.readable());
        assert!(OpenFlags::O_RDWR.writable());
    }

    #[test]
    fn unknown_flag_bits_are_rejected() {
        assert!(OpenFlags::from_bits(0o100 | 2).is_some());
        assert!(OpenFlags::from_bits(1 << 20).is_none());
    }
}
