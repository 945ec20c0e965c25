use alloc::{string::String, sync::Arc, vec::Vec};
use core::mem::size_of;

use device_core::{register_char_device, CharDevice, DevId, DeviceMajor};
use spin::Mutex;
use systype::{SysError, SysResult};
use vfs::ramfs::RamFsType;
use vfs_core::{
    DirEntry, FileSystemType, InodeMode, InodeType, MountFlags, OpenFlags, Path, Stat, Vnode,
};

use super::*;
use crate::{fs, task::Task};

const O_RDONLY: i32 = OpenFlags::O_RDONLY.bits();
const O_WRONLY: i32 = OpenFlags::O_WRONLY.bits();
const O_RDWR: i32 = OpenFlags::O_RDWR.bits();
const O_CREAT: i32 = OpenFlags::O_CREAT.bits();
const O_EXCL: i32 = OpenFlags::O_EXCL.bits();
const O_TRUNC: i32 = OpenFlags::O_TRUNC.bits();
const O_APPEND: i32 = OpenFlags::O_APPEND.bits();

/// Echo-style console: writes accumulate, reads drain what was queued.
#[derive(Default)]
struct TestConsole {
    input: Mutex<Vec<u8>>,
    output: Mutex<Vec<u8>>,
}

impl CharDevice for TestConsole {
    fn name(&self) -> &str {
        "console"
    }

    fn read(&self, buf: &mut [u8]) -> SysResult<usize> {
        let mut input = self.input.lock();
        let n = buf.len().min(input.len());
        for (dst, byte) in buf.iter_mut().zip(input.drain(..n)) {
            *dst = byte;
        }
        Ok(n)
    }

    fn write(&self, buf: &[u8]) -> SysResult<usize> {
        self.output.lock().extend_from_slice(buf);
        Ok(buf.len())
    }
}

const CONSOLE: DevId = DevId {
    major: DeviceMajor::Serial,
    minor: 0,
};

/// A task on a fresh ramfs with stdio seeded on fds 0..=2, so the first
/// open returns 3.
fn spawn_init() -> Arc<Task> {
    let fs: Arc<dyn FileSystemType> = RamFsType::new();
    let root = fs.mount("/", MountFlags::empty(), None).unwrap();
    // Keep the filesystem type (and thus its super block) alive for the
    // life of the test; nothing else holds a strong reference to it.
    core::mem::forget(fs.clone());
    let task = Task::new(1, root.clone(), root.clone());
    register_char_device(CONSOLE, Arc::new(TestConsole::default()));
    let console = root
        .mknod("console", InodeMode::from_type(InodeType::CharDevice), CONSOLE)
        .unwrap();
    fs::install_stdio(&task, console).unwrap();
    root.unlink("console").unwrap();
    task
}

fn lookup(task: &Task, path: &str) -> SysResult<Arc<dyn Vnode>> {
    Path::new(task.root(), task.cwd(), path).walk_open(OpenFlags::empty())
}

#[test]
fn mkdir_is_exclusive_and_rmdir_restores_the_namespace() {
    let task = spawn_init();
    assert_eq!(sys_mkdir(&task, "/a").unwrap(), 0);
    assert_eq!(sys_mkdir(&task, "/a").unwrap_err(), SysError::EEXIST);
    assert_eq!(sys_rmdir(&task, "/a").unwrap(), 0);
    assert_eq!(sys_rmdir(&task, "/a").unwrap_err(), SysError::ENOENT);
}

#[test]
fn write_seek_read_round_trips() {
    let task = spawn_init();
    let fd = sys_open(&task, "/x", O_RDWR | O_CREAT).unwrap();
    assert_eq!(fd, 3);
    assert_eq!(sys_write(&task, fd, b"hi").unwrap(), 2);
    assert_eq!(sys_lseek(&task, fd, 0, vfs_core::SEEK_SET).unwrap(), 0);
    let mut buf = [0u8; 2];
    assert_eq!(sys_read(&task, fd, &mut buf).unwrap(), 2);
    assert_eq!(&buf, b"hi");
    assert_eq!(sys_close(&task, fd).unwrap(), 0);
}

#[test]
fn negative_seek_from_current_rereads_the_same_bytes() {
    let task = spawn_init();
    let fd = sys_open(&task, "/x", O_RDWR | O_CREAT).unwrap();
    assert_eq!(sys_write(&task, fd, b"payload").unwrap(), 7);
    assert_eq!(sys_lseek(&task, fd, -7, vfs_core::SEEK_CUR).unwrap(), 0);
    let mut buf = [0u8; 7];
    assert_eq!(sys_read(&task, fd, &mut buf).unwrap(), 7);
    assert_eq!(&buf, b"payload");
}

#[test]
fn dup_keeps_the_file_object_alive() {
    let task = spawn_init();
    let fd = sys_open(&task, "/x", O_RDWR | O_CREAT).unwrap();
    assert_eq!(sys_write(&task, fd, b"hi").unwrap(), 2);
    assert_eq!(sys_lseek(&task, fd, 0, vfs_core::SEEK_SET).unwrap(), 0);
    let dup_fd = sys_dup(&task, fd).unwrap();
    assert_eq!(dup_fd, 4);
    assert_eq!(sys_close(&task, fd).unwrap(), 0);
    let mut buf = [0u8; 2];
    assert_eq!(sys_read(&task, dup_fd, &mut buf).unwrap(), 2);
    assert_eq!(&buf, b"hi");
}

#[test]
fn dup_preserves_the_shared_cursor() {
    let task = spawn_init();
    let fd = sys_open(&task, "/x", O_RDWR | O_CREAT).unwrap();
    sys_write(&task, fd, b"abcd").unwrap();
    sys_lseek(&task, fd, 1, vfs_core::SEEK_SET).unwrap();
    let dup_fd = sys_dup(&task, fd).unwrap();
    sys_close(&task, fd).unwrap();
    assert_eq!(sys_lseek(&task, dup_fd, 0, vfs_core::SEEK_CUR).unwrap(), 1);
}

#[test]
fn failed_open_consumes_no_descriptor() {
    let task = spawn_init();
    assert_eq!(
        sys_open(&task, "/nosuch", O_RDONLY).unwrap_err(),
        SysError::ENOENT
    );
    assert_eq!(sys_open(&task, "/x", O_RDWR | O_CREAT).unwrap(), 3);
}

#[test]
fn mknod_routes_writes_through_the_char_device() {
    let task = spawn_init();
    let dev_id = DevId {
        major: DeviceMajor::Serial,
        minor: 7,
    };
    let console = Arc::new(TestConsole::default());
    register_char_device(dev_id, console.clone());
    assert_eq!(
        sys_mknod(
            &task,
            "/c",
            InodeMode::from_type(InodeType::CharDevice),
            dev_id
        )
        .unwrap(),
        0
    );
    let fd = sys_open(&task, "/c", O_WRONLY).unwrap();
    assert_eq!(sys_write(&task, fd, b"ping").unwrap(), 4);
    assert_eq!(console.output.lock().as_slice(), b"ping");

    console.input.lock().extend_from_slice(b"ok");
    let rfd = sys_open(&task, "/c", O_RDONLY).unwrap();
    let mut buf = [0u8; 4];
    assert_eq!(sys_read(&task, rfd, &mut buf).unwrap(), 2);
    assert_eq!(&buf[..2], b"ok");
}

#[test]
fn mknod_validates_mode_and_existing_names() {
    let task = spawn_init();
    assert_eq!(
        sys_mknod(&task, "/f", InodeMode::from_type(InodeType::File), CONSOLE).unwrap_err(),
        SysError::EINVAL
    );
    sys_mknod(&task, "/c", InodeMode::from_type(InodeType::CharDevice), CONSOLE).unwrap();
    assert_eq!(
        sys_mknod(&task, "/c", InodeMode::from_type(InodeType::CharDevice), CONSOLE).unwrap_err(),
        SysError::EEXIST
    );
}

#[test]
fn opening_an_unregistered_device_fails_nxio() {
    let task = spawn_init();
    let dev_id = DevId {
        major: DeviceMajor::Serial,
        minor: 999_999,
    };
    sys_mknod(&task, "/ghost", InodeMode::from_type(InodeType::CharDevice), dev_id).unwrap();
    assert_eq!(
        sys_open(&task, "/ghost", O_RDONLY).unwrap_err(),
        SysError::ENXIO
    );
}

#[test]
fn rmdir_rejects_dot_and_dotdot_basenames() {
    let task = spawn_init();
    sys_mkdir(&task, "/a").unwrap();
    assert_eq!(sys_rmdir(&task, "/a/.").unwrap_err(), SysError::EINVAL);
    assert_eq!(sys_rmdir(&task, "/a/..").unwrap_err(), SysError::ENOTEMPTY);
}

#[test]
fn component_length_is_bounded_per_component() {
    let task = spawn_init();
    let max: String = core::iter::repeat('a').take(config::fs::NAME_MAX).collect();
    let over: String = core::iter::repeat('a').take(config::fs::NAME_MAX + 1).collect();
    let mut path = String::from("/");
    path.push_str(&max);
    assert_eq!(sys_mkdir(&task, &path).unwrap(), 0);
    let mut path = String::from("/");
    path.push_str(&over);
    assert_eq!(sys_mkdir(&task, &path).unwrap_err(), SysError::ENAMETOOLONG);
    assert_eq!(
        sys_open(&task, &path, O_RDONLY).unwrap_err(),
        SysError::ENAMETOOLONG
    );
}

#[test]
fn empty_path_is_enoent() {
    let task = spawn_init();
    assert_eq!(sys_open(&task, "", O_RDONLY).unwrap_err(), SysError::ENOENT);
    let mut stat = Stat::default();
    assert_eq!(sys_stat(&task, "", &mut stat).unwrap_err(), SysError::ENOENT);
}

#[test]
fn seek_validates_whence_and_resulting_offset() {
    let task = spawn_init();
    let fd = sys_open(&task, "/x", O_RDWR | O_CREAT).unwrap();
    sys_write(&task, fd, b"abc").unwrap();
    assert_eq!(sys_lseek(&task, fd, -1, vfs_core::SEEK_SET).unwrap_err(), SysError::EINVAL);
    assert_eq!(sys_lseek(&task, fd, -4, vfs_core::SEEK_END).unwrap_err(), SysError::EINVAL);
    assert_eq!(sys_lseek(&task, fd, 0, 9).unwrap_err(), SysError::EINVAL);
    // past end is allowed
    assert_eq!(sys_lseek(&task, fd, 100, vfs_core::SEEK_END).unwrap(), 103);
    // SEEK_CUR with zero offset is the identity
    assert_eq!(sys_lseek(&task, fd, 0, vfs_core::SEEK_CUR).unwrap(), 103);
}

#[test]
fn opening_a_directory_for_write_is_isdir() {
    let task = spawn_init();
    assert_eq!(sys_open(&task, "/", O_WRONLY).unwrap_err(), SysError::EISDIR);
    assert_eq!(sys_open(&task, "/", O_RDWR).unwrap_err(), SysError::EISDIR);
    let fd = sys_open(&task, "/", O_RDONLY).unwrap();
    assert_eq!(fd, 3);
    // a trailing slash asserts directory-ness
    sys_mkdir(&task, "/d").unwrap();
    assert_eq!(sys_open(&task, "/d/", O_WRONLY).unwrap_err(), SysError::EISDIR);
    assert!(sys_open(&task, "/d/", O_RDONLY).is_ok());
}

#[test]
fn closed_descriptors_turn_bad() {
    let task = spawn_init();
    let fd = sys_open(&task, "/x", O_RDWR | O_CREAT).unwrap();
    sys_close(&task, fd).unwrap();
    let mut buf = [0u8; 1];
    assert_eq!(sys_read(&task, fd, &mut buf).unwrap_err(), SysError::EBADF);
    assert_eq!(sys_write(&task, fd, b"a").unwrap_err(), SysError::EBADF);
    assert_eq!(
        sys_lseek(&task, fd, 0, vfs_core::SEEK_CUR).unwrap_err(),
        SysError::EBADF
    );
    assert_eq!(sys_close(&task, fd).unwrap_err(), SysError::EBADF);
    assert_eq!(sys_dup(&task, fd).unwrap_err(), SysError::EBADF);
}

#[test]
fn read_write_respect_the_access_mode() {
    let task = spawn_init();
    let fd = sys_open(&task, "/x", O_WRONLY | O_CREAT).unwrap();
    let mut buf = [0u8; 1];
    assert_eq!(sys_read(&task, fd, &mut buf).unwrap_err(), SysError::EBADF);
    sys_close(&task, fd).unwrap();
    let fd = sys_open(&task, "/x", O_RDONLY).unwrap();
    assert_eq!(sys_write(&task, fd, b"a").unwrap_err(), SysError::EBADF);
}

#[test]
fn invalid_open_flags_are_rejected() {
    let task = spawn_init();
    assert_eq!(
        sys_open(&task, "/x", O_RDWR | (1 << 20)).unwrap_err(),
        SysError::EINVAL
    );
    assert_eq!(
        sys_open(&task, "/x", OpenFlags::O_ACCMODE.bits()).unwrap_err(),
        SysError::EINVAL
    );
}

#[test]
fn exclusive_create_fails_on_existing_files() {
    let task = spawn_init();
    assert_eq!(sys_open(&task, "/x", O_RDWR | O_CREAT).unwrap(), 3);
    assert_eq!(
        sys_open(&task, "/x", O_RDWR | O_CREAT | O_EXCL).unwrap_err(),
        SysError::EEXIST
    );
}

#[test]
fn truncate_on_open_discards_old_contents() {
    let task = spawn_init();
    let fd = sys_open(&task, "/x", O_RDWR | O_CREAT).unwrap();
    sys_write(&task, fd, b"hello").unwrap();
    sys_close(&task, fd).unwrap();
    let fd = sys_open(&task, "/x", O_WRONLY | O_TRUNC).unwrap();
    let mut stat = Stat::default();
    sys_stat(&task, "/x", &mut stat).unwrap();
    assert_eq!(stat.st_size, 0);
    sys_write(&task, fd, b"z").unwrap();
    sys_stat(&task, "/x", &mut stat).unwrap();
    assert_eq!(stat.st_size, 1);
}

#[test]
fn append_mode_writes_land_at_end_of_file() {
    let task = spawn_init();
    let fd = sys_open(&task, "/log", O_RDWR | O_CREAT).unwrap();
    sys_write(&task, fd, b"abc").unwrap();
    sys_close(&task, fd).unwrap();
    let fd = sys_open(&task, "/log", O_WRONLY | O_APPEND).unwrap();
    // the cursor position is irrelevant in append mode
    sys_lseek(&task, fd, 0, vfs_core::SEEK_SET).unwrap();
    assert_eq!(sys_write(&task, fd, b"de").unwrap(), 2);
    assert_eq!(sys_lseek(&task, fd, 0, vfs_core::SEEK_CUR).unwrap(), 5);
    let rfd = sys_open(&task, "/log", O_RDONLY).unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(sys_read(&task, rfd, &mut buf).unwrap(), 5);
    assert_eq!(&buf[..5], b"abcde");
}

#[test]
fn link_then_unlink_preserves_the_original() {
    let task = spawn_init();
    let fd = sys_open(&task, "/a", O_RDWR | O_CREAT).unwrap();
    sys_write(&task, fd, b"data").unwrap();
    assert_eq!(sys_link(&task, "/a", "/b").unwrap(), 0);
    let mut stat = Stat::default();
    sys_stat(&task, "/b", &mut stat).unwrap();
    assert_eq!(stat.st_nlink, 2);
    assert_eq!(sys_link(&task, "/a", "/b").unwrap_err(), SysError::EEXIST);
    assert_eq!(sys_unlink(&task, "/b").unwrap(), 0);
    sys_stat(&task, "/a", &mut stat).unwrap();
    assert_eq!(stat.st_nlink, 1);
    assert_eq!(stat.st_size, 4);
    assert_eq!(sys_stat(&task, "/b", &mut stat).unwrap_err(), SysError::ENOENT);
}

#[test]
fn unlink_rejects_directories_and_missing_names() {
    let task = spawn_init();
    sys_mkdir(&task, "/d").unwrap();
    assert_eq!(sys_unlink(&task, "/d").unwrap_err(), SysError::EISDIR);
    assert_eq!(sys_unlink(&task, "/gone").unwrap_err(), SysError::ENOENT);
}

#[test]
fn rename_moves_the_name_not_the_inode() {
    let task = spawn_init();
    let fd = sys_open(&task, "/old", O_RDWR | O_CREAT).unwrap();
    sys_write(&task, fd, b"keep").unwrap();
    sys_close(&task, fd).unwrap();
    assert_eq!(sys_rename(&task, "/old", "/new").unwrap(), 0);
    let mut stat = Stat::default();
    assert_eq!(
        sys_stat(&task, "/old", &mut stat).unwrap_err(),
        SysError::ENOENT
    );
    let fd = sys_open(&task, "/new", O_RDONLY).unwrap();
    let mut buf = [0u8; 4];
    assert_eq!(sys_read(&task, fd, &mut buf).unwrap(), 4);
    assert_eq!(&buf, b"keep");
}

#[test]
fn chdir_changes_the_base_of_relative_paths() {
    let task = spawn_init();
    sys_mkdir(&task, "/a").unwrap();
    assert_eq!(sys_chdir(&task, "/a").unwrap(), 0);
    assert_eq!(sys_mkdir(&task, "b").unwrap(), 0);
    let mut stat = Stat::default();
    assert_eq!(sys_stat(&task, "/a/b", &mut stat).unwrap(), 0);
    assert_eq!(sys_chdir(&task, "b").unwrap(), 0);
    sys_open(&task, "c", O_RDWR | O_CREAT).unwrap();
    assert_eq!(sys_stat(&task, "/a/b/c", &mut stat).unwrap(), 0);
    // `..` climbs back up
    assert_eq!(sys_chdir(&task, "..").unwrap(), 0);
    assert_eq!(sys_stat(&task, "b/c", &mut stat).unwrap(), 0);
    assert_eq!(sys_chdir(&task, "/a/b/c").unwrap_err(), SysError::ENOTDIR);
    assert_eq!(sys_chdir(&task, "/missing").unwrap_err(), SysError::ENOENT);
}

#[test]
fn getdent_walks_the_directory_to_exhaustion() {
    let task = spawn_init();
    sys_mkdir(&task, "/d").unwrap();
    sys_open(&task, "/d/f1", O_RDWR | O_CREAT).unwrap();
    sys_open(&task, "/d/f2", O_RDWR | O_CREAT).unwrap();
    let fd = sys_open(&task, "/d", O_RDONLY).unwrap();
    let mut names = Vec::new();
    let mut dirent = DirEntry::default();
    loop {
        match sys_getdent(&task, fd, &mut dirent).unwrap() {
            0 => break,
            n => {
                assert_eq!(n, size_of::<DirEntry>());
                names.push(dirent.name.clone());
            }
        }
    }
    assert_eq!(names, [".", "..", "f1", "f2"]);
    // a regular file has no entries to read
    let ffd = sys_open(&task, "/d/f1", O_RDONLY).unwrap();
    assert_eq!(
        sys_getdent(&task, ffd, &mut dirent).unwrap_err(),
        SysError::ENOTDIR
    );
    // and a directory cannot be read as a byte stream
    let mut buf = [0u8; 4];
    assert_eq!(sys_read(&task, fd, &mut buf).unwrap_err(), SysError::EISDIR);
}

#[test]
fn stat_resolves_directories_and_the_root() {
    let task = spawn_init();
    let mut stat = Stat::default();
    assert_eq!(sys_stat(&task, "/", &mut stat).unwrap(), 0);
    assert_eq!(
        InodeMode::from_bits_truncate(stat.st_mode).to_type(),
        InodeType::Dir
    );
    sys_mkdir(&task, "/d").unwrap();
    assert_eq!(sys_stat(&task, "/d/", &mut stat).unwrap(), 0);
    assert_eq!(
        InodeMode::from_bits_truncate(stat.st_mode).to_type(),
        InodeType::Dir
    );
}

#[test]
fn descriptor_table_exhaustion_is_emfile() {
    let task = spawn_init();
    sys_open(&task, "/bulk", O_RDWR | O_CREAT).unwrap();
    for _ in 4..config::fs::MAX_FDS {
        sys_open(&task, "/bulk", O_RDONLY).unwrap();
    }
    assert_eq!(
        sys_open(&task, "/bulk", O_RDONLY).unwrap_err(),
        SysError::EMFILE
    );
    // the fd check precedes resolution, so nothing was created
    assert_eq!(
        sys_open(&task, "/late", O_RDWR | O_CREAT).unwrap_err(),
        SysError::EMFILE
    );
    let mut stat = Stat::default();
    assert_eq!(
        sys_stat(&task, "/late", &mut stat).unwrap_err(),
        SysError::ENOENT
    );
}

#[test]
fn successful_calls_balance_vnode_references() {
    let task = spawn_init();
    sys_open(&task, "/f", O_RDWR | O_CREAT).map(|fd| sys_close(&task, fd).unwrap()).unwrap();
    let vnode = lookup(&task, "/f").unwrap();
    let baseline = Arc::strong_count(&vnode);
    let fd = sys_open(&task, "/f", O_RDONLY).unwrap();
    assert_eq!(Arc::strong_count(&vnode), baseline + 1);
    sys_close(&task, fd).unwrap();
    assert_eq!(Arc::strong_count(&vnode), baseline);
}

#[test]
fn failing_calls_release_every_acquired_reference() {
    let task = spawn_init();
    sys_mkdir(&task, "/d").unwrap();
    sys_open(&task, "/d/f", O_RDWR | O_CREAT).map(|fd| sys_close(&task, fd).unwrap()).unwrap();
    let root = task.root();
    let dir = lookup(&task, "/d").unwrap();
    let file = lookup(&task, "/d/f").unwrap();
    let root_count = Arc::strong_count(&root);
    let dir_count = Arc::strong_count(&dir);
    let file_count = Arc::strong_count(&file);

    assert_eq!(sys_open(&task, "/d/f/x", O_RDONLY).unwrap_err(), SysError::ENOTDIR);
    assert_eq!(sys_open(&task, "/d/missing", O_RDONLY).unwrap_err(), SysError::ENOENT);
    assert_eq!(sys_open(&task, "/d", O_WRONLY).unwrap_err(), SysError::EISDIR);
    assert_eq!(sys_mkdir(&task, "/d").unwrap_err(), SysError::EEXIST);
    assert_eq!(sys_unlink(&task, "/d").unwrap_err(), SysError::EISDIR);
    assert_eq!(sys_rmdir(&task, "/d").unwrap_err(), SysError::ENOTEMPTY);

    assert_eq!(Arc::strong_count(&root), root_count);
    assert_eq!(Arc::strong_count(&dir), dir_count);
    assert_eq!(Arc::strong_count(&file), file_count);
}

#[test]
fn chdir_swaps_the_working_directory_reference() {
    let task = spawn_init();
    sys_mkdir(&task, "/a").unwrap();
    let dir = lookup(&task, "/a").unwrap();
    let baseline = Arc::strong_count(&dir);
    sys_chdir(&task, "/a").unwrap();
    assert_eq!(Arc::strong_count(&dir), baseline + 1);
    sys_chdir(&task, "/").unwrap();
    assert_eq!(Arc::strong_count(&dir), baseline);
}

#[test]
fn boot_init_mounts_one_root() {
    let task = fs::init().unwrap();
    let again = fs::init().unwrap();
    assert!(Arc::ptr_eq(&task.root(), &again.root()));
    assert!(Arc::ptr_eq(&task.root(), &vfs::sys_root_vnode()));
    assert_eq!(task.pid(), 1);
}
