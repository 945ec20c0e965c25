#![cfg_attr(not(test), no_std)]

mod file;
mod file_system_type;
mod path;
mod super_block;
mod utils;
mod vnode;

#[macro_use]
extern crate bitflags;
extern crate alloc;

use core::sync::atomic::{AtomicUsize, Ordering};

pub use file::*;
pub use file_system_type::*;
pub use path::*;
pub use super_block::*;
pub use utils::*;
pub use vnode::*;

type Mutex<T> = spin::Mutex<T>;

static INODE_NUMBER: AtomicUsize = AtomicUsize::new(0);

fn alloc_ino() -> usize {
    INODE_NUMBER.fetch_add(1, Ordering::Relaxed)
}
