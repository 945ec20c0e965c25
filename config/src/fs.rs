/// Max file descriptors per task.
pub const MAX_FDS: usize = 32;

/// Max length of a single path component.
pub const NAME_MAX: usize = 32;

/// Default filesystem block size in bytes.
pub const BLOCK_SIZE: usize = 512;
