mod fs;

#[cfg(test)]
mod tests;

pub use fs::*;
