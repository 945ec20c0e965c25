#![no_std]

pub mod fs;
