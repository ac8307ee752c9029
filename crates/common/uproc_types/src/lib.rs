//! Identifier types shared by the kernel and user programs.
#![cfg_attr(not(test), no_std)]

pub mod fs;
pub mod process;
