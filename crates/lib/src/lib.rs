//! cforge-lib: Core types and logic for cforge
//!
//! This crate provides the pieces of a C/C++ build:
//! - `Scheduler`: runs build tasks on a bounded pool, or inline
//! - `LazyPath`: a path that may still be produced by a pending task
//! - `CompileCache`: memoized compilation keyed by source and flags
//! - `LibraryResolver`: finds prebuilt libraries on the search path
//! - `LinkTarget`: an executable or shared library linked from lazy inputs
//! - `BuildSession`: ties the above together for one project

pub mod compile;
pub mod consts;
pub mod discover;
pub mod execute;
pub mod layout;
pub mod lazy_path;
pub mod library;
pub mod manifest;
pub mod platform;
pub mod session;
pub mod target;
pub mod toolchain;
pub mod util;
