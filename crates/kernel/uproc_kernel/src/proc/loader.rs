//! Executable images.

use std::{collections::BTreeMap, fmt, sync::Arc};

use uproc_kernel_params::{PAGE_SIZE, USER_PTR_SIZE};

use crate::{error::KernelError, memory::UserMemory, user::UserEnv};

/// The entry point of a user program.
///
/// `argv` is the user address of an array of `argc` string pointers, each a
/// little-endian `u32`. The return value is passed to `exit`.
pub trait Program: Send + Sync {
    fn main(&self, env: &mut UserEnv, argc: usize, argv: usize) -> i32;
}

impl<F> Program for F
where
    F: Fn(&mut UserEnv, usize, usize) -> i32 + Send + Sync,
{
    fn main(&self, env: &mut UserEnv, argc: usize, argv: usize) -> i32 {
        self(env, argc, argv)
    }
}

/// A loadable program and the shape of its address space.
#[derive(Clone)]
pub struct ProgramImage {
    program: Arc<dyn Program>,
    text_pages: usize,
    data_pages: usize,
}

impl fmt::Debug for ProgramImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramImage")
            .field("text_pages", &self.text_pages)
            .field("data_pages", &self.data_pages)
            .finish_non_exhaustive()
    }
}

impl ProgramImage {
    pub const DEFAULT_TEXT_PAGES: usize = 1;
    pub const DEFAULT_DATA_PAGES: usize = 8;

    pub fn new<P>(program: P) -> Self
    where
        P: Program + 'static,
    {
        Self {
            program: Arc::new(program),
            text_pages: Self::DEFAULT_TEXT_PAGES,
            data_pages: Self::DEFAULT_DATA_PAGES,
        }
    }

    #[must_use]
    pub fn text_pages(mut self, pages: usize) -> Self {
        self.text_pages = pages;
        self
    }

    #[must_use]
    pub fn data_pages(mut self, pages: usize) -> Self {
        self.data_pages = pages;
        self
    }

    #[must_use]
    pub fn program(&self) -> &Arc<dyn Program> {
        &self.program
    }

    /// Builds a fresh address space for this image.
    #[must_use]
    pub fn create_memory(&self) -> UserMemory {
        UserMemory::new(self.text_pages, self.data_pages)
    }
}

/// Resolves executable names.
pub trait ProgramLoader: Send + Sync {
    fn load(&self, path: &str) -> Result<ProgramImage, KernelError>;
}

/// A loader backed by a fixed table of programs.
#[derive(Default, Clone)]
pub struct ProgramTable {
    programs: BTreeMap<String, ProgramImage>,
}

impl fmt::Debug for ProgramTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.programs.keys()).finish()
    }
}

impl ProgramTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, image: ProgramImage) -> &mut Self {
        self.programs.insert(path.to_owned(), image);
        self
    }

    /// Adds `program` with the default address-space shape.
    #[must_use]
    pub fn with<P>(mut self, path: &str, program: P) -> Self
    where
        P: Program + 'static,
    {
        self.insert(path, ProgramImage::new(program));
        self
    }
}

impl ProgramLoader for ProgramTable {
    fn load(&self, path: &str) -> Result<ProgramImage, KernelError> {
        self.programs
            .get(path)
            .cloned()
            .ok_or(KernelError::ExecutableNotFound)
    }
}

/// Copies `args` to the top stack page.
///
/// The page starts with the `argv` array of `u32` pointers followed by the
/// NUL-terminated strings. Returns the user address of `argv`.
pub(crate) fn push_args(memory: &mut UserMemory, args: &[String]) -> Result<usize, KernelError> {
    let total = args.len() * USER_PTR_SIZE + args.iter().map(|a| a.len() + 1).sum::<usize>();
    let stack = memory.stack_range();
    if total > PAGE_SIZE || stack.len() < PAGE_SIZE {
        return Err(KernelError::ArgumentListTooLong);
    }

    let argv = stack.end - PAGE_SIZE;
    let mut entry = argv;
    let mut string = argv + args.len() * USER_PTR_SIZE;
    for arg in args {
        let Ok(ptr) = u32::try_from(string) else {
            return Err(KernelError::ArgumentListTooLong);
        };
        memory.store(entry, &ptr.to_le_bytes())?;
        memory.store(string, arg.as_bytes())?;
        memory.store(string + arg.len(), &[0])?;
        entry += USER_PTR_SIZE;
        string += arg.len() + 1;
    }
    Ok(argv)
}
