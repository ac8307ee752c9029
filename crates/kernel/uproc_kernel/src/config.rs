use log::LevelFilter;

/// Kernel construction options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    /// Total number of bytes the in-memory file store may hold.
    pub fs_capacity: usize,
    /// Log level of the kernel logger.
    ///
    /// When `None`, the level is taken from the `UPROC_LOG` environment
    /// variable and defaults to `warn`.
    pub log_level: Option<LevelFilter>,
    /// Copies console output to the host's standard output.
    pub echo_console: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            fs_capacity: 1024 * 1024,
            log_level: None,
            echo_console: false,
        }
    }
}

impl KernelConfig {
    #[must_use]
    pub fn fs_capacity(mut self, bytes: usize) -> Self {
        self.fs_capacity = bytes;
        self
    }

    #[must_use]
    pub fn log_level(mut self, level: LevelFilter) -> Self {
        self.log_level = Some(level);
        self
    }

    #[must_use]
    pub fn echo_console(mut self, echo: bool) -> Self {
        self.echo_console = echo;
        self
    }
}
