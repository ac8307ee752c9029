use uproc_kernel_params::NOFILE;
use uproc_types::fs::RawFd;

use super::File;
use crate::error::KernelError;

/// Per-process descriptor table.
///
/// Slot `i` holds the file named by descriptor `i`. New files always take the
/// lowest free slot.
#[derive(Debug)]
pub struct FileTable {
    ofile: [Option<File>; NOFILE],
}

impl FileTable {
    /// Creates a table with console input and output at their reserved slots.
    #[must_use]
    pub fn with_standard_streams() -> Self {
        let mut ofile = [const { None }; NOFILE];
        ofile[RawFd::STDIN.get()] = Some(File::ConsoleInput);
        ofile[RawFd::STDOUT.get()] = Some(File::ConsoleOutput);
        Self { ofile }
    }

    fn slot(&mut self, fd: RawFd) -> Result<&mut Option<File>, KernelError> {
        self.ofile
            .get_mut(fd.get())
            .ok_or(KernelError::FileDescriptorOutOfRange(fd))
    }

    pub fn get_mut(&mut self, fd: RawFd) -> Result<&mut File, KernelError> {
        self.slot(fd)?
            .as_mut()
            .ok_or(KernelError::FileDescriptorNotOpen(fd))
    }

    pub fn add(&mut self, file: File) -> Result<RawFd, KernelError> {
        let (fd, slot) = self
            .ofile
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.is_none())
            .ok_or(KernelError::TooManyOpenFiles)?;
        *slot = Some(file);
        Ok(RawFd::new(fd))
    }

    pub fn remove(&mut self, fd: RawFd) -> Result<File, KernelError> {
        self.slot(fd)?
            .take()
            .ok_or(KernelError::FileDescriptorNotOpen(fd))
    }

    /// Returns `true` if a free slot exists.
    #[must_use]
    pub fn has_free_slot(&self) -> bool {
        self.ofile.iter().any(Option::is_none)
    }

    #[must_use]
    pub fn open_count(&self) -> usize {
        self.ofile.iter().flatten().count()
    }

    /// Closes every open file.
    pub fn close_all(&mut self) {
        for (fd, slot) in self.ofile.iter_mut().enumerate() {
            let Some(file) = slot.take() else {
                continue;
            };
            if let Err(e) = file.close() {
                log::warn!("close fd {fd} failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_streams_are_preopened() {
        let mut table = FileTable::with_standard_streams();
        assert!(matches!(
            table.get_mut(RawFd::STDIN),
            Ok(File::ConsoleInput)
        ));
        assert!(matches!(
            table.get_mut(RawFd::STDOUT),
            Ok(File::ConsoleOutput)
        ));
        assert_eq!(table.open_count(), 2);
    }

    #[test]
    fn lowest_free_slot_is_reused() {
        let mut table = FileTable::with_standard_streams();
        assert_eq!(table.add(File::ConsoleOutput).unwrap(), RawFd::new(2));
        assert_eq!(table.add(File::ConsoleOutput).unwrap(), RawFd::new(3));
        table.remove(RawFd::new(2)).unwrap();
        assert_eq!(table.add(File::ConsoleOutput).unwrap(), RawFd::new(2));
        table.remove(RawFd::STDIN).unwrap();
        assert_eq!(table.add(File::ConsoleOutput).unwrap(), RawFd::STDIN);
    }

    #[test]
    fn table_is_bounded() {
        let mut table = FileTable::with_standard_streams();
        for i in 2..NOFILE {
            assert_eq!(table.add(File::ConsoleOutput).unwrap(), RawFd::new(i));
        }
        assert!(!table.has_free_slot());
        assert!(matches!(
            table.add(File::ConsoleOutput),
            Err(KernelError::TooManyOpenFiles)
        ));
    }

    #[test]
    fn bad_descriptors() {
        let mut table = FileTable::with_standard_streams();
        assert!(matches!(
            table.get_mut(RawFd::new(2)),
            Err(KernelError::FileDescriptorNotOpen(_))
        ));
        assert!(matches!(
            table.get_mut(RawFd::new(NOFILE)),
            Err(KernelError::FileDescriptorOutOfRange(_))
        ));
        table.remove(RawFd::STDOUT).unwrap();
        assert!(matches!(
            table.remove(RawFd::STDOUT),
            Err(KernelError::FileDescriptorNotOpen(_))
        ));
    }

    #[test]
    fn close_all_empties_table() {
        let mut table = FileTable::with_standard_streams();
        table.add(File::ConsoleOutput).unwrap();
        table.close_all();
        assert_eq!(table.open_count(), 0);
    }
}
