//! FIFO creation and non-blocking open.

use std::fs::{self, File, OpenOptions, Permissions};
use std::io;
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt, PermissionsExt};
use std::path::Path;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use tracing::{debug, warn};

use crate::{AppError, Result};

/// Mode bits for freshly created FIFOs: read/write for everyone.
const FIFO_MODE: u32 = 0o666;

/// Outcome of a non-blocking open for writing.
#[derive(Debug)]
pub enum WriteOpen {
    /// A reader is attached; the handle is ready for writing.
    Ready(File),
    /// No reader is attached yet. Not an error; the caller may retry.
    NotReady,
}

/// Create a FIFO at `path` unless some entry already exists there.
///
/// Existing entries are left untouched, permissions included. Losing a
/// creation race to another process counts as success.
///
/// # Errors
///
/// Returns `AppError::Creation` if the entry cannot be inspected or created.
pub fn ensure(path: &Path) -> Result<()> {
    match fs::metadata(path) {
        Ok(meta) => {
            if !meta.file_type().is_fifo() {
                warn!(path = %path.display(), "existing entry is not a fifo");
            }
            return Ok(());
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(AppError::Creation(format!(
                "cannot inspect {}: {err}",
                path.display()
            )));
        }
    }

    match mkfifo(path, Mode::from_bits_truncate(FIFO_MODE)) {
        Ok(()) => {
            // mkfifo honours the umask; widen to the intended mode.
            fs::set_permissions(path, Permissions::from_mode(FIFO_MODE)).map_err(|err| {
                AppError::Creation(format!(
                    "cannot set permissions on {}: {err}",
                    path.display()
                ))
            })?;
            debug!(path = %path.display(), "created fifo");
            Ok(())
        }
        Err(Errno::EEXIST) => {
            debug!(path = %path.display(), "fifo created concurrently");
            Ok(())
        }
        Err(errno) => Err(AppError::Creation(format!(
            "cannot create fifo {}: {errno}",
            path.display()
        ))),
    }
}

/// Open `path` for reading without blocking on a writer.
///
/// # Errors
///
/// Returns `AppError::Open` on any failure, including a missing entry.
pub fn open_for_read(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .custom_flags(OFlag::O_NONBLOCK.bits())
        .open(path)
        .map_err(|err| {
            AppError::Open(format!(
                "cannot open {} for reading: {err}",
                path.display()
            ))
        })
}

/// Open `path` for writing without blocking on a reader.
///
/// # Errors
///
/// Returns `AppError::Open` for failures other than the "no reader attached"
/// conditions, which are reported as [`WriteOpen::NotReady`].
pub fn open_for_write(path: &Path) -> Result<WriteOpen> {
    match OpenOptions::new()
        .write(true)
        .custom_flags(OFlag::O_NONBLOCK.bits())
        .open(path)
    {
        Ok(file) => Ok(WriteOpen::Ready(file)),
        Err(err) if is_reader_absent(&err) => Ok(WriteOpen::NotReady),
        Err(err) => Err(AppError::Open(format!(
            "cannot open {} for writing: {err}",
            path.display()
        ))),
    }
}

/// `ENXIO` is what POSIX returns for a write-only non-blocking open with no
/// reader; `EAGAIN` (alias `EWOULDBLOCK`) covers platforms that report it as
/// a would-block condition instead.
fn is_reader_absent(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error().map(Errno::from_raw),
        Some(Errno::ENXIO | Errno::EAGAIN)
    )
}
