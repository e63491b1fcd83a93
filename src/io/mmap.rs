//! Input loading: memory-mapped when possible, read into memory otherwise.

use std::fs::File;
use std::io;
use std::path::Path;

use log::{
    info,
    warn,
};
#[cfg(feature = "mmap")]
use memmap2::Mmap;

use crate::errors::{
    Result,
    SortError,
};

/// Whole input file, either mapped or owned.
pub enum InputText {
    #[cfg(feature = "mmap")]
    Mapped(Mmap),
    Owned(String),
}

impl InputText {
    /// Opens `path`, mapping it into memory when `use_mmap` is set and the
    /// platform allows it. Falls back to reading the file on any mapping
    /// failure.
    pub fn open<P: AsRef<Path>>(
        path: P,
        use_mmap: bool,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| open_error(path, e))?;
        let size = file
            .metadata()
            .map_err(|e| SortError::io("getting input file metadata", e))?
            .len();

        #[cfg(feature = "mmap")]
        if use_mmap && size > 0 {
            match Self::map(&file) {
                Ok(mapped) => {
                    info!(
                        "Successfully mapped file to memory, size: {} bytes",
                        size
                    );
                    return Ok(mapped);
                },
                Err(e) => {
                    warn!("mmap failed, falling back to reading file: {}", e)
                },
            }
        }
        #[cfg(not(feature = "mmap"))]
        let _ = use_mmap;

        let mut text = String::with_capacity(size as usize);
        io::Read::read_to_string(&mut io::BufReader::new(file), &mut text)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::InvalidData {
                    SortError::InvalidInput(format!(
                        "file {:?} is not valid UTF-8 text",
                        path
                    ))
                }
                else {
                    SortError::io("reading input file", e)
                }
            })?;
        Ok(InputText::Owned(text))
    }

    #[cfg(feature = "mmap")]
    fn map(file: &File) -> io::Result<Self> {
        // SAFETY: the map is read-only and the file is not modified by this
        // process while the job runs.
        let map = unsafe { Mmap::map(file)? };
        #[cfg(unix)]
        for advice in [memmap2::Advice::WillNeed, memmap2::Advice::Sequential] {
            if let Err(e) = map.advise(advice) {
                warn!("madvise {:?} failed: {}", advice, e);
            }
        }
        Ok(InputText::Mapped(map))
    }

    pub fn is_mapped(&self) -> bool {
        match self {
            #[cfg(feature = "mmap")]
            InputText::Mapped(_) => true,
            InputText::Owned(_) => false,
        }
    }

    pub fn len(&self) -> usize { self.as_bytes().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            #[cfg(feature = "mmap")]
            InputText::Mapped(map) => &map[..],
            InputText::Owned(text) => text.as_bytes(),
        }
    }

    /// Input as text. Mapped input is validated as UTF-8 here.
    pub fn as_str(&self) -> Result<&str> {
        match self {
            #[cfg(feature = "mmap")]
            InputText::Mapped(map) => {
                std::str::from_utf8(map).map_err(|e| {
                    SortError::InvalidInput(format!(
                        "input is not valid UTF-8 text: {}",
                        e
                    ))
                })
            },
            InputText::Owned(text) => Ok(text),
        }
    }
}

fn open_error(
    path: &Path,
    e: io::Error,
) -> SortError {
    match e.kind() {
        io::ErrorKind::NotFound => {
            SortError::InvalidInput(format!("file {:?} does not exist", path))
        },
        io::ErrorKind::PermissionDenied => {
            SortError::InvalidInput(format!("file {:?} is not readable", path))
        },
        _ => SortError::io("opening input file", e),
    }
}
