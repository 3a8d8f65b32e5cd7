use std::fs;
use std::io;
use std::path::Path;

use crate::fs::File;
use crate::Backend;

/// Options and flags which can be used to configure how a file is opened.
///
/// This mirrors [`std::fs::OpenOptions`]. The open itself is a regular
/// blocking system call; only the reads and writes of the returned [`File`]
/// go through the [`Backend`].
///
/// Generally speaking, when using `OpenOptions`, you'll first call
/// [`OpenOptions::new`], then chain calls to methods to set each option, then
/// call [`OpenOptions::open`], passing the path of the file you're trying to
/// open.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    pub(crate) read: bool,
    pub(crate) write: bool,
    pub(crate) append: bool,
    pub(crate) truncate: bool,
    pub(crate) create: bool,
    pub(crate) create_new: bool,
    pub(crate) direct: bool,
    pub(crate) sync: bool,
    pub(crate) dsync: bool,
    pub(crate) mode: Option<u32>,
    pub(crate) backend: Option<Backend>,
}

impl OpenOptions {
    /// Creates a blank new set of options ready for configuration.
    ///
    /// All options are initially set to `false`, and the file will use
    /// [`Backend::global`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the option for read access.
    pub fn read(&mut self, read: bool) -> &mut Self {
        self.read = read;
        self
    }

    /// Sets the option for write access.
    ///
    /// If the file already exists, any write calls on it will overwrite its
    /// contents, without truncating it.
    pub fn write(&mut self, write: bool) -> &mut Self {
        self.write = write;
        self
    }

    /// Sets the option for the append mode.
    ///
    /// Writes at [`Offset::Current`] always land at the end of the file.
    /// Positioned writes on Linux also append, as documented for `pwrite(2)`.
    ///
    /// [`Offset::Current`]: crate::Offset::Current
    pub fn append(&mut self, append: bool) -> &mut Self {
        self.append = append;
        self
    }

    /// Sets the option for truncating a previous file.
    ///
    /// The file must be opened with write access for truncate to work.
    pub fn truncate(&mut self, truncate: bool) -> &mut Self {
        self.truncate = truncate;
        self
    }

    /// Sets the option to create a new file, or open it if it already exists.
    pub fn create(&mut self, create: bool) -> &mut Self {
        self.create = create;
        self
    }

    /// Sets the option to create a new file, failing if it already exists.
    ///
    /// If `.create_new(true)` is set, [`OpenOptions::create`] and [`OpenOptions::truncate`] are
    /// ignored.
    pub fn create_new(&mut self, create_new: bool) -> &mut Self {
        self.create_new = create_new;
        self
    }

    /// Sets the option to open this file in O_DIRECT mode.
    ///
    /// Note: This will only work for files backed by a disk, and buffers and
    /// offsets must be suitably aligned. Ignored outside Linux.
    pub fn direct(&mut self, direct: bool) -> &mut Self {
        self.direct = direct;
        self
    }

    /// Sets the option to open this file in O_SYNC mode.
    pub fn sync(&mut self, sync: bool) -> &mut Self {
        self.sync = sync;
        self
    }

    /// Sets the option to open this file in O_DSYNC mode.
    pub fn dsync(&mut self, dsync: bool) -> &mut Self {
        self.dsync = dsync;
        self
    }

    /// Sets the permission bits used if the file is created. Defaults to
    /// `0o666`, before the process umask.
    pub fn mode(&mut self, mode: u32) -> &mut Self {
        self.mode = Some(mode);
        self
    }

    /// Sets the backend which services reads and writes on the opened file.
    pub fn backend(&mut self, backend: impl Into<Backend>) -> &mut Self {
        self.backend = Some(backend.into());
        self
    }

    /// Open the file with the configured options.
    pub fn open<P: AsRef<Path>>(&self, path: P) -> io::Result<File> {
        let path = path.as_ref();
        let file = self.as_std().open(path)?;
        let backend = match &self.backend {
            Some(backend) => backend.clone(),
            None => Backend::global().clone(),
        };
        Ok(File::from_std(file, path, backend))
    }

    fn as_std(&self) -> fs::OpenOptions {
        let mut opts = fs::OpenOptions::new();
        opts.read(self.read)
            .write(self.write)
            .append(self.append)
            .truncate(self.truncate)
            .create(self.create)
            .create_new(self.create_new);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.custom_flags(self.custom_flags());
            if let Some(mode) = self.mode {
                opts.mode(mode);
            }
        }
        opts
    }

    #[cfg(unix)]
    pub(crate) fn custom_flags(&self) -> i32 {
        let mut flags = 0;
        #[cfg(target_os = "linux")]
        if self.direct {
            flags |= libc::O_DIRECT;
        }
        if self.sync {
            flags |= libc::O_SYNC;
        }
        if self.dsync {
            flags |= libc::O_DSYNC;
        }
        flags
    }
}
