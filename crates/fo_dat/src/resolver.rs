//! Lookup across loose directories and a stack of mounted archives.
//!
//! Loose directories are probed first, in the order they were added, so files on disk override
//! archived copies. Archives are then probed in mount order and the first one holding the path
//! wins.

use std::{
    collections::HashSet,
    fmt::{self, Debug},
    fs::File,
    io::{self, BufReader, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use bon::Builder;
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use crate::{
    error::{Error, FileNotFoundError, Result},
    file::{PlainFile, VirtualFile},
    index::{normalize_path, ListMatcher},
    paths::PathKind,
    read::{ArchiveOptions, DatArchive, DatFile},
};

/// Sources a [`SourceResolver`] starts with
#[derive(Debug, Clone, Default, Builder)]
pub struct ResolverOptions {
    /// Directories probed for loose files, highest priority first
    #[builder(default)]
    pub loose_dirs: Vec<PathBuf>,

    /// Archives mounted after the loose directories, highest priority first
    #[builder(default)]
    pub archives: Vec<PathBuf>,

    /// Options every mounted archive is read with
    #[builder(default)]
    pub archive_options: ArchiveOptions,
}

/// A file on disk read through the same clamped cursor as stored entries
#[derive(Debug)]
pub struct LooseFile {
    path: PathBuf,
    file: File,
    inner: PlainFile,
}

impl LooseFile {
    /// Open the file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let open_failed = |source| Error::OpenFailed {
            path: path.to_owned(),
            source,
        };

        let file = File::open(path).map_err(open_failed)?;
        let meta = file.metadata().map_err(open_failed)?;
        if !meta.is_file() {
            return Err(open_failed(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }
        let len = meta.len();

        Ok(Self {
            path: path.to_owned(),
            file,
            inner: PlainFile::new(0, len),
        })
    }

    /// Location on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the file
    pub fn size(&self) -> u64 {
        self.inner.size()
    }

    /// Current position
    pub fn tell(&self) -> u64 {
        self.inner.tell()
    }

    /// Whether the whole file has been read
    pub fn eof(&self) -> bool {
        self.inner.eof()
    }
}

impl Read for LooseFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.inner.read(&mut self.file, buf)?)
    }
}

impl Seek for LooseFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.inner.seek(&mut self.file, pos)?)
    }
}

/// An open asset, wherever it was found
///
/// Dropping it closes it. A packed asset borrows its archive until then.
#[derive(Debug)]
pub enum Asset<'a> {
    /// Found in a loose directory
    Loose(LooseFile),
    /// Found in a mounted archive
    Packed(DatFile<'a, BufReader<File>>),
}

impl Asset<'_> {
    /// Size of the asset once decoded
    pub fn size(&self) -> u64 {
        match self {
            Asset::Loose(f) => f.size(),
            Asset::Packed(f) => f.size(),
        }
    }

    /// Current position
    pub fn tell(&self) -> u64 {
        match self {
            Asset::Loose(f) => f.tell(),
            Asset::Packed(f) => f.tell(),
        }
    }

    /// Whether the whole asset has been read
    pub fn eof(&self) -> bool {
        match self {
            Asset::Loose(f) => f.eof(),
            Asset::Packed(f) => f.eof(),
        }
    }

    /// Whether the asset came from a loose directory
    pub fn is_loose(&self) -> bool {
        matches!(self, Asset::Loose(_))
    }

    /// Close the asset
    pub fn close(self) {}
}

impl Read for Asset<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Asset::Loose(f) => f.read(buf),
            Asset::Packed(f) => f.read(buf),
        }
    }
}

impl Seek for Asset<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Asset::Loose(f) => f.seek(pos),
            Asset::Packed(f) => f.seek(pos),
        }
    }
}

struct MountedArchive {
    path: PathBuf,
    archive: DatArchive<BufReader<File>>,
}

/// Resolves asset paths against loose directories, then mounted archives
///
/// ```no_run
/// use std::io::Read;
///
/// fn load_palette() -> fo_dat::error::Result<Vec<u8>> {
///     let mut resolver = fo_dat::SourceResolver::new(
///         fo_dat::ResolverOptions::builder()
///             .loose_dirs(vec!["data".into()])
///             .archives(vec!["master.dat".into(), "critter.dat".into()])
///             .build(),
///     )?;
///
///     let mut buf = Vec::new();
///     resolver.open("color.pal")?.read_to_end(&mut buf)?;
///     Ok(buf)
/// }
/// ```
pub struct SourceResolver {
    loose_dirs: Vec<PathBuf>,
    archives: Vec<MountedArchive>,
    archive_options: ArchiveOptions,
}

impl Debug for SourceResolver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SourceResolver")
            .field("sources", &self.sources())
            .finish()
    }
}

impl SourceResolver {
    /// Mount every archive in `options`, failing on the first one that cannot be read
    #[instrument(err)]
    pub fn new(options: ResolverOptions) -> Result<Self> {
        let mut resolver = Self {
            loose_dirs: options.loose_dirs,
            archives: Vec::with_capacity(options.archives.len()),
            archive_options: options.archive_options,
        };

        for path in &options.archives {
            resolver.mount(path)?;
        }

        Ok(resolver)
    }

    /// Add a loose directory below those already added
    pub fn add_loose_dir<P: Into<PathBuf>>(&mut self, dir: P) {
        self.loose_dirs.push(dir.into());
    }

    /// Mount an archive below those already mounted
    pub fn mount<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let archive = DatArchive::open_with_options(path, self.archive_options)?;
        self.archives.push(MountedArchive {
            path: path.to_owned(),
            archive,
        });
        Ok(())
    }

    /// Every source in probe order
    pub fn sources(&self) -> Vec<String> {
        self.loose_dirs
            .iter()
            .chain(self.archives.iter().map(|mounted| &mounted.path))
            .map(|path| path.display().to_string())
            .collect()
    }

    /// Mounted archives in probe order
    pub fn archives(&self) -> impl Iterator<Item = (&Path, &DatArchive<BufReader<File>>)> {
        self.archives
            .iter()
            .map(|mounted| (mounted.path.as_path(), &mounted.archive))
    }

    /// Open `path` from the first source holding it
    ///
    /// A loose copy that exists but cannot be opened is skipped with a warning.
    #[instrument(skip(self))]
    pub fn open(&mut self, path: &str) -> Result<Asset<'_>> {
        if let Some(loose) = self.open_loose(path) {
            debug!(path = %loose.path().display(), "found loose file");
            return Ok(Asset::Loose(loose));
        }

        let Some(position) = self.find_archive(path) else {
            return Err(self.not_found(path));
        };

        let mounted = &mut self.archives[position];
        debug!(archive = %mounted.path.display(), "found in archive");
        Ok(Asset::Packed(mounted.archive.open_file(path)?))
    }

    /// Open `name` inside a well known directory
    pub fn open_kind(&mut self, kind: PathKind, name: &str) -> Result<Asset<'_>> {
        self.open(&kind.join(name))
    }

    /// Size of `path` in the first source holding it
    pub fn file_size(&self, path: &str) -> Option<u64> {
        if let Some(loose) = self.open_loose(path) {
            return Some(loose.size());
        }

        self.find_archive(path)
            .and_then(|position| self.archives[position].archive.file_size(path))
    }

    /// Load `path` from the first source holding it
    #[instrument(skip(self), err)]
    pub fn read_file(&mut self, path: &str) -> Result<Vec<u8>> {
        if let Some(mut loose) = self.open_loose(path) {
            let mut out = Vec::new();
            loose.read_to_end(&mut out)?;
            return Ok(out);
        }

        let Some(position) = self.find_archive(path) else {
            return Err(self.not_found(path));
        };
        self.archives[position].archive.read_file(path)
    }

    /// Names under `prefix` across every source, loose files first, without duplicates
    ///
    /// See [`crate::ArchiveIndex::list_files`] for how `prefix` and `ext` match.
    pub fn list_files(&self, prefix: &str, include_subdirs: bool, ext: &str) -> Vec<String> {
        let matcher = ListMatcher::new(prefix, include_subdirs, ext);
        let mut seen = HashSet::new();
        let mut names = Vec::new();

        for dir in &self.loose_dirs {
            let start = dir.join(matcher.prefix());
            let root = if start.is_dir() { start } else { dir.clone() };

            for entry in WalkDir::new(&root).min_depth(1) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        warn!(%err, "unable to walk loose directory");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }

                let Ok(relative) = entry.path().strip_prefix(dir) else {
                    continue;
                };
                let name = relative
                    .components()
                    .map(|part| part.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");

                let key = normalize_path(&name);
                if matcher.matches(&key) && seen.insert(key) {
                    names.push(name);
                }
            }
        }

        for mounted in &self.archives {
            for name in mounted.archive.list_files(prefix, include_subdirs, ext) {
                if seen.insert(normalize_path(name)) {
                    names.push(name.to_owned());
                }
            }
        }

        names
    }

    fn open_loose(&self, path: &str) -> Option<LooseFile> {
        let as_given = path.trim().replace('\\', "/");
        let as_given = as_given.trim_start_matches('/');
        let normalized = normalize_path(path);
        let lowered = (normalized != as_given).then_some(normalized.as_str());

        for dir in &self.loose_dirs {
            for candidate in std::iter::once(as_given).chain(lowered) {
                match LooseFile::open(dir.join(candidate)) {
                    Ok(file) => return Some(file),
                    Err(Error::OpenFailed { source, .. })
                        if source.kind() == io::ErrorKind::NotFound => {}
                    Err(err) => {
                        warn!(
                            dir = %dir.display(),
                            path,
                            error = ?err,
                            "unable to open loose file, trying the next source"
                        );
                    }
                }
            }
            debug!(source = %dir.display(), path, "not in loose directory");
        }

        None
    }

    fn find_archive(&self, path: &str) -> Option<usize> {
        self.archives.iter().position(|mounted| {
            let found = mounted.archive.contains(path);
            if !found {
                debug!(source = %mounted.path.display(), path, "not in archive");
            }
            found
        })
    }

    fn not_found(&self, path: &str) -> Error {
        Error::FileNotFound(FileNotFoundError::Sources {
            name: path.to_owned(),
            searched: self.sources(),
        })
    }
}
