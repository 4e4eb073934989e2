//! Scoped text files that parse themselves on open and write themselves
//! back when they go out of scope.
//!
//! Every durable piece of state in tusker — queue files, account settings,
//! draft posts — rides on [`FileBacked`]. The handle parses the file
//! line-by-line into an in-memory container on construction and rewrites it
//! (after renaming the previous version to `<name>.bak`) exactly once, on
//! drop or on an explicit [`FileBacked::save`]. The rewrite is reached on
//! every exit path, including early returns and propagated errors.

use std::fs;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// A container that can be rebuilt from the lines of a text file and
/// serialised back out.
pub trait LineBacked: Default {
    /// Skip lines that are entirely whitespace.
    const SKIP_BLANK: bool = true;
    /// Skip lines whose first non-whitespace character is `#`.
    const SKIP_COMMENT: bool = true;

    /// Fold one line of the backing file into the container.
    fn read_line(&mut self, line: &str) -> Result<()>;

    /// Serialise the container back out.
    fn write_all(&self, out: &mut dyn Write) -> io::Result<()>;

    /// When true at rewrite time, the backing file is removed rather than
    /// recreated empty.
    fn is_vacant(&self) -> bool {
        false
    }
}

/// Scoped handle over a parsed text file.
///
/// Dereferences to the parsed container. Read-only handles skip the
/// write-back entirely; everything else is rewritten once, with the prior
/// version kept as a `.bak` sibling.
#[derive(Debug)]
pub struct FileBacked<T: LineBacked> {
    parsed: T,
    path: PathBuf,
    read_only: bool,
    saved: bool,
}

impl<T: LineBacked> FileBacked<T> {
    /// Parse `path` (which need not exist yet) into a fresh container.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(path.into(), false)
    }

    /// Like [`FileBacked::load`], but the file is never written back.
    pub fn load_read_only(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(path.into(), true)
    }

    fn open(path: PathBuf, read_only: bool) -> Result<Self> {
        let mut parsed = T::default();
        if path.exists() {
            let file = fs::File::open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            for line in BufReader::new(file).lines() {
                let line =
                    line.with_context(|| format!("failed to read {}", path.display()))?;
                let line = line.strip_suffix('\r').unwrap_or(line.as_str());
                let first = line.trim_start();
                if T::SKIP_BLANK && first.is_empty() {
                    continue;
                }
                if T::SKIP_COMMENT && first.starts_with('#') {
                    continue;
                }
                parsed
                    .read_line(line)
                    .with_context(|| format!("malformed line in {}", path.display()))?;
            }
        }
        Ok(Self {
            parsed,
            path,
            read_only,
            saved: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the container back now instead of at scope exit.
    ///
    /// Use this where a write failure needs to reach the caller; the drop
    /// handler can only complain to stderr.
    pub fn save(&mut self) -> Result<()> {
        if self.read_only || self.saved {
            return Ok(());
        }
        self.saved = true;
        self.write_back()
    }

    /// Retire the backing file: the current version becomes the `.bak`
    /// sibling and nothing replaces it.
    pub fn delete(mut self) -> Result<()> {
        self.saved = true;
        back_up(&self.path)
    }

    fn write_back(&self) -> Result<()> {
        back_up(&self.path)?;
        if self.parsed.is_vacant() {
            return Ok(());
        }
        let file = fs::File::create(&self.path)
            .with_context(|| format!("failed to create {}", self.path.display()))?;
        let mut out = BufWriter::new(file);
        self.parsed
            .write_all(&mut out)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        out.flush()
            .with_context(|| format!("failed to flush {}", self.path.display()))?;
        Ok(())
    }
}

impl<T: LineBacked> Deref for FileBacked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.parsed
    }
}

impl<T: LineBacked> DerefMut for FileBacked<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.parsed
    }
}

impl<T: LineBacked> Drop for FileBacked<T> {
    fn drop(&mut self) {
        if self.read_only || self.saved {
            return;
        }
        self.saved = true;
        // A failure here has nowhere to propagate; it must not panic out of
        // the drop handler.
        if let Err(err) = self.write_back() {
            eprintln!("warning: failed to save {}: {err:#}", self.path.display());
        }
    }
}

/// Rename `path` to its `.bak` sibling, replacing any previous backup.
///
/// Renaming over an existing file fails on some platforms, so the stale
/// backup is removed first.
fn back_up(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let backup = backup_path(path);
    if backup.exists() {
        fs::remove_file(&backup)
            .with_context(|| format!("failed to remove stale backup {}", backup.display()))?;
    }
    fs::rename(path, &backup)
        .with_context(|| format!("failed to back up {}", path.display()))?;
    Ok(())
}

/// `fav.queue` becomes `fav.queue.bak`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".bak");
    path.with_file_name(name)
}
