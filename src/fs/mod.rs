use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use util::PathEncodingError;

/// Utility fns
mod ops;

/// Defines fns for creating common paths in the job directory
pub mod paths;
pub use paths::JobPaths;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Path is neither file nor dir: {0}")]
    UnknownPathType(String),
    #[error("Specified job directory \"{0}\" is not a directory")]
    NotDirectory(String),
    #[error("Can't perform IO operation: \"{0}\" is not whitelisted")]
    NotWhitelisted(String),
}

/// All file operations in the crate should go through this struct.
///
/// All destructive operations check that the path in question is a child of
/// the single whitelisted prefix (the job dir), otherwise they will not be
/// performed. Step programs run by the executor can break this rule; it is up
/// to the user to make sure their installed programs behave.
#[derive(Debug)]
pub struct Fs {
    /// The directory we are allowed to modify
    job_prefix: PathBuf,
    /// if true, prevents all destructive operations
    dry_run: bool,
}

impl Fs {
    /// Create a new `Fs` rooted at the given job directory.
    pub fn new(job_prefix: &Path, dry_run: bool) -> Self {
        Self {
            job_prefix: job_prefix.to_path_buf(),
            dry_run,
        }
    }

    /// Check whether job dir exists, and create it if not.
    pub fn ensure_job_dir_exists(&mut self, verbose: bool) -> Result<()> {
        if !self.job_prefix.exists() {
            if self.dry_run {
                eprintln!("Dry run. Not creating job directory {:?}", self.job_prefix);
            } else {
                eprintln!(
                    "Job directory {:?} doesn't exist. Creating.",
                    self.job_prefix
                );
                fs::create_dir_all(&self.job_prefix).context("creating job directory")?;
            }
        } else if !self.job_prefix.is_dir() {
            return Err(Error::NotDirectory(
                self.job_prefix
                    .to_str()
                    .ok_or(PathEncodingError)?
                    .to_string(),
            )
            .into());
        } else if verbose {
            eprintln!(
                "Job directory {:?} already exists. Not creating.",
                self.job_prefix
            );
        }

        if !self.dry_run {
            self.job_prefix = self.job_prefix.canonicalize()?;
        }
        Ok(())
    }

    /// Canonicalized job dir prefix.
    pub fn job_dir(&self) -> &Path {
        &self.job_prefix
    }

    /// Check if path exists on disk.
    pub fn exists<T: AsRef<Path>>(&self, path: T) -> bool {
        let path = path.as_ref();
        path.exists() || path.is_symlink()
    }

    /// Create a directory (uses `std::fs::create_dir_all`, so an entire tree of dirs can be created).
    pub fn create_dir<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::create_dir_all(path).context("creating dir")?;
        Ok(())
    }

    /// Create a file, and return a writable `File` handle.
    pub fn create_file<T: AsRef<Path>>(&self, path: T) -> Result<fs::File> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        let f = fs::File::create(path).context("creating file")?;
        Ok(f)
    }

    /// Write entire str to a file.
    pub fn write_file<T: AsRef<Path>>(&self, path: T, text: &str) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::write(path, text).context("writing file")?;
        Ok(())
    }

    /// Delete a file.
    pub fn delete_file<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::remove_file(path).context("deleting file")?;
        Ok(())
    }

    /// Recursively delete a directory.
    pub fn delete_dir<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::remove_dir_all(path).context("deleting dir")?;
        Ok(())
    }

    /// Symlink `symlink` to `tgt`.
    pub fn symlink<T: AsRef<Path>, U: AsRef<Path>>(&self, tgt: T, symlink: U) -> Result<()> {
        let (tgt, symlink) = (tgt.as_ref(), symlink.as_ref());
        self.check_whitelist(symlink)?;
        ops::symlink(tgt, symlink)
            .with_context(|| format!("symlinking {:?} to {:?}", symlink, tgt))?;
        Ok(())
    }

    /// Copy `src` to `tgt`, recursively if `src` is a directory.
    pub fn copy<T: AsRef<Path>, U: AsRef<Path>>(&self, src: T, tgt: U) -> Result<()> {
        let (src, tgt) = (src.as_ref(), tgt.as_ref());
        self.check_whitelist(tgt)?;
        ops::copy(src, tgt).context("copying file")?;
        Ok(())
    }

    /// Read entire file into a String.
    pub fn read_to_string<T: AsRef<Path>>(&self, path: T) -> Result<String> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading file {:?}", path))?;
        Ok(text)
    }

    fn is_whitelisted<T: AsRef<Path>>(&self, path: T) -> bool {
        let path = path.as_ref();
        if path.starts_with(&self.job_prefix) {
            return true;
        }
        false
    }

    fn check_whitelist(&self, path: &Path) -> Result<()> {
        if self.dry_run || !self.is_whitelisted(path) {
            Err(Error::NotWhitelisted(path.to_str().ok_or(PathEncodingError)?.to_owned()).into())
        } else {
            Ok(())
        }
    }
}
