use std::fs;
use std::path::Path;

use anyhow::Result;

use util::PathEncodingError;

use super::Error;

/// Copy `src` to `tgt`, recursively if needed.
pub fn copy(src: &Path, tgt: &Path) -> Result<()> {
    if src.is_symlink() {
        // resolve links while copying; job promotion should produce real files
        fs::copy(src.canonicalize()?, tgt)?;
    } else if src.is_file() {
        fs::copy(src, tgt)?;
    } else if src.is_dir() {
        cp_dir(src, tgt)?;
    } else {
        return Err(
            Error::UnknownPathType(src.to_str().ok_or(PathEncodingError)?.to_owned()).into(),
        );
    }
    Ok(())
}

fn cp_dir(src: &Path, tgt: &Path) -> Result<()> {
    fs::create_dir_all(tgt)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let ty = entry.file_type()?;
        let src_entry = entry.path();
        let tgt_entry = tgt.join(entry.file_name());
        if ty.is_dir() {
            cp_dir(&src_entry, &tgt_entry)?;
        } else {
            copy(&src_entry, &tgt_entry)?;
        }
    }
    Ok(())
}

/// Symlink the given `link` to `tgt`; works for unix and windows.
pub fn symlink(tgt: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    std::os::unix::fs::symlink(tgt, link)?;

    #[cfg(windows)]
    if tgt.is_dir() {
        std::os::windows::fs::link_dir(tgt, link)?;
    } else {
        std::os::windows::fs::link_file(tgt, link)?;
    }
    Ok(())
}
