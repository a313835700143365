use std::path::Path;

use anyhow::{Context, Result};

use crate::fs::Fs;

use super::Error;

/// One scored pose from an OUTDOCK file.
#[derive(Debug, Clone, PartialEq)]
pub struct MoleculeScore {
    pub db2_file_path: String,
    pub total_energy: f64,
    pub is_active: bool,
}

const OPEN_PREFIX: &str = "open the file:";
const INPUT_PREFIX: &str = "Input ligand:";
const CLOSE_PREFIX: &str = "close the file:";

/// Parse one OUTDOCK file into molecule scores.
///
/// The file interleaves bookkeeping lines with score rows. Molecules are
/// bracketed by "open the file:" / "close the file:" pairs naming the same
/// db2 path; score rows are the lines inside whose first token is an
/// integer, with the total energy in the last column. Rows whose energy
/// column is missing or unparseable are dropped (the program writes partial
/// rows for poses it rejects).
pub fn parse_outdock(fs: &Fs, path: &Path, is_active: bool) -> Result<Vec<MoleculeScore>> {
    let text = fs
        .read_to_string(path)
        .with_context(|| format!("reading outdock file {:?}", path))?;

    let mut scores = Vec::new();
    let mut current_db2: Option<String> = None;

    for line in text.lines() {
        let line = line.trim();
        if let Some(db2) = strip_open(line) {
            if current_db2.is_some() {
                return Err(Error::MalformedOutdock(
                    "open with no matching close".to_owned(),
                )
                .into());
            }
            current_db2 = Some(db2.to_owned());
        } else if let Some(db2) = line.strip_prefix(CLOSE_PREFIX) {
            match current_db2.take() {
                Some(open_db2) if open_db2 == db2.trim() => {}
                Some(_) => {
                    return Err(Error::MalformedOutdock(
                        "open and close lines do not match".to_owned(),
                    )
                    .into());
                }
                None => {
                    return Err(
                        Error::MalformedOutdock("close with no open".to_owned()).into()
                    );
                }
            }
        } else if let Some(db2) = &current_db2 {
            let mut tokens = line.split_whitespace();
            let Some(first) = tokens.next() else { continue };
            if first.parse::<u64>().is_err() {
                continue;
            }
            let Some(last) = tokens.last() else { continue };
            let Ok(total_energy) = last.parse::<f64>() else {
                continue;
            };
            scores.push(MoleculeScore {
                db2_file_path: db2.clone(),
                total_energy,
                is_active,
            });
        }
    }

    if current_db2.is_some() {
        return Err(Error::MalformedOutdock("unclosed molecule block".to_owned()).into());
    }
    Ok(scores)
}

fn strip_open(line: &str) -> Option<&str> {
    line.strip_prefix(OPEN_PREFIX)
        .or_else(|| line.strip_prefix(INPUT_PREFIX))
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
 some preamble the program writes
 mol#     id_num    rank    charge    elect    vdW    Total
open the file: /db/actives/0001.db2.gz
  1  ZINC001  1  0.0  -5.2  -12.1  -38.91
  2  ZINC001  2  0.0  -4.9  -11.8  -35.20
close the file: /db/actives/0001.db2.gz
open the file: /db/actives/0002.db2.gz
  we could not dock this one
close the file: /db/actives/0002.db2.gz
";

    fn fs_with(text: &str) -> (tempfile::TempDir, Fs, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let fs = Fs::new(dir.path(), false);
        let path = dir.path().join("OUTDOCK.0");
        fs.write_file(&path, text).unwrap();
        (dir, fs, path)
    }

    #[test]
    fn test_parses_score_rows_per_molecule() {
        let (_dir, fs, path) = fs_with(SAMPLE);
        let scores = parse_outdock(&fs, &path, true).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].db2_file_path, "/db/actives/0001.db2.gz");
        assert_eq!(scores[0].total_energy, -38.91);
        assert!(scores.iter().all(|s| s.is_active));
    }

    #[test]
    fn test_unmatched_close_is_an_error() {
        let (_dir, fs, path) = fs_with(
            "open the file: /db/a.db2\n  1  Z  1  -38.0\nclose the file: /db/b.db2\n",
        );
        assert!(parse_outdock(&fs, &path, false).is_err());
    }

    #[test]
    fn test_unclosed_block_is_an_error() {
        let (_dir, fs, path) = fs_with("open the file: /db/a.db2\n  1  Z  1  -38.0\n");
        assert!(parse_outdock(&fs, &path, false).is_err());
    }

    #[test]
    fn test_rows_without_parseable_energy_are_dropped() {
        let (_dir, fs, path) = fs_with(
            "open the file: /db/a.db2\n  1  Z  1  no_energy\n  2  Z  2  -20.5\nclose the file: /db/a.db2\n",
        );
        let scores = parse_outdock(&fs, &path, false).unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].total_energy, -20.5);
    }
}
