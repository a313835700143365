use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use steps::{ParamDict, ParamValue};

use crate::fs::Fs;

use super::outdock::MoleculeScore;
use super::Error;

/// Reserved column pointing at the job directory of each row.
pub const JOB_DIR_PATH_COLUMN: &str = "job_dir_path";
/// Prefix for flattened parameter columns.
pub const PARAMETERS_COLUMN_PREFIX: &str = "parameters.";
/// Prefix for the dock file name columns.
pub const DOCKFILES_COLUMN_PREFIX: &str = "dockfiles.";

/// Rank molecules best-first and keep one row per molecule.
///
/// Sorting is ascending by energy; exact score ties are broken by ranking
/// decoys ahead of actives, so a tie never flatters the configuration.
/// Duplicates (same db2 path) keep only their best-scoring row.
pub fn rank_molecules(mut molecules: Vec<MoleculeScore>) -> Vec<MoleculeScore> {
    molecules.sort_by(|a, b| {
        a.total_energy
            .partial_cmp(&b.total_energy)
            .unwrap_or(Ordering::Equal)
            .then(a.is_active.cmp(&b.is_active))
    });
    let mut seen: util::HashSet<String> = util::HashSet::default();
    molecules.retain(|m| seen.insert(m.db2_file_path.clone()));
    molecules
}

/// One configuration's outcome: its flattened parameters, its criterion
/// value, its dock file names, and where its job ran.
#[derive(Debug, Clone)]
pub struct ResultsRow {
    pub params: ParamDict,
    pub criterion: f64,
    pub dock_files: Vec<(String, String)>,
    pub job_dir_path: String,
}

/// The ranked table persisted after each pipeline component, and the
/// contract the next component reads its '^' references from.
#[derive(Debug, Default)]
pub struct ResultsTable {
    pub criterion_name: String,
    pub rows: Vec<ResultsRow>,
}

impl ResultsTable {
    pub fn new(criterion_name: &str, rows: Vec<ResultsRow>) -> Self {
        let mut table = Self {
            criterion_name: criterion_name.to_owned(),
            rows,
        };
        table.sort_descending();
        table
    }

    /// Best criterion value first.
    fn sort_descending(&mut self) {
        self.rows.sort_by(|a, b| {
            b.criterion
                .partial_cmp(&a.criterion)
                .unwrap_or(Ordering::Equal)
        });
    }

    pub fn top_n(&self, n: usize) -> &[ResultsRow] {
        &self.rows[..n.min(self.rows.len())]
    }

    pub fn best(&self) -> Option<&ResultsRow> {
        self.rows.first()
    }

    /// The best row's value for a flattened parameter column
    /// (e.g. "dock_files_generation.vdw.grid_spacing").
    pub fn best_param(&self, column: &str) -> Option<&ParamValue> {
        self.best().and_then(|row| row.params.get(column))
    }

    /// Write the table as CSV: parameter columns (dotted, prefixed), dock
    /// file columns, the criterion, and the job dir pointer.
    pub fn write_csv(&self, fs: &Fs, path: &Path) -> Result<()> {
        let param_columns: BTreeSet<&str> = self
            .rows
            .iter()
            .flat_map(|r| r.params.keys().map(String::as_str))
            .collect();
        let dockfile_columns: BTreeSet<&str> = self
            .rows
            .iter()
            .flat_map(|r| r.dock_files.iter().map(|(role, _)| role.as_str()))
            .collect();

        let mut out = String::with_capacity(256 * (self.rows.len() + 1));
        for column in &param_columns {
            out.push_str(PARAMETERS_COLUMN_PREFIX);
            out.push_str(column);
            out.push(',');
        }
        for column in &dockfile_columns {
            out.push_str(DOCKFILES_COLUMN_PREFIX);
            out.push_str(column);
            out.push(',');
        }
        out.push_str(&self.criterion_name);
        out.push(',');
        out.push_str(JOB_DIR_PATH_COLUMN);
        out.push('\n');

        for row in &self.rows {
            for column in &param_columns {
                if let Some(value) = row.params.get(*column) {
                    out.push_str(&value.to_string());
                }
                out.push(',');
            }
            for column in &dockfile_columns {
                if let Some((_, name)) = row.dock_files.iter().find(|(role, _)| role == column) {
                    out.push_str(name);
                }
                out.push(',');
            }
            out.push_str(&row.criterion.to_string());
            out.push(',');
            out.push_str(&row.job_dir_path);
            out.push('\n');
        }

        fs.write_file(path, &out)
            .with_context(|| format!("writing results table {:?}", path))
    }

    /// Read a table previously written with `write_csv`. Cell values are
    /// re-typed by parsing: bool, then int, then float, then string.
    pub fn read_csv(fs: &Fs, path: &Path) -> Result<Self> {
        let text = fs.read_to_string(path)?;
        let mut lines = text.lines();
        let header = lines.next().ok_or(Error::EmptyResultsTable)?;
        let columns: Vec<&str> = header.split(',').collect();

        let criterion_name = columns
            .iter()
            .find(|c| {
                !c.starts_with(PARAMETERS_COLUMN_PREFIX)
                    && !c.starts_with(DOCKFILES_COLUMN_PREFIX)
                    && **c != JOB_DIR_PATH_COLUMN
            })
            .ok_or(Error::EmptyResultsTable)?
            .to_string();

        let mut rows = Vec::new();
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let cells: Vec<&str> = line.split(',').collect();
            let mut row = ResultsRow {
                params: ParamDict::new(),
                criterion: 0.0,
                dock_files: Vec::new(),
                job_dir_path: String::new(),
            };
            for (column, cell) in columns.iter().zip(cells) {
                if let Some(key) = column.strip_prefix(PARAMETERS_COLUMN_PREFIX) {
                    row.params.insert(key.to_owned(), parse_cell(cell));
                } else if let Some(role) = column.strip_prefix(DOCKFILES_COLUMN_PREFIX) {
                    row.dock_files.push((role.to_owned(), cell.to_owned()));
                } else if *column == JOB_DIR_PATH_COLUMN {
                    row.job_dir_path = cell.to_owned();
                } else if *column == criterion_name {
                    row.criterion = cell.parse().unwrap_or(f64::NEG_INFINITY);
                }
            }
            rows.push(row);
        }

        Ok(Self {
            criterion_name,
            rows,
        })
    }
}

fn parse_cell(cell: &str) -> ParamValue {
    if let Ok(b) = cell.parse::<bool>() {
        ParamValue::Bool(b)
    } else if let Ok(i) = cell.parse::<i64>() {
        ParamValue::Int(i)
    } else if let Ok(x) = cell.parse::<f64>() {
        ParamValue::Float(x)
    } else {
        ParamValue::Str(cell.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn molecule(db2: &str, energy: f64, is_active: bool) -> MoleculeScore {
        MoleculeScore {
            db2_file_path: db2.to_owned(),
            total_energy: energy,
            is_active,
        }
    }

    #[test]
    fn test_tied_scores_rank_decoys_ahead_of_actives() {
        let ranked = rank_molecules(vec![
            molecule("active.db2", -40.0, true),
            molecule("decoy.db2", -40.0, false),
        ]);
        assert!(!ranked[0].is_active);
        assert!(ranked[1].is_active);
    }

    #[test]
    fn test_duplicates_keep_best_score() {
        let ranked = rank_molecules(vec![
            molecule("same.db2", -20.0, true),
            molecule("same.db2", -40.0, true),
            molecule("other.db2", -30.0, false),
        ]);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].db2_file_path, "same.db2");
        assert_eq!(ranked[0].total_energy, -40.0);
    }

    fn row(spacing: f64, criterion: f64, dir: &str) -> ResultsRow {
        let mut params = ParamDict::new();
        params.insert(
            "dock_files_generation.vdw.grid_spacing".to_owned(),
            ParamValue::Float(spacing),
        );
        ResultsRow {
            params,
            criterion,
            dock_files: vec![("vdw_file".to_owned(), "vdw.vdw_1".to_owned())],
            job_dir_path: dir.to_owned(),
        }
    }

    #[test]
    fn test_table_sorts_descending_by_criterion() {
        let table = ResultsTable::new(
            "enrichment_score",
            vec![row(0.2, 0.1, "a"), row(0.3, 0.9, "b"), row(0.4, 0.5, "c")],
        );
        let dirs: Vec<&str> = table.rows.iter().map(|r| r.job_dir_path.as_str()).collect();
        assert_eq!(dirs, vec!["b", "c", "a"]);
        assert_eq!(table.top_n(2).len(), 2);
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let fs = Fs::new(dir.path(), false);
        let path = dir.path().join("results.csv");

        let table = ResultsTable::new("enrichment_score", vec![row(0.2, 0.25, "jobs/1")]);
        table.write_csv(&fs, &path).unwrap();

        let loaded = ResultsTable::read_csv(&fs, &path).unwrap();
        assert_eq!(loaded.criterion_name, "enrichment_score");
        assert_eq!(loaded.rows.len(), 1);
        assert_eq!(loaded.rows[0].criterion, 0.25);
        assert_eq!(loaded.rows[0].job_dir_path, "jobs/1");
        assert_eq!(
            loaded.best_param("dock_files_generation.vdw.grid_spacing"),
            Some(&ParamValue::Float(0.2)),
        );
        assert_eq!(
            loaded.rows[0].dock_files,
            vec![("vdw_file".to_owned(), "vdw.vdw_1".to_owned())],
        );
    }
}
