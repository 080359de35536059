//! Atomic scattering factor tables.
//!
//! A table lists the atomic form factor `f` against the momentum transfer
//! `q = sin(θ)/λ` (nm⁻¹), one `q f` pair per line. Tables are loaded on
//! demand into a [`ScatteringLibrary`] owned by the caller.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info};

use crate::error::LaueError;

/// Form factor table for one element, sorted by increasing `q`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatteringTable {
    rows: Vec<(f64, f64)>,
}

impl ScatteringTable {
    /// Build a table from `(q, f)` rows; rows are sorted by `q`.
    pub fn from_rows(mut rows: Vec<(f64, f64)>) -> Result<Self, LaueError> {
        if rows.is_empty() {
            return Err(LaueError::EmptyScatteringTable);
        }
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(Self { rows })
    }

    /// Parse whitespace-separated `q f` lines. Blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let mut rows = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (Some(q), Some(f)) = (fields.next(), fields.next()) else {
                anyhow::bail!("line {}: expected two columns, got '{line}'", lineno + 1);
            };
            let q: f64 = q.parse().with_context(|| format!("line {}: bad q value", lineno + 1))?;
            let f: f64 = f.parse().with_context(|| format!("line {}: bad f value", lineno + 1))?;
            rows.push((q, f));
        }
        Ok(Self::from_rows(rows)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scattering table {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid scattering table {}", path.display()))
    }

    pub fn rows(&self) -> &[(f64, f64)] {
        &self.rows
    }

    /// Form factor at `q` relative to the first row.
    ///
    /// Uses the row with the largest tabulated `q` strictly below the query,
    /// or the first row when there is none.
    pub fn relative_factor(&self, q: f64) -> f64 {
        let idx = self.rows.partition_point(|&(qi, _)| qi < q).saturating_sub(1);
        self.rows[idx].1 / self.rows[0].1
    }
}

/// Lazily populated set of scattering tables, keyed by element symbol.
///
/// Tables are read from `<dir>/<symbol>_atom_scattering.txt` the first time
/// they are requested, or registered directly with [`ScatteringLibrary::insert`].
#[derive(Debug, Clone, Default)]
pub struct ScatteringLibrary {
    dir: Option<PathBuf>,
    tables: HashMap<String, ScatteringTable>,
}

impl ScatteringLibrary {
    /// Library backed by a directory of table files.
    pub fn from_dir<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: Some(dir.into()),
            tables: HashMap::new(),
        }
    }

    pub fn insert(&mut self, symbol: &str, table: ScatteringTable) {
        self.tables.insert(symbol.to_string(), table);
    }

    /// Table for `symbol`, loading it from disk on first use.
    pub fn load(&mut self, symbol: &str) -> anyhow::Result<&ScatteringTable> {
        if !self.tables.contains_key(symbol) {
            let Some(dir) = &self.dir else {
                return Err(LaueError::MissingScatteringTable(symbol.to_string()).into());
            };
            let path = dir.join(format!("{symbol}_atom_scattering.txt"));
            let table = ScatteringTable::from_file(&path)?;
            info!("Loaded {} scattering rows for {symbol} from {}", table.rows.len(), path.display());
            self.tables.insert(symbol.to_string(), table);
        } else {
            debug!("Scattering table for {symbol} already cached");
        }
        self.tables
            .get(symbol)
            .ok_or_else(|| LaueError::MissingScatteringTable(symbol.to_string()).into())
    }

    /// Table for `symbol` if it is already loaded.
    pub fn get(&self, symbol: &str) -> Option<&ScatteringTable> {
        self.tables.get(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NI_TABLE: &str = "# q f\n0.0 28.0\n1.0 25.0\n2.0 20.0\n\n3.0 14.0\n";

    #[test]
    fn test_parse_and_lookup() {
        let t = ScatteringTable::parse(NI_TABLE).unwrap();
        assert_eq!(t.rows().len(), 4);
        // Largest q strictly below the query
        assert_eq!(t.relative_factor(1.5), 25.0 / 28.0);
        assert_eq!(t.relative_factor(2.0), 25.0 / 28.0);
        assert_eq!(t.relative_factor(10.0), 14.0 / 28.0);
        // Nothing below: first row
        assert_eq!(t.relative_factor(0.0), 1.0);
        assert_eq!(t.relative_factor(-1.0), 1.0);
    }

    #[test]
    fn test_rows_are_sorted() {
        let t = ScatteringTable::from_rows(vec![(2.0, 5.0), (0.0, 10.0), (1.0, 8.0)]).unwrap();
        assert_eq!(t.rows()[0], (0.0, 10.0));
        assert_eq!(t.relative_factor(1.5), 0.8);
    }

    #[test]
    fn test_bad_tables() {
        assert!(matches!(
            ScatteringTable::from_rows(vec![]),
            Err(LaueError::EmptyScatteringTable)
        ));
        assert!(ScatteringTable::parse("0.0\n").is_err());
        assert!(ScatteringTable::parse("0.0 abc\n").is_err());
        assert!(ScatteringTable::parse("# nothing\n").is_err());
    }

    #[test]
    fn test_library_loads_from_dir_once() {
        let dir = std::env::temp_dir().join(format!("laue_scattering_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Ni_atom_scattering.txt"), NI_TABLE).unwrap();

        let mut lib = ScatteringLibrary::from_dir(&dir);
        assert!(lib.get("Ni").is_none());
        assert_eq!(lib.load("Ni").unwrap().rows().len(), 4);
        assert!(lib.get("Ni").is_some());
        assert!(lib.load("Xx").is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_library_without_dir() {
        let mut lib = ScatteringLibrary::default();
        let err = lib.load("Ni").unwrap_err();
        assert!(err.downcast_ref::<LaueError>().is_some());
        lib.insert("Ni", ScatteringTable::parse(NI_TABLE).unwrap());
        assert!(lib.load("Ni").is_ok());
    }
}
