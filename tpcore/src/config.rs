//! Checker configuration, loaded from TOML.
//!
//! ```toml
//! [trig]
//! encoding = "angle-table"
//! angles = [{ degrees = 0, cos = 1.0, sin = 0.0 }, { degrees = 180, cos = -1.0, sin = 0.0 }]
//! # or rows from an `angle,cos,sin` file, which take precedence
//! table = "angles.csv"
//!
//! [solver]
//! command = "z3"
//! args = ["-in", "-smt2"]
//! timeout_ms = 10000
//!
//! [encoder]
//! simplify_path_conditions = true
//! ```
//!
//! Every section and key is optional.
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    str::FromStr,
};

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::error::{TpError, TpResult};

/// How `cos`/`sin` of the heading are encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrigEncoding {
    /// Truncated Taylor polynomials around 0 over the heading in radians.
    #[default]
    Taylor,
    /// Exact lookup; the heading is restricted to the rows of the angle table.
    AngleTable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngleEntry {
    pub degrees: i64,
    pub cos: f64,
    pub sin: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrigConfig {
    pub encoding: TrigEncoding,
    /// Rows of the angle table. Empty means the default table.
    pub angles: Vec<AngleEntry>,
    /// CSV file holding the rows of the angle table.
    pub table: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub command: String,
    pub args: Vec<String>,
    pub timeout_ms: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            command: "z3".to_string(),
            args: vec!["-in".to_string(), "-smt2".to_string()],
            timeout_ms: Some(10_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Pass every path condition through the solver's simplifier.
    pub simplify_path_conditions: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        EncoderConfig {
            simplify_path_conditions: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BmcConfig {
    pub trig: TrigConfig,
    pub solver: SolverConfig,
    pub encoder: EncoderConfig,
}

impl BmcConfig {
    pub fn from_toml_str(source: &str, file: &str) -> TpResult<Self> {
        toml::from_str(source).map_err(|e| TpError::ConfigParseError {
            source: e,
            file: file.to_string(),
        })
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> TpResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source, &path.display().to_string())
    }

    /// Angle table selected by the `[trig]` section.
    pub fn angle_table(&self) -> TpResult<AngleTable> {
        if let Some(path) = &self.trig.table {
            return AngleTable::load(path);
        }
        if self.trig.angles.is_empty() {
            return Ok(AngleTable::default());
        }
        let rows = self
            .trig
            .angles
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                Ok(AngleRow {
                    degrees: entry.degrees,
                    cos: decimal_from_f64(entry.cos, index + 1)?,
                    sin: decimal_from_f64(entry.sin, index + 1)?,
                })
            })
            .collect::<TpResult<Vec<_>>>()?;
        AngleTable::new(rows)
    }
}

fn decimal_from_f64(value: f64, line: usize) -> TpResult<BigDecimal> {
    if !value.is_finite() {
        return Err(TpError::AngleTable {
            line,
            reason: format!("`{}` is not a finite number", value),
        });
    }
    BigDecimal::from_str(&value.to_string()).map_err(|e| TpError::AngleTable {
        line,
        reason: e.to_string(),
    })
}

/// One admissible heading with its exact cosine and sine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AngleRow {
    /// Heading in degrees, normalized to `0..360`.
    pub degrees: i64,
    pub cos: BigDecimal,
    pub sin: BigDecimal,
}

/// The headings the turtle may take under the angle-table encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AngleTable {
    rows: Vec<AngleRow>,
}

impl AngleTable {
    pub fn new(rows: Vec<AngleRow>) -> TpResult<Self> {
        if rows.is_empty() {
            return Err(TpError::AngleTable {
                line: 0,
                reason: "the table has no rows".to_string(),
            });
        }
        let mut seen = BTreeSet::new();
        let mut normalized = Vec::with_capacity(rows.len());
        for (index, row) in rows.into_iter().enumerate() {
            let degrees = row.degrees.rem_euclid(360);
            if !seen.insert(degrees) {
                return Err(TpError::AngleTable {
                    line: index + 1,
                    reason: format!("heading {} is listed twice", degrees),
                });
            }
            normalized.push(AngleRow { degrees, ..row });
        }
        Ok(AngleTable { rows: normalized })
    }

    /// Read `angle,cos,sin` rows, one per line.
    ///
    /// Blank lines and lines starting with `#` are skipped, as is a leading
    /// `angle,cos,sin` header.
    pub fn from_csv(source: &str) -> TpResult<Self> {
        let mut rows = Vec::new();
        for (index, raw) in source.lines().enumerate() {
            let line = index + 1;
            let text = raw.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = text.split(',').map(str::trim).collect();
            if rows.is_empty() && fields.first() == Some(&"angle") {
                continue;
            }
            let [degrees, cos, sin] = fields[..] else {
                return Err(TpError::AngleTable {
                    line,
                    reason: format!("expected 3 fields, found {}", fields.len()),
                });
            };
            let invalid = |what: &str, value: &str| TpError::AngleTable {
                line,
                reason: format!("invalid {} `{}`", what, value),
            };
            rows.push(AngleRow {
                degrees: degrees.parse().map_err(|_| invalid("angle", degrees))?,
                cos: BigDecimal::from_str(cos).map_err(|_| invalid("cosine", cos))?,
                sin: BigDecimal::from_str(sin).map_err(|_| invalid("sine", sin))?,
            });
        }
        Self::new(rows)
    }

    pub fn load(path: &Path) -> TpResult<Self> {
        Self::from_csv(&std::fs::read_to_string(path)?)
    }

    pub fn rows(&self) -> &[AngleRow] {
        &self.rows
    }

    /// Row for a heading in degrees, after normalization.
    pub fn lookup(&self, degrees: i64) -> Option<&AngleRow> {
        let degrees = degrees.rem_euclid(360);
        self.rows.iter().find(|row| row.degrees == degrees)
    }
}

impl Default for AngleTable {
    /// The four axis-aligned headings.
    fn default() -> Self {
        let row = |degrees, cos: i64, sin: i64| AngleRow {
            degrees,
            cos: BigDecimal::from(cos),
            sin: BigDecimal::from(sin),
        };
        AngleTable {
            rows: vec![row(0, 1, 0), row(90, 0, 1), row(180, -1, 0), row(270, 0, -1)],
        }
    }
}
