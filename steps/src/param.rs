use std::collections::BTreeMap;
use std::fmt;

use crate::Error;

/// One configuration value attached to a step as a dependency.
///
/// The canonical string rendering (`Display`) is what gets hashed and what
/// gets written into results tables, so it must be stable across runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

impl ParamValue {
    pub fn as_bool(&self, name: &str) -> Result<bool, Error> {
        match self {
            Self::Bool(b) => Ok(*b),
            _ => Err(Error::WrongParamType(name.to_owned(), "bool")),
        }
    }

    pub fn as_int(&self, name: &str) -> Result<i64, Error> {
        match self {
            Self::Int(i) => Ok(*i),
            _ => Err(Error::WrongParamType(name.to_owned(), "int")),
        }
    }

    /// Ints coerce to float here since YAML grids routinely mix `1` and `1.5`.
    pub fn as_float(&self, name: &str) -> Result<f64, Error> {
        match self {
            Self::Float(x) => Ok(*x),
            Self::Int(i) => Ok(*i as f64),
            _ => Err(Error::WrongParamType(name.to_owned(), "float")),
        }
    }
}

/// A fully-resolved flat parameter set: one concrete value per dotted option
/// name. Ordered so that iteration (and therefore hashing) is deterministic.
pub type ParamDict = BTreeMap<String, ParamValue>;

/// Look up a required parameter by name.
pub fn require<'a>(params: &'a ParamDict, name: &str) -> Result<&'a ParamValue, Error> {
    params
        .get(name)
        .ok_or_else(|| Error::MissingParam(name.to_owned()))
}
