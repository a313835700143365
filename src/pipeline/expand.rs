use std::collections::BTreeMap;

use anyhow::Result;
use graph::TupleHasher;
use steps::{ParamDict, ParamValue};

use super::config::{ParamEntry, Scalar};
use super::results::ResultsTable;
use super::Error;

/// The sentinel a config value uses to reference the previous component's
/// best value for the same parameter.
const PREVIOUS_BEST_REF: &str = "^";

/// Expand one namespace's parameter entries into the list of fully-resolved
/// flat dicts: every multivalued leaf contributes one axis of a cartesian
/// product. The result is sorted by content hash so downstream numbering
/// never depends on map iteration order.
pub fn expand(
    entries: &BTreeMap<String, ParamEntry>,
    namespace: &str,
    previous: Option<&ResultsTable>,
) -> Result<Vec<ParamDict>> {
    let mut axes: Vec<(String, Vec<ParamValue>)> = Vec::with_capacity(entries.len());
    for (key, entry) in entries {
        axes.push((key.clone(), resolve_entry(entry, namespace, key, previous)?));
    }

    let mut dicts = vec![ParamDict::new()];
    for (key, values) in axes {
        let mut next = Vec::with_capacity(dicts.len() * values.len());
        for dict in dicts {
            for value in &values {
                let mut d = dict.clone();
                d.insert(key.clone(), value.clone());
                next.push(d);
            }
        }
        dicts = next;
    }

    sort_by_hash(&mut dicts);
    Ok(dicts)
}

/// Resolve one config leaf to its list of concrete values.
pub fn resolve_entry(
    entry: &ParamEntry,
    namespace: &str,
    key: &str,
    previous: Option<&ResultsTable>,
) -> Result<Vec<ParamValue>> {
    match entry {
        ParamEntry::One(s) => Ok(vec![resolve_scalar(s, namespace, key, previous)?]),
        ParamEntry::Many(list) => list
            .iter()
            .map(|s| resolve_scalar(s, namespace, key, previous))
            .collect(),
        ParamEntry::Operator {
            reference_value,
            operator,
            arguments,
        } => {
            let reference = resolve_scalar(reference_value, namespace, key, previous)?
                .as_float(key)?;
            let mut values = Vec::with_capacity(arguments.len());
            for arg in arguments {
                let arg = ParamValue::from(arg).as_float(key)?;
                let value = match operator.as_str() {
                    "+" => reference + arg,
                    "-" => reference - arg,
                    "*" => reference * arg,
                    "/" => reference / arg,
                    _ => return Err(Error::UnknownOperator(operator.clone()).into()),
                };
                values.push(ParamValue::Float(value));
            }
            Ok(values)
        }
    }
}

/// A bare scalar resolves to itself, except the '^' sentinel, which pulls
/// the best-scoring value of this parameter from the previous component's
/// results table.
fn resolve_scalar(
    s: &Scalar,
    namespace: &str,
    key: &str,
    previous: Option<&ResultsTable>,
) -> Result<ParamValue> {
    if let Scalar::Str(text) = s {
        if text == PREVIOUS_BEST_REF {
            let column = format!("{namespace}.{key}");
            let table =
                previous.ok_or_else(|| Error::ReferenceWithoutPrevious(column.clone()))?;
            let value = table
                .best_param(&column)
                .ok_or(Error::ReferenceNotInResults(column))?;
            return Ok(value.clone());
        }
    }
    Ok(ParamValue::from(s))
}

/// Sort param dicts by the hash of their interleaved, key-sorted items.
fn sort_by_hash(dicts: &mut [ParamDict]) {
    dicts.sort_by_cached_key(|dict| {
        let mut th = TupleHasher::new();
        for (k, v) in dict {
            th.push(k).push(v);
        }
        th.finish()
    });
}
