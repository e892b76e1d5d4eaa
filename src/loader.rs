//! Turns columnar input into typed demand and stock records.
//!
//! Problems are collected as warnings instead of aborting: a set whose
//! columns disagree in length is dropped whole, duplicate ids keep their
//! first occurrence and rows with non-positive dimensions are skipped.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::InputError;
use crate::types::{Demand, Section, StockElement, StrengthClass};

/// One record set as parallel columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Columns {
    pub id: Vec<u64>,
    pub length: Vec<f64>,
    pub height: Vec<f64>,
    pub width: Vec<f64>,
    pub strength_class: Vec<u32>,
}

/// Whole input document: demands, reclaimed stock and an optional market pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordSet {
    pub demands: Columns,
    pub stock: Columns,
    pub market: Option<Columns>,
}

#[derive(Debug, Clone, Default)]
pub struct Records {
    pub demands: Vec<Demand>,
    pub reclaimed: Vec<StockElement>,
    pub market: Option<Vec<StockElement>>,
    pub warnings: Vec<InputError>,
}

struct Row {
    id: u64,
    length: f64,
    section: Section,
    class: StrengthClass,
}

pub fn load(set: &RecordSet) -> Records {
    let mut warnings = Vec::new();

    let demands: Vec<Demand> = rows("demands", &set.demands, &mut warnings)
        .into_iter()
        .map(|r| Demand::new(r.id, r.length, r.section, r.class))
        .collect();
    let reclaimed: Vec<StockElement> = rows("stock", &set.stock, &mut warnings)
        .into_iter()
        .map(|r| StockElement::original(r.id, r.length, r.section, r.class))
        .collect();
    let market: Option<Vec<StockElement>> = set.market.as_ref().map(|cols| {
        rows("market", cols, &mut warnings)
            .into_iter()
            .map(|r| StockElement::market_template(r.id, r.length, r.section, r.class))
            .collect()
    });

    for w in &warnings {
        warn!("{w}");
    }

    Records {
        demands,
        reclaimed,
        market,
        warnings,
    }
}

pub fn from_json_str(s: &str) -> Result<Records, serde_json::Error> {
    let set: RecordSet = serde_json::from_str(s)?;
    Ok(load(&set))
}

fn rows(set: &str, cols: &Columns, warnings: &mut Vec<InputError>) -> Vec<Row> {
    let expected = cols.id.len();
    let lengths = [
        ("length", cols.length.len()),
        ("height", cols.height.len()),
        ("width", cols.width.len()),
        ("strength_class", cols.strength_class.len()),
    ];
    let mut consistent = true;
    for (column, found) in lengths {
        if found != expected {
            warnings.push(InputError::ColumnLengthMismatch {
                set: set.to_string(),
                column,
                expected,
                found,
            });
            consistent = false;
        }
    }
    if !consistent {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(expected);
    for i in 0..expected {
        let id = cols.id[i];
        if !seen.insert(id) {
            warnings.push(InputError::DuplicateId {
                set: set.to_string(),
                id,
            });
            continue;
        }

        let dims = [
            ("length", cols.length[i]),
            ("height", cols.height[i]),
            ("width", cols.width[i]),
        ];
        if let Some((field, value)) = dims.into_iter().find(|(_, v)| !(*v > 0.0)) {
            warnings.push(InputError::NonPositiveDimension {
                set: set.to_string(),
                id,
                field,
                value,
            });
            continue;
        }

        out.push(Row {
            id,
            length: cols.length[i],
            section: Section::new(cols.width[i], cols.height[i]),
            class: StrengthClass(cols.strength_class[i]),
        });
    }
    out
}
