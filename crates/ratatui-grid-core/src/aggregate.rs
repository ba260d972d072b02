use crate::column::Column;
use crate::focus::FocusMatrix;
use crate::value::Record;
use crate::value::compare_values;
use crate::value::field;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregateType {
    Sum,
    Average,
    Min,
    Max,
    Count,
    TrueCount,
    FalseCount,
}

impl AggregateType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sum => "Sum",
            Self::Average => "Avg",
            Self::Min => "Min",
            Self::Max => "Max",
            Self::Count => "Count",
            Self::TrueCount => "True",
            Self::FalseCount => "False",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateColumn {
    pub field: String,
    #[serde(rename = "type")]
    pub kind: AggregateType,
}

/// One footer row. Columns without an entry render empty and cannot take focus.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AggregateRow {
    pub columns: Vec<AggregateColumn>,
}

impl AggregateRow {
    pub fn get(&self, field: &str) -> Option<&AggregateColumn> {
        self.columns.iter().find(|c| c.field == field)
    }
}

fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Computes one aggregate over `field` in `records`. Non-numeric values are skipped by the
/// numeric aggregates; an empty input yields `Null` (or `0` for the counts).
pub fn compute(kind: AggregateType, name: &str, records: &[Record]) -> Value {
    let values = records.iter().map(|r| field(r, name)).filter(|v| !v.is_null());
    match kind {
        AggregateType::Sum => {
            let nums: Vec<f64> = values.filter_map(Value::as_f64).collect();
            if nums.is_empty() {
                Value::Null
            } else {
                number(nums.iter().sum())
            }
        }
        AggregateType::Average => {
            let nums: Vec<f64> = values.filter_map(Value::as_f64).collect();
            if nums.is_empty() {
                Value::Null
            } else {
                number(nums.iter().sum::<f64>() / nums.len() as f64)
            }
        }
        AggregateType::Min => values
            .min_by(|a, b| compare_values(a, b))
            .cloned()
            .unwrap_or(Value::Null),
        AggregateType::Max => values
            .max_by(|a, b| compare_values(a, b))
            .cloned()
            .unwrap_or(Value::Null),
        AggregateType::Count => Value::from(values.count()),
        AggregateType::TrueCount => {
            Value::from(values.filter(|v| v.as_bool() == Some(true)).count())
        }
        AggregateType::FalseCount => {
            Value::from(values.filter(|v| v.as_bool() == Some(false)).count())
        }
    }
}

/// Footer values laid out by visible column.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregateValues {
    pub rows: Vec<Vec<Option<(AggregateType, Value)>>>,
}

impl AggregateValues {
    pub fn compute(rows: &[AggregateRow], visible: &[&Column], records: &[Record]) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                visible
                    .iter()
                    .map(|col| {
                        row.get(&col.field)
                            .map(|agg| (agg.kind, compute(agg.kind, &col.field, records)))
                    })
                    .collect()
            })
            .collect();
        Self { rows }
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&(AggregateType, Value)> {
        self.rows.get(row)?.get(col)?.as_ref()
    }

    /// Focus structure of the footer: only cells carrying an aggregate are focusable.
    pub fn occupancy(&self) -> FocusMatrix {
        let rows: Vec<Vec<bool>> = self
            .rows
            .iter()
            .map(|r| r.iter().map(Option::is_some).collect())
            .collect();
        FocusMatrix::from_rows(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnDef;
    use crate::column::ColumnModel;
    use crate::focus::Cell;
    use serde_json::json;

    fn records() -> Vec<Record> {
        [
            json!({"qty": 2, "price": 1.5, "ok": true}),
            json!({"qty": 3, "price": null, "ok": false}),
            json!({"qty": 5, "price": 2.5, "ok": true}),
        ]
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(m) => Some(m),
            _ => None,
        })
        .collect()
    }

    #[test]
    fn numeric_aggregates_skip_nulls() {
        let r = records();
        assert_eq!(compute(AggregateType::Sum, "qty", &r), json!(10));
        assert_eq!(compute(AggregateType::Average, "price", &r), json!(2));
        assert_eq!(compute(AggregateType::Min, "price", &r), json!(1.5));
        assert_eq!(compute(AggregateType::Count, "price", &r), json!(2));
        assert_eq!(compute(AggregateType::TrueCount, "ok", &r), json!(2));
        assert_eq!(compute(AggregateType::Sum, "missing", &r), Value::Null);
    }

    #[test]
    fn cells_without_aggregates_are_not_focusable() {
        let cols = ColumnModel::new(&[ColumnDef::new("qty"), ColumnDef::new("price")]);
        let rows = vec![AggregateRow {
            columns: vec![AggregateColumn {
                field: "price".into(),
                kind: AggregateType::Max,
            }],
        }];
        let values = AggregateValues::compute(&rows, &cols.visible(), &records());
        let m = values.occupancy();
        assert!(!m.is_occupied(Cell::new(0, 0)));
        assert!(m.is_occupied(Cell::new(0, 1)));
        assert_eq!(values.get(0, 1), Some(&(AggregateType::Max, json!(2.5))));
    }
}
