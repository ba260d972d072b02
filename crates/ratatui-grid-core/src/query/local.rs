use super::Query;
use super::QueryResult;
use super::QueryStep;
use super::SortKey;
use crate::settings::SortDirection;
use crate::value::Record;
use crate::value::compare_values;
use crate::value::field;
use std::cmp::Ordering;

fn compare_by_keys(keys: &[SortKey], a: &Record, b: &Record) -> Ordering {
    for key in keys {
        let ord = compare_values(field(a, &key.field), field(b, &key.field));
        let ord = match key.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Executes `query` against an in-memory collection.
///
/// Sorting is stable, so rows that tie on every key keep their incoming order. The reported
/// count is the row count right before the first page step.
pub fn execute_local(query: &Query, records: &[Record]) -> QueryResult {
    let mut rows: Vec<&Record> = records.iter().collect();
    let mut count_before_page: Option<usize> = None;

    for step in query.steps() {
        match step {
            QueryStep::Search(clause) => rows.retain(|r| clause.matches(r)),
            QueryStep::Where { groups } => rows.retain(|r| groups.iter().all(|g| g.matches(r))),
            QueryStep::Sort { keys } => rows.sort_by(|a, b| compare_by_keys(keys, a, b)),
            QueryStep::Page { skip, take } => {
                count_before_page.get_or_insert(rows.len());
                rows = rows.into_iter().skip(*skip).take(*take).collect();
            }
        }
    }

    let total = count_before_page.unwrap_or(rows.len());
    QueryResult {
        records: rows.into_iter().cloned().collect(),
        count: query.requires_count().then_some(total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::FilterOperator;
    use crate::settings::FilterPredicate;
    use serde_json::Value;
    use serde_json::json;

    fn rows(v: Value) -> Vec<Record> {
        match v {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|i| match i {
                    Value::Object(m) => Some(m),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn names(result: &QueryResult) -> Vec<String> {
        result
            .records
            .iter()
            .map(|r| r["name"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn multi_key_sort_is_stable() {
        let data = rows(json!([
            {"name": "B", "age": 30},
            {"name": "A", "age": 30},
            {"name": "C", "age": 40},
            {"name": "D", "age": 30}
        ]));
        let q = Query::new().sort(vec![SortKey {
            field: "age".into(),
            direction: SortDirection::Descending,
        }]);
        assert_eq!(names(&execute_local(&q, &data)), vec!["C", "B", "A", "D"]);
    }

    #[test]
    fn count_is_taken_before_paging() {
        let data: Vec<Record> = (0..10)
            .filter_map(|i| match json!({"name": format!("r{i}"), "n": i}) {
                Value::Object(m) => Some(m),
                _ => None,
            })
            .collect();
        let q = Query::new()
            .filter(vec![FilterPredicate::new(
                "n",
                FilterOperator::GreaterThanOrEqual,
                json!(2),
            )])
            .paged(3, 3)
            .with_count(true);
        let r = execute_local(&q, &data);
        assert_eq!(names(&r), vec!["r5", "r6", "r7"]);
        assert_eq!(r.count, Some(8));
    }

    #[test]
    fn count_is_omitted_unless_requested() {
        let data = rows(json!([{"name": "a"}]));
        assert_eq!(execute_local(&Query::new(), &data).count, None);
    }
}
