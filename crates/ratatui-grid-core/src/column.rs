use crate::validation::ValidationRule;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

/// How a cell renders text that does not fit its width.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClipMode {
    #[default]
    Clip,
    Ellipsis,
    EllipsisWithTooltip,
}

/// A column as declared by the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColumnDef {
    pub field: String,
    pub header_text: Option<String>,
    pub uid: Option<String>,
    pub visible: bool,
    pub allow_sort: bool,
    pub allow_filter: bool,
    pub allow_search: bool,
    pub allow_editing: bool,
    pub is_primary_key: bool,
    pub clip_mode: ClipMode,
    pub width: u16,
    pub default_value: Option<Value>,
    pub validation_rules: Vec<ValidationRule>,
}

impl Default for ColumnDef {
    fn default() -> Self {
        Self {
            field: String::new(),
            header_text: None,
            uid: None,
            visible: true,
            allow_sort: true,
            allow_filter: true,
            allow_search: true,
            allow_editing: true,
            is_primary_key: false,
            clip_mode: ClipMode::default(),
            width: 12,
            default_value: None,
            validation_rules: Vec::new(),
        }
    }
}

impl ColumnDef {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ..Self::default()
        }
    }

    pub fn header(mut self, text: impl Into<String>) -> Self {
        self.header_text = Some(text.into());
        self
    }

    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn width(mut self, width: u16) -> Self {
        self.width = width;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn sortable(mut self, allow: bool) -> Self {
        self.allow_sort = allow;
        self
    }

    pub fn filterable(mut self, allow: bool) -> Self {
        self.allow_filter = allow;
        self
    }

    pub fn searchable(mut self, allow: bool) -> Self {
        self.allow_search = allow;
        self
    }

    pub fn editable(mut self, allow: bool) -> Self {
        self.allow_editing = allow;
        self
    }

    pub fn clip_mode(mut self, mode: ClipMode) -> Self {
        self.clip_mode = mode;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn rule(mut self, rule: ValidationRule) -> Self {
        self.validation_rules.push(rule);
        self
    }
}

/// A normalised column. Regenerated as a whole whenever the declarations change.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub uid: String,
    pub field: String,
    pub header_text: String,
    pub index: usize,
    pub visible: bool,
    pub allow_sort: bool,
    pub allow_filter: bool,
    pub allow_search: bool,
    pub allow_editing: bool,
    pub is_primary_key: bool,
    pub clip_mode: ClipMode,
    pub width: u16,
    pub default_value: Value,
    pub validation_rules: Vec<ValidationRule>,
}

/// Sort/filter capability of one column, used to detect when reconciliation has to run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Capability {
    pub field: String,
    pub allow_sort: bool,
    pub allow_filter: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ColumnModel {
    columns: Vec<Column>,
}

impl ColumnModel {
    pub fn new(defs: &[ColumnDef]) -> Self {
        let mut used: HashSet<String> = HashSet::new();
        let mut columns = Vec::with_capacity(defs.len());
        for (index, def) in defs.iter().enumerate() {
            let base = def
                .uid
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| format!("grid-column{index}"));
            let mut uid = base.clone();
            let mut n = 1;
            while !used.insert(uid.clone()) {
                uid = format!("{base}-{n}");
                n += 1;
            }
            columns.push(Column {
                uid,
                field: def.field.clone(),
                header_text: def.header_text.clone().unwrap_or_else(|| def.field.clone()),
                index,
                visible: def.visible,
                allow_sort: def.allow_sort,
                allow_filter: def.allow_filter,
                allow_search: def.allow_search,
                allow_editing: def.allow_editing && !def.is_primary_key,
                is_primary_key: def.is_primary_key,
                clip_mode: def.clip_mode,
                width: def.width,
                default_value: def.default_value.clone().unwrap_or(Value::Null),
                validation_rules: def.validation_rules.clone(),
            });
        }
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn visible(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.visible).collect()
    }

    pub fn hidden(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| !c.visible).collect()
    }

    pub fn visible_count(&self) -> usize {
        self.columns.iter().filter(|c| c.visible).count()
    }

    /// The `n`th visible column.
    pub fn visible_at(&self, n: usize) -> Option<&Column> {
        self.columns.iter().filter(|c| c.visible).nth(n)
    }

    pub fn by_field(&self, field: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.field == field)
    }

    pub fn by_uid(&self, uid: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.uid == uid)
    }

    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_primary_key)
    }

    pub fn can_sort(&self, field: &str) -> bool {
        self.by_field(field).is_some_and(|c| c.allow_sort)
    }

    pub fn can_filter(&self, field: &str) -> bool {
        self.by_field(field).is_some_and(|c| c.allow_filter)
    }

    /// Fields searched when the search settings name none.
    pub fn searchable_fields(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.visible && c.allow_search)
            .map(|c| c.field.clone())
            .collect()
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        self.columns
            .iter()
            .map(|c| Capability {
                field: c.field.clone(),
                allow_sort: c.allow_sort,
                allow_filter: c.allow_filter,
            })
            .collect()
    }

    pub fn set_visible(&mut self, field: &str, visible: bool) -> bool {
        match self.columns.iter_mut().find(|c| c.field == field) {
            Some(c) if c.visible != visible => {
                c.visible = visible;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_unique_uids() {
        let model = ColumnModel::new(&[
            ColumnDef::new("a").uid("x"),
            ColumnDef::new("b").uid("x"),
            ColumnDef::new("c"),
        ]);
        let uids: Vec<&str> = model.columns().iter().map(|c| c.uid.as_str()).collect();
        assert_eq!(uids, vec!["x", "x-1", "grid-column2"]);
    }

    #[test]
    fn splits_visible_and_hidden() {
        let model = ColumnModel::new(&[
            ColumnDef::new("id").primary_key().hidden(),
            ColumnDef::new("name"),
        ]);
        assert_eq!(model.visible().len(), 1);
        assert_eq!(model.hidden()[0].field, "id");
        assert_eq!(model.visible_at(0).map(|c| c.field.as_str()), Some("name"));
        assert!(!model.primary_key().is_some_and(|c| c.allow_editing));
    }
}
