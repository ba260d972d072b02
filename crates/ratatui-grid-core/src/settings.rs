use crate::column::ColumnModel;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn reversed(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortDescriptor {
    pub field: String,
    pub direction: SortDirection,
    pub priority: usize,
}

impl SortDescriptor {
    pub fn new(field: impl Into<String>, direction: SortDirection, priority: usize) -> Self {
        Self {
            field: field.into(),
            direction,
            priority,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SortSettings {
    pub columns: Vec<SortDescriptor>,
}

impl SortSettings {
    /// Descriptors ordered by ascending priority. Equal priorities keep declaration order.
    pub fn ordered(&self) -> Vec<&SortDescriptor> {
        let mut out: Vec<&SortDescriptor> = self.columns.iter().collect();
        out.sort_by_key(|d| d.priority);
        out
    }

    pub fn get(&self, field: &str) -> Option<&SortDescriptor> {
        self.columns.iter().find(|d| d.field == field)
    }

    /// Sorts by `field`. With `multi` the field is added (or updated in place) after the
    /// existing descriptors; otherwise it replaces them.
    pub fn set(&mut self, field: &str, direction: SortDirection, multi: bool) {
        if !multi {
            self.columns = vec![SortDescriptor::new(field, direction, 0)];
            return;
        }
        if let Some(existing) = self.columns.iter_mut().find(|d| d.field == field) {
            existing.direction = direction;
            return;
        }
        let priority = self
            .columns
            .iter()
            .map(|d| d.priority + 1)
            .max()
            .unwrap_or(0);
        self.columns
            .push(SortDescriptor::new(field, direction, priority));
    }

    pub fn remove(&mut self, field: &str) -> bool {
        let before = self.columns.len();
        self.columns.retain(|d| d.field != field);
        self.renumber();
        before != self.columns.len()
    }

    /// Ascending, then descending, then unsorted.
    pub fn toggle(&mut self, field: &str, multi: bool) {
        match self.get(field).map(|d| d.direction) {
            None => self.set(field, SortDirection::Ascending, multi),
            Some(SortDirection::Ascending) => self.set(field, SortDirection::Descending, multi),
            Some(SortDirection::Descending) => {
                if multi {
                    self.remove(field);
                } else {
                    self.columns.clear();
                }
            }
        }
    }

    fn renumber(&mut self) {
        let mut order: Vec<usize> = (0..self.columns.len()).collect();
        order.sort_by_key(|&i| self.columns[i].priority);
        for (priority, i) in order.into_iter().enumerate() {
            self.columns[i].priority = priority;
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    #[default]
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Contains,
    DoesNotContain,
    StartsWith,
    DoesNotStartWith,
    EndsWith,
    DoesNotEndWith,
    IsNull,
    IsNotNull,
    IsEmpty,
    IsNotEmpty,
    In,
    NotIn,
}

impl FilterOperator {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::Contains => "contains",
            Self::DoesNotContain => "does not contain",
            Self::StartsWith => "starts with",
            Self::DoesNotStartWith => "does not start with",
            Self::EndsWith => "ends with",
            Self::DoesNotEndWith => "does not end with",
            Self::IsNull => "is null",
            Self::IsNotNull => "is not null",
            Self::IsEmpty => "is empty",
            Self::IsNotEmpty => "is not empty",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }

    pub fn requires_value(&self) -> bool {
        !matches!(
            self,
            Self::IsNull | Self::IsNotNull | Self::IsEmpty | Self::IsNotEmpty
        )
    }
}

/// How a predicate joins its predecessor in the filter list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Combinator {
    #[default]
    And,
    Or,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterPredicate {
    pub field: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub combinator: Combinator,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub ignore_accent: bool,
}

impl FilterPredicate {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
            combinator: Combinator::And,
            case_sensitive: false,
            ignore_accent: false,
        }
    }

    /// Joins this predicate to its predecessor with OR.
    pub fn or(mut self) -> Self {
        self.combinator = Combinator::Or;
        self
    }

    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }

    pub fn ignore_accent(mut self, yes: bool) -> Self {
        self.ignore_accent = yes;
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterSettings {
    pub columns: Vec<FilterPredicate>,
}

impl FilterSettings {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn remove_field(&mut self, field: &str) -> bool {
        let before = self.columns.len();
        self.columns.retain(|p| p.field != field);
        before != self.columns.len()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchOperator {
    #[default]
    Contains,
    StartsWith,
    EndsWith,
    Equal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchSettings {
    pub enabled: bool,
    pub fields: Vec<String>,
    pub value: String,
    pub operator: SearchOperator,
    pub case_sensitive: bool,
    pub ignore_accent: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            fields: Vec::new(),
            value: String::new(),
            operator: SearchOperator::Contains,
            case_sensitive: false,
            ignore_accent: false,
        }
    }
}

impl SearchSettings {
    pub fn is_active(&self) -> bool {
        self.enabled && !self.value.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageSettings {
    pub enabled: bool,
    pub page_size: usize,
    /// One-based.
    pub current_page: usize,
    pub total_records_count: usize,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            page_size: 12,
            current_page: 1,
            total_records_count: 0,
        }
    }
}

impl PageSettings {
    pub fn page_count(&self) -> usize {
        self.total_records_count
            .div_ceil(self.page_size.max(1))
            .max(1)
    }

    pub fn skip(&self) -> usize {
        self.current_page.saturating_sub(1) * self.page_size.max(1)
    }

    /// Clamps `current_page` into `1..=page_count`.
    pub fn clamp(&mut self) {
        self.current_page = self.current_page.clamp(1, self.page_count());
    }
}

/// The full set of user-adjustable query settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GridSettings {
    pub sort: SortSettings,
    pub filter: FilterSettings,
    pub search: SearchSettings,
    pub page: PageSettings,
}

/// A described settings intent, applied by [`GridSettings::apply`].
#[derive(Clone, Debug, PartialEq)]
pub enum SettingsCommand {
    /// `direction: None` toggles through ascending, descending and unsorted.
    Sort {
        field: String,
        direction: Option<SortDirection>,
        multi: bool,
    },
    RemoveSort(String),
    ClearSort,
    SetFilter(FilterSettings),
    AddFilter(FilterPredicate),
    RemoveFilter(String),
    ClearFilter,
    Search(String),
    SetSearch(SearchSettings),
    GoToPage(usize),
    SetPageSize(usize),
}

/// Feature switches consulted by the reducer.
#[derive(Clone, Copy, Debug)]
pub struct SettingsPolicy {
    pub allow_sorting: bool,
    pub allow_multi_sorting: bool,
    pub allow_filtering: bool,
    pub allow_paging: bool,
}

impl Default for SettingsPolicy {
    fn default() -> Self {
        Self {
            allow_sorting: true,
            allow_multi_sorting: true,
            allow_filtering: true,
            allow_paging: true,
        }
    }
}

impl GridSettings {
    /// Applies `cmd` and reports whether the settings changed.
    ///
    /// Commands naming an unknown or incapable column are dropped without error.
    pub fn apply(
        &mut self,
        cmd: SettingsCommand,
        columns: &ColumnModel,
        policy: SettingsPolicy,
    ) -> bool {
        let before = self.clone();
        match cmd {
            SettingsCommand::Sort {
                field,
                direction,
                multi,
            } => {
                if !policy.allow_sorting || !columns.can_sort(&field) {
                    tracing::debug!(%field, "ignoring sort on non-sortable column");
                    return false;
                }
                let multi = multi && policy.allow_multi_sorting;
                match direction {
                    Some(direction) => self.sort.set(&field, direction, multi),
                    None => self.sort.toggle(&field, multi),
                }
            }
            SettingsCommand::RemoveSort(field) => {
                self.sort.remove(&field);
            }
            SettingsCommand::ClearSort => self.sort.columns.clear(),
            SettingsCommand::SetFilter(mut filter) => {
                if !policy.allow_filtering {
                    return false;
                }
                filter.columns.retain(|p| columns.can_filter(&p.field));
                self.filter = filter;
                self.page.current_page = 1;
            }
            SettingsCommand::AddFilter(predicate) => {
                if !policy.allow_filtering || !columns.can_filter(&predicate.field) {
                    tracing::debug!(
                        field = %predicate.field,
                        "ignoring filter on non-filterable column"
                    );
                    return false;
                }
                self.filter.columns.push(predicate);
                self.page.current_page = 1;
            }
            SettingsCommand::RemoveFilter(field) => {
                if self.filter.remove_field(&field) {
                    self.page.current_page = 1;
                }
            }
            SettingsCommand::ClearFilter => {
                if !self.filter.is_empty() {
                    self.filter.columns.clear();
                    self.page.current_page = 1;
                }
            }
            SettingsCommand::Search(value) => {
                self.search.value = value;
                self.page.current_page = 1;
            }
            SettingsCommand::SetSearch(search) => {
                self.search = search;
                self.page.current_page = 1;
            }
            SettingsCommand::GoToPage(page) => {
                if !policy.allow_paging || !self.page.enabled {
                    return false;
                }
                self.page.current_page = page;
                self.page.clamp();
            }
            SettingsCommand::SetPageSize(size) => {
                if size == 0 {
                    return false;
                }
                self.page.page_size = size;
                self.page.current_page = 1;
            }
        }
        *self != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnDef;
    use serde_json::json;

    fn columns() -> ColumnModel {
        ColumnModel::new(&[
            ColumnDef::new("name"),
            ColumnDef::new("age"),
            ColumnDef::new("notes").sortable(false).filterable(false),
        ])
    }

    #[test]
    fn toggle_cycles_through_directions() {
        let mut s = SortSettings::default();
        s.toggle("age", false);
        assert_eq!(s.get("age").map(|d| d.direction), Some(SortDirection::Ascending));
        s.toggle("age", false);
        assert_eq!(s.get("age").map(|d| d.direction), Some(SortDirection::Descending));
        s.toggle("age", false);
        assert!(s.columns.is_empty());
    }

    #[test]
    fn multi_sort_appends_with_next_priority_and_keeps_fields_unique() {
        let mut s = SortSettings::default();
        s.set("age", SortDirection::Descending, true);
        s.set("name", SortDirection::Ascending, true);
        s.set("age", SortDirection::Ascending, true);
        let ordered: Vec<(&str, usize)> = s
            .ordered()
            .iter()
            .map(|d| (d.field.as_str(), d.priority))
            .collect();
        assert_eq!(ordered, vec![("age", 0), ("name", 1)]);
        s.remove("age");
        assert_eq!(s.columns[0].priority, 0);
    }

    #[test]
    fn reducer_ignores_incapable_columns() {
        let cols = columns();
        let mut settings = GridSettings::default();
        let changed = settings.apply(
            SettingsCommand::Sort {
                field: "notes".into(),
                direction: None,
                multi: false,
            },
            &cols,
            SettingsPolicy::default(),
        );
        assert!(!changed);
        let changed = settings.apply(
            SettingsCommand::AddFilter(FilterPredicate::new(
                "notes",
                FilterOperator::Contains,
                json!("x"),
            )),
            &cols,
            SettingsPolicy::default(),
        );
        assert!(!changed);
    }

    #[test]
    fn filter_change_resets_page() {
        let cols = columns();
        let mut settings = GridSettings::default();
        settings.page.enabled = true;
        settings.page.total_records_count = 100;
        settings.apply(
            SettingsCommand::GoToPage(4),
            &cols,
            SettingsPolicy::default(),
        );
        assert_eq!(settings.page.current_page, 4);
        settings.apply(
            SettingsCommand::AddFilter(FilterPredicate::new(
                "age",
                FilterOperator::GreaterThan,
                json!(3),
            )),
            &cols,
            SettingsPolicy::default(),
        );
        assert_eq!(settings.page.current_page, 1);
    }

    #[test]
    fn page_requests_clamp_to_bounds() {
        let mut page = PageSettings {
            enabled: true,
            page_size: 3,
            current_page: 9,
            total_records_count: 10,
        };
        page.clamp();
        assert_eq!(page.current_page, 4);
        page.current_page = 0;
        page.clamp();
        assert_eq!(page.current_page, 1);
    }
}
