//! Query descriptors and their in-memory execution.
//!
//! A [`Query`] is an ordered list of steps. [`QueryBuilder`] always emits them in the order
//! search, filter, sort, page, after any steps contributed by a caller-supplied base query.
//! Local execution ([`execute_local`]) and any remote provider must honour that order so both
//! produce the same rows.

mod local;
mod predicate;

pub use local::execute_local;
pub use predicate::fold_text;

use crate::settings::FilterPredicate;
use crate::settings::FilterSettings;
use crate::settings::GridSettings;
use crate::settings::PageSettings;
use crate::settings::SearchOperator;
use crate::settings::SearchSettings;
use crate::settings::SortDirection;
use crate::settings::SortSettings;
use crate::value::Record;
use serde::Deserialize;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchClause {
    pub fields: Vec<String>,
    pub value: String,
    pub operator: SearchOperator,
    pub case_sensitive: bool,
    pub ignore_accent: bool,
}

/// Predicates joined with OR. Groups are joined with AND.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredicateGroup(pub Vec<FilterPredicate>);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum QueryStep {
    Search(SearchClause),
    Where { groups: Vec<PredicateGroup> },
    Sort { keys: Vec<SortKey> },
    Page { skip: usize, take: usize },
}

/// An immutable, ordered query descriptor.
///
/// The consuming helpers (`search`, `filter`, ...) return a new value; nothing mutates a
/// query once it has been handed out.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    steps: Vec<QueryStep>,
    requires_count: bool,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[QueryStep] {
        &self.steps
    }

    /// Whether the executor should report the record count before paging.
    pub fn requires_count(&self) -> bool {
        self.requires_count
    }

    pub fn page(&self) -> Option<(usize, usize)> {
        self.steps.iter().find_map(|s| match s {
            QueryStep::Page { skip, take } => Some((*skip, *take)),
            _ => None,
        })
    }

    pub fn search(mut self, clause: SearchClause) -> Self {
        self.steps.push(QueryStep::Search(clause));
        self
    }

    pub fn filter(mut self, predicates: Vec<FilterPredicate>) -> Self {
        let groups = group_predicates(&predicates);
        if !groups.is_empty() {
            self.steps.push(QueryStep::Where { groups });
        }
        self
    }

    pub fn sort(mut self, keys: Vec<SortKey>) -> Self {
        if !keys.is_empty() {
            self.steps.push(QueryStep::Sort { keys });
        }
        self
    }

    pub fn paged(mut self, skip: usize, take: usize) -> Self {
        self.steps.push(QueryStep::Page { skip, take });
        self
    }

    pub fn with_count(mut self, yes: bool) -> Self {
        self.requires_count = yes;
        self
    }
}

/// Splits a predicate list into OR-groups.
///
/// A predicate with [`crate::settings::Combinator::Or`] joins the group of its predecessor;
/// every other predicate starts a new group.
pub fn group_predicates(predicates: &[FilterPredicate]) -> Vec<PredicateGroup> {
    let mut groups: Vec<PredicateGroup> = Vec::new();
    for p in predicates {
        match groups.last_mut() {
            Some(last) if p.combinator == crate::settings::Combinator::Or => last.0.push(p.clone()),
            _ => groups.push(PredicateGroup(vec![p.clone()])),
        }
    }
    groups
}

/// Result of executing a [`Query`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub records: Vec<Record>,
    /// Post-search/filter count, present when the query asked for it.
    pub count: Option<usize>,
}

/// Composes a [`Query`] from the grid settings.
#[derive(Clone, Debug)]
pub struct QueryBuilder<'a> {
    search: &'a SearchSettings,
    filter: &'a FilterSettings,
    sort: &'a SortSettings,
    page: &'a PageSettings,
    base: Option<&'a Query>,
    default_search_fields: Vec<String>,
    requires_count: bool,
    skip_page: bool,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(settings: &'a GridSettings) -> Self {
        Self::from_parts(
            &settings.search,
            &settings.filter,
            &settings.sort,
            &settings.page,
        )
    }

    pub fn from_parts(
        search: &'a SearchSettings,
        filter: &'a FilterSettings,
        sort: &'a SortSettings,
        page: &'a PageSettings,
    ) -> Self {
        Self {
            search,
            filter,
            sort,
            page,
            base: None,
            default_search_fields: Vec::new(),
            requires_count: false,
            skip_page: false,
        }
    }

    pub fn base(mut self, base: Option<&'a Query>) -> Self {
        self.base = base;
        self
    }

    /// Fields to search when the search settings name none.
    pub fn default_search_fields(mut self, fields: Vec<String>) -> Self {
        self.default_search_fields = fields;
        self
    }

    pub fn requires_count(mut self, yes: bool) -> Self {
        self.requires_count = yes;
        self
    }

    pub fn skip_page(mut self, yes: bool) -> Self {
        self.skip_page = yes;
        self
    }

    pub fn build(&self) -> Query {
        let mut query = self.base.cloned().unwrap_or_default();

        if self.search.is_active() {
            let fields = if self.search.fields.is_empty() {
                self.default_search_fields.clone()
            } else {
                self.search.fields.clone()
            };
            query = query.search(SearchClause {
                fields,
                value: self.search.value.clone(),
                operator: self.search.operator,
                case_sensitive: self.search.case_sensitive,
                ignore_accent: self.search.ignore_accent,
            });
        }

        query = query.filter(self.filter.columns.clone());

        query = query.sort(
            self.sort
                .ordered()
                .into_iter()
                .map(|d| SortKey {
                    field: d.field.clone(),
                    direction: d.direction,
                })
                .collect(),
        );

        if self.page.enabled && !self.skip_page {
            query = query.paged(self.page.skip(), self.page.page_size.max(1));
        }

        query.with_count(self.requires_count || self.base.is_some_and(Query::requires_count))
    }
}

/// Builds the descriptor for a set of settings. See [`QueryBuilder`] for the options.
pub fn build(
    search: &SearchSettings,
    filter: &FilterSettings,
    sort: &SortSettings,
    page: &PageSettings,
    base: Option<&Query>,
) -> Query {
    QueryBuilder::from_parts(search, filter, sort, page)
        .base(base)
        .build()
}
