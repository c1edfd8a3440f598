use crate::errors::{FieldError, Result};
use crate::filter::FieldFilter;
use crate::form::{BoundForm, FieldParser, FormSpec, StandardParser, Widget, WidgetKind};
use crate::model::FormData;
use crate::paginate::{Page, DEFAULT_PAGE_SIZE};
use crate::query::Query;
use crate::search::{Document, Search};
use crate::sort::{NestedSort, SortChoice, SortSpec};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

pub const SORT_KEY: &str = "sort";
pub const PAGE_KEY: &str = "page";
pub const PAGE_SIZE_KEY: &str = "page_size";

/// A filter declared under its input name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedFilter {
    pub name: String,
    #[serde(flatten)]
    pub filter: FieldFilter,
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

/// Declared configuration of one filter set. Pure data; nested-sort
/// descriptors are validated when a search is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSetConfig {
    #[serde(default)]
    pub filters: Vec<NamedFilter>,
    #[serde(flatten)]
    pub sort: SortSpec,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

impl Default for FilterSetConfig {
    fn default() -> Self {
        FilterSetConfig {
            filters: Vec::new(),
            sort: SortSpec::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl FilterSetConfig {
    pub fn filter(&self, name: &str) -> Option<&FieldFilter> {
        self.filters
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.filter)
    }
}

#[derive(Debug, Default)]
pub struct FilterSetBuilder {
    config: FilterSetConfig,
}

impl FilterSetBuilder {
    /// Declares `filter` under `name`, replacing an earlier declaration of
    /// the same name.
    pub fn filter(mut self, name: impl Into<String>, filter: FieldFilter) -> Self {
        let name = name.into();
        match self.config.filters.iter_mut().find(|f| f.name == name) {
            Some(existing) => existing.filter = filter,
            None => self.config.filters.push(NamedFilter { name, filter }),
        }
        self
    }

    pub fn sort_choice(mut self, token: impl Into<String>, label: impl Into<String>) -> Self {
        self.config.sort.choices.push(SortChoice::new(token, label));
        self
    }

    pub fn sort_field(mut self, key: impl Into<String>, field: impl Into<String>) -> Self {
        self.config.sort.fields.insert(key.into(), field.into());
        self
    }

    pub fn nested_sort(mut self, key: impl Into<String>, nested: NestedSort) -> Self {
        self.config.sort.nested.insert(key.into(), nested);
        self
    }

    pub fn page_size(mut self, page_size: u64) -> Self {
        self.config.page_size = page_size;
        self
    }

    pub fn into_config(self) -> FilterSetConfig {
        self.config
    }

    pub fn build(self, document: Arc<dyn Document>) -> FilterSet {
        FilterSet::new(self.config, document)
    }
}

/// Compiles form input into a sorted, paginated search over one document
/// type. Shareable across threads; each [`FilterSet::bind`] is independent.
#[derive(Clone)]
pub struct FilterSet {
    config: Arc<FilterSetConfig>,
    document: Arc<dyn Document>,
    parser: Arc<dyn FieldParser>,
}

impl FilterSet {
    pub fn new(config: FilterSetConfig, document: Arc<dyn Document>) -> Self {
        FilterSet {
            config: Arc::new(config),
            document,
            parser: Arc::new(StandardParser),
        }
    }

    pub fn builder() -> FilterSetBuilder {
        FilterSetBuilder::default()
    }

    pub fn with_parser(mut self, parser: Arc<dyn FieldParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn config(&self) -> &FilterSetConfig {
        &self.config
    }

    /// Widget registry: declared filters in order, then `sort`, `page` and
    /// `page_size`.
    pub fn form(&self) -> FormSpec {
        let mut widgets: Vec<Widget> = self
            .config
            .filters
            .iter()
            .flat_map(|f| f.filter.widgets(&f.name))
            .collect();
        let sort_kind = if self.config.sort.choices.is_empty() {
            WidgetKind::Text
        } else {
            WidgetKind::Choice
        };
        let mut sort = Widget::optional(SORT_KEY, sort_kind, "Sort by");
        sort.choices = self.config.sort.choices.clone();
        widgets.push(sort);
        widgets.push(Widget::optional(PAGE_KEY, WidgetKind::Integer, "Page"));
        widgets.push(Widget::optional(
            PAGE_SIZE_KEY,
            WidgetKind::Integer,
            "Page size",
        ));
        FormSpec { widgets }
    }

    /// Binds raw input. Invalid filter values are recorded on the bound form
    /// and ignored; this never fails.
    pub fn bind(&self, data: &FormData) -> BoundFilterSet<'_> {
        let mut form = BoundForm::default();
        let mut clauses = Vec::new();
        for named in &self.config.filters {
            let value = named
                .filter
                .bind(&named.name, data, self.parser.as_ref(), &mut form);
            if let Some(value) = value {
                if let Some(clause) = named.filter.build_clause(&value) {
                    clauses.push(clause);
                }
                form.set_value(&named.name, value);
            }
        }

        let sort = match data.get_non_empty(SORT_KEY) {
            Some(token) if self.config.sort.accepts(token) => Some(token.to_string()),
            Some(token) => {
                form.add_error(SORT_KEY, FieldError::InvalidChoice(token.to_string()));
                None
            }
            None => None,
        };

        let page = match data.get_non_empty(PAGE_KEY).map(parse_page) {
            Some(Some(p)) if p >= 1 => p,
            Some(_) => {
                warn!(raw = ?data.get(PAGE_KEY), "invalid page, using first page");
                1
            }
            None => 1,
        };
        let default_size = self.config.page_size.max(1);
        let page_size = match data.get_non_empty(PAGE_SIZE_KEY).map(str::parse::<u64>) {
            Some(Ok(s)) if s >= 1 => s,
            Some(_) => {
                warn!(raw = ?data.get(PAGE_SIZE_KEY), default_size, "invalid page_size, using default");
                default_size
            }
            None => default_size,
        };

        BoundFilterSet {
            set: self,
            form,
            clauses,
            sort,
            page,
            page_size,
        }
    }

    /// Shorthand for `bind(data).search()`.
    pub fn search(&self, data: &FormData) -> Result<Search> {
        self.bind(data).search()
    }
}

/// Parses a page number. Digit strings past `i64::MAX` saturate so they
/// clamp to the last page instead of falling back to the first.
fn parse_page(raw: &str) -> Option<i64> {
    match raw.parse::<i64>() {
        Ok(p) => Some(p),
        Err(_) => {
            let digits = raw.strip_prefix('+').unwrap_or(raw);
            (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
                .then_some(i64::MAX)
        }
    }
}

/// One invocation's bound input.
pub struct BoundFilterSet<'a> {
    set: &'a FilterSet,
    form: BoundForm,
    clauses: Vec<Query>,
    sort: Option<String>,
    page: i64,
    page_size: u64,
}

/// A built search together with its clamped page.
#[derive(Debug, Clone)]
pub struct PaginatedSearch {
    pub search: Search,
    pub page: Page,
}

impl<'a> BoundFilterSet<'a> {
    pub fn form(&self) -> &BoundForm {
        &self.form
    }

    pub fn is_valid(&self) -> bool {
        self.form.is_valid()
    }

    pub fn requested_page(&self) -> i64 {
        self.page
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn sort_token(&self) -> Option<&str> {
        self.sort.as_deref()
    }

    /// Conjunction of every active filter clause.
    pub fn query(&self) -> Query {
        Query::all_of(self.clauses.clone())
    }

    /// Filtered and sorted, but not yet counted or sliced.
    pub fn unpaginated(&self) -> Result<Search> {
        let mut search = self.set.document.search();
        if !self.clauses.is_empty() {
            search = search.query(self.query());
        }
        if let Some(token) = &self.sort {
            if let Some(clause) = self.set.config.sort.resolve(token)? {
                debug!(token = %token, clause = %clause.to_json(), "applying sort");
                search = search.sort(clause);
            }
        }
        Ok(search)
    }

    /// Builds the search and clamps the requested page against the live hit
    /// count. Issues one count request.
    pub fn paginate(&self) -> Result<PaginatedSearch> {
        let search = self.unpaginated()?;
        let total_hits = search.count()?;
        let page = Page::clamp(total_hits, self.page, self.page_size);
        debug!(
            total_hits,
            requested = self.page,
            effective = page.number,
            start = page.window.start,
            end = page.window.end,
            "paginating"
        );
        Ok(PaginatedSearch {
            search: search.slice(page.window),
            page,
        })
    }

    /// The fully composed, sorted and sliced search, ready to execute.
    pub fn search(&self) -> Result<Search> {
        self.paginate().map(|p| p.search)
    }
}
