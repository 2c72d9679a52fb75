//! Per-session library browsing state: the loaded catalog, the active
//! query and its results, filter selections and the two presentations
//! (category shelves and a flat grid).

pub mod debounce;
pub mod filter;
pub mod shelf;

use serde::Serialize;
use wordwave_common::models::Book;

use filter::{Filters, ALL_CATEGORIES};
use shelf::{group_by_category, Shelf, ShelfView};

pub const EMPTY_LIBRARY: &str =
    "We couldn't find any books in our library. Please check back later.";
pub const EMPTY_MATCHES: &str = "We couldn't find any books matching your search criteria. Try adjusting your filters or search query.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Shelves,
    Grid,
}

#[derive(Debug, Default)]
pub struct LibraryView {
    catalog: Vec<Book>,
    loaded: bool,
    query: String,
    /// Present while a text or AI search is active; filters apply on top.
    results: Option<Vec<Book>>,
    filters: Filters,
    mode: ViewMode,
    shelves: Vec<Shelf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GridView {
    pub heading: String,
    pub count: usize,
    pub books: Vec<Book>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LibraryPage {
    pub mode: ViewMode,
    pub query: String,
    pub filters: Filters,
    pub shelves: Vec<ShelfView>,
    pub grid: Option<GridView>,
    pub placeholder: Option<&'static str>,
}

impl LibraryView {
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn load(&mut self, books: Vec<Book>) {
        self.catalog = books;
        self.loaded = true;
        self.rebuild_shelves();
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn searching(&self) -> bool {
        self.results.is_some()
    }

    /// Records typed text ahead of the debounced search.
    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
    }

    pub fn show_results(&mut self, query: &str, results: Vec<Book>) {
        self.query = query.to_string();
        self.results = Some(results);
        if !query.trim().is_empty() {
            self.mode = ViewMode::Grid;
        }
    }

    /// Back to the whole catalog in the shelf view; category and format
    /// selections survive.
    pub fn clear_search(&mut self) {
        self.query.clear();
        self.results = None;
        self.mode = ViewMode::Shelves;
        self.rebuild_shelves();
    }

    /// AI answers always land in the grid, so an empty answer shows the
    /// no-matches placeholder.
    pub fn show_ai_results(&mut self, query: &str, books: Vec<Book>) {
        self.query = query.to_string();
        self.results = Some(books);
        self.mode = ViewMode::Grid;
    }

    pub fn select_category(&mut self, category: &str) {
        self.filters.category = category.to_string();
        self.rebuild_shelves();
    }

    pub fn toggle_format(&mut self, format: &str) {
        self.filters.toggle_format(format);
        self.rebuild_shelves();
    }

    pub fn view_all(&mut self, category: &str) {
        self.select_category(category);
        self.mode = ViewMode::Grid;
    }

    pub fn back_to_categories(&mut self) {
        self.select_category(ALL_CATEGORIES);
        self.mode = ViewMode::Shelves;
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            ViewMode::Shelves => ViewMode::Grid,
            ViewMode::Grid => ViewMode::Shelves,
        };
    }

    /// A book from the active results or the catalog.
    pub fn find(&self, id: &str) -> Option<Book> {
        self.results
            .iter()
            .flatten()
            .chain(self.catalog.iter())
            .find(|b| b.id == id)
            .cloned()
    }

    pub fn shelf_mut(&mut self, category: &str) -> Option<&mut Shelf> {
        self.shelves.iter_mut().find(|s| s.category() == category)
    }

    /// Search results when a search is active, the catalog otherwise, with
    /// the current filters applied.
    pub fn grid_books(&self) -> Vec<Book> {
        let source = self.results.as_deref().unwrap_or(&self.catalog);
        self.filters.apply(source)
    }

    fn rebuild_shelves(&mut self) {
        self.shelves = group_by_category(&self.filters.apply(&self.catalog));
    }

    pub fn page(&self) -> LibraryPage {
        let (shelves, grid, placeholder) = match self.mode {
            ViewMode::Shelves => {
                let shelves: Vec<ShelfView> = self.shelves.iter().map(Shelf::view).collect();
                let placeholder = shelves.is_empty().then_some(EMPTY_LIBRARY);
                (shelves, None, placeholder)
            }
            ViewMode::Grid => {
                let books = self.grid_books();
                let placeholder = books.is_empty().then_some(EMPTY_MATCHES);
                let grid = GridView {
                    heading: self.filters.heading().to_string(),
                    count: books.len(),
                    books,
                };
                (Vec::new(), Some(grid), placeholder)
            }
        };

        LibraryPage {
            mode: self.mode,
            query: self.query.clone(),
            filters: self.filters.clone(),
            shelves,
            grid,
            placeholder,
        }
    }
}
