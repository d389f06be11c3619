use serde::Serialize;
use serde::ser::{SerializeStruct, Serializer};

/// Default number of items per page.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Page position over a counted collection. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
	pub count: usize,
	pub page_size: usize,
	pub current_page: usize,
}

impl Pagination {
	/// A zero page size falls back to `DEFAULT_PAGE_SIZE`; the page is clamped into range.
	pub fn new(count: usize, page_size: usize, current_page: usize) -> Self {
		let page_size = if page_size == 0 {
			DEFAULT_PAGE_SIZE
		} else {
			page_size
		};
		let mut pagination = Self {
			count,
			page_size,
			current_page: 1,
		};
		pagination.current_page = current_page.clamp(1, pagination.total_pages());
		pagination
	}

	pub fn total_pages(&self) -> usize {
		self.count.div_ceil(self.page_size).max(1)
	}

	pub fn show_next(&self) -> bool {
		self.current_page < self.total_pages()
	}

	pub fn show_previous(&self) -> bool {
		self.current_page > 1
	}

	/// Index of the first item on the current page.
	pub fn offset(&self) -> usize {
		(self.current_page - 1) * self.page_size
	}
}

/// Serialized with the derived navigation fields.
impl Serialize for Pagination {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut state = serializer.serialize_struct("Pagination", 6)?;
		state.serialize_field("count", &self.count)?;
		state.serialize_field("page_size", &self.page_size)?;
		state.serialize_field("current_page", &self.current_page)?;
		state.serialize_field("total_pages", &self.total_pages())?;
		state.serialize_field("show_next", &self.show_next())?;
		state.serialize_field("show_previous", &self.show_previous())?;
		state.end()
	}
}

/// One page of items with its position.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
	pub items: Vec<T>,
	pub pagination: Pagination,
}
