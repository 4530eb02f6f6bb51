//! The fixed demo script, expressed as data.
use crate::store::FindSpec;
use bson::{Document, doc};

pub const GENRE: &str = "Fiction";
pub const PUBLISHED_AFTER: i32 = 2015;
pub const AUTHOR: &str = "George Orwell";
pub const UPDATE_TITLE: &str = "Atomic Habits";
pub const NEW_PRICE: f64 = 13.99;
pub const DELETE_TITLE: &str = "1984";
pub const IN_STOCK_AFTER: i32 = 2010;
pub const PAGE_SKIP: u64 = 5;
pub const PAGE_SIZE: i64 = 5;
pub const EXPLAIN_TITLE: &str = "Dune";

/// One scripted store operation, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    FindByGenre,
    FindPublishedAfter,
    FindByAuthor,
    UpdatePrice,
    DeleteByTitle,
    FindInStockRecent,
    FindProjected,
    SortByPriceAsc,
    SortByPriceDesc,
    Paginate,
    AvgPriceByGenre,
    TopAuthor,
    CountByDecade,
    IndexTitle,
    IndexAuthorYear,
    ExplainTitle,
}

/// A store call with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Find { filter: Document, spec: FindSpec },
    UpdateOne { filter: Document, update: Document },
    DeleteOne { filter: Document },
    Aggregate { pipeline: Vec<Document> },
    CreateIndex { keys: Document },
    Explain { filter: Document },
}

impl Step {
    pub const SCRIPT: [Self; 16] = [
        Self::FindByGenre,
        Self::FindPublishedAfter,
        Self::FindByAuthor,
        Self::UpdatePrice,
        Self::DeleteByTitle,
        Self::FindInStockRecent,
        Self::FindProjected,
        Self::SortByPriceAsc,
        Self::SortByPriceDesc,
        Self::Paginate,
        Self::AvgPriceByGenre,
        Self::TopAuthor,
        Self::CountByDecade,
        Self::IndexTitle,
        Self::IndexAuthorYear,
        Self::ExplainTitle,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FindByGenre => "find_by_genre",
            Self::FindPublishedAfter => "find_published_after",
            Self::FindByAuthor => "find_by_author",
            Self::UpdatePrice => "update_price",
            Self::DeleteByTitle => "delete_by_title",
            Self::FindInStockRecent => "find_in_stock_recent",
            Self::FindProjected => "find_projected",
            Self::SortByPriceAsc => "sort_by_price_asc",
            Self::SortByPriceDesc => "sort_by_price_desc",
            Self::Paginate => "paginate",
            Self::AvgPriceByGenre => "avg_price_by_genre",
            Self::TopAuthor => "top_author",
            Self::CountByDecade => "count_by_decade",
            Self::IndexTitle => "index_title",
            Self::IndexAuthorYear => "index_author_year",
            Self::ExplainTitle => "explain_title",
        }
    }

    /// Console heading printed before the step's results.
    #[must_use]
    pub fn heading(self) -> String {
        match self {
            Self::FindByGenre => format!("📚 Books in genre '{GENRE}':"),
            Self::FindPublishedAfter => format!("📚 Books published after {PUBLISHED_AFTER}:"),
            Self::FindByAuthor => format!("📚 Books by {AUTHOR}:"),
            Self::UpdatePrice => format!("✏️ Updated price of '{UPDATE_TITLE}' to {NEW_PRICE}"),
            Self::DeleteByTitle => format!("🗑️ Deleted '{DELETE_TITLE}'"),
            Self::FindInStockRecent => {
                format!("📚 In-stock books published after {IN_STOCK_AFTER}:")
            }
            Self::FindProjected => "📚 Title, author and price only:".to_string(),
            Self::SortByPriceAsc => "📚 Books by price (ascending):".to_string(),
            Self::SortByPriceDesc => "📚 Books by price (descending):".to_string(),
            Self::Paginate => {
                format!("📚 Page 2 (skip {PAGE_SKIP}, limit {PAGE_SIZE}):")
            }
            Self::AvgPriceByGenre => "📊 Average price by genre:".to_string(),
            Self::TopAuthor => "📊 Author with the most books:".to_string(),
            Self::CountByDecade => "📊 Books per publication decade:".to_string(),
            Self::IndexTitle | Self::IndexAuthorYear => "🔎 Created index".to_string(),
            Self::ExplainTitle => format!("🧪 Explain for title '{EXPLAIN_TITLE}' (executionStats):"),
        }
    }

    #[must_use]
    pub fn request(self) -> Request {
        match self {
            Self::FindByGenre => find(doc! {"genre": GENRE}, FindSpec::default()),
            Self::FindPublishedAfter => {
                find(doc! {"published_year": {"$gt": PUBLISHED_AFTER}}, FindSpec::default())
            }
            Self::FindByAuthor => find(doc! {"author": AUTHOR}, FindSpec::default()),
            Self::UpdatePrice => Request::UpdateOne {
                filter: doc! {"title": UPDATE_TITLE},
                update: doc! {"$set": {"price": NEW_PRICE}},
            },
            Self::DeleteByTitle => Request::DeleteOne { filter: doc! {"title": DELETE_TITLE} },
            Self::FindInStockRecent => find(
                doc! {"in_stock": true, "published_year": {"$gt": IN_STOCK_AFTER}},
                FindSpec::default(),
            ),
            Self::FindProjected => find(
                doc! {},
                FindSpec::default().projection(doc! {"title": 1, "author": 1, "price": 1, "_id": 0}),
            ),
            Self::SortByPriceAsc => find(doc! {}, FindSpec::default().sort(doc! {"price": 1})),
            Self::SortByPriceDesc => find(doc! {}, FindSpec::default().sort(doc! {"price": -1})),
            Self::Paginate => find(doc! {}, FindSpec::default().skip(PAGE_SKIP).limit(PAGE_SIZE)),
            Self::AvgPriceByGenre => Request::Aggregate {
                pipeline: vec![doc! {"$group": {"_id": "$genre", "avg_price": {"$avg": "$price"}}}],
            },
            Self::TopAuthor => Request::Aggregate {
                pipeline: vec![
                    doc! {"$group": {"_id": "$author", "count": {"$sum": 1}}},
                    doc! {"$sort": {"count": -1}},
                    doc! {"$limit": 1},
                ],
            },
            Self::CountByDecade => Request::Aggregate { pipeline: decade_pipeline() },
            Self::IndexTitle => Request::CreateIndex { keys: doc! {"title": 1} },
            Self::IndexAuthorYear => {
                Request::CreateIndex { keys: doc! {"author": 1, "published_year": -1} }
            }
            Self::ExplainTitle => Request::Explain { filter: doc! {"title": EXPLAIN_TITLE} },
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn find(filter: Document, spec: FindSpec) -> Request {
    Request::Find { filter, spec }
}

/// `"<year - year % 10>s"` per book, counted and sorted by label.
#[must_use]
pub fn decade_pipeline() -> Vec<Document> {
    vec![
        doc! {"$project": {"decade": {"$concat": [
            {"$toString": {"$subtract": ["$published_year", {"$mod": ["$published_year", 10]}]}},
            "s"
        ]}}},
        doc! {"$group": {"_id": "$decade", "count": {"$sum": 1}}},
        doc! {"$sort": {"_id": 1}},
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_order_and_names_are_unique() {
        let names: std::collections::HashSet<&str> = Step::SCRIPT.iter().map(|s| s.name()).collect();
        assert_eq!(names.len(), Step::SCRIPT.len());
        assert_eq!(Step::SCRIPT[3], Step::UpdatePrice);
        assert_eq!(Step::SCRIPT[4], Step::DeleteByTitle);
        assert_eq!(Step::SCRIPT[15], Step::ExplainTitle);
    }

    #[test]
    fn pagination_request() {
        let Request::Find { filter, spec } = Step::Paginate.request() else {
            panic!("paginate should be a find");
        };
        assert!(filter.is_empty());
        assert_eq!(spec.skip, Some(5));
        assert_eq!(spec.limit, Some(5));
        assert_eq!(spec.sort, None);
    }
}
