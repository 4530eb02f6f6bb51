use crate::errors::StoreError;
use bson::Document;
use serde::{Deserialize, Serialize};

/// Shape of a book in the `books` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub published_year: i32,
    pub price: f64,
    pub in_stock: bool,
}

impl Book {
    fn new(title: &str, author: &str, genre: &str, published_year: i32, price: f64, in_stock: bool) -> Self {
        Self {
            title: title.to_string(),
            author: author.to_string(),
            genre: genre.to_string(),
            published_year,
            price,
            in_stock,
        }
    }

    /// # Errors
    /// Returns `StoreError::BsonEncode` if serialization fails.
    pub fn to_document(&self) -> Result<Document, StoreError> {
        Ok(bson::to_document(self)?)
    }

    /// # Errors
    /// Returns `StoreError::BsonDecode` when a required field is missing or mistyped.
    pub fn from_document(doc: Document) -> Result<Self, StoreError> {
        Ok(bson::from_document(doc)?)
    }
}

/// The twelve sample books, in insertion order.
#[must_use]
pub fn fixture() -> Vec<Book> {
    vec![
        Book::new("To Kill a Mockingbird", "Harper Lee", "Fiction", 1960, 12.99, true),
        Book::new("1984", "George Orwell", "Dystopian", 1949, 10.99, true),
        Book::new("The Great Gatsby", "F. Scott Fitzgerald", "Fiction", 1925, 9.99, true),
        Book::new("Animal Farm", "George Orwell", "Political Satire", 1945, 8.50, false),
        Book::new("Dune", "Frank Herbert", "Science Fiction", 1965, 11.99, true),
        Book::new("The Alchemist", "Paulo Coelho", "Fiction", 1988, 10.99, true),
        Book::new("Atomic Habits", "James Clear", "Self-Help", 2018, 16.20, true),
        Book::new("The Midnight Library", "Matt Haig", "Fiction", 2020, 14.99, true),
        Book::new("Project Hail Mary", "Andy Weir", "Science Fiction", 2021, 17.50, false),
        Book::new("Sapiens", "Yuval Noah Harari", "History", 2011, 18.99, true),
        Book::new("The Martian", "Andy Weir", "Science Fiction", 2011, 9.99, true),
        Book::new("Educated", "Tara Westover", "Memoir", 2018, 15.00, true),
    ]
}

/// The fixture as BSON documents ready for `insert_many`.
///
/// # Errors
/// Returns `StoreError::BsonEncode` if a book cannot be serialized.
pub fn fixture_documents() -> Result<Vec<Document>, StoreError> {
    fixture().iter().map(Book::to_document).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_shape() {
        let books = fixture();
        assert_eq!(books.len(), 12);
        assert_eq!(books.iter().filter(|b| b.genre == "Fiction").count(), 4);
        assert_eq!(books.iter().filter(|b| b.author == "George Orwell").count(), 2);
    }

    #[test]
    fn documents_use_native_types() {
        let docs = fixture_documents().unwrap();
        assert_eq!(docs[1].get_i32("published_year").unwrap(), 1949);
        assert!(!docs[3].get_bool("in_stock").unwrap());
        assert_eq!(Book::from_document(docs[4].clone()).unwrap().title, "Dune");
    }
}
