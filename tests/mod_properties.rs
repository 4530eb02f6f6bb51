use bookstore::book::{Book, fixture, fixture_documents};
use bookstore::runner::script::decade_pipeline;
use bookstore::runner::{Request, Step};
use bookstore::seed::seed;
use bookstore::store::{EmbeddedStore, FindSpec, Store};
use bson::{Document, doc};

async fn fixture_store() -> EmbeddedStore {
    let store = EmbeddedStore::open("plp_bookstore", "books");
    seed(&store, fixture_documents().unwrap(), false).await.unwrap();
    store
}

fn titles(docs: &[Document]) -> Vec<String> {
    docs.iter().map(|d| d.get_str("title").unwrap().to_string()).collect()
}

async fn scripted_find(store: &EmbeddedStore, step: Step) -> Vec<Document> {
    let Request::Find { filter, spec } = step.request() else {
        panic!("{step} is not a find");
    };
    store.find(filter, spec).await.unwrap()
}

#[tokio::test]
async fn genre_filter_is_exact() {
    let store = fixture_store().await;
    let got = titles(&scripted_find(&store, Step::FindByGenre).await);
    let want: Vec<String> =
        fixture().into_iter().filter(|b| b.genre == "Fiction").map(|b| b.title).collect();
    assert_eq!(got, want);
    // "Science Fiction" contains the word but is a different value.
    assert!(!got.contains(&"Dune".to_string()));
}

#[tokio::test]
async fn range_filter_excludes_boundary() {
    let store = fixture_store().await;
    store
        .insert_many(vec![
            doc! {"title": "Boundary", "published_year": 2015},
            doc! {"title": "Just After", "published_year": 2016_i64},
        ])
        .await
        .unwrap();
    let got = titles(&scripted_find(&store, Step::FindPublishedAfter).await);
    assert!(!got.contains(&"Boundary".to_string()));
    assert!(got.contains(&"Just After".to_string()));
    let expected_fixture = fixture().iter().filter(|b| b.published_year > 2015).count();
    assert_eq!(got.len(), expected_fixture + 1);
}

#[tokio::test]
async fn range_filter_same_with_index() {
    let store = fixture_store().await;
    let before = titles(&scripted_find(&store, Step::FindPublishedAfter).await);
    store.create_index(doc! {"published_year": 1}).await.unwrap();
    let after = titles(&scripted_find(&store, Step::FindPublishedAfter).await);
    assert_eq!(before, after);
}

#[tokio::test]
async fn point_update_sets_price() {
    let store = fixture_store().await;
    let Request::UpdateOne { filter, update } = Step::UpdatePrice.request() else {
        panic!("update step");
    };
    let first = store.update_one(filter.clone(), update.clone()).await.unwrap();
    assert_eq!((first.matched, first.modified), (1, 1));
    let again = store.update_one(filter.clone(), update).await.unwrap();
    assert_eq!((again.matched, again.modified), (1, 0));
    let doc = store.find(filter, FindSpec::default()).await.unwrap().remove(0);
    let book = Book::from_document(doc).unwrap();
    assert_eq!(book.price, 13.99);
    assert_eq!(book.author, "James Clear");
}

#[tokio::test]
async fn point_delete_removes_once() {
    let store = fixture_store().await;
    let Request::DeleteOne { filter } = Step::DeleteByTitle.request() else {
        panic!("delete step");
    };
    assert_eq!(store.delete_one(filter.clone()).await.unwrap().deleted, 1);
    assert_eq!(store.delete_one(filter.clone()).await.unwrap().deleted, 0);
    assert!(store.find(filter, FindSpec::default()).await.unwrap().is_empty());
    assert_eq!(store.collection().len(), 11);
}

#[tokio::test]
async fn pagination_returns_sixth_to_tenth() {
    let store = fixture_store().await;
    let got = titles(&scripted_find(&store, Step::Paginate).await);
    let want: Vec<String> = fixture().into_iter().skip(5).take(5).map(|b| b.title).collect();
    assert_eq!(got, want);
    assert_eq!(got.first().map(String::as_str), Some("The Alchemist"));
    assert_eq!(got.last().map(String::as_str), Some("Sapiens"));
}

#[tokio::test]
async fn projection_keeps_three_fields() {
    let store = fixture_store().await;
    let docs = scripted_find(&store, Step::FindProjected).await;
    assert_eq!(docs.len(), 12);
    assert_eq!(docs[0], doc! {"title": "To Kill a Mockingbird", "author": "Harper Lee", "price": 12.99});
}

#[tokio::test]
async fn price_sorts_are_mirror_images() {
    let store = fixture_store().await;
    let asc = scripted_find(&store, Step::SortByPriceAsc).await;
    let desc = scripted_find(&store, Step::SortByPriceDesc).await;
    let mut reversed = prices(&desc);
    reversed.reverse();
    assert_eq!(prices(&asc), reversed);
    assert_eq!(asc[0].get_str("title").unwrap(), "Animal Farm");
    assert_eq!(desc[0].get_str("title").unwrap(), "Sapiens");
    // Equal prices keep insertion order.
    let tied: Vec<&str> =
        asc.iter().filter(|d| d.get_f64("price").unwrap() == 9.99).map(|d| d.get_str("title").unwrap()).collect();
    assert_eq!(tied, vec!["The Great Gatsby", "The Martian"]);
}

fn prices(docs: &[Document]) -> Vec<f64> {
    docs.iter().map(|d| d.get_f64("price").unwrap()).collect()
}

async fn decades_for(years: &[i32]) -> Vec<Document> {
    let store = EmbeddedStore::open("unit", "decades");
    let docs = years.iter().map(|y| doc! {"published_year": *y}).collect();
    store.insert_many(docs).await.unwrap();
    store.aggregate(decade_pipeline()).await.unwrap()
}

#[tokio::test]
async fn decade_grouping_floors_to_ten() {
    assert_eq!(
        decades_for(&[1984, 1988, 2016, 2011]).await,
        vec![doc! {"_id": "1980s", "count": 2}, doc! {"_id": "2010s", "count": 2}]
    );
    // 2021 floors to 2020, so it lands in its own decade.
    assert_eq!(
        decades_for(&[1984, 1988, 2016, 2021]).await,
        vec![
            doc! {"_id": "1980s", "count": 2},
            doc! {"_id": "2010s", "count": 1},
            doc! {"_id": "2020s", "count": 1},
        ]
    );
}

#[tokio::test]
async fn average_price_per_genre() {
    let store = fixture_store().await;
    let Request::Aggregate { pipeline } = Step::AvgPriceByGenre.request() else {
        panic!("aggregation step");
    };
    let out = store.aggregate(pipeline).await.unwrap();
    let fiction = out.iter().find(|d| d.get_str("_id").unwrap() == "Fiction").unwrap();
    let avg = fiction.get_f64("avg_price").unwrap();
    assert!((avg - (12.99 + 9.99 + 10.99 + 14.99) / 4.0).abs() < 1e-9);
    assert_eq!(out.len(), 7);
}

#[tokio::test]
async fn index_creation_is_idempotent() {
    let store = fixture_store().await;
    for step in [Step::IndexTitle, Step::IndexTitle, Step::IndexAuthorYear, Step::IndexAuthorYear] {
        let Request::CreateIndex { keys } = step.request() else {
            panic!("index step");
        };
        store.create_index(keys).await.unwrap();
    }
    assert_eq!(store.collection().index_names(), vec!["author_1_published_year_-1", "title_1"]);
}

#[tokio::test]
async fn explain_reports_scan_kind() {
    let store = fixture_store().await;
    let filter = doc! {"title": "Dune"};
    let before = store.explain_find(filter.clone()).await.unwrap();
    let stats = before.get_document("executionStats").unwrap();
    assert_eq!(stats.get_i64("totalDocsExamined").unwrap(), 12);
    assert_eq!(stats.get_i64("nReturned").unwrap(), 1);

    store.create_index(doc! {"title": 1}).await.unwrap();
    let after = store.explain_find(filter).await.unwrap();
    let stats = after.get_document("executionStats").unwrap();
    assert_eq!(stats.get_i64("totalDocsExamined").unwrap(), 1);
    assert_eq!(stats.get_i64("totalKeysExamined").unwrap(), 1);
}
