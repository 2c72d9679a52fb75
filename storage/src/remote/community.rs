use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use wordwave_common::models::{
    anonymous, Book, Collection, NewCollection, NewOrderLine, NewReview, Order, OrderLine,
    Profile, Review,
};

use super::{Conflict, Query, RemoteStore};
use crate::{CollectionStore, OrderStore, ProfileStore, ReviewStore};

#[derive(Deserialize)]
struct ProfileName {
    id: String,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Deserialize)]
struct CountRow {
    count: i64,
}

#[derive(Deserialize)]
struct CollectionRow {
    #[serde(flatten)]
    collection: Collection,
    #[serde(default)]
    collection_books: Vec<CountRow>,
}

impl From<CollectionRow> for Collection {
    fn from(row: CollectionRow) -> Self {
        let mut collection = row.collection;
        collection.book_count = row.collection_books.first().map_or(0, |c| c.count);
        collection
    }
}

#[derive(Deserialize)]
struct CollectionEntry {
    #[serde(default)]
    book: Option<Book>,
}

impl RemoteStore {
    async fn usernames(&self, user_ids: Vec<String>) -> Result<HashMap<String, String>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let names: Vec<ProfileName> = self
            .select(
                Query::table("profiles")
                    .select("id,username")
                    .is_in("id", &user_ids),
            )
            .await?;

        Ok(names
            .into_iter()
            .filter_map(|p| p.username.filter(|u| !u.is_empty()).map(|u| (p.id, u)))
            .collect())
    }
}

#[async_trait]
impl ReviewStore for RemoteStore {
    async fn reviews(&self, book_id: &str) -> Result<Vec<Review>> {
        let mut reviews: Vec<Review> = self
            .select(
                Query::table("reviews")
                    .select("*")
                    .eq("book_id", book_id)
                    .order("created_at.desc"),
            )
            .await?;

        let mut ids: Vec<String> = reviews.iter().map(|r| r.user_id.clone()).collect();
        ids.sort();
        ids.dedup();
        let names = self.usernames(ids).await?;

        for review in &mut reviews {
            review.user_name = names.get(&review.user_id).cloned().unwrap_or_else(anonymous);
        }
        Ok(reviews)
    }

    async fn add_review(&self, review: NewReview) -> Result<Review> {
        let mut rows: Vec<Review> = self.insert("reviews", &review, Conflict::Fail).await?;
        let mut stored = rows.pop().ok_or_else(|| anyhow!("backend returned no review row"))?;

        stored.user_name = self
            .usernames(vec![stored.user_id.clone()])
            .await?
            .remove(&stored.user_id)
            .unwrap_or_else(anonymous);
        Ok(stored)
    }
}

#[async_trait]
impl ProfileStore for RemoteStore {
    async fn profile(&self, user_id: &str) -> Result<Option<Profile>> {
        self.select_one(Query::table("profiles").select("*").eq("id", user_id))
            .await
    }

    async fn upsert_profile(&self, profile: Profile) -> Result<Profile> {
        let mut rows: Vec<Profile> = self
            .insert("profiles", &profile, Conflict::Merge("id"))
            .await?;
        rows.pop().ok_or_else(|| anyhow!("backend returned no profile row"))
    }
}

#[async_trait]
impl CollectionStore for RemoteStore {
    async fn collections(&self, viewer: Option<&str>) -> Result<Vec<Collection>> {
        let query = Query::table("collections").select("*,collection_books(count)");
        let query = match viewer {
            Some(user_id) => query.or(&[
                "is_public.eq.true".to_string(),
                format!("user_id.eq.{user_id}"),
            ]),
            None => query.eq("is_public", true),
        };

        let rows: Vec<CollectionRow> = self.select(query.order("created_at.desc")).await?;
        Ok(rows.into_iter().map(Collection::from).collect())
    }

    async fn collection(&self, id: &str) -> Result<Option<Collection>> {
        let row: Option<CollectionRow> = self
            .select_one(
                Query::table("collections")
                    .select("*,collection_books(count)")
                    .eq("id", id),
            )
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let entries: Vec<CollectionEntry> = self
            .select(
                Query::table("collection_books")
                    .select("position,book:books(*)")
                    .eq("collection_id", id)
                    .order("position.asc"),
            )
            .await?;

        let mut collection = Collection::from(row);
        collection.books = entries.into_iter().filter_map(|e| e.book).collect();
        Ok(Some(collection))
    }

    async fn create_collection(&self, collection: NewCollection) -> Result<Collection> {
        let mut rows: Vec<Collection> = self
            .insert("collections", &collection, Conflict::Fail)
            .await?;
        rows.pop()
            .ok_or_else(|| anyhow!("backend returned no collection row"))
    }

    async fn add_to_collection(&self, collection_id: &str, book_id: &str) -> Result<()> {
        let existing: Vec<Value> = self
            .select(
                Query::table("collection_books")
                    .select("book_id")
                    .eq("collection_id", collection_id),
            )
            .await?;

        let _: Vec<Value> = self
            .insert(
                "collection_books",
                &json!({
                    "collection_id": collection_id,
                    "book_id": book_id,
                    "position": existing.len(),
                }),
                Conflict::Ignore("collection_id,book_id"),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for RemoteStore {
    async fn create_order(&self, user_id: &str, lines: Vec<NewOrderLine>) -> Result<Order> {
        if lines.is_empty() {
            bail!("refusing to record an empty order");
        }
        let total: f64 = lines
            .iter()
            .map(|line| line.unit_price * line.quantity as f64)
            .sum();

        let mut rows: Vec<Order> = self
            .insert(
                "orders",
                &json!({ "user_id": user_id, "total": total }),
                Conflict::Fail,
            )
            .await?;
        let mut order = rows.pop().ok_or_else(|| anyhow!("backend returned no order row"))?;

        let body: Vec<Value> = lines
            .iter()
            .map(|line| {
                json!({
                    "order_id": order.id,
                    "book_id": line.book_id,
                    "title": line.title,
                    "format": line.format,
                    "quantity": line.quantity,
                    "unit_price": line.unit_price,
                })
            })
            .collect();
        order.lines = self
            .insert::<OrderLine, _>("order_lines", &body, Conflict::Fail)
            .await?;
        Ok(order)
    }

    async fn orders(&self, user_id: &str) -> Result<Vec<Order>> {
        self.select(
            Query::table("orders")
                .select("*,lines:order_lines(*)")
                .eq("user_id", user_id)
                .order("created_at.desc"),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_rows_carry_their_embedded_count() {
        let raw = r#"{
            "id": "c1", "title": "Favourites", "description": null,
            "user_id": "u1", "is_public": true,
            "created_at": "2024-03-01T10:00:00Z",
            "collection_books": [{"count": 3}]
        }"#;
        let row: CollectionRow = serde_json::from_str(raw).unwrap();
        let collection = Collection::from(row);
        assert_eq!(collection.book_count, 3);
        assert_eq!(collection.description, "");
        assert!(collection.books.is_empty());
    }

    #[test]
    fn entries_with_deleted_books_are_skipped() {
        let raw = r#"[{"position": 0, "book": null}]"#;
        let entries: Vec<CollectionEntry> = serde_json::from_str(raw).unwrap();
        assert!(entries[0].book.is_none());
    }
}
