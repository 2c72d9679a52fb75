use anyhow::{bail, Result};
use async_trait::async_trait;

use wordwave_common::models::{NewOrderLine, Order, OrderLine};

use super::{new_id, Storage};
use crate::OrderStore;

#[async_trait]
impl OrderStore for Storage {
    async fn create_order(&self, user_id: &str, lines: Vec<NewOrderLine>) -> Result<Order> {
        if lines.is_empty() {
            bail!("refusing to record an empty order");
        }

        let id = new_id();
        let created_at = chrono::Utc::now();
        let total: f64 = lines
            .iter()
            .map(|line| line.unit_price * line.quantity as f64)
            .sum();

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO orders (id, user_id, total, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(user_id)
            .bind(total)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;

        let mut stored = Vec::with_capacity(lines.len());
        for line in lines {
            sqlx::query(
                "INSERT INTO order_lines (order_id, book_id, title, format, quantity, unit_price) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(&line.book_id)
            .bind(&line.title)
            .bind(&line.format)
            .bind(line.quantity)
            .bind(line.unit_price)
            .execute(&mut *tx)
            .await?;

            stored.push(OrderLine {
                order_id: id.clone(),
                book_id: line.book_id,
                title: line.title,
                format: line.format,
                quantity: line.quantity,
                unit_price: line.unit_price,
            });
        }

        tx.commit().await?;

        Ok(Order {
            id,
            user_id: user_id.to_string(),
            total,
            created_at,
            lines: stored,
        })
    }

    async fn orders(&self, user_id: &str) -> Result<Vec<Order>> {
        let mut orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        for order in &mut orders {
            order.lines =
                sqlx::query_as::<_, OrderLine>("SELECT * FROM order_lines WHERE order_id = ?")
                    .bind(&order.id)
                    .fetch_all(&self.pool)
                    .await?;
        }

        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn orders_total_their_lines() {
        let storage = Storage::in_memory().await.unwrap();
        let order = storage
            .create_order(
                "u1",
                vec![
                    NewOrderLine {
                        book_id: "b1".into(),
                        title: "Dune".into(),
                        format: "PDF".into(),
                        quantity: 2,
                        unit_price: 4.5,
                    },
                    NewOrderLine {
                        book_id: "b2".into(),
                        title: "Sapiens".into(),
                        format: "EPUB".into(),
                        quantity: 1,
                        unit_price: 4.0,
                    },
                ],
            )
            .await
            .unwrap();
        assert_eq!(order.total, 13.0);

        let history = storage.orders("u1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].lines.len(), 2);
        assert!(storage.orders("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_orders_are_rejected() {
        let storage = Storage::in_memory().await.unwrap();
        assert!(storage.create_order("u1", Vec::new()).await.is_err());
    }
}
