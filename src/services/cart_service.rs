use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::cart::{
        AddItemsOutcome, AddItemsRequest, CartList, MoveDirection, PricedCartItem,
        UpdateItemRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartItem, Size},
    pricing,
    response::{ApiResponse, Meta},
};

/// Hard ceiling on line items per cart; overflowing batches are truncated,
/// not rejected.
pub const MAX_CART_ITEMS: usize = 10;

#[derive(FromRow)]
struct CartRow {
    id: Uuid,
    user_id: Uuid,
    image_url: String,
    label: Option<String>,
    size: String,
    quantity: i32,
    rush: bool,
    embroidery_text: Option<String>,
    accessory_count: i32,
    position: i32,
    created_at: DateTime<Utc>,
}

/// How many of an incoming batch fit under the ceiling.
pub fn batch_capacity(existing: usize, incoming: usize) -> (usize, usize) {
    let room = MAX_CART_ITEMS.saturating_sub(existing);
    let accepted = incoming.min(room);
    (accepted, incoming - accepted)
}

pub async fn list_cart(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<CartList>> {
    let items = load_cart(pool, user).await?;
    Ok(ApiResponse::success(
        "OK",
        priced_list(items),
        Some(Meta::empty()),
    ))
}

pub async fn add_items(
    pool: &DbPool,
    user: &AuthUser,
    payload: AddItemsRequest,
) -> AppResult<ApiResponse<AddItemsOutcome>> {
    if payload.image_urls.is_empty() {
        return Err(AppError::BadRequest("No images submitted".to_string()));
    }
    if payload.image_urls.iter().any(|url| url.trim().is_empty()) {
        return Err(AppError::BadRequest("Image reference must not be empty".to_string()));
    }

    let mut txn = pool.begin().await?;

    let (count, max_position): (i64, Option<i32>) = sqlx::query_as(
        "SELECT COUNT(*), MAX(position) FROM cart_items WHERE user_id = $1",
    )
    .bind(user.user_id)
    .fetch_one(&mut *txn)
    .await?;

    let (accepted, rejected) = batch_capacity(count as usize, payload.image_urls.len());
    let mut position = max_position.unwrap_or(-1);

    for url in payload.image_urls.iter().take(accepted) {
        position += 1;
        sqlx::query(
            r#"
            INSERT INTO cart_items (id, user_id, image_url, size, quantity, position)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.user_id)
        .bind(url.trim())
        .bind(Size::Medium.as_str())
        .bind(1)
        .bind(position)
        .execute(&mut *txn)
        .await?;
    }

    txn.commit().await?;

    if rejected > 0 {
        tracing::warn!(
            user_id = %user.user_id,
            accepted,
            rejected,
            "cart batch truncated at item ceiling"
        );
    }

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "cart_add_items",
        Some("cart_items"),
        Some(serde_json::json!({ "accepted": accepted, "rejected": rejected })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let cart = priced_list(load_cart(pool, user).await?);
    let message = if rejected > 0 {
        format!("Accepted {accepted} of {} images (cart limit is {MAX_CART_ITEMS})", accepted + rejected)
    } else {
        "Items added".to_string()
    };

    Ok(ApiResponse::success(
        message,
        AddItemsOutcome {
            cart,
            accepted,
            rejected,
        },
        Some(Meta::empty()),
    ))
}

pub async fn update_item(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateItemRequest,
) -> AppResult<ApiResponse<PricedCartItem>> {
    let row: Option<CartRow> = sqlx::query_as(
        "SELECT * FROM cart_items WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user.user_id)
    .fetch_optional(pool)
    .await?;
    let row = match row {
        Some(r) => r,
        None => return Err(AppError::NotFound),
    };
    let current = item_from_row(row)?;

    let size = payload.size.unwrap_or(current.size);
    let quantity = payload.quantity.unwrap_or(current.quantity).max(1);
    let rush = payload.rush.unwrap_or(current.rush);
    let accessory_count = payload
        .accessory_count
        .unwrap_or(current.accessory_count)
        .max(0);
    let label = payload.label.or(current.label);
    let embroidery_text = match payload.embroidery_text {
        Some(text) if text.trim().is_empty() => None,
        Some(text) => Some(text),
        None => current.embroidery_text,
    };

    let row: CartRow = sqlx::query_as(
        r#"
        UPDATE cart_items
        SET label = $3, size = $4, quantity = $5, rush = $6, embroidery_text = $7, accessory_count = $8
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user.user_id)
    .bind(&label)
    .bind(size.as_str())
    .bind(quantity)
    .bind(rush)
    .bind(&embroidery_text)
    .bind(accessory_count)
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::success(
        "Item updated",
        priced_item(item_from_row(row)?),
        Some(Meta::empty()),
    ))
}

pub async fn remove_item(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<CartList>> {
    let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user.user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "cart_remove",
        Some("cart_items"),
        Some(serde_json::json!({ "item_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let cart = priced_list(load_cart(pool, user).await?);
    Ok(ApiResponse::success(
        "Removed from cart",
        cart,
        Some(Meta::empty()),
    ))
}

/// Swap the item with its neighbor in the given direction. Moving the first
/// item up or the last one down is a no-op, not an error.
pub async fn move_item(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    direction: MoveDirection,
) -> AppResult<ApiResponse<CartList>> {
    let mut txn = pool.begin().await?;

    let rows: Vec<CartRow> = sqlx::query_as(
        "SELECT * FROM cart_items WHERE user_id = $1 ORDER BY position ASC FOR UPDATE",
    )
    .bind(user.user_id)
    .fetch_all(&mut *txn)
    .await?;

    let Some(index) = rows.iter().position(|r| r.id == id) else {
        return Err(AppError::NotFound);
    };

    let neighbor = match direction {
        MoveDirection::Up => index.checked_sub(1),
        MoveDirection::Down => (index + 1 < rows.len()).then_some(index + 1),
    };

    if let Some(neighbor) = neighbor {
        let (a, b) = (&rows[index], &rows[neighbor]);
        sqlx::query("UPDATE cart_items SET position = $2 WHERE id = $1")
            .bind(a.id)
            .bind(b.position)
            .execute(&mut *txn)
            .await?;
        sqlx::query("UPDATE cart_items SET position = $2 WHERE id = $1")
            .bind(b.id)
            .bind(a.position)
            .execute(&mut *txn)
            .await?;
    }

    txn.commit().await?;

    let cart = priced_list(load_cart(pool, user).await?);
    Ok(ApiResponse::success("OK", cart, Some(Meta::empty())))
}

async fn load_cart(pool: &DbPool, user: &AuthUser) -> AppResult<Vec<CartItem>> {
    let rows: Vec<CartRow> = sqlx::query_as(
        "SELECT * FROM cart_items WHERE user_id = $1 ORDER BY position ASC",
    )
    .bind(user.user_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(item_from_row).collect()
}

fn item_from_row(row: CartRow) -> AppResult<CartItem> {
    let size = Size::parse(&row.size)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unknown size {:?} in cart", row.size)))?;
    Ok(CartItem {
        id: row.id,
        user_id: row.user_id,
        image_url: row.image_url,
        label: row.label,
        size,
        quantity: row.quantity,
        rush: row.rush,
        embroidery_text: row.embroidery_text,
        accessory_count: row.accessory_count,
        position: row.position,
        created_at: row.created_at,
    })
}

fn priced_item(item: CartItem) -> PricedCartItem {
    let price = pricing::price_line_item(
        item.size,
        item.quantity,
        item.rush,
        item.embroidery_text.as_deref(),
        item.accessory_count,
    );
    PricedCartItem {
        item,
        unit_price: price.unit_price,
        line_total: price.line_total,
    }
}

fn priced_list(items: Vec<CartItem>) -> CartList {
    let items: Vec<PricedCartItem> = items.into_iter().map(priced_item).collect();
    let total = items.iter().map(|i| i.line_total).sum();
    CartList { items, total }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_capacity_truncates_at_ceiling() {
        assert_eq!(batch_capacity(0, 3), (3, 0));
        assert_eq!(batch_capacity(7, 5), (3, 2));
        assert_eq!(batch_capacity(10, 4), (0, 4));
        assert_eq!(batch_capacity(12, 1), (0, 1));
    }

    #[test]
    fn batch_capacity_never_exceeds_max() {
        for existing in 0..15 {
            for incoming in 0..15 {
                let (accepted, rejected) = batch_capacity(existing, incoming);
                assert!(existing.min(MAX_CART_ITEMS) + accepted <= MAX_CART_ITEMS);
                assert_eq!(accepted + rejected, incoming);
            }
        }
    }
}
