use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;
use dukaan_catalog::bundle::BundleSelection;
use dukaan_catalog::pricing::DiscountType;
use dukaan_catalog::StockAdjustments;
use dukaan_core::repository::{
    CouponRepository, OrderFilter, OrderRepository, OrderRevision, OrderStats, PageRequest, Paginated,
    StoreResult,
};
use dukaan_core::StoreError;
use dukaan_order::coupon::normalize_code;
use dukaan_order::{
    Coupon, CustomerInfo, LineComponent, Order, OrderItem, OrderItemType, OrderStatus,
    PaymentMethod, PaymentStatus, PreparedOrder, ShippingAddress,
};
use dukaan_shared::Masked;

use crate::database::{db_error, decode_enum};

const ORDER_COLUMNS: &str = "id, order_number, user_id, customer_name, customer_email, customer_phone, \
     shipping_address, subtotal, discount, shipping_fee, total, currency, coupon_code, payment_method, \
     payment_status, payment_reference, status, notes, access_token, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    user_id: Option<Uuid>,
    customer_name: String,
    customer_email: String,
    customer_phone: String,
    shipping_address: Json<ShippingAddress>,
    subtotal: i64,
    discount: i64,
    shipping_fee: i64,
    total: i64,
    currency: String,
    coupon_code: Option<String>,
    payment_method: String,
    payment_status: String,
    payment_reference: Option<String>,
    status: String,
    notes: Option<String>,
    access_token: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    item_type: String,
    product_id: Option<Uuid>,
    bundle_id: Option<Uuid>,
    name: String,
    sku: Option<String>,
    unit_price: i64,
    quantity: i32,
    line_total: i64,
    components: Json<Vec<LineComponent>>,
    selection: Json<BundleSelection>,
}

impl OrderItemRow {
    fn into_item(self) -> StoreResult<OrderItem> {
        Ok(OrderItem {
            id: self.id,
            item_type: decode_enum(&self.item_type, OrderItemType::parse, "item_type")?,
            product_id: self.product_id,
            bundle_id: self.bundle_id,
            name: self.name,
            sku: self.sku,
            unit_price: self.unit_price,
            quantity: self.quantity,
            line_total: self.line_total,
            components: self.components.0,
            selection: self.selection.0,
        })
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> StoreResult<Order> {
        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            user_id: self.user_id,
            customer: CustomerInfo {
                name: self.customer_name,
                email: Masked(self.customer_email),
                phone: Masked(self.customer_phone),
            },
            shipping_address: self.shipping_address.0,
            items,
            subtotal: self.subtotal,
            discount: self.discount,
            shipping_fee: self.shipping_fee,
            total: self.total,
            currency: self.currency,
            coupon_code: self.coupon_code,
            payment_method: decode_enum(&self.payment_method, PaymentMethod::parse, "payment_method")?,
            payment_status: decode_enum(&self.payment_status, PaymentStatus::parse, "payment_status")?,
            payment_reference: self.payment_reference,
            status: decode_enum(&self.status, OrderStatus::parse, "status")?,
            notes: self.notes,
            access_token: self.access_token,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub struct StoreOrderRepository {
    pool: PgPool,
}

impl StoreOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_items(&self, order_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Vec<OrderItem>>> {
        let rows: Vec<OrderItemRow> = sqlx::query_as(
            r#"
            SELECT id, order_id, item_type, product_id, bundle_id, name, sku, unit_price, quantity,
                   line_total, components, selection
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY position ASC
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            let order_id = row.order_id;
            grouped.entry(order_id).or_default().push(row.into_item()?);
        }
        Ok(grouped)
    }

    async fn hydrate(&self, rows: Vec<OrderRow>) -> StoreResult<Vec<Order>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items = self.load_items(&ids).await?;
        rows.into_iter()
            .map(|row| {
                let order_items = items.remove(&row.id).unwrap_or_default();
                row.into_order(order_items)
            })
            .collect()
    }

    async fn fetch_one(&self, column: &str, value: &str) -> StoreResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE {} = $1", ORDER_COLUMNS, column);
        let query = sqlx::query_as::<_, OrderRow>(&sql);
        let row = match column {
            "id" => {
                let id = Uuid::parse_str(value).map_err(|e| StoreError::Decode(e.to_string()))?;
                query.bind(id).fetch_optional(&self.pool).await
            }
            _ => query.bind(value.to_string()).fetch_optional(&self.pool).await,
        }
        .map_err(db_error)?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

/// Apply stock and sold-count deltas inside `tx`. A product that would go
/// negative or a bundle that would pass its limit aborts the transaction.
pub(crate) async fn apply_adjustments(
    tx: &mut Transaction<'_, Postgres>,
    adjustments: &StockAdjustments,
) -> StoreResult<()> {
    for (product_id, delta) in &adjustments.products {
        if *delta == 0 {
            continue;
        }
        let result = sqlx::query(
            "UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1 AND stock + $2 >= 0",
        )
        .bind(product_id)
        .bind(delta)
        .execute(&mut **tx)
        .await
        .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::InsufficientStock(format!("product {}", product_id)));
        }
    }

    for (bundle_id, delta) in &adjustments.bundles {
        if *delta == 0 {
            continue;
        }
        let result = sqlx::query(
            r#"
            UPDATE bundles SET sold_count = GREATEST(sold_count + $2, 0), updated_at = NOW()
            WHERE id = $1 AND ($2 < 0 OR stock_limit IS NULL OR sold_count + $2 <= stock_limit)
            "#,
        )
        .bind(bundle_id)
        .bind(delta)
        .execute(&mut **tx)
        .await
        .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::InsufficientStock(format!("bundle {}", bundle_id)));
        }
    }
    Ok(())
}

#[async_trait]
impl OrderRepository for StoreOrderRepository {
    async fn create(&self, prepared: &PreparedOrder) -> StoreResult<()> {
        let order = &prepared.order;
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        apply_adjustments(&mut tx, &prepared.adjustments).await?;

        if let Some(coupon_id) = prepared.coupon_id {
            let result = sqlx::query(
                r#"
                UPDATE coupons SET used_count = used_count + 1, updated_at = NOW()
                WHERE id = $1 AND (usage_limit IS NULL OR used_count < usage_limit)
                "#,
            )
            .bind(coupon_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
            if result.rows_affected() == 0 {
                return Err(StoreError::Conflict("coupon usage limit reached".to_string()));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, user_id, customer_name, customer_email, customer_phone,
                shipping_address, subtotal, discount, shipping_fee, total, currency, coupon_code,
                payment_method, payment_status, payment_reference, status, notes, access_token, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            "#,
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.user_id)
        .bind(&order.customer.name)
        .bind(order.customer.email.as_inner())
        .bind(order.customer.phone.as_inner())
        .bind(Json(&order.shipping_address))
        .bind(order.subtotal)
        .bind(order.discount)
        .bind(order.shipping_fee)
        .bind(order.total)
        .bind(&order.currency)
        .bind(&order.coupon_code)
        .bind(order.payment_method.as_str())
        .bind(order.payment_status.as_str())
        .bind(&order.payment_reference)
        .bind(order.status.as_str())
        .bind(&order.notes)
        .bind(&order.access_token)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, position, item_type, product_id, bundle_id, name, sku,
                    unit_price, quantity, line_total, components, selection)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                "#,
            )
            .bind(item.id)
            .bind(order.id)
            .bind(position as i32)
            .bind(item.item_type.as_str())
            .bind(item.product_id)
            .bind(item.bundle_id)
            .bind(&item.name)
            .bind(&item.sku)
            .bind(item.unit_price)
            .bind(item.quantity)
            .bind(item.line_total)
            .bind(Json(&item.components))
            .bind(Json(&item.selection))
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Order>> {
        self.fetch_one("id", &id.to_string()).await
    }

    async fn get_by_number(&self, order_number: &str) -> StoreResult<Option<Order>> {
        self.fetch_one("order_number", order_number).await
    }

    async fn list(&self, filter: &OrderFilter, page: PageRequest) -> StoreResult<Paginated<Order>> {
        let push_filter = |qb: &mut QueryBuilder<'_, Postgres>| {
            qb.push(" WHERE TRUE");
            if let Some(status) = filter.status {
                qb.push(" AND status = ").push_bind(status.as_str());
            }
            if let Some(user_id) = filter.user_id {
                qb.push(" AND user_id = ").push_bind(user_id);
            }
        };

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
        push_filter(&mut count);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM orders", ORDER_COLUMNS));
        push_filter(&mut qb);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit() as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);
        let rows: Vec<OrderRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(Paginated {
            items: self.hydrate(rows).await?,
            total: total.max(0) as u64,
            page,
        })
    }

    async fn update(
        &self,
        order: &Order,
        expected: OrderRevision,
        restock: Option<&StockAdjustments>,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, payment_status = $3, payment_reference = $4, notes = $5, updated_at = $6
            WHERE id = $1 AND status = $7 AND payment_status = $8
            "#,
        )
        .bind(order.id)
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(&order.payment_reference)
        .bind(&order.notes)
        .bind(order.updated_at)
        .bind(expected.status.as_str())
        .bind(expected.payment_status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        if result.rows_affected() == 0 {
            let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM orders WHERE id = $1")
                .bind(order.id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error)?;
            return Err(match exists {
                Some(_) => StoreError::Conflict(format!("order {} was changed by another request", order.id)),
                None => StoreError::NotFound(format!("order {}", order.id)),
            });
        }

        if let Some(adjustments) = restock {
            apply_adjustments(&mut tx, adjustments).await?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn stats(&self, since: DateTime<Utc>) -> StoreResult<OrderStats> {
        let rows: Vec<(String, i64, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT status,
                   COUNT(*),
                   COALESCE(SUM(total) FILTER (WHERE payment_status = 'PAID'), 0)::BIGINT,
                   COUNT(*) FILTER (WHERE created_at >= $1),
                   COALESCE(SUM(total) FILTER (WHERE payment_status = 'PAID' AND created_at >= $1), 0)::BIGINT
            FROM orders
            GROUP BY status
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut stats = OrderStats {
            by_status: OrderStatus::ALL
                .iter()
                .map(|s| (s.as_str().to_string(), 0))
                .collect::<BTreeMap<_, _>>(),
            ..Default::default()
        };
        for (status, count, revenue, since_count, since_revenue) in rows {
            stats.total_orders += count as u64;
            stats.revenue += revenue;
            stats.orders_since += since_count as u64;
            stats.revenue_since += since_revenue;
            stats.by_status.insert(status, count as u64);
        }
        Ok(stats)
    }
}

const COUPON_COLUMNS: &str = "id, code, discount_type, value, min_order_amount, max_discount, usage_limit, \
     used_count, starts_at, expires_at, is_active, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct CouponRow {
    id: Uuid,
    code: String,
    discount_type: String,
    value: f64,
    min_order_amount: Option<i64>,
    max_discount: Option<i64>,
    usage_limit: Option<i32>,
    used_count: i32,
    starts_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = StoreError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        Ok(Coupon {
            id: row.id,
            code: row.code,
            discount_type: decode_enum(&row.discount_type, DiscountType::parse, "discount_type")?,
            value: row.value,
            min_order_amount: row.min_order_amount,
            max_discount: row.max_discount,
            usage_limit: row.usage_limit,
            used_count: row.used_count,
            starts_at: row.starts_at,
            expires_at: row.expires_at,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct StoreCouponRepository {
    pool: PgPool,
}

impl StoreCouponRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CouponRepository for StoreCouponRepository {
    async fn list(&self) -> StoreResult<Vec<Coupon>> {
        let rows: Vec<CouponRow> =
            sqlx::query_as(&format!("SELECT {} FROM coupons ORDER BY created_at DESC", COUPON_COLUMNS))
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
        rows.into_iter().map(Coupon::try_from).collect()
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Coupon>> {
        let row: Option<CouponRow> =
            sqlx::query_as(&format!("SELECT {} FROM coupons WHERE id = $1", COUPON_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        row.map(Coupon::try_from).transpose()
    }

    async fn get_by_code(&self, code: &str) -> StoreResult<Option<Coupon>> {
        let row: Option<CouponRow> =
            sqlx::query_as(&format!("SELECT {} FROM coupons WHERE code = $1", COUPON_COLUMNS))
                .bind(normalize_code(code))
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        row.map(Coupon::try_from).transpose()
    }

    async fn create(&self, coupon: &Coupon) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO coupons (id, code, discount_type, value, min_order_amount, max_discount, usage_limit,
                used_count, starts_at, expires_at, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(coupon.id)
        .bind(&coupon.code)
        .bind(coupon.discount_type.as_str())
        .bind(coupon.value)
        .bind(coupon.min_order_amount)
        .bind(coupon.max_discount)
        .bind(coupon.usage_limit)
        .bind(coupon.used_count)
        .bind(coupon.starts_at)
        .bind(coupon.expires_at)
        .bind(coupon.is_active)
        .bind(coupon.created_at)
        .bind(coupon.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn update(&self, coupon: &Coupon) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE coupons
            SET code = $2, discount_type = $3, value = $4, min_order_amount = $5, max_discount = $6,
                usage_limit = $7, starts_at = $8, expires_at = $9, is_active = $10, updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(coupon.id)
        .bind(&coupon.code)
        .bind(coupon.discount_type.as_str())
        .bind(coupon.value)
        .bind(coupon.min_order_amount)
        .bind(coupon.max_discount)
        .bind(coupon.usage_limit)
        .bind(coupon.starts_at)
        .bind(coupon.expires_at)
        .bind(coupon.is_active)
        .bind(coupon.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("coupon {}", coupon.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM coupons WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("coupon {}", id)));
        }
        Ok(())
    }
}
