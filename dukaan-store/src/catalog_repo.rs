use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use dukaan_catalog::bundle::{BundleItem, BundleSlot, BundleType};
use dukaan_catalog::pricing::DiscountType;
use dukaan_catalog::{Bundle, Product};
use dukaan_core::repository::{
    BundleRepository, PageRequest, Paginated, ProductFilter, ProductRepository, StoreResult,
};
use dukaan_core::StoreError;

use crate::database::{db_error, decode_enum};

const PRODUCT_COLUMNS: &str = "id, sku, name, slug, description, category, price, sale_price, stock, \
     is_active, image_url, created_at, updated_at";

const BUNDLE_COLUMNS: &str = "id, name, slug, description, bundle_type, discount_type, discount_value, \
     starts_at, ends_at, stock_limit, sold_count, is_active, image_url, items, slots, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    sku: String,
    name: String,
    slug: String,
    description: Option<String>,
    category: Option<String>,
    price: i64,
    sale_price: Option<i64>,
    stock: i32,
    is_active: bool,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            sku: row.sku,
            name: row.name,
            slug: row.slug,
            description: row.description,
            category: row.category,
            price: row.price,
            sale_price: row.sale_price,
            stock: row.stock,
            is_active: row.is_active,
            image_url: row.image_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BundleRow {
    id: Uuid,
    name: String,
    slug: String,
    description: Option<String>,
    bundle_type: String,
    discount_type: String,
    discount_value: f64,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    stock_limit: Option<i32>,
    sold_count: i32,
    is_active: bool,
    image_url: Option<String>,
    items: Json<Vec<BundleItem>>,
    slots: Json<Vec<BundleSlot>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BundleRow> for Bundle {
    type Error = StoreError;

    fn try_from(row: BundleRow) -> Result<Self, Self::Error> {
        Ok(Bundle {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            bundle_type: decode_enum(&row.bundle_type, BundleType::parse, "bundle_type")?,
            discount_type: decode_enum(&row.discount_type, DiscountType::parse, "discount_type")?,
            discount_value: row.discount_value,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            stock_limit: row.stock_limit,
            sold_count: row.sold_count,
            is_active: row.is_active,
            image_url: row.image_url,
            items: row.items.0,
            slots: row.slots.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct StoreProductRepository {
    pool: PgPool,
}

impl StoreProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_product_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    qb.push(" WHERE TRUE");
    if !filter.include_inactive {
        qb.push(" AND is_active");
    }
    if let Some(category) = &filter.category {
        qb.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search.replace('%', "\\%").replace('_', "\\_"));
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR sku ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    match filter.on_sale {
        Some(true) => {
            qb.push(" AND sale_price IS NOT NULL AND sale_price < price");
        }
        Some(false) => {
            qb.push(" AND (sale_price IS NULL OR sale_price >= price)");
        }
        None => {}
    }
    if let Some(max) = filter.max_stock {
        qb.push(" AND stock <= ").push_bind(max);
    }
}

#[async_trait]
impl ProductRepository for StoreProductRepository {
    async fn list(&self, filter: &ProductFilter, page: PageRequest) -> StoreResult<Paginated<Product>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_product_filter(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM products", PRODUCT_COLUMNS));
        push_product_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, name ASC LIMIT ")
            .push_bind(page.limit() as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);

        let rows: Vec<ProductRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(Paginated {
            items: rows.into_iter().map(Product::from).collect(),
            total: total.max(0) as u64,
            page,
        })
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(row.map(Product::from))
    }

    async fn get_by_slug(&self, slug: &str) -> StoreResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {} FROM products WHERE slug = $1", PRODUCT_COLUMNS))
                .bind(slug)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(row.map(Product::from))
    }

    async fn get_many(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<ProductRow> =
            sqlx::query_as(&format!("SELECT {} FROM products WHERE id = ANY($1)", PRODUCT_COLUMNS))
                .bind(ids)
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn create(&self, product: &Product) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, slug, description, category, price, sale_price, stock, is_active, image_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.price)
        .bind(product.sale_price)
        .bind(product.stock)
        .bind(product.is_active)
        .bind(&product.image_url)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn update(&self, product: &Product) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET sku = $2, name = $3, slug = $4, description = $5, category = $6, price = $7,
                sale_price = $8, stock = $9, is_active = $10, image_url = $11, updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.price)
        .bind(product.sale_price)
        .bind(product.stock)
        .bind(product.is_active)
        .bind(&product.image_url)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("product {}", product.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("product {}", id)));
        }
        Ok(())
    }

    async fn set_stock(&self, id: Uuid, stock: i32) -> StoreResult<Product> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "UPDATE products SET stock = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .bind(stock)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(Product::from)
            .ok_or_else(|| StoreError::NotFound(format!("product {}", id)))
    }

    async fn low_stock(&self, threshold: i32) -> StoreResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {} FROM products WHERE is_active AND stock <= $1 ORDER BY stock ASC, name ASC",
            PRODUCT_COLUMNS
        ))
        .bind(threshold)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(Product::from).collect())
    }
}

pub struct StoreBundleRepository {
    pool: PgPool,
}

impl StoreBundleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn into_bundles(rows: Vec<BundleRow>) -> StoreResult<Vec<Bundle>> {
    rows.into_iter().map(Bundle::try_from).collect()
}

#[async_trait]
impl BundleRepository for StoreBundleRepository {
    async fn list(&self, include_inactive: bool) -> StoreResult<Vec<Bundle>> {
        let rows: Vec<BundleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bundles WHERE $1 OR is_active ORDER BY created_at DESC",
            BUNDLE_COLUMNS
        ))
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        into_bundles(rows)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Bundle>> {
        let row: Option<BundleRow> =
            sqlx::query_as(&format!("SELECT {} FROM bundles WHERE id = $1", BUNDLE_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        row.map(Bundle::try_from).transpose()
    }

    async fn get_by_slug(&self, slug: &str) -> StoreResult<Option<Bundle>> {
        let row: Option<BundleRow> =
            sqlx::query_as(&format!("SELECT {} FROM bundles WHERE slug = $1", BUNDLE_COLUMNS))
                .bind(slug)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        row.map(Bundle::try_from).transpose()
    }

    async fn get_many(&self, ids: &[Uuid]) -> StoreResult<Vec<Bundle>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<BundleRow> =
            sqlx::query_as(&format!("SELECT {} FROM bundles WHERE id = ANY($1)", BUNDLE_COLUMNS))
                .bind(ids)
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
        into_bundles(rows)
    }

    async fn create(&self, bundle: &Bundle) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bundles (id, name, slug, description, bundle_type, discount_type, discount_value,
                starts_at, ends_at, stock_limit, sold_count, is_active, image_url, items, slots, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(bundle.id)
        .bind(&bundle.name)
        .bind(&bundle.slug)
        .bind(&bundle.description)
        .bind(bundle.bundle_type.as_str())
        .bind(bundle.discount_type.as_str())
        .bind(bundle.discount_value)
        .bind(bundle.starts_at)
        .bind(bundle.ends_at)
        .bind(bundle.stock_limit)
        .bind(bundle.sold_count)
        .bind(bundle.is_active)
        .bind(&bundle.image_url)
        .bind(Json(&bundle.items))
        .bind(Json(&bundle.slots))
        .bind(bundle.created_at)
        .bind(bundle.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn update(&self, bundle: &Bundle) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bundles
            SET name = $2, slug = $3, description = $4, bundle_type = $5, discount_type = $6,
                discount_value = $7, starts_at = $8, ends_at = $9, stock_limit = $10, is_active = $11,
                image_url = $12, items = $13, slots = $14, updated_at = $15
            WHERE id = $1
            "#,
        )
        .bind(bundle.id)
        .bind(&bundle.name)
        .bind(&bundle.slug)
        .bind(&bundle.description)
        .bind(bundle.bundle_type.as_str())
        .bind(bundle.discount_type.as_str())
        .bind(bundle.discount_value)
        .bind(bundle.starts_at)
        .bind(bundle.ends_at)
        .bind(bundle.stock_limit)
        .bind(bundle.is_active)
        .bind(&bundle.image_url)
        .bind(Json(&bundle.items))
        .bind(Json(&bundle.slots))
        .bind(bundle.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("bundle {}", bundle.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM bundles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("bundle {}", id)));
        }
        Ok(())
    }
}
