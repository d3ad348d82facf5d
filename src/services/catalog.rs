//! Product listing, facets and product detail queries.
//!
//! The listing is one grouped query: products LEFT JOIN variants for the
//! min/max effective price, with every facet expressed as an `IN (subquery)`
//! on the product id so the count query can reuse the same condition.

use sea_orm::{
    sea_query::{Expr, Func, LikeExpr, NullOrdering, Query, SelectStatement, SimpleExpr},
    ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, FromQueryResult, JoinType,
    ModelTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::entities::{
    attribute, attribute_value, brand, category, collection,
    product::{self, Gender},
    product_collection, product_image, product_variant, variant_attribute_value,
};
use crate::services::filter::{ProductFilter, SortOrder};
use crate::services::variant::{attribute_options, VariantView};

#[derive(Debug, FromQueryResult)]
struct ProductRow {
    id: i32,
    name: String,
    slug: String,
    gender: Gender,
    is_featured: bool,
    is_published: bool,
    brand_name: Option<String>,
    category_name: Option<String>,
    min_price: Option<f64>,
    max_price: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ProductCard {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub gender: Gender,
    pub is_featured: bool,
    pub is_published: bool,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub items: Vec<ProductCard>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

fn effective_price() -> SimpleExpr {
    Func::coalesce([
        SimpleExpr::from(Expr::col((
            product_variant::Entity,
            product_variant::Column::SalePrice,
        ))),
        SimpleExpr::from(Expr::col((
            product_variant::Entity,
            product_variant::Column::Price,
        ))),
    ])
    .into()
}

fn min_effective_price() -> SimpleExpr {
    Func::min(effective_price()).into()
}

fn max_effective_price() -> SimpleExpr {
    Func::max(effective_price()).into()
}

fn slug_subquery<E, C>(entity: E, id: C, slug: C, slugs: &BTreeSet<String>) -> SelectStatement
where
    E: EntityTrait,
    C: ColumnTrait,
{
    Query::select()
        .column(id)
        .from(entity)
        .and_where(slug.is_in(slugs.iter().cloned()))
        .to_owned()
}

fn collection_subquery(slugs: &BTreeSet<String>) -> SelectStatement {
    Query::select()
        .column((
            product_collection::Entity,
            product_collection::Column::ProductId,
        ))
        .from(product_collection::Entity)
        .inner_join(
            collection::Entity,
            Expr::col((collection::Entity, collection::Column::Id)).equals((
                product_collection::Entity,
                product_collection::Column::CollectionId,
            )),
        )
        .and_where(
            Expr::col((collection::Entity, collection::Column::Slug)).is_in(slugs.iter().cloned()),
        )
        .to_owned()
}

/// Products that have at least one variant carrying one of `values` for the
/// attribute `name`.
fn attribute_subquery(name: &str, values: &BTreeSet<String>) -> SelectStatement {
    Query::select()
        .column((product_variant::Entity, product_variant::Column::ProductId))
        .from(product_variant::Entity)
        .inner_join(
            variant_attribute_value::Entity,
            Expr::col((
                variant_attribute_value::Entity,
                variant_attribute_value::Column::VariantId,
            ))
            .equals((product_variant::Entity, product_variant::Column::Id)),
        )
        .inner_join(
            attribute_value::Entity,
            Expr::col((attribute_value::Entity, attribute_value::Column::Id)).equals((
                variant_attribute_value::Entity,
                variant_attribute_value::Column::AttributeValueId,
            )),
        )
        .inner_join(
            attribute::Entity,
            Expr::col((attribute::Entity, attribute::Column::Id)).equals((
                attribute_value::Entity,
                attribute_value::Column::AttributeId,
            )),
        )
        .and_where(Expr::col((attribute::Entity, attribute::Column::Name)).eq(name))
        .and_where(
            Expr::col((attribute_value::Entity, attribute_value::Column::Value))
                .is_in(values.iter().cloned()),
        )
        .to_owned()
}

fn price_subquery(min: Option<f64>, max: Option<f64>) -> SelectStatement {
    let mut select = Query::select()
        .column((product_variant::Entity, product_variant::Column::ProductId))
        .from(product_variant::Entity)
        .to_owned();
    if let Some(min) = min {
        select.and_where(Expr::expr(effective_price()).gte(min));
    }
    if let Some(max) = max {
        select.and_where(Expr::expr(effective_price()).lte(max));
    }
    select
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// `column LIKE '%term%'`, with `%`, `_` and `\` in the term matched literally.
pub fn contains_literal<C: ColumnTrait>(column: C, term: &str) -> SimpleExpr {
    let pattern = format!("%{}%", escape_like(term));
    Expr::col((column.entity_name(), column)).like(LikeExpr::new(pattern).escape('\\'))
}

pub fn build_condition(filter: &ProductFilter, include_unpublished: bool) -> Condition {
    let mut condition = Condition::all();

    if !include_unpublished {
        condition = condition.add(product::Column::IsPublished.eq(true));
    }

    if filter.is_unfiltered() {
        return condition;
    }

    if let Some(search) = &filter.search {
        condition = condition.add(
            Condition::any()
                .add(contains_literal(product::Column::Name, search))
                .add(contains_literal(product::Column::Description, search)),
        );
    }

    if !filter.brands.is_empty() {
        condition = condition.add(product::Column::BrandId.in_subquery(slug_subquery(
            brand::Entity,
            brand::Column::Id,
            brand::Column::Slug,
            &filter.brands,
        )));
    }

    if !filter.categories.is_empty() {
        condition = condition.add(product::Column::CategoryId.in_subquery(slug_subquery(
            category::Entity,
            category::Column::Id,
            category::Column::Slug,
            &filter.categories,
        )));
    }

    if !filter.collections.is_empty() {
        condition =
            condition.add(product::Column::Id.in_subquery(collection_subquery(&filter.collections)));
    }

    if !filter.genders.is_empty() {
        condition = condition.add(
            product::Column::Gender.is_in(filter.genders.iter().map(|gender| gender.as_str())),
        );
    }

    // AND across attributes, OR within one attribute's values.
    for (name, values) in &filter.attributes {
        condition = condition.add(product::Column::Id.in_subquery(attribute_subquery(name, values)));
    }

    if filter.min_price.is_some() || filter.max_price.is_some() {
        condition = condition.add(
            product::Column::Id.in_subquery(price_subquery(filter.min_price, filter.max_price)),
        );
    }

    condition
}

pub async fn list_products<C: ConnectionTrait>(
    conn: &C,
    filter: &ProductFilter,
    include_unpublished: bool,
) -> Result<ProductPage, DbErr> {
    let condition = build_condition(filter, include_unpublished);

    let total = product::Entity::find()
        .filter(condition.clone())
        .count(conn)
        .await?;

    let mut select = product::Entity::find()
        .select_only()
        .column(product::Column::Id)
        .column(product::Column::Name)
        .column(product::Column::Slug)
        .column(product::Column::Gender)
        .column(product::Column::IsFeatured)
        .column(product::Column::IsPublished)
        .column_as(brand::Column::Name, "brand_name")
        .column_as(category::Column::Name, "category_name")
        .column_as(min_effective_price(), "min_price")
        .column_as(max_effective_price(), "max_price")
        .join(JoinType::LeftJoin, product::Relation::Brand.def())
        .join(JoinType::LeftJoin, product::Relation::Category.def())
        .join(JoinType::LeftJoin, product::Relation::Variant.def())
        .filter(condition)
        .group_by(product::Column::Id)
        .group_by(brand::Column::Name)
        .group_by(category::Column::Name);

    select = match filter.sort {
        SortOrder::Featured => select
            .order_by(product::Column::IsFeatured, Order::Desc)
            .order_by(product::Column::CreatedAt, Order::Desc),
        SortOrder::Newest => select.order_by(product::Column::CreatedAt, Order::Desc),
        SortOrder::PriceAsc => {
            select.order_by_with_nulls(min_effective_price(), Order::Asc, NullOrdering::Last)
        }
        SortOrder::PriceDesc => {
            select.order_by_with_nulls(min_effective_price(), Order::Desc, NullOrdering::Last)
        }
    };

    let rows = select
        .order_by(product::Column::Id, Order::Asc)
        .limit(filter.page_size)
        .offset(filter.offset())
        .into_model::<ProductRow>()
        .all(conn)
        .await?;

    let ids: Vec<i32> = rows.iter().map(|row| row.id).collect();
    let mut images = primary_images(conn, &ids).await?;

    let items = rows
        .into_iter()
        .map(|row| ProductCard {
            image: images.remove(&row.id),
            id: row.id,
            name: row.name,
            slug: row.slug,
            gender: row.gender,
            is_featured: row.is_featured,
            is_published: row.is_published,
            brand: row.brand_name,
            category: row.category_name,
            min_price: row.min_price,
            max_price: row.max_price,
        })
        .collect();

    Ok(ProductPage {
        items,
        total,
        page: filter.page,
        page_size: filter.page_size,
        total_pages: total.div_ceil(filter.page_size),
    })
}

/// Image url per product: primary first, then lowest sort order.
pub async fn primary_images<C: ConnectionTrait>(
    conn: &C,
    product_ids: &[i32],
) -> Result<HashMap<i32, String>, DbErr> {
    let mut primary = HashMap::new();
    if product_ids.is_empty() {
        return Ok(primary);
    }

    let images = product_image::Entity::find()
        .filter(product_image::Column::ProductId.is_in(product_ids.iter().copied()))
        .order_by_desc(product_image::Column::IsPrimary)
        .order_by_asc(product_image::Column::SortOrder)
        .order_by_asc(product_image::Column::Id)
        .all(conn)
        .await?;

    for image in images {
        primary.entry(image.product_id).or_insert(image.url);
    }
    Ok(primary)
}

#[derive(Debug, Serialize)]
pub struct FacetOption {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct AttributeFacet {
    pub name: String,
    pub display_name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct Facets {
    pub brands: Vec<FacetOption>,
    pub categories: Vec<FacetOption>,
    pub collections: Vec<FacetOption>,
    pub genders: Vec<&'static str>,
    pub attributes: Vec<AttributeFacet>,
}

pub async fn facets<C: ConnectionTrait>(conn: &C) -> Result<Facets, DbErr> {
    let brands = brand::Entity::find()
        .order_by_asc(brand::Column::Name)
        .all(conn)
        .await?
        .into_iter()
        .map(|b| FacetOption {
            id: b.id,
            name: b.name,
            slug: b.slug,
        })
        .collect();

    let categories = category::Entity::find()
        .order_by_asc(category::Column::Name)
        .all(conn)
        .await?
        .into_iter()
        .map(|c| FacetOption {
            id: c.id,
            name: c.name,
            slug: c.slug,
        })
        .collect();

    let collections = collection::Entity::find()
        .order_by_asc(collection::Column::Name)
        .all(conn)
        .await?
        .into_iter()
        .map(|c| FacetOption {
            id: c.id,
            name: c.name,
            slug: c.slug,
        })
        .collect();

    let attributes = attribute::Entity::find()
        .order_by_asc(attribute::Column::Name)
        .find_with_related(attribute_value::Entity)
        .all(conn)
        .await?
        .into_iter()
        .map(|(attribute, values)| {
            let mut values: Vec<String> = values.into_iter().map(|v| v.value).collect();
            values.sort();
            AttributeFacet {
                name: attribute.name,
                display_name: attribute.display_name,
                values,
            }
        })
        .collect();

    Ok(Facets {
        brands,
        categories,
        collections,
        genders: Gender::ALL.iter().map(|g| g.as_str()).collect(),
        attributes,
    })
}

#[derive(Debug, FromQueryResult)]
struct VariantAttributeRow {
    variant_id: i32,
    attribute_name: String,
    value: String,
}

/// attribute name -> value, per variant id.
pub async fn variant_attributes<C: ConnectionTrait>(
    conn: &C,
    variant_ids: &[i32],
) -> Result<HashMap<i32, BTreeMap<String, String>>, DbErr> {
    let mut by_variant: HashMap<i32, BTreeMap<String, String>> = HashMap::new();
    if variant_ids.is_empty() {
        return Ok(by_variant);
    }

    let rows = variant_attribute_value::Entity::find()
        .select_only()
        .column(variant_attribute_value::Column::VariantId)
        .column_as(attribute::Column::Name, "attribute_name")
        .column_as(attribute_value::Column::Value, "value")
        .join(
            JoinType::InnerJoin,
            variant_attribute_value::Relation::AttributeValue.def(),
        )
        .join(JoinType::InnerJoin, attribute_value::Relation::Attribute.def())
        .filter(variant_attribute_value::Column::VariantId.is_in(variant_ids.iter().copied()))
        .into_model::<VariantAttributeRow>()
        .all(conn)
        .await?;

    for row in rows {
        by_variant
            .entry(row.variant_id)
            .or_default()
            .insert(row.attribute_name, row.value);
    }
    Ok(by_variant)
}

pub async fn variant_views<C: ConnectionTrait>(
    conn: &C,
    product_id: i32,
) -> Result<Vec<VariantView>, DbErr> {
    let variants = product_variant::Entity::find()
        .filter(product_variant::Column::ProductId.eq(product_id))
        .order_by_asc(product_variant::Column::Id)
        .all(conn)
        .await?;

    let ids: Vec<i32> = variants.iter().map(|v| v.id).collect();
    let mut attributes = variant_attributes(conn, &ids).await?;

    Ok(variants
        .into_iter()
        .map(|variant| VariantView {
            attributes: attributes.remove(&variant.id).unwrap_or_default(),
            id: variant.id,
            sku: variant.sku,
            price: variant.price,
            sale_price: variant.sale_price,
            in_stock: variant.in_stock,
        })
        .collect())
}

#[derive(Debug, Serialize)]
pub struct ProductDetail {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub gender: Gender,
    pub is_featured: bool,
    pub is_published: bool,
    pub brand: Option<FacetOption>,
    pub category: Option<FacetOption>,
    pub collections: Vec<FacetOption>,
    pub images: Vec<product_image::Model>,
    pub variants: Vec<VariantView>,
    pub options: BTreeMap<String, BTreeSet<String>>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

pub async fn product_detail<C: ConnectionTrait>(
    conn: &C,
    product: product::Model,
) -> Result<ProductDetail, DbErr> {
    let brand = product
        .find_related(brand::Entity)
        .one(conn)
        .await?
        .map(|b| FacetOption {
            id: b.id,
            name: b.name,
            slug: b.slug,
        });
    let category = product
        .find_related(category::Entity)
        .one(conn)
        .await?
        .map(|c| FacetOption {
            id: c.id,
            name: c.name,
            slug: c.slug,
        });

    let collections = collection::Entity::find()
        .join(
            JoinType::InnerJoin,
            collection::Relation::ProductCollection.def(),
        )
        .filter(product_collection::Column::ProductId.eq(product.id))
        .order_by_asc(collection::Column::Name)
        .all(conn)
        .await?
        .into_iter()
        .map(|c| FacetOption {
            id: c.id,
            name: c.name,
            slug: c.slug,
        })
        .collect();

    let images = product_image::Entity::find()
        .filter(product_image::Column::ProductId.eq(product.id))
        .order_by_desc(product_image::Column::IsPrimary)
        .order_by_asc(product_image::Column::SortOrder)
        .order_by_asc(product_image::Column::Id)
        .all(conn)
        .await?;

    let variants = variant_views(conn, product.id).await?;
    let options = attribute_options(&variants);
    let prices = variants.iter().map(VariantView::effective_price);
    let min_price = prices.clone().reduce(f64::min);
    let max_price = prices.reduce(f64::max);

    Ok(ProductDetail {
        id: product.id,
        name: product.name,
        slug: product.slug,
        description: product.description,
        gender: product.gender,
        is_featured: product.is_featured,
        is_published: product.is_published,
        brand,
        category,
        collections,
        images,
        variants,
        options,
        min_price,
        max_price,
    })
}

pub async fn published_product_by_slug<C: ConnectionTrait>(
    conn: &C,
    slug: &str,
) -> Result<Option<product::Model>, DbErr> {
    product::Entity::find()
        .filter(product::Column::Slug.eq(slug))
        .filter(product::Column::IsPublished.eq(true))
        .one(conn)
        .await
}

#[derive(Clone, Copy, Debug)]
pub enum ProductReference {
    Brand(i32),
    Category(i32),
    Collection(i32),
}

/// How many products point at a brand, category or collection.
pub async fn count_products_referencing<C: ConnectionTrait>(
    conn: &C,
    reference: ProductReference,
) -> Result<u64, DbErr> {
    match reference {
        ProductReference::Brand(id) => {
            product::Entity::find()
                .filter(product::Column::BrandId.eq(id))
                .count(conn)
                .await
        }
        ProductReference::Category(id) => {
            product::Entity::find()
                .filter(product::Column::CategoryId.eq(id))
                .count(conn)
                .await
        }
        ProductReference::Collection(id) => {
            product_collection::Entity::find()
                .filter(product_collection::Column::CollectionId.eq(id))
                .count(conn)
                .await
        }
    }
}
