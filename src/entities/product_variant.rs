use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "product_variant")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub product_id: i32,
    #[sea_orm(unique)]
    pub sku: String,
    pub price: f64,
    #[sea_orm(nullable)]
    pub sale_price: Option<f64>,
    pub in_stock: bool,
    pub created_at: DateTimeUtc,
}

impl Model {
    /// What the customer pays: the sale price when one is set.
    pub fn effective_price(&self) -> f64 {
        self.sale_price.unwrap_or(self.price)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Product,
    #[sea_orm(has_many = "super::variant_attribute_value::Entity")]
    VariantAttributeValue,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::variant_attribute_value::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VariantAttributeValue.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
