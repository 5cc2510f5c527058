//! Exchange rate entity for SeaORM. Rows are base-anchored: `from_currency`
//! is always the base currency.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "exchange_rates")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub from_currency: String,
    pub to_currency: String,
    #[sea_orm(column_type = "Double")]
    pub rate: f64,
    pub date: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for postrate_core::domain::ExchangeRate {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            from_currency: model.from_currency,
            to_currency: model.to_currency,
            rate: model.rate,
            date: model.date.into(),
        }
    }
}
