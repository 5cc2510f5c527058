//! Comment entity for SeaORM.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "comments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub article_id: i64,
    pub user_id: i64,
    pub user_name: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub parent_id: Option<i64>,
    pub created_at: DateTimeWithTimeZone,
    pub deleted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for postrate_core::domain::Comment {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            article_id: model.article_id,
            user_id: model.user_id,
            user_name: model.user_name,
            content: model.content,
            parent_id: model.parent_id,
            created_at: model.created_at.into(),
            deleted_at: model.deleted_at.map(Into::into),
        }
    }
}
