//! Like entity for SeaORM. Row existence means "liked".

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "article_likes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub article_id: i64,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for postrate_core::domain::ArticleLike {
    fn from(model: Model) -> Self {
        Self {
            user_id: model.user_id,
            article_id: model.article_id,
            created_at: model.created_at.into(),
        }
    }
}
