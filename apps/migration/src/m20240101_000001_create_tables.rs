use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk(Users::Id))
                    .col(ColumnDef::new(Users::Username).string().not_null().unique_key())
                    .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                    .col(ColumnDef::new(Users::Role).string().not_null().default("user"))
                    .col(ColumnDef::new(Users::Nickname).string())
                    .col(created_at(Users::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(pk(Categories::Id))
                    .col(ColumnDef::new(Categories::Name).string().not_null().unique_key())
                    .col(created_at(Categories::CreatedAt))
                    .to_owned(),
            )
            .await?;

        // category_id has no foreign key: deleting a category leaves its
        // articles pointing at it.
        manager
            .create_table(
                Table::create()
                    .table(Articles::Table)
                    .if_not_exists()
                    .col(pk(Articles::Id))
                    .col(ColumnDef::new(Articles::Title).string().not_null())
                    .col(ColumnDef::new(Articles::Content).text().not_null())
                    .col(ColumnDef::new(Articles::Preview).string().not_null())
                    .col(ColumnDef::new(Articles::Cover).string())
                    .col(counter(Articles::LikesCount))
                    .col(counter(Articles::ViewsCount))
                    .col(ColumnDef::new(Articles::AuthorId).big_integer().not_null())
                    .col(ColumnDef::new(Articles::CategoryId).big_integer())
                    .col(
                        ColumnDef::new(Articles::Status)
                            .string()
                            .not_null()
                            .default("published"),
                    )
                    .col(created_at(Articles::CreatedAt))
                    .col(created_at(Articles::UpdatedAt))
                    .col(ColumnDef::new(Articles::DeletedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Articles::Table, Articles::AuthorId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_articles_created_at")
                    .table(Articles::Table)
                    .col(Articles::CreatedAt)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_articles_views_count")
                    .table(Articles::Table)
                    .col(Articles::ViewsCount)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Comments::Table)
                    .if_not_exists()
                    .col(pk(Comments::Id))
                    .col(ColumnDef::new(Comments::ArticleId).big_integer().not_null())
                    .col(ColumnDef::new(Comments::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Comments::UserName).string().not_null())
                    .col(ColumnDef::new(Comments::Content).text().not_null())
                    .col(ColumnDef::new(Comments::ParentId).big_integer())
                    .col(created_at(Comments::CreatedAt))
                    .col(ColumnDef::new(Comments::DeletedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Comments::Table, Comments::ArticleId)
                            .to(Articles::Table, Articles::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Comments::Table, Comments::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_comments_article_created")
                    .table(Comments::Table)
                    .col(Comments::ArticleId)
                    .col(Comments::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ArticleLikes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ArticleLikes::UserId).big_integer().not_null())
                    .col(ColumnDef::new(ArticleLikes::ArticleId).big_integer().not_null())
                    .col(created_at(ArticleLikes::CreatedAt))
                    .primary_key(
                        Index::create()
                            .col(ArticleLikes::UserId)
                            .col(ArticleLikes::ArticleId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ArticleLikes::Table, ArticleLikes::ArticleId)
                            .to(Articles::Table, Articles::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ArticleLikes::Table, ArticleLikes::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Favorites::Table)
                    .if_not_exists()
                    .col(pk(Favorites::Id))
                    .col(ColumnDef::new(Favorites::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Favorites::ArticleId).big_integer().not_null())
                    .col(created_at(Favorites::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .from(Favorites::Table, Favorites::ArticleId)
                            .to(Articles::Table, Articles::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Favorites::Table, Favorites::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_favorites_user_article")
                    .table(Favorites::Table)
                    .col(Favorites::UserId)
                    .col(Favorites::ArticleId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExchangeRates::Table)
                    .if_not_exists()
                    .col(pk(ExchangeRates::Id))
                    .col(ColumnDef::new(ExchangeRates::FromCurrency).string_len(3).not_null())
                    .col(ColumnDef::new(ExchangeRates::ToCurrency).string_len(3).not_null())
                    .col(ColumnDef::new(ExchangeRates::Rate).double().not_null())
                    .col(
                        ColumnDef::new(ExchangeRates::Date)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_exchange_rates_pair_date")
                    .table(ExchangeRates::Table)
                    .col(ExchangeRates::FromCurrency)
                    .col(ExchangeRates::ToCurrency)
                    .col(ExchangeRates::Date)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ExchangeRates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Favorites::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ArticleLikes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Comments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Articles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}

fn pk<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .big_integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

fn created_at<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

fn counter<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .big_integer()
        .not_null()
        .default(0)
        .to_owned()
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    PasswordHash,
    Role,
    Nickname,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Categories {
    Table,
    Id,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Articles {
    Table,
    Id,
    Title,
    Content,
    Preview,
    Cover,
    LikesCount,
    ViewsCount,
    AuthorId,
    CategoryId,
    Status,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

#[derive(DeriveIden)]
enum Comments {
    Table,
    Id,
    ArticleId,
    UserId,
    UserName,
    Content,
    ParentId,
    CreatedAt,
    DeletedAt,
}

#[derive(DeriveIden)]
enum ArticleLikes {
    Table,
    UserId,
    ArticleId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Favorites {
    Table,
    Id,
    UserId,
    ArticleId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ExchangeRates {
    Table,
    Id,
    FromCurrency,
    ToCurrency,
    Rate,
    Date,
}
