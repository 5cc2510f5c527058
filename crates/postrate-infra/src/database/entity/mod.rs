//! SeaORM entities.

pub mod article;
pub mod article_like;
pub mod category;
pub mod comment;
pub mod exchange_rate;
pub mod favorite;
pub mod user;
