//! Domain entities - the core business objects.

mod article;
mod category;
mod comment;
mod engagement;
mod exchange_rate;
mod pagination;
mod user;

pub use article::{Article, ArticleDraft, ArticlePage, ArticleStatus};
pub use category::Category;
pub use comment::{Comment, CommentDraft, NewComment};
pub use engagement::{ArticleLike, Favorite, FavoriteToggle, FavoriteWithArticle, LikeSummary, LikeToggle};
pub use exchange_rate::{
    BASE_CURRENCY, CrossRate, CurrencyCode, ExchangeRate, RateHistoryQuery, RateSnapshot,
};
pub use pagination::PageRequest;
pub use user::{Actor, NewUser, Role, User};
