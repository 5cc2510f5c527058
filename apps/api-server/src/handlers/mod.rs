//! HTTP handlers and route configuration.

mod admin;
mod articles;
mod auth;
mod engagement;
mod exchange_rates;
mod health;

#[cfg(test)]
mod tests;

use actix_web::web;

use crate::middleware::error::{json_config, path_config, query_config};

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .app_data(path_config())
        .service(
            web::scope("/api")
                // Public routes
                .route("/health", web::get().to(health::health_check))
                .service(
                    web::scope("/auth")
                        .route("/register", web::post().to(auth::register))
                        .route("/login", web::post().to(auth::login))
                        .route("/me", web::get().to(auth::me)),
                )
                .service(
                    web::scope("/articles")
                        .route("", web::get().to(articles::list))
                        .route("/hot", web::get().to(articles::hot))
                        .route("/{id}", web::get().to(articles::detail))
                        .route("/{id}/comments", web::get().to(articles::comments))
                        .route("/{id}/comments", web::post().to(engagement::create_comment))
                        .route("/{id}/like", web::get().to(engagement::like_summary))
                        .route("/{id}/like", web::post().to(engagement::toggle_like))
                        .route("/{id}/favorite", web::post().to(engagement::toggle_favorite)),
                )
                .route("/categories", web::get().to(articles::categories))
                .route("/comments/{id}", web::delete().to(engagement::delete_comment))
                .route("/user/favorites", web::get().to(engagement::favorites))
                .route("/favorites/{id}", web::delete().to(engagement::remove_favorite))
                .service(
                    web::scope("/exchange-rates")
                        .route("", web::get().to(exchange_rates::history))
                        .route("/latest", web::get().to(exchange_rates::latest))
                        .route("/base", web::get().to(exchange_rates::base)),
                )
                // Admin role
                .service(
                    web::scope("/admin")
                        .route("/articles", web::post().to(admin::create_article))
                        .route("/articles/{id}", web::put().to(admin::update_article))
                        .route("/articles/{id}", web::delete().to(admin::delete_article))
                        .route("/categories", web::post().to(admin::create_category))
                        .route("/categories/{id}", web::delete().to(admin::delete_category))
                        .route("/exchange-rates/refresh", web::post().to(admin::refresh_rates)),
                ),
        );
}
