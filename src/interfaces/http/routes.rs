use super::handlers;
use crate::error::StorefrontError;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        StorefrontError::ValidationError(format!("Invalid request body: {err}")).into()
    }))
    .service(
        web::scope("/api/v1")
            .route("/health", web::get().to(handlers::health))
            .service(
                web::scope("/orders")
                    .route("", web::post().to(handlers::create_order))
                    .route("", web::get().to(handlers::list_orders))
                    .route("/{order_id}", web::get().to(handlers::get_order))
                    .route("/{order_id}/cancel", web::post().to(handlers::cancel_order)),
            )
            .route("/webhooks/payment", web::post().to(handlers::payment_webhook)),
    );
}
