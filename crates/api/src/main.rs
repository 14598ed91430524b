#[tokio::main]
async fn main() {
    parceltrace_observability::init();

    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
        "dev-secret".to_string()
    });
    let tracking_prefix =
        std::env::var("TRACKING_PREFIX").unwrap_or_else(|_| "IND".to_string());

    let app = parceltrace_api::app::build_app(jwt_secret, tracking_prefix).await;

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
        .await
        .expect("failed to bind 0.0.0.0:8080");

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
