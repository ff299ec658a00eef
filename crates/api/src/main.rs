#[tokio::main]
async fn main() {
    slated_observability::init();

    let (app, scheduler) = slated_api::app::build_app().await;

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
        .await
        .expect("failed to bind 0.0.0.0:8080");

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();

    scheduler.shutdown().await;
}
