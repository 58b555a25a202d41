#[tokio::main]
async fn main() {
    if let Err(e) = runner_manager::run().await {
        tracing::error!("Runner manager failed: {}", e);
        eprintln!("runner-manager: {}", e);
        std::process::exit(1);
    }
}
