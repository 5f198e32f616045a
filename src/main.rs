use tracing::{error, info};

#[tokio::main]
async fn main() {
    edison_io::init_tracing();
    info!("[edison-io] starting up...");

    if let Err(e) = edison_io::run().await {
        error!("[error] {}", e);
        std::process::exit(1);
    }
}
