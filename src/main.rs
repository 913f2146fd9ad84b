#[tokio::main]
async fn main() {
    if let Err(e) = labscribe_lib::run().await {
        eprintln!("{}: {e}", labscribe_lib::config::APP_NAME);
        std::process::exit(1);
    }
}
