#[tokio::main]
async fn main() {
    let config = nimbus::config::Config::from_env();
    if let Err(e) = nimbus::run(config).await {
        eprintln!("nimbus: fatal: {e}");
        std::process::exit(1);
    }
}
