#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = refuerzo_rust::run().await {
        eprintln!("refuerzo-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
