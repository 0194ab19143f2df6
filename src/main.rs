#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = examport_client::run().await {
        eprintln!("examport-client fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
