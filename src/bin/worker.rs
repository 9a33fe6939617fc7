#[tokio::main]
async fn main() -> anyhow::Result<()> {
    scangrade::run_worker().await
}
