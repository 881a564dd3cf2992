#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mindwell_lib::run().await
}
