use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    audit_cli::main_entry().await
}
