use anyhow::Result;

use crate::context;

pub async fn run() -> Result<()> {
    let (_, ctx) = context::open().await?;
    let url = ctx.auth_url().await?;

    println!("Opening browser to connect your calendar...");
    if open::that(&url).is_err() {
        println!("Could not open a browser. Visit:\n  {url}");
    }

    println!("\nRun `wscal sync` once connected.");

    Ok(())
}
