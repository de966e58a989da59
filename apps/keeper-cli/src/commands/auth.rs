use keeper_client::register;

use crate::grpc::{setup_auth_client, Context};

pub async fn cmd_register(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let (username, password) = ctx.credentials()?;
    let mut client = setup_auth_client(ctx).await?;

    let message = register(&mut client, username, password).await?;

    println!("✓ {}", message);
    println!("  Username: {}", username);

    Ok(())
}
