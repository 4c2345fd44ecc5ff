//! Account commands - register, login, logout and whoami.

use anyhow::Result;
use clap::Args;
use tracing::info;

use super::{connect, note, signed_in, GlobalArgs};

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Display name, at least 3 letters or digits
    #[arg(short, long)]
    username: String,

    /// Account email
    #[arg(short, long)]
    email: String,

    /// Password, at least 6 characters
    #[arg(short, long, env = "RECAP_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account email
    #[arg(short, long)]
    email: String,

    /// Account password
    #[arg(short, long, env = "RECAP_PASSWORD", hide_env_values = true)]
    password: String,
}

pub async fn register(args: RegisterArgs, global: &GlobalArgs) -> Result<()> {
    info!("Registering account: {}", args.email);

    let manager = connect(global)?;
    let user = manager.register(&args.username, &args.email, &args.password).await?;

    note(global, format!("✅ Account created, signed in as {} <{}>", user.username, user.email));
    Ok(())
}

pub async fn login(args: LoginArgs, global: &GlobalArgs) -> Result<()> {
    let manager = connect(global)?;
    let user = manager.login(&args.email, &args.password).await?;

    note(global, format!("✅ Signed in as {} <{}>", user.username, user.email));
    Ok(())
}

pub async fn logout(global: &GlobalArgs) -> Result<()> {
    let manager = connect(global)?;
    manager.logout();

    note(global, "👋 Signed out");
    Ok(())
}

pub async fn whoami(global: &GlobalArgs) -> Result<()> {
    let (_, user) = signed_in(global).await?;

    println!("{} <{}>", user.username, user.email);
    Ok(())
}
