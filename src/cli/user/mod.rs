//! User commands - create, check and show users

use clap::Args;
use serde_json::json;

use crate::config::AppConfig;
use crate::domain::UserRecord;
use crate::infrastructure::user::UserModel;

#[derive(Args, Debug, Clone)]
pub struct CreateUserArgs {
    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub password: String,

    #[arg(long)]
    pub name: Option<String>,

    /// Grant administrator rights
    #[arg(long, default_value_t = false)]
    pub admin: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CheckPasswordArgs {
    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub password: String,
}

#[derive(Args, Debug, Clone)]
pub struct ShowUserArgs {
    #[arg(long)]
    pub email: String,
}

pub async fn create(config: &AppConfig, args: CreateUserArgs) -> anyhow::Result<()> {
    let model = crate::init_user_model(config).await?;

    let mut record = UserRecord::new(args.email, args.password).with_admin(args.admin);
    if let Some(name) = args.name {
        record = record.with_name(name);
    }
    model.save(&mut record).await?;

    print_json(&model.to_output(&record)?)
}

pub async fn check_password(config: &AppConfig, args: CheckPasswordArgs) -> anyhow::Result<()> {
    let model = crate::init_user_model(config).await?;
    let record = find_required(&model, &args.email).await?;

    let matches = model.compare_password(&record, &args.password).await?;

    print_json(&json!({ "email": record.email(), "matches": matches }))
}

pub async fn show(config: &AppConfig, args: ShowUserArgs) -> anyhow::Result<()> {
    let model = crate::init_user_model(config).await?;
    let record = find_required(&model, &args.email).await?;

    print_json(&model.to_output(&record)?)
}

async fn find_required(model: &UserModel, email: &str) -> anyhow::Result<UserRecord> {
    model
        .find_by_email(email)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No user with email '{}'", email))
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
