use clap::Args;
use serde_json::json;

use crate::auth::issue_token;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config;
use crate::types::{Actor, Role};

#[derive(Args, Debug)]
pub struct TokenArgs {
    #[arg(long, help = "Subject (user id) carried in the token")]
    pub sub: String,

    #[arg(long, help = "Role: admin, editor or viewer")]
    pub role: Role,

    #[arg(long, help = "Display name")]
    pub name: Option<String>,
}

pub fn handle(args: TokenArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let actor = Actor {
        id: args.sub,
        name: args.name,
        role: args.role,
    };
    let token = issue_token(&actor)?;

    match output_format {
        OutputFormat::Json => output_success(
            &output_format,
            "Token issued",
            Some(json!({
                "token": token,
                "actor": actor,
                "expires_in_hours": config::config().security.jwt_expiry_hours,
            })),
        ),
        // Bare token so it can be captured with $(admin token ...)
        OutputFormat::Text => {
            println!("{}", token);
            Ok(())
        }
    }
}
