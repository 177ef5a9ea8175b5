//! User commands

use clap::{ArgAction, Args, Subcommand};
use rota_core::{Config, SetUserActive};

use super::session::{print_json, Session};

#[derive(Args, Debug)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserCommand,
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Set a user's active flag without touching reviews
    SetActive {
        user_id: String,

        /// New state (true or false)
        #[arg(long, action = ArgAction::Set)]
        active: bool,
    },

    /// List the pull requests a user reviews
    Reviews { user_id: String },
}

impl UserArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let session = Session::open(config).await?;
        let engine = session.engine();
        let cx = session.op_context();

        match &self.command {
            UserCommand::SetActive { user_id, active } => {
                let updated = engine
                    .set_user_active(
                        &cx,
                        SetUserActive {
                            user_id: user_id.clone(),
                            is_active: *active,
                        },
                    )
                    .await?;
                print_json(&updated)
            }
            UserCommand::Reviews { user_id } => {
                print_json(&engine.reviews_for(&cx, user_id).await?)
            }
        }
    }
}
