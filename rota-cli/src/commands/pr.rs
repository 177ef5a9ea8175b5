//! Pull request commands

use clap::{Args, Subcommand};
use rota_core::{Config, CreatePullRequest, MergePullRequest, ReassignReviewer};

use super::session::{print_json, Session};

/// Create, merge and reassign pull requests
#[derive(Args, Debug)]
pub struct PrArgs {
    #[command(subcommand)]
    pub command: PrCommand,
}

#[derive(Subcommand, Debug)]
pub enum PrCommand {
    /// Create a pull request and assign reviewers from the author's team
    Create {
        /// Pull request id
        id: String,

        /// Title
        #[arg(short, long)]
        name: String,

        /// Author user id
        #[arg(short, long)]
        author: String,
    },

    /// Mark a pull request merged
    Merge {
        /// Pull request id
        id: String,
    },

    /// Replace one reviewer with another active teammate
    Reassign {
        /// Pull request id
        id: String,

        /// Reviewer to replace
        #[arg(long = "old", value_name = "USER_ID")]
        old_reviewer_id: String,
    },
}

impl PrArgs {
    /// Execute the pull request command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let session = Session::open(config).await?;
        let engine = session.engine();
        let cx = session.op_context();

        match &self.command {
            PrCommand::Create { id, name, author } => {
                let created = engine
                    .create_pull_request(
                        &cx,
                        CreatePullRequest {
                            id: id.clone(),
                            name: name.clone(),
                            author_id: author.clone(),
                        },
                    )
                    .await?;
                print_json(&created)
            }
            PrCommand::Merge { id } => {
                let merged = engine
                    .merge_pull_request(&cx, MergePullRequest { id: id.clone() })
                    .await?;
                print_json(&merged)
            }
            PrCommand::Reassign {
                id,
                old_reviewer_id,
            } => {
                let out = engine
                    .reassign_reviewer(
                        &cx,
                        ReassignReviewer {
                            pull_request_id: id.clone(),
                            old_reviewer_id: old_reviewer_id.clone(),
                        },
                    )
                    .await?;
                print_json(&out)
            }
        }
    }
}
