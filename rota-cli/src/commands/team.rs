//! Team commands

use clap::{Args, Subcommand};
use rota_core::{Config, DeactivateMembers, NewMember, NewTeam};

use super::session::{print_json, Session};

/// Manage teams and their members
#[derive(Args, Debug)]
pub struct TeamArgs {
    #[command(subcommand)]
    pub command: TeamCommand,
}

#[derive(Subcommand, Debug)]
pub enum TeamCommand {
    /// Create a team; listed users are created or moved into it
    Add {
        /// Team name
        name: String,

        /// Member as ID=NAME (repeatable)
        #[arg(
            short,
            long = "member",
            value_name = "ID=NAME",
            value_parser = parse_member,
            required = true
        )]
        members: Vec<NewMember>,

        /// Member ids to create as inactive
        #[arg(long, value_name = "ID")]
        inactive: Vec<String>,
    },

    /// Show a team with all its members
    Get {
        /// Team name
        name: String,
    },

    /// Deactivate members and backfill their open reviews
    Deactivate {
        /// Team name
        name: String,

        /// Member ids to deactivate
        #[arg(required = true)]
        member_ids: Vec<String>,
    },
}

impl TeamArgs {
    /// Execute the team command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let session = Session::open(config).await?;
        let engine = session.engine();
        let cx = session.op_context();

        match &self.command {
            TeamCommand::Add {
                name,
                members,
                inactive,
            } => {
                let members = members
                    .iter()
                    .cloned()
                    .map(|mut m| {
                        m.is_active = !inactive.contains(&m.id);
                        m
                    })
                    .collect();
                let roster = engine
                    .add_team(
                        &cx,
                        NewTeam {
                            name: name.clone(),
                            members,
                        },
                    )
                    .await?;
                print_json(&roster)
            }
            TeamCommand::Get { name } => print_json(&engine.get_team(&cx, name).await?),
            TeamCommand::Deactivate { name, member_ids } => {
                let out = engine
                    .deactivate_members(
                        &cx,
                        DeactivateMembers {
                            team_name: name.clone(),
                            member_ids: member_ids.clone(),
                        },
                    )
                    .await?;
                print_json(&out)
            }
        }
    }
}

/// Parse `ID=NAME` into an active member
fn parse_member(s: &str) -> Result<NewMember, String> {
    let (id, name) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ID=NAME, got {:?}", s))?;
    let (id, name) = (id.trim(), name.trim());
    if id.is_empty() || name.is_empty() {
        return Err(format!("expected ID=NAME, got {:?}", s));
    }
    Ok(NewMember::new(id, name))
}
