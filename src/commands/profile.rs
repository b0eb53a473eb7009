use clap::{Args, Subcommand};
use profilesync_core::{is_synthesized, DocumentId, Profile, ProfileSyncRule};

use super::OutputFormat;

#[derive(Args)]
pub struct ProfileCommand {
    #[command(subcommand)]
    pub command: ProfileSubcommand,
}

#[derive(Subcommand)]
pub enum ProfileSubcommand {
    /// List all profiles
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the profile belonging to a user
    Show {
        /// User ID
        user_id: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

fn summary_line(profile: &Profile) -> String {
    let marker = if is_synthesized(&profile.full_name) {
        " (generated)"
    } else {
        ""
    };
    format!("{}  {}{}  user: {}", profile.id, profile.full_name, marker, profile.user)
}

impl ProfileCommand {
    pub async fn run(&self, rule: &ProfileSyncRule) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ProfileSubcommand::List { format } => {
                let profiles = rule.list_profiles().await?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&profiles)?);
                    }
                    OutputFormat::Text => {
                        if profiles.is_empty() {
                            println!("No profiles found.");
                        } else {
                            for profile in &profiles {
                                println!("{}", summary_line(profile));
                            }
                        }
                    }
                }
                Ok(())
            }

            ProfileSubcommand::Show { user_id, format } => {
                let user = DocumentId::new(user_id.as_str());
                let profiles = rule.find_profiles(&user).await?;
                let profile = match profiles.first() {
                    Some(p) => p,
                    None => return Err(format!("No profile for user: {}", user).into()),
                };

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(profile)?);
                    }
                    OutputFormat::Text => {
                        println!("{}", profile);
                        if profiles.len() > 1 {
                            println!("\n({} profiles reference this user)", profiles.len());
                        }
                    }
                }
                Ok(())
            }
        }
    }
}
