use clap::{Args, Subcommand};
use profilesync_core::DocumentId;
use std::io::{self, Write};

use super::OutputFormat;
use crate::users::{NewUser, UserService};

#[derive(Args)]
pub struct UserCommand {
    #[command(subcommand)]
    pub command: UserSubcommand,
}

#[derive(Subcommand)]
pub enum UserSubcommand {
    /// Register a new user
    Create {
        /// Unique username
        username: String,

        /// Email address
        #[arg(long)]
        email: Option<String>,

        /// Full name shown on the profile
        #[arg(long)]
        full_name: Option<String>,

        /// Short biography shown on the profile
        #[arg(long)]
        bio: Option<String>,

        /// Extra registration field (can be repeated)
        #[arg(long = "field", value_name = "KEY=VALUE", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },

    /// Delete a user and its profile
    Delete {
        /// User ID
        id: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// List all users
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

fn parse_field(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

impl UserCommand {
    pub async fn run(&self, users: &UserService) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            UserSubcommand::Create {
                username,
                email,
                full_name,
                bio,
                fields,
            } => {
                let mut new_user = NewUser::new(username.as_str());

                if let Some(email) = email {
                    new_user = new_user.with_email(email.as_str());
                }
                if let Some(full_name) = full_name {
                    new_user = new_user.with_field("fullName", full_name.as_str());
                }
                if let Some(bio) = bio {
                    new_user = new_user.with_field("bio", bio.as_str());
                }
                for (key, value) in fields {
                    new_user = new_user.with_field(key.as_str(), value.as_str());
                }

                let created = users.register(new_user).await?;
                println!("Created user:");
                println!("{}", created);
                Ok(())
            }

            UserSubcommand::Delete { id, force } => {
                let id = DocumentId::new(id.as_str());
                let user = match users.get(&id).await? {
                    Some(u) => u,
                    None => return Err(format!("User not found: {}", id).into()),
                };

                // Confirm deletion unless --force is used
                if !force {
                    print!("Delete user '{}' and its profile? [y/N] ", user.username);
                    io::stdout().flush()?;

                    let mut input = String::new();
                    io::stdin().read_line(&mut input)?;

                    if !input.trim().eq_ignore_ascii_case("y") {
                        println!("Deletion cancelled.");
                        return Ok(());
                    }
                }

                users.delete(&id).await?;
                println!("Deleted user: {}", user.username);
                Ok(())
            }

            UserSubcommand::List { format } => {
                let all = users.list().await?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&all)?);
                    }
                    OutputFormat::Text => {
                        if all.is_empty() {
                            println!("No users found.");
                        } else {
                            for user in &all {
                                match &user.email {
                                    Some(email) => {
                                        println!("{}  {} <{}>", user.id, user.username, email)
                                    }
                                    None => println!("{}  {}", user.id, user.username),
                                }
                            }
                        }
                    }
                }
                Ok(())
            }
        }
    }
}
