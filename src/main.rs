mod api;
mod auth;
mod chat;
mod cli;
mod config;
mod context;
mod exchange;
mod logging;
mod storage;
mod theme;
mod tui;

#[cfg(test)]
mod testing;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use cli::{ChatsAction, Cli, Commands, ThemeAction};
use tracing::info;

use crate::chat::{Chat, Role};
use crate::config::AppConfig;
use crate::context::AppContext;
use crate::exchange::MessageExchange;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;
    let _log_guard = logging::init(&config.log_file(), &config.logging.level)?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting aalim");

    let mut ctx = AppContext::build(config).await?;

    match cli.command {
        Some(command) => run_command(&mut ctx, command).await?,
        None => tui::run(ctx).await?,
    }

    Ok(())
}

async fn run_command(ctx: &mut AppContext, command: Commands) -> Result<()> {
    match command {
        Commands::Ask { question, k, new } => {
            let question = question.join(" ");
            let mut store = ctx.open_store().await;
            if new {
                store.new_chat().await;
            }

            let exchange = match k {
                Some(k) => MessageExchange::new(ctx.exchange.client(), k),
                None => ctx.exchange.clone(),
            };
            let turn = exchange
                .ask(&mut store, &question, ctx.auth_token())
                .await
                .ok_or_else(|| anyhow!("Nothing to ask"))?;

            let answer = store
                .chat(&turn.chat_id)
                .and_then(|c| c.messages.last())
                .filter(|m| m.role == Role::Assistant)
                .context("No answer was recorded")?;
            println!("{}", answer.content);
        }
        Commands::Chats { action } => {
            let mut store = ctx.open_store().await;
            match action {
                ChatsAction::List => {
                    let active = store.active_chat_id();
                    for chat in store.chats() {
                        let marker = if Some(chat.id.as_str()) == active { "*" } else { " " };
                        println!(
                            "{} {}  {}  ({} messages)",
                            marker,
                            chat.id,
                            chat.display_title(),
                            chat.messages.len()
                        );
                    }
                }
                ChatsAction::New => {
                    let id = store.new_chat().await;
                    println!("{}", id);
                }
                ChatsAction::Select { id } => {
                    if !store.select_chat(&id).await {
                        bail!("No chat with id {}", id);
                    }
                    println!("Active chat: {}", id);
                }
                ChatsAction::Show { id } => {
                    let chat = match id {
                        Some(id) => store.chat(&id).with_context(|| format!("No chat with id {}", id))?,
                        None => store.active_chat().context("No active chat")?,
                    };
                    print_chat(chat);
                }
            }
        }
        Commands::Login { email, password } => {
            let user = ctx.auth.login(&email, &password).await?;
            println!("Signed in as {}", user.label());
        }
        Commands::Signup {
            email,
            password,
            name,
        } => {
            let user = ctx.auth.signup(&email, &password, name.as_deref()).await?;
            println!("Account created. Signed in as {}", user.label());
        }
        Commands::LoginWith {
            provider,
            access_token,
        } => {
            let user = ctx
                .auth
                .sign_in_with_provider(&provider, &access_token)
                .await?;
            println!("Signed in as {}", user.label());
        }
        Commands::Logout => {
            ctx.auth.logout().await;
            println!("Signed out");
        }
        Commands::ResetPassword { email } => {
            ctx.auth.reset_password(&email).await?;
            println!("Password reset email sent to {}", email);
        }
        Commands::Whoami => match ctx.auth.current_user() {
            Some(user) => println!("{} ({})", user.label(), user.uid),
            None => println!("Not signed in"),
        },
        Commands::Theme { action } => match action {
            ThemeAction::Toggle => {
                let mode = ctx.theme.toggle().await;
                println!("Theme: {}", mode.as_str());
            }
            ThemeAction::Show => println!("Theme: {}", ctx.theme.mode().as_str()),
        },
    }

    Ok(())
}

fn print_chat(chat: &Chat) {
    println!("# {}\n", chat.display_title());
    for message in &chat.messages {
        let who = match message.role {
            Role::User => "You",
            Role::Assistant => "Aalim",
        };
        println!(
            "[{}] {}:\n{}\n",
            message.timestamp.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"),
            who,
            message.content
        );
    }
}
