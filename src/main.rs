use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

use gardenhub::commands::{chat_commands, profile_commands};
use gardenhub::error::AppError;
use gardenhub::models::chat::CreateChatRequest;
use gardenhub::models::user::{SignUpRequest, ROLE_OWNER};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let state = gardenhub::init()?;
    let email = std::env::var("GARDENHUB_EMAIL").unwrap_or_else(|_| "local@gardenhub.dev".into());

    // Reuse the local account across runs.
    let session = match profile_commands::sign_in(&state, email.clone()).await {
        Ok(session) => session,
        Err(AppError::Unauthenticated(_)) => {
            profile_commands::sign_up(
                &state,
                SignUpRequest {
                    email,
                    display_name: "Local user".into(),
                    role: ROLE_OWNER.into(),
                },
            )
            .await?
        }
        Err(e) => return Err(e.into()),
    };
    let token = session.token;

    let chat = chat_commands::create_chat(
        &state,
        token.clone(),
        CreateChatRequest { project_id: None, title: "Design chat".into() },
    )
    .await?;

    println!("GardenHub design chat. Type a message, :attach <path> to queue an image, :quit to exit.");
    let stdin = io::stdin();
    let mut pending_uploads: Vec<Vec<u8>> = Vec::new();

    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == ":quit" {
            break;
        }
        if let Some(path) = line.strip_prefix(":attach ") {
            let bytes = std::fs::read(path.trim()).with_context(|| format!("reading {path}"))?;
            println!("attached {} ({} bytes)", path.trim(), bytes.len());
            pending_uploads.push(bytes);
            continue;
        }

        let uploads = std::mem::take(&mut pending_uploads);
        match chat_commands::send_turn(&state, token.clone(), chat.id.clone(), line.to_string(), uploads)
            .await
        {
            Ok(reply) => {
                println!("{}", reply.text());
                if let Some(url) = reply.last_image_url() {
                    println!("[image at {url}]");
                }
            }
            Err(e) => eprintln!("error: {e}"),
        }
    }

    Ok(())
}
