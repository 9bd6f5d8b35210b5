//! Interactive chat screen.
//!
//! A line-based REPL over one [`ChatController`]: prints the transcript,
//! reads user turns, and renders assistant replies. Input is gated while
//! a send is in flight by the controller itself.

use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::chat::{ChatController, ChatTurn, SendOutcome};
use crate::render::Renderer;
use crate::store::MessageRole;

const PROMPT: &str = "you> ";

/// Run the chat screen until the user quits (EOF, `exit` or `quit`).
pub async fn run(controller: &mut ChatController, renderer: &Renderer) -> Result<()> {
    println!("== {} ==", controller.title());
    println!("(type your message, or 'exit' to leave)\n");
    for turn in controller.turns() {
        print_turn(turn, renderer);
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        print!("{PROMPT}");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        println!("Thinking...");
        match controller.send(&line).await {
            SendOutcome::Replied | SendOutcome::Failed => {
                if let Some(turn) = controller.turns().last() {
                    print_turn(turn, renderer);
                }
            }
            SendOutcome::LoginRequired => {
                println!("Once you're signed in, send your message again.");
            }
            SendOutcome::Ignored => {}
        }
    }

    Ok(())
}

fn print_turn(turn: &ChatTurn, renderer: &Renderer) {
    match turn.role {
        MessageRole::User => println!("{PROMPT}{}\n", turn.content),
        MessageRole::Assistant => println!("{}\n", renderer.render(&turn.content)),
    }
}
