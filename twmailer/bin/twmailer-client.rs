//! Interactive client for a twmailer server
//!
//! Reads a command at the `>> ` prompt, asks for each of its fields, checks
//! them locally and prints the server's answer prefixed with `<< `.

use std::io::Write;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use twmailer_common::{Identity, config::ClientTimeouts};
use twmailer_proto::{client::Client, command::END_OF_BODY};
use twmailer_spool::{MessageNumber, Subject};

/// Interactive client for a twmailer server
#[derive(Parser, Debug)]
#[command(name = "twmailer-client")]
#[command(version)]
struct Cli {
    /// Server address
    address: String,

    /// Server port
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// Seconds to wait for each reply
    #[arg(long, default_value_t = 60)]
    response_timeout: u64,
}

struct Prompt {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompt {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Print `label` and read one line; `None` at end of input.
    async fn ask(&mut self, label: &str) -> anyhow::Result<Option<String>> {
        print!("{label}");
        std::io::stdout().flush()?;
        Ok(self.lines.next_line().await?)
    }

    async fn ask_valid<T, E: std::fmt::Display>(
        &mut self,
        label: &str,
        parse: impl Fn(&str) -> Result<T, E>,
    ) -> anyhow::Result<Option<T>> {
        loop {
            let Some(line) = self.ask(label).await? else {
                return Ok(None);
            };

            match parse(line.trim()) {
                Ok(value) => return Ok(Some(value)),
                Err(err) => println!("{err}"),
            }
        }
    }
}

fn status(ok: bool) {
    println!("<< {}", if ok { "OK" } else { "ERR" });
}

async fn login(client: &mut Client, prompt: &mut Prompt) -> anyhow::Result<()> {
    let Some(identity) = prompt.ask_valid("Username: ", Identity::parse).await? else {
        return Ok(());
    };
    let secret =
        tokio::task::spawn_blocking(|| rpassword::prompt_password("Password: ")).await??;

    status(client.login(&identity, &secret).await?);
    Ok(())
}

async fn send(client: &mut Client, prompt: &mut Prompt) -> anyhow::Result<()> {
    let Some(receiver) = prompt.ask_valid("Receiver: ", Identity::parse).await? else {
        return Ok(());
    };
    let Some(subject) = prompt.ask_valid("Subject: ", Subject::parse).await? else {
        return Ok(());
    };

    println!("Message (end with a line containing only '{END_OF_BODY}'):");
    let mut body = Vec::new();
    while let Some(line) = prompt.ask("").await? {
        if line == END_OF_BODY {
            break;
        }
        body.push(line);
    }

    status(client.send(&receiver, &subject, &body).await?);
    Ok(())
}

async fn list(client: &mut Client) -> anyhow::Result<()> {
    match client.list().await? {
        Some(subjects) => {
            println!("<< {}", subjects.len());
            for subject in subjects {
                println!("<< {subject}");
            }
        }
        None => status(false),
    }
    Ok(())
}

async fn read(client: &mut Client, prompt: &mut Prompt) -> anyhow::Result<()> {
    let Some(number) = prompt.ask_valid("Message number: ", MessageNumber::parse).await? else {
        return Ok(());
    };

    match client.read(number).await? {
        Some(body) => {
            status(true);
            for line in body {
                println!("<< {line}");
            }
            println!("<< {END_OF_BODY}");
        }
        None => status(false),
    }
    Ok(())
}

async fn delete(client: &mut Client, prompt: &mut Prompt) -> anyhow::Result<()> {
    let Some(number) = prompt.ask_valid("Message number: ", MessageNumber::parse).await? else {
        return Ok(());
    };

    status(client.delete(number).await?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let timeouts = ClientTimeouts {
        response_secs: cli.response_timeout,
        ..ClientTimeouts::default()
    };

    let mut client = Client::connect(format!("{}:{}", cli.address, cli.port), timeouts).await?;
    println!("<< {}", client.greeting());

    let mut prompt = Prompt::new();

    while let Some(command) = prompt.ask(">> ").await? {
        match command.trim() {
            "LOGIN" => login(&mut client, &mut prompt).await?,
            "SEND" => send(&mut client, &mut prompt).await?,
            "LIST" => list(&mut client).await?,
            "READ" => read(&mut client, &mut prompt).await?,
            "DEL" => delete(&mut client, &mut prompt).await?,
            "QUIT" => break,
            "" => {}
            other => {
                println!("Unknown command {other:?}, expected LOGIN, SEND, LIST, READ, DEL or QUIT");
            }
        }
    }

    client.quit().await?;
    Ok(())
}
