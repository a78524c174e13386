//! Console channel: reads commands from stdin, runs them against the
//! services, prints the reply to stdout.
//!
//! The console holds at most one session (a [`TokenPair`]).  When a command
//! fails with `TokenExpired` it exchanges the refresh token once and retries.
//! Runs until the `shutdown` token is cancelled (Ctrl-C), stdin is closed, or
//! the user types `quit`.

use std::fmt::Write as _;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{ItemId, ListId};
use crate::error::{AppError, ServiceError};
use crate::services::{Services, TokenPair};

const HELP: &str = "\
commands:
  register <name> <password>     create an account and log in
  login <name> <password>        start a session
  logout                         end the session
  refresh                        exchange the refresh token for a new access token
  whoami                         show the display name
  passwd <new-password>          change the password
  rename-me <new-name>           change the display name
  delete-account                 delete the account and all its lists
  lists                          list ids of your lists
  new-list <name>                create a list
  show <list>                    show a list and its items
  drop-list <list>               delete a list
  add <list> <text>              add an item
  done <list> <item>             mark an item done
  undone <list> <item>           mark an item not done
  toggle <list> <item>           flip an item's done flag
  edit <list> <item> <text>      change an item's text
  rm <list> <item>               delete an item
  help                           this text
  quit                           leave";

// ── Command ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    Register { name: String, password: String },
    Login { name: String, password: String },
    Logout,
    Refresh,
    WhoAmI,
    Passwd { password: String },
    RenameMe { name: String },
    DeleteAccount,
    Lists,
    NewList { name: String },
    Show { list: ListId },
    DropList { list: ListId },
    Add { list: ListId, text: String },
    SetDone { list: ListId, item: ItemId, done: bool },
    Toggle { list: ListId, item: ItemId },
    Edit { list: ListId, item: ItemId, text: String },
    Remove { list: ListId, item: ItemId },
}

impl Command {
    /// Parse one input line.  The error is a message for the user.
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let cmd = match verb {
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            "register" => {
                let (name, password) = two_words(rest, "register <name> <password>")?;
                Command::Register { name, password }
            }
            "login" => {
                let (name, password) = two_words(rest, "login <name> <password>")?;
                Command::Login { name, password }
            }
            "logout" => Command::Logout,
            "refresh" => Command::Refresh,
            "whoami" => Command::WhoAmI,
            "passwd" => Command::Passwd { password: required(rest, "passwd <new-password>")? },
            "rename-me" => Command::RenameMe { name: required(rest, "rename-me <new-name>")? },
            "delete-account" => Command::DeleteAccount,
            "lists" => Command::Lists,
            "new-list" => Command::NewList { name: required(rest, "new-list <name>")? },
            "show" => Command::Show { list: parse_id(rest, "show <list>")? },
            "drop-list" => Command::DropList { list: parse_id(rest, "drop-list <list>")? },
            "add" => {
                let (list, text) = id_and_rest(rest, "add <list> <text>")?;
                Command::Add { list, text: required(text, "add <list> <text>")? }
            }
            "done" | "undone" => {
                let (list, item) = two_ids(rest, "done <list> <item>")?;
                Command::SetDone { list, item, done: verb == "done" }
            }
            "toggle" => {
                let (list, item) = two_ids(rest, "toggle <list> <item>")?;
                Command::Toggle { list, item }
            }
            "edit" => {
                let usage = "edit <list> <item> <text>";
                let (list, rest) = id_and_rest(rest, usage)?;
                let (item, text) = id_and_rest(rest, usage)?;
                Command::Edit { list, item, text: required(text, usage)? }
            }
            "rm" => {
                let (list, item) = two_ids(rest, "rm <list> <item>")?;
                Command::Remove { list, item }
            }
            other => return Err(format!("unknown command '{other}' (try 'help')")),
        };
        Ok(cmd)
    }

    fn needs_session(&self) -> bool {
        !matches!(
            self,
            Command::Help | Command::Quit | Command::Register { .. } | Command::Login { .. }
        )
    }
}

fn required(rest: &str, usage: &str) -> Result<String, String> {
    if rest.is_empty() {
        return Err(format!("usage: {usage}"));
    }
    Ok(rest.to_string())
}

fn two_words(rest: &str, usage: &str) -> Result<(String, String), String> {
    let mut words = rest.split_whitespace();
    match (words.next(), words.next(), words.next()) {
        (Some(a), Some(b), None) => Ok((a.to_string(), b.to_string())),
        _ => Err(format!("usage: {usage}")),
    }
}

fn parse_id<T: std::str::FromStr>(word: &str, usage: &str) -> Result<T, String> {
    word.trim()
        .parse()
        .map_err(|_| format!("'{}' is not a valid id (usage: {usage})", word.trim()))
}

fn id_and_rest<'a, T: std::str::FromStr>(rest: &'a str, usage: &str) -> Result<(T, &'a str), String> {
    let (word, tail) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    if word.is_empty() {
        return Err(format!("usage: {usage}"));
    }
    Ok((parse_id(word, usage)?, tail.trim()))
}

fn two_ids(rest: &str, usage: &str) -> Result<(ListId, ItemId), String> {
    let (list, tail) = id_and_rest(rest, usage)?;
    if tail.contains(char::is_whitespace) {
        return Err(format!("usage: {usage}"));
    }
    let (item, _) = id_and_rest(tail, usage)?;
    Ok((list, item))
}

// ── Console ──────────────────────────────────────────────────────────────────

/// Reply to one command, and whether the loop should stop.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Reply(String),
    Quit,
}

pub struct Console {
    services: Services,
    session: Option<TokenPair>,
}

impl Console {
    pub fn new(services: Services) -> Self {
        Self { services, session: None }
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_some()
    }

    /// Parse and run one line.
    pub async fn handle_line(&mut self, line: &str) -> Outcome {
        match Command::parse(line) {
            Err(msg) => Outcome::Reply(msg),
            Ok(Command::Quit) => Outcome::Quit,
            Ok(cmd) => Outcome::Reply(self.execute(cmd).await),
        }
    }

    /// Run `cmd`, renewing the access token once if it has expired.
    pub async fn execute(&mut self, cmd: Command) -> String {
        if cmd.needs_session() && self.session.is_none() {
            return "not logged in (use 'login' or 'register')".to_string();
        }

        let result = match self.dispatch(cmd.clone()).await {
            Err(ServiceError::TokenExpired) if cmd.needs_session() && !matches!(cmd, Command::Refresh) => {
                match self.renew().await {
                    Ok(()) => {
                        debug!("access token renewed; retrying command");
                        self.dispatch(cmd).await
                    }
                    Err(e) => Err(e),
                }
            }
            other => other,
        };

        match result {
            Ok(reply) => reply,
            Err(e @ (ServiceError::TokenExpired | ServiceError::InvalidToken)) => {
                self.session = None;
                format!("error: {e} (session ended, please log in again)")
            }
            Err(e) => format!("error: {e}"),
        }
    }

    async fn renew(&mut self) -> Result<(), ServiceError> {
        let session = self.session.as_mut().ok_or(ServiceError::InvalidToken)?;
        session.access_token = self
            .services
            .sessions
            .refresh_access_token(&session.refresh_token)
            .await?;
        Ok(())
    }

    fn access_token(&self) -> Result<String, ServiceError> {
        self.session
            .as_ref()
            .map(|s| s.access_token.clone())
            .ok_or(ServiceError::InvalidToken)
    }

    async fn dispatch(&mut self, cmd: Command) -> Result<String, ServiceError> {
        let sessions = &self.services.sessions;
        let todos = &self.services.todos;

        match cmd {
            Command::Help => Ok(HELP.to_string()),
            Command::Quit => Ok(String::new()),
            Command::Register { name, password } => {
                let pair = sessions.register(&name, &password).await?;
                self.session = Some(pair);
                Ok(format!("registered and logged in as {name}"))
            }
            Command::Login { name, password } => {
                let pair = sessions.login(&name, &password).await?;
                let expires = pair.refresh_expires_at;
                self.session = Some(pair);
                Ok(format!("logged in as {name} (session valid until {expires})"))
            }
            Command::Logout => {
                sessions.logout(&self.access_token()?).await?;
                self.session = None;
                Ok("logged out".to_string())
            }
            Command::Refresh => {
                self.renew().await?;
                Ok("access token renewed".to_string())
            }
            Command::WhoAmI => sessions.get_display_name(&self.access_token()?).await,
            Command::Passwd { password } => {
                sessions.update_password(&self.access_token()?, &password).await?;
                Ok("password updated".to_string())
            }
            Command::RenameMe { name } => {
                sessions.update_name(&self.access_token()?, &name).await?;
                Ok(format!("display name is now {}", name.trim()))
            }
            Command::DeleteAccount => {
                sessions.delete_account(&self.access_token()?).await?;
                self.session = None;
                Ok("account deleted".to_string())
            }
            Command::Lists => {
                let token = self.access_token()?;
                let ids = todos.get_lists(&token).await?;
                if ids.is_empty() {
                    return Ok("no lists".to_string());
                }
                let mut out = String::new();
                for id in ids {
                    let list = todos.get_list(&token, id).await?;
                    let _ = writeln!(out, "{id}  {} ({} items)", list.name(), list.items().len());
                }
                Ok(out.trim_end().to_string())
            }
            Command::NewList { name } => {
                let id = todos.create_list(&self.access_token()?, &name).await?;
                Ok(format!("created list {id}"))
            }
            Command::Show { list } => {
                let token = self.access_token()?;
                let found = todos.get_list(&token, list).await?;
                let mut out = format!("{}  {}", found.id(), found.name());
                for item_id in found.items() {
                    let item = todos.get_item(&token, list, *item_id).await?;
                    let mark = if item.done() { 'x' } else { ' ' };
                    let _ = write!(out, "\n  [{mark}] {}  {}", item.id(), item.value());
                }
                Ok(out)
            }
            Command::DropList { list } => {
                todos.delete_list(&self.access_token()?, list).await?;
                Ok(format!("deleted list {list}"))
            }
            Command::Add { list, text } => {
                let id = todos.add_item(&self.access_token()?, list, &text).await?;
                Ok(format!("added item {id}"))
            }
            Command::SetDone { list, item, done } => {
                todos.set_item_status(&self.access_token()?, list, item, done).await?;
                Ok(if done { "marked done" } else { "marked not done" }.to_string())
            }
            Command::Toggle { list, item } => {
                let done = todos.toggle_item(&self.access_token()?, list, item).await?;
                Ok(if done { "marked done" } else { "marked not done" }.to_string())
            }
            Command::Edit { list, item, text } => {
                todos.rename_item(&self.access_token()?, list, item, &text).await?;
                Ok("item updated".to_string())
            }
            Command::Remove { list, item } => {
                todos.delete_item(&self.access_token()?, list, item).await?;
                Ok(format!("deleted item {item}"))
            }
        }
    }
}

// ── run ──────────────────────────────────────────────────────────────────────

/// Drive the console on stdin/stdout until shutdown, EOF or `quit`.
pub async fn run(services: Services, shutdown: CancellationToken) -> Result<(), AppError> {
    info!("console started: type 'help' for commands. Ctrl-C to quit.");
    println!("─────────────────────────────────");
    println!(" todokeep console  (Ctrl-C to quit)");
    println!("─────────────────────────────────");

    let mut console = Console::new(services);
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        print!("> ");
        use std::io::Write as _;
        let _ = std::io::stdout().flush();

        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                println!("\nshutdown signal received: closing console");
                info!("console shutting down");
                break;
            }

            line = lines.next_line() => {
                match line {
                    Err(e) => {
                        warn!("console read error: {e}");
                        return Err(AppError::Io(e));
                    }
                    Ok(None) => {
                        info!("console stdin closed");
                        break;
                    }
                    Ok(Some(input)) => {
                        let input = input.trim();
                        if input.is_empty() { continue; }

                        // Lines may carry passwords; log the verb only.
                        let verb = input.split_whitespace().next().unwrap_or_default();
                        debug!(verb, "console received line");

                        match console.handle_line(input).await {
                            Outcome::Quit => break,
                            Outcome::Reply(reply) => println!("{reply}"),
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
