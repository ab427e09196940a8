//! mockmail-cli - command-line front-end for a MockMail server
//!
//! Talks to the MockMail HTTP API. Compose a message and get the assistant's
//! suggested reply, browse the session inbox, pull the log lines of a
//! request, or replay a CSV of test questions through the assistant.
//!
//! # Subcommands
//! - `session`                                   - open a session, print its id
//! - `send --to --subject --body [--thread-id]`  - compose a message
//! - `inbox [--json]`                            - list messages, newest first
//! - `analyze <id>`                              - fetch a suggestion for a stored message
//! - `logs <request_id> [-n <limit>]`            - correlated log events
//! - `status`                                    - show server health
//! - `eval <csv> [--column] [--output]`          - batch-evaluate test questions

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8787";
const DEFAULT_COLUMN: &str = "BASE QUESTION";
const DEFAULT_OUTPUT: &str = "results.json";

/// Assistant calls can take minutes; match the server-side inference timeout.
const SUGGEST_TIMEOUT: Duration = Duration::from_secs(600);

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "mockmail-cli",
    version,
    about = "MockMail - compose mail and review AI reply suggestions"
)]
struct Cli {
    /// MockMail HTTP server URL (overrides MOCKMAIL_HTTP_URL env var)
    #[arg(long, env = "MOCKMAIL_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Session id returned by `mockmail-cli session`
    #[arg(long, env = "MOCKMAIL_SESSION")]
    session: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Open a new session and print its id
    Session,

    /// Compose a message and (by default) ask the assistant for a reply
    Send {
        #[arg(long)]
        to: String,

        #[arg(long)]
        subject: String,

        #[arg(long)]
        body: String,

        #[arg(long)]
        thread_id: Option<String>,

        /// Store the message without calling the assistant
        #[arg(long)]
        no_analyze: bool,

        #[arg(long)]
        json: bool,
    },

    /// List the session's messages, newest first
    Inbox {
        #[arg(long)]
        json: bool,
    },

    /// Ask the assistant about a stored message (no-op if already answered)
    Analyze {
        id: i64,
    },

    /// Show log events correlated with a request id
    Logs {
        request_id: String,

        /// Maximum number of events
        #[arg(short = 'n', long)]
        limit: Option<u32>,

        /// Trailing window in minutes
        #[arg(long)]
        lookback: Option<i64>,
    },

    /// Show MockMail server status
    Status,

    /// Replay a CSV of test questions through the assistant
    Eval {
        /// CSV file with a header row
        input: PathBuf,

        /// Column holding the questions
        #[arg(long, default_value = DEFAULT_COLUMN)]
        column: String,

        /// Where to write the JSON results
        #[arg(short, long, default_value = DEFAULT_OUTPUT)]
        output: PathBuf,
    },
}

// ============================================================================
// API Response Types
// ============================================================================

/// A stored message as returned by the server
#[derive(Debug, Deserialize, Serialize)]
pub struct MessageView {
    pub id: i64,
    pub thread_id: Option<String>,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub created_at: String,
    pub read: bool,
    pub ai_hint: Option<String>,
    pub ai_request_id: Option<String>,
    #[serde(default)]
    pub trace_fields: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct InboxResponse {
    pub messages: Vec<MessageView>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct SuggestResponse {
    pub result: String,
    pub request_id: Option<String>,
}

/// One line of the batch evaluation output
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct EvalRecord {
    pub question: String,
    pub response: String,
}

// ============================================================================
// Rendering
// ============================================================================

/// Human-readable block for one message, as the inbox shows it.
pub fn render_message(m: &MessageView) -> String {
    let mut out = format!(
        "[{}] To: {} | {} ({}){}\n",
        m.id,
        m.to,
        m.subject,
        m.created_at,
        if m.read { "" } else { " *" }
    );
    if let Some(thread) = &m.thread_id {
        out.push_str(&format!("Thread: {}\n", thread));
    }
    out.push_str(&format!("\n{}\n\n", m.body));

    match &m.ai_hint {
        Some(hint) => out.push_str(&format!("AI Suggestion:\n{}\n", hint)),
        None => out.push_str("AI Suggestion: (not analyzed yet)\n"),
    }
    for (name, value) in &m.trace_fields {
        let text = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
        out.push_str(&format!("  {}: {}\n", name, text));
    }
    if let Some(request_id) = &m.ai_request_id {
        out.push_str(&format!("Request: {}\n", request_id));
    }
    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout: Duration) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder().timeout(timeout).build()?)
}

/// Send a request and decode the JSON body, surfacing the server's `error` field.
fn send_json(req: reqwest::blocking::RequestBuilder) -> anyhow::Result<serde_json::Value> {
    let resp = req.send().context("connection failed")?;
    let status = resp.status();
    let body: serde_json::Value = resp.json().unwrap_or_default();
    if !status.is_success() {
        let msg = body["error"].as_str().unwrap_or("no error message");
        anyhow::bail!("server returned {}: {}", status, msg);
    }
    Ok(body)
}

fn require_session(session: Option<&str>) -> anyhow::Result<&str> {
    session.ok_or_else(|| {
        anyhow::anyhow!("no session - run `mockmail-cli session` and export MOCKMAIL_SESSION")
    })
}

fn do_session(server: &str) -> anyhow::Result<()> {
    let body = send_json(client(Duration::from_secs(10))?.post(format!("{}/sessions", server)))?;
    let id = body["session_id"].as_str().unwrap_or_default();
    println!("{}", id);
    eprintln!("export MOCKMAIL_SESSION={}", id);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn do_send(
    server: &str,
    session: &str,
    to: &str,
    subject: &str,
    body: &str,
    thread_id: Option<&str>,
    analyze: bool,
    json_output: bool,
) -> anyhow::Result<()> {
    let payload = serde_json::json!({
        "to": to,
        "subject": subject,
        "body": body,
        "thread_id": thread_id,
        "analyze": analyze,
    });
    let url = format!("{}/sessions/{}/messages", server, session);
    let value = send_json(client(SUGGEST_TIMEOUT)?.post(&url).json(&payload))?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        let message: MessageView = serde_json::from_value(value)?;
        println!("Message sent to {}!\n", message.to);
        print!("{}", render_message(&message));
    }
    Ok(())
}

fn do_inbox(server: &str, session: &str, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/sessions/{}/messages", server, session);
    let value = send_json(client(Duration::from_secs(30))?.get(&url))?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&value["messages"])?);
        return Ok(());
    }

    let inbox: InboxResponse = serde_json::from_value(value)?;
    if inbox.count == 0 {
        println!("Your inbox is empty.");
        return Ok(());
    }
    for m in &inbox.messages {
        println!("{}", render_message(m));
        println!("{}", "-".repeat(60));
    }
    Ok(())
}

fn do_analyze(server: &str, session: &str, id: i64) -> anyhow::Result<()> {
    let url = format!("{}/sessions/{}/messages/{}/analyze", server, session, id);
    let value = send_json(client(SUGGEST_TIMEOUT)?.post(&url))?;
    let message: MessageView = serde_json::from_value(value)?;
    print!("{}", render_message(&message));
    Ok(())
}

fn do_logs(
    server: &str,
    request_id: &str,
    limit: Option<u32>,
    lookback: Option<i64>,
) -> anyhow::Result<()> {
    let mut query: Vec<(&str, String)> = Vec::new();
    if let Some(n) = limit {
        query.push(("limit", n.to_string()));
    }
    if let Some(m) = lookback {
        query.push(("lookback_minutes", m.to_string()));
    }

    let url = format!("{}/logs/{}", server, request_id);
    let value = send_json(client(Duration::from_secs(60))?.get(&url).query(&query))?;

    let events = value["events"].as_array().cloned().unwrap_or_default();
    if events.is_empty() {
        eprintln!("No log events found for request {}", request_id);
        return Ok(());
    }
    for event in &events {
        let ts = event["timestamp"].as_i64().map(|t| t.to_string()).unwrap_or_default();
        let msg = event["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| event.to_string());
        println!("{:>14}  {}", ts, msg.trim_end());
    }
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server);
    let body = send_json(client(Duration::from_secs(10))?.get(&url))
        .with_context(|| format!("cannot reach {}", url))?;

    println!("MockMail server: {}", body["status"].as_str().unwrap_or("unknown"));
    println!("Version:         {}", body["version"].as_str().unwrap_or("?"));
    println!("Assistant:       {}", body["inference_endpoint"].as_str().unwrap_or("?"));
    println!("Log group:       {}", body["log_group"].as_str().unwrap_or("?"));
    Ok(())
}

// ============================================================================
// Batch evaluation
// ============================================================================

/// Read the non-empty cells of `column` from a headed CSV.
pub fn read_questions(path: &Path, column: &str) -> anyhow::Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let index = reader
        .headers()?
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim() == column)
        .ok_or_else(|| anyhow::anyhow!("column '{}' not found in {}", column, path.display()))?;

    let mut questions = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(cell) = record.get(index) {
            let cell = cell.trim();
            if !cell.is_empty() {
                questions.push(cell.to_string());
            }
        }
    }
    Ok(questions)
}

fn suggest(
    client: &reqwest::blocking::Client,
    server: &str,
    question: &str,
) -> anyhow::Result<SuggestResponse> {
    let value = send_json(
        client
            .post(format!("{}/suggest", server))
            .json(&serde_json::json!({ "query": question })),
    )?;
    Ok(serde_json::from_value(value)?)
}

fn do_eval(server: &str, input: &Path, column: &str, output: &Path) -> anyhow::Result<()> {
    let questions = read_questions(input, column)?;
    let client = client(SUGGEST_TIMEOUT)?;

    let bar = ProgressBar::new(questions.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} [{elapsed_precise}] {msg}")?,
    );

    let mut results = Vec::with_capacity(questions.len());
    for question in questions {
        let response = match suggest(&client, server, &question) {
            Ok(r) => r.result,
            Err(e) => {
                bar.println(format!("failed: {}", e));
                format!("error: {}", e)
            }
        };
        results.push(EvalRecord { question, response });
        bar.inc(1);
    }
    bar.finish_with_message("done");

    std::fs::write(output, serde_json::to_string_pretty(&results)?)
        .with_context(|| format!("failed to write {}", output.display()))?;
    eprintln!("Wrote {} results to {}", results.len(), output.display());
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn run(cli: Cli) -> anyhow::Result<()> {
    let server = cli.server.trim_end_matches('/').to_string();
    let session = cli.session.as_deref();

    match cli.command {
        Commands::Session => do_session(&server),
        Commands::Send {
            to,
            subject,
            body,
            thread_id,
            no_analyze,
            json,
        } => do_send(
            &server,
            require_session(session)?,
            &to,
            &subject,
            &body,
            thread_id.as_deref(),
            !no_analyze,
            json,
        ),
        Commands::Inbox { json } => do_inbox(&server, require_session(session)?, json),
        Commands::Analyze { id } => do_analyze(&server, require_session(session)?, id),
        Commands::Logs {
            request_id,
            limit,
            lookback,
        } => do_logs(&server, &request_id, limit, lookback),
        Commands::Status => do_status(&server),
        Commands::Eval {
            input,
            column,
            output,
        } => do_eval(&server, &input, &column, &output),
    }
}

fn main() {
    if let Err(e) = run(Cli::parse()) {
        eprintln!("mockmail-cli: {:#}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
