//! Purpose: `streamx` CLI entry point for publishing to a StreamX ingestion service.
//! Role: Binary crate root; parses args, runs one command, emits JSON on stdout.
//! Invariants: Each command issues at most one ingestion request through `api::Publisher`.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use streamx_ingestion::api::{
    Error, ErrorKind, INGESTION_ENDPOINT_BASE_PATH, Message, MessageBuilder, Publisher,
    StreamxClient, TransportOptions, UreqRequester, decode_message, payload_from_slice,
    split_jsons, to_exit_code,
};
use tracing_subscriber::EnvFilter;

const MALFORMED_UTF8: &str =
    "JSON encoding error: Malformed UTF-8 characters, possibly incorrectly encoded";

#[derive(Parser, Debug)]
#[command(
    name = "streamx",
    version,
    about = "Publish and unpublish content on a StreamX ingestion service",
    long_about = None,
    after_help = r#"EXAMPLES
  $ streamx --server http://localhost:8080 health
  $ streamx publish home --channel pages \
      --schema dev.streamx.blueprints.data.PageIngestionMessage \
      --data-json '{"content":{"bytes":"<h1>Hello</h1>"}}'
  $ streamx unpublish home --channel pages --schema dev.streamx.blueprints.data.PageIngestionMessage
  $ streamx send --channel pages --schema dev.streamx.blueprints.data.PageIngestionMessage -f batch.json

ENVIRONMENT
  STREAMX_SERVER_URL, STREAMX_INGESTION_BASE_PATH, STREAMX_AUTH_TOKEN
  RUST_LOG controls diagnostics on stderr (default: warn)"#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ConnectionArgs {
    #[arg(long, env = "STREAMX_SERVER_URL", help = "StreamX server URL, e.g. http://localhost:8080")]
    server: String,
    #[arg(
        long = "base-path",
        env = "STREAMX_INGESTION_BASE_PATH",
        default_value = INGESTION_ENDPOINT_BASE_PATH,
        help = "Ingestion endpoint base path appended to the server URL"
    )]
    base_path: String,
    #[arg(
        long,
        env = "STREAMX_AUTH_TOKEN",
        hide_env_values = true,
        help = "Bearer token (prefer --token-file outside local/dev use)"
    )]
    token: Option<String>,
    #[arg(long, value_hint = ValueHint::FilePath, help = "Read bearer token from a file")]
    token_file: Option<PathBuf>,
    #[arg(long, value_hint = ValueHint::FilePath, help = "PEM CA bundle trusted for https servers")]
    tls_ca: Option<PathBuf>,
    #[arg(long, value_name = "MS", help = "Overall request timeout in milliseconds")]
    timeout_ms: Option<u64>,
}

#[derive(Args, Debug)]
struct ChannelArgs {
    #[arg(long, help = "Target channel name")]
    channel: String,
    #[arg(long, help = "Channel schema name ending in IngestionMessage")]
    schema: String,
}

#[derive(Args, Debug)]
struct MessageArgs {
    #[arg(long, value_name = "MS", help = "Event time in epoch millis (default: server-assigned)")]
    event_time: Option<i64>,
    #[arg(long = "property", value_name = "NAME=VALUE", help = "Message property (repeatable)")]
    properties: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Publish one payload under KEY")]
    Publish {
        key: String,
        #[command(flatten)]
        channel: ChannelArgs,
        #[arg(long = "data-json", help = "Payload as inline JSON")]
        data_json: Option<String>,
        #[arg(
            long = "data-file",
            value_hint = ValueHint::FilePath,
            conflicts_with = "data_json",
            help = "Read payload JSON from a file"
        )]
        data_file: Option<PathBuf>,
        #[command(flatten)]
        message: MessageArgs,
    },
    #[command(about = "Unpublish the content stored under KEY")]
    Unpublish {
        key: String,
        #[command(flatten)]
        channel: ChannelArgs,
        #[command(flatten)]
        message: MessageArgs,
    },
    #[command(
        about = "Send concatenated ingestion messages in one batch",
        long_about = "Reads back-to-back message documents ({\"key\",\"action\",\"eventTime\",\"properties\",\"payload\"}) \
from a file or stdin, sends them in one request, and prints one status per line."
    )]
    Send {
        #[command(flatten)]
        channel: ChannelArgs,
        #[arg(long, short = 'f', value_hint = ValueHint::FilePath, help = "Input file (default: stdin)")]
        file: Option<PathBuf>,
    },
    #[command(about = "Print the schema document of a channel")]
    Schema {
        #[arg(long, help = "Channel name")]
        channel: String,
    },
    #[command(about = "Check whether the ingestion service reports UP")]
    Health,
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(exit_code) => exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<i32, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::InvalidArgument)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(exit_code);
            }
            _ => {
                return Err(
                    Error::new(ErrorKind::InvalidArgument).with_message(clap_error_summary(&err))
                );
            }
        },
    };

    let client = build_client(&cli.connection)?;
    match cli.command {
        Command::Publish {
            key,
            channel,
            data_json,
            data_file,
            message,
        } => {
            let publisher = client.new_publisher(channel.channel, channel.schema)?;
            let payload = read_payload(data_json, data_file.as_deref())?;
            let builder = apply_message_args(Message::new_publish_message(key, payload), message)?;
            let result = publisher.send(&builder.build())?;
            emit_json(&result)?;
            Ok(0)
        }
        Command::Unpublish {
            key,
            channel,
            message,
        } => {
            let publisher = client.new_publisher(channel.channel, channel.schema)?;
            let builder = apply_message_args(Message::new_unpublish_message(key), message)?;
            let result = publisher.send(&builder.build())?;
            emit_json(&result)?;
            Ok(0)
        }
        Command::Send { channel, file } => {
            let publisher = client.new_publisher(channel.channel, channel.schema)?;
            let input = read_input(file.as_deref())?;
            let messages = decode_batch(&publisher, &input)?;
            let statuses = publisher.send_multi(&messages)?;
            for status in &statuses {
                emit_json(status)?;
            }
            Ok(if statuses.iter().all(|status| status.is_success()) {
                0
            } else {
                1
            })
        }
        Command::Schema { channel } => {
            println!("{}", client.channel_schema(&channel)?);
            Ok(0)
        }
        Command::Health => {
            let available = client.is_ingestion_service_available()?;
            emit_json(&json!({ "available": available }))?;
            Ok(if available { 0 } else { 1 })
        }
    }
}

fn build_client(args: &ConnectionArgs) -> Result<StreamxClient, Error> {
    let token = resolve_token_value(args.token.clone(), args.token_file.clone())?;
    let options = TransportOptions {
        timeout: args.timeout_ms.map(Duration::from_millis),
        tls_ca_file: args.tls_ca.clone(),
    };
    let requester = UreqRequester::from_options(&options)?;
    let mut builder = StreamxClient::builder(args.server.as_str())
        .ingestion_base_path(args.base_path.as_str())
        .http_requester(Arc::new(requester));
    if let Some(token) = token {
        builder = builder.auth_token(token);
    }
    builder.build()
}

fn read_token_file(path: &Path) -> Result<String, Error> {
    let raw = std::fs::read_to_string(path).map_err(|err| {
        Error::new(ErrorKind::InvalidArgument)
            .with_message(format!("failed to read token file: {}", path.display()))
            .with_source(err)
    })?;
    let token = raw.trim().to_string();
    if token.is_empty() {
        return Err(Error::new(ErrorKind::InvalidArgument)
            .with_message(format!("token file is empty: {}", path.display())));
    }
    Ok(token)
}

fn resolve_token_value(
    token: Option<String>,
    token_file: Option<PathBuf>,
) -> Result<Option<String>, Error> {
    if token.is_some() && token_file.is_some() {
        return Err(Error::new(ErrorKind::InvalidArgument)
            .with_message("--token cannot be combined with --token-file"));
    }
    if let Some(path) = token_file {
        return read_token_file(&path).map(Some);
    }
    Ok(token)
}

fn apply_message_args(
    mut builder: MessageBuilder,
    args: MessageArgs,
) -> Result<MessageBuilder, Error> {
    if let Some(event_time) = args.event_time {
        builder = builder.with_event_time(event_time);
    }
    for raw in &args.properties {
        let (name, value) = raw.split_once('=').ok_or_else(|| {
            Error::new(ErrorKind::InvalidArgument)
                .with_message(format!("property must be NAME=VALUE, got '{raw}'"))
        })?;
        builder = builder.with_property(name, value);
    }
    Ok(builder)
}

fn read_payload(data_json: Option<String>, data_file: Option<&Path>) -> Result<Value, Error> {
    if let Some(data) = data_json {
        return payload_from_slice(data.as_bytes());
    }
    if data_file.is_none() && io::stdin().is_terminal() {
        return Err(Error::new(ErrorKind::InvalidArgument)
            .with_message("publish requires --data-json, --data-file, or a payload on stdin"));
    }
    payload_from_slice(&read_bytes(data_file)?)
}

fn read_input(path: Option<&Path>) -> Result<String, Error> {
    let bytes = read_bytes(path)?;
    String::from_utf8(bytes).map_err(|err| {
        Error::new(ErrorKind::Encoding)
            .with_message(MALFORMED_UTF8)
            .with_source(err)
    })
}

fn read_bytes(path: Option<&Path>) -> Result<Vec<u8>, Error> {
    match path {
        Some(path) => std::fs::read(path).map_err(|err| {
            Error::new(ErrorKind::InvalidArgument)
                .with_message(format!("failed to read input file: {}", path.display()))
                .with_source(err)
        }),
        None => {
            let mut bytes = Vec::new();
            io::stdin().read_to_end(&mut bytes).map_err(|err| {
                Error::new(ErrorKind::InvalidArgument)
                    .with_message("failed to read stdin")
                    .with_source(err)
            })?;
            Ok(bytes)
        }
    }
}

fn decode_batch(publisher: &Publisher, input: &str) -> Result<Vec<Message>, Error> {
    split_jsons(input)
        .into_iter()
        .map(|fragment| decode_message(fragment, publisher.payload_type_name()))
        .collect()
}

fn emit_json(value: &impl serde::Serialize) -> Result<(), Error> {
    let text = serde_json::to_string(value).map_err(|err| {
        Error::new(ErrorKind::Encoding)
            .with_message(format!("JSON encoding error: {err}"))
            .with_source(err)
    })?;
    println!("{text}");
    Ok(())
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("error: {}", error_message(err));
        for cause in error_causes(err) {
            eprintln!("  caused by: {cause}");
        }
        return;
    }

    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Encoding\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    match err.message() {
        Some(message) => message.to_string(),
        None => format!("{:?}", err.kind()),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }
    if let Some(uri) = err.uri() {
        inner.insert("uri".to_string(), json!(uri.as_str()));
    }
    if let Some(code) = err.error_code() {
        inner.insert("errorCode".to_string(), json!(code));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
