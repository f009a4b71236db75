//! Replays JSON log records into Postgres through the log writer.
//!
//! The stream schema is read from a JSON file holding the field descriptors, for example
//! `[{"name": "ts", "type": "time"}, {"name": "tags", "type": "set", "subtype": "string"}]`.
//! Records are JSON arrays, one per line, with one element per field.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use pglog::types::Field;
use pglog::writer::postgres::PostgresWriter;
use pglog::writer::{WriterBackend, WriterInfo};
use telemetry::{LogFormat, init_tracing};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

mod decode;

use decode::decode_record;

#[derive(Parser, Debug)]
#[command(name = "pglog-replay", version, about, long_about = None)]
struct Args {
    /// Postgres connection string, for example `host=localhost dbname=zeek`.
    #[arg(long)]
    conninfo: String,

    /// Stream path, used as the table name.
    #[arg(long)]
    path: String,

    /// JSON file holding the field descriptors of the stream.
    #[arg(long)]
    schema: PathBuf,

    /// Additional writer option, may be repeated.
    #[arg(long = "option", value_name = "KEY=VALUE", value_parser = parse_option)]
    options: Vec<(String, String)>,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,

    /// File holding the records. Records are read from stdin when omitted.
    input: Option<PathBuf>,
}

fn parse_option(option: &str) -> Result<(String, String), String> {
    option
        .split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("`{option}` is not of the form KEY=VALUE"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let format = if args.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_tracing(format)?;

    main_impl(args).await
}

async fn main_impl(args: Args) -> anyhow::Result<()> {
    let schema = tokio::fs::read_to_string(&args.schema)
        .await
        .with_context(|| format!("could not read schema file {}", args.schema.display()))?;
    let fields: Vec<Field> = serde_json::from_str(&schema)
        .with_context(|| format!("invalid schema file {}", args.schema.display()))?;

    let mut config = args.options.into_iter().collect::<BTreeMap<_, _>>();
    if config.contains_key("conninfo") {
        warn!("`conninfo` option is ignored, use --conninfo");
    }
    config.insert("conninfo".to_string(), args.conninfo);

    let info = WriterInfo::new(args.path, config);
    let mut writer = PostgresWriter::new();
    writer.init(&info, &fields).await?;

    let records = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("could not open {}", path.display()))?;
            replay(&mut writer, &fields, BufReader::new(file)).await?
        }
        None => replay(&mut writer, &fields, BufReader::new(tokio::io::stdin())).await?,
    };

    writer.finish(0.0).await?;
    info!(records, path = %info.path, "replay finished");

    Ok(())
}

/// Writes every record read from `reader`, returning the number of records.
async fn replay<W, R>(writer: &mut W, fields: &[Field], reader: R) -> anyhow::Result<u64>
where
    W: WriterBackend,
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_number = 0u64;
    let mut records = 0u64;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }

        let values = decode_record(fields, &line)
            .with_context(|| format!("could not decode record on line {line_number}"))?;
        writer
            .write(fields, &values)
            .await
            .with_context(|| format!("could not write record on line {line_number}"))?;
        records += 1;
    }

    Ok(records)
}
