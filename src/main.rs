//! traced-messaging command line.
//!
//! # Architecture Overview
//!
//! ```text
//!   inbound record ──▶ ReceiverMessage ──▶ TracedMessage ──▶ handler
//!                      (payload+headers)   (TraceParent,       │
//!                                           TraceState)        ▼
//!   outbound record ◀── Producer ◀── ProducerSender ◀── SenderMessage
//!                       session      send | begin/add/commit
//! ```
//!
//! # Commands
//! - `inspect`: parse a `traceparent` (and optional `tracestate`) strictly
//! - `generate`: print a fresh trace context
//! - `child`: derive the context for the next hop
//! - `demo`: send a transaction over the in-memory transport and receive it

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;

use traced_messaging::config::{load_config, MessagingConfig, ReceiverConfig, SenderConfig};
use traced_messaging::envelope::TracedMessage;
use traced_messaging::observability::logging::init_logging;
use traced_messaging::trace_context::{TraceParent, TraceState};
use traced_messaging::transport::memory::MemoryBroker;
use traced_messaging::transport::{
    receive_traced, send_all, CancellationSource, ProducerSender, Sender, TransportError,
};
use traced_messaging::ReceiverMessage;

#[derive(Parser)]
#[command(name = "traced-messaging")]
#[command(about = "W3C trace context and transactional messaging tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and print a trace context
    Inspect {
        traceparent: String,
        #[arg(long)]
        tracestate: Option<String>,
    },
    /// Generate a new trace context
    Generate {
        #[arg(long)]
        sampled: bool,
    },
    /// Derive the child context of a traceparent
    Child { traceparent: String },
    /// Run a transactional send and receive over the in-memory transport
    Demo {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { traceparent, tracestate } => {
            let trace_parent = TraceParent::try_parse(&traceparent)?;
            let mut trace_state = TraceState::new();
            if let Some(raw) = tracestate {
                trace_state.parse(&raw);
                trace_state.validate()?;
            }
            print_context(&trace_parent, &trace_state)?;
        }
        Commands::Generate { sampled } => {
            let mut trace_parent = TraceParent::new();
            trace_parent.update_sampled(sampled);
            print_context(&trace_parent, &TraceState::new())?;
        }
        Commands::Child { traceparent } => {
            let mut trace_parent = TraceParent::try_parse(&traceparent)?;
            trace_parent.update_parent();
            print_context(&trace_parent, &TraceState::new())?;
        }
        Commands::Demo { config } => {
            let config = match config {
                Some(path) => load_config(&path)?,
                None => demo_config(),
            };
            run_demo(config).await?;
        }
    }

    Ok(())
}

fn print_context(trace_parent: &TraceParent, trace_state: &TraceState) -> serde_json::Result<()> {
    let entries: Vec<_> = trace_state
        .iter()
        .map(|(key, value)| json!({ "key": key, "value": value }))
        .collect();
    let output = json!({
        "traceparent": trace_parent.value(),
        "version": trace_parent.version(),
        "trace_id": trace_parent.trace_id(),
        "parent_id": trace_parent.parent_id(),
        "sampled": trace_parent.sampled(),
        "tracestate": trace_state.value(),
        "entries": entries,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn demo_config() -> MessagingConfig {
    MessagingConfig {
        senders: vec![SenderConfig::new("orders", "orders")],
        receivers: vec![ReceiverConfig {
            name: "orders-inbox".to_string(),
            topic: "orders".to_string(),
            transactional: true,
        }],
        ..MessagingConfig::default()
    }
}

async fn run_demo(config: MessagingConfig) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(&config.observability)?;

    let sender_config = config
        .senders
        .first()
        .ok_or_else(|| TransportError::Config("demo needs at least one sender".into()))?;
    let receiver_config = config
        .receivers
        .iter()
        .find(|r| r.topic == sender_config.topic)
        .cloned()
        .unwrap_or_else(|| ReceiverConfig {
            name: format!("{}-inbox", sender_config.name),
            topic: sender_config.topic.clone(),
            transactional: true,
        });

    let broker = MemoryBroker::new();
    let (sender, mut background) = ProducerSender::from_config(&config, &sender_config.name, broker.clone())?;
    tokio::spawn(async move {
        while let Some(event) = background.recv().await {
            tracing::warn!(%event, "Background error");
        }
    });

    let mut root = TracedMessage::new("order created");
    root.trace_parent_mut().update_sampled(true);
    root.trace_state_mut().set("demo", "1");
    tracing::info!(traceparent = %root.trace_parent(), "Started trace");

    let messages = ["order created", "payment captured", "order shipped"]
        .into_iter()
        .map(|body| {
            let mut hop = root.child();
            hop.set_payload(body);
            hop.to_sender_message()
        })
        .collect::<Result<Vec<_>, _>>()?;

    let cancel = CancellationSource::new();
    let sent = send_all(&sender, messages, &cancel.token()).await?;
    tracing::info!(sent, "Batch committed");

    let receiver = broker.receiver_from_config(&receiver_config);
    for _ in 0..sent {
        let (message, traced) =
            tokio::time::timeout(Duration::from_secs(5), receive_traced(&receiver, &cancel.token())).await??;
        println!(
            "{}",
            json!({
                "payload": traced.string_value(None)?,
                "traceparent": traced.trace_parent().value(),
                "tracestate": traced.trace_state().value(),
            })
        );
        message.acknowledge()?;
    }

    sender.close()?;
    Ok(())
}
