use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serialbridge::ExchangeRecord;
use serialbridge_transport::PortSummary;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ExchangeOutput<'a> {
    event: &'static str,
    iteration: u64,
    timestamp: &'a str,
    sent: &'a str,
    reply: &'a str,
    fallback: bool,
}

#[derive(Serialize)]
struct PortOutput<'a> {
    name: &'a str,
    kind: &'a str,
    description: Option<&'a str>,
}

pub fn print_exchange(record: &ExchangeRecord, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ExchangeOutput {
                event: "exchange",
                iteration: record.iteration,
                timestamp: &record.timestamp,
                sent: &record.payload,
                reply: &record.reply,
                fallback: record.fallback,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "TIME", "SENT", "REPLY"])
                .add_row(vec![
                    record.iteration.to_string(),
                    record.timestamp.clone(),
                    sent_label(record),
                    record.reply.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{}", record.timestamp);
            println!("Sent from PC -- {}", sent_label(record));
            println!("Reply Received  {}", record.reply);
            println!("===========");
        }
        OutputFormat::Raw => {
            print_raw(format!("{}\n", record.reply).as_bytes());
        }
    }
}

pub fn print_ports(ports: &[PortSummary], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<PortOutput<'_>> = ports
                .iter()
                .map(|port| PortOutput {
                    name: &port.name,
                    kind: &port.kind,
                    description: port.description.as_deref(),
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "TYPE", "DESCRIPTION"]);
            for port in ports {
                table.add_row(vec![
                    port.name.clone(),
                    port.kind.clone(),
                    port.description.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            if ports.is_empty() {
                println!("no serial ports found");
            }
            for port in ports {
                match &port.description {
                    Some(description) => {
                        println!("{} ({}, {})", port.name, port.kind, description)
                    }
                    None => println!("{} ({})", port.name, port.kind),
                }
            }
        }
        OutputFormat::Raw => {
            for port in ports {
                print_raw(format!("{}\n", port.name).as_bytes());
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn sent_label(record: &ExchangeRecord) -> String {
    if record.fallback {
        format!("{} (fallback)", record.payload)
    } else {
        record.payload.clone()
    }
}
