use facet::Facet;
use figue as args;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use vellum_types::{Endianness, PacketSummary, PacketTag};
use vellum_wire::{FileLike, TraceFileHeader, TraceReader, WireConfig};

type AnyResult<T> = Result<T, String>;

#[derive(Facet, Debug)]
struct Cli {
    #[facet(flatten)]
    builtins: args::FigueBuiltins,
    #[facet(args::subcommand)]
    command: Command,
}

#[derive(Facet, Debug)]
#[repr(u8)]
enum Command {
    /// Print the trace header and one line per packet.
    Dump {
        #[facet(args::named)]
        trace: String,
        #[facet(args::named, default)]
        json: bool,
    },
    /// Print packet counts and byte totals per tag.
    Stats {
        #[facet(args::named)]
        trace: String,
    },
}

/// JSON projection of the trace file header.
#[derive(Facet, Debug)]
struct TraceInfo {
    uuid: String,
    tracer_id: u8,
    version: u16,
    pointer_size: u8,
    endianness: Option<Endianness>,
    arch: String,
    os: String,
}

impl TraceInfo {
    fn from_header(header: &TraceFileHeader) -> Self {
        Self {
            uuid: header.uuid_hex(),
            tracer_id: header.tracer_id,
            version: header.version,
            pointer_size: header.pointer_size,
            endianness: header.endianness(),
            arch: header.arch_name(),
            os: header.os_name(),
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> AnyResult<()> {
    let cli = parse_cli()?;
    let config = WireConfig::from_env();
    tracing::debug!(?config, "wire configuration");

    match cli.command {
        Command::Dump { trace, json } => dump(&trace, json, &config),
        Command::Stats { trace } => stats(&trace, &config),
    }
}

fn parse_cli() -> AnyResult<Cli> {
    let figue_config = args::builder::<Cli>()
        .map_err(|e| format!("failed to build CLI schema: {e}"))?
        .cli(|cli| cli.strict())
        .help(|h| {
            h.program_name("vellum")
                .description("Inspect captured graphics API traces")
                .version(option_env!("CARGO_PKG_VERSION").unwrap_or("dev"))
        })
        .build();

    args::Driver::new(figue_config)
        .run()
        .into_result()
        .map(|v| v.value)
        .map_err(|e| e.to_string())
}

fn open_trace(
    path: &str,
    config: &WireConfig,
) -> AnyResult<TraceReader<FileLike<BufReader<File>>>> {
    let file = File::open(path).map_err(|e| format!("failed to open {path}: {e}"))?;
    let source = FileLike::new(BufReader::new(file), 0);
    TraceReader::open(source, config.max_packet_bytes)
        .map_err(|e| format!("failed to read trace header from {path}: {e}"))
}

fn tag_label(tag: PacketTag) -> String {
    match tag.marker_name() {
        Some(name) => name.to_string(),
        None => format!("api#{tag}"),
    }
}

fn format_summary(summary: &PacketSummary) -> String {
    format!(
        "{:>8}  {:<20} tracer={} thread={:#x} size={} call={}ns",
        summary.index,
        tag_label(PacketTag::new(summary.tag)),
        summary.tracer_id,
        summary.thread_id,
        summary.size,
        summary.call_duration_ns,
    )
}

fn dump(path: &str, json: bool, config: &WireConfig) -> AnyResult<()> {
    let mut reader = open_trace(path, config)?;
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let write_err = |e: std::io::Error| format!("failed to write output: {e}");

    let info = TraceInfo::from_header(reader.header());
    if json {
        let line = facet_json::to_string(&info).map_err(|e| format!("encode header: {e}"))?;
        writeln!(out, "{line}").map_err(write_err)?;
    } else {
        writeln!(
            out,
            "trace {} v{} tracer={} {}/{} ptr={}",
            info.uuid, info.version, info.tracer_id, info.arch, info.os, info.pointer_size
        )
        .map_err(write_err)?;
    }

    while let Some(packet) = reader
        .next_packet()
        .map_err(|e| format!("failed to read packet from {path}: {e}"))?
    {
        let summary = packet.header().summary();
        if json {
            let line =
                facet_json::to_string(&summary).map_err(|e| format!("encode packet: {e}"))?;
            writeln!(out, "{line}").map_err(write_err)?;
        } else {
            writeln!(out, "{}", format_summary(&summary)).map_err(write_err)?;
        }
    }
    out.flush().map_err(write_err)
}

#[derive(Debug, Default)]
struct TagStats {
    packets: u64,
    bytes: u64,
}

fn stats(path: &str, config: &WireConfig) -> AnyResult<()> {
    let reader = open_trace(path, config)?;
    let mut per_tag: BTreeMap<u16, TagStats> = BTreeMap::new();
    let mut total = TagStats::default();

    for packet in reader {
        let packet = packet.map_err(|e| format!("failed to read packet from {path}: {e}"))?;
        let entry = per_tag.entry(packet.tag().get()).or_default();
        entry.packets += 1;
        entry.bytes += packet.size();
        total.packets += 1;
        total.bytes += packet.size();
    }

    println!("packets: {}", total.packets);
    println!("bytes:   {}", total.bytes);
    for (tag, entry) in &per_tag {
        println!(
            "  {:<20} {:>8} packets {:>12} bytes",
            tag_label(PacketTag::new(*tag)),
            entry.packets,
            entry.bytes
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_info_reports_the_header_byte_order() {
        let mut header = TraceFileHeader::for_this_process(vellum_types::TracerId::new(2));
        let foreign = match Endianness::native() {
            Endianness::Little => Endianness::Big,
            Endianness::Big => Endianness::Little,
        };
        header.endianness = foreign.to_raw() as u8;
        assert_eq!(TraceInfo::from_header(&header).endianness, Some(foreign));

        header.endianness = 9;
        assert_eq!(TraceInfo::from_header(&header).endianness, None);
    }

    #[test]
    fn markers_and_api_tags_are_labelled() {
        assert_eq!(tag_label(PacketTag::MARKER_TERMINATE_PROCESS), "terminate_process");
        assert_eq!(tag_label(PacketTag::new(300)), "api#300");
    }

    #[test]
    fn summary_line_has_every_field() {
        let summary = PacketSummary {
            index: 12,
            tag: 300,
            marker: None,
            tracer_id: 2,
            thread_id: 0xff,
            size: 96,
            call_duration_ns: 40,
            capture_duration_ns: 55,
        };
        let line = format_summary(&summary);
        assert!(line.contains("12"));
        assert!(line.contains("api#300"));
        assert!(line.contains("tracer=2"));
        assert!(line.contains("thread=0xff"));
        assert!(line.contains("size=96"));
        assert!(line.contains("call=40ns"));
    }
}
