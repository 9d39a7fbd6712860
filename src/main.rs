use clap::{Args, Parser, Subcommand};
use masterfile::archive::{Archive, ReadOptions};
use masterfile::group::GroupId;
use masterfile::record::{RecordData, SettingValue};
use masterfile::scan::scan_file;
use masterfile::{CellHandle, FormatRevision, Record, Tag, EXTERIOR_LAYER};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "esm", about = "Inspect ESM/ESP master files")]
struct Cli {
    #[command(flatten)]
    select: Select,
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Select {
    /// Format revision: legacy, standard, extended
    #[arg(long, global = true)]
    revision: Option<FormatRevision>,
    /// Game identifier, e.g. Morrowind, Oblivion, SkyrimSE
    #[arg(long, global = true)]
    game: Option<String>,
    /// JSON file with read options
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the file header and top-level layout
    Info {
        input: PathBuf,
    },
    /// List groups, optionally loading them to a depth
    Groups {
        input: PathBuf,
        /// Load and print nested groups down to this depth
        #[arg(short, long, default_value = "0")]
        depth: usize,
    },
    /// List every record of one type
    Records {
        input: PathBuf,
        tag:   Tag,
    },
    /// Look up an exterior cell by grid coordinate
    Cell {
        input: PathBuf,
        #[arg(allow_negative_numbers = true)]
        x:     i16,
        #[arg(allow_negative_numbers = true)]
        y:     i16,
        #[arg(short, long, default_value_t = EXTERIOR_LAYER, allow_negative_numbers = true)]
        layer: i8,
        /// Worldspace form id (hex); defaults to the first world in the file
        #[arg(short, long)]
        world: Option<String>,
    },
    /// Look up an interior cell by editor id
    Interior {
        input: PathBuf,
        name:  String,
    },
    /// Walk the chunk structure without decoding records
    Scan {
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();
    let json = cli.json;

    match cli.command {

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let ar = open_archive(&input, &cli.select)?;
            if json {
                println!("{}", serde_json::to_string_pretty(ar.header())?);
                return Ok(());
            }
            println!("── Master file ──────────────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  Revision       {}", ar.revision());
            println!("  Root           {}", ar.header().tag());
            if let RecordData::FileHeader(h) = &ar.header().data {
                println!("  Version        {}", h.version);
                println!("  Records        {}", h.record_count);
                if let Some(author) = &h.author {
                    println!("  Author         {author}");
                }
                println!("  Masters ({}):", h.masters.len());
                for m in &h.masters {
                    println!("    {}", m.name);
                }
            }
            let groups = ar.top_groups();
            let view = ar.view();
            println!("  Top-level groups ({}):", groups.len());
            for (tag, id) in groups {
                let bytes = view.node(id).map(|n| n.byte_len()).unwrap_or(0);
                println!("    {tag}  {bytes:>12} B");
            }
        }

        // ── Groups ───────────────────────────────────────────────────────────
        Commands::Groups { input, depth } => {
            let ar = open_archive(&input, &cli.select)?;
            for (_, id) in ar.top_groups() {
                print_group(&ar, id, 0, depth)?;
            }
        }

        // ── Records ──────────────────────────────────────────────────────────
        Commands::Records { input, tag } => {
            let ar = open_archive(&input, &cli.select)?;
            let records = ar.records_of(tag)?;
            if json {
                let list: Vec<&Record> = records.iter().map(|(_, r)| r).collect();
                println!("{}", serde_json::to_string_pretty(&list)?);
            } else {
                for (id, record) in &records {
                    println!("{:<24} {}", id.to_string(), describe(record));
                }
                println!("{} {tag} record(s)", records.len());
            }
            report_diagnostics(&ar);
        }

        // ── Cell ─────────────────────────────────────────────────────────────
        Commands::Cell { input, x, y, layer, world } => {
            let ar = open_archive(&input, &cli.select)?;
            let found = match world {
                Some(hex_id) => {
                    let form_id = u32::from_str_radix(hex_id.trim_start_matches("0x"), 16)?;
                    match ar.world_group(form_id)? {
                        Some(group) => ar.ensure_cell_in(group, x, y, layer)?,
                        None => {
                            eprintln!("no world {form_id:08X}");
                            None
                        }
                    }
                }
                None => ar.ensure_cell(x, y, layer)?,
            };
            print_cell(&ar, found, json)?;
        }

        // ── Interior ─────────────────────────────────────────────────────────
        Commands::Interior { input, name } => {
            let ar = open_archive(&input, &cli.select)?;
            let found = ar.interior_cell(&name)?;
            print_cell(&ar, found, json)?;
        }

        // ── Scan ─────────────────────────────────────────────────────────────
        Commands::Scan { input } => {
            let revision = read_options(&cli.select)?.revision()?;
            let report = scan_file(&input, revision)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }
            println!("{}", report.summary());
            for (tag, n) in &report.records_by_tag {
                println!("  {tag}  {n:>8}");
            }
            for p in &report.problems {
                println!("  problem at {:#x} ({}): {:?}", p.offset, p.tag, p.problem);
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn read_options(select: &Select) -> Result<ReadOptions, Box<dyn std::error::Error>> {
    let mut opts = match &select.config {
        Some(path) => ReadOptions::from_json_file(path)?,
        None => ReadOptions::default(),
    };
    if let Some(game) = &select.game {
        opts.game = Some(game.clone());
    }
    if let Some(revision) = select.revision {
        opts.revision = revision;
        opts.game = None;
    }
    Ok(opts)
}

fn open_archive(path: &PathBuf, select: &Select) -> Result<Archive, Box<dyn std::error::Error>> {
    Ok(Archive::open(path, read_options(select)?)?)
}

fn describe(record: &Record) -> String {
    let name = record.editor_id().unwrap_or("-");
    match &record.data {
        RecordData::GameSetting(g) => match &g.value {
            Some(SettingValue::Raw(bytes)) => format!("{name} = 0x{}", hex::encode(bytes)),
            Some(v) => format!("{name} = {v:?}"),
            None => name.to_owned(),
        },
        RecordData::Custom(p) => format!("{name} <{}>", p.type_name),
        _ => name.to_owned(),
    }
}

fn print_group(ar: &Archive, id: GroupId, level: usize, depth: usize) -> Result<(), Box<dyn std::error::Error>> {
    if level < depth {
        ar.load(id)?;
    }
    let children = {
        let view = ar.view();
        let Some(node) = view.node(id) else { return Ok(()) };
        let label = match node.kind {
            masterfile::GroupKind::ByRecordType => node.label_tag().to_string(),
            _ => format!("{:08X}", node.label),
        };
        println!(
            "{:indent$}{label} {:?} {} B{}",
            "",
            node.kind,
            node.byte_len(),
            if node.is_loaded() { format!(", {} record(s)", node.records().len()) } else { String::new() },
            indent = level * 2,
        );
        node.children().to_vec()
    };
    if level < depth {
        for child in children {
            print_group(ar, child, level + 1, depth)?;
        }
    }
    Ok(())
}

fn print_cell(ar: &Archive, found: Option<CellHandle>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let Some(handle) = found else {
        println!("not found");
        return Ok(());
    };
    let view = ar.view();
    let cell = view.record(handle.cell);
    let land = handle.land.and_then(|h| view.record(h));
    if json {
        let out = serde_json::json!({ "cell": cell, "land": land, "handle": handle });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    if let Some(c) = cell.and_then(Record::as_cell) {
        println!("cell {}", c.editor_id.as_deref().or(c.name.as_deref()).unwrap_or("<unnamed>"));
        if let Some((x, y)) = c.grid {
            println!("  grid      ({x}, {y})");
        }
        println!("  refs      {}", c.references.len());
    }
    if let Some(l) = land.and_then(Record::as_land) {
        println!("  land      {} alpha layer(s)", l.alpha_layers.len());
    }
    Ok(())
}

fn report_diagnostics(ar: &Archive) {
    let d = ar.diagnostics();
    if !d.unknown_record_types.is_empty() || !d.skipped_records.is_empty() {
        eprintln!(
            "{} unknown record type(s), {} unknown field(s), {} skipped record(s)",
            d.unknown_record_types.len(),
            d.unknown_fields,
            d.skipped_records.len()
        );
    }
}
