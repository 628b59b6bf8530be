use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tileforge::kernel;
use tileforge::logging::init_logging_from_env;
use tileforge::ops::section_layout;
use tileforge::partition::PartitionConfig;
use tileforge::pipeline::Planner;
use tileforge::platform;
use tileforge::tiling_data::TilingBlob;
use tileforge::TilingContext;

#[derive(Parser, Debug)]
#[command(name = "tileforge-cli", version)]
#[command(about = "Plan operator tilings and inspect tiling blobs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Plan one operator invocation
    Plan {
        /// Platform description JSON (flat or wrapped in "hardware_info")
        #[arg(long)]
        platform: PathBuf,
        /// Invocation JSON: op, inputs, outputs, attrs
        #[arg(long)]
        request: PathBuf,
        /// Partition tuning constants JSON
        #[arg(long)]
        config: Option<PathBuf>,
        /// Also print the blob as hex
        #[arg(long)]
        hex: bool,
        /// Print the plan as JSON instead of the text dump
        #[arg(long)]
        json: bool,
    },
    /// List operators and their strategies in trial order
    List,
    /// Decode a hex tiling blob field by field
    Decode {
        /// Operator that produced the blob
        #[arg(long)]
        op: String,
        /// Blob bytes as hex
        #[arg(long)]
        hex: String,
        /// Print per-lane assignments
        #[arg(long)]
        lanes: bool,
    },
}

fn main() -> anyhow::Result<()> {
    init_logging_from_env()?;
    let cli = Cli::parse();
    match cli.command {
        Commands::Plan {
            platform: platform_path,
            request,
            config,
            hex,
            json,
        } => {
            let description = fs::read_to_string(&platform_path)
                .with_context(|| format!("reading {}", platform_path.display()))?;
            let capability = platform::global().load(&description)?;

            let text = fs::read_to_string(&request)
                .with_context(|| format!("reading {}", request.display()))?;
            let ctx = TilingContext::from_json_str(&text)
                .with_context(|| format!("parsing {}", request.display()))?;

            let config = match config {
                Some(path) => {
                    let text = fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    PartitionConfig::from_json_str(&text)?
                }
                None => PartitionConfig::default(),
            };

            let planner = Planner::with_builtin_operators().with_config(config);
            let output = planner.plan(capability, &ctx)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&output.plan)?);
            } else {
                println!("{}", output.plan.dump());
                println!("strategy:        {}", output.strategy);
                println!("variant key:     {}", output.variant_key);
                println!("launch grid:     {}", output.launch_grid);
                println!("workspace bytes: {}", output.workspace_bytes);
                if let Some(layout) = section_layout(&ctx.op) {
                    println!("{}", output.blob.dump(&layout)?);
                }
            }
            if hex {
                println!("{}", output.blob.to_hex());
            }
        }
        Commands::List => {
            let planner = Planner::with_builtin_operators();
            for op in planner.registry().operators() {
                println!("{op}");
                for (name, priority) in planner.registry().strategies_for(op) {
                    println!("  {priority:>6}  {name}");
                }
            }
        }
        Commands::Decode { op, hex, lanes } => {
            let layout =
                section_layout(&op).ok_or_else(|| anyhow!("unknown operator '{op}'"))?;
            let blob = TilingBlob::from_hex(&hex)?;
            println!("{}", blob.dump(&layout)?);
            if lanes {
                for lane in kernel::lanes(&blob.header()?) {
                    println!(
                        "lane {:>3}: rows {}..{} ({} passes, tail {})",
                        lane.lane,
                        lane.start,
                        lane.start + lane.len,
                        lane.sub_tile_loops,
                        lane.tail_sub_tile
                    );
                }
            }
        }
    }
    Ok(())
}
