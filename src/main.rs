use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use inksight::catalog::{Placement, STYLES, DEFAULT_STYLE};
use inksight::compositor::ImageCompositor;
use inksight::models::SCALE_STEP;
use inksight::selection::{ContainerRect, SelectionBox};
use inksight::{Config, CredentialStore, EditSession, Orchestrator, ReplicateClient};

#[derive(Parser)]
#[command(name = "inksight", about = "Preview a tattoo concept on your own photo")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a mockup and critique, printing the result as JSON
    Simulate(SimulateArgs),
    /// Manage the stored Replicate API token
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// List styles and placements with example concepts
    Catalog,
}

#[derive(Subcommand)]
enum TokenAction {
    Set { token: String },
    Clear,
    Status,
}

#[derive(Args)]
struct SimulateArgs {
    #[arg(long)]
    image: std::path::PathBuf,
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value = DEFAULT_STYLE)]
    style: String,
    /// full, arm, leg, back, chest or custom
    #[arg(long, default_value = "full")]
    placement: String,
    /// Custom area as x0,y0,x1,y1 percentages (implies --placement custom)
    #[arg(long)]
    selection: Option<String>,
    /// Quarter turns clockwise
    #[arg(long, default_value_t = 0)]
    rotate: u8,
    #[arg(long, default_value_t = 1.0)]
    scale: f32,
    #[arg(long, default_value_t = 100)]
    brightness: u16,
    #[arg(long, default_value_t = 100)]
    contrast: u16,
    #[arg(long)]
    no_sharpen: bool,
}

fn parse_selection(raw: &str) -> anyhow::Result<SelectionBox> {
    let parts: Vec<f32> = raw
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .with_context(|| format!("selection '{raw}' must be four numbers"))?;
    let [x0, y0, x1, y1] = parts[..] else {
        bail!("selection '{raw}' must be four numbers");
    };
    let clamp = |v: f32| v.clamp(0.0, 100.0);
    SelectionBox { start_x: clamp(x0), start_y: clamp(y0), end_x: clamp(x1), end_y: clamp(y1) }
        .committed()
        .with_context(|| format!("selection '{raw}' must be wider and taller than 5%"))
}

async fn simulate(args: SimulateArgs, config: Config) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.image).with_context(|| format!("reading {}", args.image.display()))?;
    let photo = ImageCompositor::load_from_memory(&bytes)?;

    let mut session = EditSession::new();
    session.load_image(photo);

    let placement = match &args.selection {
        Some(_) => Placement::Custom,
        None => Placement::from_slug(&args.placement).with_context(|| format!("unknown placement '{}'", args.placement))?,
    };
    session.set_placement(placement);
    if let Some(raw) = &args.selection {
        let sel = parse_selection(raw)?;
        let tool = session.selection_mut();
        let rect = ContainerRect { left: 0.0, top: 0.0, width: 100.0, height: 100.0 };
        tool.begin(&rect, sel.start_x, sel.start_y);
        tool.update(&rect, sel.end_x, sel.end_y);
        tool.commit();
    }

    for _ in 0..args.rotate % 4 {
        session.rotate();
    }
    let steps = ((args.scale - 1.0) / SCALE_STEP).round() as i32;
    for _ in 0..steps.unsigned_abs() {
        if steps > 0 { session.scale_up() } else { session.scale_down() }
    }
    session.set_brightness(args.brightness);
    session.set_contrast(args.contrast);
    session.set_sharpen(!args.no_sharpen);

    let now = Instant::now();
    session.set_prompt(args.prompt, now);
    session.set_style(args.style, now);

    let orchestrator = Orchestrator::new(&config, Arc::new(ReplicateClient::new(config.api_base.clone())));
    let sim = session.simulate(&orchestrator).await?;
    tracing::info!(
        "✅ Done: rotation {}°, {} history entries",
        session.adjustments().rotation.degrees(),
        session.history().len()
    );
    println!("{}", serde_json::to_string_pretty(&sim)?);
    Ok(())
}

fn token(action: TokenAction, store: &CredentialStore) -> anyhow::Result<()> {
    match action {
        TokenAction::Set { token } => {
            let saved = store.save(&token)?;
            println!("Saved token {} to {}", saved.masked(), store.path().display());
        }
        TokenAction::Clear => {
            store.clear()?;
            println!("Cleared stored token at {}", store.path().display());
        }
        TokenAction::Status => match store.resolve() {
            Some(c) => println!("API connected: {}", c.masked()),
            None => println!("No API token configured. Get one at https://replicate.com/account/api-tokens"),
        },
    }
    Ok(())
}

fn catalog() {
    println!("Styles:");
    for s in STYLES {
        println!("  {s}");
    }
    println!("\nPlacements:");
    for p in Placement::ALL {
        println!("  {} ({})", p.label(), p.slug());
        for example in p.example_prompts() {
            println!("    - {example}");
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let store = CredentialStore::default_location();

    match cli.command {
        Command::Simulate(args) => {
            let config = Config::from_env(&store);
            if let Some(c) = &config.credential {
                tracing::info!("Using API token: {}", c.masked());
            }
            simulate(args, config).await
        }
        Command::Token { action } => token(action, &store),
        Command::Catalog => {
            catalog();
            Ok(())
        }
    }
}
