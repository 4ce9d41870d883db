use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "qrlogo", version)]
struct Cli {
    /// Raise log verbosity (`-v` debug, `-vv` trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a QR code (optionally with a logo) and write it as a PNG.
    Generate(GenerateArgs),
    /// Print the symbol geometry for a text and size without rendering.
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Request JSON. Flags below override its fields.
    #[arg(long)]
    request: Option<PathBuf>,

    /// Session options JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Text to encode.
    #[arg(long)]
    text: Option<String>,

    /// Output edge in pixels.
    #[arg(long)]
    size: Option<u32>,

    /// Dark module color, e.g. `#E858F4`.
    #[arg(long)]
    dark: Option<qrlogo::Rgb>,

    /// Light module and logo backing color.
    #[arg(long)]
    light: Option<qrlogo::Rgb>,

    /// Error-correction level.
    #[arg(long, value_enum)]
    ec: Option<EcChoice>,

    /// Logo image file.
    #[arg(long)]
    logo: Option<PathBuf>,

    /// Directory receiving `qr-<w>x<h>-<millis>.png`.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Text to encode.
    #[arg(long)]
    text: String,

    /// Output edge in pixels.
    #[arg(long, default_value_t = 450)]
    size: u32,

    /// Error-correction level.
    #[arg(long, value_enum, default_value_t = EcChoice::H)]
    ec: EcChoice,

    /// Session options JSON (margin bands).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EcChoice {
    L,
    M,
    Q,
    H,
}

impl From<EcChoice> for qrlogo::EcLevel {
    fn from(c: EcChoice) -> Self {
        match c {
            EcChoice::L => Self::L,
            EcChoice::M => Self::M,
            EcChoice::Q => Self::Q,
            EcChoice::H => Self::H,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.cmd {
        Command::Generate(args) => cmd_generate(args),
        Command::Inspect(args) => cmd_inspect(args),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_opts(path: Option<&PathBuf>) -> anyhow::Result<qrlogo::SessionOpts> {
    Ok(match path {
        Some(p) => qrlogo::SessionOpts::from_path(p)?,
        None => qrlogo::SessionOpts::default(),
    })
}

fn cmd_generate(args: GenerateArgs) -> anyhow::Result<()> {
    let opts = load_opts(args.config.as_ref())?;
    let mut session = qrlogo::Session::new(opts)?;

    if let Some(path) = &args.request {
        session.set_request(qrlogo::GenerationRequest::from_path(path)?);
    }
    if let Some(text) = args.text {
        session.set_text(text);
    }
    if let Some(size) = args.size {
        session.set_size(size);
    }
    if let Some(dark) = args.dark {
        session.set_dark_color(dark);
    }
    if let Some(light) = args.light {
        session.set_light_color(light);
    }
    if let Some(ec) = args.ec {
        session.set_ec_level(ec.into());
    }
    if let Some(logo) = &args.logo {
        session.set_logo_path(logo)?;
    }

    match session.generate().map(|h| h.url()) {
        Ok(url) => tracing::debug!(%url, "generated"),
        Err(e) => {
            let msg = session.error().map(str::to_owned).unwrap_or_else(|| e.to_string());
            return Err(anyhow::Error::new(e).context(msg));
        }
    }

    let path = session
        .download_to(&args.out_dir)?
        .context("no image to download")?;
    eprintln!("wrote {}", path.display());
    Ok(())
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    use qrlogo::MatrixEncoder as _;

    let opts = load_opts(args.config.as_ref())?;
    let matrix = qrlogo::QrcodeEncoder.encode(&args.text, args.ec.into())?;
    let margin = opts.margin.margin_for_size(args.size);
    let layout = qrlogo::RasterLayout::new(matrix.dimension(), args.size, margin)?;

    println!("dimension: {}", layout.dimension);
    println!("margin: {}", layout.margin);
    println!("scale: {:.3}", layout.scale);
    Ok(())
}
