//! Command-line interface for debugweave.

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{self, Config, Feature};
use crate::logging::LogBackend;
use crate::report;
use crate::runner::{OutputMode, Runner};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Default config file names to search for.
const DEFAULT_CONFIG_NAMES: &[&str] = &["debugweave.yaml", ".debugweave.yaml"];

/// Weave debug logging into C/C++ function bodies.
///
/// debugweave inserts entry, exit, parameter, value and call logs into every
/// function it can rewrite safely, using only lexical analysis. Code it
/// cannot handle with confidence is passed through unchanged.
#[derive(Parser)]
#[command(name = "debugweave")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log engine decisions to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Instrument a file or a directory tree
    #[command(visible_alias = "weave")]
    Instrument(InstrumentArgs),
    /// Create a new debugweave config from a template
    Init(InitArgs),
}

/// Arguments for the instrument command.
#[derive(Parser)]
pub struct InstrumentArgs {
    /// Path to instrument (file or directory)
    pub path: PathBuf,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Logging backend: printf, printk, pr_info, pr_debug or dev_dbg
    #[arg(short, long)]
    pub backend: Option<LogBackend>,

    /// Device expression passed to dev_dbg
    #[arg(long)]
    pub device: Option<String>,

    /// Treat the source as kernel code
    #[arg(short, long)]
    pub kernel: bool,

    /// Enable a kind of log (repeatable)
    #[arg(long, value_enum)]
    pub enable: Vec<Feature>,

    /// Disable a kind of log (repeatable)
    #[arg(long, value_enum)]
    pub disable: Vec<Feature>,

    /// Overwrite input files
    #[arg(short, long, conflicts_with = "output")]
    pub in_place: bool,

    /// Write instrumented files under this directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Exit non-zero when any warning diagnostic was produced
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "debugweave.yaml")]
    pub output: PathBuf,

    /// Template to use
    #[arg(short, long, default_value = "userspace")]
    pub template: String,

    /// List available templates
    #[arg(short, long)]
    pub list: bool,
}

/// Available config templates.
struct Template {
    name: &'static str,
    description: &'static str,
    content: &'static str,
}

/// All available templates.
static TEMPLATES: &[Template] = &[
    Template {
        name: "userspace",
        description: "printf logging for user-space C/C++ with every log kind enabled",
        content: include_str!("templates/userspace.yaml"),
    },
    Template {
        name: "kernel-driver",
        description: "dev_dbg logging for a Linux driver, with control-flow notes",
        content: include_str!("templates/kernel-driver.yaml"),
    },
    Template {
        name: "minimal",
        description: "Entry and exit logs only",
        content: include_str!("templates/minimal.yaml"),
    },
];

/// Discover a config file in the current directory.
fn discover_config() -> Option<PathBuf> {
    DEFAULT_CONFIG_NAMES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

/// Load the config file and apply command-line overrides.
fn load_config(args: &InstrumentArgs) -> anyhow::Result<Config> {
    let path = args.config.clone().or_else(discover_config);
    let mut config = match &path {
        Some(p) => {
            debug!(config = %p.display(), "loading config");
            Config::parse_file(p)?
        }
        None => Config::default(),
    };

    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    if let Some(device) = &args.device {
        config.device = device.clone();
    }
    if args.kernel {
        config.kernel = true;
    }
    for feature in &args.enable {
        config.set_feature(*feature, true);
    }
    for feature in &args.disable {
        config.set_feature(*feature, false);
    }

    config::validate(&config)?;
    Ok(config)
}

/// Run the instrument command. `verbose` also lists untouched functions.
pub fn run_instrument(args: &InstrumentArgs, verbose: bool) -> anyhow::Result<i32> {
    // Validate format
    if args.format != "pretty" && args.format != "json" {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty' or 'json'",
            args.format
        );
        return Ok(EXIT_ERROR);
    }

    let config = match load_config(args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    // Resolve path
    let root = match args.path.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: cannot access path {:?}: {}", args.path, e);
            return Ok(EXIT_ERROR);
        }
    };

    let output = if args.in_place {
        OutputMode::InPlace
    } else if let Some(dir) = &args.output {
        OutputMode::Directory(dir.clone())
    } else if root.is_dir() {
        eprintln!("Error: a directory needs --in-place or --output <dir>");
        return Ok(EXIT_ERROR);
    } else {
        OutputMode::Stdout
    };
    let to_stdout = output == OutputMode::Stdout;

    let backend = config.effective_backend().to_string();
    let runner = Runner::new(config).output(output).progress(!to_stdout);

    let files = runner.collect_files(&root)?;
    if files.is_empty() {
        eprintln!("Warning: no files to instrument");
        return Ok(EXIT_SUCCESS);
    }

    let result = runner.run(&root, &files);

    if to_stdout {
        let mut stdout = std::io::stdout().lock();
        for file in &result.files {
            if let Some(text) = &file.text {
                stdout.write_all(text.as_bytes())?;
            }
        }
        stdout.flush()?;
    }

    // The report never shares stdout with instrumented text
    let mut sink: Box<dyn Write> = if to_stdout {
        Box::new(std::io::stderr())
    } else {
        Box::new(std::io::stdout())
    };
    let path_str = args.path.to_string_lossy().to_string();
    match args.format.as_str() {
        "json" => report::write_json(&mut *sink, &path_str, &backend, &result)?,
        _ => report::write_pretty(&mut *sink, &path_str, &backend, &result, verbose)?,
    }

    if result.failed() > 0 || (args.strict && result.has_warnings()) {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    // List mode
    if args.list {
        return list_templates();
    }

    // Find template
    let template = match TEMPLATES.iter().find(|t| t.name == args.template) {
        Some(t) => t,
        None => {
            eprintln!("Error: unknown template {:?}", args.template);
            eprintln!("Run 'debugweave init --list' to see available templates");
            return Ok(EXIT_ERROR);
        }
    };

    // Check if output already exists
    if args.output.exists() {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Remove it or use --output to specify a different path");
        return Ok(EXIT_ERROR);
    }

    // Create output directory if needed
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    if let Err(e) = std::fs::write(&args.output, template.content) {
        eprintln!("Error: failed to write config: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!("Created {} from template '{}'", args.output.display(), template.name);
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to customize for your project", args.output.display());
    println!(
        "  2. Run: debugweave instrument src --output instrumented --config {}",
        args.output.display()
    );

    Ok(EXIT_SUCCESS)
}

/// List available templates.
fn list_templates() -> anyhow::Result<i32> {
    println!("Available templates:");
    println!();

    for template in TEMPLATES {
        let name = if template.name == "userspace" {
            format!("{} (default)", template.name)
        } else {
            template.name.to_string()
        };
        println!("  {:<20} {}", name, template.description);
    }

    println!();
    println!("Usage:");
    println!("  debugweave init --template <name>");

    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_parse_and_validate() {
        for template in TEMPLATES {
            let config = Config::from_yaml(template.content)
                .unwrap_or_else(|e| panic!("template {}: {}", template.name, e));
            config::validate(&config).unwrap();
        }
    }

    #[test]
    fn test_kernel_template() {
        let t = TEMPLATES.iter().find(|t| t.name == "kernel-driver").unwrap();
        let config = Config::from_yaml(t.content).unwrap();
        assert!(config.kernel);
        assert_eq!(config.backend, LogBackend::DevDbg);
        assert!(config.control);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from([
            "debugweave",
            "instrument",
            "x.c",
            "--backend",
            "pr_debug",
            "--kernel",
            "--disable",
            "calls",
            "--enable",
            "control",
            "--config",
            "/nonexistent/debugweave.yaml",
        ])
        .unwrap();
        let Commands::Instrument(mut args) = cli.command else {
            panic!("expected instrument");
        };
        assert!(load_config(&args).is_err());

        args.config = None;
        let config = load_config(&args).unwrap();
        assert_eq!(config.backend, LogBackend::PrDebug);
        assert!(config.kernel);
        assert!(!config.calls);
        assert!(config.control);
    }

    #[test]
    fn test_in_place_conflicts_with_output() {
        assert!(Cli::try_parse_from(["debugweave", "instrument", "src", "-i", "-o", "out"]).is_err());
    }
}
