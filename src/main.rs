#![forbid(unsafe_code)]

//! mars-expand — parse and expand MARS request text from the command line.

use std::path::PathBuf;

use clap::Parser;
use mars_lang::hypercube::HyperCube;
use mars_lang::matcher::{Matcher, Policy};
use mars_lang::{Expansion, Grammar};
use tracing_subscriber::EnvFilter;

/// Parse and expand MARS archive/retrieval requests against a grammar.
#[derive(Parser, Debug)]
#[command(name = "mars-expand", version, about, long_about = None)]
struct Cli {
    /// Show detailed expansion progress.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show everything including per-keyword pipeline steps.
    #[arg(long, global = true)]
    trace: bool,

    /// Output as JSON for machine consumption.
    #[arg(long, global = true)]
    json: bool,

    /// Path to the grammar YAML document (defaults to `MARS_LANGUAGE_YAML`
    /// or `language.yaml`).
    #[arg(long, global = true, env = "MARS_LANGUAGE_YAML")]
    grammar: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Parse request text into verb/keyword/value triples without expanding.
    Parse {
        /// Request text, e.g. `retrieve,class=od,date=-5/to/-1`.
        text: String,
    },

    /// Parse and fully expand request text (ranges, defaults, constraints).
    Expand {
        /// Request text to expand.
        text: String,

        /// Fail on the first constraint violation instead of only warning.
        #[arg(long)]
        strict: bool,
    },

    /// Expand request text and report its Cartesian-product size.
    Inspect {
        /// Request text to expand and measure.
        text: String,
    },

    /// Expand request text, then keep only requests matching `key=regex` conditions.
    Match {
        /// Request text to expand.
        text: String,

        /// Comma-separated `key=regex` conditions.
        expr: String,

        /// Require every value of a multi-valued keyword to match (default: any).
        #[arg(long)]
        all: bool,

        /// Treat keywords absent from a request as matching.
        #[arg(long)]
        match_on_missing: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, ...).
        shell: clap_complete::Shell,
    },
}

fn init_tracing(cli: &Cli) {
    let filter = if cli.trace {
        EnvFilter::new("mars_lang=trace")
    } else if cli.verbose {
        EnvFilter::new("mars_lang=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

type CliResult<T> = std::result::Result<T, mars_lang::MarsError>;

fn load_grammar(cli: &Cli) -> CliResult<Grammar> {
    let path = cli.grammar.clone().unwrap_or_else(|| PathBuf::from("language.yaml"));
    Grammar::load_file(&path)
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    let result = match &cli.command {
        Command::Parse { text } => run_parse(text, cli.json),
        Command::Expand { text, strict } => run_expand(&cli, text, *strict),
        Command::Inspect { text } => run_inspect(&cli, text),
        Command::Match {
            text,
            expr,
            all,
            match_on_missing,
        } => run_match(&cli, text, expr, *all, *match_on_missing),
        Command::Completions { shell } => {
            run_completions(*shell);
            return std::process::ExitCode::SUCCESS;
        }
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}

fn run_parse(text: &str, json: bool) -> CliResult<()> {
    let parsed = mars_lang::parser::parse(text)?;
    for p in parsed {
        if json {
            println!("{}", serde_json::to_string(&p.request.to_string()).unwrap());
        } else {
            println!("{}", p.request);
        }
    }
    Ok(())
}

fn run_expand(cli: &Cli, text: &str, strict: bool) -> CliResult<()> {
    let grammar = load_grammar(cli)?;
    let exp = Expansion::new(grammar).with_config(mars_lang::config::Config {
        strict_mode: strict,
        ..mars_lang::config::Config::from_env()
    });
    let requests = exp.expand_text(text)?;
    for r in requests {
        println!("{r}");
    }
    Ok(())
}

fn run_inspect(cli: &Cli, text: &str) -> CliResult<()> {
    let grammar = load_grammar(cli)?;
    let exp = Expansion::new(grammar);
    for request in exp.expand_text(text)? {
        let order: Vec<String> = request.params().to_vec();
        let cube = HyperCube::new(&order, &request);
        println!("{request} -> {} field(s)", cube.size());
    }
    Ok(())
}

fn run_match(cli: &Cli, text: &str, expr: &str, all: bool, match_on_missing: bool) -> CliResult<()> {
    let grammar = load_grammar(cli)?;
    let exp = Expansion::new(grammar);
    let policy = if all { Policy::All } else { Policy::Any };
    let matcher = Matcher::new(expr, policy)?;
    for request in exp.expand_text(text)? {
        if matcher.matches(&request, match_on_missing) {
            println!("{request}");
        }
    }
    Ok(())
}

fn run_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}
