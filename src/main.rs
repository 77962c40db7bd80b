use clap::Parser;
use std::io::Read;
use std::path::PathBuf;

use embedded_shell::config::ShellConfig;
use embedded_shell::{CancellationToken, ExecutionResult, GlobPolicy, ShellError};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "embedded-shell")]
#[command(about = "Run shell templates over real OS processes")]
#[command(version)]
struct Cli {
    /// Execute the script from command line argument
    #[arg(short = 'c')]
    script: Option<String>,

    /// Working directory for the script
    #[arg(long = "cwd")]
    cwd: Option<PathBuf>,

    /// Exit 0 even if the script fails
    #[arg(long = "nothrow")]
    nothrow: bool,

    /// A pipeline fails if any stage fails
    #[arg(long = "pipefail")]
    pipefail: bool,

    /// Unset variables are an error
    #[arg(long = "strict")]
    strict: bool,

    /// Unmatched globs: literal, null or fail
    #[arg(long = "glob", value_parser = parse_glob_policy)]
    glob: Option<GlobPolicy>,

    /// TOML configuration file
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Output results as JSON (stdout, stderr, exitCode)
    #[arg(long = "json")]
    json: bool,

    /// Script file to execute
    #[arg()]
    script_file: Option<PathBuf>,
}

fn parse_glob_policy(value: &str) -> Result<GlobPolicy, String> {
    match value {
        "literal" => Ok(GlobPolicy::Literal),
        "null" => Ok(GlobPolicy::Null),
        "fail" => Ok(GlobPolicy::Fail),
        other => Err(format!("unknown glob policy '{}' (expected literal, null or fail)", other)),
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("embedded-shell: {}", message);
    std::process::exit(1);
}

fn print_json(result: &ExecutionResult) {
    println!(
        "{}",
        serde_json::json!({
            "stdout": result.text(),
            "stderr": result.stderr_text(),
            "exitCode": result.exit_code,
            "aborted": result.aborted,
        })
    );
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Determine script source: -c, file, or stdin
    let script = if let Some(s) = cli.script {
        s
    } else if let Some(ref file) = cli.script_file {
        match std::fs::read_to_string(file) {
            Ok(content) => content,
            Err(e) => fail(format_args!("cannot read script file: {}: {}", file.display(), e)),
        }
    } else {
        use std::io::IsTerminal;
        if std::io::stdin().is_terminal() {
            fail("no script provided. Use -c 'script', provide a script file, or pipe via stdin.");
        }
        let mut buf = String::new();
        if let Err(e) = std::io::stdin().read_to_string(&mut buf) {
            fail(format_args!("cannot read stdin: {}", e));
        }
        buf
    };

    let config = match &cli.config {
        Some(path) => ShellConfig::load(path).unwrap_or_else(|e| fail(e)),
        None => ShellConfig::default(),
    };

    let mut shell = config.into_shell().quiet(cli.json).throw_on_nonzero_exit(false);
    if let Some(cwd) = cli.cwd {
        shell = shell.cwd(cwd);
    }
    if cli.pipefail {
        shell = shell.pipefail(true);
    }
    if cli.strict {
        shell = shell.strict_variables(true);
    }
    if let Some(policy) = cli.glob {
        shell = shell.glob_policy(policy);
    }

    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let outcome = shell.command(script).cancel_token(token).run().await;

    let exit_code = match outcome {
        Ok(result) => {
            if cli.json {
                print_json(&result);
            }
            result.exit_code
        }
        Err(ShellError::Cancelled(err)) => {
            if cli.json {
                print_json(&err.partial);
            }
            err.partial.exit_code
        }
        Err(err) => {
            if cli.json {
                print_json(&ExecutionResult::new(err.exit_code(), Vec::new(), err.to_string().into_bytes()));
            } else {
                eprintln!("embedded-shell: {}", err);
            }
            err.exit_code()
        }
    };

    std::process::exit(if cli.nothrow { 0 } else { exit_code });
}
