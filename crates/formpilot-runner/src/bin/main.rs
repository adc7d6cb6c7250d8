use clap::Parser;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "formpilot-runner")]
#[command(about = "Detect, fill and submit a signup form from a YAML job")]
#[command(version)]
struct Cli {
    /// Job file to run
    config: PathBuf,

    /// Run in headless mode (overrides config)
    #[arg(long)]
    headless: bool,

    /// Set a parameter (can be used multiple times)
    #[arg(short = 'P', long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,

    /// Validate the job without running it
    #[arg(long)]
    check: bool,

    /// Navigate and print detected selectors without filling anything
    #[arg(long)]
    detect_only: bool,
}

#[tokio::main]
async fn main() -> formpilot_runner::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    let params = formpilot_runner::Params::from_args(&cli.params)?;
    let mut config = formpilot_runner::Config::load_with_params(&cli.config, &params)?;

    if cli.check {
        print_summary(&config, &params);
        return Ok(());
    }

    if cli.headless {
        config.browser.headless = true;
    }

    let runner = formpilot_runner::Runner::new(&config.browser).await?;

    if cli.detect_only {
        let detection = runner.detect(&config).await;
        runner.close().await?;
        let detection = detection?;
        let json = serde_json::to_string_pretty(&detection)
            .map_err(|e| formpilot_runner::Error::Config(e.to_string()))?;
        println!("{}", json);
        return Ok(());
    }

    println!("Running: {}", config.name);
    let result = runner.run(&config).await;

    println!();
    if result.success {
        println!("✓ Success");
    } else {
        println!("✗ Failed");
        if let Some(ref error) = result.error {
            println!("  Error: {}", error);
        }
    }
    if let Some(ref filled) = result.filled {
        for (role, locator) in filled.iter() {
            println!("  {}: {}", role, locator);
        }
    }
    println!("  Duration: {}ms", result.duration_ms);
    if result.retries > 0 {
        println!("  Retries: {}", result.retries);
    }
    if let Some(ref path) = result.screenshot {
        println!("  Screenshot: {}", path.display());
    }

    runner.close().await?;

    if !result.success {
        std::process::exit(1);
    }

    Ok(())
}

fn print_summary(config: &formpilot_runner::Config, params: &formpilot_runner::Params) {
    println!("Config valid: {}", config.name);
    println!("  Target: {}", config.target.url);
    if !config.params.is_empty() {
        println!("  Parameters: {}", config.params.len());
        let mut names: Vec<_> = config.params.keys().collect();
        names.sort();
        for name in names {
            let def = &config.params[name];
            let req = if def.required { " (required)" } else { "" };
            let desc = def.description.as_deref().unwrap_or("");
            let value = match params.get(name).or(def.default.as_deref()) {
                Some(_) if def.is_secret(name) => " = <redacted>".to_string(),
                Some(v) => format!(" = {}", v),
                None => String::new(),
            };
            println!("    - {}{}{}: {}", name, req, value, desc);
        }
    }
    let t = &config.timing;
    println!(
        "  Timing: settle {}ms, field {}ms, focus {}ms, post-submit {}ms",
        t.settle_ms, t.field_timeout_ms, t.focus_timeout_ms, t.post_submit_timeout_ms
    );
    if let Some(ms) = t.overall_timeout_ms {
        println!("  Overall timeout: {}ms", ms);
    }
    if let Some(ref success) = config.success {
        println!("  Success conditions: {}", success.len());
    }
    if let Some(ref on_failure) = config.on_failure {
        if let Some(ref retry) = on_failure.retry {
            println!("  Retry attempts: {}", retry.attempts);
        }
        if let Some(ref dir) = on_failure.screenshot {
            println!("  Failure screenshots: {}", dir);
        }
    }
}
