use carewatch::{
    cmd::{EvaluateArgs, evaluate},
    context::AppContextBuilder,
    supervisor::Supervisor,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory containing `app.yaml`. Defaults to `configs`.
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the scheduler and, if enabled, the HTTP server.
    Run,
    /// Evaluates one patient's alerts and prints the active ones.
    Evaluate(EvaluateArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => run_supervisor(cli.config_dir).await?,
        Commands::Evaluate(args) => evaluate::execute(args, cli.config_dir).await?,
    }

    Ok(())
}

async fn run_supervisor(config_dir: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let context = AppContextBuilder::new(config_dir).build().await?;

    let supervisor = Supervisor::builder()
        .config(context.config)
        .repository(context.repo)
        .client_pool(context.client_pool)
        .build()
        .await?;

    tracing::info!("Supervisor initialized, starting alert scheduling...");
    supervisor.run().await?;

    Ok(())
}
