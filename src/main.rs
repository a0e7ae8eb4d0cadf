use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use snowflake_emulator_deploy::backend::create_backend;
use snowflake_emulator_deploy::config::{LayeredStore, MapStore, StackSettings};
use snowflake_emulator_deploy::descriptor::Descriptor;
use snowflake_emulator_deploy::monitoring::{init_tracing, LogFormat};
use snowflake_emulator_deploy::outputs::{Outputs, StateStore, OUTPUT_NAMES};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "emulator-deploy")]
#[command(about = "Deploy snowflake-emulator to Kubernetes", long_about = None)]
struct Cli {
    /// Stack name; selects the settings and state files.
    #[arg(long, global = true, default_value = "dev", env = "EMULATOR_STACK")]
    stack: String,

    /// Settings file [default: Deploy.<stack>.toml]
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Directory holding per-stack state files.
    #[arg(long, global = true, default_value = ".deploy")]
    state_dir: PathBuf,

    /// Override a setting, e.g. --set image_name=snowflake-emulator:dev
    #[arg(long = "set", global = true, value_name = "KEY=VALUE")]
    set: Vec<String>,

    #[arg(long, global = true, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the resources that would be applied, in order.
    Preview {
        /// Print the rendered manifests instead of the plan.
        #[arg(long)]
        manifests: bool,
    },
    /// Apply the descriptor and record its outputs.
    Up,
    /// Print the outputs of the last successful run.
    Outputs {
        /// Print only this output.
        name: Option<String>,
    },
}

impl Cli {
    fn settings(&self) -> anyhow::Result<StackSettings> {
        let path = self
            .settings
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("Deploy.{}.toml", self.stack)));
        StackSettings::load(&path)
            .with_context(|| format!("loading settings from {}", path.display()))
    }

    fn descriptor(&self, settings: &StackSettings) -> anyhow::Result<Descriptor> {
        let store = LayeredStore::new()
            .push(MapStore::from_assignments(self.set.as_slice())?)
            .push(settings.clone());
        Ok(Descriptor::from_store(&store)?)
    }
}

fn display(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn print_outputs(outputs: &Outputs) {
    for name in OUTPUT_NAMES {
        if let Some(value) = outputs.get(name) {
            println!("{:<24}{}", name, display(&value));
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format, "info")?;

    let state = StateStore::new(&cli.state_dir);

    match &cli.cmd {
        Commands::Preview { manifests } => {
            let settings = cli.settings()?;
            let plan = cli.descriptor(&settings)?.evaluate()?;

            if *manifests {
                println!("{}", serde_json::to_string_pretty(&plan.render())?);
            } else {
                for spec in plan.ordered() {
                    let deps = plan.graph().dependencies(&spec.logical_name);
                    let deps = if deps.is_empty() {
                        "-".to_string()
                    } else {
                        deps.join(", ")
                    };
                    println!("{:<32}{:<12}{}", spec.logical_name, spec.kind().to_string(), deps);
                }
            }
        }
        Commands::Up => {
            let settings = cli.settings()?;
            let descriptor = cli.descriptor(&settings)?;
            let backend = create_backend(&settings.backend).await?;
            if !backend.health_check().await? {
                bail!("{} backend is not healthy", backend.backend_type());
            }

            let run = descriptor.up(backend.as_ref(), &state, &cli.stack).await?;
            print_outputs(&run.outputs);
        }
        Commands::Outputs { name } => {
            let run = state.load(&cli.stack)?;
            match name {
                Some(name) => match run.outputs.get(name) {
                    Some(value) => println!("{}", display(&value)),
                    None => bail!("unknown output '{}'", name),
                },
                None => print_outputs(&run.outputs),
            }
        }
    }

    Ok(())
}
