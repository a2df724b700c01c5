use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::{io, path::PathBuf, sync::Arc};
use tracing::{debug, error, info};

use wonderbot::{
    chat, constants, estimator,
    prompts::{self, PromptProfile},
    web_server::{self, AppState},
    CompletionDispatcher, ConstructionGrade, ModelSelection, OpenAiBackend, ProjectParameters, ProjectType,
    Session,
};

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug, Clone)]
struct SessionArgs {
    #[arg(long, default_value = "assistant", help = "Prompt profile: assistant or sales.")]
    profile: String,
    #[arg(long, env = "WONDERBOT_CHAT_MODEL", default_value = constants::DEFAULT_CHAT_MODEL)]
    chat_model: String,
    #[arg(long, env = "WONDERBOT_VISION_MODEL", default_value = constants::DEFAULT_VISION_MODEL)]
    vision_model: String,
}

impl SessionArgs {
    fn prompts(&self) -> Result<&'static PromptProfile> {
        prompts::profile_by_name(&self.profile).ok_or_else(|| {
            anyhow!(
                "Unknown profile '{}'. Available profiles: {}",
                self.profile,
                prompts::profile_names().join(", ")
            )
        })
    }

    fn dispatcher(&self) -> Result<CompletionDispatcher> {
        let backend = OpenAiBackend::from_env().context("Failed to build completion client")?;
        let models = ModelSelection {
            chat: self.chat_model.clone(),
            vision: self.vision_model.clone(),
            ..ModelSelection::default()
        };
        Ok(CompletionDispatcher::new(Arc::new(backend), models))
    }

    fn session(&self) -> Result<Session> {
        Ok(Session::start(self.dispatcher()?, self.prompts()?))
    }
}

// Define the available subcommands
#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the web assistant.
    Serve {
        #[arg(long, default_value_t = constants::DEFAULT_PORT, help = "Port for the web server.")]
        port: u16,
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Chat with the assistant in the terminal.
    Chat {
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Estimate materials, costs and timeline for a project.
    Estimate {
        #[arg(long, help = "Total area per floor in square feet (minimum 100).")]
        area: f64,
        #[arg(long, default_value_t = 1, help = "Number of floors (minimum 1).")]
        floors: u32,
        #[arg(long, default_value = "basic", help = "Basic, Premium or Luxury.")]
        grade: ConstructionGrade,
        #[arg(long, default_value = "residential", help = "Residential, Commercial, Industrial or Infrastructure.")]
        project_type: ProjectType,
        #[arg(long, help = "Print the estimate as JSON.")]
        json: bool,
    },
    /// Analyze an architectural drawing or photo.
    Analyze {
        path: PathBuf,
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Generate a design visualization from a description.
    Design {
        description: String,
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Ask for Vastu guidance on a topic.
    Vastu {
        topic: String,
        #[command(flatten)]
        session: SessionArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for OPENAI_API_KEY and OPENAI_BASE_URL)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG environment variable (e.g., RUST_LOG=info,wonderbot=debug)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    debug!("Wonderbot starting with command: {:?}", cli.command);

    match cli.command {
        Commands::Serve { port, session } => {
            let state = AppState::new(session.dispatcher()?, session.prompts()?);
            let mut web_server_handle = tokio::spawn(async move {
                if let Err(e) = web_server::start_web_server(port, state).await {
                    error!("Web server failed: {:?}", e);
                }
            });

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Ctrl-C received, initiating shutdown...");
                }
                res = &mut web_server_handle => {
                    match res {
                        Ok(_) => info!("Web server task completed unexpectedly."),
                        Err(e) if e.is_panic() => error!("Web server task panicked: {:?}", e),
                        Err(e) => error!("Web server task failed: {:?}", e),
                    }
                }
            }

            if !web_server_handle.is_finished() {
                info!("Aborting web server task...");
                web_server_handle.abort();
            }
            info!("Shutdown complete.");
        }
        Commands::Chat { session } => {
            let mut session = session.session()?;
            let stdin = io::stdin();
            chat::run_terminal_chat(&mut session, stdin.lock(), io::stdout())
                .await
                .context("Chat session failed")?;
        }
        Commands::Estimate {
            area,
            floors,
            grade,
            project_type,
            json,
        } => {
            let params = ProjectParameters::new(project_type, floors, area, grade).context("Invalid project details")?;
            let estimate = estimator::estimate(&params);
            if json {
                println!("{}", serde_json::to_string_pretty(&estimate)?);
            } else {
                print!("{}", estimate);
            }
        }
        Commands::Analyze { path, session } => {
            let session = session.session()?;
            let analysis = match session.analyze_design_file(&path).await {
                Ok(analysis) => analysis,
                Err(e) => {
                    eprintln!("{}", e.user_notice());
                    return Err(e).context("Design analysis failed");
                }
            };
            println!("{}", analysis);
            println!();
            println!("Next steps:");
            for step in session.prompts().analysis_next_steps {
                println!("  - {}", step);
            }
            println!("Helpline: {}", constants::HELPLINE);
        }
        Commands::Design { description, session } => {
            let url = session
                .session()?
                .generate_design(&description)
                .await
                .context("Design generation failed")?;
            println!("{}", url);
        }
        Commands::Vastu { topic, session } => {
            let advice = session
                .session()?
                .vastu_advice(&topic)
                .await
                .context("Vastu advice failed")?;
            println!("{}", advice);
        }
    }

    Ok(())
}
