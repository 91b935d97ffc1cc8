use std::io::Write;

use anyhow::Result;
use clap::{Parser, Subcommand};
use shared::{FederatedProvider, Plan, ProfilePatch, ProposalStatus, Role, RoutingDecision};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod app;
mod auth;
mod config;
mod dashboard;
mod remote;

use app::App;
use dashboard::{JobDraft, ProposalDraft};

#[derive(Parser)]
#[command(name = "hub")]
#[command(about = "Freelance marketplace from the terminal")]
#[command(version = env!("HUB_VERSION"))]
struct Cli {
    /// Server URL (overrides config)
    #[arg(long)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account with email and password
    Signup {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign in with email and password, or through Google
    Login {
        #[arg(long, required_unless_present = "google")]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long, conflicts_with_all = ["email", "password"])]
        google: bool,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show which screen the account is on
    Status,
    /// Pick a role on the role-selection screen
    Role { role: Role },
    /// Choose the freelancer plan
    Plan { plan: Plan },
    /// Move to the premium plan
    Upgrade,
    /// Browse open jobs
    Jobs {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value = shared::demo::ALL_CATEGORIES)]
        category: String,
    },
    /// Send a proposal for a job
    Propose {
        job_id: String,
        /// Proposed budget, defaults to the job's budget
        #[arg(long)]
        bid: Option<u32>,
        /// Timeline in days
        #[arg(long, default_value_t = 30)]
        days: u32,
        #[arg(long, default_value = "")]
        cover_letter: String,
    },
    /// Show or edit the profile
    Profile {
        #[command(subcommand)]
        action: Option<ProfileAction>,
    },
    /// Post a job
    PostJob {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        budget: u32,
        /// Deadline, in days from now
        #[arg(long, default_value_t = 30)]
        days: i64,
        /// Comma separated
        #[arg(long, default_value = "")]
        skills: String,
    },
    /// List proposals received
    Proposals,
    /// Accept or reject a proposal
    Review {
        proposal_id: String,
        /// accept or reject
        decision: ProposalStatus,
    },
    /// List conversations
    Messages,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Change profile fields
    Edit {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        rate: Option<u32>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        company: Option<String>,
        /// Comma separated, replaces the current list
        #[arg(long)]
        skills: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Set a configuration value
    Set {
        /// Configuration key (server, token)
        key: String,
        /// Configuration value
        value: String,
    },
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },
    /// Show all configuration
    Show,
    /// Get the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hub=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Commands::Config { action } = cli.command {
        return handle_config_command(action);
    }

    let path = config::Config::config_path()?;
    let config = config::Config::load_from(&path).unwrap_or_default();
    let server = cli.server.clone().unwrap_or_else(|| config.server());
    let mut app = App::start(config, path, &server).await?;

    let result = run(&mut app, cli.command).await;
    app.shutdown().await;
    result
}

async fn run(app: &mut App, command: Commands) -> Result<()> {
    match command {
        Commands::Signup { email, password } => {
            let password = read_password(password)?;
            let update = app.sign_up(email, password).await?;
            print_screen(&update.decision);
        }
        Commands::Login {
            email,
            password,
            google,
        } => {
            let update = if google {
                app.sign_in_federated(FederatedProvider::Google).await?
            } else {
                let email = email.unwrap_or_default();
                let password = read_password(password)?;
                app.sign_in(email, password).await?
            };
            print_screen(&update.decision);
        }
        Commands::Logout => {
            app.sign_out().await?;
            println!("\x1b[32m✅ Signed out\x1b[0m");
        }
        Commands::Status => {
            if let Some(err) = &app.screen().error {
                eprintln!("\x1b[33m{}\x1b[0m", err);
            }
            print_screen(app.decision());
        }
        Commands::Role { role } => {
            let decision = app.choose_role(role).await?;
            print_screen(&decision);
        }
        Commands::Plan { plan } => dashboard::choose_plan(app, plan).await?,
        Commands::Upgrade => dashboard::upgrade(app).await?,
        Commands::Jobs { search, category } => {
            dashboard::list_jobs(app, search.as_deref(), &category).await?
        }
        Commands::Propose {
            job_id,
            bid,
            days,
            cover_letter,
        } => {
            let draft = ProposalDraft {
                job_id,
                bid,
                days,
                cover_letter,
            };
            dashboard::propose(app, draft).await?
        }
        Commands::Profile { action: None } => dashboard::show_profile(app).await?,
        Commands::Profile {
            action:
                Some(ProfileAction::Edit {
                    name,
                    title,
                    rate,
                    location,
                    bio,
                    company,
                    skills,
                }),
        } => {
            let patch = ProfilePatch {
                name,
                title,
                hourly_rate: rate,
                location,
                bio,
                company,
                skills: skills.as_deref().map(dashboard::parse_skills),
                ..ProfilePatch::default()
            };
            dashboard::edit_profile(app, patch).await?
        }
        Commands::PostJob {
            title,
            description,
            category,
            budget,
            days,
            skills,
        } => {
            let draft = JobDraft {
                title,
                description,
                category,
                budget,
                days,
                skills: dashboard::parse_skills(&skills).into_iter().collect(),
            };
            dashboard::post_job(app, draft).await?
        }
        Commands::Proposals => dashboard::list_proposals(app).await?,
        Commands::Review {
            proposal_id,
            decision,
        } => dashboard::review(app, &proposal_id, decision).await?,
        Commands::Messages => dashboard::list_messages(app).await?,
        Commands::Config { action } => handle_config_command(action)?,
    }
    Ok(())
}

fn print_screen(decision: &RoutingDecision) {
    match decision {
        RoutingDecision::ShowAuth => {
            println!("\x1b[33m🔐 Not signed in.\x1b[0m");
            println!("   Run '\x1b[1mhub login\x1b[0m' or '\x1b[1mhub signup\x1b[0m'.");
        }
        RoutingDecision::ShowRoleSelection { pending } => {
            println!("Welcome, {}!", pending.email);
            println!("   Pick a role: '\x1b[1mhub role freelancer\x1b[0m' or '\x1b[1mhub role client\x1b[0m'.");
        }
        RoutingDecision::ShowFreelancerDashboard => {
            println!("\x1b[1;32m✓ Freelancer dashboard\x1b[0m");
            println!("   Try '\x1b[1mhub jobs\x1b[0m' or '\x1b[1mhub profile\x1b[0m'.");
        }
        RoutingDecision::ShowClientDashboard => {
            println!("\x1b[1;32m✓ Client dashboard\x1b[0m");
            println!("   Try '\x1b[1mhub post-job\x1b[0m' or '\x1b[1mhub proposals\x1b[0m'.");
        }
        RoutingDecision::ShowLoadingIndicator => println!("Loading..."),
    }
}

fn read_password(given: Option<String>) -> Result<String> {
    if let Some(password) = given {
        return Ok(password);
    }
    eprint!("Password: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn handle_config_command(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            let mut config = config::Config::load().unwrap_or_default();
            match key.as_str() {
                "server" => config.remote.server = Some(value),
                "token" => config.remote.token = Some(value),
                _ => anyhow::bail!("Unknown config key: {}. Valid keys: server, token", key),
            }
            config.save()?;
            println!("Configuration saved");
        }
        ConfigAction::Get { key } => {
            let config = config::Config::load()?;
            let value = match key.as_str() {
                "server" => config.server(),
                "token" => config.remote.token.map(|_| "****").unwrap_or_default().to_string(),
                "session" => config
                    .session
                    .and_then(|s| s.principal.map(|p| p.email))
                    .unwrap_or_default(),
                _ => anyhow::bail!("Unknown config key: {}", key),
            };
            println!("{}", value);
        }
        ConfigAction::Show => {
            let config = config::Config::load()?;
            println!("server: {}", config.server());
            println!("token: {}", config.remote.token.as_ref().map(|_| "****").unwrap_or_default());
            println!(
                "session: {}",
                config.session.as_ref().and_then(|s| s.email()).unwrap_or("-")
            );
        }
        ConfigAction::Path => {
            let path = config::Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
