use clap::{Parser, Subcommand, ValueEnum};
use mme::{ApiRegistry, TermValidator};
use mme_core::{
    load_core_config, ConfigSources, CoreConfig, HttpTransport, InMemoryAuditStore,
    InMemoryPatientStore, OutgoingMatchRequest, OutgoingRequestClient, RemoteServerRegistry,
};
use std::path::Path;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "mme")]
#[command(about = "Matchmaker Exchange node CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum TermKind {
    Phenotype,
    Disorder,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported API versions
    Versions,
    /// Check an ontology term against the configured patterns
    CheckTerm {
        #[arg(value_enum)]
        kind: TermKind,
        /// Term identifier, e.g. HP:0000118
        id: String,
    },
    /// Print the match request that would be sent for a local patient
    Encode {
        /// Local patient id
        patient: String,
        /// Number of candidate genes to include (0 for all)
        #[arg(long)]
        top_genes: Option<usize>,
    },
    /// Send a match request for a local patient to a partner server
    Send {
        /// Local patient id
        patient: String,
        /// Partner server id from the remotes file
        server: String,
        /// Number of candidate genes to include (0 for all)
        #[arg(long)]
        top_genes: Option<usize>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Versions) => {
            let config = config()?;
            for version in registry(&config)?.supported_versions() {
                println!("{}", version);
            }
        }
        Some(Commands::CheckTerm { kind, id }) => {
            let validator = TermValidator::standard()?;
            let term = match kind {
                TermKind::Phenotype => validator.phenotype_term(&id),
                TermKind::Disorder => validator.disorder_term(&id),
            };
            match term {
                Some(term) => println!("valid: {}", term),
                None => println!("invalid: {}", id),
            }
        }
        Some(Commands::Encode { patient, top_genes }) => {
            let client = client()?;
            let json = client.generate_request_json(&patient, top_genes)?;
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Some(Commands::Send {
            patient,
            server,
            top_genes,
        }) => {
            let client = client()?;
            let record = client.send_request(&patient, &server, top_genes);
            if let Some(problem) = send_failure(&record, &server) {
                eprintln!("{}", problem);
            } else {
                let matches = record.remote_matches(client.codec()?)?;
                println!("{} match(es) from {}", matches.len(), server);
                for m in matches {
                    let score = m.score.map_or("-".to_string(), |s| format!("{:.3}", s));
                    println!("  {}  score {}", m.patient.id, score);
                }
            }
        }
        None => {
            println!("No command given. Use --help to see available commands.");
        }
    }

    Ok(())
}

/// Why a send produced no usable reply, or `None` when the reply can be read.
fn send_failure(record: &OutgoingMatchRequest, server: &str) -> Option<String> {
    let reason = record.error_message().unwrap_or("unknown reason");
    if record.error_contacting_remote_server() {
        Some(format!("Error contacting {}: {}", server, reason))
    } else if !record.was_sent() {
        Some(format!("Request not sent: {}", reason))
    } else if !record.got_valid_reply() {
        Some(format!(
            "Server {} replied with status {} and no valid body",
            server,
            record.reply_http_status()
        ))
    } else {
        None
    }
}

fn config() -> Result<CoreConfig, Box<dyn std::error::Error>> {
    Ok(load_core_config(ConfigSources::from_lookup(|key| {
        std::env::var(key).ok()
    }))?)
}

fn registry(config: &CoreConfig) -> Result<ApiRegistry, Box<dyn std::error::Error>> {
    Ok(ApiRegistry::with_supported_versions(
        TermValidator::standard()?,
        config.default_contact().clone(),
    ))
}

fn client() -> Result<OutgoingRequestClient, Box<dyn std::error::Error>> {
    let config = config()?;
    let patients = match std::env::var("MME_PATIENTS_FILE") {
        Ok(path) => InMemoryPatientStore::from_json_file(Path::new(&path))?,
        Err(_) => InMemoryPatientStore::default(),
    };
    let transport = HttpTransport::new(config.http_timeout())?;
    let servers = RemoteServerRegistry::new(config.remote_servers().to_vec());

    Ok(OutgoingRequestClient::new(
        Arc::new(registry(&config)?),
        Arc::new(config),
        Arc::new(servers),
        Arc::new(patients),
        Arc::new(transport),
        Arc::new(InMemoryAuditStore::new()),
    ))
}
